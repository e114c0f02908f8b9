//! Per-device mappers: raw events in, finished events out.
//!
//! A device gets its mappers once, when it attaches, based on its device classes; they are
//! never swapped for the life of the session. Everything a mapper does is driven by the
//! reader thread through the [`InputMapper`] capability set:
//!
//! | call              | when                                                    |
//! |-------------------|---------------------------------------------------------|
//! | `configure`       | at attach (empty change mask) and on every refresh      |
//! | `reset`           | after attach, after material config changes, on removal |
//! | `process`         | for every raw event of the device, in order             |
//! | `scan_code_state` | on demand; read-only                                    |
//!
//! Output is appended to a caller-provided `Vec<NotifyArgs>`, in the order the events must
//! reach the dispatcher.

mod cursor;

pub use cursor::{CursorInputMapper, Mode, Parameters, TRACKBALL_MOVEMENT_THRESHOLD};

use crate::config::{ConfigurationChanges, DisplayId, InputReaderConfiguration};
use crate::device::DeviceContext;
use crate::event::{Nsecs, RawEvent};
use crate::notify::{NotifyArgs, Source};
use serde::{Deserialize, Serialize};

/// Result of a key/button state query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyState {
    /// The mapper does not know this code (or the source mask does not match).
    Unknown,
    Up,
    Down,
}

/// Capability set every mapper kind implements.
pub trait InputMapper: Send {
    /// Sources this mapper produces events for.
    fn sources(&self) -> Source;

    /// Applies a configuration snapshot. An empty `changes` mask means "apply everything".
    ///
    /// Returns `true` when the change was material and the mapper reset itself; the caller
    /// should then tell the dispatcher that the device was reset.
    fn configure(
        &mut self,
        when: Nsecs,
        config: &InputReaderConfiguration,
        changes: ConfigurationChanges,
        ctx: &dyn DeviceContext,
    ) -> bool;

    /// Drops all transient state. Safe to call at any time.
    fn reset(&mut self, when: Nsecs, ctx: &dyn DeviceContext);

    /// Consumes one raw event; on a sync boundary, appends synthesized events to `out`.
    fn process(&mut self, raw: &RawEvent, ctx: &dyn DeviceContext, out: &mut Vec<NotifyArgs>);

    fn scan_code_state(&self, _source_mask: Source, _scan_code: u16) -> KeyState {
        KeyState::Unknown
    }

    fn associated_display_id(&self) -> Option<DisplayId> {
        None
    }

    /// Diagnostic state dump.
    fn dump(&self) -> serde_json::Value;
}
