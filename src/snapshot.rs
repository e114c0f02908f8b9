//! Reader diagnostics snapshot.
//!
//! [`ReaderSnapshot`] is an **owned**, read-only view of the reader at a point in time:
//! the active configuration bundle plus a [`DeviceDump`] per attached device. It is
//! produced by [`ReaderHandle::snapshot`](crate::reader::ReaderHandle::snapshot) and is
//! safe to take from any thread while the pipeline runs.
//!
//! # Semantics
//! - Devices are listed in ascending id order.
//! - A snapshot is **immutable**. To refresh, take a new one.
//!
//! # Example
//! ```no_run
//! # fn demo(handle: &trackmap::reader::ReaderHandle) -> trackmap::Result<()> {
//! let snap = handle.snapshot();
//! for device in snap.iter() {
//!     println!("{}: sources={:#x}", device.identifier, device.sources);
//! }
//! println!("{}", snap.to_json()?);
//! # Ok(())
//! # }
//! ```

use crate::config::{DisplayId, InputReaderConfiguration};
use crate::device::DeviceDump;
use crate::error::Result;
use crate::event::DeviceId;
use serde::Serialize;

/// The parts of [`InputReaderConfiguration`] worth showing in a dump.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConfigurationSummary {
    pub display_orientation: i32,
    pub display_association: Option<DisplayId>,
    pub pointer_speed: i32,
    pub pointer_capture_enabled: bool,
}

impl From<&InputReaderConfiguration> for ConfigurationSummary {
    fn from(config: &InputReaderConfiguration) -> Self {
        Self {
            display_orientation: config.display_orientation.degrees(),
            display_association: config.display_association,
            pointer_speed: config.pointer_speed,
            pointer_capture_enabled: config.pointer_capture_enabled,
        }
    }
}

/// Owned snapshot of the reader state.
#[derive(Clone, Debug, Serialize)]
pub struct ReaderSnapshot {
    pub configuration: ConfigurationSummary,
    /// Change bits requested but not yet applied.
    pub pending_changes: u32,
    pub devices: Vec<DeviceDump>,
}

impl ReaderSnapshot {
    #[inline]
    pub fn get(&self, device_id: DeviceId) -> Option<&DeviceDump> {
        self.devices.iter().find(|d| d.id == device_id)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &DeviceDump> {
        self.devices.iter()
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
