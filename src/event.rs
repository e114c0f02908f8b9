//! Raw events as delivered by a device source.
//!
//! trackmap represents hardware input as small `(type, code, value)` tuples ([`RawEvent`]),
//! using the Linux evdev numbering for types and codes. A device source produces them in
//! time order per device, and a [`EV_SYN`]/[`SYN_REPORT`] event closes each logical batch.
//!
//! ## Value conventions
//! - **`EV_REL`:** signed relative counts since the previous report.
//! - **`EV_ABS`:** absolute device coordinates, not normalized.
//! - **`EV_KEY`:** `1` = pressed, `0` = released, `2` = autorepeat (treated as pressed).
//! - **`EV_SYN`:** `SYN_REPORT` ends a batch; `SYN_DROPPED` means the kernel buffer
//!   overflowed and state since the last report is unreliable.
//!
//! Device arrival and removal travel on the same stream as [`SourceEvent`] variants so the
//! reader sees them in order with the raw events around them.

use crate::device::DeviceDescriptor;
use std::sync::OnceLock;
use std::time::Instant;

/// Identifies a device for the lifetime of its session.
pub type DeviceId = i32;

/// Monotonic timestamp in nanoseconds.
pub type Nsecs = i64;

/// Nanoseconds on a process-wide monotonic clock, for timestamps the reader makes up itself
/// (configuration refreshes, restarts). Sources are free to use their own epoch.
pub fn now() -> Nsecs {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = *EPOCH.get_or_init(Instant::now);
    Nsecs::try_from(epoch.elapsed().as_nanos()).unwrap_or(Nsecs::MAX)
}

pub const EV_SYN: u16 = 0x00;
pub const EV_KEY: u16 = 0x01;
pub const EV_REL: u16 = 0x02;
pub const EV_ABS: u16 = 0x03;

pub const SYN_REPORT: u16 = 0;
pub const SYN_DROPPED: u16 = 3;

pub const REL_X: u16 = 0x00;
pub const REL_Y: u16 = 0x01;
pub const REL_HWHEEL: u16 = 0x06;
pub const REL_WHEEL: u16 = 0x08;

pub const ABS_X: u16 = 0x00;
pub const ABS_Y: u16 = 0x01;

pub const BTN_MOUSE: u16 = 0x110;
pub const BTN_LEFT: u16 = 0x110;
pub const BTN_RIGHT: u16 = 0x111;
pub const BTN_MIDDLE: u16 = 0x112;
pub const BTN_SIDE: u16 = 0x113;
pub const BTN_EXTRA: u16 = 0x114;
pub const BTN_FORWARD: u16 = 0x115;
pub const BTN_BACK: u16 = 0x116;
pub const BTN_TASK: u16 = 0x117;
/// First code past the mouse button block.
pub const BTN_JOYSTICK: u16 = 0x120;

/// A single hardware-reported tuple for one device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawEvent {
    /// Capture time (monotonic nanoseconds).
    pub when: Nsecs,
    pub device_id: DeviceId,
    /// Event type (`EV_*`).
    pub kind: u16,
    /// Type-specific code (`REL_*`, `BTN_*`, ...).
    pub code: u16,
    pub value: i32,
}

impl RawEvent {
    pub fn new(when: Nsecs, device_id: DeviceId, kind: u16, code: u16, value: i32) -> Self {
        Self {
            when,
            device_id,
            kind,
            code,
            value,
        }
    }

    /// `EV_SYN`/`SYN_REPORT`: the batch boundary.
    pub fn sync(when: Nsecs, device_id: DeviceId) -> Self {
        Self::new(when, device_id, EV_SYN, SYN_REPORT, 0)
    }

    #[inline]
    pub fn is_sync_report(&self) -> bool {
        self.kind == EV_SYN && self.code == SYN_REPORT
    }

    #[inline]
    pub fn is_sync_dropped(&self) -> bool {
        self.kind == EV_SYN && self.code == SYN_DROPPED
    }
}

/// One item of a device source batch.
#[derive(Clone, Debug)]
pub enum SourceEvent {
    /// A hardware event for an attached device.
    Raw(RawEvent),
    /// A matching device appeared.
    DeviceAdded { when: Nsecs, descriptor: DeviceDescriptor },
    /// A device went away; its session ends.
    DeviceRemoved { when: Nsecs, device_id: DeviceId },
}

impl From<RawEvent> for SourceEvent {
    fn from(raw: RawEvent) -> Self {
        SourceEvent::Raw(raw)
    }
}
