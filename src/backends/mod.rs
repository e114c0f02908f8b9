//! Device sources for `trackmap`.
//!
//! A [`DeviceSource`] is the reader thread's only blocking point: it waits for the next
//! batch of [`SourceEvent`]s (raw events plus device arrivals/removals), in order.
//!
//! # Backends
//! - [`virtual_input`]: programmatic, channel-fed source. Always compiled; used by tests,
//!   demos and hosts that already decode input themselves.
//! - [`raw_mouse`]: platform-independent translation of Raw-Input style mouse packets and
//!   boot-protocol HID mouse reports into `RawEvent`s.
//! - **`hid`** feature: [`hid`] polls boot-protocol HID mice through `hidapi`.
//! - Windows only: [`windows`] parses `WM_INPUT` payloads forwarded by a host that owns the
//!   Win32 message loop.
//!
//! trackmap reads input devices; it does not create virtual devices (uinput).

use crate::error::Result;
use crate::event::SourceEvent;
use std::time::Duration;

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;
pub mod raw_mouse;
pub mod virtual_input;
#[cfg(target_os = "windows")]
#[cfg_attr(docsrs, doc(cfg(target_os = "windows")))]
pub mod windows;

pub use virtual_input::{VirtualEventSource, VirtualFeeder};

/// Time-ordered producer of raw input.
pub trait DeviceSource: Send {
    /// Waits up to `timeout` for input and returns everything available.
    ///
    /// An empty batch means the wait timed out. Batches from a well-behaved source end on a
    /// sync boundary for every device they touch; the reader tolerates partial windows
    /// but they are only synthesized once their `SYN_REPORT` arrives.
    ///
    /// An `Err` is terminal: the reader thread logs it and exits.
    fn read_batch(&mut self, timeout: Duration) -> Result<Vec<SourceEvent>>;
}

impl<S: DeviceSource + ?Sized> DeviceSource for Box<S> {
    fn read_batch(&mut self, timeout: Duration) -> Result<Vec<SourceEvent>> {
        (**self).read_batch(timeout)
    }
}
