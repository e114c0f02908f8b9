//! Finished events handed from the reader to the dispatcher.
//!
//! Mappers synthesize [`NotifyArgs`] values; once posted, the dispatcher owns them and the
//! reader keeps no reference. All values are plain data (`Clone + Send`).
//!
//! ## Coordinate conventions
//! - In [`Source::MOUSE`] events, `x`/`y` are absolute display coordinates taken from the
//!   pointer controller and `relative_x`/`relative_y` carry the scaled delta.
//! - In [`Source::MOUSE_RELATIVE`] events, `x`/`y` carry the scaled delta and no cursor
//!   position is attached.
//! - Scroll deltas are in wheel detents after velocity scaling; positive `vscroll` is "up".

use crate::config::DisplayId;
use crate::event::{DeviceId, Nsecs};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Input source classification attached to every emitted event.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct Source: u32 {
        const CLASS_BUTTON = 0x0000_0001;
        const CLASS_POINTER = 0x0000_0002;
        const CLASS_NAVIGATION = 0x0000_0004;
        const KEYBOARD = 0x0000_0101;
        const DPAD = 0x0000_0201;
        const MOUSE = 0x0000_2002;
        const TRACKBALL = 0x0001_0004;
        const MOUSE_RELATIVE = 0x0002_0004;
    }
}

bitflags! {
    /// Canonical mouse button state.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct MotionButtons: u32 {
        const PRIMARY = 1 << 0;
        const SECONDARY = 1 << 1;
        const TERTIARY = 1 << 2;
        const BACK = 1 << 3;
        const FORWARD = 1 << 4;
    }
}

bitflags! {
    /// Hints for the dispatcher's interception policy.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct PolicyFlags: u32 {
        /// The event should wake the device.
        const WAKE = 1 << 0;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionAction {
    Down,
    Up,
    Move,
    HoverMove,
    Scroll,
    ButtonPress,
    ButtonRelease,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyAction {
    Down,
    Up,
}

/// Semantic key codes a cursor device can synthesize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    DpadCenter,
    Back,
    Forward,
}

/// Axis values of the single pointer a cursor device reports.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PointerCoords {
    pub x: f32,
    pub y: f32,
    pub relative_x: f32,
    pub relative_y: f32,
    pub vscroll: f32,
    pub hscroll: f32,
    /// `1.0` while any button is down, `0.0` otherwise.
    pub pressure: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NotifyMotionArgs {
    pub event_time: Nsecs,
    pub device_id: DeviceId,
    pub source: Source,
    pub display_id: Option<DisplayId>,
    pub policy_flags: PolicyFlags,
    pub action: MotionAction,
    /// The button that changed, for `ButtonPress`/`ButtonRelease` only.
    pub action_button: MotionButtons,
    pub button_state: MotionButtons,
    pub coords: PointerCoords,
    pub x_precision: f32,
    pub y_precision: f32,
    /// Absolute cursor position, present only for [`Source::MOUSE`].
    pub cursor_position: Option<(f32, f32)>,
    /// Start of the current press span; equals `event_time` for hover events.
    pub down_time: Nsecs,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyKeyArgs {
    pub event_time: Nsecs,
    pub device_id: DeviceId,
    pub source: Source,
    pub display_id: Option<DisplayId>,
    pub policy_flags: PolicyFlags,
    pub action: KeyAction,
    pub key_code: KeyCode,
    pub scan_code: u16,
    pub down_time: Nsecs,
}

/// Everything the reader can post to the dispatcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NotifyArgs {
    Motion(NotifyMotionArgs),
    Key(NotifyKeyArgs),
    /// A device session was reset (configuration change, dropped sync, removal).
    /// Receivers should cancel any gesture in progress for that device.
    DeviceReset { event_time: Nsecs, device_id: DeviceId },
    ConfigurationChanged { event_time: Nsecs },
}

impl NotifyArgs {
    /// Originating device, when the event has one.
    pub fn device_id(&self) -> Option<DeviceId> {
        match self {
            NotifyArgs::Motion(m) => Some(m.device_id),
            NotifyArgs::Key(k) => Some(k.device_id),
            NotifyArgs::DeviceReset { device_id, .. } => Some(*device_id),
            NotifyArgs::ConfigurationChanged { .. } => None,
        }
    }

    pub fn event_time(&self) -> Nsecs {
        match self {
            NotifyArgs::Motion(m) => m.event_time,
            NotifyArgs::Key(k) => k.event_time,
            NotifyArgs::DeviceReset { event_time, .. } => *event_time,
            NotifyArgs::ConfigurationChanged { event_time } => *event_time,
        }
    }

    pub fn as_motion(&self) -> Option<&NotifyMotionArgs> {
        match self {
            NotifyArgs::Motion(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<&NotifyKeyArgs> {
        match self {
            NotifyArgs::Key(k) => Some(k),
            _ => None,
        }
    }
}
