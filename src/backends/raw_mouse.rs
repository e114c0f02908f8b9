//! Mouse packet translation.
//!
//! Platform backends decode their native mouse reports into one of two small structs and
//! let this module produce evdev-style [`RawEvent`]s:
//!
//! - [`MousePacket`]: Raw-Input layout (`RI_MOUSE_*` transition flags, wheel in
//!   `WHEEL_DELTA` units). Translated by [`RawMouseTranslator`].
//! - [`BootMouseReport`]: HID boot-protocol report (button bitmap, `i8` deltas, optional
//!   wheel byte). Translated by [`BootMouseTranslator`].
//!
//! ## Conventions
//! - Every translated packet ends with a `SYN_REPORT`; one packet is one window.
//! - Raw Input wheels report multiples of `WHEEL_DELTA` (120) per detent; high-resolution
//!   wheels report less. Partial detents carry over to the next packet.
//! - Raw Input positive wheel is away from the user, same as `REL_WHEEL`.
//! - Boot-protocol Y grows downwards, same as `REL_Y`.

use crate::device::AbsoluteAxisInfo;
use crate::event::{
    DeviceId, Nsecs, RawEvent, ABS_X, ABS_Y, BTN_EXTRA, BTN_LEFT, BTN_MIDDLE, BTN_RIGHT, BTN_SIDE,
    EV_ABS, EV_KEY, EV_REL, REL_HWHEEL, REL_WHEEL, REL_X, REL_Y,
};

pub const RI_MOUSE_LEFT_BUTTON_DOWN: u16 = 0x0001;
pub const RI_MOUSE_LEFT_BUTTON_UP: u16 = 0x0002;
pub const RI_MOUSE_RIGHT_BUTTON_DOWN: u16 = 0x0004;
pub const RI_MOUSE_RIGHT_BUTTON_UP: u16 = 0x0008;
pub const RI_MOUSE_MIDDLE_BUTTON_DOWN: u16 = 0x0010;
pub const RI_MOUSE_MIDDLE_BUTTON_UP: u16 = 0x0020;
pub const RI_MOUSE_BUTTON_4_DOWN: u16 = 0x0040;
pub const RI_MOUSE_BUTTON_4_UP: u16 = 0x0080;
pub const RI_MOUSE_BUTTON_5_DOWN: u16 = 0x0100;
pub const RI_MOUSE_BUTTON_5_UP: u16 = 0x0200;
pub const RI_MOUSE_WHEEL: u16 = 0x0400;
pub const RI_MOUSE_HWHEEL: u16 = 0x0800;

/// Wheel units per detent.
pub const WHEEL_DELTA: i32 = 120;

/// Largest coordinate of a `MOUSE_MOVE_ABSOLUTE` packet. The range spans the display.
pub const ABSOLUTE_MAX: i32 = 65535;

/// Absolute axes to declare for a Raw-Input device that sends absolute packets, so the
/// mapper scales positions onto the display instead of using them as pixels.
pub fn raw_input_absolute_axes() -> [AbsoluteAxisInfo; 2] {
    [
        AbsoluteAxisInfo::new(ABS_X, 0, ABSOLUTE_MAX),
        AbsoluteAxisInfo::new(ABS_Y, 0, ABSOLUTE_MAX),
    ]
}

/// `(down flag, up flag, evdev code)` for each Raw Input button.
const RAW_BUTTONS: [(u16, u16, u16); 5] = [
    (RI_MOUSE_LEFT_BUTTON_DOWN, RI_MOUSE_LEFT_BUTTON_UP, BTN_LEFT),
    (RI_MOUSE_RIGHT_BUTTON_DOWN, RI_MOUSE_RIGHT_BUTTON_UP, BTN_RIGHT),
    (RI_MOUSE_MIDDLE_BUTTON_DOWN, RI_MOUSE_MIDDLE_BUTTON_UP, BTN_MIDDLE),
    (RI_MOUSE_BUTTON_4_DOWN, RI_MOUSE_BUTTON_4_UP, BTN_SIDE),
    (RI_MOUSE_BUTTON_5_DOWN, RI_MOUSE_BUTTON_5_UP, BTN_EXTRA),
];

/// Boot-protocol button bit → evdev code.
const BOOT_BUTTONS: [u16; 5] = [BTN_LEFT, BTN_RIGHT, BTN_MIDDLE, BTN_SIDE, BTN_EXTRA];

/// A decoded Raw-Input mouse packet.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MousePacket {
    /// Relative counts, or an absolute coordinate when `absolute` is set.
    pub dx: i32,
    pub dy: i32,
    /// `MOUSE_MOVE_ABSOLUTE`: `dx`/`dy` are positions in `0..=65535`.
    pub absolute: bool,
    /// `RI_MOUSE_*` transition flags.
    pub button_flags: u16,
    /// Vertical wheel in `WHEEL_DELTA` units; meaningful with `RI_MOUSE_WHEEL`.
    pub wheel_delta: i16,
    /// Horizontal wheel in `WHEEL_DELTA` units; meaningful with `RI_MOUSE_HWHEEL`.
    pub hwheel_delta: i16,
}

/// Per-device Raw-Input translator. Keeps partial wheel detents between packets.
#[derive(Clone, Debug, Default)]
pub struct RawMouseTranslator {
    wheel_remainder: i32,
    hwheel_remainder: i32,
}

impl RawMouseTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the events for one packet, closed by `SYN_REPORT`.
    pub fn translate(
        &mut self,
        when: Nsecs,
        device_id: DeviceId,
        packet: &MousePacket,
        out: &mut Vec<RawEvent>,
    ) {
        let ev = |kind, code, value| RawEvent::new(when, device_id, kind, code, value);

        if packet.absolute {
            out.push(ev(EV_ABS, ABS_X, packet.dx));
            out.push(ev(EV_ABS, ABS_Y, packet.dy));
        } else {
            if packet.dx != 0 {
                out.push(ev(EV_REL, REL_X, packet.dx));
            }
            if packet.dy != 0 {
                out.push(ev(EV_REL, REL_Y, packet.dy));
            }
        }

        for (down, up, code) in RAW_BUTTONS {
            if packet.button_flags & down != 0 {
                out.push(ev(EV_KEY, code, 1));
            }
            if packet.button_flags & up != 0 {
                out.push(ev(EV_KEY, code, 0));
            }
        }

        if packet.button_flags & RI_MOUSE_WHEEL != 0 {
            let detents = take_detents(&mut self.wheel_remainder, packet.wheel_delta);
            if detents != 0 {
                out.push(ev(EV_REL, REL_WHEEL, detents));
            }
        }
        if packet.button_flags & RI_MOUSE_HWHEEL != 0 {
            let detents = take_detents(&mut self.hwheel_remainder, packet.hwheel_delta);
            if detents != 0 {
                out.push(ev(EV_REL, REL_HWHEEL, detents));
            }
        }

        out.push(RawEvent::sync(when, device_id));
    }
}

fn take_detents(remainder: &mut i32, delta: i16) -> i32 {
    *remainder += i32::from(delta);
    let detents = *remainder / WHEEL_DELTA;
    *remainder -= detents * WHEEL_DELTA;
    detents
}

/// A HID boot-protocol mouse report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BootMouseReport {
    pub buttons: u8,
    pub dx: i8,
    pub dy: i8,
    pub wheel: i8,
}

impl BootMouseReport {
    /// Parses `[buttons, dx, dy, (wheel)]`. Reports shorter than three bytes are rejected.
    pub fn parse(report: &[u8]) -> Option<Self> {
        match report {
            [buttons, dx, dy, rest @ ..] => Some(Self {
                buttons: *buttons,
                dx: *dx as i8,
                dy: *dy as i8,
                wheel: rest.first().map_or(0, |&w| w as i8),
            }),
            _ => None,
        }
    }
}

/// Per-device boot-protocol translator. Reports carry button levels, so it remembers the
/// previous bitmap to emit only transitions.
#[derive(Clone, Debug, Default)]
pub struct BootMouseTranslator {
    last_buttons: u8,
}

impl BootMouseTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(
        &mut self,
        when: Nsecs,
        device_id: DeviceId,
        report: &BootMouseReport,
        out: &mut Vec<RawEvent>,
    ) {
        let ev = |kind, code, value| RawEvent::new(when, device_id, kind, code, value);

        if report.dx != 0 {
            out.push(ev(EV_REL, REL_X, i32::from(report.dx)));
        }
        if report.dy != 0 {
            out.push(ev(EV_REL, REL_Y, i32::from(report.dy)));
        }
        if report.wheel != 0 {
            out.push(ev(EV_REL, REL_WHEEL, i32::from(report.wheel)));
        }

        let changed = report.buttons ^ self.last_buttons;
        for (bit, &code) in BOOT_BUTTONS.iter().enumerate() {
            let mask = 1u8 << bit;
            if changed & mask != 0 {
                out.push(ev(EV_KEY, code, i32::from(report.buttons & mask != 0)));
            }
        }
        self.last_buttons = report.buttons;

        out.push(RawEvent::sync(when, device_id));
    }
}
