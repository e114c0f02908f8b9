use crate::device::DeviceContext;
use crate::event::{RawEvent, BTN_JOYSTICK, BTN_MOUSE, EV_KEY};
use crate::notify::MotionButtons;

/// Canonical button for each code in `BTN_MOUSE..BTN_JOYSTICK`, indexed by `code - BTN_MOUSE`.
///
/// Side/extra are the older names for back/forward and fold onto the same bits.
/// Codes past the table (and `BTN_TASK`) are tracked for scan-code queries but carry no
/// canonical button.
const BUTTON_TABLE: [MotionButtons; 8] = [
    MotionButtons::PRIMARY,   // BTN_LEFT
    MotionButtons::SECONDARY, // BTN_RIGHT
    MotionButtons::TERTIARY,  // BTN_MIDDLE
    MotionButtons::BACK,      // BTN_SIDE
    MotionButtons::FORWARD,   // BTN_EXTRA
    MotionButtons::FORWARD,   // BTN_FORWARD
    MotionButtons::BACK,      // BTN_BACK
    MotionButtons::empty(),   // BTN_TASK
];

/// Tracks which mouse buttons are held.
///
/// State persists across sync windows until a release arrives.
#[derive(Clone, Debug, Default)]
pub struct CursorButtonAccumulator {
    /// Bit `n` set = code `BTN_MOUSE + n` is down.
    pressed: u16,
}

impl CursorButtonAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, _ctx: &dyn DeviceContext) {
        self.pressed = 0;
    }

    pub fn process(&mut self, raw: &RawEvent) {
        if raw.kind != EV_KEY {
            return;
        }
        let Some(bit) = slot(raw.code) else {
            return;
        };
        if raw.value != 0 {
            self.pressed |= bit;
        } else {
            self.pressed &= !bit;
        }
    }

    pub fn finish_sync(&mut self) {}

    /// Canonical bitmask of held buttons.
    pub fn button_state(&self) -> MotionButtons {
        BUTTON_TABLE
            .iter()
            .enumerate()
            .filter(|&(i, _)| self.pressed & (1 << i) != 0)
            .fold(MotionButtons::empty(), |acc, (_, b)| acc | *b)
    }

    /// Whether the raw button code is held. Codes outside the mouse block are never held.
    pub fn is_pressed(&self, scan_code: u16) -> bool {
        slot(scan_code).is_some_and(|bit| self.pressed & bit != 0)
    }
}

#[inline]
fn slot(code: u16) -> Option<u16> {
    (BTN_MOUSE..BTN_JOYSTICK)
        .contains(&code)
        .then(|| 1 << (code - BTN_MOUSE))
}
