//! Pointer-icon position shared between cursor mappers and the display side.
//!
//! The display/window system owns the cursor sprite and the display bounds; mappers only
//! nudge the position. Both sides may call into a controller at the same time, so every
//! implementation must be internally synchronized.
//!
//! Ownership: the [`InputReaderPolicy`](crate::reader::InputReaderPolicy) hands out
//! `Arc<dyn PointerController>`; mappers keep only a `Weak` and skip cursor updates once
//! the display side has dropped the controller.

use crate::config::DisplayId;
use crate::notify::MotionButtons;
use parking_lot::Mutex;

/// Cursor position interface consumed by pointer-mode mappers.
pub trait PointerController: Send + Sync {
    /// Warps the cursor. Implementations clamp to their display bounds.
    fn set_position(&self, x: f32, y: f32);

    fn position(&self) -> (f32, f32);

    /// Largest position the cursor can take, `(max_x, max_y)`, when the display is known.
    fn bounds(&self) -> Option<(f32, f32)> {
        None
    }

    /// Moves the cursor by a delta.
    ///
    /// The default reads then writes; implementations with a lock should override it so the
    /// move is atomic with respect to concurrent display-side updates.
    fn move_by(&self, dx: f32, dy: f32) {
        let (x, y) = self.position();
        self.set_position(x + dx, y + dy);
    }

    /// Buttons currently held, for cursor presentation.
    fn set_button_state(&self, _buttons: MotionButtons) {}

    /// Display the cursor is shown on.
    fn display_id(&self) -> Option<DisplayId>;
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Bounds {
    max_x: f32,
    max_y: f32,
}

#[derive(Debug, Default)]
struct PointerState {
    x: f32,
    y: f32,
    bounds: Option<Bounds>,
    display_id: Option<DisplayId>,
    buttons: MotionButtons,
}

impl PointerState {
    fn clamp(&mut self) {
        if let Some(b) = self.bounds {
            self.x = self.x.clamp(0.0, b.max_x);
            self.y = self.y.clamp(0.0, b.max_y);
        }
    }
}

/// Thread-safe controller that keeps the cursor inside a `width × height` display.
///
/// Until the display side calls [`set_display`](Self::set_display), positions are not
/// clamped and no display id is reported.
#[derive(Debug, Default)]
pub struct BoundedPointerController {
    state: Mutex<PointerState>,
}

impl BoundedPointerController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Display-side update: attach to a display and re-clamp the current position.
    pub fn set_display(&self, display_id: DisplayId, width: u32, height: u32) {
        let mut state = self.state.lock();
        state.display_id = Some(display_id);
        state.bounds = Some(Bounds {
            max_x: width.saturating_sub(1) as f32,
            max_y: height.saturating_sub(1) as f32,
        });
        state.clamp();
    }

    pub fn button_state(&self) -> MotionButtons {
        self.state.lock().buttons
    }
}

impl PointerController for BoundedPointerController {
    fn set_position(&self, x: f32, y: f32) {
        let mut state = self.state.lock();
        state.x = x;
        state.y = y;
        state.clamp();
    }

    fn position(&self) -> (f32, f32) {
        let state = self.state.lock();
        (state.x, state.y)
    }

    fn move_by(&self, dx: f32, dy: f32) {
        let mut state = self.state.lock();
        state.x += dx;
        state.y += dy;
        state.clamp();
    }

    fn set_button_state(&self, buttons: MotionButtons) {
        self.state.lock().buttons = buttons;
    }

    fn bounds(&self) -> Option<(f32, f32)> {
        self.state.lock().bounds.map(|b| (b.max_x, b.max_y))
    }

    fn display_id(&self) -> Option<DisplayId> {
        self.state.lock().display_id
    }
}
