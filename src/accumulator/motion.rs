use crate::device::DeviceContext;
use crate::event::{RawEvent, EV_REL, REL_X, REL_Y};

/// Sums relative X/Y counts within one sync window.
#[derive(Clone, Debug, Default)]
pub struct CursorMotionAccumulator {
    rel_x: i32,
    rel_y: i32,
}

impl CursorMotionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, _ctx: &dyn DeviceContext) {
        self.clear_relative_axes();
    }

    pub fn process(&mut self, raw: &RawEvent) {
        if raw.kind != EV_REL {
            return;
        }
        match raw.code {
            REL_X => self.rel_x = self.rel_x.saturating_add(raw.value),
            REL_Y => self.rel_y = self.rel_y.saturating_add(raw.value),
            _ => {}
        }
    }

    pub fn finish_sync(&mut self) {
        self.clear_relative_axes();
    }

    #[inline]
    pub fn relative_x(&self) -> i32 {
        self.rel_x
    }

    #[inline]
    pub fn relative_y(&self) -> i32 {
        self.rel_y
    }

    fn clear_relative_axes(&mut self) {
        self.rel_x = 0;
        self.rel_y = 0;
    }
}
