use crate::device::DeviceContext;
use crate::event::{RawEvent, EV_REL, REL_HWHEEL, REL_WHEEL};

/// Sums vertical and horizontal wheel detents within one sync window.
#[derive(Clone, Debug, Default)]
pub struct CursorScrollAccumulator {
    have_wheel: bool,
    have_hwheel: bool,
    wheel: i32,
    hwheel: i32,
}

impl CursorScrollAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, ctx: &dyn DeviceContext) {
        self.have_wheel = ctx.has_relative_axis(REL_WHEEL);
        self.have_hwheel = ctx.has_relative_axis(REL_HWHEEL);
        self.clear_relative_axes();
    }

    pub fn process(&mut self, raw: &RawEvent) {
        if raw.kind != EV_REL {
            return;
        }
        match raw.code {
            REL_WHEEL => self.wheel = self.wheel.saturating_add(raw.value),
            REL_HWHEEL => self.hwheel = self.hwheel.saturating_add(raw.value),
            _ => {}
        }
    }

    pub fn finish_sync(&mut self) {
        self.clear_relative_axes();
    }

    pub fn have_wheel(&self) -> bool {
        self.have_wheel
    }

    pub fn have_hwheel(&self) -> bool {
        self.have_hwheel
    }

    #[inline]
    pub fn relative_vwheel(&self) -> i32 {
        self.wheel
    }

    #[inline]
    pub fn relative_hwheel(&self) -> i32 {
        self.hwheel
    }

    fn clear_relative_axes(&mut self) {
        self.wheel = 0;
        self.hwheel = 0;
    }
}
