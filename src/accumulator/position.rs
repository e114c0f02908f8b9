use crate::device::{AbsoluteAxisInfo, DeviceContext};
use crate::event::{RawEvent, ABS_X, ABS_Y, EV_ABS};

/// Last absolute X/Y reported by devices that have absolute axes.
///
/// The position persists across windows; the "reported this window" marks do not.
#[derive(Clone, Debug, Default)]
pub struct CursorPositionAccumulator {
    x: i32,
    y: i32,
    x_reported: bool,
    y_reported: bool,
    x_axis: Option<AbsoluteAxisInfo>,
    y_axis: Option<AbsoluteAxisInfo>,
}

impl CursorPositionAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self, ctx: &dyn DeviceContext) {
        self.x_axis = ctx.absolute_axis_info(ABS_X);
        self.y_axis = ctx.absolute_axis_info(ABS_Y);
        self.x = 0;
        self.y = 0;
        self.clear_marks();
    }

    pub fn process(&mut self, raw: &RawEvent) {
        if raw.kind != EV_ABS {
            return;
        }
        match raw.code {
            ABS_X => {
                self.x = raw.value;
                self.x_reported = true;
            }
            ABS_Y => {
                self.y = raw.value;
                self.y_reported = true;
            }
            _ => {}
        }
    }

    pub fn finish_sync(&mut self) {
        self.clear_marks();
    }

    #[inline]
    pub fn x(&self) -> i32 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> i32 {
        self.y
    }

    /// Whether either coordinate arrived in the current window.
    pub fn reported(&self) -> bool {
        self.x_reported || self.y_reported
    }

    /// Whether the device advertises both absolute axes.
    pub fn has_absolute(&self) -> bool {
        self.x_axis.is_some() && self.y_axis.is_some()
    }

    /// Current position mapped onto `0..=max_x` / `0..=max_y`.
    ///
    /// Without declared ranges (or with an empty range) the raw values are taken as
    /// display coordinates.
    pub fn scaled(&self, max_x: f32, max_y: f32) -> (f32, f32) {
        (
            scale_axis(self.x, self.x_axis, max_x),
            scale_axis(self.y, self.y_axis, max_y),
        )
    }

    #[inline]
    fn clear_marks(&mut self) {
        self.x_reported = false;
        self.y_reported = false;
    }
}

fn scale_axis(value: i32, axis: Option<AbsoluteAxisInfo>, max: f32) -> f32 {
    match axis {
        Some(a) if a.max > a.min => {
            let t = f64::from(value.clamp(a.min, a.max)) - f64::from(a.min);
            (t * f64::from(max) / (f64::from(a.max) - f64::from(a.min))) as f32
        }
        _ => value as f32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests::TestContext;
    use crate::event::*;

    #[test]
    fn tracks_last_position_across_windows() {
        let mut acc = CursorPositionAccumulator::new();
        acc.reset(&TestContext {
            absolute_axes: vec![
                AbsoluteAxisInfo::new(ABS_X, 0, 1919),
                AbsoluteAxisInfo::new(ABS_Y, 0, 1079),
            ],
            ..TestContext::default()
        });
        assert!(acc.has_absolute());

        acc.process(&RawEvent::new(0, 1, EV_ABS, ABS_X, 120));
        assert!(acc.reported());
        acc.finish_sync();
        assert!(!acc.reported());

        acc.process(&RawEvent::new(0, 1, EV_ABS, ABS_Y, 40));
        assert_eq!((acc.x(), acc.y()), (120, 40));
    }

    #[test]
    fn relative_devices_have_no_position() {
        let mut acc = CursorPositionAccumulator::new();
        acc.reset(&TestContext::default());
        acc.process(&RawEvent::new(0, 1, EV_REL, REL_X, 5));
        assert!(!acc.has_absolute());
        assert!(!acc.reported());
    }

    #[test]
    fn scales_declared_range_onto_display() {
        let mut acc = CursorPositionAccumulator::new();
        acc.reset(&TestContext {
            absolute_axes: vec![
                AbsoluteAxisInfo::new(ABS_X, 0, 65535),
                AbsoluteAxisInfo::new(ABS_Y, 0, 65535),
            ],
            ..TestContext::default()
        });
        acc.process(&RawEvent::new(0, 1, EV_ABS, ABS_X, 13107));
        acc.process(&RawEvent::new(0, 1, EV_ABS, ABS_Y, 65535));
        assert_eq!(acc.scaled(1000.0, 500.0), (200.0, 500.0));

        acc.process(&RawEvent::new(0, 1, EV_ABS, ABS_X, -40));
        assert_eq!(acc.scaled(1000.0, 500.0).0, 0.0);
    }

    #[test]
    fn undeclared_range_passes_values_through() {
        let mut acc = CursorPositionAccumulator::new();
        acc.reset(&TestContext::default());
        acc.process(&RawEvent::new(0, 1, EV_ABS, ABS_X, 300));
        assert_eq!(acc.scaled(99.0, 99.0).0, 300.0);
    }
}
