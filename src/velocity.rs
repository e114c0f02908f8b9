//! Velocity-dependent gain for relative motion.
//!
//! [`VelocityControl`] keeps a smoothed estimate of how fast an axis (or an axis pair) is
//! moving and scales each new delta by a gain picked from that speed:
//!
//! ```text
//!  gain
//!   ^
//!   |                 ____________  scale * acceleration
//!   |               /
//!   |             /
//!   |___________/                   scale
//!   +-----------+-----+-----------> speed (counts/s)
//!             low   high
//! ```
//!
//! The estimate is an exponentially smoothed instantaneous speed. Any gap longer than
//! [`STOP_TIME`] between two movements drops it back to zero, so a fresh gesture always
//! starts at the base gain. The transform never fails: non-finite results collapse to
//! zero and the output is clamped to [`MAX_OUTPUT`].

use crate::event::Nsecs;
use serde::{Deserialize, Serialize};

/// Idle gap after which the velocity estimate is discarded (300 ms).
pub const STOP_TIME: Nsecs = 300 * 1_000_000;

/// Weight of the newest sample in the smoothed speed.
const SMOOTHING: f32 = 0.5;

/// Saturation bound for a single scaled delta.
pub const MAX_OUTPUT: f32 = 1.0e6;

/// Gain curve configuration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VelocityControlParameters {
    /// Gain applied at or below `low_threshold`.
    pub scale: f32,
    /// Speed (counts/s) where acceleration starts.
    pub low_threshold: f32,
    /// Speed (counts/s) where acceleration is fully applied.
    pub high_threshold: f32,
    /// Extra multiplier reached at `high_threshold`. `1.0` disables acceleration.
    pub acceleration: f32,
}

impl Default for VelocityControlParameters {
    /// Identity: every delta passes through unchanged.
    fn default() -> Self {
        Self::new(1.0, 500.0, 3000.0, 1.0)
    }
}

impl VelocityControlParameters {
    pub const fn new(
        scale: f32,
        low_threshold: f32,
        high_threshold: f32,
        acceleration: f32,
    ) -> Self {
        Self {
            scale,
            low_threshold,
            high_threshold,
            acceleration,
        }
    }

    /// Default mouse pointer curve.
    pub const fn pointer() -> Self {
        Self::new(1.0, 500.0, 3000.0, 3.0)
    }

    /// Default scroll wheel curve.
    pub const fn wheel() -> Self {
        Self::new(1.0, 15.0, 50.0, 4.0)
    }

    /// Gain for a given speed.
    pub fn gain(&self, speed: f32) -> f32 {
        let mut gain = self.scale;
        if speed >= self.high_threshold {
            gain *= self.acceleration;
        } else if speed > self.low_threshold {
            let t = (speed - self.low_threshold) / (self.high_threshold - self.low_threshold);
            gain *= 1.0 + t * (self.acceleration - 1.0);
        }
        gain
    }
}

/// Smoothed per-axis (or joint XY) velocity gain.
#[derive(Clone, Debug, Default)]
pub struct VelocityControl {
    params: VelocityControlParameters,
    last_movement_time: Option<Nsecs>,
    speed: f32,
}

impl VelocityControl {
    pub fn new(params: VelocityControlParameters) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn parameters(&self) -> VelocityControlParameters {
        self.params
    }

    /// Swaps the gain curve. The speed estimate restarts when the curve actually changes.
    pub fn set_parameters(&mut self, params: VelocityControlParameters) {
        if self.params != params {
            self.params = params;
            self.reset();
        }
    }

    /// Forgets all motion history.
    pub fn reset(&mut self) {
        self.last_movement_time = None;
        self.speed = 0.0;
    }

    /// Current smoothed speed estimate in counts per second.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Scales the given deltas in place. Either axis may be absent (single-axis wheels).
    /// A call with no motion on any axis leaves the state untouched.
    pub fn apply(&mut self, when: Nsecs, dx: Option<&mut f32>, dy: Option<&mut f32>) {
        let x = dx.as_deref().copied().unwrap_or(0.0);
        let y = dy.as_deref().copied().unwrap_or(0.0);
        if x == 0.0 && y == 0.0 {
            return;
        }

        match self.last_movement_time {
            Some(last) if when > last && when - last < STOP_TIME => {
                let dt = (when - last) as f32 / 1.0e9;
                let instant = x.hypot(y) / dt;
                self.speed += SMOOTHING * (instant - self.speed);
            }
            // Same-timestamp batch: keep the estimate.
            Some(last) if when == last => {}
            _ => self.speed = 0.0,
        }
        self.last_movement_time = Some(when);

        let gain = self.params.gain(self.speed);
        if let Some(dx) = dx {
            *dx = saturate(*dx * gain);
        }
        if let Some(dy) = dy {
            *dy = saturate(*dy * gain);
        }
    }
}

fn saturate(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(-MAX_OUTPUT, MAX_OUTPUT)
    }
}
