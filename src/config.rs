//! Configuration: the runtime bundle the reader hands to mappers, per-device settings and
//! pipeline knobs.
//!
//! Three layers, from most to least dynamic:
//! - [`InputReaderConfiguration`]: a read-only snapshot obtained from the
//!   [`InputReaderPolicy`](crate::reader::InputReaderPolicy). Each refresh comes with a
//!   [`ConfigurationChanges`] mask naming the fields that moved.
//! - [`DeviceConfiguration`]: per-device properties (operating mode, orientation awareness),
//!   usually loaded from a small TOML file keyed by the device identity.
//! - [`ManagerSettings`]: queue depth and timeouts for the reader/dispatcher pipeline.
//!
//! # Example
//! ```
//! use trackmap::config::{CursorMode, DeviceConfiguration};
//!
//! let cfg = DeviceConfiguration::from_toml_str(r#"
//!     [cursor]
//!     mode = "navigation"
//!     orientation_aware = true
//! "#).unwrap();
//! assert_eq!(cfg.cursor.mode, CursorMode::Navigation);
//! ```

use crate::error::Result;
use crate::metadata::DeviceIdentifier;
use crate::velocity::VelocityControlParameters;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Logical display identifier.
pub type DisplayId = i32;

/// Display rotation, clockwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Rotation0,
    Rotation90,
    Rotation180,
    Rotation270,
}

impl Orientation {
    /// Maps a degree value (any multiple of 90, possibly negative) to an orientation.
    /// Other values yield `None`.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(match degrees.rem_euclid(360) {
            0 => Orientation::Rotation0,
            90 => Orientation::Rotation90,
            180 => Orientation::Rotation180,
            _ => Orientation::Rotation270,
        })
    }

    pub fn degrees(self) -> i32 {
        match self {
            Orientation::Rotation0 => 0,
            Orientation::Rotation90 => 90,
            Orientation::Rotation180 => 180,
            Orientation::Rotation270 => 270,
        }
    }
}

bitflags! {
    /// Which fields of [`InputReaderConfiguration`] changed.
    ///
    /// An empty mask means "initial configuration": every field is applied.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ConfigurationChanges: u32 {
        const POINTER_SPEED = 1 << 0;
        const DISPLAY_INFO = 1 << 2;
        /// Device aliases / identity strings were updated. Handled by the device, not mappers.
        const DEVICE_ALIAS = 1 << 5;
        const POINTER_CAPTURE = 1 << 9;
        /// Devices must be reopened from scratch.
        const MUST_REOPEN = 1 << 31;
    }
}

/// Snapshot of the runtime settings mappers read during `configure`.
#[derive(Clone, Debug, PartialEq)]
pub struct InputReaderConfiguration {
    /// Orientation of the display pointer devices are associated with.
    pub display_orientation: Orientation,
    /// Display that pointer-mode devices move a cursor on; `None` when no display is up.
    pub display_association: Option<DisplayId>,
    /// User pointer speed in `[-7, 7]`; `0` is the neutral setting.
    pub pointer_speed: i32,
    /// When set, pointer-mode mice report relative motion and stop moving the cursor.
    pub pointer_capture_enabled: bool,
    /// Base acceleration curve for mouse pointers (speed scale is applied on top).
    pub pointer_velocity: VelocityControlParameters,
    /// Acceleration curve shared by both scroll wheels.
    pub wheel_velocity: VelocityControlParameters,
}

impl Default for InputReaderConfiguration {
    fn default() -> Self {
        Self {
            display_orientation: Orientation::Rotation0,
            display_association: None,
            pointer_speed: 0,
            pointer_capture_enabled: false,
            pointer_velocity: VelocityControlParameters::pointer(),
            wheel_velocity: VelocityControlParameters::wheel(),
        }
    }
}

/// Exponent applied to `pointer_speed` to get the velocity scale (`2^(speed / 4)`).
const POINTER_SPEED_EXPONENT: f32 = 1.0 / 4.0;

impl InputReaderConfiguration {
    pub const MIN_POINTER_SPEED: i32 = -7;
    pub const MAX_POINTER_SPEED: i32 = 7;

    /// Pointer velocity parameters with the user speed folded into the scale.
    pub fn pointer_velocity_parameters(&self) -> VelocityControlParameters {
        let speed = self
            .pointer_speed
            .clamp(Self::MIN_POINTER_SPEED, Self::MAX_POINTER_SPEED);
        let mut params = self.pointer_velocity;
        params.scale *= (speed as f32 * POINTER_SPEED_EXPONENT).exp2();
        params
    }
}

/// How a cursor device behaves, as declared in its device configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorMode {
    /// Moves an on-screen pointer (mice).
    #[default]
    Pointer,
    /// Produces directional keys (trackballs used as a d-pad).
    Navigation,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorSection {
    pub mode: CursorMode,
    /// Rotate motion to follow the associated display's orientation.
    pub orientation_aware: bool,
}

/// Per-device properties.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfiguration {
    pub cursor: CursorSection,
}

impl DeviceConfiguration {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Looks for `dir/<identifier.config_file_name()>`. A missing file is `Ok(None)`.
    pub fn find(dir: impl AsRef<Path>, identifier: &DeviceIdentifier) -> Result<Option<Self>> {
        let path = dir.as_ref().join(identifier.config_file_name());
        match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_toml_str(&text).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Reader/dispatcher pipeline knobs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Bounded depth of the reader → dispatcher queue.
    pub queue_capacity: usize,
    /// How long a post may block on a full queue before the event is dropped.
    pub post_timeout_ms: u64,
    /// Upper bound on a single device-source wait; also bounds stop latency.
    pub poll_timeout_ms: u64,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            post_timeout_ms: 5,
            poll_timeout_ms: 50,
        }
    }
}

impl ManagerSettings {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn post_timeout(&self) -> Duration {
        Duration::from_millis(self.post_timeout_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
