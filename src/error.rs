//! Crate error type.
//!
//! The mapping core (accumulators, velocity control, the cursor mapper) is total and never
//! fails. Everything fallible lives at the edges: device sources, configuration loading and
//! the reader/dispatcher thread lifecycle.

use crate::event::DeviceId;
use thiserror::Error;

/// Errors surfaced by the pipeline edges.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("input manager already started")]
    AlreadyStarted,

    #[error("input manager not started")]
    NotStarted,

    #[error("failed to spawn input thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),

    #[error("{0} thread panicked")]
    ThreadPanicked(&'static str),

    /// A previous `start` failed after handing the reader to a thread that never ran.
    #[error("input pipeline state lost; create a new manager")]
    PipelineLost,

    #[error("device source error: {0}")]
    Source(String),

    #[error("unknown device {0}")]
    DeviceNotFound(DeviceId),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, InputError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = InputError::Source("hidraw3 vanished".to_string());
        assert!(err.to_string().contains("hidraw3 vanished"));
        assert_eq!(
            InputError::DeviceNotFound(7).to_string(),
            "unknown device 7"
        );
    }

    #[test]
    fn toml_errors_convert() {
        let bad = toml::from_str::<toml::Value>("mode = ").unwrap_err();
        let err: InputError = bad.into();
        assert!(matches!(err, InputError::Config(_)));
    }
}
