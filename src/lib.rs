//! trackmap: reader-side cursor input mapping.
//!
//! Turns raw relative-pointer input (mice, trackballs) into pointer, scroll and d-pad
//! events, applying per-device configuration, display orientation and velocity-based
//! acceleration, and hands the results one-way to a dispatcher thread.
//!
//! Start with [`InputManager`] for the threaded pipeline, or drive an
//! [`InputReader`](reader::InputReader) by hand. Devices arrive through a
//! [`DeviceSource`](backends::DeviceSource).

pub mod accumulator;
pub mod backends;
pub mod config;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod listener;
pub mod manager;
pub mod mapper;
pub mod metadata;
pub mod notify;
pub mod pointer;
pub mod reader;
pub mod snapshot;
pub mod velocity;

pub use error::{InputError, Result};
pub use event::*;
pub use manager::InputManager;
pub use notify::*;
