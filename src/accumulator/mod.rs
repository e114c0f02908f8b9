//! Per-device decoders that turn raw `(type, code, value)` tuples into one semantic quantity.
//!
//! Every accumulator follows the same small contract:
//! - `reset(ctx)` drops all state and re-reads device capabilities.
//! - `process(raw)` folds one raw event in. Codes outside the accumulator's slice are
//!   ignored, so every accumulator can be handed every event.
//! - `finish_sync()` ends a sync window. Window-scoped values (relative deltas, wheel
//!   deltas, "position reported" marks) are cleared here; persistent state (buttons, last
//!   absolute position) survives.
//!
//! The owning mapper reads the accessors between the last `process` of a window and
//! `finish_sync`, exactly once per window. Values are therefore counted in exactly one
//! synthesis pass.

mod button;
mod motion;
mod position;
mod scroll;

pub use button::CursorButtonAccumulator;
pub use motion::CursorMotionAccumulator;
pub use position::CursorPositionAccumulator;
pub use scroll::CursorScrollAccumulator;
