//! Caller-side control of a recognition session.
//!
//! - [`VoiceController`] runs the session and router on one async task.
//! - [`SessionControl`] is the cloneable handle for start / stop requests.
//! - [`DelayedStart`] begins listening after a cancellable delay.

pub mod delay;
pub mod runner;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use delay::DelayedStart;
pub use runner::{ControlRequest, SessionControl, VoiceController};
