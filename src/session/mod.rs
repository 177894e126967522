//! Recognition session lifecycle.
//!
//! [`RecognitionSession`] owns one [`RecognitionEngine`] for its whole life and
//! keeps it listening: explicit `start()` / `stop()` calls record the caller's
//! intent, and engine lifecycle events drive the state machine in
//! [`SessionState`].  When the engine drops a session on its own (silence,
//! transient errors) and the caller still wants to listen, the session issues
//! a fresh start request.  Access denial is the one error that ends that loop.
//!
//! Finalized utterances leave the session as [`RecognitionResult`]s through
//! the handler registered with [`RecognitionSession::set_result_handler`].
//!
//! [`RecognitionEngine`]: crate::engine::RecognitionEngine

mod recognition;
mod state;

pub use recognition::{
    ApplyHook, RecognitionResult, RecognitionSession, ResultHandler, SessionError, SessionStats,
};
pub use state::SessionState;
