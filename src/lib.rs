//! Voice command recognition.
//!
//! A continuously running speech engine feeds a [`RecognitionSession`], which
//! keeps the engine listening across silent terminations and forwards each
//! finalized utterance to a [`CommandRouter`].  The router runs the command
//! whose phrase matches exactly, or one of two fallback callbacks for
//! low-confidence and unmatched utterances.
//!
//! ```text
//! RecognitionEngine ─▶ RecognitionSession ─▶ CommandRouter ─▶ callbacks
//!        ▲                    ▲
//!        └─ start/stop ───────┴── VoiceController ◀── SessionControl / DelayedStart
//! ```
//!
//! [`RecognitionSession`]: session::RecognitionSession
//! [`CommandRouter`]: router::CommandRouter

pub mod config;
pub mod control;
pub mod engine;
pub mod router;
pub mod session;
