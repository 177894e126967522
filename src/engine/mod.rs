//! Speech engine boundary.
//!
//! A [`RecognitionEngine`] is the platform recogniser: something that can be
//! told to start and stop listening and that reports what it hears as a stream
//! of [`EngineEvent`]s.  Engines receive an [`EventSender`] when they are
//! constructed and publish every lifecycle change, error and result on it.
//! Nothing is shared through global mutable state; the session that owns the
//! engine is the only caller of `start` / `stop`.
//!
//! ```text
//!  RecognitionEngine ──EngineEvent (mpsc)──▶ VoiceController::run
//!        ▲                                        │
//!        └──── start() / stop() ── RecognitionSession ◀┘
//! ```
//!
//! [`ConsoleEngine`] is a real engine that reads utterances from stdin.
//! [`MockEngine`] (available under `#[cfg(test)]`) records the calls made to it.

pub mod console;

use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc;

pub use console::ConsoleEngine;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One candidate transcript for an utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct Alternative {
    pub transcript: String,
    /// Engine confidence in `[0.0, 1.0]`.
    pub confidence: f32,
}

impl Alternative {
    pub fn new(transcript: impl Into<String>, confidence: f32) -> Self {
        Self {
            transcript: transcript.into(),
            confidence,
        }
    }
}

/// A recognised utterance with its alternatives, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechResult {
    pub alternatives: Vec<Alternative>,
    /// `false` while the engine may still revise the utterance.
    pub is_final: bool,
}

impl SpeechResult {
    /// A result carrying a single alternative.
    pub fn single(transcript: impl Into<String>, confidence: f32, is_final: bool) -> Self {
        Self {
            alternatives: vec![Alternative::new(transcript, confidence)],
            is_final,
        }
    }

    /// The engine's best guess, if it produced any.
    pub fn top(&self) -> Option<&Alternative> {
        self.alternatives.first()
    }
}

// ---------------------------------------------------------------------------
// EngineErrorKind
// ---------------------------------------------------------------------------

/// Error kinds reported asynchronously by an engine.
///
/// The codes follow the ones speech engines commonly report
/// (`not-allowed`, `no-speech`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineErrorKind {
    /// The user or platform denied microphone access.
    AccessDenied,
    /// The recognition service itself refused the request.
    ServiceNotAllowed,
    /// No speech was detected before the engine gave up.
    NoSpeech,
    /// Listening was aborted.
    Aborted,
    /// Audio capture failed.
    AudioCapture,
    /// A network-backed engine lost its connection.
    Network,
    /// The requested language is not available.
    LanguageNotSupported,
    /// Any other engine-specific code.
    Other(String),
}

impl EngineErrorKind {
    /// Parse an engine error code.
    ///
    /// ```
    /// use voice_commands::engine::EngineErrorKind;
    ///
    /// assert_eq!(EngineErrorKind::from_code("not-allowed"), EngineErrorKind::AccessDenied);
    /// assert_eq!(EngineErrorKind::from_code("no-speech"), EngineErrorKind::NoSpeech);
    /// assert_eq!(
    ///     EngineErrorKind::from_code("weird"),
    ///     EngineErrorKind::Other("weird".into())
    /// );
    /// ```
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            // Some engines report the code with a space instead of a dash.
            "not-allowed" | "not allowed" => Self::AccessDenied,
            "service-not-allowed" => Self::ServiceNotAllowed,
            "no-speech" => Self::NoSpeech,
            "aborted" => Self::Aborted,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "language-not-supported" => Self::LanguageNotSupported,
            other => Self::Other(other.to_string()),
        }
    }

    /// The canonical code for this kind.
    pub fn code(&self) -> &str {
        match self {
            Self::AccessDenied => "not-allowed",
            Self::ServiceNotAllowed => "service-not-allowed",
            Self::NoSpeech => "no-speech",
            Self::Aborted => "aborted",
            Self::AudioCapture => "audio-capture",
            Self::Network => "network",
            Self::LanguageNotSupported => "language-not-supported",
            Self::Other(code) => code,
        }
    }

    /// `true` when the error must permanently disable auto-restart.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AccessDenied)
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// EngineEvent
// ---------------------------------------------------------------------------

/// Everything an engine reports, in the order it happens.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// The engine began listening.
    Started,
    /// The engine stopped listening, whether asked to or not.
    Ended,
    /// The engine hit an error.  Usually followed by [`EngineEvent::Ended`].
    Error(EngineErrorKind),
    /// New or revised results.  `index` points at the result that changed.
    Result {
        index: usize,
        results: Vec<SpeechResult>,
    },
}

impl EngineEvent {
    /// A result event holding a single one-alternative result at index 0.
    pub fn single_result(transcript: impl Into<String>, confidence: f32, is_final: bool) -> Self {
        Self::Result {
            index: 0,
            results: vec![SpeechResult::single(transcript, confidence, is_final)],
        }
    }
}

pub type EventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Create the channel an engine publishes its events on.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Synchronous failures of an engine request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// `start` was called while the engine was already listening.
    #[error("recognition has already started")]
    AlreadyStarted,

    /// The engine's input source is gone and it cannot listen again.
    #[error("recognition engine input is closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// RecognitionEngine trait
// ---------------------------------------------------------------------------

/// A continuously running speech recogniser.
///
/// `start` and `stop` only issue requests.  Their effect is observed later
/// through [`EngineEvent::Started`] and [`EngineEvent::Ended`].
pub trait RecognitionEngine: Send {
    /// Keep listening across utterances instead of ending after the first one.
    fn set_continuous(&mut self, continuous: bool);

    /// Upper bound on the alternatives reported per result.
    fn set_max_alternatives(&mut self, max: u32);

    /// Ask the engine to begin listening.
    fn start(&mut self) -> Result<(), EngineError>;

    /// Ask the engine to stop listening.  Safe to call when not listening.
    fn stop(&mut self);
}

// Compile-time assertion: Box<dyn RecognitionEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn RecognitionEngine>) {}
};

// ---------------------------------------------------------------------------
// MockEngine  (test-only)
// ---------------------------------------------------------------------------

/// What a [`MockEngine`] has been asked to do.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockCalls {
    pub starts: usize,
    pub stops: usize,
    pub continuous: Option<bool>,
    pub max_alternatives: Option<u32>,
}

/// A test double that records requests and never emits events by itself.
///
/// Tests feed events to the session directly, which lets them interleave
/// lifecycle events with caller requests in any order.
#[cfg(test)]
#[derive(Default)]
pub struct MockEngine {
    calls: std::sync::Arc<std::sync::Mutex<MockCalls>>,
    start_error: Option<EngineError>,
}

#[cfg(test)]
impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock whose `start` always fails with `error`.
    pub fn failing(error: EngineError) -> Self {
        Self {
            calls: Default::default(),
            start_error: Some(error),
        }
    }

    /// Shared view of the recorded calls; stays valid after the engine is moved.
    pub fn calls(&self) -> std::sync::Arc<std::sync::Mutex<MockCalls>> {
        std::sync::Arc::clone(&self.calls)
    }
}

#[cfg(test)]
impl RecognitionEngine for MockEngine {
    fn set_continuous(&mut self, continuous: bool) {
        self.calls.lock().unwrap().continuous = Some(continuous);
    }

    fn set_max_alternatives(&mut self, max: u32) {
        self.calls.lock().unwrap().max_alternatives = Some(max);
    }

    fn start(&mut self) -> Result<(), EngineError> {
        self.calls.lock().unwrap().starts += 1;
        match &self.start_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn stop(&mut self) {
        self.calls.lock().unwrap().stops += 1;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_not_allowed_spelling_is_access_denied() {
        assert_eq!(
            EngineErrorKind::from_code("not allowed"),
            EngineErrorKind::AccessDenied
        );
    }

    #[test]
    fn only_access_denied_is_terminal() {
        assert!(EngineErrorKind::AccessDenied.is_terminal());
        for kind in [
            EngineErrorKind::ServiceNotAllowed,
            EngineErrorKind::NoSpeech,
            EngineErrorKind::Aborted,
            EngineErrorKind::AudioCapture,
            EngineErrorKind::Network,
            EngineErrorKind::LanguageNotSupported,
            EngineErrorKind::Other("x".into()),
        ] {
            assert!(!kind.is_terminal(), "{kind} must not be terminal");
        }
    }

    #[test]
    fn code_parses_back_to_same_kind() {
        for code in [
            "not-allowed",
            "service-not-allowed",
            "no-speech",
            "aborted",
            "audio-capture",
            "network",
            "language-not-supported",
            "bad-grammar",
        ] {
            assert_eq!(EngineErrorKind::from_code(code).code(), code);
        }
    }

    #[test]
    fn top_is_first_alternative() {
        let result = SpeechResult {
            alternatives: vec![Alternative::new("next", 0.9), Alternative::new("text", 0.4)],
            is_final: true,
        };
        assert_eq!(result.top().map(|a| a.transcript.as_str()), Some("next"));

        let empty = SpeechResult {
            alternatives: Vec::new(),
            is_final: true,
        };
        assert!(empty.top().is_none());
    }

    #[test]
    fn mock_records_calls() {
        let mut engine = MockEngine::new();
        let calls = engine.calls();

        engine.set_continuous(true);
        engine.set_max_alternatives(3);
        engine.start().unwrap();
        engine.stop();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.starts, 1);
        assert_eq!(calls.stops, 1);
        assert_eq!(calls.continuous, Some(true));
        assert_eq!(calls.max_alternatives, Some(3));
    }

    #[test]
    fn default_mock_starts_cleanly() {
        let mut engine = MockEngine::default();
        assert_eq!(engine.start(), Ok(()));
        assert_eq!(engine.calls().lock().unwrap().starts, 1);
    }

    #[test]
    fn failing_mock_returns_configured_error() {
        let mut engine = MockEngine::failing(EngineError::Closed);
        assert_eq!(engine.start(), Err(EngineError::Closed));
    }

    #[test]
    fn engine_error_display() {
        assert!(EngineError::AlreadyStarted.to_string().contains("already"));
    }
}
