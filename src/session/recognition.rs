//! [`RecognitionSession`]: keeps one engine listening and surfaces its final results.

use thiserror::Error;

use super::state::SessionState;
use crate::config::RecognitionConfig;
use crate::engine::{EngineErrorKind, EngineEvent, RecognitionEngine, SpeechResult};

// ---------------------------------------------------------------------------
// RecognitionResult
// ---------------------------------------------------------------------------

/// A finalized utterance: the engine's best transcript and its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    pub transcript: String,
    /// Confidence in `[0.0, 1.0]`.
    pub confidence: f32,
    pub is_final: bool,
}

impl RecognitionResult {
    /// A final result, the only kind the session forwards.
    pub fn final_result(transcript: impl Into<String>, confidence: f32) -> Self {
        Self {
            transcript: transcript.into(),
            confidence,
            is_final: true,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionError
// ---------------------------------------------------------------------------

/// Synchronous session failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The platform has no recognition engine.
    #[error("Speech recognition is not supported")]
    Unsupported,
}

// ---------------------------------------------------------------------------
// SessionStats
// ---------------------------------------------------------------------------

/// Counters describing what a session has done so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Start requests issued to the engine, restarts included.
    pub starts_requested: usize,
    /// Start requests issued because the engine ended on its own.
    pub auto_restarts: usize,
    /// Final results handed to the result handler.
    pub results_dispatched: usize,
    /// Interim results dropped.
    pub interim_discarded: usize,
    /// Error events reported by the engine.
    pub engine_errors: usize,
}

// ---------------------------------------------------------------------------
// RecognitionSession
// ---------------------------------------------------------------------------

/// Consumer of final results.
pub type ResultHandler = Box<dyn FnMut(&RecognitionResult) + Send>;

/// Runs right after each dispatched result, in the same turn.
pub type ApplyHook = Box<dyn FnMut() + Send>;

/// Owns the lifecycle of one continuous recognition stream.
///
/// `start()` and `stop()` only issue requests; the state follows the engine's
/// lifecycle events fed in through [`handle_event`](Self::handle_event).
///
/// ```rust
/// use voice_commands::config::RecognitionConfig;
/// use voice_commands::session::{RecognitionSession, SessionError};
///
/// // A platform without an engine fails fast.
/// let mut session = RecognitionSession::new(None, &RecognitionConfig::default());
/// assert_eq!(session.start(), Err(SessionError::Unsupported));
/// ```
pub struct RecognitionSession {
    engine: Option<Box<dyn RecognitionEngine>>,
    state: SessionState,
    /// The caller's latest intent: `true` means keep listening.
    auto_restart: bool,
    on_result: Option<ResultHandler>,
    on_apply: Option<ApplyHook>,
    stats: SessionStats,
}

impl RecognitionSession {
    /// Create a session around `engine`, or around nothing when the platform
    /// offers no recogniser.
    pub fn new(engine: Option<Box<dyn RecognitionEngine>>, config: &RecognitionConfig) -> Self {
        let engine = engine.map(|mut engine| {
            engine.set_continuous(config.continuous);
            engine.set_max_alternatives(config.max_alternatives);
            engine
        });

        if engine.is_none() {
            log::warn!("session: no recognition engine available");
        }

        Self {
            engine,
            state: SessionState::Idle,
            auto_restart: false,
            on_result: None,
            on_apply: None,
            stats: SessionStats::default(),
        }
    }

    /// Register the consumer of final results, replacing any previous one.
    pub fn set_result_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&RecognitionResult) + Send + 'static,
    {
        self.on_result = Some(Box::new(handler));
    }

    /// Register the hook run after every dispatched result.
    pub fn set_apply_hook<F>(&mut self, hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.on_apply = Some(Box::new(hook));
    }

    pub fn is_supported(&self) -> bool {
        self.engine.is_some()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// `true` once the engine has confirmed it is listening.
    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    // -----------------------------------------------------------------------
    // Caller requests
    // -----------------------------------------------------------------------

    /// Start listening and keep listening until [`stop`](Self::stop).
    ///
    /// While a start is pending or the engine is running this only re-arms
    /// auto-restart; the engine is not asked to start again.
    ///
    /// # Errors
    ///
    /// [`SessionError::Unsupported`] when there is no engine.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.engine.is_none() {
            return Err(SessionError::Unsupported);
        }

        self.auto_restart = true;

        if self.state.is_active() {
            log::debug!("session: start ignored, already {}", self.state.label());
            return Ok(());
        }

        self.request_start();
        Ok(())
    }

    /// Stop listening and cancel any pending auto-restart.
    ///
    /// Safe to call in any state.  Results already in flight may still arrive.
    pub fn stop(&mut self) {
        self.auto_restart = false;

        if let Some(engine) = self.engine.as_mut() {
            log::debug!("session: stop requested ({})", self.state.label());
            engine.stop();
        }
    }

    // -----------------------------------------------------------------------
    // Engine events
    // -----------------------------------------------------------------------

    /// Apply one engine event.
    pub fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Started => self.on_started(),
            EngineEvent::Ended => self.on_ended(),
            EngineEvent::Error(kind) => self.on_error(kind),
            EngineEvent::Result { index, results } => self.on_results(index, &results),
        }
    }

    fn on_started(&mut self) {
        log::info!("session: listening");
        self.state = SessionState::Running;
    }

    fn on_ended(&mut self) {
        log::info!("session: engine ended");
        self.state = SessionState::Idle;

        // Engines drop continuous sessions after silence; resume if wanted.
        if self.auto_restart {
            self.stats.auto_restarts += 1;
            log::debug!("session: auto-restarting");
            self.request_start();
        }
    }

    fn on_error(&mut self, kind: EngineErrorKind) {
        self.stats.engine_errors += 1;

        if kind.is_terminal() {
            log::warn!("session: engine error `{kind}`, auto-restart disabled");
            self.auto_restart = false;
        } else {
            log::warn!("session: engine error `{kind}`");
        }
    }

    fn on_results(&mut self, index: usize, results: &[SpeechResult]) {
        let Some(result) = results.get(index) else {
            log::warn!(
                "session: result index {index} out of range ({} results)",
                results.len()
            );
            return;
        };

        let Some(top) = result.top() else {
            log::warn!("session: result {index} has no alternatives");
            return;
        };

        if !result.is_final {
            self.stats.interim_discarded += 1;
            log::trace!("session: interim {:?}", top.transcript);
            return;
        }

        let result = RecognitionResult {
            transcript: top.transcript.clone(),
            confidence: top.confidence,
            is_final: true,
        };
        log::debug!(
            "session: final {:?} (confidence {:.2})",
            result.transcript,
            result.confidence
        );

        match self.on_result.as_mut() {
            Some(handler) => handler(&result),
            None => log::debug!("session: no result handler registered"),
        }
        self.stats.results_dispatched += 1;

        if let Some(apply) = self.on_apply.as_mut() {
            apply();
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn request_start(&mut self) {
        let Some(engine) = self.engine.as_mut() else {
            return;
        };

        self.state = SessionState::Starting;
        self.stats.starts_requested += 1;

        if let Err(e) = engine.start() {
            log::warn!("session: engine refused to start: {e}");
            self.state = SessionState::Idle;
        }
    }
}

impl Drop for RecognitionSession {
    fn drop(&mut self) {
        if self.auto_restart {
            self.stop();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::engine::{Alternative, EngineError, MockCalls, MockEngine};

    fn session_with(engine: MockEngine) -> (RecognitionSession, Arc<Mutex<MockCalls>>) {
        let calls = engine.calls();
        let session = RecognitionSession::new(Some(Box::new(engine)), &RecognitionConfig::default());
        (session, calls)
    }

    fn session() -> (RecognitionSession, Arc<Mutex<MockCalls>>) {
        session_with(MockEngine::new())
    }

    fn capture(session: &mut RecognitionSession) -> Arc<Mutex<Vec<RecognitionResult>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        session.set_result_handler(move |result| sink.lock().unwrap().push(result.clone()));
        seen
    }

    fn starts(calls: &Arc<Mutex<MockCalls>>) -> usize {
        calls.lock().unwrap().starts
    }

    // ---- construction ---

    #[test]
    fn new_configures_engine() {
        let (_session, calls) = session();
        let calls = calls.lock().unwrap();
        assert_eq!(calls.continuous, Some(true));
        assert_eq!(calls.max_alternatives, Some(3));
    }

    #[test]
    fn unsupported_platform_fails_start_and_ignores_stop() {
        let mut session = RecognitionSession::new(None, &RecognitionConfig::default());
        assert!(!session.is_supported());
        assert_eq!(session.start(), Err(SessionError::Unsupported));
        assert!(!session.auto_restart());
        session.stop();
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn unsupported_error_message() {
        assert_eq!(
            SessionError::Unsupported.to_string(),
            "Speech recognition is not supported"
        );
    }

    // ---- start / stop ---

    #[test]
    fn start_twice_requests_engine_once() {
        let (mut session, calls) = session();

        session.start().unwrap();
        session.start().unwrap();
        assert_eq!(starts(&calls), 1);
        assert_eq!(session.state(), SessionState::Starting);

        session.handle_event(EngineEvent::Started);
        session.start().unwrap();
        assert_eq!(starts(&calls), 1);
        assert!(session.is_running());
        assert!(session.auto_restart());
    }

    #[test]
    fn stop_is_safe_when_idle() {
        let (mut session, calls) = session();
        session.stop();
        assert_eq!(calls.lock().unwrap().stops, 1);
        assert!(!session.auto_restart());
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn engine_refusing_start_falls_back_to_idle() {
        let (mut session, calls) = session_with(MockEngine::failing(EngineError::AlreadyStarted));

        assert!(session.start().is_ok());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.auto_restart());

        // Idle again, so the next explicit start retries.
        session.start().unwrap();
        assert_eq!(starts(&calls), 2);
    }

    // ---- restart law ---

    #[test]
    fn ended_while_wanted_restarts() {
        let (mut session, calls) = session();
        session.start().unwrap();
        session.handle_event(EngineEvent::Started);

        session.handle_event(EngineEvent::Ended);

        assert_eq!(starts(&calls), 2);
        assert_eq!(session.state(), SessionState::Starting);
        assert_eq!(session.stats().auto_restarts, 1);
    }

    #[test]
    fn ended_after_stop_does_not_restart() {
        let (mut session, calls) = session();
        session.start().unwrap();
        session.handle_event(EngineEvent::Started);

        session.stop();
        session.handle_event(EngineEvent::Ended);

        assert_eq!(starts(&calls), 1);
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.stats().auto_restarts, 0);
    }

    #[test]
    fn stop_while_starting_suppresses_restart() {
        let (mut session, calls) = session();
        session.start().unwrap();
        session.stop();
        session.handle_event(EngineEvent::Started);
        session.handle_event(EngineEvent::Ended);

        assert_eq!(starts(&calls), 1);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn start_stop_start_keeps_listening() {
        let (mut session, calls) = session();
        session.start().unwrap();
        session.stop();
        session.start().unwrap();
        assert_eq!(starts(&calls), 1);
        assert!(session.auto_restart());

        // The engine honours the stop, then the latest start wins.
        session.handle_event(EngineEvent::Started);
        session.handle_event(EngineEvent::Ended);

        assert_eq!(starts(&calls), 2);
        assert_eq!(session.state(), SessionState::Starting);
        assert_eq!(session.stats().auto_restarts, 1);
    }

    // ---- terminal law ---

    #[test]
    fn access_denied_disables_restart_until_explicit_start() {
        let (mut session, calls) = session();
        session.start().unwrap();
        session.handle_event(EngineEvent::Started);

        session.handle_event(EngineEvent::Error(EngineErrorKind::AccessDenied));
        assert!(!session.auto_restart());
        session.handle_event(EngineEvent::Ended);
        assert_eq!(starts(&calls), 1);

        // Even repeated endings stay quiet.
        session.handle_event(EngineEvent::Ended);
        assert_eq!(starts(&calls), 1);

        session.start().unwrap();
        assert!(session.auto_restart());
        assert_eq!(starts(&calls), 2);
    }

    #[test]
    fn transient_errors_keep_auto_restart() {
        let (mut session, calls) = session();
        session.start().unwrap();
        session.handle_event(EngineEvent::Started);

        session.handle_event(EngineEvent::Error(EngineErrorKind::NoSpeech));
        session.handle_event(EngineEvent::Error(EngineErrorKind::Network));
        assert!(session.auto_restart());

        session.handle_event(EngineEvent::Ended);
        assert_eq!(starts(&calls), 2);
        assert_eq!(session.stats().engine_errors, 2);
    }

    // ---- results ---

    #[test]
    fn final_result_reaches_handler_then_apply_hook() {
        let (mut session, _calls) = session();
        let order = Arc::new(Mutex::new(Vec::new()));
        let on_result = Arc::clone(&order);
        let on_apply = Arc::clone(&order);
        session.set_result_handler(move |r| on_result.lock().unwrap().push(r.transcript.clone()));
        session.set_apply_hook(move || on_apply.lock().unwrap().push("apply".to_string()));

        session.handle_event(EngineEvent::single_result("Next", 0.9, true));

        assert_eq!(*order.lock().unwrap(), vec!["Next", "apply"]);
        assert_eq!(session.stats().results_dispatched, 1);
    }

    #[test]
    fn interim_results_are_discarded() {
        let (mut session, _calls) = session();
        let seen = capture(&mut session);
        let applied = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&applied);
        session.set_apply_hook(move || *counter.lock().unwrap() += 1);

        session.handle_event(EngineEvent::single_result("nex", 0.9, false));

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(*applied.lock().unwrap(), 0);
        assert_eq!(session.stats().interim_discarded, 1);
    }

    #[test]
    fn result_at_reported_index_uses_top_alternative() {
        let (mut session, _calls) = session();
        let seen = capture(&mut session);

        session.handle_event(EngineEvent::Result {
            index: 1,
            results: vec![
                SpeechResult::single("edit", 0.9, true),
                SpeechResult {
                    alternatives: vec![
                        Alternative::new("previous", 0.7),
                        Alternative::new("precious", 0.2),
                    ],
                    is_final: true,
                },
            ],
        });

        assert_eq!(
            *seen.lock().unwrap(),
            vec![RecognitionResult::final_result("previous", 0.7)]
        );
    }

    #[test]
    fn malformed_results_are_dropped() {
        let (mut session, _calls) = session();
        let seen = capture(&mut session);

        session.handle_event(EngineEvent::Result {
            index: 3,
            results: vec![SpeechResult::single("next", 0.9, true)],
        });
        session.handle_event(EngineEvent::Result {
            index: 0,
            results: vec![SpeechResult {
                alternatives: Vec::new(),
                is_final: true,
            }],
        });

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(session.stats().results_dispatched, 0);
    }

    #[test]
    fn result_without_handler_is_harmless() {
        let (mut session, _calls) = session();
        session.handle_event(EngineEvent::single_result("next", 0.9, true));
        assert_eq!(session.stats().results_dispatched, 1);
    }

    // ---- drop ---

    #[test]
    fn dropping_a_listening_session_stops_engine() {
        let (mut session, calls) = session();
        session.start().unwrap();
        session.handle_event(EngineEvent::Started);

        drop(session);

        assert_eq!(calls.lock().unwrap().stops, 1);
    }

    #[test]
    fn dropping_a_stopped_session_does_not_stop_again() {
        let (mut session, calls) = session();
        session.start().unwrap();
        session.stop();

        drop(session);

        assert_eq!(calls.lock().unwrap().stops, 1);
    }
}
