//! Voice controller: drives a [`RecognitionSession`] and a [`CommandRouter`]
//! from one async task.
//!
//! # Event flow
//!
//! ```text
//! SessionControl ──ControlRequest (mpsc)──┐
//!                                         ▼
//! RecognitionEngine ──EngineEvent──▶ VoiceController::run
//!                                         │
//!                                         ├─ Start / Stop  → session.start() / stop()
//!                                         ├─ Shutdown      → stop, return stats
//!                                         └─ EngineEvent   → session.handle_event()
//!                                                              └─ final result → router.handle()
//! ```
//!
//! Everything happens on the controller's task, one message at a time, so
//! requests made from inside a command callback are applied right after the
//! current dispatch and before the next engine event.

use tokio::sync::mpsc;

use crate::engine::EventReceiver;
use crate::router::{CommandRouter, Dispatch};
use crate::session::{RecognitionSession, SessionError, SessionStats};

// ---------------------------------------------------------------------------
// ControlRequest / SessionControl
// ---------------------------------------------------------------------------

/// Requests a caller can make of a running controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    Start,
    Stop,
    Shutdown,
}

/// Cloneable handle for starting and stopping the session from anywhere,
/// command callbacks included.
#[derive(Debug, Clone)]
pub struct SessionControl {
    tx: mpsc::UnboundedSender<ControlRequest>,
    supported: bool,
}

impl SessionControl {
    /// Create a handle and the receiver its requests arrive on.
    ///
    /// `supported` tells the handle whether an engine exists, so `start()`
    /// can fail immediately instead of asynchronously.
    pub fn channel(supported: bool) -> (Self, mpsc::UnboundedReceiver<ControlRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, supported }, rx)
    }

    /// Ask the session to start listening.
    ///
    /// # Errors
    ///
    /// [`SessionError::Unsupported`] when the platform has no engine.
    pub fn start(&self) -> Result<(), SessionError> {
        if !self.supported {
            return Err(SessionError::Unsupported);
        }
        self.send(ControlRequest::Start);
        Ok(())
    }

    /// Ask the session to stop listening.
    pub fn stop(&self) {
        self.send(ControlRequest::Stop);
    }

    /// Ask the controller to stop the session and return.
    pub fn shutdown(&self) {
        self.send(ControlRequest::Shutdown);
    }

    fn send(&self, request: ControlRequest) {
        if self.tx.send(request).is_err() {
            log::debug!("control: controller gone, dropping {request:?}");
        }
    }
}

// ---------------------------------------------------------------------------
// VoiceController
// ---------------------------------------------------------------------------

/// Owns the session and feeds it caller requests and engine events.
///
/// ```rust,no_run
/// use voice_commands::config::AppConfig;
/// use voice_commands::control::VoiceController;
/// use voice_commands::engine::{event_channel, ConsoleEngine};
/// use voice_commands::router::CommandRouter;
/// use voice_commands::session::RecognitionSession;
///
/// # async fn example() -> std::io::Result<()> {
/// let config = AppConfig::default();
/// let (events_tx, events_rx) = event_channel();
/// let engine = ConsoleEngine::spawn(events_tx, &config.console)?;
/// let session = RecognitionSession::new(Some(Box::new(engine)), &config.recognition);
///
/// let router = CommandRouter::new();
/// router.add_command("hello", || println!("hi"));
///
/// let controller = VoiceController::new(session, router);
/// let control = controller.control();
/// control.start().expect("engine present");
/// let stats = controller.run(events_rx).await;
/// # let _ = stats;
/// # Ok(())
/// # }
/// ```
pub struct VoiceController {
    session: RecognitionSession,
    router: CommandRouter,
    control: SessionControl,
    control_rx: mpsc::UnboundedReceiver<ControlRequest>,
}

impl VoiceController {
    /// Wire `session`'s final results into `router`.
    pub fn new(mut session: RecognitionSession, router: CommandRouter) -> Self {
        let (control, control_rx) = SessionControl::channel(session.is_supported());

        let dispatch = router.clone();
        session.set_result_handler(move |result| {
            let outcome = dispatch.handle(result);
            if outcome != Dispatch::Matched {
                log::debug!("control: {:?} -> {outcome:?}", result.transcript);
            }
        });

        Self {
            session,
            router,
            control,
            control_rx,
        }
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn router(&self) -> CommandRouter {
        self.router.clone()
    }

    /// Register a hook run after every dispatched result.
    pub fn set_apply_hook<F>(&mut self, hook: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.session.set_apply_hook(hook);
    }

    /// Run until [`SessionControl::shutdown`] or until the engine's event
    /// stream closes.  Returns the session's final statistics.
    pub async fn run(mut self, mut events: EventReceiver) -> SessionStats {
        loop {
            tokio::select! {
                biased;

                Some(request) = self.control_rx.recv() => {
                    match request {
                        ControlRequest::Start => {
                            if let Err(e) = self.session.start() {
                                log::error!("control: {e}");
                            }
                        }
                        ControlRequest::Stop => self.session.stop(),
                        ControlRequest::Shutdown => {
                            log::info!("control: shutdown requested");
                            break;
                        }
                    }
                }

                event = events.recv() => match event {
                    Some(event) => self.session.handle_event(event),
                    None => {
                        log::info!("control: engine event stream closed");
                        break;
                    }
                },
            }
        }

        self.session.stop();
        self.session.stats().clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
