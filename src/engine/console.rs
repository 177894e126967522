//! Stdin-backed recognition engine.
//!
//! [`ConsoleEngine`] treats every line typed on stdin as an utterance heard by
//! the microphone, which makes the whole session stack usable (and its
//! restart behaviour observable) without a platform recogniser.
//!
//! # Line syntax
//!
//! | Input                | Event(s)                                              |
//! |----------------------|-------------------------------------------------------|
//! | `next`               | final result, default confidence                      |
//! | `next @0.3`          | final result, confidence 0.3                          |
//! | `next @0.8 \| text`  | final result with two alternatives                    |
//! | `~nex`               | interim result, replaced by the next one at its index |
//! | `!end`               | the engine drops the session (`Ended`)                |
//! | `!error not-allowed` | `Error(kind)`, plus `Ended` for fatal kinds           |
//!
//! Lines typed while the engine is not listening are discarded, exactly like
//! speech that nobody is listening to.  The silence timeout counts from the
//! session's start or from its last accepted line, whichever is later, so
//! discarded lines never delay it.
//!
//! # Threads
//!
//! Reading stdin blocks, so a dedicated `console-reader` thread forwards lines
//! to a `console-engine` worker thread that owns the silence timer and emits
//! events.  Dropping the engine sets a stop flag; the reader thread stays
//! blocked on stdin until the process exits, which holds no resources.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use super::{
    Alternative, EngineError, EngineErrorKind, EngineEvent, EventSender, RecognitionEngine,
    SpeechResult,
};
use crate::config::ConsoleConfig;

// ---------------------------------------------------------------------------
// Line parsing
// ---------------------------------------------------------------------------

/// One parsed line of console input.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Utterance(SpeechResult),
    End,
    Error(EngineErrorKind),
}

/// Parse a console line.  Returns `None` for blank or malformed lines.
pub fn parse_line(line: &str, default_confidence: f32) -> Option<ConsoleInput> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(directive) = line.strip_prefix('!') {
        let mut parts = directive.split_whitespace();
        return match parts.next() {
            Some("end") => Some(ConsoleInput::End),
            Some("error") => {
                let code = parts.collect::<Vec<_>>().join(" ");
                if code.is_empty() {
                    log::warn!("console: `!error` needs an error code");
                    None
                } else {
                    Some(ConsoleInput::Error(EngineErrorKind::from_code(&code)))
                }
            }
            _ => {
                log::warn!("console: unknown directive {line:?}");
                None
            }
        };
    }

    let (text, is_final) = match line.strip_prefix('~') {
        Some(rest) => (rest, false),
        None => (line, true),
    };

    let alternatives: Vec<Alternative> = text
        .split('|')
        .filter_map(|alt| parse_alternative(alt, default_confidence))
        .collect();

    if alternatives.is_empty() {
        return None;
    }

    Some(ConsoleInput::Utterance(SpeechResult {
        alternatives,
        is_final,
    }))
}

fn parse_alternative(text: &str, default_confidence: f32) -> Option<Alternative> {
    let text = text.trim();
    let (transcript, confidence) = match text.rsplit_once('@') {
        Some((head, tail)) => match tail.trim().parse::<f32>() {
            Ok(confidence) => (head.trim(), confidence.clamp(0.0, 1.0)),
            Err(_) => (text, default_confidence),
        },
        None => (text, default_confidence),
    };

    if transcript.is_empty() {
        None
    } else {
        Some(Alternative::new(transcript, confidence))
    }
}

/// Errors after which a real engine would not keep listening.
fn ends_session(kind: &EngineErrorKind) -> bool {
    matches!(
        kind,
        EngineErrorKind::AccessDenied
            | EngineErrorKind::ServiceNotAllowed
            | EngineErrorKind::Aborted
            | EngineErrorKind::AudioCapture
    )
}

// ---------------------------------------------------------------------------
// Shared listening state
// ---------------------------------------------------------------------------

struct Listening {
    active: bool,
    closed: bool,
    continuous: bool,
    max_alternatives: u32,
    /// Results of the current session, indexed the way events report them.
    results: Vec<SpeechResult>,
    /// Session start or last accepted line.
    last_heard: Instant,
}

struct Shared {
    /// Every event that depends on `active` is emitted under this lock, so
    /// `Started`, results and `Ended` can never be reordered.
    listening: Mutex<Listening>,
    shutdown: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            listening: Mutex::new(Listening {
                active: false,
                closed: false,
                continuous: true,
                max_alternatives: 1,
                results: Vec::new(),
                last_heard: Instant::now(),
            }),
            shutdown: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Listening> {
        self.listening.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn emit(events: &EventSender, event: EngineEvent) {
    if events.send(event).is_err() {
        log::debug!("console: event receiver dropped");
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Turns console lines and silence into engine events.
struct Worker {
    shared: Arc<Shared>,
    events: EventSender,
    default_confidence: f32,
    input_closed: Arc<Notify>,
}

impl Worker {
    fn on_line(&self, line: &str) {
        let Some(input) = parse_line(line, self.default_confidence) else {
            return;
        };

        let mut listening = self.shared.lock();
        if !listening.active {
            log::debug!("console: not listening, discarding {line:?}");
            return;
        }
        listening.last_heard = Instant::now();

        match input {
            ConsoleInput::Utterance(mut result) => {
                let max = listening.max_alternatives.max(1) as usize;
                result.alternatives.truncate(max);
                let is_final = result.is_final;

                if listening.results.last().is_some_and(|last| !last.is_final) {
                    listening.results.pop();
                }
                listening.results.push(result);
                let index = listening.results.len() - 1;
                emit(
                    &self.events,
                    EngineEvent::Result {
                        index,
                        results: listening.results.clone(),
                    },
                );

                if is_final && !listening.continuous {
                    self.end_session(&mut listening);
                }
            }
            ConsoleInput::End => self.end_session(&mut listening),
            ConsoleInput::Error(kind) => {
                let fatal = ends_session(&kind);
                emit(&self.events, EngineEvent::Error(kind));
                if fatal {
                    self.end_session(&mut listening);
                }
            }
        }
    }

    /// How long the worker may wait for input before checking for silence.
    fn silence_left(&self, timeout: Duration) -> Duration {
        let listening = self.shared.lock();
        if listening.active {
            timeout.saturating_sub(listening.last_heard.elapsed())
        } else {
            timeout
        }
    }

    fn on_silence(&self, timeout: Duration) {
        let mut listening = self.shared.lock();
        if listening.active && listening.last_heard.elapsed() >= timeout {
            log::debug!("console: silence timeout, dropping session");
            emit(&self.events, EngineEvent::Error(EngineErrorKind::NoSpeech));
            self.end_session(&mut listening);
        }
    }

    fn on_closed(&self) {
        log::info!("console: input closed");
        {
            let mut listening = self.shared.lock();
            listening.closed = true;
            self.end_session(&mut listening);
        }
        self.input_closed.notify_one();
    }

    fn end_session(&self, listening: &mut Listening) {
        if listening.active {
            listening.active = false;
            emit(&self.events, EngineEvent::Ended);
        }
    }

    fn run(self, lines: mpsc::Receiver<String>, silence: Option<Duration>) {
        loop {
            let next = match silence {
                Some(timeout) => lines.recv_timeout(self.silence_left(timeout)),
                None => lines.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            if self.shared.shutdown.load(Ordering::Relaxed) {
                break;
            }

            match next {
                Ok(line) => self.on_line(&line),
                Err(RecvTimeoutError::Timeout) => {
                    if let Some(timeout) = silence {
                        self.on_silence(timeout);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    self.on_closed();
                    break;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ConsoleEngine
// ---------------------------------------------------------------------------

/// A [`RecognitionEngine`] fed by lines of text instead of a microphone.
pub struct ConsoleEngine {
    shared: Arc<Shared>,
    events: EventSender,
    input_closed: Arc<Notify>,
    _reader: thread::JoinHandle<()>,
    _worker: thread::JoinHandle<()>,
}

impl ConsoleEngine {
    /// Listen on the process's stdin.
    pub fn spawn(events: EventSender, config: &ConsoleConfig) -> std::io::Result<Self> {
        Self::with_input(std::io::BufReader::new(std::io::stdin()), events, config)
    }

    /// Listen on an arbitrary line source.
    pub fn with_input<R>(
        input: R,
        events: EventSender,
        config: &ConsoleConfig,
    ) -> std::io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let shared = Arc::new(Shared::new());
        let input_closed = Arc::new(Notify::new());
        let (line_tx, line_rx) = mpsc::channel::<String>();

        let reader = thread::Builder::new()
            .name("console-reader".into())
            .spawn(move || {
                for line in input.lines() {
                    match line {
                        Ok(line) => {
                            if line_tx.send(line).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            log::error!("console: failed to read input: {e}");
                            break;
                        }
                    }
                }
            })?;

        let silence = match config.silence_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let worker = Worker {
            shared: Arc::clone(&shared),
            events: events.clone(),
            default_confidence: config.default_confidence,
            input_closed: Arc::clone(&input_closed),
        };
        let worker = thread::Builder::new()
            .name("console-engine".into())
            .spawn(move || worker.run(line_rx, silence))?;

        Ok(Self {
            shared,
            events,
            input_closed,
            _reader: reader,
            _worker: worker,
        })
    }

    /// Notified once, when the input reaches end-of-file.
    pub fn input_closed(&self) -> Arc<Notify> {
        Arc::clone(&self.input_closed)
    }
}

impl RecognitionEngine for ConsoleEngine {
    fn set_continuous(&mut self, continuous: bool) {
        self.shared.lock().continuous = continuous;
    }

    fn set_max_alternatives(&mut self, max: u32) {
        self.shared.lock().max_alternatives = max;
    }

    fn start(&mut self) -> Result<(), EngineError> {
        let mut listening = self.shared.lock();
        if listening.closed {
            return Err(EngineError::Closed);
        }
        if listening.active {
            return Err(EngineError::AlreadyStarted);
        }
        listening.active = true;
        listening.results.clear();
        listening.last_heard = Instant::now();
        emit(&self.events, EngineEvent::Started);
        Ok(())
    }

    fn stop(&mut self) {
        let mut listening = self.shared.lock();
        if listening.active {
            listening.active = false;
            emit(&self.events, EngineEvent::Ended);
        }
    }
}

impl Drop for ConsoleEngine {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
