//! Voice command registry and dispatch.
//!
//! [`CommandRouter`] maps a finalized utterance to exactly one outcome:
//!
//! ```text
//! confidence < threshold ──────────────▶ unrecognized callback (transcript)
//! normalize(transcript) == command text ─▶ that command's callback ()
//! otherwise ─────────────────────────────▶ no-match callback (transcript)
//! ```
//!
//! Matching is exact after [`normalize`] (trim + lower-case).  Commands are
//! scanned in registration order and the first one with the same text wins,
//! so registering a phrase twice never shadows the earlier registration.
//!
//! The router is a cheap cloneable handle.  Callbacks run after the registry
//! lock is released, so a callback may itself add or clear commands; the
//! change is visible to the next [`handle`](CommandRouter::handle) call.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::session::RecognitionResult;

/// Results below this confidence are never matched against commands.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// Callback run when a command is spoken.
pub type CommandCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback receiving the raw transcript of an unmatched utterance.
pub type TranscriptCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Canonical form used for matching: surrounding whitespace removed, lower-cased.
///
/// ```
/// use voice_commands::router::normalize;
///
/// assert_eq!(normalize("  Start Slideshow "), "start slideshow");
/// ```
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// A registered phrase and the action it triggers.
#[derive(Clone)]
pub struct Command {
    text: String,
    callback: CommandCallback,
}

impl Command {
    pub fn new<F>(text: &str, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            text: normalize(text),
            callback: Arc::new(callback),
        }
    }

    /// The normalized phrase.
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// How a result was classified.  Exactly one applies to every result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Confidence below the threshold; the registry was not consulted.
    Unrecognized,
    /// A registered command matched and its callback ran.
    Matched,
    /// Confident, but no registered command has this text.
    NoMatch,
}

// ---------------------------------------------------------------------------
// CommandRouter
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Registry {
    commands: Vec<Command>,
    no_match: Option<TranscriptCallback>,
    unrecognized: Option<TranscriptCallback>,
}

/// Registry of voice commands plus the two fallback callbacks.
#[derive(Clone)]
pub struct CommandRouter {
    registry: Arc<Mutex<Registry>>,
    threshold: f32,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_CONFIDENCE_THRESHOLD)
    }

    /// A router that treats results below `threshold` as unrecognized.
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Append a command.  Duplicates are kept; the first registration wins.
    pub fn add_command<F>(&self, text: &str, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let command = Command::new(text, callback);
        log::debug!("router: add command {:?}", command.text);
        self.registry().commands.push(command);
    }

    /// Remove every command.  The fallback callbacks are kept.
    pub fn clear_commands(&self) {
        self.registry().commands.clear();
    }

    /// Registered command texts, in matching order.
    pub fn commands(&self) -> Vec<String> {
        self.registry()
            .commands
            .iter()
            .map(|c| c.text.clone())
            .collect()
    }

    pub fn set_no_match_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.registry().no_match = Some(Arc::new(callback));
    }

    pub fn clear_no_match_callback(&self) {
        self.registry().no_match = None;
    }

    pub fn set_unrecognized_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.registry().unrecognized = Some(Arc::new(callback));
    }

    pub fn clear_unrecognized_callback(&self) {
        self.registry().unrecognized = None;
    }

    /// Dispatch one finalized utterance.
    pub fn handle(&self, result: &RecognitionResult) -> Dispatch {
        if result.confidence.is_nan() || result.confidence < self.threshold {
            let callback = self.registry().unrecognized.clone();
            match callback {
                Some(callback) => callback(&result.transcript),
                None => log::info!("router: unrecognized result {:?}", result.transcript),
            }
            return Dispatch::Unrecognized;
        }

        let text = normalize(&result.transcript);
        let command = self
            .registry()
            .commands
            .iter()
            .find(|c| c.text == text)
            .map(|c| Arc::clone(&c.callback));

        if let Some(callback) = command {
            log::debug!("router: matched {text:?}");
            callback();
            return Dispatch::Matched;
        }

        let callback = self.registry().no_match.clone();
        match callback {
            Some(callback) => callback(&result.transcript),
            None => log::info!(
                "router: no matching command was found for {:?}",
                result.transcript
            ),
        }
        Dispatch::NoMatch
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRouter")
            .field("commands", &self.commands())
            .field("threshold", &self.threshold)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
