//! Session state machine.

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// Where the engine is in its listening lifecycle.
///
/// ```text
/// Idle ──start()──▶ Starting ──Started──▶ Running
///  ▲                   │                     │
///  └──────Ended────────┴─────────Ended───────┘
///         (auto-restart: Ended ──▶ Starting)
/// ```
///
/// `Starting` exists because the engine confirms a start request only
/// asynchronously; without it a second `start()` issued before the `Started`
/// event would request the engine twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Not listening and no start request outstanding.
    #[default]
    Idle,
    /// A start request was issued; waiting for the engine to confirm.
    Starting,
    /// The engine confirmed it is listening.
    Running,
}

impl SessionState {
    /// `true` while a start request is outstanding or the engine is listening.
    ///
    /// ```
    /// use voice_commands::session::SessionState;
    ///
    /// assert!(!SessionState::Idle.is_active());
    /// assert!(SessionState::Starting.is_active());
    /// assert!(SessionState::Running.is_active());
    /// ```
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Starting | SessionState::Running)
    }

    /// A short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Starting => "Starting",
            SessionState::Running => "Listening",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        assert_eq!(SessionState::default(), SessionState::Idle);
    }

    #[test]
    fn labels() {
        assert_eq!(SessionState::Idle.label(), "Idle");
        assert_eq!(SessionState::Starting.label(), "Starting");
        assert_eq!(SessionState::Running.label(), "Listening");
    }
}
