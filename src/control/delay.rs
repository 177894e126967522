//! Cancellable delayed start.
//!
//! A view typically starts listening a little after it appears and must never
//! start at all if the user leaves before then.  [`DelayedStart`] owns that
//! timer: it issues `start()` after the delay unless it was cancelled or
//! dropped first.

use std::time::Duration;

use tokio::task::JoinHandle;

use super::runner::SessionControl;
use crate::session::SessionError;

/// A pending `start()` request.  Cancelled on [`cancel`](Self::cancel) or drop.
#[derive(Debug)]
pub struct DelayedStart {
    handle: JoinHandle<()>,
}

impl DelayedStart {
    /// Request `control.start()` after `delay`.
    ///
    /// `on_error` receives the synchronous start failure, if any, so the
    /// caller can degrade its voice UI.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(delay: Duration, control: SessionControl, on_error: F) -> Self
    where
        F: FnOnce(SessionError) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            log::debug!("control: delayed start firing after {delay:?}");
            if let Err(e) = control.start() {
                on_error(e);
            }
        });

        Self { handle }
    }

    /// Abort the pending start.  Has no effect once it has fired.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    /// `true` once the start was issued or the timer was cancelled.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DelayedStart {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
