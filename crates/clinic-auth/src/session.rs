//! Session lifecycle signal
//!
//! When a refresh fails unrecoverably the user is effectively signed out.
//! The host application subscribes here and navigates to its
//! unauthenticated entry point when the status flips to `Ended`.

use tokio::sync::watch;
use tracing::info;

/// Current session state as seen by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Ended,
}

/// Broadcast handle for the "session ended" signal.
///
/// Cheap to clone; all clones share the same underlying channel. Works
/// without subscribers — the status is still recorded for late observers.
#[derive(Clone)]
pub struct SessionEvents {
    tx: watch::Sender<SessionStatus>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionStatus::Active);
        Self { tx }
    }

    /// Subscribe to session status changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.tx.subscribe()
    }

    /// The current status.
    pub fn status(&self) -> SessionStatus {
        *self.tx.borrow()
    }

    /// Signal that the session has ended (unrecoverable refresh failure
    /// or explicit logout).
    pub fn notify_ended(&self) {
        info!("session ended");
        self.tx.send_replace(SessionStatus::Ended);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
