//! In-memory credential store
//!
//! Holds at most one credential for the signed-in user. A tokio Mutex
//! serializes access from concurrent requests and the refresh coordinator.
//! The store is the single source of truth for the access token: the
//! request pipeline reads it at attach time, the refresh coordinator
//! replaces it on success and clears it on unrecoverable failure.

use common::Secret;
use tokio::sync::Mutex;
use tracing::debug;

/// Access token bound to the identity it authenticates.
///
/// The token is wrapped in `Secret` so Debug output and logs never carry
/// the raw value. `subject` references the user record (owned elsewhere).
#[derive(Debug, Clone)]
pub struct Credential {
    pub access: Secret<String>,
    pub subject: Option<String>,
}

impl Credential {
    pub fn new(access: impl Into<String>, subject: Option<String>) -> Self {
        Self {
            access: Secret::new(access.into()),
            subject,
        }
    }

    /// The raw bearer token, cloned for header construction.
    pub fn token(&self) -> String {
        self.access.expose().clone()
    }
}

/// Process-wide credential holder.
///
/// Exactly one instance exists per process, shared via `Arc` between the
/// host application, the interceptor pipeline, and the refresh coordinator.
pub struct CredentialStore {
    state: Mutex<Option<Credential>>,
}

impl CredentialStore {
    /// Create an empty store (signed-out state).
    pub fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    /// Get a clone of the current credential, if signed in.
    pub async fn get_credential(&self) -> Option<Credential> {
        let state = self.state.lock().await;
        state.clone()
    }

    /// The current access token, cloned for header construction.
    pub async fn access_token(&self) -> Option<String> {
        let state = self.state.lock().await;
        state.as_ref().map(Credential::token)
    }

    /// Replace the stored credential (login or successful refresh).
    pub async fn set_credential(&self, credential: Credential) {
        let mut state = self.state.lock().await;
        debug!(subject = credential.subject.as_deref(), "credential stored");
        *state = Some(credential);
    }

    /// Drop the stored credential (logout or failed refresh).
    pub async fn clear_credential(&self) {
        let mut state = self.state.lock().await;
        if state.take().is_some() {
            debug!("credential cleared");
        }
    }

    /// Whether a credential is currently held.
    pub async fn is_authenticated(&self) -> bool {
        let state = self.state.lock().await;
        state.is_some()
    }
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::new()
    }
}
