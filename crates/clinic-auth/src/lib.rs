//! Credential domain for the clinic API client
//!
//! Owns the process-wide credential state and the refresh endpoint wire
//! contract. This crate is a standalone library with no dependency on the
//! HTTP pipeline — it can be tested and used independently.
//!
//! Credential flow:
//! 1. Host stores the login token via `CredentialStore::set_credential()`
//! 2. Pipeline reads it per request via `CredentialStore::access_token()`
//! 3. On 401 the refresh coordinator calls `POST /auth/refresh` and parses
//!    the envelope via `token::parse_refresh_response()`
//! 4. Unrecoverable refresh failure clears the store and fires
//!    `SessionEvents::notify_ended()` so the host can navigate to login

pub mod credentials;
pub mod error;
pub mod session;
pub mod token;

pub use credentials::{Credential, CredentialStore};
pub use error::{Error, Result};
pub use session::{SessionEvents, SessionStatus};
pub use token::{REFRESH_PATH, parse_refresh_response};
