//! Resilient authenticated HTTP client core
//!
//! Everything the clinic app sends to its API goes through this crate:
//! the interceptor pipeline attaches the bearer token and CSRF header,
//! 401s are resolved by a single-flight credential refresh and a one-shot
//! replay, transient failures can be retried with capped exponential
//! backoff, and every failure surfaces as one `NormalizedError`.
//!
//! Wiring order at startup:
//! 1. `ClientConfig::load()` — base URL, timeout, retry defaults
//! 2. `HttpTransport::with_timeout()` over a shared reqwest client
//! 3. `RefreshCoordinator::new()` with the credential store and session
//!    events from `clinic-auth`
//! 4. `ApiClient::new()` — handed to the domain services
//!
//! The host subscribes to `SessionEvents` and navigates to its sign-in
//! entry point when the session ends.

pub mod client;
pub mod config;
pub mod error;
pub mod refresh;
pub mod retry;
pub mod transport;

pub use client::ApiClient;
pub use config::{ClientConfig, RetryConfig};
pub use error::{ErrorKind, NormalizedError, RawFailure, normalize};
pub use refresh::RefreshCoordinator;
pub use retry::{RetryPolicy, retry, retry_with_rng};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Method, REQUEST_TIMEOUT, Transport};
