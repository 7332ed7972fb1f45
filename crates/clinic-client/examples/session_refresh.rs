//! Wires the full pipeline against a live API and watches the session.
//!
//! Usage: `cargo run --example session_refresh -- https://api.clinic.example`

use std::sync::Arc;

use clinic_auth::{CredentialStore, SessionEvents, SessionStatus};
use clinic_client::{ApiClient, HttpTransport, RefreshCoordinator, RetryPolicy};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8000".to_string());

    let transport = Arc::new(HttpTransport::new(&base_url));
    let store = Arc::new(CredentialStore::new());
    let session = SessionEvents::new();
    let refresh = Arc::new(RefreshCoordinator::new(
        transport.clone(),
        store.clone(),
        session.clone(),
    ));
    let client = ApiClient::new(transport, store, refresh);

    let mut session_rx = session.subscribe();
    tokio::spawn(async move {
        if session_rx.changed().await.is_ok() && *session_rx.borrow() == SessionStatus::Ended {
            warn!("session ended, host would navigate to sign-in");
        }
    });

    match client
        .execute_idempotent(
            clinic_client::ApiRequest::get("/notifications"),
            &RetryPolicy::default(),
        )
        .await
    {
        Ok(response) => info!(status = response.status, "notifications fetched"),
        Err(error) => warn!(kind = ?error.kind, %error, "request failed"),
    }
}
