//! Interceptor pipeline
//!
//! Every API call flows through `ApiClient`: the request path attaches the
//! bearer token and, for state-mutating methods, the CSRF header; the
//! response path routes 401s through the refresh coordinator and replays
//! the request exactly once with the new credential. All other failures
//! are normalized and surfaced — nothing is swallowed here.
//!
//! The replay guard is an explicit local flag, not a mark on the request
//! value: a request that still gets 401 after a fresh credential fails
//! normally instead of looping.

use std::sync::Arc;

use clinic_auth::CredentialStore;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{NormalizedError, RawFailure, normalize};
use crate::refresh::RefreshCoordinator;
use crate::retry::{RetryPolicy, retry};
use crate::transport::{ApiRequest, ApiResponse, Transport};

const AUTHORIZATION: &str = "Authorization";
const CSRF_HEADER: &str = "X-CSRF-Token";

/// Authenticated API client shared by all domain services.
///
/// Holds the transport, the process-wide credential store, and the refresh
/// coordinator. CSRF token discovery is the host's concern; when the host
/// has one it is attached to every state-mutating request.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    refresh: Arc<RefreshCoordinator>,
    csrf_token: Option<String>,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        refresh: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            transport,
            store,
            refresh,
            csrf_token: None,
        }
    }

    /// Attach a CSRF token to all subsequent state-mutating requests.
    pub fn with_csrf_token(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    /// Execute a request through the full pipeline: credential attachment,
    /// one refresh-and-replay cycle on 401, normalization of everything
    /// else.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, NormalizedError> {
        let request_id = format!("req_{}", Uuid::new_v4().as_simple());
        self.dispatch(request, &request_id).await
    }

    /// `execute` wrapped in the retry coordinator. Intended for idempotent
    /// reads; the 401 refresh-and-replay cycle still runs inside each
    /// attempt.
    pub async fn execute_idempotent(
        &self,
        request: ApiRequest,
        policy: &RetryPolicy,
    ) -> Result<ApiResponse, NormalizedError> {
        let request_id = format!("req_{}", Uuid::new_v4().as_simple());
        retry(policy, || {
            let request = request.clone();
            let request_id = request_id.clone();
            async move {
                self.dispatch(request, &request_id)
                    .await
                    .map_err(RawFailure::Normalized)
            }
        })
        .await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, NormalizedError> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn post(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, NormalizedError> {
        self.execute(ApiRequest::post(path, body)).await
    }

    pub async fn put(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, NormalizedError> {
        self.execute(ApiRequest::put(path, body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, NormalizedError> {
        self.execute(ApiRequest::delete(path)).await
    }

    async fn dispatch(
        &self,
        request: ApiRequest,
        request_id: &str,
    ) -> Result<ApiResponse, NormalizedError> {
        let mut prepared = self.prepare(request).await;
        let mut replayed = false;

        loop {
            match self.transport.execute(&prepared).await {
                Ok(response) => {
                    metrics::counter!("requests_total", "status" => response.status.to_string())
                        .increment(1);
                    debug!(
                        request_id,
                        method = prepared.method.as_str(),
                        path = %prepared.path,
                        status = response.status,
                        "request completed"
                    );
                    return Ok(response);
                }
                Err(RawFailure::Status { code: 401, .. }) if !replayed => {
                    // One refresh-and-replay cycle per request
                    replayed = true;
                    debug!(
                        request_id,
                        path = %prepared.path,
                        "credential rejected, refreshing before replay"
                    );
                    let token = self.refresh.ensure_fresh_credential().await?;
                    prepared = prepared.with_header(AUTHORIZATION, format!("Bearer {token}"));
                }
                Err(raw) => {
                    let error = normalize(raw);
                    metrics::counter!("requests_total", "status" => "error").increment(1);
                    warn!(
                        request_id,
                        method = prepared.method.as_str(),
                        path = %prepared.path,
                        error = %error,
                        "request failed"
                    );
                    return Err(error);
                }
            }
        }
    }

    /// Request-path interception: bearer token if signed in, CSRF header
    /// for state-mutating methods when one is available.
    async fn prepare(&self, mut request: ApiRequest) -> ApiRequest {
        if let Some(token) = self.store.access_token().await {
            request = request.with_header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if request.method.is_mutating() {
            if let Some(csrf) = &self.csrf_token {
                request = request.with_header(CSRF_HEADER, csrf.clone());
            }
        }
        request
    }
}
