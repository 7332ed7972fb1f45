//! Single-flight credential refresh
//!
//! Many requests can hit a 401 on the same expired token at once. Exactly
//! one of them may call `POST /auth/refresh`; the rest wait for its outcome
//! and reuse the new token. The coordinator owns the only `RefreshState`
//! in the process, and its transition points (claiming the flight,
//! settling it, the guard's unwind when the owner is dropped) are the
//! only code that touches `in_flight` or the queue.
//!
//! State machine:
//! - Idle → Refreshing: first caller to observe `in_flight == false` flips
//!   it and owns the network call; later callers enqueue a oneshot and wait
//! - Refreshing → Idle (success): store updated, waiters settled in FIFO
//!   order with the new token
//! - Refreshing → Idle (failure): store cleared, session-ended signal
//!   fired, every waiter rejected with the refresh's error
//! - Refreshing → Idle (abandoned): the owning future was dropped before
//!   it could settle; every waiter is rejected and the next caller is
//!   free to start a new flight
//!
//! Sequential (non-concurrent) refreshes are independent: each is its own
//! Idle → Refreshing → Idle cycle with its own network round trip.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use clinic_auth::{Credential, CredentialStore, REFRESH_PATH, SessionEvents, parse_refresh_response};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::error::{NormalizedError, normalize};
use crate::transport::{ApiRequest, Method, Transport};

type RefreshOutcome = Result<String, NormalizedError>;

fn abandoned_error() -> NormalizedError {
    NormalizedError::unknown("credential refresh was abandoned before completing")
}

/// Queue entry for a caller that arrived while a refresh was in flight.
/// Settled exactly once when the flight lands.
struct PendingCaller {
    settle: oneshot::Sender<RefreshOutcome>,
}

/// The process-wide refresh state. `in_flight` is true iff a refresh
/// network call is outstanding; the queue is empty whenever it is false.
struct RefreshState {
    in_flight: bool,
    queue: Vec<PendingCaller>,
}

/// Coordinates credential refresh across concurrent requests.
///
/// Constructed once at startup and shared via `Arc` with the interceptor
/// pipeline. The Mutex around `RefreshState` is what upholds the
/// single-flight invariant under concurrency; it is a std Mutex because
/// every critical section is short and never held across an await, and
/// the `FlightGuard` must be able to take it from a synchronous `Drop`.
pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    store: Arc<CredentialStore>,
    session: SessionEvents,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(
        transport: Arc<dyn Transport>,
        store: Arc<CredentialStore>,
        session: SessionEvents,
    ) -> Self {
        Self {
            transport,
            store,
            session,
            state: Mutex::new(RefreshState {
                in_flight: false,
                queue: Vec::new(),
            }),
        }
    }

    /// Lock accessor. A poisoned lock only records a panic elsewhere; the
    /// boolean-plus-queue state stays coherent, so recover the guard.
    fn state(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Obtain a fresh access token, joining an in-flight refresh if one
    /// exists. On unrecoverable failure the credential store is cleared
    /// and the session-ended signal has already fired by the time this
    /// returns.
    pub async fn ensure_fresh_credential(&self) -> RefreshOutcome {
        let waiter = {
            let mut state = self.state();
            if state.in_flight {
                let (settle, waiter) = oneshot::channel();
                state.queue.push(PendingCaller { settle });
                Some(waiter)
            } else {
                state.in_flight = true;
                None
            }
        };

        if let Some(waiter) = waiter {
            debug!("refresh already in flight, waiting for shared outcome");
            return match waiter.await {
                Ok(outcome) => outcome,
                // Owner dropped without settling the channel
                Err(_) => Err(abandoned_error()),
            };
        }

        // The flight is claimed. If this future is dropped before the settle
        // block below runs (the caller's task was aborted mid-refresh), the
        // guard releases the claim and rejects the queue so later callers
        // are not stranded behind a flight that will never land.
        let mut flight = FlightGuard {
            coordinator: self,
            settled: false,
        };

        let outcome = self.refresh_once().await;

        match &outcome {
            Ok(token) => {
                // Identity is unchanged by a refresh; carry the subject over
                let subject = self.store.get_credential().await.and_then(|c| c.subject);
                self.store
                    .set_credential(Credential::new(token.clone(), subject))
                    .await;
                metrics::counter!("credential_refresh_total", "outcome" => "success").increment(1);
                info!("credential refresh succeeded");
            }
            Err(error) => {
                self.store.clear_credential().await;
                self.session.notify_ended();
                metrics::counter!("credential_refresh_total", "outcome" => "failure").increment(1);
                warn!(error = %error, "credential refresh failed, ending session");
            }
        }

        // Settle: flip back to Idle and take the queue under the same lock,
        // so no caller can observe in_flight == false with a non-empty queue
        let waiters = {
            let mut state = self.state();
            state.in_flight = false;
            std::mem::take(&mut state.queue)
        };
        flight.settled = true;
        for caller in waiters {
            let _ = caller.settle.send(outcome.clone());
        }

        outcome
    }

    /// One network round trip to the refresh endpoint. The refresh secret
    /// travels in an HTTP-only cookie, so the request carries no body and
    /// no Authorization header.
    async fn refresh_once(&self) -> RefreshOutcome {
        let request = ApiRequest::new(Method::Post, REFRESH_PATH);
        let response = self.transport.execute(&request).await.map_err(normalize)?;
        parse_refresh_response(&response.body)
            .map_err(|e| NormalizedError::unknown(e.to_string()))
    }
}

/// Held by the caller that owns the current flight, from the moment the
/// claim is made until the settle block marks it `settled`. Dropping it
/// unsettled means the owning future died mid-refresh; the guard then
/// returns the state to Idle and rejects every queued caller.
struct FlightGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let waiters = {
            let mut state = self.coordinator.state();
            state.in_flight = false;
            std::mem::take(&mut state.queue)
        };
        warn!(
            waiters = waiters.len(),
            "refresh owner dropped mid-flight, rejecting queued callers"
        );
        let error = abandoned_error();
        for caller in waiters {
            let _ = caller.settle.send(Err(error.clone()));
        }
    }
}
