//! Exponential backoff with jitter around fallible operations
//!
//! `retry` wraps any async operation that fails with a `RawFailure`. On each
//! failure the error is normalized, the policy (or the error's own
//! `retryable` flag) decides whether to try again, and the task suspends for
//! `min(base * 2^attempt, max)` plus uniform jitter in `[0, 0.3 * delay]`.
//! Suspension is a tokio sleep — concurrent requests keep running.
//!
//! Retries are invisible to callers except as latency: the final result is
//! either the operation's success value or the last normalized error.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, RngExt, SeedableRng};
use tracing::debug;

use crate::error::{NormalizedError, RawFailure, normalize};

/// Per-call-site override of the default retryability decision.
pub type RetryPredicate = Arc<dyn Fn(&NormalizedError, u32) -> bool + Send + Sync>;

/// Retry behavior for one call site.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt (3 means up to 4 attempts total)
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// When set, consulted instead of `NormalizedError::retryable`
    pub predicate: Option<RetryPredicate>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            predicate: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("predicate", &self.predicate.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

/// Pre-jitter delay for the given attempt: `min(base * 2^attempt, max)`.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(policy.max_delay)
}

/// Add uniform jitter in `[0, 0.3 * delay]` to spread out retry storms.
pub fn jittered(delay: Duration, rng: &mut impl Rng) -> Duration {
    delay + delay.mul_f64(0.3 * rng.random::<f64>())
}

/// Run `operation`, retrying per `policy`. Fails with the last
/// normalized error once retries are exhausted or the failure is not
/// retryable.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<T, NormalizedError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RawFailure>>,
{
    let mut rng = StdRng::from_rng(&mut rand::rng());
    retry_with_rng(policy, &mut rng, operation).await
}

/// `retry` with an explicit RNG for the jitter, so tests can seed it and
/// get deterministic delays.
pub async fn retry_with_rng<T, R, F, Fut>(
    policy: &RetryPolicy,
    rng: &mut R,
    mut operation: F,
) -> Result<T, NormalizedError>
where
    R: Rng,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RawFailure>>,
{
    let mut attempt = 0u32;
    loop {
        let raw = match operation().await {
            Ok(value) => return Ok(value),
            Err(raw) => raw,
        };
        let error = normalize(raw);

        let should_retry = attempt < policy.max_retries
            && match &policy.predicate {
                Some(predicate) => predicate(&error, attempt),
                None => error.retryable,
            };
        if !should_retry {
            return Err(error);
        }

        let delay = jittered(backoff_delay(policy, attempt), rng);
        metrics::counter!("request_retries_total").increment(1);
        debug!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "retrying after backoff"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn status_failure(code: u16) -> RawFailure {
        RawFailure::Status {
            code,
            body: None,
            detail: format!("HTTP {code}"),
        }
    }

    #[test]
    fn backoff_is_monotonic_and_capped() {
        let policy = RetryPolicy::default();
        let delays: Vec<Duration> = (0..6).map(|a| backoff_delay(&policy, a)).collect();

        assert_eq!(delays[0], Duration::from_secs(1));
        assert_eq!(delays[1], Duration::from_secs(2));
        assert_eq!(delays[2], Duration::from_secs(4));
        assert_eq!(delays[3], Duration::from_secs(8));
        assert_eq!(delays[4], Duration::from_secs(10));
        assert_eq!(delays[5], Duration::from_secs(10));
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn backoff_survives_huge_attempt_numbers() {
        let policy = RetryPolicy::default();
        assert_eq!(backoff_delay(&policy, u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn jitter_stays_within_thirty_percent() {
        let mut rng = StdRng::seed_from_u64(42);
        let delay = Duration::from_secs(4);
        for _ in 0..100 {
            let j = jittered(delay, &mut rng);
            assert!(j >= delay, "jittered below base: {j:?}");
            assert!(j <= delay.mul_f64(1.3), "jittered above cap: {j:?}");
        }
    }

    #[test]
    fn jitter_is_deterministic_given_a_seed() {
        let delay = Duration::from_secs(2);
        let mut a = StdRng::seed_from_u64(7);
        let mut b = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            assert_eq!(jittered(delay, &mut a), jittered(delay, &mut b));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_status_fails_on_first_attempt() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry(&RetryPolicy::default(), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(status_failure(404)) }
        })
        .await;

        let error = result.unwrap_err();
        assert_eq!(error.kind, ErrorKind::HttpStatus(404));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_status_succeeds_after_retries() {
        // 503 three times, then 200 — with max_retries = 3 the fourth
        // attempt succeeds
        let attempts = AtomicU32::new(0);
        let result = retry(&RetryPolicy::default(), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(status_failure(503))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_last_normalized_error() {
        let policy = RetryPolicy {
            max_retries: 2,
            ..Default::default()
        };
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(status_failure(503)) }
        })
        .await;

        let error = result.unwrap_err();
        assert_eq!(error.kind, ErrorKind::HttpStatus(503));
        assert!(error.retryable, "last error keeps its classification");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn predicate_overrides_default_retryability() {
        // Network failures are retryable by default; the predicate vetoes
        let policy = RetryPolicy {
            predicate: Some(Arc::new(|_, _| false)),
            ..Default::default()
        };
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = retry(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(RawFailure::Network("refused".into())) }
        })
        .await;

        assert_eq!(result.unwrap_err().kind, ErrorKind::Network);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn predicate_sees_attempt_numbers() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen_by_predicate = seen.clone();
        let policy = RetryPolicy {
            max_retries: 3,
            predicate: Some(Arc::new(move |_, attempt| {
                seen_by_predicate.lock().unwrap().push(attempt);
                attempt < 2
            })),
            ..Default::default()
        };

        let result: Result<(), _> = retry(&policy, || async {
            Err(RawFailure::Network("refused".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_never_sleeps() {
        let started = tokio::time::Instant::now();
        let result = retry(&RetryPolicy::default(), || async {
            Ok::<_, RawFailure>(1)
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
