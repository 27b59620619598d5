// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry engine with exponential backoff for the transport boundary.
//
// Only errors whose kind appears in the policy's retryable set are retried;
// everything else propagates unchanged on the first failure. The final error
// after exhaustion is the original failure, never a wrapper.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use lichtbild_core::error::{ErrorKind, LichtbildError, Result};

/// Immutable retry configuration. Construct one of the named policies (or a
/// custom literal) once and share it; policies are never mutated at call time.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first. Zero means the
    /// operation is never attempted and fails immediately.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Growth factor applied per attempt.
    pub backoff_multiplier: f64,
    /// Ceiling on any single backoff delay.
    pub max_delay: Duration,
    /// Error kinds worth retrying.
    pub retryable_kinds: Vec<ErrorKind>,
}

impl RetryPolicy {
    /// Default policy for asset uploads: transport and connectivity failures
    /// are retried, everything else fails fast.
    pub fn upload_default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            retryable_kinds: vec![ErrorKind::Upload, ErrorKind::Network],
        }
    }

    /// Retries connectivity failures only; used for status polling, where a
    /// server-reported error must surface immediately.
    pub fn network_only() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(10),
            retryable_kinds: vec![ErrorKind::Network],
        }
    }

    /// Aggressive policy for must-not-drop call sites; also retries local
    /// processing failures.
    pub fn critical() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(60),
            retryable_kinds: vec![ErrorKind::Upload, ErrorKind::Network, ErrorKind::Processing],
        }
    }

    /// Explicitly disables the call site: zero attempts, immediate failure.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_delay: Duration::ZERO,
            retryable_kinds: Vec::new(),
        }
    }

    /// Whether this policy retries the given error kind.
    pub fn retries(&self, kind: ErrorKind) -> bool {
        self.retryable_kinds.contains(&kind)
    }

    /// Backoff delay before the attempt following `attempt` (1-based):
    /// `min(max_delay, initial_delay * backoff_multiplier^(attempt - 1))`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let raw_ms = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = raw_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }
}

/// Run `operation` under the policy.
///
/// The retry observer fires once per failed attempt that will be retried —
/// exactly `attempts - 1` times on the failing path and never on
/// first-attempt success. The error eventually returned is the underlying
/// failure itself, untouched.
pub async fn execute_with_retry<T, F, Fut, O>(
    mut operation: F,
    policy: &RetryPolicy,
    mut on_retry: O,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    O: FnMut(u32, &LichtbildError),
{
    if policy.max_attempts == 0 {
        warn!("retry policy allows zero attempts");
        return Err(LichtbildError::NoAttemptsConfigured);
    }

    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => {
                debug!(attempt, "operation succeeded");
                return Ok(value);
            }
            Err(err) => {
                let kind = err.kind();
                if !policy.retries(kind) {
                    info!(attempt, ?kind, "error kind is not retryable; giving up");
                    return Err(err);
                }
                if attempt >= policy.max_attempts {
                    warn!(attempt, max = policy.max_attempts, "retry limit exhausted");
                    return Err(err);
                }

                on_retry(attempt, &err);
                let delay = policy.delay_for_attempt(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling retry");
                // Suspends here; dropping the future cancels the timer, so a
                // pipeline reset never leaves a pending retry behind.
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// A zero-argument callable binding an operation to a policy, for call sites
/// that re-run the same guarded operation.
pub struct RetryWrapper<F> {
    operation: F,
    policy: RetryPolicy,
}

/// Bind `operation` to `policy`.
pub fn retry_wrapper<F>(operation: F, policy: RetryPolicy) -> RetryWrapper<F> {
    RetryWrapper { operation, policy }
}

impl<F, Fut, T> RetryWrapper<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    /// Run the bound operation with the bound policy's full retry semantics.
    pub async fn call(&mut self) -> Result<T> {
        execute_with_retry(&mut self.operation, &self.policy, |_, _| {}).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Operation failing with `err_of(n)` for the first `failures` calls, then
    /// succeeding with the call count.
    fn flaky(
        calls: Arc<AtomicU32>,
        failures: u32,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = Result<u32>> + Send>> {
        move || {
            let calls = calls.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n <= failures {
                    Err(LichtbildError::Network(format!("outage on call {n}")))
                } else {
                    Ok(n)
                }
            })
        }
    }

    #[tokio::test]
    async fn first_attempt_success_never_fires_observer() {
        let calls = Arc::new(AtomicU32::new(0));
        let observed = Arc::new(AtomicU32::new(0));
        let observer_count = observed.clone();

        let result = execute_with_retry(
            flaky(calls.clone(), 0),
            &RetryPolicy::upload_default(),
            move |_, _| {
                observer_count.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(observed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn fails_twice_then_succeeds_is_called_three_times() {
        let calls = Arc::new(AtomicU32::new(0));
        let observed = Arc::new(AtomicU32::new(0));
        let observer_count = observed.clone();

        let result = execute_with_retry(
            flaky(calls.clone(), 2),
            &RetryPolicy::upload_default(),
            move |_, _| {
                observer_count.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(observed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_returns_the_original_error() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u32> = execute_with_retry(
            flaky(calls.clone(), u32::MAX),
            &RetryPolicy::upload_default(),
            |_, _| {},
        )
        .await;

        // Exactly max_attempts calls, and the error is the underlying network
        // failure from the final attempt — not a wrapper.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(LichtbildError::Network(message)) => {
                assert_eq!(message, "outage on call 3");
            }
            other => panic!("expected the final network error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_retryable_kind_fails_on_first_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<u32> = execute_with_retry(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(LichtbildError::Validation("bad file".into())) }
            },
            &RetryPolicy::upload_default(),
            |_, _| panic!("observer must not fire for non-retryable errors"),
        )
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(LichtbildError::Validation(_))));
    }

    #[tokio::test]
    async fn zero_attempt_policy_fails_without_calling() {
        let calls = Arc::new(AtomicU32::new(0));

        let result: Result<u32> =
            execute_with_retry(flaky(calls.clone(), 0), &RetryPolicy::none(), |_, _| {}).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(result, Err(LichtbildError::NoAttemptsConfigured)));
    }

    #[tokio::test(start_paused = true)]
    async fn critical_policy_retries_processing_errors() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<u32> = execute_with_retry(
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n == 1 {
                        Err(LichtbildError::Processing("transient glitch".into()))
                    } else {
                        Ok(n)
                    }
                }
            },
            &RetryPolicy::critical(),
            |_, _| {},
        )
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn wrapper_is_reusable() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut wrapper = retry_wrapper(flaky(calls.clone(), 1), RetryPolicy::upload_default());

        // First run: one failure, then success on the second attempt.
        assert_eq!(wrapper.call().await.unwrap(), 2);
        // Second run: the underlying operation now succeeds immediately.
        assert_eq!(wrapper.call().await.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_delay_grows_and_caps() {
        let policy = RetryPolicy::upload_default();
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        // Far past the cap.
        assert_eq!(policy.delay_for_attempt(20), Duration::from_secs(30));
    }

    #[test]
    fn named_policies_classify_kinds() {
        assert!(RetryPolicy::upload_default().retries(ErrorKind::Network));
        assert!(!RetryPolicy::upload_default().retries(ErrorKind::Validation));
        assert!(!RetryPolicy::network_only().retries(ErrorKind::Upload));
        assert!(RetryPolicy::critical().retries(ErrorKind::Processing));
        assert!(!RetryPolicy::none().retries(ErrorKind::Network));
    }
}
