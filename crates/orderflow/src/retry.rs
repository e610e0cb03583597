//! Retry-Governed Action
//!
//! Wraps one externally observable action (navigate, click-that-opens-a-
//! popup, reload) in a bounded retry loop:
//!
//! 1. Run the action, post-condition included. Success returns at once.
//! 2. On failure at the last permitted attempt, fail with
//!    [`FlowError::ActionFailed`] carrying the cause and attempt count.
//! 3. Otherwise run the recovery step, sleep the inter-attempt delay and
//!    try again.
//!
//! Recovery runs exactly once between consecutive attempts, never before
//! the first or after the last. A failed recovery is logged and the next
//! attempt decides the outcome.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::driver::PageDriver;
use crate::result::{FlowError, FlowResult};
use crate::wait::{wait_for, LoadState, NavigationOptions, WaitCondition, WaitOptions};

/// Upper bound on attempts for any policy
pub const MAX_ATTEMPTS_CAP: u32 = 5;

/// Default number of attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Step run between failed attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Nothing between attempts
    #[default]
    None,
    /// Reload the page, then wait for DOM content
    Reload {
        /// Load state the reload settles on
        wait_until: LoadState,
        /// Reload timeout in milliseconds
        timeout_ms: u64,
    },
}

impl Recovery {
    /// Reload settling on network idle within 20 seconds
    #[must_use]
    pub const fn reload() -> Self {
        Self::Reload {
            wait_until: LoadState::NetworkIdle,
            timeout_ms: 20_000,
        }
    }

    /// Run this recovery against `page`
    ///
    /// # Errors
    ///
    /// Returns the reload or wait failure
    pub async fn run<P: PageDriver>(&self, page: &P) -> FlowResult<()> {
        match *self {
            Self::None => Ok(()),
            Self::Reload {
                wait_until,
                timeout_ms,
            } => {
                info!("reloading page");
                let options = NavigationOptions::new()
                    .with_wait_until(wait_until)
                    .with_timeout(timeout_ms);
                page.reload(&options).await?;
                wait_for(
                    page,
                    &WaitCondition::LoadState(LoadState::DomContentLoaded),
                    &WaitOptions::within(timeout_ms),
                )
                .await?;
                Ok(())
            }
        }
    }
}

/// Bounded retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    recovery: Recovery,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::ZERO,
            recovery: Recovery::None,
        }
    }
}

impl RetryPolicy {
    /// Create a policy permitting `max_attempts` attempts
    ///
    /// # Errors
    ///
    /// Returns a configuration error for 0 or more than [`MAX_ATTEMPTS_CAP`]
    pub fn new(max_attempts: u32) -> FlowResult<Self> {
        if max_attempts == 0 || max_attempts > MAX_ATTEMPTS_CAP {
            return Err(FlowError::configuration(format!(
                "max attempts must be between 1 and {MAX_ATTEMPTS_CAP}, got {max_attempts}"
            )));
        }
        Ok(Self {
            max_attempts,
            ..Self::default()
        })
    }

    /// Set the pause between attempts
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the recovery step
    #[must_use]
    pub const fn with_recovery(mut self, recovery: Recovery) -> Self {
        self.recovery = recovery;
        self
    }

    /// Maximum attempts
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause between attempts
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Recovery step
    #[must_use]
    pub const fn recovery(&self) -> Recovery {
        self.recovery
    }
}

/// Run `action` under `policy`, calling `recover` between failed attempts.
///
/// Both closures receive the 1-based number of the attempt that just ran
/// (for `recover`) or is about to run (for `action`).
///
/// # Errors
///
/// Returns `ActionFailed` with the last cause once attempts are exhausted
pub async fn execute<T, A, AF, R, RF>(
    policy: &RetryPolicy,
    label: &str,
    mut action: A,
    mut recover: R,
) -> FlowResult<T>
where
    A: FnMut(u32) -> AF,
    AF: Future<Output = FlowResult<T>>,
    R: FnMut(u32) -> RF,
    RF: Future<Output = FlowResult<()>>,
{
    let max = policy.max_attempts();
    let mut attempt = 1;
    loop {
        debug!(action = label, attempt, max, "attempting");
        match action(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(action = label, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(cause) => {
                warn!(action = label, attempt, max, error = %cause, "attempt failed");
                if attempt >= max {
                    return Err(FlowError::ActionFailed {
                        action: label.to_string(),
                        attempts: attempt,
                        cause: Box::new(cause),
                    });
                }
                if let Err(e) = recover(attempt).await {
                    warn!(action = label, attempt, error = %e, "recovery failed");
                }
                if !policy.delay().is_zero() {
                    tokio::time::sleep(policy.delay()).await;
                }
                attempt += 1;
            }
        }
    }
}

/// Run `action` under `policy`, using the policy's recovery against `page`
///
/// # Errors
///
/// Returns `ActionFailed` with the last cause once attempts are exhausted
pub async fn execute_on<P, T, A, AF>(
    page: &P,
    policy: &RetryPolicy,
    label: &str,
    action: A,
) -> FlowResult<T>
where
    P: PageDriver,
    A: FnMut(u32) -> AF,
    AF: Future<Output = FlowResult<T>>,
{
    let recovery = policy.recovery();
    execute(policy, label, action, |_| recovery.run(page)).await
}

/// Navigate to `url` and wait for `ready`, retrying under `policy`.
///
/// Each attempt is a full navigation followed by the readiness wait.
///
/// # Errors
///
/// Returns `ActionFailed` once attempts are exhausted
pub async fn open_with_retry<P: PageDriver>(
    page: &P,
    url: &str,
    navigation: &NavigationOptions,
    ready: &WaitCondition,
    ready_options: &WaitOptions,
    policy: &RetryPolicy,
) -> FlowResult<()> {
    let label = format!("open {url}");
    execute_on(page, policy, &label, |attempt| async move {
        info!(url, attempt, max = policy.max_attempts(), "navigating");
        page.goto(url, navigation).await?;
        wait_for(page, ready, ready_options).await?;
        Ok(())
    })
    .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::driver::{MockElement, MockPage, Operation, Reaction};
    use crate::locator::{Locator, Selector};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    mod policy_tests {
        use super::*;

        #[test]
        fn test_rejects_zero_and_above_cap() {
            assert!(matches!(
                RetryPolicy::new(0),
                Err(FlowError::Configuration { .. })
            ));
            assert!(RetryPolicy::new(MAX_ATTEMPTS_CAP + 1).is_err());
            assert_eq!(RetryPolicy::new(MAX_ATTEMPTS_CAP).unwrap().max_attempts(), 5);
        }

        #[test]
        fn test_default_policy() {
            let policy = RetryPolicy::default();
            assert_eq!(policy.max_attempts(), 3);
            assert_eq!(policy.recovery(), Recovery::None);
            assert!(policy.delay().is_zero());
        }

        mod property_tests {
            use super::*;
            use proptest::prelude::*;

            proptest! {
                #[test]
                fn prop_valid_range_accepted(n in 1u32..=MAX_ATTEMPTS_CAP) {
                    prop_assert_eq!(RetryPolicy::new(n).unwrap().max_attempts(), n);
                }

                #[test]
                fn prop_out_of_range_rejected(n in (MAX_ATTEMPTS_CAP + 1)..u32::MAX) {
                    prop_assert!(RetryPolicy::new(n).is_err());
                }
            }
        }
    }

    mod execute_tests {
        use super::*;

        #[tokio::test]
        async fn test_permanent_failure_runs_exactly_max_attempts() {
            for max in 1..=MAX_ATTEMPTS_CAP {
                let policy = RetryPolicy::new(max).unwrap();
                let attempts = AtomicU32::new(0);
                let recoveries = AtomicU32::new(0);

                let result: FlowResult<()> = execute(
                    &policy,
                    "always fails",
                    |_| {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        async { Err(FlowError::driver("boom")) }
                    },
                    |_| {
                        recoveries.fetch_add(1, Ordering::SeqCst);
                        async { Ok(()) }
                    },
                )
                .await;

                assert_eq!(attempts.load(Ordering::SeqCst), max);
                assert_eq!(recoveries.load(Ordering::SeqCst), max - 1);
                assert_eq!(result.unwrap_err().attempts(), Some(max));
            }
        }

        #[tokio::test]
        async fn test_recovery_only_between_attempts() {
            let log = Mutex::new(Vec::new());
            let policy = RetryPolicy::new(3).unwrap();

            let _ = execute(
                &policy,
                "interleaving",
                |n| {
                    log.lock().unwrap().push(format!("attempt{n}"));
                    async { Err::<(), _>(FlowError::driver("no")) }
                },
                |n| {
                    log.lock().unwrap().push(format!("recover{n}"));
                    async { Ok(()) }
                },
            )
            .await;

            assert_eq!(
                *log.lock().unwrap(),
                vec!["attempt1", "recover1", "attempt2", "recover2", "attempt3"]
            );
        }

        #[tokio::test]
        async fn test_first_attempt_success_skips_recovery() {
            let recoveries = AtomicU32::new(0);
            let value = execute(
                &RetryPolicy::default(),
                "ok",
                |_| async { Ok(42) },
                |_| {
                    recoveries.fetch_add(1, Ordering::SeqCst);
                    async { Ok(()) }
                },
            )
            .await
            .unwrap();
            assert_eq!(value, 42);
            assert_eq!(recoveries.load(Ordering::SeqCst), 0);
        }

        #[tokio::test]
        async fn test_failing_recovery_does_not_abort() {
            let attempts = AtomicU32::new(0);
            let value = execute(
                &RetryPolicy::new(3).unwrap(),
                "flaky",
                |n| {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 3 {
                            Err(FlowError::driver("not yet"))
                        } else {
                            Ok("done")
                        }
                    }
                },
                |_| async { Err(FlowError::driver("reload failed")) },
            )
            .await
            .unwrap();
            assert_eq!(value, "done");
            assert_eq!(attempts.load(Ordering::SeqCst), 3);
        }

        #[tokio::test(start_paused = true)]
        async fn test_delay_applies_between_attempts() {
            let policy = RetryPolicy::new(3)
                .unwrap()
                .with_delay(Duration::from_secs(1));
            let start = tokio::time::Instant::now();
            let _ = execute(
                &policy,
                "delayed",
                |_| async { Err::<(), _>(FlowError::driver("no")) },
                |_| async { Ok(()) },
            )
            .await;
            assert_eq!(start.elapsed(), Duration::from_secs(2));
        }
    }

    mod navigation_tests {
        use super::*;

        const ORDER_URL: &str = "https://orders.example.com/#/orderNew/1145/abc";

        fn create_order() -> Locator {
            Locator::role("button", "Create Order")
        }

        fn policy() -> RetryPolicy {
            RetryPolicy::new(3).unwrap().with_recovery(Recovery::reload())
        }

        #[tokio::test]
        async fn test_ready_after_reload() {
            let page = MockPage::new("about:blank");
            page.insert(MockElement::for_locator(&create_order()).hidden());
            page.on_reload(vec![Reaction::Show(Selector::role("button", "Create Order"))]);

            open_with_retry(
                &page,
                ORDER_URL,
                &NavigationOptions::new().with_wait_until(LoadState::NetworkIdle),
                &create_order().visible(),
                &WaitOptions::within(30),
                &policy(),
            )
            .await
            .unwrap();

            assert_eq!(page.count_events("goto:"), 2);
            assert_eq!(page.count_events("reload"), 1);
        }

        #[tokio::test]
        async fn test_navigation_failures_exhaust_policy() {
            let page = MockPage::new("about:blank");
            page.fail_next(Operation::Goto, 5);

            let err = open_with_retry(
                &page,
                ORDER_URL,
                &NavigationOptions::new(),
                &create_order().visible(),
                &WaitOptions::within(10),
                &policy(),
            )
            .await
            .unwrap_err();

            assert_eq!(err.attempts(), Some(3));
            assert!(matches!(err.root_cause(), FlowError::Navigation { .. }));
            assert_eq!(page.count_events("reload"), 2);
        }

        #[tokio::test]
        async fn test_reload_failure_is_tolerated() {
            let page = MockPage::new("about:blank");
            page.insert(MockElement::for_locator(&create_order()));
            page.fail_next(Operation::Goto, 1);
            page.fail_next(Operation::Reload, 1);

            open_with_retry(
                &page,
                ORDER_URL,
                &NavigationOptions::new(),
                &create_order().visible(),
                &WaitOptions::within(10),
                &policy(),
            )
            .await
            .unwrap();
            assert_eq!(page.current_url(), ORDER_URL);
        }
    }
}
