//! Bounded polling with backoff and cancellation.
//!
//! Observation loops poll the control plane until a condition holds or a
//! deadline passes. The deadline bounds the total wait, not a single attempt.
//! A poll always happens at the deadline before the loop gives up.

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::debug;

use crate::{DEFAULT_MAX_POLL_INTERVAL, DEFAULT_POLL_INTERVAL, MIN_POLL_INTERVAL};

/// Interval schedule between polls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the first attempt.
    pub interval: Duration,

    /// Upper bound on the delay; doubling stops here.
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_interval: DEFAULT_MAX_POLL_INTERVAL,
        }
    }
}

impl RetryPolicy {
    /// Poll at a constant interval.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
        }
    }

    /// Double the interval after every attempt, up to `max_interval`.
    pub fn exponential(interval: Duration, max_interval: Duration) -> Self {
        Self {
            interval,
            max_interval,
        }
    }

    /// Delay after the given (zero-based) attempt, never below [`MIN_POLL_INTERVAL`].
    pub fn delay(&self, attempt: u32) -> Duration {
        let interval = self.interval.max(MIN_POLL_INTERVAL);
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        interval
            .saturating_mul(factor)
            .min(self.max_interval.max(interval))
    }
}

/// Cancellation signal shared with the caller.
///
/// Wraps the `watch::Receiver<bool>` shutdown channel used across the workspace;
/// `true` means stop.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    rx: Option<watch::Receiver<bool>>,
}

impl Shutdown {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Returns true if shutdown has been requested.
    pub fn is_triggered(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once shutdown is requested. Never resolves if the sender is gone.
    pub async fn triggered(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.wait_for(|stop| *stop).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

impl From<watch::Receiver<bool>> for Shutdown {
    fn from(rx: watch::Receiver<bool>) -> Self {
        Self::new(rx)
    }
}

/// Outcome of a single poll.
#[derive(Debug)]
pub enum Attempt<T, P, E> {
    /// The condition holds.
    Ready(T),

    /// Not there yet; `P` describes what is missing.
    Pending(P),

    /// Stop polling.
    Fatal(E),
}

/// Why a polling loop ended without a result.
#[derive(Debug)]
pub enum RetryError<P, E> {
    /// The deadline passed. `last` is the final pending description.
    Timeout {
        elapsed: Duration,
        attempts: u32,
        last: P,
    },

    /// Shutdown was requested.
    Cancelled,

    /// An attempt returned a fatal error.
    Fatal(E),
}

/// Poll `attempt` until it is ready, fails fatally, times out, or is cancelled.
///
/// Attempts run strictly one after another, so each one observes state no older
/// than the previous one. Shutdown interrupts both an attempt in flight and the
/// sleep between attempts. A timeout too large to represent as an instant means
/// no deadline.
pub async fn retry_until<T, P, E, F, Fut>(
    policy: &RetryPolicy,
    timeout: Duration,
    shutdown: &mut Shutdown,
    mut attempt: F,
) -> Result<T, RetryError<P, E>>
where
    P: Debug,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T, P, E>>,
{
    let started = Instant::now();
    let deadline = started.checked_add(timeout);
    let mut attempts = 0u32;

    loop {
        if shutdown.is_triggered() {
            return Err(RetryError::Cancelled);
        }

        let outcome = tokio::select! {
            outcome = attempt(attempts) => outcome,
            _ = shutdown.triggered() => return Err(RetryError::Cancelled),
        };
        attempts += 1;

        let pending = match outcome {
            Attempt::Ready(value) => return Ok(value),
            Attempt::Fatal(err) => return Err(RetryError::Fatal(err)),
            Attempt::Pending(pending) => pending,
        };

        let now = Instant::now();
        let mut wait = policy.delay(attempts - 1);
        if let Some(deadline) = deadline {
            if now >= deadline {
                return Err(RetryError::Timeout {
                    elapsed: now.saturating_duration_since(started),
                    attempts,
                    last: pending,
                });
            }
            wait = wait.min(deadline.saturating_duration_since(now));
        }

        debug!(
            attempt = attempts,
            wait_ms = wait.as_millis() as u64,
            pending = ?pending,
            "Not converged, polling again"
        );

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = shutdown.triggered() => return Err(RetryError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy::fixed(Duration::from_millis(500));
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(7), Duration::from_millis(500));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy::exponential(Duration::from_millis(100), Duration::from_secs(1));
        assert_eq!(policy.delay(0), Duration::from_millis(100));
        assert_eq!(policy.delay(1), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(800));
        assert_eq!(policy.delay(4), Duration::from_secs(1));
        assert_eq!(policy.delay(40), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_first_attempt_does_not_sleep() {
        let policy = RetryPolicy::fixed(Duration::from_secs(1));
        let started = Instant::now();

        let result: Result<u32, RetryError<(), Infallible>> =
            retry_until(&policy, Duration::from_secs(10), &mut Shutdown::never(), |n| async move {
                Attempt::Ready(n)
            })
            .await;

        assert_eq!(result.unwrap(), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_ready() {
        let policy = RetryPolicy::fixed(Duration::from_secs(1));

        let result: Result<u32, RetryError<&str, Infallible>> =
            retry_until(&policy, Duration::from_secs(10), &mut Shutdown::never(), |n| async move {
                if n < 3 {
                    Attempt::Pending("not yet")
                } else {
                    Attempt::Ready(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_polls_at_deadline() {
        let policy = RetryPolicy::fixed(Duration::from_secs(1));

        let result: Result<(), RetryError<u32, Infallible>> =
            retry_until(&policy, Duration::from_secs(2), &mut Shutdown::never(), |n| async move {
                Attempt::Pending(n)
            })
            .await;

        match result {
            Err(RetryError::Timeout {
                elapsed,
                attempts,
                last,
            }) => {
                assert_eq!(elapsed, Duration::from_secs(2));
                assert_eq!(attempts, 3);
                assert_eq!(last, 2);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_keeps_polling() {
        let policy = RetryPolicy::fixed(Duration::from_secs(1));

        let result: Result<u32, RetryError<&str, Infallible>> =
            retry_until(&policy, Duration::MAX, &mut Shutdown::never(), |n| async move {
                if n < 2 {
                    Attempt::Pending("not yet")
                } else {
                    Attempt::Ready(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[test]
    fn test_zero_interval_is_floored() {
        let policy = RetryPolicy::exponential(Duration::ZERO, Duration::ZERO);
        assert_eq!(policy.delay(0), MIN_POLL_INTERVAL);
        assert_eq!(policy.delay(10), MIN_POLL_INTERVAL);

        let policy = RetryPolicy::fixed(Duration::ZERO);
        assert_eq!(policy.delay(3), MIN_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_bounds_poll_rate() {
        let policy = RetryPolicy::fixed(Duration::ZERO);
        let mut calls = 0u32;

        let result: Result<(), RetryError<(), Infallible>> = retry_until(
            &policy,
            Duration::from_millis(200),
            &mut Shutdown::never(),
            |_| {
                calls += 1;
                async { Attempt::Pending(()) }
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Timeout { .. })));
        // every MIN_POLL_INTERVAL over 200ms, plus the poll at 0s
        assert_eq!(calls, 21);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_stops_immediately() {
        let policy = RetryPolicy::fixed(Duration::from_secs(1));

        let result: Result<(), RetryError<(), &str>> =
            retry_until(&policy, Duration::from_secs(10), &mut Shutdown::never(), |_| async {
                Attempt::Fatal("gone")
            })
            .await;

        assert!(matches!(result, Err(RetryError::Fatal("gone"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        let policy = RetryPolicy::fixed(Duration::from_secs(60));
        let (tx, rx) = watch::channel(false);
        let mut shutdown = Shutdown::new(rx);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            tx.send(true).unwrap();
        });

        let started = Instant::now();
        let result: Result<(), RetryError<(), Infallible>> =
            retry_until(&policy, Duration::from_secs(600), &mut shutdown, |_| async {
                Attempt::Pending(())
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_attempt() {
        let (_tx, rx) = watch::channel(true);
        let mut shutdown = Shutdown::new(rx);
        let mut calls = 0;

        let result: Result<(), RetryError<(), Infallible>> = retry_until(
            &RetryPolicy::default(),
            Duration::from_secs(10),
            &mut shutdown,
            |_| {
                calls += 1;
                async { Attempt::Ready(()) }
            },
        )
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_dropped_sender_never_triggers() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        assert!(!Shutdown::new(rx).is_triggered());
        assert!(!Shutdown::never().is_triggered());
    }
}
