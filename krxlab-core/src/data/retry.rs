//! Retry policy with exponential backoff and jitter.
//!
//! The policy is a value passed into `PriceFetcher`; it never performs I/O
//! itself, so the attempt loop is testable with a recording sleeper.

use super::provider::DataError;
use rand::Rng;
use std::time::Duration;

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed { delay: Duration },
    /// `base * factor^retry`, capped at `max`, optionally jittered by +/- 50%.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(retry.min(i32::MAX as u32) as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let delay = Duration::from_secs_f64(seconds.max(0.0));
                if jitter && !delay.is_zero() {
                    let half = delay.as_millis() as u64 / 2;
                    let offset = rand::thread_rng().gen_range(0..=half * 2);
                    Duration::from_millis((delay.as_millis() as u64 - half) + offset)
                } else {
                    delay
                }
            }
        }
    }
}

/// Bounded attempts with a backoff schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

/// Final error of an operation together with how many attempts were spent.
#[derive(Debug)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub error: DataError,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no retries.
    pub fn no_retry() -> Self {
        Self::new(1, Backoff::Fixed { delay: Duration::ZERO })
    }

    /// Immediate retries, for tests and offline sources.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Backoff::Fixed { delay: Duration::ZERO })
    }

    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.backoff.delay(retry)
    }

    /// Run `op` until it succeeds, fails permanently, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T, F>(&self, op: F) -> Result<T, RetryExhausted>
    where
        F: FnMut(u32) -> Result<T, DataError>,
    {
        self.run_with_sleep(op, std::thread::sleep)
    }

    /// Same as [`run`](Self::run) with an injectable sleeper.
    pub fn run_with_sleep<T, F, S>(&self, mut op: F, mut sleep: S) -> Result<T, RetryExhausted>
    where
        F: FnMut(u32) -> Result<T, DataError>,
        S: FnMut(Duration),
    {
        let max = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(error) if !error.is_retryable() || attempt >= max => {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        error,
                    })
                }
                Err(error) => {
                    let mut delay = self.delay_for_retry(attempt - 1);
                    if let DataError::RateLimited { retry_after_secs } = &error {
                        delay = delay.max(Duration::from_secs(*retry_after_secs));
                    }
                    tracing::debug!(attempt, ?delay, error = %error, "retrying");
                    if !delay.is_zero() {
                        sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(jitter: bool) -> Backoff {
        Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_millis(1_000),
            jitter,
        }
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let b = Backoff::Fixed {
            delay: Duration::from_millis(250),
        };
        assert_eq!(b.delay(0), Duration::from_millis(250));
        assert_eq!(b.delay(7), Duration::from_millis(250));
    }

    #[test]
    fn exponential_backoff_grows_and_caps() {
        let b = exp(false);
        assert_eq!(b.delay(0), Duration::from_millis(100));
        assert_eq!(b.delay(1), Duration::from_millis(200));
        assert_eq!(b.delay(3), Duration::from_millis(800));
        assert_eq!(b.delay(4), Duration::from_millis(1_000));
        assert_eq!(b.delay(30), Duration::from_millis(1_000));
    }

    #[test]
    fn jitter_stays_within_half() {
        let b = exp(true);
        for _ in 0..100 {
            let d = b.delay(1).as_millis();
            assert!((100..=300).contains(&d), "jittered delay out of range: {d}");
        }
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::new(3, exp(false));
        let mut sleeps = Vec::new();
        let result = policy.run_with_sleep(
            |attempt| {
                if attempt < 3 {
                    Err(DataError::Timeout("slow".into()))
                } else {
                    Ok(attempt)
                }
            },
            |d| sleeps.push(d),
        );
        assert_eq!(result.unwrap(), 3);
        assert_eq!(sleeps, vec![Duration::from_millis(100), Duration::from_millis(200)]);
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let policy = RetryPolicy::immediate(4);
        let mut calls = 0;
        let err = policy
            .run_with_sleep(
                |_| -> Result<(), _> {
                    calls += 1;
                    Err(DataError::NetworkUnreachable("down".into()))
                },
                |_| {},
            )
            .unwrap_err();
        assert_eq!(calls, 4);
        assert_eq!(err.attempts, 4);
        assert!(matches!(err.error, DataError::NetworkUnreachable(_)));
    }

    #[test]
    fn permanent_error_is_not_retried() {
        let policy = RetryPolicy::immediate(5);
        let mut calls = 0;
        let err = policy
            .run_with_sleep(
                |_| -> Result<(), _> {
                    calls += 1;
                    Err(DataError::SymbolNotFound {
                        symbol: "000000.KS".into(),
                    })
                },
                |_| {},
            )
            .unwrap_err();
        assert_eq!(calls, 1);
        assert_eq!(err.attempts, 1);
    }

    #[test]
    fn rate_limit_waits_at_least_retry_after() {
        let policy = RetryPolicy::new(2, Backoff::Fixed { delay: Duration::from_millis(10) });
        let mut sleeps = Vec::new();
        let _ = policy.run_with_sleep(
            |attempt| {
                if attempt == 1 {
                    Err(DataError::RateLimited { retry_after_secs: 2 })
                } else {
                    Ok(())
                }
            },
            |d| sleeps.push(d),
        );
        assert_eq!(sleeps, vec![Duration::from_secs(2)]);
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let policy = RetryPolicy::new(0, Backoff::default());
        assert_eq!(policy.max_attempts, 1);
    }
}
