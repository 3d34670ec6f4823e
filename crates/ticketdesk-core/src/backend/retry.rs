use std::thread;
use std::time::Duration;

use super::BackendError;

/// Blocking pause between attempts. Injected so tests do not sleep.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Linear backoff for writes: after failed attempt `n`, wait
/// `base_delay * n` and try again, at most `max_retries` times after the
/// first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that tries once.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// First attempt plus retries.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Pause after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Run `op` until it succeeds or the retries are used up. Every failure is
    /// retried; `op` receives the 1-based attempt number.
    ///
    /// # Errors
    ///
    /// Returns the last error from `op`.
    pub fn run<T, S, F>(&self, sleeper: &S, what: &str, mut op: F) -> Result<T, BackendError>
    where
        S: Sleeper + ?Sized,
        F: FnMut(u32) -> Result<T, BackendError>,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        what,
                        attempt,
                        max_attempts,
                        ?delay,
                        transient = err.is_transient(),
                        error = %err,
                        "write failed; retrying"
                    );
                    sleeper.sleep(delay);
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(what, attempt, error = %err, "write failed; giving up");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RetryPolicy, Sleeper};
    use crate::backend::BackendError;
    use std::cell::RefCell;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<Duration>>);

    impl Sleeper for Recorder {
        fn sleep(&self, duration: Duration) {
            self.0.borrow_mut().push(duration);
        }
    }

    fn flaky() -> BackendError {
        BackendError::Transport("connection reset".into())
    }

    #[test]
    fn succeeds_on_third_attempt_with_linear_backoff() {
        let sleeper = Recorder::default();
        let result = RetryPolicy::default().run(&sleeper, "update", |attempt| {
            if attempt < 3 { Err(flaky()) } else { Ok(attempt) }
        });
        assert_eq!(result, Ok(3));
        assert_eq!(
            *sleeper.0.borrow(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn three_retries_after_the_first_attempt() {
        let sleeper = Recorder::default();
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::default().run(&sleeper, "update", |_| {
            calls += 1;
            Err(flaky())
        });
        assert_eq!(result, Err(flaky()));
        assert_eq!(calls, 4);
        assert_eq!(
            *sleeper.0.borrow(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3)
            ]
        );
    }

    #[test]
    fn client_errors_are_retried_too() {
        let sleeper = Recorder::default();
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::default().run(&sleeper, "update", |_| {
            calls += 1;
            Err(BackendError::Status {
                status: 409,
                body: "conflict".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls, 4);
        assert_eq!(sleeper.0.borrow().len(), 3);
    }

    #[test]
    fn none_tries_once() {
        let sleeper = Recorder::default();
        let mut calls = 0;
        let result: Result<(), _> = RetryPolicy::none().run(&sleeper, "noop", |_| {
            calls += 1;
            Err(flaky())
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
        assert!(sleeper.0.borrow().is_empty());
    }
}
