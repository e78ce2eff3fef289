use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Fixed-interval, bounded-attempt driver shared by job polling and upload retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poller {
    interval: Duration,
    max_attempts: u32,
}

/// Result of polling until a terminal value shows up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The predicate accepted this value
    Ready { value: T, attempts: u32 },

    /// Attempts ran out; carries the last observed value
    Exhausted { last: T, attempts: u32 },
}

/// Final error of a retried operation once attempts ran out
#[derive(Debug)]
pub struct RetriesExhausted<E> {
    pub error: E,
    pub attempts: u32,
}

impl Poller {
    /// A `max_attempts` of zero is treated as one attempt
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Call `op` until `is_terminal` accepts its output or attempts run out.
    ///
    /// Sleeps `interval` between calls, never after the last one. An error
    /// from `op` ends polling immediately.
    pub async fn poll_until<T, E, F, Fut, P>(&self, mut op: F, is_terminal: P) -> Result<PollOutcome<T>, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&T) -> bool,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let value = op(attempt).await?;

            if is_terminal(&value) {
                return Ok(PollOutcome::Ready { value, attempts: attempt });
            }
            if attempt >= self.max_attempts {
                return Ok(PollOutcome::Exhausted { last: value, attempts: attempt });
            }

            sleep(self.interval).await;
        }
    }

    /// Call `op` until it succeeds, backing off `interval` after each failure.
    ///
    /// Only the error of the final attempt is returned.
    pub async fn retry<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetriesExhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= self.max_attempts => {
                    return Err(RetriesExhausted { error, attempts: attempt });
                }
                Err(error) => {
                    tracing::warn!(
                        "Attempt {}/{} failed: {}. Retrying in {}s...",
                        attempt,
                        self.max_attempts,
                        error,
                        self.interval.as_secs_f64()
                    );
                    sleep(self.interval).await;
                }
            }
        }
    }
}
