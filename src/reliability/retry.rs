//! Fixed-delay retry for blocking operations.
//!
//! Delays come from `backon`'s constant backoff; the loop itself is blocking
//! because backend calls run synchronously on the caller's thread.
//!
//! # Example
//!
//! ```rust,ignore
//! use blobgate::reliability::retry::{retry_sync, RetryPolicy};
//!
//! let data = retry_sync(&RetryPolicy::ftp(), "ftp retrieve", || download(id), |e| e.is_transient())?;
//! ```

use backon::{BackoffBuilder, ConstantBuilder};
use std::time::Duration;
use tracing::{debug, warn};

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Zero behaves like one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::ftp()
    }
}

impl RetryPolicy {
    /// Policy for FTP transfers: 3 attempts, 1 second apart.
    #[must_use]
    pub const fn ftp() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }

    /// A single attempt, no retries.
    #[must_use]
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }

    /// Set the pause between attempts.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Set the total number of attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    fn delays(&self) -> impl Iterator<Item = Duration> {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(retries)
            .build()
    }
}

/// Retry a blocking operation with a fixed delay.
///
/// Stops on success, on the first error `is_retryable` rejects, or when the
/// policy's attempts are used up. The last error is returned.
///
/// # Arguments
///
/// * `policy` - Attempts and delay
/// * `operation_name` - Name for logging
/// * `operation` - The operation to run
/// * `is_retryable` - Predicate selecting transient errors
pub fn retry_sync<T, E, F, R>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
    is_retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delays = policy.delays();
    let mut attempt = 1u32;

    loop {
        match operation() {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = %operation_name,
                        attempts = attempt,
                        "Operation succeeded after retries"
                    );
                }
                return Ok(result);
            },
            Err(e) => {
                if !is_retryable(&e) {
                    debug!(
                        operation = %operation_name,
                        error = %e,
                        "Permanent error, not retrying"
                    );
                    return Err(e);
                }

                let Some(delay) = delays.next() else {
                    warn!(
                        operation = %operation_name,
                        attempts = attempt,
                        error = %e,
                        "Max retries exhausted"
                    );
                    return Err(e);
                };

                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    next_delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient error, retrying"
                );

                if !delay.is_zero() {
                    std::thread::sleep(delay);
                }
                attempt += 1;
            },
        }
    }
}
