
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::{DocqaError, Result};

/// Retry policy applied uniformly to every external backend call.
///
/// Server errors and transport failures are retried with exponential
/// backoff plus jitter; client errors fail immediately. On exhaustion the
/// caller sees [`DocqaError::BackendUnavailable`] and takes its fallback
/// path instead of hanging or crashing.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    #[inline]
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    #[inline]
    pub fn new(max_attempts: u32, base_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_jitter,
        }
    }

    /// Run a blocking HTTP request under this policy and return the raw
    /// response body.
    #[inline]
    pub fn execute<F>(&self, what: &str, mut request_fn: F) -> Result<String>
    where
        F: FnMut() -> std::result::Result<String, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            debug!("{}: attempt {}/{}", what, attempt, self.max_attempts);

            match request_fn() {
                Ok(body) => return Ok(body),
                Err(error) => {
                    let retryable = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 {
                                warn!("{}: server error {}, will retry", what, status);
                                true
                            } else {
                                warn!("{}: client error {}, not retrying", what, status);
                                return Err(DocqaError::BackendUnavailable(format!(
                                    "{} failed with HTTP {}",
                                    what, status
                                )));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!("{}: transport error: {}", what, error);
                            true
                        }
                        _ => {
                            warn!("{}: non-retryable error: {}", what, error);
                            false
                        }
                    };

                    if !retryable {
                        return Err(DocqaError::BackendUnavailable(format!(
                            "{} failed: {}",
                            what, error
                        )));
                    }

                    last_error = Some(error);

                    if attempt < self.max_attempts {
                        let delay = self.backoff_delay(attempt);
                        debug!("{}: waiting {:?} before retry", what, delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        Err(DocqaError::BackendUnavailable(format!(
            "{} failed after {} attempts: {}",
            what,
            self.max_attempts,
            last_error.map_or_else(|| "unknown error".to_string(), |e| e.to_string())
        )))
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let backoff = self.base_delay.saturating_mul(2u32.saturating_pow(attempt - 1));
        let jitter_ms = self.max_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return backoff;
        }
        backoff + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}
