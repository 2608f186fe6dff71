use std::future::Future;
use std::time::Duration;

use crate::SieveError;

/// Retry policy for retrieval tasks and embedding-provider calls.
///
/// Controls how many times to retry, the backoff schedule, and which errors
/// are eligible for retrying.
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: usize,
    /// Base delay for exponential backoff. The actual delay for attempt `n` is
    /// `min(base_delay * 2^n, max_delay)`.
    pub base_delay: Duration,
    /// Upper bound on the backoff delay.
    pub max_delay: Duration,
    /// Optional predicate to decide if an error is retryable.
    /// When `None`, all errors are retried.
    #[allow(clippy::type_complexity)]
    retry_on: Option<Box<dyn Fn(&SieveError) -> bool + Send + Sync>>,
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("retry_on", &self.retry_on.as_ref().map(|_| "..."))
            .finish()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            retry_on: None,
        }
    }
}

/// The last error of an operation that ran out of attempts.
#[derive(Debug)]
pub struct RetryError {
    pub error: SieveError,
    pub attempts: usize,
}

impl RetryPolicy {
    /// Set the maximum number of attempts (including the initial attempt).
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the base delay for exponential backoff.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Set the upper bound on the backoff delay.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set a predicate to decide which errors are retryable.
    pub fn with_retry_on(
        mut self,
        predicate: impl Fn(&SieveError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retry_on = Some(Box::new(predicate));
        self
    }

    fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt as u32).unwrap_or(u32::MAX);
        std::cmp::min(self.base_delay.saturating_mul(factor), self.max_delay)
    }

    fn should_retry(&self, error: &SieveError) -> bool {
        match &self.retry_on {
            Some(predicate) => predicate(error),
            None => true,
        }
    }

    /// Run `op` until it succeeds or the policy gives up.
    ///
    /// `op` receives the 0-indexed attempt number.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, SieveError>>,
    {
        if self.max_attempts == 0 {
            return Err(RetryError {
                error: SieveError::Config("RetryPolicy: max_attempts must be >= 1".into()),
                attempts: 0,
            });
        }

        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let attempts = attempt + 1;
                    if attempts >= self.max_attempts || !self.should_retry(&error) {
                        return Err(RetryError { error, attempts });
                    }
                    tracing::warn!(attempt = attempts, error = %error, "retrying after failure");
                    tokio::time::sleep(self.delay_for_attempt(attempt)).await;
                    attempt += 1;
                }
            }
        }
    }
}
