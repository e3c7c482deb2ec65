//! Bounded retries with exponential backoff for calls to external services.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::HttpSettings;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&HttpSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(s: &HttpSettings) -> Self {
        Self { max_retries: s.max_retries, base_delay: Duration::from_millis(s.backoff_ms), max_delay: Duration::from_secs(10), jitter: true }
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        let exp = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX).min(16);
        let mut delay = self.base_delay.saturating_mul(1u32 << exp).min(self.max_delay);
        if self.jitter && !delay.is_zero() {
            let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
            delay = delay.mul_f64(factor);
        }
        delay
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0usize;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.backoff_delay(attempt);
                warn!(%what, attempt, ?delay, error = %e, "transient failure, retrying");
                sleep(delay).await;
            }
            Err(e) => {
                debug!(%what, attempts = attempt + 1, error = %e, "giving up");
                return Err(e);
            }
        }
    }
}
