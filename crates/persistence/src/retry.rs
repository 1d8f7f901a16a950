//! Bounded retry with exponential backoff and jitter (spec §4.2: "base
//! 100 ms, factor 2, max 5 attempts, jitter"). Only `Error::is_retryable`
//! failures are retried; domain errors (conflict, schema) surface on the
//! first attempt.

use std::future::Future;
use std::time::Duration;

use ac_domain::config::RetryConfig;
use ac_domain::Result;
use rand::Rng;

pub async fn with_retry<T, F, Fut>(cfg: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < cfg.max_attempts => {
                let backoff_ms = cfg.base_delay_ms as f64 * cfg.factor.powi(attempt as i32 - 1);
                let jitter_ms = rand::rng().random_range(0..=(cfg.base_delay_ms / 4).max(1));
                let delay = Duration::from_millis(backoff_ms as u64 + jitter_ms);
                tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_domain::Error;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_without_retry_on_first_attempt() {
        let cfg = RetryConfig::default();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<u32> = with_retry(&cfg, || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors_up_to_max_attempts() {
        let cfg = RetryConfig {
            base_delay_ms: 1,
            factor: 1.0,
            max_attempts: 3,
        };
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<u32> = with_retry(&cfg, || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Timeout("still waiting".into()))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_domain_errors() {
        let cfg = RetryConfig::default();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let result: Result<u32> = with_retry(&cfg, || {
            let calls = calls2.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Conflict("stale updated_at".into()))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
