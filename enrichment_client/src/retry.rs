use config_manager::EnrichmentConfig;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryableError {
    /// HTTP 429
    RateLimit,
    /// HTTP 5xx
    ServerError,
    Timeout,
    /// Not retried
    Other,
}

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt
    pub max_attempts: u32,
    pub rate_limit_delays_ms: Vec<u64>,
    pub server_error_delays_ms: Vec<u64>,
    pub timeout_delays_ms: Vec<u64>,
}

impl RetryConfig {
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            rate_limit_delays_ms: config.rate_limit_backoff_ms.clone(),
            server_error_delays_ms: config.server_error_backoff_ms.clone(),
            timeout_delays_ms: config.timeout_backoff_ms.clone(),
        }
    }

    fn delay(&self, attempt: u32, kind: RetryableError) -> Option<Duration> {
        let delays = match kind {
            RetryableError::RateLimit => &self.rate_limit_delays_ms,
            RetryableError::ServerError => &self.server_error_delays_ms,
            RetryableError::Timeout => &self.timeout_delays_ms,
            RetryableError::Other => return None,
        };

        // past the end of the table, keep the longest delay
        delays
            .get(attempt as usize)
            .or_else(|| delays.last())
            .map(|&ms| Duration::from_millis(ms))
    }
}

/// Run `operation` until it succeeds, hits a non-retryable error, or runs out of attempts
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    config: &RetryConfig,
    classify_error: impl Fn(&E) -> RetryableError,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    debug!("Request succeeded after {} retries", attempt);
                }
                return Ok(result);
            }
            Err(e) => {
                let kind = classify_error(&e);
                if attempt >= config.max_attempts {
                    return Err(e);
                }

                let Some(delay) = config.delay(attempt, kind) else {
                    return Err(e);
                };

                warn!(
                    "Request failed (attempt {}/{}): {} - retrying in {}ms ({:?})",
                    attempt + 1,
                    config.max_attempts + 1,
                    e,
                    delay.as_millis(),
                    kind
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct TestError(&'static str);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "TestError: {}", self.0)
        }
    }

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            rate_limit_delays_ms: vec![5, 10],
            server_error_delays_ms: vec![5, 10],
            timeout_delays_ms: vec![5],
        }
    }

    #[tokio::test]
    async fn test_non_retryable_error() {
        let mut attempts = 0;
        let result = retry_with_backoff(
            || {
                attempts += 1;
                async { Err::<i32, _>(TestError("bad request")) }
            },
            &fast(3),
            |_| RetryableError::Other,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let mut attempts = 0;
        let result = retry_with_backoff(
            || {
                attempts += 1;
                let current = attempts;
                async move {
                    if current < 3 {
                        Err(TestError("rate limited"))
                    } else {
                        Ok(42)
                    }
                }
            },
            &fast(3),
            |_| RetryableError::RateLimit,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts, 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries() {
        let mut attempts = 0;
        let result = retry_with_backoff(
            || {
                attempts += 1;
                async { Err::<i32, _>(TestError("server error")) }
            },
            &fast(2),
            |_| RetryableError::ServerError,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_tables_follow_enrichment_config() {
        let mut enrichment = config_manager::SystemConfig::default().enrichment;
        enrichment.max_retries = 4;
        enrichment.timeout_backoff_ms = vec![];

        let config = RetryConfig::from_config(&enrichment);
        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.delay(0, RetryableError::RateLimit), Some(Duration::from_millis(500)));
        assert_eq!(config.delay(9, RetryableError::ServerError), Some(Duration::from_millis(1200)));
        // empty table disables retries for that kind
        assert_eq!(config.delay(0, RetryableError::Timeout), None);
    }

    #[test]
    fn test_delay_table_saturates() {
        let config = fast(5);
        assert_eq!(config.delay(4, RetryableError::Timeout), Some(Duration::from_millis(5)));
        assert_eq!(config.delay(0, RetryableError::Other), None);
    }
}
