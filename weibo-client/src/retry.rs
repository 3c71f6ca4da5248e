use postpulse_core::{CrawlConfig, ErrorExt, WeiboApiError};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts per operation, the first one included
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RetryConfig {
    pub fn from_crawl(config: &CrawlConfig) -> Self {
        Self {
            max_attempts: config.retry_attempts.max(1),
            backoff: config.retry_backoff(),
        }
    }
}

/// Retry strategy based on error type
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Page-local failure, try the same page again
    Retry,
    /// Another attempt cannot help: session-wide failure or a rejected request
    Abort,
}

/// Determine retry strategy based on error type
pub fn get_retry_strategy(error: &WeiboApiError) -> RetryStrategy {
    if error.is_retryable() {
        RetryStrategy::Retry
    } else {
        RetryStrategy::Abort
    }
}

/// Outcome of an operation whose failures were all retryable.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { last_error: WeiboApiError, attempts: u32 },
}

/// Retry metrics for monitoring
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryMetrics {
    pub total_retries: u64,
    pub successful_retries: u64,
    pub exhausted_operations: u64,
}

/// Retry executor that wraps operations with retry logic
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    metrics: RetryMetrics,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            metrics: RetryMetrics::default(),
        }
    }

    pub fn metrics(&self) -> &RetryMetrics {
        &self.metrics
    }

    /// Run `operation` until it succeeds, fails with an error another attempt
    /// cannot fix (returned as `Err`), or runs out of attempts (`Ok(Attempt::Exhausted)`).
    pub async fn execute<F, Fut, T>(
        &mut self,
        operation_name: &str,
        mut operation: F,
    ) -> Result<Attempt<T>, WeiboApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WeiboApiError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            if attempt > 1 {
                debug!("Retry attempt {} for {}", attempt - 1, operation_name);
            }

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        self.metrics.successful_retries += 1;
                        info!(
                            "Operation {} succeeded after {} retries",
                            operation_name,
                            attempt - 1
                        );
                    }
                    return Ok(Attempt::Succeeded {
                        value,
                        attempts: attempt,
                    });
                }
                Err(error) => match get_retry_strategy(&error) {
                    RetryStrategy::Abort => {
                        error.log_error();
                        return Err(error);
                    }
                    RetryStrategy::Retry if attempt < max_attempts => {
                        self.metrics.total_retries += 1;
                        info!(
                            "Retrying {} in {:?} due to: {}",
                            operation_name, self.config.backoff, error
                        );
                        sleep(self.config.backoff).await;
                    }
                    RetryStrategy::Retry => {
                        self.metrics.exhausted_operations += 1;
                        warn!(
                            "Operation {} failed after {} attempts: {}",
                            operation_name, attempt, error
                        );
                        return Ok(Attempt::Exhausted {
                            last_error: error,
                            attempts: attempt,
                        });
                    }
                },
            }
        }
    }
}
