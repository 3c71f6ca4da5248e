//! Crawl driver: walks the result pages of one topic, retries page-local
//! failures, drops duplicate posts and hands every page's new posts to a
//! [`RecordSink`] before moving on.

use postpulse_core::{CoreError, CrawlConfig, Post};
use records_store::RecordSink;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use weibo_client::{parse_page, Attempt, PageSource, RetryConfig, RetryExecutor};

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub retry: RetryConfig,
    /// Pause between successfully fetched pages
    pub page_delay: Duration,
    /// Stop after this many consecutive pages without a new post; 0 disables
    pub max_empty_pages: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            page_delay: Duration::from_secs(2),
            max_empty_pages: 3,
        }
    }
}

impl CollectorConfig {
    pub fn from_crawl(config: &CrawlConfig) -> Self {
        Self {
            retry: RetryConfig::from_crawl(config),
            page_delay: config.page_delay(),
            max_empty_pages: config.max_empty_pages,
        }
    }
}

/// What a finished crawl did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub pages_requested: u32,
    pub pages_fetched: u32,
    pub skipped_pages: Vec<u32>,
    pub records_added: usize,
    pub duplicates_dropped: usize,
    pub retries: u64,
    pub stopped_early: bool,
}

pub struct Collector<S> {
    source: S,
    config: CollectorConfig,
}

impl<S: PageSource> Collector<S> {
    pub fn new(source: S, config: CollectorConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Crawl pages `1..=page_count` of `topic` into `sink`.
    ///
    /// Network and parse failures are retried and then the page is skipped.
    /// Auth and rate-limit failures end the crawl with
    /// [`CoreError::CrawlAborted`]; everything appended before that point
    /// stays in the sink.
    pub async fn collect<K: RecordSink>(
        &self,
        topic: &str,
        page_count: u32,
        sink: &mut K,
    ) -> Result<CrawlReport, CoreError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(CoreError::InvalidInput {
                message: "crawl topic must not be empty".to_string(),
            });
        }

        let mut report = CrawlReport {
            pages_requested: page_count,
            ..CrawlReport::default()
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut executor = RetryExecutor::new(self.config.retry.clone());
        let mut consecutive_empty = 0u32;

        info!("Starting crawl of '{}' over {} pages", topic, page_count);

        for page in 1..=page_count {
            let source = &self.source;
            let operation_name = format!("page {}", page);
            let attempt = executor
                .execute(&operation_name, move || async move {
                    let payload = source.fetch_page(topic, page).await?;
                    parse_page(&payload)
                })
                .await;

            let posts = match attempt {
                Ok(Attempt::Succeeded { value, .. }) => value,
                Ok(Attempt::Exhausted {
                    last_error,
                    attempts,
                }) => {
                    warn!(
                        "Skipping page {} after {} attempts ({}): {}",
                        page,
                        attempts,
                        last_error.reason(),
                        last_error
                    );
                    report.skipped_pages.push(page);
                    continue;
                }
                Err(error) => {
                    warn!(
                        "Aborting crawl at page {} ({}); {} records kept",
                        page,
                        error.reason(),
                        report.records_added
                    );
                    return Err(CoreError::CrawlAborted {
                        page,
                        source: error,
                    });
                }
            };
            report.pages_fetched += 1;

            let fresh = keep_unseen(posts, &mut seen, &mut report.duplicates_dropped);
            sink.append(&fresh)?;
            report.records_added += fresh.len();
            info!(
                "Page {} added {} new posts ({} total)",
                page,
                fresh.len(),
                report.records_added
            );

            if fresh.is_empty() {
                consecutive_empty += 1;
                if self.config.max_empty_pages > 0
                    && consecutive_empty >= self.config.max_empty_pages
                {
                    info!(
                        "No new posts on the last {} pages, stopping crawl",
                        consecutive_empty
                    );
                    report.stopped_early = true;
                    break;
                }
            } else {
                consecutive_empty = 0;
            }

            if page < page_count && !self.config.page_delay.is_zero() {
                sleep(self.config.page_delay).await;
            }
        }

        report.retries = executor.metrics().total_retries;
        info!(
            "Crawl of '{}' finished: {} records from {}/{} pages, {} skipped, {} duplicates dropped",
            topic,
            report.records_added,
            report.pages_fetched,
            report.pages_requested,
            report.skipped_pages.len(),
            report.duplicates_dropped
        );
        Ok(report)
    }
}

/// First occurrence of an id wins; later copies are dropped.
fn keep_unseen(posts: Vec<Post>, seen: &mut HashSet<String>, dropped: &mut usize) -> Vec<Post> {
    let mut fresh = Vec::with_capacity(posts.len());
    for post in posts {
        if seen.insert(post.id.clone()) {
            fresh.push(post);
        } else {
            debug!("Skipping duplicate post {}", post.id);
            *dropped += 1;
        }
    }
    fresh
}
