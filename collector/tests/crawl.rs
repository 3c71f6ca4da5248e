use collector::{Collector, CollectorConfig, CrawlReport};
use postpulse_core::{CoreError, FailureReason, Post, WeiboApiError};
use records_store::{load_records, RecordsWriter};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tempfile::TempDir;
use weibo_client::{PagePayload, PageSource, RetryConfig};

type Response = Result<PagePayload, WeiboApiError>;

/// Page source that replays canned responses per page. The last queued
/// response of a page repeats; pages with nothing queued come back empty.
#[derive(Default)]
struct ScriptedSource {
    responses: RefCell<HashMap<u32, VecDeque<Response>>>,
    calls: RefCell<Vec<u32>>,
}

impl ScriptedSource {
    fn page(self, page: u32, response: Response) -> Self {
        self.responses
            .borrow_mut()
            .entry(page)
            .or_default()
            .push_back(response);
        self
    }

    fn calls_for(&self, page: u32) -> usize {
        self.calls.borrow().iter().filter(|p| **p == page).count()
    }

    fn requested_pages(&self) -> Vec<u32> {
        let mut pages = self.calls.borrow().clone();
        pages.dedup();
        pages
    }
}

impl PageSource for ScriptedSource {
    async fn fetch_page(&self, _topic: &str, page: u32) -> Result<PagePayload, WeiboApiError> {
        self.calls.borrow_mut().push(page);
        let mut responses = self.responses.borrow_mut();
        match responses.get_mut(&page) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(|| Ok(cards(&[]))),
            Some(queue) => queue.front().cloned().unwrap_or_else(|| Ok(cards(&[]))),
            None => Ok(cards(&[])),
        }
    }
}

fn mblog(id: &str, text: &str) -> Value {
    json!({
        "card_type": 9,
        "mblog": {
            "id": id,
            "bid": format!("B{id}"),
            "created_at": "2024-12-01 08:00:00",
            "text": text,
            "reposts_count": 1,
            "comments_count": 2,
            "attitudes_count": 3,
            "user": { "screen_name": "someone", "followers_count": 10 },
            "source": "web"
        }
    })
}

fn cards(posts: &[(&str, &str)]) -> PagePayload {
    let cards: Vec<Value> = posts.iter().map(|(id, text)| mblog(id, text)).collect();
    PagePayload::from_value(json!({ "ok": 1, "data": { "cards": cards } }))
}

fn quick_config() -> CollectorConfig {
    CollectorConfig {
        retry: RetryConfig {
            max_attempts: 3,
            backoff: Duration::ZERO,
        },
        page_delay: Duration::ZERO,
        max_empty_pages: 3,
    }
}

fn ids(posts: &[Post]) -> Vec<&str> {
    posts.iter().map(|p| p.id.as_str()).collect()
}

#[tokio::test]
async fn test_same_page_twice_stores_each_post_once() {
    let page = cards(&[("1", "a"), ("2", "b")]);
    let source = ScriptedSource::default()
        .page(1, Ok(page.clone()))
        .page(2, Ok(page));
    let collector = Collector::new(source, quick_config());
    let mut sink: Vec<Post> = Vec::new();

    let report = collector.collect("topic", 2, &mut sink).await.unwrap();

    assert_eq!(ids(&sink), vec!["1", "2"]);
    assert_eq!(report.records_added, 2);
    assert_eq!(report.duplicates_dropped, 2);
    assert_eq!(report.pages_fetched, 2);
}

#[tokio::test]
async fn test_duplicate_id_keeps_first_text() {
    let source = ScriptedSource::default()
        .page(1, Ok(cards(&[("123", "first version")])))
        .page(2, Ok(cards(&[("123", "edited later"), ("124", "other")])));
    let collector = Collector::new(source, quick_config());
    let mut sink: Vec<Post> = Vec::new();

    collector.collect("topic", 2, &mut sink).await.unwrap();

    assert_eq!(ids(&sink), vec!["123", "124"]);
    assert_eq!(sink[0].text, "first version");
}

#[tokio::test]
async fn test_rate_limit_aborts_and_keeps_earlier_pages_on_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("weibo_data.csv");

    let mut source = ScriptedSource::default();
    for page in 1..=4 {
        let id = format!("{page}00");
        source = source.page(page, Ok(cards(&[(id.as_str(), "post")])));
    }
    source = source.page(5, Err(WeiboApiError::RateLimitExceeded { retry_after: 60 }));
    let collector = Collector::new(source, quick_config());

    let mut writer = RecordsWriter::create(&path).unwrap();
    let result = collector.collect("topic", 10, &mut writer).await;
    drop(writer);

    match result {
        Err(CoreError::CrawlAborted { page, source }) => {
            assert_eq!(page, 5);
            assert_eq!(source.reason(), FailureReason::RateLimited);
        }
        other => panic!("expected aborted crawl, got {other:?}"),
    }

    // Session-wide failures are not retried and later pages are never requested.
    assert_eq!(collector.source().calls_for(5), 1);
    assert_eq!(collector.source().requested_pages(), vec![1, 2, 3, 4, 5]);

    let stored = load_records(&path).unwrap();
    assert_eq!(ids(&stored), vec!["100", "200", "300", "400"]);
}

#[tokio::test]
async fn test_auth_failure_on_first_page_stores_nothing() {
    let source = ScriptedSource::default().page(
        1,
        Err(WeiboApiError::AuthenticationFailed {
            reason: "HTTP 403".to_string(),
        }),
    );
    let collector = Collector::new(source, quick_config());
    let mut sink: Vec<Post> = Vec::new();

    let err = collector.collect("topic", 5, &mut sink).await.unwrap_err();

    assert!(matches!(err, CoreError::CrawlAborted { page: 1, .. }));
    assert!(sink.is_empty());
    assert_eq!(collector.source().calls_for(1), 1);
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let source = ScriptedSource::default()
        .page(1, Err(WeiboApiError::RequestTimeout))
        .page(1, Err(WeiboApiError::ServerError { status_code: 502 }))
        .page(1, Ok(cards(&[("1", "finally")])));
    let collector = Collector::new(source, quick_config());
    let mut sink: Vec<Post> = Vec::new();

    let report = collector.collect("topic", 1, &mut sink).await.unwrap();

    assert_eq!(ids(&sink), vec!["1"]);
    assert_eq!(collector.source().calls_for(1), 3);
    assert_eq!(report.retries, 2);
    assert!(report.skipped_pages.is_empty());
}

#[tokio::test]
async fn test_exhausted_page_is_skipped_and_crawl_continues() {
    let source = ScriptedSource::default()
        .page(1, Ok(cards(&[("1", "a")])))
        .page(
            2,
            Err(WeiboApiError::ConnectionFailed {
                details: "reset".to_string(),
            }),
        )
        .page(3, Ok(cards(&[("3", "c")])));
    let collector = Collector::new(source, quick_config());
    let mut sink: Vec<Post> = Vec::new();

    let report = collector.collect("topic", 3, &mut sink).await.unwrap();

    assert_eq!(ids(&sink), vec!["1", "3"]);
    assert_eq!(report.skipped_pages, vec![2]);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(collector.source().calls_for(2), 3);
}

#[tokio::test]
async fn test_page_without_cards_counts_as_parse_failure() {
    let broken = PagePayload::from_value(json!({ "ok": 1, "msg": "busy" }));
    let source = ScriptedSource::default()
        .page(1, Ok(broken))
        .page(2, Ok(cards(&[("2", "b")])));
    let collector = Collector::new(source, quick_config());
    let mut sink: Vec<Post> = Vec::new();

    let report = collector.collect("topic", 2, &mut sink).await.unwrap();

    assert_eq!(report.skipped_pages, vec![1]);
    assert_eq!(collector.source().calls_for(1), 3);
    assert_eq!(ids(&sink), vec!["2"]);
}

#[tokio::test]
async fn test_stops_after_consecutive_empty_pages() {
    let source = ScriptedSource::default().page(1, Ok(cards(&[("1", "a")])));
    let collector = Collector::new(source, quick_config());
    let mut sink: Vec<Post> = Vec::new();

    let report = collector.collect("topic", 10, &mut sink).await.unwrap();

    assert!(report.stopped_early);
    assert_eq!(report.pages_fetched, 4);
    assert_eq!(collector.source().requested_pages(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_end_of_results_stops_without_retrying() {
    let no_more =
        || -> Response { Ok(PagePayload::from_value(json!({ "ok": 0, "msg": "这里还没有内容" }))) };
    let source = ScriptedSource::default()
        .page(1, Ok(cards(&[("1", "a"), ("2", "b")])))
        .page(2, no_more())
        .page(3, no_more())
        .page(4, no_more())
        .page(5, Ok(cards(&[("5", "e")])));
    let collector = Collector::new(source, quick_config());
    let mut sink: Vec<Post> = Vec::new();

    let report = collector.collect("topic", 50, &mut sink).await.unwrap();

    assert!(report.stopped_early);
    assert_eq!(ids(&sink), vec!["1", "2"]);
    assert_eq!(report.pages_fetched, 4);
    assert!(report.skipped_pages.is_empty());
    assert_eq!(report.retries, 0);
    assert_eq!(collector.source().requested_pages(), vec![1, 2, 3, 4]);
    assert_eq!(collector.source().calls_for(2), 1);
}

#[tokio::test]
async fn test_zero_max_empty_pages_walks_every_page() {
    let source = ScriptedSource::default();
    let config = CollectorConfig {
        max_empty_pages: 0,
        ..quick_config()
    };
    let collector = Collector::new(source, config);
    let mut sink: Vec<Post> = Vec::new();

    let report = collector.collect("topic", 6, &mut sink).await.unwrap();

    assert!(!report.stopped_early);
    assert_eq!(report.pages_fetched, 6);
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_zero_pages_is_an_empty_crawl() {
    let collector = Collector::new(ScriptedSource::default(), quick_config());
    let mut sink: Vec<Post> = Vec::new();

    let report = collector.collect("topic", 0, &mut sink).await.unwrap();

    assert_eq!(report, CrawlReport::default());
    assert!(collector.source().requested_pages().is_empty());
}

#[tokio::test]
async fn test_blank_topic_is_rejected() {
    let collector = Collector::new(ScriptedSource::default(), quick_config());
    let mut sink: Vec<Post> = Vec::new();

    let err = collector.collect("   ", 3, &mut sink).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidInput { .. }));
}
