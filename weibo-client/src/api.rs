use crate::parser::PagePayload;
use postpulse_core::{ConfigError, CoreError, CrawlConfig, WeiboApiError};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use url::Url;

const WEIBO_SEARCH_ENDPOINT: &str = "https://m.weibo.cn/api/container/getIndex";
const LOGIN_HOST_MARKER: &str = "passport.weibo";
const LOGIN_REQUIRED_FLAG: i64 = -100;
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Source of raw search result pages. Page numbers start at 1.
pub trait PageSource {
    async fn fetch_page(&self, topic: &str, page: u32) -> Result<PagePayload, WeiboApiError>;
}

#[derive(Debug)]
pub struct WeiboApiClient {
    http_client: Client,
    endpoint: Url,
}

impl WeiboApiClient {
    /// Build a client bound to one session token (the cookie string).
    pub fn new(session_token: &str, user_agent: &str, timeout: Duration) -> Result<Self, CoreError> {
        let session_token = session_token.trim();
        if session_token.is_empty() {
            return Err(ConfigError::MissingField {
                field: "crawl.session_token".to_string(),
            }
            .into());
        }

        let mut cookie =
            HeaderValue::from_str(session_token).map_err(|_| ConfigError::InvalidValue {
                field: "crawl.session_token".to_string(),
                value: "<contains characters not allowed in a header>".to_string(),
            })?;
        cookie.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, cookie);
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

        let http_client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let endpoint = Url::parse(WEIBO_SEARCH_ENDPOINT).map_err(|e| CoreError::Internal {
            message: format!("invalid search endpoint: {}", e),
        })?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }

    pub fn from_config(config: &CrawlConfig) -> Result<Self, CoreError> {
        Self::new(
            config.session_token()?,
            &config.user_agent,
            config.request_timeout(),
        )
    }

    /// Point the client at another host serving the same API (mirrors, test servers).
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn page_url(&self, topic: &str, page: u32) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("containerid", &format!("100103type=1&q={}", topic))
            .append_pair("page_type", "searchall")
            .append_pair("page", &page.to_string());
        url
    }
}

impl PageSource for WeiboApiClient {
    async fn fetch_page(&self, topic: &str, page: u32) -> Result<PagePayload, WeiboApiError> {
        if page == 0 {
            return Err(WeiboApiError::InvalidRequest {
                details: "page numbers start at 1".to_string(),
            });
        }
        let url = self.page_url(topic, page);
        let start_time = Instant::now();

        info!("Requesting page {} for '{}'", page, topic);
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(err) = classify_response(response.status(), response.url(), retry_after) {
            error!(
                "Request for page {} failed with status {}: {}",
                page,
                response.status(),
                err
            );
            return Err(err);
        }

        let body = response.text().await.map_err(|e| transport_error(&e))?;
        let payload = PagePayload::from_body(&body)?;

        if payload.ok_flag() == Some(LOGIN_REQUIRED_FLAG) {
            warn!("Page {} answered with a login-required flag", page);
            return Err(WeiboApiError::AuthenticationFailed {
                reason: "API reported that login is required".to_string(),
            });
        }

        debug!(
            "Page {} fetched in {:?} ({} bytes)",
            page,
            start_time.elapsed(),
            body.len()
        );
        Ok(payload)
    }
}

fn transport_error(e: &reqwest::Error) -> WeiboApiError {
    if e.is_timeout() {
        WeiboApiError::RequestTimeout
    } else {
        WeiboApiError::ConnectionFailed {
            details: e.to_string(),
        }
    }
}

/// Map a finished HTTP exchange to a failure, or `None` when the body should be read.
pub fn classify_response(
    status: StatusCode,
    final_url: &Url,
    retry_after: Option<u64>,
) -> Option<WeiboApiError> {
    if final_url
        .host_str()
        .is_some_and(|host| host.contains(LOGIN_HOST_MARKER))
    {
        return Some(WeiboApiError::AuthenticationFailed {
            reason: format!("redirected to login page {}", final_url),
        });
    }

    if status.is_success() {
        return None;
    }

    let err = match status.as_u16() {
        401 | 403 => WeiboApiError::AuthenticationFailed {
            reason: format!("HTTP {}", status.as_u16()),
        },
        // 418 is how the mobile API answers crawlers it has throttled.
        418 | 429 => WeiboApiError::RateLimitExceeded {
            retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
        },
        code if status.is_server_error() => WeiboApiError::ServerError { status_code: code },
        code => WeiboApiError::UnexpectedStatus { status_code: code },
    };
    Some(err)
}
