//! Typed view of the mobile search API payload.
//!
//! The API is loosely typed: ids arrive as strings or numbers, counters as
//! numbers or abbreviated strings such as `"100万+"`, and any field may be
//! missing. Everything here defaults instead of failing; a page only fails
//! when `data.cards` is absent altogether. Past the last result page the
//! API answers `ok: 0` without cards, which reads as an empty page.

use chrono::{DateTime, Duration as ChronoDuration, Local, NaiveDate, NaiveDateTime};
use postpulse_core::{Post, WeiboApiError};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

const CARD_TYPE_POST: i64 = 9;
const CARD_TYPE_GROUP: i64 = 11;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NO_RESULTS_FLAG: i64 = 0;

/// One decoded page as returned by the fetcher.
#[derive(Debug, Clone, PartialEq)]
pub struct PagePayload {
    value: Value,
}

impl PagePayload {
    pub fn from_body(body: &str) -> Result<Self, WeiboApiError> {
        let value: Value =
            serde_json::from_str(body).map_err(|e| WeiboApiError::InvalidResponse {
                details: format!("body is not JSON: {}", e),
            })?;
        Ok(Self { value })
    }

    pub fn from_value(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The API's `ok` status flag, when present.
    pub fn ok_flag(&self) -> Option<i64> {
        self.value.get("ok").and_then(lenient_i64_value)
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default, deserialize_with = "lenient_i64")]
    ok: Option<i64>,
    #[serde(default)]
    data: Option<SearchData>,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    #[serde(default)]
    cards: Option<Vec<Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Card {
    #[serde(deserialize_with = "lenient_i64")]
    card_type: Option<i64>,
    mblog: Option<Mblog>,
    #[serde(deserialize_with = "lenient_list")]
    card_group: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Mblog {
    id: FlexibleId,
    #[serde(deserialize_with = "lenient_string")]
    bid: String,
    #[serde(deserialize_with = "lenient_string")]
    created_at: String,
    #[serde(deserialize_with = "lenient_string")]
    text: String,
    retweeted_status: Option<RetweetedStatus>,
    reposts_count: Count,
    comments_count: Count,
    attitudes_count: Count,
    user: Option<User>,
    #[serde(deserialize_with = "lenient_string")]
    source: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RetweetedStatus {
    #[serde(deserialize_with = "lenient_string")]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct User {
    #[serde(deserialize_with = "lenient_string")]
    screen_name: String,
    followers_count: Count,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct FlexibleId(String);

impl<'de> Deserialize<'de> for FlexibleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = match Value::deserialize(deserializer)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => String::new(),
        };
        Ok(FlexibleId(id))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Count(u64);

impl<'de> Deserialize<'de> for Count {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Count(count_from_value(&value)))
    }
}

/// `null` and other non-text values read as an empty string.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Value>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        _ => Vec::new(),
    })
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(lenient_i64_value(&value))
}

fn lenient_i64_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Counters come as integers or display strings like `"3.2万"` / `"100万+"`.
pub fn count_from_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => parse_count_text(s),
        _ => 0,
    }
}

fn parse_count_text(text: &str) -> u64 {
    let text = text.trim().trim_end_matches('+');
    let (number, multiplier) = if let Some(n) = text.strip_suffix('亿') {
        (n, 100_000_000.0)
    } else if let Some(n) = text.strip_suffix('万') {
        (n, 10_000.0)
    } else {
        (text, 1.0)
    };

    number
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| *n >= 0.0)
        .map(|n| (n * multiplier).round() as u64)
        .unwrap_or(0)
}

/// Render an API timestamp as `YYYY-MM-DD HH:MM:SS`, relative to `now`.
/// Formats that are not recognised are returned unchanged.
pub fn normalize_timestamp(raw: &str, now: NaiveDateTime) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    if raw == "刚刚" || raw.ends_with("分钟前") || raw.ends_with("小时前") {
        return now.format(TIMESTAMP_FORMAT).to_string();
    }

    if let Some(rest) = raw.strip_prefix("昨天") {
        let yesterday = now.date() - ChronoDuration::days(1);
        if let Ok(time) = chrono::NaiveTime::parse_from_str(rest.trim(), "%H:%M") {
            return yesterday.and_time(time).format(TIMESTAMP_FORMAT).to_string();
        }
    }

    if let Ok(parsed) = DateTime::parse_from_str(raw, "%a %b %d %H:%M:%S %z %Y") {
        return parsed.naive_local().format(TIMESTAMP_FORMAT).to_string();
    }

    for format in [TIMESTAMP_FORMAT, "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return parsed.format(TIMESTAMP_FORMAT).to_string();
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return format!("{} 00:00:00", date.format("%Y-%m-%d"));
    }

    // Month-day only means the current year.
    let with_year = format!("{}-{}", now.format("%Y"), raw);
    if let Ok(date) = NaiveDate::parse_from_str(&with_year, "%Y-%m-%d") {
        return format!("{} 00:00:00", date.format("%Y-%m-%d"));
    }

    raw.to_string()
}

impl Mblog {
    fn into_post(self, now: NaiveDateTime) -> Option<Post> {
        let id = if self.id.0.is_empty() {
            self.bid.clone()
        } else {
            self.id.0
        };
        if id.is_empty() {
            return None;
        }

        let is_retweet = self.retweeted_status.is_some();
        let mut text = self.text;
        if let Some(retweeted) = self.retweeted_status {
            text = format!("{} // {}", text, retweeted.text);
        }
        let text = text.replace(['\r', '\n'], " ");

        let (user_name, user_followers) = self
            .user
            .map(|u| (u.screen_name, u.followers_count.0))
            .unwrap_or_default();

        Some(Post {
            id,
            bid: self.bid,
            timestamp: normalize_timestamp(&self.created_at, now),
            text,
            is_retweet,
            repost_count: self.reposts_count.0,
            comment_count: self.comments_count.0,
            like_count: self.attitudes_count.0,
            user_name,
            user_followers,
            source: self.source,
            category: None,
        })
    }
}

fn decode_card(value: &Value) -> Option<Card> {
    match Card::deserialize(value) {
        Ok(card) => Some(card),
        Err(e) => {
            debug!("Skipping undecodable card: {}", e);
            None
        }
    }
}

fn collect_card(card: Card, now: NaiveDateTime, posts: &mut Vec<Post>) {
    match card.card_type {
        Some(CARD_TYPE_POST) => {
            if let Some(post) = card.mblog.and_then(|m| m.into_post(now)) {
                posts.push(post);
            }
        }
        Some(CARD_TYPE_GROUP) => {
            for item in card.card_group.iter().filter_map(decode_card) {
                if item.card_type == Some(CARD_TYPE_POST) {
                    collect_card(item, now, posts);
                }
            }
        }
        other => debug!("Ignoring card of type {:?}", other),
    }
}

/// Extract posts from one page, in page order.
pub fn parse_page(payload: &PagePayload) -> Result<Vec<Post>, WeiboApiError> {
    parse_page_at(payload, Local::now().naive_local())
}

/// Like [`parse_page`], with relative timestamps resolved against `now`.
pub fn parse_page_at(
    payload: &PagePayload,
    now: NaiveDateTime,
) -> Result<Vec<Post>, WeiboApiError> {
    let response =
        SearchResponse::deserialize(payload.value()).map_err(|e| {
            WeiboApiError::InvalidResponse {
                details: format!("unexpected payload shape: {}", e),
            }
        })?;

    let cards = match response.data.and_then(|data| data.cards) {
        Some(cards) => cards,
        None if response.ok == Some(NO_RESULTS_FLAG) => {
            debug!("Payload reports no results (ok=0)");
            return Ok(Vec::new());
        }
        None => {
            return Err(WeiboApiError::InvalidResponse {
                details: format!("payload has no data.cards (ok={:?})", response.ok),
            })
        }
    };

    let mut posts = Vec::with_capacity(cards.len());
    for card in cards.iter().filter_map(decode_card) {
        collect_card(card, now, &mut posts);
    }

    debug!("Parsed {} posts from {} cards", posts.len(), cards.len());
    Ok(posts)
}
