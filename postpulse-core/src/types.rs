use serde::{Deserialize, Serialize};

/// One collected post. Field order is the column order of the records file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub bid: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_retweet: bool,
    #[serde(default)]
    pub repost_count: u64,
    #[serde(default)]
    pub comment_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub user_followers: u64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl Post {
    /// A post with only identity and text set; everything else defaults.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            bid: String::new(),
            timestamp: String::new(),
            text: text.into(),
            is_retweet: false,
            repost_count: 0,
            comment_count: 0,
            like_count: 0,
            user_name: String::new(),
            user_followers: 0,
            source: String::new(),
            category: None,
        }
    }

    pub fn with_engagement(mut self, reposts: u64, comments: u64, likes: u64) -> Self {
        self.repost_count = reposts;
        self.comment_count = comments;
        self.like_count = likes;
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Copy of this post labelled with `category`.
    pub fn categorized(&self, category: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            ..self.clone()
        }
    }
}
