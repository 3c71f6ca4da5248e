//! Run configuration loaded from `postpulse.toml`.
//!
//! Every section is optional; missing keys fall back to the defaults below.
//! The session token is the only secret and is normally supplied through the
//! `WEIBO_SESSION_TOKEN` environment variable instead of the file.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "postpulse.toml";
pub const SESSION_TOKEN_ENV: &str = "WEIBO_SESSION_TOKEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub crawl: CrawlConfig,
    pub paths: PathsConfig,
    pub analysis: AnalysisConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrawlConfig {
    pub keyword: String,
    pub pages: u32,
    pub page_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub request_timeout_secs: u64,
    /// Stop after this many consecutive pages without a new post; 0 disables.
    pub max_empty_pages: u32,
    pub user_agent: String,
    pub session_token: Option<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            keyword: "小谢一审".to_string(),
            pages: 50,
            page_delay_ms: 2000,
            retry_attempts: 3,
            retry_backoff_ms: 1000,
            request_timeout_secs: 15,
            max_empty_pages: 3,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            session_token: None,
        }
    }
}

impl CrawlConfig {
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The configured session token, or `MissingField` when absent or blank.
    pub fn session_token(&self) -> Result<&str, ConfigError> {
        match self.session_token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ConfigError::MissingField {
                field: format!("crawl.session_token (or {})", SESSION_TOKEN_ENV),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub records: PathBuf,
    pub stopwords: PathBuf,
    pub report: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            records: PathBuf::from("weibo_data.csv"),
            stopwords: PathBuf::from("stopwords.txt"),
            report: PathBuf::from("weibo_analysis.html"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub top_terms: usize,
    pub top_posts: usize,
    pub min_token_chars: usize,
    pub analyze_delay_ms: u64,
    pub fallback_category: String,
    pub extra_stopwords: Vec<String>,
    /// Evaluated in order; the first rule with a matching keyword wins.
    pub categories: Vec<CategoryConfig>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_terms: 50,
            top_posts: 10,
            min_token_chars: 2,
            analyze_delay_ms: 3000,
            fallback_category: "uncategorized".to_string(),
            extra_stopwords: to_strings(&[
                "小谢", "家暴", "微博", "转发", "评论", "link", "http", "https", "转发微博",
                "视频", "链接", "网页", "图片", "全文",
            ]),
            categories: default_categories(),
        }
    }
}

impl AnalysisConfig {
    pub fn analyze_delay(&self) -> Duration {
        Duration::from_millis(self.analyze_delay_ms)
    }
}

/// Where the report page gets its chart scripts.
///
/// Unset sources link the public CDN builds, so the page needs network access
/// when opened. Point both at local copies to view it offline, and set
/// `inline_scripts` to embed them so the HTML file stands alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReportConfig {
    pub echarts_script: Option<String>,
    pub wordcloud_script: Option<String>,
    pub inline_scripts: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryConfig {
    pub label: String,
    pub keywords: Vec<String>,
}

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

fn default_categories() -> Vec<CategoryConfig> {
    let rule = |label: &str, keywords: &[&str]| CategoryConfig {
        label: label.to_string(),
        keywords: to_strings(keywords),
    };

    vec![
        rule(
            "判决相关",
            &[
                "判决", "判刑", "量刑", "死刑", "一审", "法院", "庭审", "刑事", "起诉", "11年",
                "被告人", "被告", "审判", "宣判", "无期徒刑",
            ],
        ),
        rule(
            "暴力情况",
            &[
                "家暴", "暴力", "殴打", "伤害", "打人", "踢", "伤势", "粪袋", "住院", "伤", "16次",
                "打骂", "伤痕", "报警", "施暴",
            ],
        ),
        rule(
            "社会讨论",
            &[
                "关注", "热议", "舆论", "网友", "声援", "支持", "谴责", "热搜", "讨论", "发声",
                "话题", "新闻", "报道", "焦点",
            ],
        ),
        rule(
            "法律程序",
            &[
                "立案", "取证", "证据", "处理", "执法", "公安", "警察", "报案", "起诉", "辩护",
                "审理", "鉴定", "强制措施",
            ],
        ),
        rule(
            "受害者声音",
            &[
                "受害者", "小谢", "发声", "控诉", "哭诉", "诉求", "无助", "逃离", "报警", "求救",
                "遭遇", "经历",
            ],
        ),
    ]
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file that must exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load an explicitly requested file, or the default file when present,
    /// or fall back to built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
                    Ok(Self::default())
                }
            }
        }
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var(SESSION_TOKEN_ENV) {
            if !token.trim().is_empty() {
                debug!("Session token taken from {}", SESSION_TOKEN_ENV);
                self.crawl.session_token = Some(token);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawl.keyword.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "crawl.keyword".to_string(),
            });
        }
        if self.crawl.pages == 0 {
            return Err(ConfigError::InvalidValue {
                field: "crawl.pages".to_string(),
                value: "0".to_string(),
            });
        }
        if self.crawl.retry_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "crawl.retry_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        if self.analysis.min_token_chars == 0 {
            return Err(ConfigError::InvalidValue {
                field: "analysis.min_token_chars".to_string(),
                value: "0".to_string(),
            });
        }
        if self.report.inline_scripts
            && (self.report.echarts_script.is_none() || self.report.wordcloud_script.is_none())
        {
            return Err(ConfigError::ValidationFailed {
                reason: "report.inline_scripts needs local echarts_script and wordcloud_script files"
                    .to_string(),
            });
        }
        if let Some(rule) = self
            .analysis
            .categories
            .iter()
            .find(|rule| rule.label.trim().is_empty() || rule.keywords.is_empty())
        {
            return Err(ConfigError::ValidationFailed {
                reason: format!(
                    "category rule '{}' needs a label and at least one keyword",
                    rule.label
                ),
            });
        }
        Ok(())
    }
}
