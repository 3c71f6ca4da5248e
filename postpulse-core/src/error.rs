use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Weibo API error: {0}")]
    WeiboApi(#[from] WeiboApiError),

    #[error("Records store error: {0}")]
    Store(#[from] StoreError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Crawl aborted on page {page}: {source}")]
    CrawlAborted {
        page: u32,
        #[source]
        source: WeiboApiError,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Coarse failure class of a single page fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Network,
    Auth,
    RateLimited,
    Parse,
    /// Rejected before any request was sent.
    InvalidInput,
}

impl FailureReason {
    /// Auth and rate-limit failures concern the whole session, not one page.
    pub fn is_session_wide(self) -> bool {
        matches!(self, FailureReason::Auth | FailureReason::RateLimited)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureReason::Network => "network",
            FailureReason::Auth => "auth",
            FailureReason::RateLimited => "rate_limited",
            FailureReason::Parse => "parse",
            FailureReason::InvalidInput => "invalid_input",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeiboApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Connection failed: {details}")]
    ConnectionFailed { details: String },

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Unexpected status: {status_code}")]
    UnexpectedStatus { status_code: u16 },

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Invalid request: {details}")]
    InvalidRequest { details: String },
}

impl WeiboApiError {
    pub fn reason(&self) -> FailureReason {
        match self {
            WeiboApiError::AuthenticationFailed { .. } => FailureReason::Auth,
            WeiboApiError::RateLimitExceeded { .. } => FailureReason::RateLimited,
            WeiboApiError::RequestTimeout
            | WeiboApiError::ConnectionFailed { .. }
            | WeiboApiError::ServerError { .. }
            | WeiboApiError::UnexpectedStatus { .. } => FailureReason::Network,
            WeiboApiError::InvalidResponse { .. } => FailureReason::Parse,
            WeiboApiError::InvalidRequest { .. } => FailureReason::InvalidInput,
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Records file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to open records file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed record at line {line}: {details}")]
    MalformedRecord { line: u64, details: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Nothing to report: {reason}")]
    EmptyInput { reason: String },

    #[error("Failed to encode chart {chart}: {details}")]
    ChartEncoding { chart: String, details: String },

    #[error("Failed to read chart script {}: {source}", .path.display())]
    ScriptRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write report {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },

    #[error("Configuration parsing error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Pipeline stage an abort happened in, for user-facing reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuring,
    Crawling,
    LoadingRecords,
    Analyzing,
    Reporting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Configuring => "configuration",
            Stage::Crawling => "crawling",
            Stage::LoadingRecords => "loading records",
            Stage::Analyzing => "analysis",
            Stage::Reporting => "reporting",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: CoreError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<CoreError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    /// Process exit status for this failure: 2 auth, 3 rate limited, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        let reason = match &self.source {
            CoreError::CrawlAborted { source, .. } => Some(source.reason()),
            CoreError::WeiboApi(e) => Some(e.reason()),
            _ => None,
        };

        match reason {
            Some(FailureReason::Auth) => 2,
            Some(FailureReason::RateLimited) => 3,
            _ => 1,
        }
    }
}
