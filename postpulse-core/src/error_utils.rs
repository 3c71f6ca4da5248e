use crate::error::*;
use std::time::Duration;
use tracing::{error, info};

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self {
            CoreError::WeiboApi(e) | CoreError::CrawlAborted { source: e, .. } => {
                error!("Weibo API error details: {:?}", e);
            }
            CoreError::Store(e) => {
                error!("Records store error details: {:?}", e);
            }
            CoreError::Report(e) => {
                error!("Report error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::WeiboApi(e) => e.is_retryable(),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::WeiboApi(e) => e.retry_after(),
            CoreError::CrawlAborted {
                source: WeiboApiError::RateLimitExceeded { retry_after },
                ..
            } => Some(Duration::from_secs(*retry_after)),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::WeiboApi(e) => e.user_friendly_message(),
            CoreError::Store(e) => e.user_friendly_message(),
            CoreError::Report(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::CrawlAborted { page, source } => format!(
                "Crawl stopped at page {}. {} Records collected before that page were kept.",
                page,
                source.user_friendly_message()
            ),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { message } => format!("Invalid input: {}", message),
            CoreError::Io(e) => format!("File operation failed: {}", e),
            _ => "An unexpected error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::WeiboApi(_) => "WEIBO_API".to_string(),
            CoreError::Store(_) => "STORE".to_string(),
            CoreError::Report(_) => "REPORT".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Io(_) => "IO".to_string(),
            CoreError::Serialization(_) => "SERIALIZATION".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::CrawlAborted { .. } => "CRAWL_ABORTED".to_string(),
            CoreError::Internal { .. } => "INTERNAL".to_string(),
        }
    }
}

impl ErrorExt for WeiboApiError {
    fn log_error(&self) -> &Self {
        error!("WeiboApiError: {}", self);
        self
    }

    /// Only page-local failures are worth another attempt.
    fn is_retryable(&self) -> bool {
        matches!(
            self.reason(),
            FailureReason::Network | FailureReason::Parse
        )
    }

    /// Wait requested by the server. Page retries use the configured backoff.
    fn retry_after(&self) -> Option<Duration> {
        match self {
            WeiboApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            WeiboApiError::AuthenticationFailed { .. } => {
                "Weibo rejected the session token. Please refresh the cookie in your configuration."
                    .to_string()
            }
            WeiboApiError::RateLimitExceeded { retry_after } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after
            ),
            WeiboApiError::RequestTimeout => {
                "Request to Weibo timed out. Please try again.".to_string()
            }
            WeiboApiError::ConnectionFailed { .. } => {
                "Could not reach Weibo. Please check your internet connection.".to_string()
            }
            WeiboApiError::InvalidResponse { .. } => {
                "Weibo returned a page in an unexpected format.".to_string()
            }
            WeiboApiError::InvalidRequest { details } => {
                format!("The request was not sent: {}.", details)
            }
            _ => "Weibo API error occurred. Please try again later.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            WeiboApiError::AuthenticationFailed { .. } => "WEIBO_AUTH_FAILED".to_string(),
            WeiboApiError::RateLimitExceeded { .. } => "WEIBO_RATE_LIMIT".to_string(),
            WeiboApiError::RequestTimeout => "WEIBO_TIMEOUT".to_string(),
            WeiboApiError::ConnectionFailed { .. } => "WEIBO_CONNECTION_FAILED".to_string(),
            WeiboApiError::ServerError { .. } => "WEIBO_SERVER_ERROR".to_string(),
            WeiboApiError::UnexpectedStatus { .. } => "WEIBO_UNEXPECTED_STATUS".to_string(),
            WeiboApiError::InvalidResponse { .. } => "WEIBO_INVALID_RESPONSE".to_string(),
            WeiboApiError::InvalidRequest { .. } => "WEIBO_INVALID_REQUEST".to_string(),
        }
    }
}

impl ErrorExt for StoreError {
    fn log_error(&self) -> &Self {
        error!("StoreError: {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            StoreError::NotFound { path } => format!(
                "Records file {} does not exist. Run a crawl first.",
                path.display()
            ),
            StoreError::Open { path, .. } => {
                format!("Could not open records file {}.", path.display())
            }
            StoreError::MalformedRecord { line, .. } => {
                format!("Records file is damaged near line {}.", line)
            }
            _ => "Records file could not be read or written.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            StoreError::NotFound { .. } => "STORE_NOT_FOUND".to_string(),
            StoreError::Open { .. } => "STORE_OPEN_FAILED".to_string(),
            StoreError::MalformedRecord { .. } => "STORE_MALFORMED_RECORD".to_string(),
            StoreError::Csv(_) => "STORE_CSV_ERROR".to_string(),
            StoreError::Io(_) => "STORE_IO_ERROR".to_string(),
        }
    }
}

impl ErrorExt for ReportError {
    fn log_error(&self) -> &Self {
        error!("ReportError: {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ReportError::EmptyInput { reason } => format!("Nothing to chart: {}.", reason),
            ReportError::Write { path, .. } => {
                format!("Could not write the report to {}.", path.display())
            }
            ReportError::ChartEncoding { chart, .. } => {
                format!("Failed to build the {} chart.", chart)
            }
            ReportError::ScriptRead { path, .. } => {
                format!("Could not read the chart script {}.", path.display())
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ReportError::EmptyInput { .. } => "REPORT_EMPTY_INPUT".to_string(),
            ReportError::ChartEncoding { .. } => "REPORT_CHART_ENCODING".to_string(),
            ReportError::Write { .. } => "REPORT_WRITE_FAILED".to_string(),
            ReportError::ScriptRead { .. } => "REPORT_SCRIPT_READ_FAILED".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false // Config errors are typically not retryable
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::FileNotFound { path } => {
                format!("Configuration file '{}' not found.", path)
            }
            ConfigError::MissingField { field } => {
                format!("Required configuration field '{}' is missing.", field)
            }
            ConfigError::InvalidValue { field, .. } => {
                format!("Invalid value for configuration field '{}'.", field)
            }
            ConfigError::Parse(_) => {
                "Configuration file format is invalid. Please check the settings.".to_string()
            }
            _ => "Configuration error occurred. Please check your settings.".to_string(),
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND".to_string(),
            ConfigError::Read { .. } => "CONFIG_READ_FAILED".to_string(),
            ConfigError::MissingField { .. } => "CONFIG_MISSING_FIELD".to_string(),
            ConfigError::InvalidValue { .. } => "CONFIG_INVALID_VALUE".to_string(),
            ConfigError::ValidationFailed { .. } => "CONFIG_VALIDATION_FAILED".to_string(),
            ConfigError::Parse(_) => "CONFIG_PARSE_ERROR".to_string(),
        }
    }
}

/// Logs failures and turns them into the line shown to the user.
#[derive(Debug, Default)]
pub struct ErrorReporter;

impl ErrorReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn report_error(&self, error: &CoreError) {
        error.log_error();
        info!("Error code: {}", error.error_code());
        info!("User message: {}", error.user_friendly_message());
        if let Some(retry_after) = error.retry_after() {
            info!("Retry after: {:?}", retry_after);
        }
    }

    /// Logs a pipeline failure and returns the line shown to the user.
    pub fn report_pipeline_error(&self, error: &PipelineError) -> String {
        self.report_error(&error.source);
        format!(
            "Aborted during {}: {}",
            error.stage,
            error.source.user_friendly_message()
        )
    }
}
