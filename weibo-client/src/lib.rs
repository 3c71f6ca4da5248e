pub mod api;
pub mod parser;
pub mod retry;


pub use api::{classify_response, PageSource, WeiboApiClient};
pub use parser::{parse_page, PagePayload};
pub use retry::{Attempt, RetryConfig, RetryExecutor, RetryMetrics, RetryStrategy};
