// Boundary types live in the interfaces crate
pub use interfaces::{
    NewsItem, NewsPage, NewsRecord, RefreshOutcome, RefreshStatus, SourceDescriptor, SourceKind,
};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "news-aggregator/0.1 (+https://github.com/news-aggregator)".to_string(),
            timeout_seconds: 15,
            follow_redirects: true,
            max_redirects: 10,
        }
    }
}

/// Why a single source could not be fetched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchErrorKind {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("reading body failed: {0}")]
    Body(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{source_name}] fetch failed: {kind}")]
pub struct FetchError {
    pub source_name: String,
    pub kind: FetchErrorKind,
}

impl FetchError {
    pub fn new(source_name: &str, kind: FetchErrorKind) -> Self {
        Self {
            source_name: source_name.to_string(),
            kind,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FetchErrorKind::Timeout
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Failed to store item {url}: {source}")]
    StorageWrite {
        url: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<config::ConfigError> for AggregatorError {
    fn from(e: config::ConfigError) -> Self {
        AggregatorError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AggregatorError>;
