use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How a source is collected. Unknown tags are kept verbatim so callers can
/// report them instead of failing the whole source list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceKind {
    #[default]
    Rss,
    Scraper,
    Other(String),
}

impl From<String> for SourceKind {
    fn from(tag: String) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "rss" | "" => SourceKind::Rss,
            "scraper" => SourceKind::Scraper,
            _ => SourceKind::Other(tag),
        }
    }
}

impl From<SourceKind> for String {
    fn from(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Rss => "rss".to_owned(),
            SourceKind::Scraper => "scraper".to_owned(),
            SourceKind::Other(tag) => tag,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Rss => f.write_str("rss"),
            SourceKind::Scraper => f.write_str("scraper"),
            SourceKind::Other(tag) => f.write_str(tag),
        }
    }
}

/// One configured news source, as written in the sources file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_keyword: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: SourceKind,
    // Only meaningful for `type: scraper`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scraper_module: Option<String>,
}

impl SourceDescriptor {
    pub fn rss(name: &str, url: &str) -> Self {
        Self {
            name: name.to_owned(),
            url: url.to_owned(),
            category: String::new(),
            filter_keyword: None,
            kind: SourceKind::Rss,
            scraper_module: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = category.to_owned();
        self
    }

    pub fn with_filter_keyword(mut self, keyword: &str) -> Self {
        self.filter_keyword = Some(keyword.to_owned());
        self
    }

    /// The keyword filter, if one is configured and not blank.
    pub fn active_filter(&self) -> Option<&str> {
        self.filter_keyword
            .as_deref()
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
    }
}

/// The canonical record produced by ingestion. `url` is the identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    pub source_name: String,
    pub category: String,
    pub fetched_at: DateTime<Utc>,
}

/// A stored item together with its storage row id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsRecord {
    pub id: i64,
    #[serde(flatten)]
    pub item: NewsItem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsPage {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub items: Vec<NewsRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    Ok,
    Error,
}

/// Summary of one ingestion cycle, handed back to whoever triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub status: RefreshStatus,
    pub new_items: u64,
    pub total_fetched: usize,
    pub ran_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RefreshOutcome {
    pub fn ok(new_items: u64, total_fetched: usize, ran_at: DateTime<Utc>) -> Self {
        Self {
            status: RefreshStatus::Ok,
            new_items,
            total_fetched,
            ran_at,
            error: None,
        }
    }

    pub fn failed(total_fetched: usize, ran_at: DateTime<Utc>, error: String) -> Self {
        Self {
            status: RefreshStatus::Error,
            new_items: 0,
            total_fetched,
            ran_at,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RefreshStatus::Ok
    }
}
