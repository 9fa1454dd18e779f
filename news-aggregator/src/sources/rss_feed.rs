use crate::traits::SourceCollector;
use crate::types::{FetchConfig, NewsItem, Result, SourceDescriptor};
use crate::{FeedParser, Fetcher};
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

/// Fetch + normalize for `type: rss` sources.
pub struct RssCollector {
    fetcher: Fetcher,
    parser: FeedParser,
}

impl RssCollector {
    pub fn new(fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(fetch_config)?,
            parser: FeedParser::new(),
        })
    }
}

#[async_trait]
impl SourceCollector for RssCollector {
    fn kind(&self) -> &'static str {
        "rss"
    }

    async fn collect(&self, source: &SourceDescriptor) -> Result<Vec<NewsItem>> {
        let fetched_at = Utc::now();
        let content = self.fetcher.fetch(source).await?;

        let items = self.parser.normalize(source, &content, fetched_at);
        info!("[{}] Fetched {} items", source.name, items.len());
        Ok(items)
    }
}
