use crate::types::{NewsItem, Result, SourceDescriptor};
use async_trait::async_trait;

/// One unit of ingestion work: turn a configured source into items.
///
/// RSS/Atom sources use `RssCollector`. Other kinds of sources (site
/// scrapers) implement this trait and are registered on the aggregator under
/// the `scraper_module` name their descriptors reference.
#[async_trait]
pub trait SourceCollector: Send + Sync {
    /// Short label used in logs
    fn kind(&self) -> &'static str;

    /// Collect the current items for `source`. Every returned item carries
    /// `fetched_at`, which is sampled once per call.
    async fn collect(&self, source: &SourceDescriptor) -> Result<Vec<NewsItem>>;
}
