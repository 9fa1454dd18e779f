use crate::sources::RssCollector;
use crate::traits::SourceCollector;
use crate::types::{FetchConfig, NewsItem, Result, SourceDescriptor, SourceKind};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What one fan-out over the configured sources produced.
#[derive(Debug, Default)]
pub struct IngestReport {
    pub items: Vec<NewsItem>,
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub skipped: Vec<String>,
}

/// Runs every source as its own task and gathers whatever succeeded.
pub struct RssAggregator {
    rss: Arc<dyn SourceCollector>,
    scrapers: HashMap<String, Arc<dyn SourceCollector>>,
}

impl RssAggregator {
    pub fn new(fetch_config: FetchConfig) -> Result<Self> {
        let rss = RssCollector::new(fetch_config)?;
        Ok(Self::with_rss_collector(Arc::new(rss)))
    }

    pub fn with_rss_collector(rss: Arc<dyn SourceCollector>) -> Self {
        Self {
            rss,
            scrapers: HashMap::new(),
        }
    }

    /// Make `type: scraper` sources with `scraper_module: <module>` use
    /// `collector`. No scrapers ship with this crate.
    pub fn register_scraper(&mut self, module: &str, collector: Arc<dyn SourceCollector>) {
        self.scrapers.insert(module.to_string(), collector);
    }

    fn collector_for(&self, source: &SourceDescriptor) -> Option<Arc<dyn SourceCollector>> {
        match &source.kind {
            SourceKind::Rss => Some(self.rss.clone()),
            SourceKind::Scraper => {
                let module = source.scraper_module.as_deref().unwrap_or_default();
                let collector = self.scrapers.get(module).cloned();
                if collector.is_none() {
                    warn!(
                        "[{}] Scraper type not yet implemented (module: {}). Skipping.",
                        source.name, module
                    );
                }
                collector
            }
            SourceKind::Other(tag) => {
                warn!("[{}] Unknown source type '{}'. Skipping.", source.name, tag);
                None
            }
        }
    }

    pub async fn run(&self, sources: &[SourceDescriptor]) -> Vec<NewsItem> {
        self.run_with_report(sources).await.items
    }

    /// Spawn one task per collectable source, then wait for all of them.
    /// A failing or panicking task only loses its own items.
    pub async fn run_with_report(&self, sources: &[SourceDescriptor]) -> IngestReport {
        let mut report = IngestReport::default();
        let mut names = Vec::new();
        let mut tasks = Vec::new();

        for source in sources {
            let Some(collector) = self.collector_for(source) else {
                report.skipped.push(source.name.clone());
                continue;
            };

            debug!("[{}] Collecting via {}", source.name, collector.kind());
            let source = source.clone();
            names.push(source.name.clone());
            tasks.push(tokio::spawn(async move { collector.collect(&source).await }));
        }

        let results = join_all(tasks).await;

        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(Ok(mut items)) => {
                    report.items.append(&mut items);
                    report.succeeded.push(name);
                }
                Ok(Err(e)) => {
                    warn!("[{}] Source failed: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
                Err(e) => {
                    error!("[{}] Source task aborted: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        info!(
            "Total fetched across all feeds: {} items ({} ok, {} failed, {} skipped)",
            report.items.len(),
            report.succeeded.len(),
            report.failed.len(),
            report.skipped.len()
        );
        report
    }
}
