pub mod types;
pub mod registry;
pub mod fetcher;
pub mod parser;
pub mod traits;
pub mod sources;
pub mod aggregator;
pub mod store;
pub mod scheduler;
pub mod api;

pub use types::*;
pub use registry::SourceRegistry;
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use traits::SourceCollector;
pub use sources::RssCollector;
pub use aggregator::{IngestReport, RssAggregator};
pub use store::NewsStore;
pub use scheduler::RefreshScheduler;
