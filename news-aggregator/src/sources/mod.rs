pub mod rss_feed;

pub use rss_feed::RssCollector;
