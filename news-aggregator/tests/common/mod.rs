#![allow(dead_code)]

use async_trait::async_trait;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use news_aggregator::{NewsItem, NewsStore, Result, SourceCollector, SourceDescriptor};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Once;
use std::time::Duration;

pub const RSS_BASIC: &str = include_str!("../fixtures/rss_basic.xml");
pub const ATOM_DATES: &str = include_str!("../fixtures/atom_dates.xml");
pub const KEYWORD_FILTER: &str = include_str!("../fixtures/keyword_filter.xml");
pub const RSS_CREATED: &str = include_str!("../fixtures/rss_created.xml");

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn item(
    url: &str,
    summary: &str,
    published_at: DateTime<Utc>,
    fetched_at: DateTime<Utc>,
) -> NewsItem {
    NewsItem {
        title: format!("Title for {}", url),
        url: url.to_string(),
        summary: summary.to_string(),
        published_at,
        source_name: "Test Source".to_string(),
        category: "global".to_string(),
        fetched_at,
    }
}

pub async fn memory_store() -> NewsStore {
    let store = NewsStore::connect("sqlite::memory:").await.unwrap();
    store.ensure_schema().await.unwrap();
    store
}

async fn rss_basic() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/rss+xml")], RSS_BASIC)
}

async fn keyword_filter() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/rss+xml")], KEYWORD_FILTER)
}

async fn slow() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    ([(header::CONTENT_TYPE, "application/rss+xml")], RSS_BASIC)
}

async fn delayed() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_millis(700)).await;
    ([(header::CONTENT_TYPE, "application/rss+xml")], KEYWORD_FILTER)
}

/// Local feed origin on an ephemeral port.
///
/// `/rss`, `/threats` serve fixtures; `/slow` answers after 5s,
/// `/delayed` after 700ms; `/missing` is a 404; `/garbage` is not a feed.
pub async fn spawn_feed_server() -> SocketAddr {
    let app = Router::new()
        .route("/rss", get(rss_basic))
        .route("/threats", get(keyword_filter))
        .route("/slow", get(slow))
        .route("/delayed", get(delayed))
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/garbage", get(|| async { "this is not a feed" }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Returns one fixed item per call after an optional delay.
pub struct StubCollector {
    pub delay: Duration,
    pub calls: AtomicUsize,
}

impl StubCollector {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceCollector for StubCollector {
    fn kind(&self) -> &'static str {
        "stub"
    }

    async fn collect(&self, source: &SourceDescriptor) -> Result<Vec<NewsItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        let now = Utc::now();
        Ok(vec![NewsItem {
            title: format!("{} headline", source.name),
            url: format!("{}/stub-item", source.url.trim_end_matches('/')),
            summary: "Collected by the stub".to_string(),
            published_at: now,
            source_name: source.name.clone(),
            category: source.category.clone(),
            fetched_at: now,
        }])
    }
}

/// Write a sources file and keep its directory alive with the returned guard.
pub fn sources_file(yaml: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sources.yaml");
    std::fs::write(&path, yaml).unwrap();
    (dir, path)
}
