use crate::types::{FetchConfig, FetchError, FetchErrorKind, Result, SourceDescriptor};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// Performs one HTTP GET per source. Failures come back as a `FetchError`
/// value; there is no retry here, the next scheduled cycle is the retry.
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let redirect = if config.follow_redirects {
            reqwest::redirect::Policy::limited(config.max_redirects)
        } else {
            reqwest::redirect::Policy::none()
        };

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(redirect)
            .build()?;

        Ok(Self { client })
    }

    pub async fn fetch(
        &self,
        source: &SourceDescriptor,
    ) -> std::result::Result<Vec<u8>, FetchError> {
        let start_time = Instant::now();

        let url = Url::parse(&source.url).map_err(|e| {
            let kind = FetchErrorKind::InvalidUrl(format!("{}: {}", source.url, e));
            FetchError::new(&source.name, kind)
        })?;

        debug!("[{}] Fetching {}", source.name, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::new(&source.name, classify(&e)))?;

        let status = response.status();
        if !status.is_success() {
            warn!("[{}] HTTP {} from {}", source.name, status, source.url);
            return Err(FetchError::new(&source.name, FetchErrorKind::Status(status.as_u16())));
        }

        let body = response.bytes().await.map_err(|e| {
            let kind = if e.is_timeout() {
                FetchErrorKind::Timeout
            } else {
                FetchErrorKind::Body(e.to_string())
            };
            FetchError::new(&source.name, kind)
        })?;

        info!(
            "[{}] Fetched {} bytes in {}ms",
            source.name,
            body.len(),
            start_time.elapsed().as_millis()
        );
        Ok(body.to_vec())
    }
}

fn classify(e: &reqwest::Error) -> FetchErrorKind {
    if e.is_timeout() {
        FetchErrorKind::Timeout
    } else if e.is_connect() {
        FetchErrorKind::Connect(e.to_string())
    } else if let Some(status) = e.status() {
        FetchErrorKind::Status(status.as_u16())
    } else {
        FetchErrorKind::Request(e.to_string())
    }
}
