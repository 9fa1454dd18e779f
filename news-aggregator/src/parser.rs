use crate::types::{AggregatorError, NewsItem, Result, SourceDescriptor};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use feed_rs::model::Entry;
use feed_rs::parser;
use once_cell::sync::Lazy;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use regex::Regex;
use tracing::{debug, warn};

pub const SUMMARY_MAX_CHARS: usize = 300;
pub const UNTITLED: &str = "(untitled)";
const ELLIPSIS: char = '…';

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

// Tried in order after RFC 3339 and RFC 2822.
const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%d %b %Y %H:%M:%S %z",
];

// No offset in the text: read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

/// Turns raw RSS/Atom bytes into `NewsItem`s for one source.
pub struct FeedParser {
    summary_max_chars: usize,
}

impl Default for FeedParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedParser {
    pub fn new() -> Self {
        Self {
            summary_max_chars: SUMMARY_MAX_CHARS,
        }
    }

    /// Parse the document into raw entries. Entry ids are only what the feed
    /// itself declares (`guid` / `id`); nothing is synthesized.
    pub fn parse_entries(&self, content: &[u8]) -> Result<Vec<Entry>> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::Builder::new()
            .id_generator(|_links, _title, _uri| String::new())
            .timestamp_parser(parse_timestamp)
            .build()
            .parse(content)
            .map_err(|e| AggregatorError::Parse(format!("Failed to parse feed: {}", e)))?;

        Ok(feed.entries)
    }

    /// Normalize one fetch pass. A malformed document yields no items; the
    /// error is logged and never returned.
    pub fn normalize(
        &self,
        source: &SourceDescriptor,
        content: &[u8],
        fetched_at: DateTime<Utc>,
    ) -> Vec<NewsItem> {
        let entries = match self.parse_entries(content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("[{}] {}", source.name, e);
                return Vec::new();
            }
        };

        let entry_count = entries.len();
        let mut created = created_dates(content);
        if created.len() != entry_count {
            debug!(
                "[{}] Found {} entry elements for {} parsed entries, ignoring created dates",
                source.name,
                created.len(),
                entry_count
            );
            created = vec![None; entry_count];
        }

        let items: Vec<NewsItem> = entries
            .into_iter()
            .zip(created)
            .filter_map(|(entry, created)| self.to_news_item(source, entry, created, fetched_at))
            .collect();

        debug!(
            "[{}] Normalized {} items from {} entries",
            source.name,
            items.len(),
            entry_count
        );
        items
    }

    fn to_news_item(
        &self,
        source: &SourceDescriptor,
        entry: Entry,
        created: Option<DateTime<Utc>>,
        fetched_at: DateTime<Utc>,
    ) -> Option<NewsItem> {
        let url = match entry_url(&entry) {
            Some(url) => url,
            None => {
                debug!("[{}] Skipping entry without link or id", source.name);
                return None;
            }
        };

        let title = entry
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        let raw_summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .unwrap_or_default();
        let summary = clean_summary(&raw_summary, self.summary_max_chars);

        if let Some(keyword) = source.active_filter() {
            if !matches_keyword(&title, &summary, keyword) {
                debug!("[{}] Dropping '{}': no match for '{}'", source.name, title, keyword);
                return None;
            }
        }

        let candidates = [entry.published, entry.updated, created];
        let published_at = resolve_published(&candidates, fetched_at);

        Some(NewsItem {
            title,
            url,
            summary,
            published_at,
            source_name: source.name.clone(),
            category: source.category.clone(),
            fetched_at,
        })
    }
}

/// The alternate (or first) link, falling back to the entry id.
fn entry_url(entry: &Entry) -> Option<String> {
    let link = entry
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim())
        .filter(|href| !href.is_empty());

    link.or_else(|| Some(entry.id.trim()).filter(|id| !id.is_empty()))
        .map(str::to_string)
}

/// The `created` date of every `item`/`entry` element, in document order.
/// Matches `dcterms:created`, `dc:created` and Atom 0.3 `<created>` by local
/// name. Returns nothing usable for a document that is not well-formed XML.
pub fn created_dates(content: &[u8]) -> Vec<Option<DateTime<Utc>>> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(true);

    let mut dates = Vec::new();
    let mut buf = Vec::new();
    let mut in_entry = false;
    let mut in_created = false;
    let mut current = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" if !in_entry => {
                    in_entry = true;
                    current = None;
                }
                b"created" if in_entry => in_created = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"item" | b"entry" if in_entry => {
                    dates.push(current.take());
                    in_entry = false;
                    in_created = false;
                }
                b"created" => in_created = false,
                _ => {}
            },
            Ok(Event::Text(text)) if in_created && current.is_none() => {
                current = text.unescape().ok().and_then(|raw| parse_timestamp(&raw));
            }
            Ok(Event::CData(data)) if in_created && current.is_none() => {
                current = std::str::from_utf8(&data).ok().and_then(parse_timestamp);
            }
            Ok(Event::Eof) => break,
            Err(_) => return Vec::new(),
            _ => {}
        }
        buf.clear();
    }

    dates
}

/// Strip markup, trim, and cap at `max_chars` characters, adding an
/// ellipsis only when something was cut.
pub fn clean_summary(raw: &str, max_chars: usize) -> String {
    let stripped = TAG_PATTERN.replace_all(raw, "");
    let text = stripped.trim();

    if text.chars().count() > max_chars {
        let mut truncated: String = text.chars().take(max_chars).collect();
        truncated.push(ELLIPSIS);
        truncated
    } else {
        text.to_string()
    }
}

pub fn matches_keyword(title: &str, summary: &str, keyword: &str) -> bool {
    let haystack = format!("{} {}", title, summary).to_lowercase();
    haystack.contains(&keyword.to_lowercase())
}

/// First candidate that parsed, else the fetch instant.
pub fn resolve_published(
    candidates: &[Option<DateTime<Utc>>],
    fetched_at: DateTime<Utc>,
) -> DateTime<Utc> {
    candidates.iter().flatten().next().copied().unwrap_or(fetched_at)
}

/// Lenient feed timestamp parsing. Values without an offset are UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
