//! Types shared across the ingestion boundary: what a source looks like,
//! what an ingested item looks like, and what a refresh reports back.

pub mod defs;

pub use defs::{
    NewsItem, NewsPage, NewsRecord, RefreshOutcome, RefreshStatus, SourceDescriptor, SourceKind,
};
