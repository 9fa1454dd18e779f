use crate::types::{AggregatorError, Result, SourceDescriptor};
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct SourcesFile {
    #[serde(default)]
    sources: Vec<SourceDescriptor>,
}

/// Reads the configured source list. Nothing is cached: every `load` goes
/// back to the file, so edits show up on the next refresh cycle.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    path: PathBuf,
}

impl SourceRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the source list in file order. The format follows the file
    /// extension (`.yaml`/`.yml`, `.toml` or `.json`).
    pub fn load(&self) -> Result<Vec<SourceDescriptor>> {
        if !self.path.is_file() {
            return Err(AggregatorError::Config(format!(
                "sources file not found: {}",
                self.path.display()
            )));
        }

        let file: SourcesFile = Config::builder()
            .add_source(File::from(self.path.as_path()))
            .build()?
            .try_deserialize()?;

        debug!("Loaded {} sources from {}", file.sources.len(), self.path.display());
        validate(file.sources)
    }

    /// Parse a source list held in memory.
    pub fn load_from_str(content: &str, format: FileFormat) -> Result<Vec<SourceDescriptor>> {
        let file: SourcesFile = Config::builder()
            .add_source(File::from_str(content, format))
            .build()?
            .try_deserialize()?;

        validate(file.sources)
    }
}

fn validate(sources: Vec<SourceDescriptor>) -> Result<Vec<SourceDescriptor>> {
    let mut names = HashSet::new();

    for (index, source) in sources.iter().enumerate() {
        if source.name.trim().is_empty() {
            return Err(AggregatorError::Config(format!(
                "source #{} has an empty name",
                index + 1
            )));
        }
        if source.url.trim().is_empty() {
            return Err(AggregatorError::Config(format!(
                "source '{}' has an empty url",
                source.name
            )));
        }
        if !names.insert(source.name.as_str()) {
            warn!("Duplicate source name '{}' in configuration", source.name);
        }
    }

    Ok(sources)
}
