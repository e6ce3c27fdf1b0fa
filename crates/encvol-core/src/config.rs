//! Engine configuration.
//!
//! # Example configuration
//!
//! ```toml
//! copy_buffer_size = 65536
//! listing_order = "case_insensitive"
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Chunk size used when streaming content between volumes and the host.
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 8192;

/// How entries within a listing group are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingOrder {
    /// Plain byte-wise comparison of names.
    #[default]
    Lexicographic,
    /// Compare lowercased names, falling back to byte order on ties.
    CaseInsensitive,
}

impl ListingOrder {
    pub fn compare(self, a: &str, b: &str) -> Ordering {
        match self {
            ListingOrder::Lexicographic => a.cmp(b),
            ListingOrder::CaseInsensitive => a
                .to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b)),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bytes moved per read/write round when streaming file content.
    ///
    /// Default: 8192.
    pub copy_buffer_size: usize,

    /// Ordering applied within the directory and file groups of a listing.
    pub listing_order: ListingOrder,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
            listing_order: ListingOrder::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.copy_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                key: "copy_buffer_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn with_copy_buffer_size(mut self, size: usize) -> Self {
        self.copy_buffer_size = size;
        self
    }

    #[must_use]
    pub fn with_listing_order(mut self, order: ListingOrder) -> Self {
        self.listing_order = order;
        self
    }
}
