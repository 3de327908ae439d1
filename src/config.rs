//! Configuration for corpus building
//!
//! Defines the dataset TOML schema. Every section is optional; missing
//! values fall back to the defaults below.
//!
//! ```toml
//! naming = "hash"
//! jobs = 8
//! extensions = ["mid", "midi"]
//!
//! [segmenter]
//! bars_per_segment = 8
//!
//! [tokenizer]
//! kind = "remi"
//! pitch_low = 21
//! pitch_high = 108
//!
//! [filter]
//! required_numerator = 4
//! min_beats = 10
//!
//! [merge]
//! voices = 2
//! policy = "strict"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::dataset::MergeConfig;
use crate::error::CorpusError;
use crate::segment::{Token, BAR_TOKEN};
use crate::store::NamingScheme;
use crate::tokenizer::{TokenizerConfig, ValidityFilter};

/// Bar segmentation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Bars per segment
    pub bars_per_segment: usize,

    /// Token id marking a bar start
    pub bar_token: Token,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            bars_per_segment: 8,
            bar_token: BAR_TOKEN,
        }
    }
}

/// Full dataset configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// How stored documents are named
    #[serde(default)]
    pub naming: NamingScheme,

    /// Source file extensions (without dots)
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Pieces processed concurrently
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    #[serde(default)]
    pub segmenter: SegmenterConfig,

    #[serde(default)]
    pub tokenizer: TokenizerConfig,

    #[serde(default)]
    pub filter: ValidityFilter,

    #[serde(default)]
    pub merge: MergeConfig,
}

fn default_extensions() -> Vec<String> {
    vec!["mid".to_string(), "midi".to_string()]
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            naming: NamingScheme::default(),
            extensions: default_extensions(),
            jobs: default_jobs(),
            segmenter: SegmenterConfig::default(),
            tokenizer: TokenizerConfig::default(),
            filter: ValidityFilter::default(),
            merge: MergeConfig::default(),
        }
    }
}

impl DatasetConfig {
    /// Load config from TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset config: {:?}", path))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse dataset config: {:?}", path))?;
        Ok(config)
    }

    /// Load from `path` if given, else `./dataset.toml` if present, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        let local_path = Path::new("dataset.toml");
        if local_path.exists() {
            return Self::load(local_path);
        }
        Ok(Self::default())
    }

    /// Save config to TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check run-level settings before any work starts
    pub fn validate(&self) -> std::result::Result<(), CorpusError> {
        if self.segmenter.bars_per_segment == 0 {
            return Err(CorpusError::InvalidConfiguration(
                "bars_per_segment must be a positive integer".to_string(),
            ));
        }
        if self.jobs == 0 {
            return Err(CorpusError::InvalidConfiguration("jobs must be at least 1".to_string()));
        }
        if self.extensions.is_empty() {
            return Err(CorpusError::InvalidConfiguration(
                "at least one source extension is required".to_string(),
            ));
        }
        self.tokenizer.validate()?;
        self.merge.validate()?;
        Ok(())
    }
}
