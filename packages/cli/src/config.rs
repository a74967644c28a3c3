//! Optional TOML configuration for pipeline runs.
//!
//! ```toml
//! [analysis]
//! metric_crs = "EPSG:25832"
//! runoff_coefficient = 0.15
//!
//! [ingest]
//! documents_dir = "docs"
//! ```
//!
//! Every key is optional. Command-line flags override file values.

use std::path::{Path, PathBuf};

use nitrogen_map_analysis::AnalysisConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        /// The configuration file.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or has unexpected values.
    #[error("Invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Folder below the workspace root that holds the management PDFs when
/// no documents directory is configured.
pub const DEFAULT_DOCUMENTS_DIR: &str = "Bewirtschaftungsdokumentation-PDF";

/// Input discovery settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory holding management PDFs. When unset,
    /// [`DEFAULT_DOCUMENTS_DIR`] below the workspace root is used.
    pub documents_dir: Option<PathBuf>,
}

impl IngestConfig {
    /// The directory management PDFs are read from for a run over `root`.
    #[must_use]
    pub fn documents_dir_for(&self, root: &Path) -> PathBuf {
        self.documents_dir
            .clone()
            .unwrap_or_else(|| root.join(DEFAULT_DOCUMENTS_DIR))
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Analysis parameters.
    pub analysis: AnalysisConfig,
    /// Input discovery settings.
    pub ingest: IngestConfig,
}

impl PipelineConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text is not a valid
    /// configuration.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}
