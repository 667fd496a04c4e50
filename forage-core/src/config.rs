//! Configuration for a forage search run
//!
//! Loaded from TOML. Every section is optional and falls back to its defaults:
//!
//! ```toml
//! [search]
//! max_iterations = 500
//! exploration_constant = 1.4
//!
//! [clustering]
//! threshold = 0.3
//!
//! [encoder]
//! kind = "bag_of_programs"
//! dimensions = 128
//!
//! [extractor]
//! kind = "step_indexed"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cluster::ClusteringConfig;
use crate::encoding::{EncoderConfig, build_encoder};
use crate::error::{ForageError, Result};
use crate::extraction::ExtractorConfig;
use crate::search::SearchConfig;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForageConfig {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

impl ForageConfig {
    /// User config location (`<config dir>/forage/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("forage").join("config.toml"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ForageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ForageError::Serialization(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write to `path`, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.search.validate()?;
        self.clustering.validate()?;
        // Encoder parameters are only checked by building one
        build_encoder(&self.encoder)
            .map(|_| ())
            .map_err(|e| ForageError::Config(format!("encoder: {e}")))
    }
}
