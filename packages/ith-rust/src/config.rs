//! Layered settings for the feature pipeline.
//!
//! Precedence (highest to lowest):
//! 1. Environment variables (`ITH_` prefix, `__` between sections)
//! 2. Configuration file (`ith.toml`, optional)
//! 3. Default values

use std::path::Path;

use ::config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ith_multiscale::MultiscaleConfig;
use crate::normalizer::NormalizerConfig;

/// Root settings structure.
///
/// `ITH_MULTISCALE__THRESHOLD_DBPS=100` overrides `multiscale.threshold_dbps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IthSettings {
    /// Multi-lookback feature matrix settings
    pub multiscale: MultiscaleConfig,

    /// Online normalizer settings
    pub normalizer: NormalizerConfig,
}

impl IthSettings {
    /// Load settings from defaults, `ith.toml` if present, then the environment.
    pub fn load() -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(&IthSettings::default())?)
            .add_source(File::with_name("ith").format(FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("ITH")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        tracing::debug!(?settings, "settings loaded");
        Ok(settings)
    }

    /// Load settings from defaults overlaid with a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let settings: Self = Config::builder()
            .add_source(Config::try_from(&IthSettings::default())?)
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        tracing::debug!(path = %path.display(), ?settings, "settings loaded from file");
        Ok(settings)
    }
}
