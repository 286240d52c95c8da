//! Codec configuration.
//!
//! Read from a RON, TOML or JSON file, chosen by extension:
//!
//! ```toml
//! [limits]
//! flags = 1000
//! serfs = 4000
//!
//! [text]
//! strict_numbers = true
//! ```
//!
//! Every field is optional and falls back to its default.

use serde::{Deserialize, Serialize};
use settler_core::table::TableLimits;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Options
// ===========================================================================

/// Text decoder options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    /// Reject malformed numbers instead of reading them as zero.
    pub strict_numbers: bool,
}

/// Settings shared by every loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub limits: TableLimits,
    pub text: TextOptions,
}

// ===========================================================================
// Loading
// ===========================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<ConfigFormat, ConfigError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(ConfigFormat::Ron),
        Some("toml") => Ok(ConfigFormat::Toml),
        Some("json") => Ok(ConfigFormat::Json),
        _ => Err(ConfigError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

impl CodecConfig {
    pub fn from_str_with(content: &str, format: ConfigFormat, file: &Path) -> Result<Self, ConfigError> {
        let parse_err = |detail: String| ConfigError::Parse {
            file: file.to_path_buf(),
            detail,
        };
        match format {
            ConfigFormat::Ron => ron::from_str(content).map_err(|e| parse_err(e.to_string())),
            ConfigFormat::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
            ConfigFormat::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::from_str_with(content, ConfigFormat::Toml, Path::new("<inline>"))
    }

    /// Read a config file, picking the parser from its extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::from_str_with(&content, format, path)
    }
}
