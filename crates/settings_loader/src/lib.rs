//! # Settings Loader
//!
//! Loads the import settings (`settings.json`) used by the MetaTrader 5 importer:
//! how far to look for the "Positions" banner in spreadsheets, extra column-name
//! synonyms for broker-specific exports, and the default trade journal location.
//!
//! ## Usage Examples
//!
//! ```rust,no_run
//! use settings_loader;
//! use std::path::PathBuf;
//!
//! // Load settings from a specific path
//! let settings = settings_loader::load_settings("config/mt5.json")?;
//!
//! // Load optional settings (returns None if no path is given)
//! let path = Some(PathBuf::from("settings.json"));
//! let settings = settings_loader::load_optional_settings(path.as_ref())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use models::ImportSettings;

pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

/// Loads settings from a JSON file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<ImportSettings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    parse_settings(&raw).with_context(|| format!("Parsing settings JSON in {}", path.display()))
}

/// Parses settings from a JSON string. Missing keys take their defaults.
pub fn parse_settings(raw: &str) -> Result<ImportSettings> {
    let settings: ImportSettings = serde_json::from_str(raw)?;
    Ok(settings)
}

/// Loads settings from the default location (settings.json in the current directory)
pub fn load_default_settings() -> Result<ImportSettings> {
    load_settings(DEFAULT_SETTINGS_FILE)
}

/// Loads settings from an optional path, returning None if no path is provided
pub fn load_optional_settings(path: Option<&PathBuf>) -> Result<Option<ImportSettings>> {
    match path {
        Some(settings_path) => Ok(Some(load_settings(settings_path)?)),
        None => Ok(None),
    }
}

/// Tries the provided path first, then the default location. Falls back to the
/// built-in defaults when no readable settings file exists anywhere.
pub fn load_settings_with_fallback(path: Option<&PathBuf>) -> Result<ImportSettings> {
    if let Some(settings_path) = path {
        match load_settings(settings_path) {
            Ok(settings) => return Ok(settings),
            Err(e) => {
                tracing::warn!("{:#}; trying {}", e, DEFAULT_SETTINGS_FILE);
            }
        }
    }

    if Path::new(DEFAULT_SETTINGS_FILE).exists() {
        return load_default_settings();
    }

    Ok(ImportSettings::default())
}
