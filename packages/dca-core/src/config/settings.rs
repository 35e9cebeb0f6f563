//! Persisted user defaults for backtest runs.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::simulation::DEFAULT_INFLATION_RATE;
use crate::{Error, Result};

/// Defaults applied when a backtest request leaves a parameter unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Monthly contribution budget in the instrument's currency
    pub default_budget: f64,
    /// Annual inflation rate for the benchmark curve
    pub inflation_rate: f64,
    /// Years of history to replay
    pub lookback_years: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_budget: 1_000_000.0,
            inflation_rate: DEFAULT_INFLATION_RATE,
            lookback_years: 3,
        }
    }
}

impl Settings {
    /// Get the default settings file path.
    ///
    /// Default path: `~/.dca/settings.json`
    /// Can be overridden with `DCA_SETTINGS_FILE` environment variable.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("DCA_SETTINGS_FILE") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".dca/settings.json"))
            .unwrap_or_else(|| PathBuf::from("settings.json"))
    }

    /// Load settings from the default path.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load settings from a specific path, falling back to defaults if absent.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::default_path())
    }

    /// Save settings to a specific path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        tracing::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Reject values a backtest could not run with.
    pub fn validate(&self) -> Result<()> {
        if !self.default_budget.is_finite() || self.default_budget <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Default budget must be positive, got {}",
                self.default_budget
            )));
        }

        if !self.inflation_rate.is_finite() || self.inflation_rate < 0.0 {
            return Err(Error::InvalidInput(format!(
                "Inflation rate must be non-negative, got {}",
                self.inflation_rate
            )));
        }

        Ok(())
    }
}
