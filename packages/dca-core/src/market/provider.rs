//! Quote provider trait and a file-backed implementation.

use std::fs;
use std::path::{Path, PathBuf};

use crate::types::PriceSeries;
use crate::{Error, Result};

/// Source of historical price series.
///
/// Implementations must be safe to share across threads so a single cache or
/// retry wrapper can serve concurrent backtests.
pub trait QuoteProvider: Send + Sync {
    /// Unique identifier for this provider, used in logs.
    fn id(&self) -> &'static str;

    /// Fetch the full available daily history for `symbol`.
    fn fetch_history(&self, symbol: &str) -> Result<PriceSeries>;
}

impl<P: QuoteProvider + ?Sized> QuoteProvider for Box<P> {
    fn id(&self) -> &'static str {
        (**self).id()
    }

    fn fetch_history(&self, symbol: &str) -> Result<PriceSeries> {
        (**self).fetch_history(symbol)
    }
}

/// Reads `<dir>/<SYMBOL>.json`, each a JSON array of price points.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    dir: PathBuf,
}

impl JsonFileProvider {
    /// Create a provider rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the provider reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `symbol`'s history.
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.json", symbol.to_uppercase()))
    }

    /// Load a series from an explicit file path.
    pub fn load_file(path: &Path) -> Result<PriceSeries> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl QuoteProvider for JsonFileProvider {
    fn id(&self) -> &'static str {
        "JSON_FILE"
    }

    fn fetch_history(&self, symbol: &str) -> Result<PriceSeries> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(Error::QuoteUnavailable(format!(
                "No history for {} at {}",
                symbol,
                path.display()
            )));
        }

        let series = Self::load_file(&path)?;
        tracing::debug!(
            "Loaded {} points for {} from {}",
            series.len(),
            symbol,
            path.display()
        );
        Ok(series)
    }
}
