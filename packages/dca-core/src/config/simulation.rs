//! Per-run simulation parameters.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Annual rate used to compound the benchmark principal when none is given.
pub const DEFAULT_INFLATION_RATE: f64 = 0.02;

/// Order of dividend reinvestment relative to a same-day contribution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DividendTiming {
    /// Dividend accrues on the shares held before that day's purchase.
    #[default]
    BeforeContribution,
    /// Shares bought that day also receive the dividend.
    AfterContribution,
}

/// How a contribution is turned into shares.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseMode {
    /// The full amount buys a fractional share count.
    #[default]
    Fractional,
    /// Only whole shares are bought; leftover cash is not invested.
    WholeShares,
}

/// Parameters for one simulation run.
///
/// The conversion rate is sampled once by the caller and held for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Whether the instrument is quoted in a currency other than the reporting one
    pub currency_is_foreign: bool,
    /// Reporting-currency units per native-currency unit
    pub conversion_rate: f64,
    /// Annual inflation rate for the benchmark curve (0.02 = 2%)
    pub inflation_rate: f64,
    /// Dividend vs contribution ordering on the same date
    pub dividend_timing: DividendTiming,
    /// Fractional or whole-share purchases
    pub purchase_mode: PurchaseMode,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            currency_is_foreign: false,
            conversion_rate: 1.0,
            inflation_rate: DEFAULT_INFLATION_RATE,
            dividend_timing: DividendTiming::default(),
            purchase_mode: PurchaseMode::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a config for an instrument quoted in a foreign currency.
    pub fn foreign(conversion_rate: f64) -> Self {
        Self {
            currency_is_foreign: true,
            conversion_rate,
            ..Default::default()
        }
    }

    /// Set the benchmark inflation rate.
    pub fn with_inflation_rate(mut self, inflation_rate: f64) -> Self {
        self.inflation_rate = inflation_rate;
        self
    }

    /// Set the dividend ordering.
    pub fn with_dividend_timing(mut self, timing: DividendTiming) -> Self {
        self.dividend_timing = timing;
        self
    }

    /// Set the purchase mode.
    pub fn with_purchase_mode(mut self, mode: PurchaseMode) -> Self {
        self.purchase_mode = mode;
        self
    }

    /// Check the numeric parameters.
    pub fn validate(&self) -> Result<()> {
        if !self.conversion_rate.is_finite() || self.conversion_rate <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Conversion rate must be positive, got {}",
                self.conversion_rate
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

    /// The rate applied to native amounts: 1 for domestic instruments.
    pub fn effective_rate(&self) -> f64 {
        if self.currency_is_foreign {
            self.conversion_rate
        } else {
            1.0
        }
    }
}
