//! Core data types for the DCA backtest engine.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single trading day in a price history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PricePoint {
    /// Trading date
    pub date: NaiveDate,
    /// Closing price in the instrument's native currency
    pub close: f64,
    /// Cash dividend paid per share on this date
    #[serde(default)]
    pub dividend: f64,
}

impl PricePoint {
    /// Create a price point with no dividend.
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            close,
            dividend: 0.0,
        }
    }

    /// Attach a per-share dividend to this point.
    pub fn with_dividend(mut self, dividend: f64) -> Self {
        self.dividend = dividend;
        self
    }
}

/// A non-empty price history ordered by strictly increasing date.
///
/// Construction is the only validation gate for ordering; close prices are
/// checked by the simulation itself so the failing date can be reported.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Validate and wrap a list of price points.
    pub fn new(points: Vec<PricePoint>) -> Result<Self> {
        if points.is_empty() {
            return Err(Error::InvalidInput("Price series is empty".to_string()));
        }

        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(Error::DataIntegrity(format!(
                    "Dates must be strictly increasing: {} follows {}",
                    pair[1].date, pair[0].date
                )));
            }
        }

        if let Some(bad) = points
            .iter()
            .find(|p| !p.dividend.is_finite() || p.dividend < 0.0)
        {
            return Err(Error::DataIntegrity(format!(
                "Invalid dividend {} on {}",
                bad.dividend, bad.date
            )));
        }

        Ok(Self { points })
    }

    /// All points in date order.
    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Iterate over the trading dates in order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|p| p.date)
    }

    /// Number of trading days.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a constructed series; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First trading date.
    pub fn first_date(&self) -> NaiveDate {
        self.points[0].date
    }

    /// Last trading date.
    pub fn last_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }

    /// Keep only the trailing `years` of history.
    ///
    /// Points strictly after `last_date - years` survive, so a three-year window
    /// ending 2024-06-30 starts on 2021-07-01. `years == 0` keeps everything.
    pub fn last_years(&self, years: u32) -> Self {
        if years == 0 {
            return self.clone();
        }

        let cutoff = self
            .last_date()
            .checked_sub_months(Months::new(years.saturating_mul(12)))
            .unwrap_or(NaiveDate::MIN);

        let points: Vec<PricePoint> = self
            .points
            .iter()
            .filter(|p| p.date > cutoff)
            .copied()
            .collect();

        // The last point always survives the cutoff, so the slice is never empty.
        Self { points }
    }

    /// Whole years of history available, as used for lookback limits.
    pub fn years_available(&self) -> u32 {
        let days = (self.last_date() - self.first_date()).num_days();
        (days / 365) as u32
    }
}

impl<'de> Deserialize<'de> for PriceSeries {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let points = Vec::<PricePoint>::deserialize(deserializer)?;
        PriceSeries::new(points).map_err(serde::de::Error::custom)
    }
}

/// Position state at the close of one trading day, in reporting currency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SimulationSnapshot {
    /// Trading date
    pub date: NaiveDate,
    /// Cumulative contributions
    pub invested_principal: f64,
    /// Market value of shares held
    pub portfolio_value: f64,
    /// Contributions compounded at the inflation rate
    pub benchmark_principal: f64,
    /// Shares held (unconverted)
    pub shares_held: f64,
}

/// A dated cash flow from the investor's point of view.
///
/// Contributions are negative; the terminal liquidation value is positive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CashFlowEvent {
    pub date: NaiveDate,
    pub amount: f64,
}

impl CashFlowEvent {
    /// Create a cash flow.
    pub fn new(date: NaiveDate, amount: f64) -> Self {
        Self { date, amount }
    }
}

/// Scalar outcome of a backtest, in reporting currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestSummary {
    /// First simulated date (YYYY-MM-DD)
    pub start_date: NaiveDate,
    /// Last simulated date (YYYY-MM-DD)
    pub end_date: NaiveDate,
    /// Number of contributions actually made
    pub contribution_count: usize,
    /// Total principal contributed
    pub total_invested: f64,
    /// Portfolio value on the last date
    pub final_value: f64,
    /// Gain over principal as a percentage
    pub simple_return_pct: f64,
    /// Final value minus the inflation-compounded principal
    pub excess_return: f64,
    /// Maximum drawdown percentage, in [-100, 0]
    pub mdd_pct: f64,
    /// Annualized money-weighted return percentage; `None` when the solver diverged
    pub money_weighted_return_pct: Option<f64>,
}

/// API response wrapper for success cases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn err(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error.into()),
        }
    }
}
