//! DCA Core - Dollar-cost averaging backtest library.
//!
//! This crate replays a recurring-contribution plan over a historical price series
//! and summarizes the outcome:
//!
//! - **Scheduling**: Daily, weekly, and monthly contribution calendars
//! - **Simulation**: Dividend reinvestment, FX normalization, inflation benchmark
//! - **Metrics**: Simple return, excess return, max drawdown, money-weighted return
//! - **Market data seams**: Quote provider trait, TTL cache, retry policy, symbol aliases
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use dca_core::{run_backtest, ContributionPolicy, PricePoint, PriceSeries, SimulationConfig};
//!
//! let day = |d| NaiveDate::from_ymd_opt(2024, 1, d).unwrap();
//! let series = PriceSeries::new(vec![
//!     PricePoint::new(day(2), 100.0),
//!     PricePoint::new(day(3), 110.0),
//!     PricePoint::new(day(4), 90.0),
//! ])
//! .unwrap();
//!
//! let policy = ContributionPolicy::daily(1000.0).unwrap();
//! let report = run_backtest(&series, &policy, &SimulationConfig::default()).unwrap();
//!
//! println!("Invested: {}", report.summary.total_invested);
//! println!("Final value: {}", report.summary.final_value);
//! ```

pub mod backtest;
pub mod config;
pub mod engine;
pub mod format;
pub mod market;
pub mod types;

// Re-export commonly used types
pub use types::{ApiResponse, BacktestSummary, CashFlowEvent, PricePoint, PriceSeries, SimulationSnapshot};

// Re-export main functionality
pub use backtest::{run_backtest, BacktestReport};
pub use config::{DividendTiming, PurchaseMode, SimulationConfig, Settings};
pub use engine::{
    build_schedule, max_drawdown_percent, money_weighted_return, simple_return_percent, simulate,
    summarize, ContributionPolicy, Interval, SimulationOutput,
};
pub use format::format_amount;
pub use market::{
    resolve_symbol, CachedProvider, JsonFileProvider, QuoteProvider, RetryPolicy, RetryingProvider,
};

/// Error types for dca-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("Numeric divergence: {0}")]
    NumericDivergence(String),

    #[error("Quote data unavailable: {0}")]
    QuoteUnavailable(String),
}

impl Error {
    /// Whether retrying the operation that produced this error could succeed.
    ///
    /// Only provider-side failures qualify; bad input or corrupt data stays bad.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::QuoteUnavailable(_))
    }
}

/// Result type for dca-core operations.
pub type Result<T> = std::result::Result<T, Error>;
