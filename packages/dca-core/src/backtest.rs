//! End-to-end backtest: schedule, simulate, summarize.

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::engine::{build_schedule, simulate, summarize, ContributionPolicy};
use crate::market::{resolve_symbol, QuoteProvider};
use crate::types::{BacktestSummary, CashFlowEvent, PriceSeries, SimulationSnapshot};
use crate::Result;

/// Everything a backtest run produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    /// One snapshot per trading day
    pub snapshots: Vec<SimulationSnapshot>,
    /// Contributions (negative) followed by the terminal value (positive)
    pub cash_flows: Vec<CashFlowEvent>,
    /// Scalar metrics
    pub summary: BacktestSummary,
    /// Whole years of history the source offered before any lookback slicing
    pub years_available: u32,
}

/// Run a backtest over an already sliced series.
///
/// Fails with `InvalidInput` or `DataIntegrity` and no partial output; a
/// diverging money-weighted return only blanks that one summary field.
pub fn run_backtest(
    series: &PriceSeries,
    policy: &ContributionPolicy,
    config: &SimulationConfig,
) -> Result<BacktestReport> {
    let schedule = build_schedule(series.dates(), &policy.interval());
    tracing::debug!(
        "{} schedule selected {} of {} dates",
        policy.interval().name(),
        schedule.len(),
        series.len()
    );

    let output = simulate(series, policy, &schedule, config)?;
    let summary = summarize(&output)?;

    Ok(BacktestReport {
        cash_flows: output.cash_flows_with_terminal(),
        snapshots: output.snapshots,
        summary,
        years_available: series.years_available(),
    })
}

/// Resolve `query`, fetch its history, keep the trailing `lookback_years`, and run.
///
/// A lookback longer than the fetched history replays all of it; the report's
/// `years_available` tells the caller how much there was.
pub fn backtest_symbol<P: QuoteProvider + ?Sized>(
    provider: &P,
    query: &str,
    lookback_years: u32,
    policy: &ContributionPolicy,
    config: &SimulationConfig,
) -> Result<BacktestReport> {
    let symbol = resolve_symbol(query);
    let history = provider.fetch_history(&symbol)?;
    let available = history.years_available();
    if lookback_years > available {
        tracing::warn!(
            "{} has {} full years of history, fewer than the {} requested",
            symbol,
            available,
            lookback_years
        );
    }
    let series = history.last_years(lookback_years);

    tracing::info!(
        "Backtesting {} from {} to {} ({} years requested)",
        symbol,
        series.first_date(),
        series.last_date(),
        lookback_years
    );

    let mut report = run_backtest(&series, policy, config)?;
    report.years_available = available;
    Ok(report)
}
