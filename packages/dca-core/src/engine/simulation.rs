//! Forward simulation of a recurring-contribution plan.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use super::schedule::ContributionPolicy;
use crate::config::{DividendTiming, PurchaseMode, SimulationConfig};
use crate::types::{CashFlowEvent, PricePoint, PriceSeries, SimulationSnapshot};
use crate::{Error, Result};

/// Days per year used when compounding the benchmark.
const DAYS_PER_YEAR: f64 = 365.0;

/// Snapshots and contribution cash flows from one simulation run.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    /// One snapshot per price point, in date order
    pub snapshots: Vec<SimulationSnapshot>,
    /// One negative flow per contribution actually made
    pub cash_flows: Vec<CashFlowEvent>,
}

impl SimulationOutput {
    /// The last snapshot, if the run produced any.
    pub fn final_snapshot(&self) -> Option<&SimulationSnapshot> {
        self.snapshots.last()
    }

    /// Contribution flows followed by the terminal liquidation value.
    pub fn cash_flows_with_terminal(&self) -> Vec<CashFlowEvent> {
        let mut flows = self.cash_flows.clone();
        if let Some(last) = self.final_snapshot() {
            flows.push(CashFlowEvent::new(last.date, last.portfolio_value));
        }
        flows
    }
}

/// Running position, all amounts in the instrument's native currency.
#[derive(Debug, Default)]
struct Holdings {
    shares: f64,
    invested: f64,
    benchmark: f64,
}

impl Holdings {
    fn compound_benchmark(&mut self, inflation_rate: f64, elapsed_days: i64) {
        if self.benchmark > 0.0 && elapsed_days > 0 {
            self.benchmark *= (1.0 + inflation_rate).powf(elapsed_days as f64 / DAYS_PER_YEAR);
        }
    }

    fn reinvest_dividend(&mut self, point: &PricePoint) {
        if point.dividend > 0.0 && self.shares > 0.0 {
            self.shares += point.dividend * self.shares / point.close;
        }
    }

    /// Buy with `amount`, returning the cash actually spent.
    fn buy(&mut self, amount: f64, close: f64, mode: PurchaseMode) -> Option<f64> {
        let (shares, spent) = match mode {
            PurchaseMode::Fractional => (amount / close, amount),
            PurchaseMode::WholeShares => {
                let shares = (amount / close).floor();
                (shares, shares * close)
            }
        };

        if shares <= 0.0 {
            return None;
        }

        self.shares += shares;
        self.invested += spent;
        self.benchmark += spent;
        Some(spent)
    }
}

/// Replay `policy` over `series`, buying on every date in `schedule`.
///
/// Each date is processed in a fixed order: compound the benchmark over the gap
/// since the previous date, reinvest any dividend (before or after the purchase,
/// per `config.dividend_timing`), make the scheduled purchase, then record a
/// snapshot converted at the run's single conversion rate.
///
/// Schedule dates that are not in the series are ignored.
///
/// # Errors
///
/// Returns `InvalidInput` for a bad config and `DataIntegrity` if any close price
/// is not a positive number. No partial output is returned.
pub fn simulate(
    series: &PriceSeries,
    policy: &ContributionPolicy,
    schedule: &BTreeSet<NaiveDate>,
    config: &SimulationConfig,
) -> Result<SimulationOutput> {
    config.validate()?;

    let rate = config.effective_rate();
    let per_event = policy.per_event_amount();
    let reinvest = policy.reinvest_dividends();

    let mut holdings = Holdings::default();
    let mut snapshots = Vec::with_capacity(series.len());
    let mut cash_flows = Vec::with_capacity(schedule.len());
    let mut previous: Option<NaiveDate> = None;

    for point in series.points() {
        if !point.close.is_finite() || point.close <= 0.0 {
            return Err(Error::DataIntegrity(format!(
                "Close price must be positive, got {} on {}",
                point.close, point.date
            )));
        }

        let elapsed_days = previous.map_or(0, |prev| (point.date - prev).num_days());
        holdings.compound_benchmark(config.inflation_rate, elapsed_days);

        if reinvest && config.dividend_timing == DividendTiming::BeforeContribution {
            holdings.reinvest_dividend(point);
        }

        if schedule.contains(&point.date) {
            match holdings.buy(per_event, point.close, config.purchase_mode) {
                Some(spent) => {
                    tracing::debug!(
                        "Contribution on {}: {:.2} at {:.4}, {:.4} shares held",
                        point.date,
                        spent,
                        point.close,
                        holdings.shares
                    );
                    cash_flows.push(CashFlowEvent::new(point.date, -spent * rate));
                }
                None => {
                    tracing::debug!(
                        "Skipped contribution on {}: {:.2} buys no whole share at {:.4}",
                        point.date,
                        per_event,
                        point.close
                    );
                }
            }
        }

        if reinvest && config.dividend_timing == DividendTiming::AfterContribution {
            holdings.reinvest_dividend(point);
        }

        snapshots.push(SimulationSnapshot {
            date: point.date,
            invested_principal: holdings.invested * rate,
            portfolio_value: holdings.shares * point.close * rate,
            benchmark_principal: holdings.benchmark * rate,
            shares_held: holdings.shares,
        });
        previous = Some(point.date);
    }

    tracing::info!(
        "Simulated {} days ({} to {}), {} contributions",
        snapshots.len(),
        series.first_date(),
        series.last_date(),
        cash_flows.len()
    );

    Ok(SimulationOutput {
        snapshots,
        cash_flows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::build_schedule;
    use approx::assert_relative_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn series(points: &[(NaiveDate, f64, f64)]) -> PriceSeries {
        PriceSeries::new(
            points
                .iter()
                .map(|&(d, close, div)| PricePoint::new(d, close).with_dividend(div))
                .collect(),
        )
        .unwrap()
    }

    fn all_dates(series: &PriceSeries) -> BTreeSet<NaiveDate> {
        series.dates().collect()
    }

    #[test]
    fn test_three_monthly_buys() {
        let series = series(&[
            (date(2024, 1, 2), 100.0, 0.0),
            (date(2024, 2, 1), 110.0, 0.0),
            (date(2024, 3, 1), 90.0, 0.0),
        ]);
        let policy = ContributionPolicy::monthly(1, 1000.0).unwrap();
        let schedule = build_schedule(series.dates(), &policy.interval());

        let output = simulate(&series, &policy, &schedule, &SimulationConfig::default()).unwrap();

        assert_eq!(output.snapshots.len(), 3);
        assert_eq!(output.cash_flows.len(), 3);
        assert!(output.cash_flows.iter().all(|cf| cf.amount == -1000.0));

        let last = output.final_snapshot().unwrap();
        let shares = 10.0 + 1000.0 / 110.0 + 1000.0 / 90.0;
        assert_relative_eq!(last.shares_held, shares, epsilon = 1e-9);
        assert_relative_eq!(last.portfolio_value, shares * 90.0, epsilon = 1e-9);
        assert_relative_eq!(last.invested_principal, 3000.0);
    }

    #[test]
    fn test_zero_close_aborts() {
        let series = series(&[
            (date(2024, 1, 2), 100.0, 0.0),
            (date(2024, 1, 3), 0.0, 0.0),
            (date(2024, 1, 4), 90.0, 0.0),
        ]);
        let policy = ContributionPolicy::daily(1000.0).unwrap();

        let result = simulate(
            &series,
            &policy,
            &all_dates(&series),
            &SimulationConfig::default(),
        );
        assert!(matches!(result, Err(Error::DataIntegrity(_))));
    }

    #[test]
    fn test_invalid_config_aborts() {
        let series = series(&[(date(2024, 1, 2), 100.0, 0.0)]);
        let policy = ContributionPolicy::daily(1000.0).unwrap();

        let result = simulate(
            &series,
            &policy,
            &all_dates(&series),
            &SimulationConfig::foreign(0.0),
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_benchmark_compounds_after_first_contribution() {
        let series = series(&[
            (date(2023, 1, 2), 100.0, 0.0),
            (date(2024, 1, 2), 100.0, 0.0),
        ]);
        let policy = ContributionPolicy::monthly(1, 1000.0).unwrap();
        let schedule: BTreeSet<_> = [date(2023, 1, 2)].into_iter().collect();

        let output = simulate(&series, &policy, &schedule, &SimulationConfig::default()).unwrap();

        // Nothing to compound on the first day
        assert_relative_eq!(output.snapshots[0].benchmark_principal, 1000.0);
        // 365 days at 2%
        assert_relative_eq!(
            output.snapshots[1].benchmark_principal,
            1020.0,
            epsilon = 1e-9
        );
        assert_relative_eq!(output.snapshots[1].invested_principal, 1000.0);
    }

    #[test]
    fn test_benchmark_dominates_principal() {
        let series = series(&[
            (date(2024, 1, 2), 100.0, 0.0),
            (date(2024, 1, 9), 95.0, 0.0),
            (date(2024, 2, 1), 105.0, 0.0),
            (date(2024, 3, 1), 98.0, 0.0),
        ]);
        let policy = ContributionPolicy::daily(1000.0).unwrap();

        let output = simulate(
            &series,
            &policy,
            &all_dates(&series),
            &SimulationConfig::default(),
        )
        .unwrap();

        for pair in output.snapshots.windows(2) {
            assert!(pair[1].invested_principal >= pair[0].invested_principal);
            assert!(pair[1].benchmark_principal >= pair[0].benchmark_principal);
        }
        for snapshot in &output.snapshots[1..] {
            assert!(snapshot.benchmark_principal > snapshot.invested_principal);
        }
    }

    #[test]
    fn test_dividend_uses_prior_shares_by_default() {
        let series = series(&[
            (date(2024, 1, 2), 100.0, 0.0),
            (date(2024, 1, 3), 100.0, 5.0),
        ]);
        let policy = ContributionPolicy::monthly(1, 1000.0)
            .unwrap()
            .with_dividend_reinvestment(true);
        let schedule = all_dates(&series);

        let output = simulate(&series, &policy, &schedule, &SimulationConfig::default()).unwrap();

        // 10 shares earn 5.0 each = 50.0, buying 0.5 shares; then 10 more bought
        assert_relative_eq!(output.snapshots[1].shares_held, 20.5, epsilon = 1e-9);
    }

    #[test]
    fn test_dividend_after_contribution() {
        let series = series(&[
            (date(2024, 1, 2), 100.0, 0.0),
            (date(2024, 1, 3), 100.0, 5.0),
        ]);
        let policy = ContributionPolicy::monthly(1, 1000.0)
            .unwrap()
            .with_dividend_reinvestment(true);
        let config =
            SimulationConfig::default().with_dividend_timing(DividendTiming::AfterContribution);

        let output = simulate(&series, &policy, &all_dates(&series), &config).unwrap();

        // 20 shares earn 5.0 each = 100.0, buying 1.0 share
        assert_relative_eq!(output.snapshots[1].shares_held, 21.0, epsilon = 1e-9);
        // Dividends are not contributions
        assert_relative_eq!(output.snapshots[1].invested_principal, 2000.0);
    }

    #[test]
    fn test_dividend_ignored_without_reinvestment() {
        let series = series(&[
            (date(2024, 1, 2), 100.0, 0.0),
            (date(2024, 1, 3), 100.0, 5.0),
        ]);
        let policy = ContributionPolicy::monthly(1, 1000.0).unwrap();
        let schedule: BTreeSet<_> = [date(2024, 1, 2)].into_iter().collect();

        let output = simulate(&series, &policy, &schedule, &SimulationConfig::default()).unwrap();

        assert_relative_eq!(output.snapshots[1].shares_held, 10.0);
        assert_relative_eq!(output.snapshots[1].portfolio_value, 1000.0);
    }

    #[test]
    fn test_value_tracks_shares_without_dividends() {
        let series = series(&[
            (date(2024, 1, 2), 100.0, 0.0),
            (date(2024, 1, 3), 120.0, 0.0),
            (date(2024, 1, 4), 80.0, 0.0),
            (date(2024, 1, 5), 95.0, 0.0),
        ]);
        let policy = ContributionPolicy::monthly(1, 600.0).unwrap();
        let schedule: BTreeSet<_> = [date(2024, 1, 2), date(2024, 1, 4)].into_iter().collect();

        let output = simulate(&series, &policy, &schedule, &SimulationConfig::default()).unwrap();

        for (snapshot, point) in output.snapshots.iter().zip(series.points()) {
            assert_relative_eq!(
                snapshot.portfolio_value,
                snapshot.shares_held * point.close,
                epsilon = 1e-9
            );
        }
        // Shares only change on contribution dates
        assert_eq!(output.snapshots[0].shares_held, output.snapshots[1].shares_held);
        assert_eq!(output.snapshots[2].shares_held, output.snapshots[3].shares_held);
        assert!(output.snapshots[2].shares_held > output.snapshots[1].shares_held);
    }

    #[test]
    fn test_foreign_currency_conversion() {
        let series = series(&[
            (date(2024, 1, 2), 100.0, 0.0),
            (date(2024, 1, 3), 110.0, 0.0),
        ]);
        let policy = ContributionPolicy::monthly(1, 1000.0).unwrap();
        let schedule: BTreeSet<_> = [date(2024, 1, 2)].into_iter().collect();
        let config = SimulationConfig::foreign(1300.0).with_inflation_rate(0.0);

        let output = simulate(&series, &policy, &schedule, &config).unwrap();

        let last = output.final_snapshot().unwrap();
        assert_relative_eq!(last.shares_held, 10.0);
        assert_relative_eq!(last.invested_principal, 1_300_000.0);
        assert_relative_eq!(last.portfolio_value, 1_430_000.0, epsilon = 1e-6);
        assert_relative_eq!(last.benchmark_principal, 1_300_000.0);
        assert_relative_eq!(output.cash_flows[0].amount, -1_300_000.0);
    }

    #[test]
    fn test_whole_shares() {
        let series = series(&[
            (date(2024, 1, 2), 300.0, 0.0),
            (date(2024, 1, 3), 1200.0, 0.0),
        ]);
        let policy = ContributionPolicy::monthly(1, 1000.0).unwrap();
        let config = SimulationConfig::default().with_purchase_mode(PurchaseMode::WholeShares);

        let output = simulate(&series, &policy, &all_dates(&series), &config).unwrap();

        // 3 shares at 300; nothing affordable at 1200
        assert_eq!(output.cash_flows.len(), 1);
        assert_relative_eq!(output.cash_flows[0].amount, -900.0);
        assert_relative_eq!(output.snapshots[1].shares_held, 3.0);
        assert_relative_eq!(output.snapshots[1].invested_principal, 900.0);
    }

    #[test]
    fn test_schedule_outside_series_is_ignored() {
        let series = series(&[(date(2024, 1, 2), 100.0, 0.0)]);
        let policy = ContributionPolicy::daily(1000.0).unwrap();
        let schedule: BTreeSet<_> = [date(2023, 12, 29)].into_iter().collect();

        let output = simulate(&series, &policy, &schedule, &SimulationConfig::default()).unwrap();

        assert!(output.cash_flows.is_empty());
        assert_eq!(output.snapshots[0].invested_principal, 0.0);
    }

    #[test]
    fn test_terminal_cash_flow() {
        let series = series(&[
            (date(2024, 1, 2), 100.0, 0.0),
            (date(2024, 1, 3), 120.0, 0.0),
        ]);
        let policy = ContributionPolicy::monthly(1, 1000.0).unwrap();
        let schedule: BTreeSet<_> = [date(2024, 1, 2)].into_iter().collect();

        let output = simulate(&series, &policy, &schedule, &SimulationConfig::default()).unwrap();
        let flows = output.cash_flows_with_terminal();

        assert_eq!(flows.len(), 2);
        assert_eq!(flows[1].date, date(2024, 1, 3));
        assert_relative_eq!(flows[1].amount, 1200.0, epsilon = 1e-9);
    }
}
