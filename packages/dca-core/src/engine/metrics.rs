//! Return and risk metrics for a completed simulation.
//!
//! Provides simple return, max drawdown, and money-weighted return (XIRR).

use super::simulation::SimulationOutput;
use crate::types::{BacktestSummary, CashFlowEvent};
use crate::{Error, Result};

/// Starting rate for the money-weighted return solver.
pub const MWR_INITIAL_GUESS: f64 = 0.10;

/// Newton-Raphson iteration cap for the money-weighted return solver.
pub const MWR_MAX_ITERATIONS: usize = 100;

/// Solver stops once successive rates differ by less than this.
const RATE_TOLERANCE: f64 = 1e-9;

/// Solver stops once the net present value is this close to zero.
const NPV_TOLERANCE: f64 = 1e-7;

const DAYS_PER_YEAR: f64 = 365.0;

/// Build the scalar summary for a simulation run.
///
/// A diverging money-weighted return is logged and reported as `None`; every
/// other metric is still computed.
pub fn summarize(output: &SimulationOutput) -> Result<BacktestSummary> {
    let (first, last) = match (output.snapshots.first(), output.snapshots.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => {
            return Err(Error::InvalidInput(
                "Cannot summarize a simulation without snapshots".to_string(),
            ))
        }
    };

    let values: Vec<f64> = output.snapshots.iter().map(|s| s.portfolio_value).collect();

    let money_weighted_return_pct = match money_weighted_return(&output.cash_flows_with_terminal())
    {
        Ok(rate) => Some(rate * 100.0),
        Err(e) => {
            tracing::warn!("Money-weighted return undefined: {}", e);
            None
        }
    };

    Ok(BacktestSummary {
        start_date: first.date,
        end_date: last.date,
        contribution_count: output.cash_flows.len(),
        total_invested: last.invested_principal,
        final_value: last.portfolio_value,
        simple_return_pct: simple_return_percent(last.invested_principal, last.portfolio_value),
        excess_return: last.portfolio_value - last.benchmark_principal,
        mdd_pct: max_drawdown_percent(&values),
        money_weighted_return_pct,
    })
}

/// Gain over invested principal as a percentage.
///
/// Returns 0.0 when nothing was invested.
pub fn simple_return_percent(invested: f64, final_value: f64) -> f64 {
    if invested <= 0.0 {
        return 0.0;
    }
    ((final_value - invested) / invested) * 100.0
}

/// Calculate maximum drawdown from a series of portfolio values.
///
/// Returns the deepest peak-to-trough decline as a non-positive percentage
/// (e.g., -15.0 for a 15% drawdown). Values before the first positive peak are
/// skipped, since nothing is held yet.
pub fn max_drawdown_percent(values: &[f64]) -> f64 {
    let mut running_max = 0.0_f64;
    let mut max_drawdown = 0.0_f64;

    for &value in values {
        if value > running_max {
            running_max = value;
        }
        if running_max <= 0.0 {
            continue;
        }
        let drawdown = value / running_max - 1.0;
        if drawdown < max_drawdown {
            max_drawdown = drawdown;
        }
    }

    (max_drawdown * 100.0).max(-100.0)
}

/// Annualized money-weighted return (XIRR) of a dated cash-flow sequence.
///
/// Solves `sum(cf_i / (1 + r)^(days_i / 365)) = 0` by Newton-Raphson from
/// `r = 0.10`, where `days_i` counts from the earliest flow. Returns the rate as
/// a decimal (0.10 = 10%).
///
/// # Errors
///
/// `NumericDivergence` if the flows lack both a negative and a positive amount,
/// the iterate reaches `r <= -1`, the derivative vanishes, or the solver does
/// not converge within `MWR_MAX_ITERATIONS`.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use dca_core::{money_weighted_return, CashFlowEvent};
///
/// let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
/// let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
/// let flows = [CashFlowEvent::new(start, -1000.0), CashFlowEvent::new(end, 1100.0)];
///
/// let rate = money_weighted_return(&flows).unwrap();
/// assert!((rate - 0.10).abs() < 1e-6);
/// ```
pub fn money_weighted_return(cash_flows: &[CashFlowEvent]) -> Result<f64> {
    let has_outflow = cash_flows.iter().any(|cf| cf.amount < 0.0);
    let has_inflow = cash_flows.iter().any(|cf| cf.amount > 0.0);
    if !has_outflow || !has_inflow {
        return Err(Error::NumericDivergence(
            "Cash flows need at least one negative and one positive amount".to_string(),
        ));
    }

    let origin = cash_flows
        .iter()
        .map(|cf| cf.date)
        .min()
        .ok_or_else(|| Error::NumericDivergence("No cash flows".to_string()))?;

    let flows: Vec<(f64, f64)> = cash_flows
        .iter()
        .map(|cf| (cf.amount, (cf.date - origin).num_days() as f64 / DAYS_PER_YEAR))
        .collect();

    let mut rate = MWR_INITIAL_GUESS;

    for _ in 0..MWR_MAX_ITERATIONS {
        let base = 1.0 + rate;
        let (npv, slope) = flows.iter().fold((0.0, 0.0), |(npv, slope), &(amount, years)| {
            let discount = base.powf(years);
            (npv + amount / discount, slope - years * amount / (discount * base))
        });

        if !npv.is_finite() || !slope.is_finite() {
            return Err(Error::NumericDivergence(format!(
                "Non-finite present value at rate {}",
                rate
            )));
        }

        if npv.abs() < NPV_TOLERANCE {
            return Ok(rate);
        }

        if slope == 0.0 {
            return Err(Error::NumericDivergence(format!(
                "Zero derivative at rate {}",
                rate
            )));
        }

        let next = rate - npv / slope;
        if !next.is_finite() || next <= -1.0 {
            return Err(Error::NumericDivergence(format!(
                "Rate left the valid domain (r <= -1) after {}",
                rate
            )));
        }

        if (next - rate).abs() < RATE_TOLERANCE {
            return Ok(next);
        }
        rate = next;
    }

    Err(Error::NumericDivergence(format!(
        "No convergence within {} iterations",
        MWR_MAX_ITERATIONS
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SimulationSnapshot;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_simple_return() {
        assert_abs_diff_eq!(simple_return_percent(10000.0, 11500.0), 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(simple_return_percent(3000.0, 2400.0), -20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_simple_return_nothing_invested() {
        assert_eq!(simple_return_percent(0.0, 0.0), 0.0);
        assert_eq!(simple_return_percent(0.0, 500.0), 0.0);
    }

    #[test]
    fn test_max_drawdown() {
        // Peak 1155, trough 883.575
        let values = vec![1000.0, 1100.0, 1155.0, 981.75, 883.575, 927.75];
        let mdd = max_drawdown_percent(&values);
        assert_abs_diff_eq!(mdd, -23.5, epsilon = 1e-9);
    }

    #[test]
    fn test_max_drawdown_no_loss() {
        let values = vec![100.0, 101.0, 103.0, 103.0, 110.0];
        assert_eq!(max_drawdown_percent(&values), 0.0);
    }

    #[test]
    fn test_max_drawdown_skips_empty_prefix() {
        let values = vec![0.0, 0.0, 200.0, 150.0];
        assert_abs_diff_eq!(max_drawdown_percent(&values), -25.0, epsilon = 1e-9);

        assert_eq!(max_drawdown_percent(&[0.0, 0.0]), 0.0);
        assert_eq!(max_drawdown_percent(&[]), 0.0);
    }

    #[test]
    fn test_max_drawdown_total_loss() {
        let values = vec![100.0, 0.0];
        assert_abs_diff_eq!(max_drawdown_percent(&values), -100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_mwr_one_year() {
        let flows = [
            CashFlowEvent::new(date(2023, 1, 1), -1000.0),
            CashFlowEvent::new(date(2024, 1, 1), 1100.0),
        ];
        let rate = money_weighted_return(&flows).unwrap();
        assert_abs_diff_eq!(rate, 0.10, epsilon = 1e-6);
    }

    #[test]
    fn test_mwr_loss() {
        let flows = [
            CashFlowEvent::new(date(2023, 1, 1), -1000.0),
            CashFlowEvent::new(date(2024, 1, 1), 800.0),
        ];
        let rate = money_weighted_return(&flows).unwrap();
        assert_abs_diff_eq!(rate, -0.20, epsilon = 1e-6);
    }

    #[test]
    fn test_mwr_two_contributions() {
        // 1000 for two years and 1000 for one year, both at 5%
        let final_value = 1000.0 * 1.05_f64.powf(730.0 / 365.0) + 1000.0 * 1.05;
        let flows = [
            CashFlowEvent::new(date(2021, 1, 1), -1000.0),
            CashFlowEvent::new(date(2022, 1, 1), -1000.0),
            CashFlowEvent::new(date(2023, 1, 1), final_value),
        ];
        let rate = money_weighted_return(&flows).unwrap();
        assert_abs_diff_eq!(rate, 0.05, epsilon = 1e-6);
    }

    #[test]
    fn test_mwr_requires_both_signs() {
        let only_out = [
            CashFlowEvent::new(date(2023, 1, 1), -1000.0),
            CashFlowEvent::new(date(2024, 1, 1), -1000.0),
        ];
        assert!(matches!(
            money_weighted_return(&only_out),
            Err(Error::NumericDivergence(_))
        ));

        let terminal_only = [CashFlowEvent::new(date(2024, 1, 1), 0.0)];
        assert!(matches!(
            money_weighted_return(&terminal_only),
            Err(Error::NumericDivergence(_))
        ));

        assert!(matches!(
            money_weighted_return(&[]),
            Err(Error::NumericDivergence(_))
        ));
    }

    #[test]
    fn test_mwr_same_day_flows_have_no_slope() {
        // All flows at t = 0: NPV is constant in r
        let flows = [
            CashFlowEvent::new(date(2024, 1, 1), -1000.0),
            CashFlowEvent::new(date(2024, 1, 1), 900.0),
        ];
        assert!(matches!(
            money_weighted_return(&flows),
            Err(Error::NumericDivergence(_))
        ));
    }

    #[test]
    fn test_mwr_total_loss_leaves_domain() {
        // Near-total loss over two days: the first Newton step overshoots past -1
        let flows = [
            CashFlowEvent::new(date(2024, 1, 1), -1000.0),
            CashFlowEvent::new(date(2024, 1, 3), 1.0),
        ];
        match money_weighted_return(&flows) {
            Err(Error::NumericDivergence(msg)) => assert!(msg.contains("r <= -1"), "{}", msg),
            other => panic!("expected domain divergence, got {:?}", other),
        }
    }

    #[test]
    fn test_mwr_iteration_cap() {
        // A fivefold gain in one day has an astronomically large root
        let flows = [
            CashFlowEvent::new(date(2020, 1, 1), -1000.0),
            CashFlowEvent::new(date(2020, 1, 2), 5000.0),
        ];
        match money_weighted_return(&flows) {
            Err(Error::NumericDivergence(msg)) => {
                assert!(msg.contains("No convergence within 100 iterations"), "{}", msg)
            }
            other => panic!("expected iteration cap, got {:?}", other),
        }
    }

    #[test]
    fn test_mwr_multiple_sign_changes() {
        let flows = [
            CashFlowEvent::new(date(2020, 1, 1), -1000.0),
            CashFlowEvent::new(date(2021, 1, 1), 3000.0),
            CashFlowEvent::new(date(2022, 1, 1), -2200.0),
        ];
        // Two roots exist; the solver seeded at 10% lands on the nearer one
        let rate = money_weighted_return(&flows).unwrap();
        assert_abs_diff_eq!(rate, 0.2789, epsilon = 1e-3);
    }

    fn snapshot(d: NaiveDate, invested: f64, value: f64, benchmark: f64) -> SimulationSnapshot {
        SimulationSnapshot {
            date: d,
            invested_principal: invested,
            portfolio_value: value,
            benchmark_principal: benchmark,
            shares_held: 0.0,
        }
    }

    #[test]
    fn test_summarize() {
        let output = SimulationOutput {
            snapshots: vec![
                snapshot(date(2023, 1, 1), 1000.0, 1000.0, 1000.0),
                snapshot(date(2023, 7, 1), 1000.0, 900.0, 1010.0),
                snapshot(date(2024, 1, 1), 1000.0, 1100.0, 1020.0),
            ],
            cash_flows: vec![CashFlowEvent::new(date(2023, 1, 1), -1000.0)],
        };

        let summary = summarize(&output).unwrap();

        assert_eq!(summary.start_date, date(2023, 1, 1));
        assert_eq!(summary.end_date, date(2024, 1, 1));
        assert_eq!(summary.contribution_count, 1);
        assert_abs_diff_eq!(summary.total_invested, 1000.0);
        assert_abs_diff_eq!(summary.final_value, 1100.0);
        assert_abs_diff_eq!(summary.simple_return_pct, 10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.excess_return, 80.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.mdd_pct, -10.0, epsilon = 1e-9);
        assert_abs_diff_eq!(
            summary.money_weighted_return_pct.unwrap(),
            10.0,
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_summarize_divergence_keeps_other_metrics() {
        let output = SimulationOutput {
            snapshots: vec![
                snapshot(date(2024, 1, 1), 0.0, 0.0, 0.0),
                snapshot(date(2024, 1, 2), 0.0, 0.0, 0.0),
            ],
            cash_flows: Vec::new(),
        };

        let summary = summarize(&output).unwrap();

        assert!(summary.money_weighted_return_pct.is_none());
        assert_eq!(summary.total_invested, 0.0);
        assert_eq!(summary.simple_return_pct, 0.0);
        assert_eq!(summary.mdd_pct, 0.0);
    }

    #[test]
    fn test_summarize_total_loss_blanks_only_mwr() {
        let output = SimulationOutput {
            snapshots: vec![
                snapshot(date(2024, 1, 1), 1000.0, 1000.0, 1000.0),
                snapshot(date(2024, 1, 2), 1000.0, 500.0, 1000.1),
                snapshot(date(2024, 1, 3), 1000.0, 1.0, 1000.2),
            ],
            cash_flows: vec![CashFlowEvent::new(date(2024, 1, 1), -1000.0)],
        };

        let summary = summarize(&output).unwrap();

        assert!(summary.money_weighted_return_pct.is_none());
        assert_eq!(summary.contribution_count, 1);
        assert_abs_diff_eq!(summary.final_value, 1.0);
        assert_abs_diff_eq!(summary.simple_return_pct, -99.9, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.mdd_pct, -99.9, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.excess_return, -999.2, epsilon = 1e-9);
    }

    #[test]
    fn test_summarize_empty() {
        let output = SimulationOutput {
            snapshots: Vec::new(),
            cash_flows: Vec::new(),
        };
        assert!(matches!(summarize(&output), Err(Error::InvalidInput(_))));
    }
}
