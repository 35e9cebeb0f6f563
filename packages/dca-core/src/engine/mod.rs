//! Backtest engine module.
//!
//! Provides contribution scheduling, the forward simulation pass, and return metrics.

mod metrics;
mod schedule;
mod simulation;

pub use metrics::{
    max_drawdown_percent, money_weighted_return, simple_return_percent, summarize,
    MWR_INITIAL_GUESS, MWR_MAX_ITERATIONS,
};
pub use schedule::{build_schedule, ContributionPolicy, Interval};
pub use simulation::{simulate, SimulationOutput};
