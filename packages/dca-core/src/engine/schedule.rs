//! Contribution policies and the dates they select.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{Error, Result};

/// Trading days per year used to spread a monthly budget over daily buys.
const TRADING_DAYS_PER_YEAR: f64 = 250.0;

/// Weeks per year used to spread a monthly budget over weekly buys.
const WEEKS_PER_YEAR: f64 = 52.0;

/// Contribution cadence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interval {
    /// Every trading day
    Daily,
    /// Every trading day falling on `weekday`
    Weekly { weekday: Weekday },
    /// First trading day on or after `day` in each month
    Monthly { day: u32 },
}

impl Interval {
    /// Short identifier used in requests and output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly { .. } => "weekly",
            Self::Monthly { .. } => "monthly",
        }
    }
}

/// Loosely typed policy fields, as they arrive from a request or file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PolicyParts {
    interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weekday: Option<Weekday>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    day: Option<u32>,
    amount: f64,
    #[serde(default)]
    reinvest_dividends: bool,
}

/// A validated recurring-contribution plan.
///
/// `amount` is the monthly budget in the instrument's currency. Weekly and daily
/// plans spread it with fixed 52-week and 250-day years rather than counting the
/// actual calendar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "PolicyParts", into = "PolicyParts")]
pub struct ContributionPolicy {
    interval: Interval,
    amount: f64,
    reinvest_dividends: bool,
}

impl ContributionPolicy {
    /// Create a policy, validating the interval fields and the amount.
    pub fn new(interval: Interval, amount: f64, reinvest_dividends: bool) -> Result<Self> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "Contribution amount must be positive, got {}",
                amount
            )));
        }

        if let Interval::Monthly { day } = interval {
            if !(1..=31).contains(&day) {
                return Err(Error::InvalidInput(format!(
                    "Day of month must be between 1 and 31, got {}",
                    day
                )));
            }
        }

        Ok(Self {
            interval,
            amount,
            reinvest_dividends,
        })
    }

    /// Buy every trading day.
    pub fn daily(amount: f64) -> Result<Self> {
        Self::new(Interval::Daily, amount, false)
    }

    /// Buy every week on `weekday`.
    pub fn weekly(weekday: Weekday, amount: f64) -> Result<Self> {
        Self::new(Interval::Weekly { weekday }, amount, false)
    }

    /// Buy once a month on the first trading day on or after `day`.
    pub fn monthly(day: u32, amount: f64) -> Result<Self> {
        Self::new(Interval::Monthly { day }, amount, false)
    }

    /// Build a policy from an interval name and optional sub-fields.
    ///
    /// Weekly requires `weekday` and monthly requires `day`; fields that the
    /// interval does not use are ignored.
    pub fn from_parts(
        interval: &str,
        weekday: Option<Weekday>,
        day: Option<u32>,
        amount: f64,
        reinvest_dividends: bool,
    ) -> Result<Self> {
        let interval = match interval.trim().to_lowercase().as_str() {
            "daily" => Interval::Daily,
            "weekly" => Interval::Weekly {
                weekday: weekday.ok_or_else(|| {
                    Error::InvalidInput("Weekly interval requires a weekday".to_string())
                })?,
            },
            "monthly" => Interval::Monthly {
                day: day.ok_or_else(|| {
                    Error::InvalidInput("Monthly interval requires a day of month".to_string())
                })?,
            },
            other => {
                return Err(Error::InvalidInput(format!(
                    "Unknown interval: {}. Available: daily, weekly, monthly",
                    other
                )))
            }
        };

        Self::new(interval, amount, reinvest_dividends)
    }

    /// Enable or disable dividend reinvestment.
    pub fn with_dividend_reinvestment(mut self, reinvest: bool) -> Self {
        self.reinvest_dividends = reinvest;
        self
    }

    /// The contribution cadence.
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// The nominal monthly budget.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Whether dividends buy additional shares.
    pub fn reinvest_dividends(&self) -> bool {
        self.reinvest_dividends
    }

    /// Native-currency amount invested at each scheduled date.
    pub fn per_event_amount(&self) -> f64 {
        match self.interval {
            Interval::Monthly { .. } => self.amount,
            Interval::Weekly { .. } => self.amount * 12.0 / WEEKS_PER_YEAR,
            Interval::Daily => self.amount * 12.0 / TRADING_DAYS_PER_YEAR,
        }
    }
}

impl TryFrom<PolicyParts> for ContributionPolicy {
    type Error = Error;

    fn try_from(parts: PolicyParts) -> Result<Self> {
        Self::from_parts(
            &parts.interval,
            parts.weekday,
            parts.day,
            parts.amount,
            parts.reinvest_dividends,
        )
    }
}

impl From<ContributionPolicy> for PolicyParts {
    fn from(policy: ContributionPolicy) -> Self {
        let (weekday, day) = match policy.interval {
            Interval::Daily => (None, None),
            Interval::Weekly { weekday } => (Some(weekday), None),
            Interval::Monthly { day } => (None, Some(day)),
        };

        Self {
            interval: policy.interval.name().to_string(),
            weekday,
            day,
            amount: policy.amount,
            reinvest_dividends: policy.reinvest_dividends,
        }
    }
}

/// Select the contribution dates from a set of trading dates.
///
/// The result is always a subset of `dates`. Monthly plans pick, per calendar
/// month, the first date with day-of-month >= the target day, or the month's
/// last trading date when the target falls after it.
///
/// # Example
///
/// ```rust
/// use chrono::NaiveDate;
/// use dca_core::{build_schedule, Interval};
///
/// let dates = [
///     NaiveDate::from_ymd_opt(2024, 2, 13).unwrap(),
///     NaiveDate::from_ymd_opt(2024, 2, 16).unwrap(),
///     NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
/// ];
/// let schedule = build_schedule(dates, &Interval::Monthly { day: 15 });
///
/// // 2024-02-16 is the first trading day on or after the 15th
/// assert_eq!(schedule.len(), 1);
/// assert!(schedule.contains(&dates[1]));
/// ```
pub fn build_schedule<I>(dates: I, interval: &Interval) -> BTreeSet<NaiveDate>
where
    I: IntoIterator<Item = NaiveDate>,
{
    match *interval {
        Interval::Daily => dates.into_iter().collect(),
        Interval::Weekly { weekday } => dates
            .into_iter()
            .filter(|d| d.weekday() == weekday)
            .collect(),
        Interval::Monthly { day } => {
            let mut months: BTreeMap<(i32, u32), BTreeSet<NaiveDate>> = BTreeMap::new();
            for date in dates {
                months
                    .entry((date.year(), date.month()))
                    .or_default()
                    .insert(date);
            }

            months
                .values()
                .filter_map(|month| {
                    month
                        .iter()
                        .find(|d| d.day() >= day)
                        .or_else(|| month.last())
                        .copied()
                })
                .collect()
        }
    }
}
