//! DCA CLI - Dollar-cost averaging backtests from the command line.
//!
//! Every command prints a JSON `ApiResponse` on stdout; logs go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Weekday;
use clap::{Parser, Subcommand, ValueEnum};
use dca_core::{
    backtest::backtest_symbol, format_amount, market::is_known_alias, resolve_symbol,
    run_backtest, ApiResponse, BacktestReport, CachedProvider, ContributionPolicy,
    DividendTiming, JsonFileProvider, PurchaseMode, RetryPolicy, RetryingProvider, Settings,
    SimulationConfig,
};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "dca")]
#[command(about = "Dollar-cost averaging backtester")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a contribution schedule over a price history
    Backtest(BacktestArgs),
    /// Show the ticker a query resolves to
    Resolve {
        /// Name, code, or ticker
        query: String,
    },
    /// Persisted defaults
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(clap::Args)]
struct BacktestArgs {
    /// JSON file holding an array of price points
    #[arg(short, long, conflicts_with = "symbol")]
    prices: Option<PathBuf>,
    /// Instrument to load from --data-dir (names and KRX codes are resolved)
    #[arg(short, long, required_unless_present = "prices")]
    symbol: Option<String>,
    /// Directory of <SYMBOL>.json histories
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,
    /// Contribution cadence: monthly, weekly, or daily
    #[arg(short, long, default_value = "monthly")]
    interval: String,
    /// Weekday for weekly contributions
    #[arg(long, value_parser = parse_weekday, default_value = "fri")]
    weekday: Weekday,
    /// Target day of month for monthly contributions
    #[arg(long, default_value = "1")]
    day: u32,
    /// Monthly budget (defaults to the saved setting)
    #[arg(short, long)]
    budget: Option<f64>,
    /// Reinvest cash dividends
    #[arg(long)]
    reinvest: bool,
    /// Years of history to replay (0 = all; defaults to the saved setting)
    #[arg(short, long)]
    years: Option<u32>,
    /// Convert amounts at this rate into the reporting currency
    #[arg(long)]
    fx_rate: Option<f64>,
    /// Annual inflation rate for the benchmark (defaults to the saved setting)
    #[arg(long)]
    inflation: Option<f64>,
    /// Apply same-day dividends before or after the contribution
    #[arg(long, value_enum, default_value = "before")]
    dividend_timing: TimingArg,
    /// Buy whole shares only
    #[arg(long)]
    whole_shares: bool,
    /// Include daily snapshots and cash flows in the output
    #[arg(long)]
    full: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum TimingArg {
    Before,
    After,
}

impl From<TimingArg> for DividendTiming {
    fn from(arg: TimingArg) -> Self {
        match arg {
            TimingArg::Before => DividendTiming::BeforeContribution,
            TimingArg::After => DividendTiming::AfterContribution,
        }
    }
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print the current settings and their file location
    Show,
    /// Update one or more settings
    Set {
        /// Default monthly budget
        #[arg(short, long)]
        budget: Option<f64>,
        /// Default annual inflation rate
        #[arg(short, long)]
        inflation: Option<f64>,
        /// Default lookback in years
        #[arg(short, long)]
        years: Option<u32>,
    },
}

fn parse_weekday(value: &str) -> Result<Weekday, String> {
    value
        .parse::<Weekday>()
        .map_err(|_| format!("Invalid weekday: {}", value))
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let output = match cli.command {
        Commands::Backtest(args) => handle_backtest(args),
        Commands::Resolve { query } => handle_resolve(&query),
        Commands::Settings { action } => handle_settings(action),
    };

    println!("{}", output);
}

fn render<T: Serialize>(response: &ApiResponse<T>) -> String {
    serde_json::to_string_pretty(response).unwrap_or_else(|e| {
        format!(
            "{{\"ok\":false,\"error\":\"Failed to serialize response: {}\"}}",
            e
        )
    })
}

fn error(message: impl Into<String>) -> String {
    render(&ApiResponse::<()>::err(message))
}

fn handle_backtest(args: BacktestArgs) -> String {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!("Ignoring unreadable settings: {}", e);
            Settings::default()
        }
    };

    let budget = args.budget.unwrap_or(settings.default_budget);
    let years = args.years.unwrap_or(settings.lookback_years);

    let policy = match ContributionPolicy::from_parts(
        &args.interval,
        Some(args.weekday),
        Some(args.day),
        budget,
        args.reinvest,
    ) {
        Ok(policy) => policy,
        Err(e) => return error(e.to_string()),
    };

    let mut config = match args.fx_rate {
        Some(rate) => SimulationConfig::foreign(rate),
        None => SimulationConfig::default(),
    }
    .with_inflation_rate(args.inflation.unwrap_or(settings.inflation_rate))
    .with_dividend_timing(args.dividend_timing.into());
    if args.whole_shares {
        config = config.with_purchase_mode(PurchaseMode::WholeShares);
    }

    let (label, result) = match (&args.prices, &args.symbol) {
        (Some(path), _) => (
            path.display().to_string(),
            JsonFileProvider::load_file(path)
                .and_then(|series| run_backtest(&series.last_years(years), &policy, &config)),
        ),
        (None, Some(query)) => {
            let provider = RetryingProvider::new(
                CachedProvider::new(JsonFileProvider::new(&args.data_dir)),
                RetryPolicy {
                    base_delay: Duration::from_millis(200),
                    ..Default::default()
                },
            );
            (
                resolve_symbol(query),
                backtest_symbol(&provider, query, years, &policy, &config),
            )
        }
        (None, None) => return error("Either --prices or --symbol is required"),
    };

    match result {
        Ok(report) => render(&ApiResponse::ok(report_json(
            &label, &policy, years, &report, args.full,
        ))),
        Err(e) => error(e.to_string()),
    }
}

fn report_json(
    label: &str,
    policy: &ContributionPolicy,
    years: u32,
    report: &BacktestReport,
    full: bool,
) -> serde_json::Value {
    let summary = &report.summary;
    let mut value = json!({
        "source": label,
        "interval": policy.interval(),
        "budget": policy.amount(),
        "per_contribution": policy.per_event_amount(),
        "lookback_years": years,
        "years_available": report.years_available,
        "summary": summary,
        "display": {
            "total_invested": format_amount(summary.total_invested),
            "final_value": format_amount(summary.final_value),
            "excess_return": format_amount(summary.excess_return),
        },
    });

    if full {
        value["snapshots"] = json!(report.snapshots);
        value["cash_flows"] = json!(report.cash_flows);
    }
    value
}

fn handle_resolve(query: &str) -> String {
    render(&ApiResponse::ok(json!({
        "query": query,
        "symbol": resolve_symbol(query),
        "alias": is_known_alias(query),
    })))
}

fn handle_settings(action: SettingsAction) -> String {
    let path = Settings::default_path();
    let mut settings = match Settings::load_from_path(&path) {
        Ok(settings) => settings,
        Err(e) => return error(e.to_string()),
    };

    match action {
        SettingsAction::Show => render(&ApiResponse::ok(json!({
            "path": path,
            "settings": settings,
        }))),
        SettingsAction::Set {
            budget,
            inflation,
            years,
        } => {
            if let Some(budget) = budget {
                settings.default_budget = budget;
            }
            if let Some(inflation) = inflation {
                settings.inflation_rate = inflation;
            }
            if let Some(years) = years {
                settings.lookback_years = years;
            }

            if let Err(e) = settings.save_to_path(&path) {
                return error(e.to_string());
            }
            render(&ApiResponse::ok(json!({
                "path": path,
                "settings": settings,
            })))
        }
    }
}
