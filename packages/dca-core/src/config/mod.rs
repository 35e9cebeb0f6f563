//! Configuration module.
//!
//! Runtime parameters for a single simulation, plus persisted user defaults.

mod settings;
mod simulation;

pub use settings::Settings;
pub use simulation::{DividendTiming, PurchaseMode, SimulationConfig, DEFAULT_INFLATION_RATE};
