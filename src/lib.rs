// Core modules
pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod indicators;
pub mod ledger;
pub mod models;
pub mod strategy;

// Re-export commonly used types
pub use backtest::{Evaluator, PerformanceSummary};
pub use data::PriceHistory;
pub use error::BacktestError;
pub use ledger::Ledger;
pub use models::*;
pub use strategy::Strategy;

// Error handling
pub type Result<T> = std::result::Result<T, BacktestError>;
