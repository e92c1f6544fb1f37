pub mod evaluator;
pub mod metrics;

pub use evaluator::{BacktestRun, Evaluator};
pub use metrics::PerformanceSummary;
