// Trading strategy module
pub mod crossover;
pub mod signals;

pub use crossover::CrossoverStrategy;
pub use signals::validate_signals;

use crate::data::PriceHistory;
use crate::models::{Signal, TradingPair};
use crate::Result;

/// Base trait for all trading strategies
pub trait Strategy: Send + Sync {
    /// Produce every trade signal over the price history, ascending by timestamp
    fn generate_signals(&self, history: &PriceHistory) -> Result<Vec<Signal>>;

    /// Get strategy name
    fn name(&self) -> &str;

    /// Market this strategy trades
    fn trading_pair(&self) -> &TradingPair;

    /// Minimum bars before the strategy can emit its first signal
    fn min_bars_required(&self) -> usize;
}
