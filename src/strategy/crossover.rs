use super::Strategy;
use crate::data::PriceHistory;
use crate::indicators::sma_series;
use crate::models::{Signal, SignalType, TradingPair};
use crate::Result;

/// Moving-average crossover trend follower
///
/// Tracks whether the short-window SMA sits strictly above the long-window SMA.
/// A signal fires only on the bar where that state flips:
/// - short rises above long after being at or below it: buy
/// - short falls to or below long after being above it: sell
///
/// Bars where either average is still undefined emit nothing.
#[derive(Debug, Clone)]
pub struct CrossoverStrategy {
    short_window: usize,
    long_window: usize,
    trading_pair: TradingPair,
}

impl CrossoverStrategy {
    pub fn new(short_window: usize, long_window: usize, trading_pair: TradingPair) -> Self {
        Self {
            short_window,
            long_window,
            trading_pair,
        }
    }
}

impl Default for CrossoverStrategy {
    fn default() -> Self {
        Self::new(4, 20, TradingPair::new("BTC", "EUR"))
    }
}

impl Strategy for CrossoverStrategy {
    fn generate_signals(&self, history: &PriceHistory) -> Result<Vec<Signal>> {
        let prices = history.column(&self.trading_pair.symbol())?;
        let short = sma_series(prices, self.short_window);
        let long = sma_series(prices, self.long_window);

        let mut signals = Vec::new();
        let mut prev_above: Option<bool> = None;

        for (i, (short_ma, long_ma)) in short.iter().zip(&long).enumerate() {
            let (Some(short_ma), Some(long_ma)) = (short_ma, long_ma) else {
                continue;
            };
            let above = short_ma > long_ma;

            let signal_type = match (prev_above, above) {
                (Some(false), true) => Some(SignalType::Buy),
                (Some(true), false) => Some(SignalType::Sell),
                _ => None,
            };

            if let Some(signal_type) = signal_type {
                let at = history.index()[i];
                tracing::debug!(
                    "{} cross at {}: SMA{} {:.4} vs SMA{} {:.4}",
                    signal_type,
                    at,
                    self.short_window,
                    short_ma,
                    self.long_window,
                    long_ma
                );
                signals.push(Signal::new(&self.trading_pair, signal_type, at));
            }

            prev_above = Some(above);
        }

        tracing::info!(
            "{} generated {} signals over {} bars",
            self.name(),
            signals.len(),
            prices.len()
        );

        Ok(signals)
    }

    fn name(&self) -> &str {
        "SMA Crossover"
    }

    fn trading_pair(&self) -> &TradingPair {
        &self.trading_pair
    }

    fn min_bars_required(&self) -> usize {
        // One bar to establish the initial ordering, one more to see it change
        self.short_window.max(self.long_window) + 1
    }
}
