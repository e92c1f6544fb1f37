use chrono::DateTime;
use std::collections::BTreeMap;

use crate::error::BacktestError;
use crate::models::{Candle, RawTrade};
use crate::Result;

const DEFAULT_INTERVAL_SECS: i64 = 10;

/// Resamples raw exchange trades into fixed-interval OHLC bars
///
/// Buckets are aligned to multiples of the interval since the Unix epoch.
/// Buckets without trades produce no bar.
#[derive(Debug, Clone)]
pub struct BarBuilder {
    interval_secs: i64,
}

impl BarBuilder {
    /// Create a builder with the default 10 second interval
    pub fn new() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }

    /// Create a builder with a custom interval
    ///
    /// # Arguments
    /// * `interval_secs` - Bucket size in seconds (e.g., 60 for 1min, 86400 for daily)
    pub fn with_interval(interval_secs: i64) -> Result<Self> {
        if interval_secs <= 0 {
            return Err(BacktestError::Config(format!(
                "bar interval must be positive, got {}",
                interval_secs
            )));
        }
        Ok(Self { interval_secs })
    }

    pub fn interval_secs(&self) -> i64 {
        self.interval_secs
    }

    /// Convert trades to bars, ascending by bucket start
    ///
    /// Trades need not be sorted; within a bucket their timestamp order
    /// decides open and close, ties keep input order.
    pub fn build(&self, trades: &[RawTrade]) -> Result<Vec<Candle>> {
        let mut sorted: Vec<&RawTrade> = trades.iter().collect();
        sorted.sort_by_key(|t| t.timestamp);

        let mut buckets: BTreeMap<i64, Vec<&RawTrade>> = BTreeMap::new();
        for trade in sorted {
            let bucket = trade.timestamp.timestamp().div_euclid(self.interval_secs) * self.interval_secs;
            buckets.entry(bucket).or_default().push(trade);
        }

        let candles = buckets
            .into_iter()
            .map(|(bucket, trades)| self.synthesize_candle(bucket, &trades))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            "Built {} bars of {}s from {} trades",
            candles.len(),
            self.interval_secs,
            trades.len()
        );

        Ok(candles)
    }

    fn synthesize_candle(&self, bucket: i64, trades: &[&RawTrade]) -> Result<Candle> {
        let timestamp = DateTime::from_timestamp(bucket, 0).ok_or_else(|| {
            BacktestError::InvalidPriceHistory(format!("bucket {} out of range", bucket))
        })?;

        // Buckets are only created when a trade lands in them
        let open = trades.first().map(|t| t.price).unwrap_or_default();
        let close = trades.last().map(|t| t.price).unwrap_or_default();
        let high = trades.iter().fold(f64::NEG_INFINITY, |a, t| a.max(t.price));
        let low = trades.iter().fold(f64::INFINITY, |a, t| a.min(t.price));

        Ok(Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume: trades.iter().map(|t| t.volume).sum(),
            trade_count: trades.len(),
        })
    }
}

impl Default for BarBuilder {
    fn default() -> Self {
        Self::new()
    }
}
