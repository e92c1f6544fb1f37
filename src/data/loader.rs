use std::path::Path;

use super::{BarBuilder, PriceHistory, SyntheticDataGenerator};
use crate::config::DataSourceConfig;
use crate::models::{Candle, RawTrade, TradingPair};
use crate::Result;

/// Read a JSON array of candles
pub fn load_candles_json(path: &Path) -> Result<Vec<Candle>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Read a JSON array of raw trades
pub fn load_trades_json(path: &Path) -> Result<Vec<RawTrade>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Produce the price table for `pair` from the configured source
///
/// The resulting table has a single column named by the pair symbol.
pub fn load_price_history(source: &DataSourceConfig, pair: &TradingPair) -> Result<PriceHistory> {
    let candles = match source {
        DataSourceConfig::Synthetic {
            scenario,
            seed,
            bars,
            interval_minutes,
        } => SyntheticDataGenerator::new(*seed).generate(*scenario, *bars, *interval_minutes),
        DataSourceConfig::CandlesJson { path } => {
            let mut candles = load_candles_json(path)?;
            candles.sort_by_key(|c| c.timestamp);
            candles
        }
        DataSourceConfig::TradesJson {
            path,
            interval_secs,
        } => {
            let trades = load_trades_json(path)?;
            BarBuilder::with_interval(*interval_secs)?.build(&trades)?
        }
    };

    tracing::info!(
        "Loaded {} bars for {} ({} to {})",
        candles.len(),
        pair,
        candles.first().map(|c| c.timestamp.to_string()).unwrap_or_default(),
        candles.last().map(|c| c.timestamp.to_string()).unwrap_or_default(),
    );

    PriceHistory::from_candles(&pair.symbol(), &candles)
}
