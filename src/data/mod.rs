// Price data: the time-indexed price table consumed by strategies and the ledger,
// plus the sources that produce it (JSON files, raw trades, synthetic generator)

pub mod bars;
pub mod loader;
pub mod synthetic;

pub use bars::BarBuilder;
pub use loader::{load_candles_json, load_price_history, load_trades_json};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

use crate::error::BacktestError;
use crate::models::Candle;
use crate::Result;

/// Time-indexed numeric table of asset prices
///
/// The index is strictly ascending (no duplicate timestamps) and every column
/// holds exactly one finite value per index entry. Columns are named by pair
/// symbol, e.g. `"BTCEUR"` for BTC priced in EUR.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    index: Vec<DateTime<Utc>>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl PriceHistory {
    /// Build a table from an index and named columns, validating its shape
    pub fn new<I, S>(index: Vec<DateTime<Utc>>, columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        if let Some(pos) = index.windows(2).position(|w| w[1] <= w[0]) {
            return Err(BacktestError::InvalidPriceHistory(format!(
                "index not strictly ascending at {} -> {}",
                index[pos],
                index[pos + 1]
            )));
        }

        let mut history = Self {
            index,
            columns: BTreeMap::new(),
        };
        for (name, values) in columns {
            history.insert_column(name.into(), values)?;
        }
        Ok(history)
    }

    /// Table with a single column holding the close of each candle
    pub fn from_candles(symbol: &str, candles: &[Candle]) -> Result<Self> {
        let index = candles.iter().map(|c| c.timestamp).collect();
        let closes = candles.iter().map(|c| c.close).collect();
        Self::new(index, [(symbol.to_string(), closes)])
    }

    /// Add another column, e.g. a valuation pair for a second held asset
    pub fn with_column(mut self, name: impl Into<String>, values: Vec<f64>) -> Result<Self> {
        self.insert_column(name.into(), values)?;
        Ok(self)
    }

    fn insert_column(&mut self, name: String, values: Vec<f64>) -> Result<()> {
        if values.len() != self.index.len() {
            return Err(BacktestError::InvalidPriceHistory(format!(
                "column {} has {} values for {} timestamps",
                name,
                values.len(),
                self.index.len()
            )));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(BacktestError::InvalidPriceHistory(format!(
                "column {} has non-finite value at {}",
                name, self.index[pos]
            )));
        }
        if self.columns.contains_key(&name) {
            return Err(BacktestError::InvalidPriceHistory(format!(
                "column {} supplied twice",
                name
            )));
        }
        self.columns.insert(name, values);
        Ok(())
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Result<&[f64]> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| BacktestError::MissingPriceColumn(name.to_string()))
    }

    /// Row position of an exact timestamp
    pub fn position(&self, at: DateTime<Utc>) -> Option<usize> {
        self.index.binary_search(&at).ok()
    }

    /// Price in `column` at exactly `at`; `None` when the timestamp is not in the index
    pub fn price_at(&self, column: &str, at: DateTime<Utc>) -> Result<Option<f64>> {
        let values = self.column(column)?;
        Ok(self.position(at).map(|i| values[i]))
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.index.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.index.last().copied()
    }

    /// Time spanned from first to last timestamp
    pub fn duration(&self) -> Duration {
        match (self.first_timestamp(), self.last_timestamp()) {
            (Some(first), Some(last)) => last - first,
            _ => Duration::zero(),
        }
    }
}
