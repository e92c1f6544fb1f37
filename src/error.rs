use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::AssetId;

/// Errors raised while building price data, replaying trades or scoring a run.
///
/// None of these are retryable: a backtest either replays every signal or
/// aborts.
#[derive(Debug, Error)]
pub enum BacktestError {
    /// Selling more than the current balance without short-sale permission
    #[error("Short sale of {requested} {asset} at {at} exceeds balance {available}")]
    ShortSale {
        asset: AssetId,
        requested: f64,
        available: f64,
        at: DateTime<Utc>,
    },

    #[error("No price for {market} at {at}")]
    MissingPrice { market: String, at: DateTime<Utc> },

    #[error("Invalid price {price} at {at}")]
    InvalidPrice { price: f64, at: DateTime<Utc> },

    #[error("Invalid trade volume {0}")]
    InvalidVolume(f64),

    #[error("Trade buys and sells the same asset {0}")]
    SameAssetTrade(AssetId),

    /// Neither leg of the trade is the quote currency
    #[error("Cannot compute fee for {bought}/{sold}: neither side is quote currency {quote}")]
    UnsupportedFeeComputation {
        bought: AssetId,
        sold: AssetId,
        quote: AssetId,
    },

    /// Summary requested in a currency other than the one fees are accrued in
    #[error("Cannot summarize in {requested}: ledger fees are in {ledger}")]
    QuoteAssetMismatch { requested: AssetId, ledger: AssetId },

    #[error("Price history has no column {0}")]
    MissingPriceColumn(String),

    #[error("Asset {0} is already registered")]
    DuplicateAsset(AssetId),

    #[error("Asset {0} is not registered in the ledger")]
    UnknownAsset(AssetId),

    #[error("Timestamp {0} is outside the ledger index")]
    OutOfRangeTimestamp(DateTime<Utc>),

    #[error("Trade at {at} posted before previous trade at {last}")]
    OutOfOrderTrade {
        at: DateTime<Utc>,
        last: DateTime<Utc>,
    },

    #[error("Initial portfolio value is zero, returns are undefined")]
    ZeroInitialValue,

    #[error("Price history is empty")]
    EmptyPriceHistory,

    #[error("Invalid price history: {0}")]
    InvalidPriceHistory(String),

    #[error("Invalid signals: {0}")]
    InvalidSignals(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<::config::ConfigError> for BacktestError {
    fn from(err: ::config::ConfigError) -> Self {
        BacktestError::Config(err.to_string())
    }
}
