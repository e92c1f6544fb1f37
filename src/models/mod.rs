use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Symbolic code of a currency or instrument (e.g. "BTC", "EUR")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for AssetId {
    fn from(code: String) -> Self {
        Self(code)
    }
}

/// A base/quote market, e.g. BTC priced in EUR
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: AssetId,
    pub quote: AssetId,
}

impl TradingPair {
    pub fn new(base: impl Into<AssetId>, quote: impl Into<AssetId>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    /// Price column name for this pair ("BTC" + "EUR" = "BTCEUR")
    pub fn symbol(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Buy,
    Sell,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Buy => f.write_str("buy"),
            SignalType::Sell => f.write_str("sell"),
        }
    }
}

/// One proposed trade event emitted by a strategy
///
/// `volume = None` means "use the entire available balance of the asset being sold".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub base_asset: AssetId,
    pub quote_asset: AssetId,
    pub signal_type: SignalType,
    pub datetime: DateTime<Utc>,
    pub volume: Option<f64>,
}

impl Signal {
    pub fn new(pair: &TradingPair, signal_type: SignalType, datetime: DateTime<Utc>) -> Self {
        Self {
            base_asset: pair.base.clone(),
            quote_asset: pair.quote.clone(),
            signal_type,
            datetime,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }
}

/// OHLCV bar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub trade_count: usize,
}

/// A single executed exchange trade, the raw input for bar building
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawTrade {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_symbol() {
        let pair = TradingPair::new("BTC", "EUR");
        assert_eq!(pair.symbol(), "BTCEUR");
        assert_eq!(pair.to_string(), "BTC/EUR");
    }

    #[test]
    fn test_signal_defaults_to_full_balance() {
        let pair = TradingPair::new("BTC", "EUR");
        let signal = Signal::new(&pair, SignalType::Buy, Utc::now());

        assert_eq!(signal.base_asset, AssetId::from("BTC"));
        assert_eq!(signal.quote_asset, AssetId::from("EUR"));
        assert!(signal.volume.is_none());
        assert_eq!(signal.with_volume(0.5).volume, Some(0.5));
    }

    #[test]
    fn test_signal_type_serde() {
        let json = serde_json::to_string(&SignalType::Sell).unwrap();
        assert_eq!(json, "\"sell\"");
    }
}
