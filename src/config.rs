//! Run configuration for a backtest
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `CROSSBT__*` environment variables (e.g. `CROSSBT__FEE_RATE=0.001`,
//! `CROSSBT__DATA__SEED=7`). Partial tables merge over the defaults, so a file
//! switching `data.kind` only needs that variant's own keys.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::MarketScenario;
use crate::error::BacktestError;
use crate::models::TradingPair;
use crate::Result;

const ENV_PREFIX: &str = "CROSSBT";

/// Everything a single evaluation run needs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BacktestConfig {
    /// Starting balance in quote-currency units
    pub initial_cash: f64,
    /// Fraction of trade notional charged as fee (0.0026 = 0.26%)
    pub fee_rate: f64,
    pub short_window: usize,
    pub long_window: usize,
    /// Market traded by the strategy; its quote asset is the valuation currency
    pub trading_pair: TradingPair,
    pub allow_short_sale: bool,
    pub data: DataSourceConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_cash: 1000.0,
            fee_rate: 0.0026,
            short_window: 4,
            long_window: 20,
            trading_pair: TradingPair::new("BTC", "EUR"),
            allow_short_sale: false,
            data: DataSourceConfig::default(),
        }
    }
}

/// Where the price history comes from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataSourceConfig {
    /// Seeded random walk, see [`SyntheticDataGenerator`](crate::data::SyntheticDataGenerator)
    Synthetic {
        #[serde(default = "default_scenario")]
        scenario: MarketScenario,
        #[serde(default = "default_seed")]
        seed: u64,
        #[serde(default = "default_bars")]
        bars: usize,
        #[serde(default = "default_interval_minutes")]
        interval_minutes: i64,
    },
    /// JSON array of candles, close prices are used
    CandlesJson { path: PathBuf },
    /// JSON array of raw trades, resampled into bars
    TradesJson {
        path: PathBuf,
        #[serde(default = "default_interval_secs")]
        interval_secs: i64,
    },
}

fn default_scenario() -> MarketScenario {
    MarketScenario::Cyclical
}

fn default_seed() -> u64 {
    42
}

fn default_bars() -> usize {
    365
}

fn default_interval_minutes() -> i64 {
    1440
}

fn default_interval_secs() -> i64 {
    60
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        DataSourceConfig::Synthetic {
            scenario: default_scenario(),
            seed: default_seed(),
            bars: default_bars(),
            interval_minutes: default_interval_minutes(),
        }
    }
}

impl BacktestConfig {
    /// Load defaults, then `path` if given, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env_prefix(path, ENV_PREFIX)
    }

    fn load_with_env_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let defaults = ::config::Config::try_from(&BacktestConfig::default())?;
        let mut builder = ::config::Config::builder().add_source(defaults);

        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }

        let config: BacktestConfig = builder
            .add_source(
                ::config::Environment::with_prefix(env_prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations that cannot produce a meaningful run
    pub fn validate(&self) -> Result<()> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(BacktestError::Config(format!(
                "initial_cash must be positive, got {}",
                self.initial_cash
            )));
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            return Err(BacktestError::Config(format!(
                "fee_rate must be in [0, 1), got {}",
                self.fee_rate
            )));
        }
        if self.short_window == 0 || self.long_window == 0 {
            return Err(BacktestError::Config(
                "moving average windows must be positive".to_string(),
            ));
        }
        if self.short_window >= self.long_window {
            tracing::warn!(
                "short window {} is not below long window {}",
                self.short_window,
                self.long_window
            );
        }
        if self.trading_pair.base == self.trading_pair.quote {
            return Err(BacktestError::Config(format!(
                "trading pair {} has identical legs",
                self.trading_pair
            )));
        }
        Ok(())
    }
}
