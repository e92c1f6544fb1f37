use crate::models::Candle;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketScenario {
    /// Steady uptrend with noise (+2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-2% daily average)
    Downtrend,
    /// Sideways/choppy market (±1% around mean)
    Sideways,
    /// High volatility (±5% large swings)
    Volatile,
    /// Slow sine wave around the base price, produces regular MA crossings
    Cyclical,
}

/// Generates synthetic price data for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    start_time: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    ///
    /// Series start on 2020-01-01 00:00 UTC.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 10_000.0,
            base_volume: 50.0,
            start_time: Utc
                .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        }
    }

    /// Generate candles for a specific market scenario
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `num_candles` - Number of candles to generate
    /// * `interval_minutes` - Minutes between candles (1440 for daily bars)
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_candles: usize,
        interval_minutes: i64,
    ) -> Vec<Candle> {
        let intervals_per_day = 24.0 * 60.0 / interval_minutes.max(1) as f64;
        let mut candles = Vec::with_capacity(num_candles);
        let mut current_price = self.base_price;

        for i in 0..num_candles {
            let timestamp = self.start_time + Duration::minutes(i as i64 * interval_minutes);

            current_price = match scenario {
                MarketScenario::Uptrend => {
                    let drift = current_price * 0.02 / intervals_per_day;
                    let noise = current_price * self.rng.gen_range(-0.001..0.001);
                    current_price + drift + noise
                }
                MarketScenario::Downtrend => {
                    let drift = current_price * -0.02 / intervals_per_day;
                    let noise = current_price * self.rng.gen_range(-0.001..0.001);
                    current_price + drift + noise
                }
                MarketScenario::Sideways => {
                    // Mean reversion force + noise
                    let reversion = (self.base_price - current_price) * 0.1;
                    let noise = current_price * self.rng.gen_range(-0.01..0.01);
                    current_price + reversion + noise
                }
                MarketScenario::Volatile => {
                    let change = current_price * self.rng.gen_range(-0.05..0.05);
                    // Prevent price from going too low
                    (current_price + change).max(self.base_price * 0.5)
                }
                MarketScenario::Cyclical => {
                    // One full cycle every 60 candles, ±10% amplitude
                    let phase = i as f64 * std::f64::consts::TAU / 60.0;
                    let noise = self.rng.gen_range(-0.002..0.002);
                    self.base_price * (1.0 + 0.1 * phase.sin() + noise)
                }
            };

            candles.push(self.create_candle(current_price, timestamp));
        }

        candles
    }

    /// Helper to create a candle from price and timestamp
    fn create_candle(&mut self, price: f64, timestamp: DateTime<Utc>) -> Candle {
        let noise_pct = 0.002; // ±0.2% intrabar movement

        let high = price * (1.0 + self.rng.gen_range(0.0..noise_pct));
        let low = price * (1.0 - self.rng.gen_range(0.0..noise_pct));

        let open_raw = price * (1.0 + self.rng.gen_range(-noise_pct..noise_pct));
        let open = open_raw.clamp(low, high);

        let volume = self.base_volume * self.rng.gen_range(0.7..1.3);

        Candle {
            timestamp,
            open,
            high,
            low,
            close: price,
            volume,
            trade_count: self.rng.gen_range(10..500),
        }
    }
}
