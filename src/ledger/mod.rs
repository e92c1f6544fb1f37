//! Virtual portfolio ledger
//!
//! Balances are right-continuous step functions over a fixed time index: a write
//! at `t` holds for `t` and every later timestamp until the next write to the
//! same asset. Each asset is stored as an ordered map from write timestamp to
//! value, and a read at `t` resolves to the latest write at or before `t`.
//!
//! Assets must be registered up front (at construction or via
//! [`Ledger::register_asset`]); touching an unknown asset is an error.

pub mod valuation;

pub use valuation::ValuationSeries;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::backtest::PerformanceSummary;
use crate::data::PriceHistory;
use crate::error::BacktestError;
use crate::models::{AssetId, SignalType};
use crate::Result;

type StepFunction = BTreeMap<DateTime<Utc>, f64>;

/// Record of one executed ledger trade
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeFill {
    pub at: DateTime<Utc>,
    pub bought: AssetId,
    pub sold: AssetId,
    pub volume_sold: f64,
    pub volume_bought: f64,
    /// Trade size in quote-currency units
    pub notional: f64,
    pub fee: f64,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    index: Vec<DateTime<Utc>>,
    balances: BTreeMap<AssetId, StepFunction>,
    fees: BTreeMap<DateTime<Utc>, f64>,
    fee_rate: f64,
    quote_asset: AssetId,
    fills: Vec<TradeFill>,
}

impl Ledger {
    /// Create a ledger over a fixed, strictly ascending time index
    ///
    /// # Arguments
    /// * `initial_balances` - Assets to track and their balance at the first timestamp
    /// * `index` - Every timestamp of the test period
    /// * `quote_asset` - Currency fees are expressed in
    /// * `fee_rate` - Fraction of trade notional charged per trade
    pub fn new<I, A>(
        initial_balances: I,
        index: Vec<DateTime<Utc>>,
        quote_asset: impl Into<AssetId>,
        fee_rate: f64,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (A, f64)>,
        A: Into<AssetId>,
    {
        if index.is_empty() {
            return Err(BacktestError::EmptyPriceHistory);
        }
        if index.windows(2).any(|w| w[1] <= w[0]) {
            return Err(BacktestError::InvalidPriceHistory(
                "ledger index must be strictly ascending".to_string(),
            ));
        }

        let mut ledger = Self {
            index,
            balances: BTreeMap::new(),
            fees: BTreeMap::new(),
            fee_rate,
            quote_asset: quote_asset.into(),
            fills: Vec::new(),
        };

        for (asset, volume) in initial_balances {
            ledger.register_asset(asset, volume)?;
        }

        Ok(ledger)
    }

    /// Start tracking an asset with `initial_volume` from the first timestamp on
    pub fn register_asset(&mut self, asset: impl Into<AssetId>, initial_volume: f64) -> Result<()> {
        let asset = asset.into();
        if self.balances.contains_key(&asset) {
            return Err(BacktestError::DuplicateAsset(asset));
        }

        let mut steps = StepFunction::new();
        steps.insert(self.index[0], initial_volume);
        self.balances.insert(asset, steps);
        Ok(())
    }

    pub fn has_asset(&self, asset: &AssetId) -> bool {
        self.balances.contains_key(asset)
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetId> {
        self.balances.keys()
    }

    pub fn index(&self) -> &[DateTime<Utc>] {
        &self.index
    }

    pub fn quote_asset(&self) -> &AssetId {
        &self.quote_asset
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    pub fn first_timestamp(&self) -> DateTime<Utc> {
        self.index[0]
    }

    pub fn last_timestamp(&self) -> DateTime<Utc> {
        self.index[self.index.len() - 1]
    }

    /// Balance of `asset` at `at`, or at the last timestamp when `at` is `None`
    ///
    /// `at` may fall between index entries; it must lie within the index span.
    pub fn balance_at(&self, asset: &AssetId, at: Option<DateTime<Utc>>) -> Result<f64> {
        let at = at.unwrap_or_else(|| self.last_timestamp());
        if at < self.first_timestamp() || at > self.last_timestamp() {
            return Err(BacktestError::OutOfRangeTimestamp(at));
        }
        Ok(step_value(self.steps(asset)?, at))
    }

    /// Every registered asset's balance at `at`
    pub fn balances_at(&self, at: DateTime<Utc>) -> Result<BTreeMap<AssetId, f64>> {
        self.balances
            .keys()
            .map(|asset| Ok((asset.clone(), self.balance_at(asset, Some(at))?)))
            .collect()
    }

    /// Overwrite the balance of `asset` from `at` until its next later write
    ///
    /// `at` must be one of the index timestamps.
    pub fn set_balance_from(&mut self, asset: &AssetId, at: DateTime<Utc>, value: f64) -> Result<()> {
        self.check_in_index(at)?;
        let steps = self
            .balances
            .get_mut(asset)
            .ok_or_else(|| BacktestError::UnknownAsset(asset.clone()))?;
        steps.insert(at, value);
        Ok(())
    }

    /// Exchange `sold` for `bought` at `price` (units of `sold` per unit of `bought`)
    ///
    /// `volume_sold = None` sells the whole balance of `sold` at `at`. A fee of
    /// `notional * fee_rate` is accrued at `at`, where notional is the quote-asset
    /// leg of the trade. Trades must be posted in non-decreasing time order.
    pub fn trade(
        &mut self,
        bought: &AssetId,
        sold: &AssetId,
        price: f64,
        volume_sold: Option<f64>,
        allow_short_sale: bool,
        at: DateTime<Utc>,
    ) -> Result<TradeFill> {
        self.check_in_index(at)?;
        if let Some(last) = self.fills.last() {
            if at < last.at {
                return Err(BacktestError::OutOfOrderTrade { at, last: last.at });
            }
        }
        if bought == sold {
            return Err(BacktestError::SameAssetTrade(bought.clone()));
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(BacktestError::InvalidPrice { price, at });
        }

        let available = step_value(self.steps(sold)?, at);
        let held_bought = step_value(self.steps(bought)?, at);

        let volume_sold = volume_sold.unwrap_or(available);
        if !(volume_sold.is_finite() && volume_sold >= 0.0) {
            return Err(BacktestError::InvalidVolume(volume_sold));
        }
        if volume_sold > available && !allow_short_sale {
            return Err(BacktestError::ShortSale {
                asset: sold.clone(),
                requested: volume_sold,
                available,
                at,
            });
        }

        let volume_bought = volume_sold / price;
        let notional = self.notional(bought, sold, volume_sold, volume_bought)?;
        let fee = notional * self.fee_rate;

        self.set_balance_from(sold, at, available - volume_sold)?;
        self.set_balance_from(bought, at, held_bought + volume_bought)?;
        *self.fees.entry(at).or_insert(0.0) += fee;

        tracing::debug!(
            "Trade @ {}: sold {:.8} {} for {:.8} {} (fee {:.4} {})",
            at,
            volume_sold,
            sold,
            volume_bought,
            bought,
            fee,
            self.quote_asset
        );

        let fill = TradeFill {
            at,
            bought: bought.clone(),
            sold: sold.clone(),
            volume_sold,
            volume_bought,
            notional,
            fee,
        };
        self.fills.push(fill.clone());
        Ok(fill)
    }

    /// Buy or sell `base` against `quote` at `price` (quote per base)
    ///
    /// A buy sells `quote` for `base` at `price`; a sell sells `base` for `quote`
    /// at `1 / price`. `volume` is a base-asset quantity; `None` trades the whole
    /// balance of the asset being sold.
    #[allow(clippy::too_many_arguments)]
    pub fn directed_trade(
        &mut self,
        base: &AssetId,
        quote: &AssetId,
        trade_type: SignalType,
        price: Option<f64>,
        volume: Option<f64>,
        allow_short_sale: bool,
        at: DateTime<Utc>,
    ) -> Result<TradeFill> {
        let price = price.ok_or_else(|| BacktestError::MissingPrice {
            market: format!("{}{}", base, quote),
            at,
        })?;
        if !(price.is_finite() && price > 0.0) {
            return Err(BacktestError::InvalidPrice { price, at });
        }

        tracing::debug!(
            "Directed {} {}/{} @ {:.4} volume {:?} at {}",
            trade_type,
            base,
            quote,
            price,
            volume,
            at
        );

        match trade_type {
            SignalType::Buy => self.trade(
                base,
                quote,
                price,
                volume.map(|v| v * price),
                allow_short_sale,
                at,
            ),
            SignalType::Sell => self.trade(quote, base, 1.0 / price, volume, allow_short_sale, at),
        }
    }

    /// Fee accrued at each trade timestamp
    pub fn fees(&self) -> &BTreeMap<DateTime<Utc>, f64> {
        &self.fees
    }

    pub fn fee_at(&self, at: DateTime<Utc>) -> f64 {
        self.fees.get(&at).copied().unwrap_or(0.0)
    }

    pub fn total_fees(&self) -> f64 {
        self.fees.values().sum()
    }

    /// Executed trades in posting order
    pub fn fills(&self) -> &[TradeFill] {
        &self.fills
    }

    /// Reduce the valuation series to return, fee and risk figures
    ///
    /// Fees are accrued in the ledger's quote asset, so `quote_asset` must match it.
    pub fn performance_summary(
        &self,
        history: &PriceHistory,
        quote_asset: &AssetId,
    ) -> Result<PerformanceSummary> {
        if quote_asset != &self.quote_asset {
            return Err(BacktestError::QuoteAssetMismatch {
                requested: quote_asset.clone(),
                ledger: self.quote_asset.clone(),
            });
        }
        let valuation = self.valuation_series(history, quote_asset)?;
        PerformanceSummary::from_equity_curve(
            &valuation.total(),
            self.total_fees(),
            self.last_timestamp() - self.first_timestamp(),
            self.fills.len(),
        )
    }

    fn steps(&self, asset: &AssetId) -> Result<&StepFunction> {
        self.balances
            .get(asset)
            .ok_or_else(|| BacktestError::UnknownAsset(asset.clone()))
    }

    fn check_in_index(&self, at: DateTime<Utc>) -> Result<()> {
        self.index
            .binary_search(&at)
            .map(|_| ())
            .map_err(|_| BacktestError::OutOfRangeTimestamp(at))
    }

    /// Quote-currency size of a trade; only defined when one leg is the quote asset
    fn notional(
        &self,
        bought: &AssetId,
        sold: &AssetId,
        volume_sold: f64,
        volume_bought: f64,
    ) -> Result<f64> {
        if *sold == self.quote_asset {
            Ok(volume_sold)
        } else if *bought == self.quote_asset {
            Ok(volume_bought)
        } else {
            Err(BacktestError::UnsupportedFeeComputation {
                bought: bought.clone(),
                sold: sold.clone(),
                quote: self.quote_asset.clone(),
            })
        }
    }
}

/// Value of the latest write at or before `at` (0 before the first write)
fn step_value(steps: &StepFunction, at: DateTime<Utc>) -> f64 {
    steps
        .range(..=at)
        .next_back()
        .map(|(_, value)| *value)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const EPS: f64 = 1e-9;
    const FEE_RATE: f64 = 0.0026;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn eur() -> AssetId {
        AssetId::from("EUR")
    }

    fn btc() -> AssetId {
        AssetId::from("BTC")
    }

    fn ledger(days: i64) -> Ledger {
        Ledger::new(
            [("EUR", 1000.0), ("BTC", 0.0)],
            (0..days).map(day).collect(),
            "EUR",
            FEE_RATE,
        )
        .unwrap()
    }

    #[test]
    fn test_initial_balances() {
        let ledger = ledger(5);
        assert!(ledger.has_asset(&eur()));
        assert!(!ledger.has_asset(&AssetId::from("ETH")));
        assert_eq!(ledger.balance_at(&eur(), Some(day(0))).unwrap(), 1000.0);
        assert_eq!(ledger.balance_at(&eur(), None).unwrap(), 1000.0);
        assert_eq!(ledger.balance_at(&btc(), None).unwrap(), 0.0);
    }

    #[test]
    fn test_new_rejects_bad_index_and_duplicates() {
        let empty = Ledger::new([("EUR", 1.0)], vec![], "EUR", FEE_RATE);
        assert!(matches!(empty, Err(BacktestError::EmptyPriceHistory)));

        let unsorted = Ledger::new([("EUR", 1.0)], vec![day(1), day(0)], "EUR", FEE_RATE);
        assert!(matches!(unsorted, Err(BacktestError::InvalidPriceHistory(_))));

        let duplicate = Ledger::new([("EUR", 1.0), ("EUR", 2.0)], vec![day(0)], "EUR", FEE_RATE);
        assert!(matches!(duplicate, Err(BacktestError::DuplicateAsset(_))));
    }

    #[test]
    fn test_unregistered_asset_is_an_error() {
        let mut ledger = ledger(3);
        let eth = AssetId::from("ETH");

        assert!(matches!(
            ledger.balance_at(&eth, None),
            Err(BacktestError::UnknownAsset(_))
        ));
        assert!(matches!(
            ledger.set_balance_from(&eth, day(1), 1.0),
            Err(BacktestError::UnknownAsset(_))
        ));
        // Reading must not create it as a side effect
        assert!(!ledger.has_asset(&eth));

        ledger.register_asset("ETH", 2.0).unwrap();
        assert_eq!(ledger.balance_at(&eth, Some(day(2))).unwrap(), 2.0);
        assert!(matches!(
            ledger.register_asset("ETH", 0.0),
            Err(BacktestError::DuplicateAsset(_))
        ));
    }

    #[test]
    fn test_step_function_propagation() {
        let mut ledger = ledger(10);
        ledger.set_balance_from(&btc(), day(3), 1.5).unwrap();
        ledger.set_balance_from(&btc(), day(7), 0.5).unwrap();

        assert_eq!(ledger.balance_at(&btc(), Some(day(2))).unwrap(), 0.0);
        for n in 3..7 {
            assert_eq!(ledger.balance_at(&btc(), Some(day(n))).unwrap(), 1.5);
        }
        for n in 7..10 {
            assert_eq!(ledger.balance_at(&btc(), Some(day(n))).unwrap(), 0.5);
        }
        // Between index entries resolves to the prior write
        let between = day(3) + Duration::hours(12);
        assert_eq!(ledger.balance_at(&btc(), Some(between)).unwrap(), 1.5);
    }

    #[test]
    fn test_out_of_range_timestamps() {
        let mut ledger = ledger(3);
        let off_index = day(1) + Duration::hours(1);

        assert!(matches!(
            ledger.set_balance_from(&btc(), off_index, 1.0),
            Err(BacktestError::OutOfRangeTimestamp(_))
        ));
        assert!(matches!(
            ledger.balance_at(&btc(), Some(day(5))),
            Err(BacktestError::OutOfRangeTimestamp(_))
        ));
        assert!(matches!(
            ledger.trade(&btc(), &eur(), 100.0, None, false, day(-1)),
            Err(BacktestError::OutOfRangeTimestamp(_))
        ));
    }

    #[test]
    fn test_trade_conservation_and_fee() {
        let mut ledger = ledger(3);
        let fill = ledger
            .trade(&btc(), &eur(), 8000.0, Some(400.0), false, day(1))
            .unwrap();

        let btc_delta = ledger.balance_at(&btc(), Some(day(1))).unwrap()
            - ledger.balance_at(&btc(), Some(day(0))).unwrap();
        let eur_delta = ledger.balance_at(&eur(), Some(day(1))).unwrap()
            - ledger.balance_at(&eur(), Some(day(0))).unwrap();

        assert_eq!(btc_delta, -eur_delta / 8000.0);
        assert_eq!(ledger.balance_at(&eur(), None).unwrap(), 600.0);
        assert_eq!(fill.notional, 400.0);
        assert!((ledger.fee_at(day(1)) - 400.0 * FEE_RATE).abs() < EPS);
        assert_eq!(ledger.fee_at(day(0)), 0.0);
    }

    #[test]
    fn test_trade_defaults_to_full_balance() {
        let mut ledger = ledger(2);
        ledger.trade(&btc(), &eur(), 10_000.0, None, false, day(0)).unwrap();

        assert_eq!(ledger.balance_at(&eur(), None).unwrap(), 0.0);
        assert!((ledger.balance_at(&btc(), None).unwrap() - 0.1).abs() < EPS);
    }

    #[test]
    fn test_short_sale_guard() {
        let mut ledger = ledger(3);

        let err = ledger
            .trade(&btc(), &eur(), 100.0, Some(1500.0), false, day(1))
            .unwrap_err();
        assert!(matches!(err, BacktestError::ShortSale { .. }));
        // Rejected trade leaves no trace
        assert_eq!(ledger.balance_at(&eur(), None).unwrap(), 1000.0);
        assert_eq!(ledger.total_fees(), 0.0);

        ledger
            .trade(&btc(), &eur(), 100.0, Some(1500.0), true, day(1))
            .unwrap();
        assert_eq!(ledger.balance_at(&eur(), None).unwrap(), -500.0);
        assert_eq!(ledger.balance_at(&btc(), None).unwrap(), 15.0);
    }

    #[test]
    fn test_fee_requires_quote_leg() {
        let mut ledger = ledger(2);
        ledger.register_asset("ETH", 3.0).unwrap();

        let err = ledger
            .trade(&btc(), &AssetId::from("ETH"), 20.0, None, false, day(0))
            .unwrap_err();
        assert!(matches!(err, BacktestError::UnsupportedFeeComputation { .. }));
        assert_eq!(ledger.balance_at(&AssetId::from("ETH"), None).unwrap(), 3.0);
    }

    #[test]
    fn test_trades_must_be_time_ordered() {
        let mut ledger = ledger(5);
        ledger.trade(&btc(), &eur(), 100.0, Some(10.0), false, day(3)).unwrap();
        // Same timestamp is fine
        ledger.trade(&btc(), &eur(), 100.0, Some(10.0), false, day(3)).unwrap();

        let err = ledger
            .trade(&btc(), &eur(), 100.0, Some(10.0), false, day(2))
            .unwrap_err();
        assert!(matches!(err, BacktestError::OutOfOrderTrade { .. }));
        assert!((ledger.fee_at(day(3)) - 20.0 * FEE_RATE).abs() < EPS);
    }

    #[test]
    fn test_rejects_invalid_price_and_volume() {
        let mut ledger = ledger(2);
        assert!(matches!(
            ledger.trade(&btc(), &eur(), 0.0, None, false, day(0)),
            Err(BacktestError::InvalidPrice { .. })
        ));
        assert!(matches!(
            ledger.trade(&btc(), &eur(), 10.0, Some(-1.0), false, day(0)),
            Err(BacktestError::InvalidVolume(_))
        ));
        assert!(matches!(
            ledger.trade(&eur(), &eur(), 1.0, None, false, day(0)),
            Err(BacktestError::SameAssetTrade(_))
        ));
    }

    #[test]
    fn test_directed_trade_requires_price() {
        let mut ledger = ledger(2);
        let err = ledger
            .directed_trade(&btc(), &eur(), SignalType::Buy, None, None, false, day(0))
            .unwrap_err();
        assert!(matches!(err, BacktestError::MissingPrice { .. }));
    }

    #[test]
    fn test_directed_trade_with_base_volume() {
        let mut ledger = ledger(2);
        ledger
            .directed_trade(&btc(), &eur(), SignalType::Buy, Some(1000.0), Some(0.25), false, day(0))
            .unwrap();

        assert!((ledger.balance_at(&btc(), None).unwrap() - 0.25).abs() < EPS);
        assert!((ledger.balance_at(&eur(), None).unwrap() - 750.0).abs() < EPS);

        ledger
            .directed_trade(&btc(), &eur(), SignalType::Sell, Some(2000.0), Some(0.1), false, day(1))
            .unwrap();
        assert!((ledger.balance_at(&btc(), None).unwrap() - 0.15).abs() < EPS);
        assert!((ledger.balance_at(&eur(), None).unwrap() - 950.0).abs() < EPS);
    }

    #[test]
    fn test_round_trip() {
        let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2020, 12, 31, 0, 0, 0).unwrap();
        let mut ledger =
            Ledger::new([("EUR", 1000.0), ("BTC", 0.0)], vec![t0, t1], "EUR", FEE_RATE).unwrap();

        ledger
            .directed_trade(&btc(), &eur(), SignalType::Buy, Some(10_000.0), None, false, t0)
            .unwrap();
        assert!((ledger.balance_at(&btc(), Some(t0)).unwrap() - 0.1).abs() < EPS);
        assert_eq!(ledger.balance_at(&eur(), Some(t0)).unwrap(), 0.0);
        assert!((ledger.fee_at(t0) - 1000.0 * FEE_RATE).abs() < EPS);

        ledger
            .directed_trade(&btc(), &eur(), SignalType::Sell, Some(12_000.0), None, false, t1)
            .unwrap();
        assert!((ledger.balance_at(&eur(), Some(t1)).unwrap() - 1200.0).abs() < 1e-6);
        assert_eq!(ledger.balance_at(&btc(), Some(t1)).unwrap(), 0.0);
        assert!((ledger.fee_at(t1) - 1200.0 * FEE_RATE).abs() < 1e-6);

        let history =
            PriceHistory::new(vec![t0, t1], [("BTCEUR", vec![10_000.0, 12_000.0])]).unwrap();
        let summary = ledger.performance_summary(&history, &eur()).unwrap();

        assert!((summary.return_ratio - 0.20).abs() < 1e-9);
        // 2020-01-01 to 2020-12-31 is exactly 365 days
        assert!((summary.annualized_return_ratio - 0.20).abs() < 1e-9);
        assert!((summary.total_fees - 2200.0 * FEE_RATE).abs() < 1e-6);
        assert!((summary.net_return_ratio - ((1200.0 - 5.72) / 1000.0 - 1.0)).abs() < 1e-9);
        assert_eq!(summary.trade_count, 2);
    }

    #[test]
    fn test_summary_risk_from_valuation_curve() {
        let mut ledger = ledger(4);
        ledger
            .directed_trade(&btc(), &eur(), SignalType::Buy, Some(100.0), None, false, day(0))
            .unwrap();
        let history = PriceHistory::new(
            (0..4).map(day).collect::<Vec<_>>(),
            [("BTCEUR", vec![100.0, 150.0, 90.0, 120.0])],
        )
        .unwrap();

        let summary = ledger.performance_summary(&history, &eur()).unwrap();

        // 10 BTC held throughout: 1000, 1500, 900, 1200
        assert!((summary.max_drawdown - 600.0).abs() < 1e-9);
        assert!((summary.max_drawdown_pct - 40.0).abs() < 1e-9);
        assert!((summary.return_ratio - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_summary_rejects_foreign_quote_asset() {
        let ledger = ledger(3);
        let history = PriceHistory::new(
            (0..3).map(day).collect::<Vec<_>>(),
            [("BTCUSD", vec![1.0, 1.0, 1.0]), ("EURUSD", vec![1.1, 1.1, 1.1])],
        )
        .unwrap();

        let result = ledger.performance_summary(&history, &AssetId::from("USD"));
        assert!(matches!(result, Err(BacktestError::QuoteAssetMismatch { .. })));
    }
}
