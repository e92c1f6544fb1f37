use crate::backtest::metrics::PerformanceSummary;
use crate::config::BacktestConfig;
use crate::data::{load_price_history, PriceHistory};
use crate::ledger::Ledger;
use crate::models::SignalType;
use crate::strategy::{validate_signals, CrossoverStrategy, Strategy};
use crate::Result;

/// Replays strategy signals against a ledger and scores the outcome
///
/// A run is atomic: the first failing trade aborts the whole evaluation.
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    allow_short_sale: bool,
}

/// Outcome of a configured end-to-end run
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub summary: PerformanceSummary,
    pub ledger: Ledger,
    pub history: PriceHistory,
}

impl Evaluator {
    pub fn new(allow_short_sale: bool) -> Self {
        Self { allow_short_sale }
    }

    /// Generate signals, replay them on `ledger`, and summarize performance
    ///
    /// # Arguments
    /// * `history` - Price table holding the strategy's pair column and a
    ///   valuation column for every held asset
    /// * `ledger` - Freshly constructed portfolio, mutated in place
    /// * `strategy` - Signal source
    ///
    /// A leading sell signal is dropped: nothing has been bought yet.
    pub fn evaluate<S: Strategy + ?Sized>(
        &self,
        history: &PriceHistory,
        ledger: &mut Ledger,
        strategy: &S,
    ) -> Result<PerformanceSummary> {
        tracing::info!(
            "Evaluating {} on {} over {} bars",
            strategy.name(),
            strategy.trading_pair(),
            history.len()
        );

        if history.len() < strategy.min_bars_required() {
            tracing::warn!(
                "Only {} bars, {} needs {}: no signals possible",
                history.len(),
                strategy.name(),
                strategy.min_bars_required()
            );
        }

        let mut signals = strategy.generate_signals(history)?;
        validate_signals(&signals, history)?;

        if signals.first().map(|s| s.signal_type) == Some(SignalType::Sell) {
            let dropped = signals.remove(0);
            tracing::warn!(
                "Dropping leading sell signal at {}: no position to liquidate",
                dropped.datetime
            );
        }

        for signal in &signals {
            let market = format!("{}{}", signal.base_asset, signal.quote_asset);
            let price = history.price_at(&market, signal.datetime)?;

            ledger.directed_trade(
                &signal.base_asset,
                &signal.quote_asset,
                signal.signal_type,
                price,
                None,
                self.allow_short_sale,
                signal.datetime,
            )?;
        }

        let quote_asset = ledger.quote_asset().clone();
        let summary = ledger.performance_summary(history, &quote_asset)?;

        tracing::info!(
            "Backtest complete: {} trades, return {:+.2}% (net {:+.2}%)",
            summary.trade_count,
            summary.return_ratio * 100.0,
            summary.net_return_ratio * 100.0
        );

        Ok(summary)
    }

    /// Load data, build the ledger and strategy from `config`, and evaluate
    ///
    /// The ledger starts with `initial_cash` of the quote asset and none of the
    /// base asset, over the full timestamp index of the loaded history.
    pub fn run(config: &BacktestConfig) -> Result<BacktestRun> {
        config.validate()?;

        let pair = &config.trading_pair;
        let history = load_price_history(&config.data, pair)?;

        let mut ledger = Ledger::new(
            [(pair.quote.clone(), config.initial_cash), (pair.base.clone(), 0.0)],
            history.index().to_vec(),
            pair.quote.clone(),
            config.fee_rate,
        )?;

        let strategy = CrossoverStrategy::new(config.short_window, config.long_window, pair.clone());
        let summary = Self::new(config.allow_short_sale).evaluate(&history, &mut ledger, &strategy)?;

        Ok(BacktestRun {
            summary,
            ledger,
            history,
        })
    }
}
