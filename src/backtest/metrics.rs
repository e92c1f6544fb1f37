use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::BacktestError;
use crate::Result;

const DAYS_PER_YEAR: f64 = 365.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Return and fee figures of one backtest run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    // Returns
    pub return_ratio: f64,
    pub annualized_return_ratio: f64,

    // Fees
    pub total_fees: f64,
    pub net_return_ratio: f64, // After deducting total_fees from final value
    pub net_annualized_return_ratio: f64,

    // Risk Metrics
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64, // Per bar, risk-free rate 0

    // Context
    pub initial_value: f64,
    pub final_value: f64,
    pub test_duration_days: f64,
    pub trade_count: usize,
}

impl PerformanceSummary {
    /// Compute returns from first/last portfolio totals
    ///
    /// With only two observations the drawdown is the overall loss, if any,
    /// and the Sharpe ratio is zero. Prefer [`Self::from_equity_curve`] when
    /// the full valuation series is available.
    pub fn from_totals(
        initial_value: f64,
        final_value: f64,
        total_fees: f64,
        duration: Duration,
        trade_count: usize,
    ) -> Result<Self> {
        Self::from_equity_curve(&[initial_value, final_value], total_fees, duration, trade_count)
    }

    /// Compute returns and risk figures from the portfolio total at every bar
    ///
    /// Annualization compounds the period return over a 365 day year:
    /// `(1 + r)^(365 days / duration) - 1`. A loss of everything or more
    /// annualizes to -100%.
    pub fn from_equity_curve(
        totals: &[f64],
        total_fees: f64,
        duration: Duration,
        trade_count: usize,
    ) -> Result<Self> {
        let (Some(&initial_value), Some(&final_value)) = (totals.first(), totals.last()) else {
            return Err(BacktestError::EmptyPriceHistory);
        };
        if initial_value == 0.0 {
            return Err(BacktestError::ZeroInitialValue);
        }
        let test_duration_days = duration.num_seconds() as f64 / SECONDS_PER_DAY;
        if test_duration_days <= 0.0 {
            return Err(BacktestError::InvalidPriceHistory(
                "test period has zero duration, cannot annualize".to_string(),
            ));
        }

        let return_ratio = final_value / initial_value - 1.0;
        let net_return_ratio = (final_value - total_fees) / initial_value - 1.0;
        let (max_drawdown, max_drawdown_pct) = calculate_drawdown(totals);

        Ok(Self {
            return_ratio,
            annualized_return_ratio: annualize(return_ratio, test_duration_days),
            total_fees,
            net_return_ratio,
            net_annualized_return_ratio: annualize(net_return_ratio, test_duration_days),
            max_drawdown,
            max_drawdown_pct,
            sharpe_ratio: calculate_sharpe_ratio(totals),
            initial_value,
            final_value,
            test_duration_days,
            trade_count,
        })
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║              BACKTEST PERFORMANCE REPORT              ║");
        println!("╚═══════════════════════════════════════════════════════╝\n");

        println!("📊 PORTFOLIO");
        println!("  Starting Value:        {:.2}", self.initial_value);
        println!("  Final Value:           {:.2}", self.final_value);
        println!(
            "  Test Period:           {:.1} days ({} trades)",
            self.test_duration_days, self.trade_count
        );

        println!("\n📈 RETURNS");
        println!("  return_ratio:                {:+.2}%", self.return_ratio * 100.0);
        println!(
            "  annualized_return_ratio:     {:+.2}%",
            self.annualized_return_ratio * 100.0
        );

        println!("\n💸 FEES");
        println!("  total_fees:                  {:.2}", self.total_fees);
        println!(
            "  net_return_ratio:            {:+.2}%",
            self.net_return_ratio * 100.0
        );
        println!(
            "  net_annualized_return_ratio: {:+.2}%",
            self.net_annualized_return_ratio * 100.0
        );

        println!("\n⚠️  RISK");
        println!(
            "  max_drawdown:                {:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        );
        println!("  sharpe_ratio:                {:.4}", self.sharpe_ratio);

        println!("\n═══════════════════════════════════════════════════════\n");
    }
}

fn annualize(return_ratio: f64, duration_days: f64) -> f64 {
    let growth = 1.0 + return_ratio;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(DAYS_PER_YEAR / duration_days) - 1.0
}

/// Largest peak-to-trough fall of the portfolio total, absolute and in percent of the peak
fn calculate_drawdown(totals: &[f64]) -> (f64, f64) {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0;
    let mut max_dd_pct = 0.0;

    for &value in totals {
        if value > peak {
            peak = value;
        }

        let drawdown = peak - value;
        if drawdown > max_dd {
            max_dd = drawdown;
            max_dd_pct = if peak > 0.0 {
                (drawdown / peak) * 100.0
            } else {
                0.0
            };
        }
    }

    (max_dd, max_dd_pct)
}

/// Mean over standard deviation of bar-to-bar returns, risk-free rate 0
///
/// Bars following a non-positive total are skipped.
fn calculate_sharpe_ratio(totals: &[f64]) -> f64 {
    let returns: Vec<f64> = totals
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();
    if returns.is_empty() {
        return 0.0;
    }

    let mean_return = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|r| {
            let diff = r - mean_return;
            diff * diff
        })
        .sum::<f64>()
        / returns.len() as f64;

    let std_dev = variance.sqrt();

    if std_dev > 0.0 {
        mean_return / std_dev
    } else {
        0.0
    }
}
