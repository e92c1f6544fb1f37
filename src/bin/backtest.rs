use anyhow::Context;
use clap::Parser;
use crossbt::config::{BacktestConfig, DataSourceConfig};
use crossbt::data::MarketScenario;
use crossbt::{BacktestError, Evaluator};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Backtest a moving-average crossover strategy on historical prices
#[derive(Debug, Parser)]
#[command(name = "backtest", version)]
struct Args {
    /// TOML config file (defaults + CROSSBT__* env vars apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Short moving average window, in bars
    #[arg(long)]
    short: Option<usize>,

    /// Long moving average window, in bars
    #[arg(long)]
    long: Option<usize>,

    /// Fee rate applied to trade notional (0.0026 = 0.26%)
    #[arg(long)]
    fee_rate: Option<f64>,

    /// Starting cash in quote currency
    #[arg(long)]
    cash: Option<f64>,

    /// Price history file: a JSON array of candles
    #[arg(long, conflicts_with = "scenario")]
    candles: Option<PathBuf>,

    /// Synthetic market scenario
    #[arg(long, value_parser = parse_scenario)]
    scenario: Option<MarketScenario>,

    /// Print the summary as JSON instead of the report
    #[arg(long)]
    json: bool,
}

fn parse_scenario(value: &str) -> Result<MarketScenario, String> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase()))
        .map_err(|_| format!("unknown scenario {value}"))
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let args = Args::parse();
    let config = build_config(&args)?;

    println!(
        "Backtesting {} with SMA{}/SMA{} crossover, fee rate {}",
        config.trading_pair, config.short_window, config.long_window, config.fee_rate
    );

    let run = Evaluator::run(&config).context("backtest run failed")?;
    let summary = &run.summary;

    if args.json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!(
        "Starting Portfolio Value: {:.2} {}",
        summary.initial_value, config.trading_pair.quote
    );
    println!(
        "Final Portfolio Value: {:.2} {}",
        summary.final_value, config.trading_pair.quote
    );
    summary.print_report();

    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crossbt=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Config file and environment first, then explicit CLI flags on top
fn build_config(args: &Args) -> anyhow::Result<BacktestConfig> {
    let mut config = BacktestConfig::load(args.config.as_deref()).context("loading config")?;

    if let Some(short) = args.short {
        config.short_window = short;
    }
    if let Some(long) = args.long {
        config.long_window = long;
    }
    if let Some(fee_rate) = args.fee_rate {
        config.fee_rate = fee_rate;
    }
    if let Some(cash) = args.cash {
        config.initial_cash = cash;
    }
    if let Some(path) = &args.candles {
        config.data = DataSourceConfig::CandlesJson { path: path.clone() };
    }
    if let Some(scenario) = args.scenario {
        if let DataSourceConfig::Synthetic { scenario: current, .. } =
            &mut config.data
        {
            *current = scenario;
        } else {
            return Err(BacktestError::Config(
                "--scenario requires a synthetic data source".to_string(),
            )
            .into());
        }
    }

    config.validate()?;
    Ok(config)
}
