use crate::data::PriceHistory;
use crate::error::BacktestError;
use crate::models::Signal;
use crate::Result;

/// Validate strategy output before it is replayed against a ledger
///
/// # Returns
/// * `Ok(())` if signals are in non-decreasing time order and every signal
///   timestamp is a row of `history`
/// * `Err(InvalidSignals)` otherwise
pub fn validate_signals(signals: &[Signal], history: &PriceHistory) -> Result<()> {
    for window in signals.windows(2) {
        if window[1].datetime < window[0].datetime {
            return Err(BacktestError::InvalidSignals(format!(
                "signals are not sorted by timestamp: {} after {}",
                window[1].datetime, window[0].datetime
            )));
        }
    }

    if let Some(signal) = signals
        .iter()
        .find(|s| history.position(s.datetime).is_none())
    {
        return Err(BacktestError::InvalidSignals(format!(
            "{} signal at {} is outside the price history",
            signal.signal_type, signal.datetime
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SignalType, TradingPair};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn history() -> PriceHistory {
        PriceHistory::new((0..5).map(day).collect(), [("BTCEUR", vec![1.0; 5])]).unwrap()
    }

    fn signal(kind: SignalType, n: i64) -> Signal {
        Signal::new(&TradingPair::new("BTC", "EUR"), kind, day(n))
    }

    #[test]
    fn test_ordered_signals_pass() {
        let signals = vec![
            signal(SignalType::Buy, 1),
            signal(SignalType::Sell, 3),
            signal(SignalType::Buy, 3),
        ];
        assert!(validate_signals(&signals, &history()).is_ok());
    }

    #[test]
    fn test_empty_signals_pass() {
        assert!(validate_signals(&[], &history()).is_ok());
    }

    #[test]
    fn test_backwards_signals_fail() {
        let signals = vec![signal(SignalType::Buy, 3), signal(SignalType::Sell, 1)];
        let result = validate_signals(&signals, &history());
        assert!(matches!(result, Err(BacktestError::InvalidSignals(_))));
    }

    #[test]
    fn test_signal_outside_history_fails() {
        let signals = vec![signal(SignalType::Buy, 9)];
        let err = validate_signals(&signals, &history()).unwrap_err();
        assert!(err.to_string().contains("outside the price history"));
    }
}
