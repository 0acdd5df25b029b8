//! Sell-side price trigger evaluation for held positions.
//!
//! Checked in a fixed order, first match wins: the active signal's
//! stop-loss, the active signal's target, the percent-based fallback, and
//! finally technical deterioration from a fresh scan. The technical check
//! needs chart data, so it lives in its own function and the sweep only
//! pays for it when the cheap checks miss.

use crate::application::council::risk_gate::RiskConfig;
use crate::domain::market::Holding;
use crate::domain::signals::ScanResult;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTriggerKind {
    StopLoss,
    TakeProfit,
    Technical,
}

/// Price-level and percent-based checks (steps 1-3).
pub fn evaluate_price_triggers(
    holding: &Holding,
    signal_prices: (Option<i64>, Option<i64>),
    config: &RiskConfig,
) -> Option<(PriceTriggerKind, String)> {
    let (signal_stop, signal_target) = signal_prices;

    if let Some(stop) = signal_stop
        && holding.current_price <= stop
    {
        return Some((
            PriceTriggerKind::StopLoss,
            format!(
                "signal stop-loss hit ({stop} won): current price {} won",
                holding.current_price
            ),
        ));
    }

    if let Some(target) = signal_target
        && holding.current_price >= target
    {
        return Some((
            PriceTriggerKind::TakeProfit,
            format!(
                "signal target reached ({target} won): current price {} won",
                holding.current_price
            ),
        ));
    }

    if holding.profit_rate <= -config.stop_loss_pct {
        return Some((
            PriceTriggerKind::StopLoss,
            format!(
                "percent stop-loss (-{}%): {:+.2}%",
                config.stop_loss_pct, holding.profit_rate
            ),
        ));
    }

    if holding.profit_rate >= config.take_profit_pct {
        return Some((
            PriceTriggerKind::TakeProfit,
            format!(
                "percent take-profit ({}%): {:+.2}%",
                config.take_profit_pct, holding.profit_rate
            ),
        ));
    }

    None
}

/// Technical deterioration check (step 4) on a fresh scan result.
/// `threshold` is the 1..=10 subscore at or below which a sell review fires.
pub fn technical_trigger(
    scan: &ScanResult,
    threshold: i64,
) -> Option<(PriceTriggerKind, String)> {
    let subscore = scan.technical_subscore();
    if subscore <= threshold {
        return Some((
            PriceTriggerKind::Technical,
            format!(
                "technical deterioration: score {subscore}/10 (composite {}/100)",
                scan.composite_score
            ),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signals::{IndicatorSnapshot, ScanAction};
    use chrono::TimeZone;

    fn holding(avg: i64, current: i64) -> Holding {
        Holding {
            symbol: "005930".to_string(),
            name: "Samsung Electronics".to_string(),
            quantity: 100,
            avg_price: avg,
            current_price: current,
            evaluation: 100 * current,
            profit_loss: 100 * (current - avg),
            profit_rate: (current - avg) as f64 / avg as f64 * 100.0,
        }
    }

    fn scan_with_score(score: i64) -> ScanResult {
        ScanResult {
            symbol: "005930".to_string(),
            company_name: "Samsung Electronics".to_string(),
            indicators: IndicatorSnapshot::empty("005930"),
            triggers: Vec::new(),
            composite_score: score,
            bullish_count: 0,
            bearish_count: 0,
            neutral_count: 42,
            action: ScanAction::Hold,
            scanned_at: chrono::FixedOffset::east_opt(9 * 3600)
                .unwrap()
                .with_ymd_and_hms(2026, 8, 3, 10, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_signal_stop_loss_wins_first() {
        // Scenario: holding at 44,000 against an active signal stop of 45,000.
        let h = holding(50_000, 44_000);
        let (kind, reason) =
            evaluate_price_triggers(&h, (Some(45_000), Some(60_000)), &RiskConfig::default())
                .unwrap();
        assert_eq!(kind, PriceTriggerKind::StopLoss);
        assert!(reason.contains("45000"));
    }

    #[test]
    fn test_signal_target_before_percent_fallback() {
        let h = holding(50_000, 61_000);
        let (kind, reason) =
            evaluate_price_triggers(&h, (Some(45_000), Some(60_000)), &RiskConfig::default())
                .unwrap();
        assert_eq!(kind, PriceTriggerKind::TakeProfit);
        assert!(reason.contains("signal target"));
    }

    #[test]
    fn test_percent_fallback_without_signal_prices() {
        // -6% breaches the default 5% stop.
        let h = holding(50_000, 47_000);
        let (kind, _) = evaluate_price_triggers(&h, (None, None), &RiskConfig::default()).unwrap();
        assert_eq!(kind, PriceTriggerKind::StopLoss);

        // +11% breaches the default 10% take-profit.
        let h = holding(50_000, 55_500);
        let (kind, _) = evaluate_price_triggers(&h, (None, None), &RiskConfig::default()).unwrap();
        assert_eq!(kind, PriceTriggerKind::TakeProfit);

        // +2% triggers nothing.
        let h = holding(50_000, 51_000);
        assert!(evaluate_price_triggers(&h, (None, None), &RiskConfig::default()).is_none());
    }

    #[test]
    fn test_technical_trigger_threshold() {
        assert!(technical_trigger(&scan_with_score(30), 3).is_some());
        assert!(technical_trigger(&scan_with_score(39), 3).is_some());
        assert!(technical_trigger(&scan_with_score(40), 3).is_none());
        assert!(technical_trigger(&scan_with_score(80), 3).is_none());
        // A stricter configured threshold widens the net.
        assert!(technical_trigger(&scan_with_score(45), 4).is_some());
    }
}
