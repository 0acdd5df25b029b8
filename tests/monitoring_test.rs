//! Monitoring scheduler scenarios: price-trigger sweeps with cooldowns,
//! holding-deadline escalation, the daily rebalance pass and the scan
//! cross-checks.

mod common;

use common::{Harness, HarnessOptions, holding};
use chrono::Duration;
use counciltrade::application::monitoring::scheduler::SchedulerConfig;
use counciltrade::domain::council::{AnalystOpinion, AnalystRole, TriggerSource};
use counciltrade::domain::ports::Clock;
use counciltrade::domain::repositories::{NewSignalRow, SignalRepository};
use counciltrade::domain::signals::{IndicatorSnapshot, ScanAction, ScanResult};
use counciltrade::infrastructure::broker::mock::MockBroker;

fn active_buy_row(
    symbol: &str,
    stop: Option<i64>,
    target: Option<i64>,
    deadline: Option<chrono::NaiveDate>,
    created_at: chrono::DateTime<chrono::FixedOffset>,
) -> NewSignalRow {
    NewSignalRow {
        symbol: symbol.to_string(),
        company_name: symbol.to_string(),
        signal_type: "buy".to_string(),
        strength: 75.0,
        source_agent: "news".to_string(),
        reason: "council decision".to_string(),
        target_price: target,
        stop_loss: stop,
        quantity: 100,
        signal_status: "pending".to_string(),
        trigger_details: None,
        holding_deadline: deadline,
        quant_score: 8,
        fundamental_score: 7,
        allocation_percent: 20.0,
        suggested_amount: 5_000_000,
        is_executed: false,
        created_at,
    }
}

fn scan_result(symbol: &str, score: i64, action: ScanAction, at: chrono::DateTime<chrono::FixedOffset>) -> ScanResult {
    ScanResult {
        symbol: symbol.to_string(),
        company_name: format!("{symbol} Corp"),
        indicators: IndicatorSnapshot {
            symbol: symbol.to_string(),
            bar_count: 260,
            current_price: 100_000,
            ..Default::default()
        },
        triggers: Vec::new(),
        composite_score: score,
        bullish_count: 10,
        bearish_count: 5,
        neutral_count: 27,
        action,
        scanned_at: at,
    }
}

#[tokio::test]
async fn test_price_sweep_fires_on_signal_stop_loss_once() {
    // Scenario: a holding at 44,000 with an active BUY signal stop of
    // 45,000. The sweep fires one sell meeting, then the cooldown holds
    // the line on the next tick.
    let h = Harness::build().await;
    h.broker
        .set_holdings(vec![holding("005930", "Samsung Electronics", 100, 50_000, 44_000)])
        .await;
    h.broker
        .set_daily_prices("005930", MockBroker::trending_bars(260, 46_000, -10))
        .await;
    h.repository
        .insert(active_buy_row("005930", Some(45_000), Some(80_000), None, h.clock.now()))
        .await
        .unwrap();
    h.analysts.push_opinion(
        AnalystRole::GptQuant,
        AnalystOpinion::Quant {
            score: 3,
            suggested_percent: 100.0,
            target_price: None,
            stop_loss: None,
        },
        "Stop violated, exit.",
    );

    h.scheduler.price_sweep().await;

    let meetings = h.orchestrator.recent_meetings(10).await;
    assert_eq!(meetings.len(), 1);
    assert_eq!(meetings[0].trigger_source, TriggerSource::Sell);
    assert!(meetings[0].trigger_title.contains("stop-loss"));

    // 60 seconds later the cooldown still blocks re-triggering.
    h.clock.advance_secs(60);
    h.scheduler.price_sweep().await;
    assert_eq!(h.orchestrator.recent_meetings(10).await.len(), 1);

    // After the 1800s cooldown the sweep may fire again.
    h.clock.advance_secs(1800);
    h.scheduler.price_sweep().await;
    assert_eq!(h.orchestrator.recent_meetings(10).await.len(), 2);
}

#[tokio::test]
async fn test_price_sweep_skips_outside_session() {
    let h = Harness::build().await;
    h.clock.set_to(2026, 8, 2, 10, 0); // Sunday
    h.broker
        .set_holdings(vec![holding("005930", "Samsung Electronics", 100, 50_000, 44_000)])
        .await;

    h.scheduler.price_sweep().await;
    assert!(h.orchestrator.recent_meetings(10).await.is_empty());
}

#[tokio::test]
async fn test_percent_fallback_take_profit_fires() {
    // No active signal prices; +12% against the default 10% take-profit.
    let h = Harness::build().await;
    h.broker
        .set_holdings(vec![holding("005930", "Samsung Electronics", 100, 50_000, 56_000)])
        .await;
    h.broker
        .set_daily_prices("005930", MockBroker::trending_bars(260, 50_000, 25))
        .await;
    h.analysts.push_opinion(
        AnalystRole::GptQuant,
        AnalystOpinion::Quant {
            score: 7,
            suggested_percent: 40.0,
            target_price: None,
            stop_loss: None,
        },
        "Lock in half.",
    );

    h.scheduler.price_sweep().await;
    let meetings = h.orchestrator.recent_meetings(10).await;
    assert_eq!(meetings.len(), 1);
    assert!(meetings[0].trigger_title.contains("take-profit"));
}

#[tokio::test]
async fn test_deadline_sweep_bypasses_cooldown() {
    // Scenario: the holding deadline expired with the target unreached.
    // Even with a live sell cooldown the deadline path escalates.
    let h = Harness::build().await;
    let yesterday = h.clock.today() - Duration::days(1);
    h.broker
        .set_holdings(vec![holding("005930", "Samsung Electronics", 100, 70_000, 72_000)])
        .await;
    h.broker
        .set_daily_prices("005930", MockBroker::trending_bars(260, 71_000, 5))
        .await;
    h.repository
        .insert(active_buy_row(
            "005930",
            Some(65_000),
            Some(75_000),
            Some(yesterday),
            h.clock.now() - Duration::days(15),
        ))
        .await
        .unwrap();

    // A cooldown that would block the price sweep...
    use counciltrade::domain::ports::ExpiringSet;
    h.cooldowns.insert("sell_monitor:cooldown:005930", 1800);

    // Rebalance pass keeps the position (score 6), then the deadline sweep
    // escalates regardless of the cooldown.
    h.analysts.push_opinion(
        AnalystRole::GptQuant,
        AnalystOpinion::Quant {
            score: 6,
            suggested_percent: 0.0,
            target_price: Some(76_000),
            stop_loss: Some(69_000),
        },
        "Still constructive, but time is up.",
    );
    h.analysts.push_opinion(
        AnalystRole::GptQuant,
        AnalystOpinion::Quant {
            score: 5,
            suggested_percent: 100.0,
            target_price: None,
            stop_loss: None,
        },
        "Deadline exit.",
    );

    h.scheduler.rebalance_and_deadline_sweep().await;

    let meetings = h.orchestrator.recent_meetings(10).await;
    let deadline_meeting = meetings
        .iter()
        .find(|m| m.trigger_title.contains("deadline"))
        .expect("deadline sell meeting fired");
    assert_eq!(deadline_meeting.trigger_source, TriggerSource::Sell);
}

#[tokio::test]
async fn test_deadline_sweep_skips_when_target_reached() {
    let h = Harness::build().await;
    let yesterday = h.clock.today() - Duration::days(1);
    // Current at 76,000 is above the 75,000 target: take-profit owns it.
    h.broker
        .set_holdings(vec![holding("005930", "Samsung Electronics", 100, 70_000, 76_000)])
        .await;
    h.broker
        .set_daily_prices("005930", MockBroker::trending_bars(260, 71_000, 20))
        .await;
    h.repository
        .insert(active_buy_row(
            "005930",
            Some(65_000),
            Some(75_000),
            Some(yesterday),
            h.clock.now() - Duration::days(15),
        ))
        .await
        .unwrap();

    // The rebalance analyst is down, so the stored prices stay as they are
    // and the deadline check sees the original 75,000 target.
    h.analysts.push_failure(AnalystRole::GptQuant, "backend down");

    h.scheduler.rebalance_and_deadline_sweep().await;

    let meetings = h.orchestrator.recent_meetings(10).await;
    assert!(
        !meetings.iter().any(|m| m.trigger_title.contains("deadline")),
        "no deadline meeting when the target was reached"
    );
}

#[tokio::test]
async fn test_rebalance_updates_prices_and_escalates_weak_names() {
    let h = Harness::build().await;
    h.broker
        .set_holdings(vec![holding("005930", "Samsung Electronics", 100, 70_000, 71_000)])
        .await;
    h.broker
        .set_daily_prices("005930", MockBroker::trending_bars(260, 70_000, 4))
        .await;
    let db_id = h
        .repository
        .insert(active_buy_row("005930", Some(65_000), Some(80_000), None, h.clock.now()))
        .await
        .unwrap();

    // Rebalance review scores 2 -> prices refresh, then escalation.
    h.analysts.push_opinion(
        AnalystRole::GptQuant,
        AnalystOpinion::Quant {
            score: 2,
            suggested_percent: 0.0,
            target_price: Some(76_000),
            stop_loss: Some(68_000),
        },
        "Structure broke down.",
    );
    h.analysts.push_opinion(
        AnalystRole::GptQuant,
        AnalystOpinion::Quant {
            score: 3,
            suggested_percent: 60.0,
            target_price: None,
            stop_loss: None,
        },
        "Unwind most of it.",
    );

    h.scheduler.rebalance_and_deadline_sweep().await;

    let row = h.repository.get(db_id).await.unwrap().unwrap();
    assert_eq!(row.target_price, Some(76_000));
    assert_eq!(row.stop_loss, Some(68_000));
    assert!(row.reason.contains("rebalance"));

    let meetings = h.orchestrator.recent_meetings(10).await;
    assert!(
        meetings
            .iter()
            .any(|m| m.trigger_title.contains("weak rebalance score")),
        "weak score escalates to a sell meeting"
    );
}

#[tokio::test]
async fn test_scan_sell_crosscheck_only_fires_for_held_symbols() {
    let h = Harness::build().await;
    h.broker
        .set_holdings(vec![holding("005930", "Samsung Electronics", 100, 50_000, 49_000)])
        .await;
    h.broker
        .set_daily_prices("005930", MockBroker::trending_bars(260, 50_000, -5))
        .await;
    h.analysts.push_opinion(
        AnalystRole::GptQuant,
        AnalystOpinion::Quant {
            score: 3,
            suggested_percent: 100.0,
            target_price: None,
            stop_loss: None,
        },
        "Scan says exit.",
    );

    let now = h.clock.now();
    let results = vec![
        scan_result("005930", 22, ScanAction::StrongSell, now),
        // Not held: must not fire.
        scan_result("000660", 20, ScanAction::StrongSell, now),
    ];

    let fired = h.scheduler.check_sell_results(&results).await;
    assert_eq!(fired, 1);
    let meetings = h.orchestrator.recent_meetings(10).await;
    assert_eq!(meetings.len(), 1);
    assert!(meetings[0].trigger_title.contains("quant scan"));

    // Cooldown: the same symbol cannot fire twice in a row.
    let fired_again = h.scheduler.check_sell_results(&results).await;
    assert_eq!(fired_again, 0);
}

#[tokio::test]
async fn test_scan_buy_crosscheck_convenes_bounded_councils() {
    let options = HarnessOptions {
        scheduler: SchedulerConfig {
            max_buy_meetings_per_scan: 3,
            ..Default::default()
        },
        ..Default::default()
    };
    let h = Harness::build_with(options).await;
    h.fund_account().await;
    // One of the candidates is already held and must be skipped.
    h.broker
        .set_holdings(vec![holding("035420", "Naver", 10, 180_000, 190_000)])
        .await;
    for symbol in ["005930", "000660", "051910", "006400"] {
        h.broker
            .set_daily_prices(symbol, MockBroker::trending_bars(260, 95_000, 30))
            .await;
    }

    let now = h.clock.now();
    let results = vec![
        scan_result("005930", 88, ScanAction::StrongBuy, now),
        scan_result("035420", 85, ScanAction::StrongBuy, now), // held
        scan_result("000660", 82, ScanAction::StrongBuy, now),
        scan_result("051910", 78, ScanAction::Buy, now),
        scan_result("006400", 76, ScanAction::Buy, now),
        scan_result("068270", 60, ScanAction::Hold, now), // below threshold
    ];

    let fired = h.scheduler.check_buy_results(&results).await;
    assert_eq!(fired, 3, "bounded to three meetings per scan");

    let meetings = h.orchestrator.recent_meetings(10).await;
    assert_eq!(meetings.len(), 3);
    assert!(meetings.iter().all(|m| m.trigger_source == TriggerSource::Quant));
    assert!(!meetings.iter().any(|m| m.symbol == "035420"));

    // The per-symbol council cooldown blocks an immediate repeat.
    let fired_again = h.scheduler.check_buy_results(&results).await;
    assert_eq!(fired_again, 0);
}
