//! Execution pipeline scenarios: session-aware routing, gate blocks, the
//! queue drainer's idempotency and crash-safe restoration.

mod common;

use common::{Harness, HarnessOptions};
use counciltrade::application::council::execution::{ExecutionConfig, ExecutionPipeline};
use counciltrade::application::council::orchestrator::MeetingRequest;
use counciltrade::application::council::risk_gate::RiskConfig;
use counciltrade::domain::calendar::MarketCalendar;
use counciltrade::domain::council::{SignalStatus, TriggerSource};
use counciltrade::domain::market::Balance;
use counciltrade::domain::ports::{BrokerService, Clock, NamedLock};
use counciltrade::domain::repositories::SignalRepository;
use counciltrade::infrastructure::broker::mock::MockBroker;
use std::sync::Arc;

fn quant_meeting_request(symbol: &str) -> MeetingRequest {
    MeetingRequest {
        symbol: symbol.to_string(),
        company_name: "SK hynix".to_string(),
        title: "Quant buy signal: strong_buy (score 82/100)".to_string(),
        trigger_score: 8,
        available_amount: 5_000_000,
        current_price: 200_000,
        trigger_source: TriggerSource::Quant,
        quant_triggers: None,
    }
}

#[tokio::test]
async fn test_quant_buy_outside_session_is_queued_then_drained_at_open() {
    // Scenario: meeting completes Friday 21:00; the signal waits in the
    // queue and is submitted at Monday open against the current balance.
    let h = Harness::build().await;
    h.clock.set_to(2026, 7, 31, 21, 0);
    h.fund_account().await;
    h.broker
        .set_daily_prices("000660", MockBroker::trending_bars(260, 195_000, 20))
        .await;
    h.script_buy_council();

    let meeting = h.orchestrator.start_meeting(quant_meeting_request("000660")).await;
    let signal = meeting.signal.unwrap();
    assert_eq!(signal.status, SignalStatus::Queued);
    assert_eq!(h.broker.order_count().await, 0);

    // Nothing drains while the market stays closed.
    assert!(h.pipeline.process_queue().await.is_empty());

    // Monday 09:00: the drainer re-validates the gates and submits.
    h.clock.set_to(2026, 8, 3, 9, 0);
    let executed = h.pipeline.process_queue().await;
    assert_eq!(executed.len(), 1);
    assert_eq!(executed[0].status, SignalStatus::AutoExecuted);
    assert_eq!(h.broker.order_count().await, 1);

    let row = h.repository.get(signal.db_id.unwrap()).await.unwrap().unwrap();
    assert!(row.is_executed);
    assert_eq!(row.signal_status, "auto_executed");

    // A second drain pass finds nothing left.
    assert!(h.pipeline.process_queue().await.is_empty());
    assert_eq!(h.broker.order_count().await, 1);
}

#[tokio::test]
async fn test_gate_b_blocks_before_any_order() {
    // Scenario: 3.2M available, no positions; a 3.0M buy leaves less than
    // the 10% reserve, so the signal is rejected without a broker call.
    let h = Harness::build().await;
    h.broker
        .set_balance(Balance {
            available_amount: 3_200_000,
            total_evaluation: 0,
            ..Default::default()
        })
        .await;
    h.broker
        .set_daily_prices("005930", MockBroker::trending_bars(260, 68_000, 10))
        .await;
    h.script_buy_council();

    let meeting = h
        .orchestrator
        .start_meeting(MeetingRequest {
            symbol: "005930".to_string(),
            company_name: "Samsung Electronics".to_string(),
            title: "Strong earnings surprise".to_string(),
            trigger_score: 9,
            // 28% consensus over ~10.7M -> 3.0M suggested.
            available_amount: 10_714_285,
            current_price: 70_000,
            trigger_source: TriggerSource::News,
            quant_triggers: None,
        })
        .await;

    let signal = meeting.signal.unwrap();
    assert_eq!(signal.status, SignalStatus::Rejected);
    assert_eq!(h.broker.order_count().await, 0);
    assert_eq!(h.events.count_of("signal.rejected"), 1);
}

#[tokio::test]
async fn test_drain_rejects_buy_when_cash_ran_out() {
    // Queued over the weekend, but the cash was spent elsewhere by Monday:
    // the drainer rejects with insufficient cash instead of submitting.
    let h = Harness::build().await;
    h.clock.set_to(2026, 7, 31, 21, 0);
    h.fund_account().await;
    h.broker
        .set_daily_prices("000660", MockBroker::trending_bars(260, 195_000, 20))
        .await;
    h.script_buy_council();

    let meeting = h.orchestrator.start_meeting(quant_meeting_request("000660")).await;
    let db_id = meeting.signal.unwrap().db_id.unwrap();

    h.broker
        .set_balance(Balance {
            available_amount: 500_000,
            total_evaluation: 0,
            ..Default::default()
        })
        .await;
    h.clock.set_to(2026, 8, 3, 9, 0);

    let executed = h.pipeline.process_queue().await;
    assert!(executed.is_empty());
    assert_eq!(h.broker.order_count().await, 0);
    let row = h.repository.get(db_id).await.unwrap().unwrap();
    assert_eq!(row.signal_status, "rejected");
}

#[tokio::test]
async fn test_broker_failure_routes_to_queue_and_retries() {
    // A transient broker error during an open session queues the signal
    // instead of dropping it; the next drain cycle retries.
    let h = Harness::build().await;
    h.fund_account().await;
    h.broker
        .set_daily_prices("005930", MockBroker::trending_bars(260, 68_000, 10))
        .await;
    h.script_buy_council();
    h.broker.fail_orders().await;

    let meeting = h
        .orchestrator
        .start_meeting(MeetingRequest {
            symbol: "005930".to_string(),
            company_name: "Samsung Electronics".to_string(),
            title: "Large foundry order announced".to_string(),
            trigger_score: 9,
            available_amount: 5_000_000,
            current_price: 70_000,
            trigger_source: TriggerSource::News,
            quant_triggers: None,
        })
        .await;
    let signal = meeting.signal.unwrap();
    assert_eq!(signal.status, SignalStatus::Queued);

    h.broker.accept_orders().await;
    let executed = h.pipeline.process_queue().await;
    assert_eq!(executed.len(), 1);
    assert_eq!(h.broker.order_count().await, 1);
}

#[tokio::test]
async fn test_concurrent_drainers_submit_at_most_once() {
    // Scenario: one queued signal, two workers draining simultaneously.
    // The per-signal lock plus the store's execution claim allow exactly
    // one PlaceOrder.
    let h = Harness::build().await;
    h.clock.set_to(2026, 7, 31, 21, 0);
    h.fund_account().await;
    h.broker
        .set_daily_prices("000660", MockBroker::trending_bars(260, 195_000, 20))
        .await;
    h.script_buy_council();
    h.orchestrator.start_meeting(quant_meeting_request("000660")).await;

    // Second worker: an independent pipeline over the same store, broker
    // and lock service.
    let second_worker = Arc::new(ExecutionPipeline::new(
        Arc::clone(&h.broker) as Arc<dyn BrokerService>,
        Arc::clone(&h.repository) as Arc<dyn SignalRepository>,
        Arc::clone(&h.locks) as Arc<dyn NamedLock>,
        MarketCalendar::new(),
        Arc::clone(&h.clock) as Arc<dyn Clock>,
        h.event_bus.clone(),
        RiskConfig::default(),
        ExecutionConfig {
            trading_enabled: true,
            auto_execute: true,
            respect_trading_hours: true,
            min_confidence: 0.6,
        },
    ));

    h.clock.set_to(2026, 8, 3, 9, 0);
    let first = Arc::clone(&h.pipeline);
    let (a, b) = tokio::join!(first.process_queue(), second_worker.process_queue());

    assert_eq!(a.len() + b.len(), 1, "exactly one worker wins the signal");
    assert_eq!(h.broker.order_count().await, 1);
}

#[tokio::test]
async fn test_restore_rebuilds_lists_from_the_store() {
    // Persist a queued signal, then rebuild a fresh pipeline from the same
    // store: the lists come back as persisted.
    let h = Harness::build().await;
    h.clock.set_to(2026, 7, 31, 21, 0);
    h.fund_account().await;
    h.broker
        .set_daily_prices("000660", MockBroker::trending_bars(260, 195_000, 20))
        .await;
    h.script_buy_council();
    h.orchestrator.start_meeting(quant_meeting_request("000660")).await;

    let before_queued = h.pipeline.queued_signals().await;
    assert_eq!(before_queued.len(), 1);

    let restored = Arc::new(ExecutionPipeline::new(
        Arc::clone(&h.broker) as Arc<dyn BrokerService>,
        Arc::clone(&h.repository) as Arc<dyn SignalRepository>,
        Arc::clone(&h.locks) as Arc<dyn NamedLock>,
        MarketCalendar::new(),
        Arc::clone(&h.clock) as Arc<dyn Clock>,
        h.event_bus.clone(),
        RiskConfig::default(),
        ExecutionConfig {
            trading_enabled: true,
            auto_execute: true,
            respect_trading_hours: true,
            min_confidence: 0.6,
        },
    ));
    let (queued, pending) = restored.restore().await.unwrap();
    assert_eq!(queued, 1);
    assert_eq!(pending, 0);

    let list = restored.queued_signals().await;
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].symbol, before_queued[0].symbol);
    assert_eq!(list[0].suggested_quantity, before_queued[0].suggested_quantity);
    assert_eq!(list[0].db_id, before_queued[0].db_id);
}

#[tokio::test]
async fn test_pending_approval_flow_and_expiry() {
    // Without auto-execute the signal waits for a human; approval submits
    // it, and unattended signals expire after 24h.
    let h = Harness::build_with(HarnessOptions {
        auto_execute: false,
        ..Default::default()
    })
    .await;
    h.fund_account().await;
    h.broker
        .set_daily_prices("005930", MockBroker::trending_bars(260, 68_000, 10))
        .await;
    h.script_buy_council();

    let meeting = h
        .orchestrator
        .start_meeting(MeetingRequest {
            symbol: "005930".to_string(),
            company_name: "Samsung Electronics".to_string(),
            title: "Large foundry order announced".to_string(),
            trigger_score: 9,
            available_amount: 5_000_000,
            current_price: 70_000,
            trigger_source: TriggerSource::News,
            quant_triggers: None,
        })
        .await;
    let signal = meeting.signal.unwrap();
    assert_eq!(signal.status, SignalStatus::Pending);
    assert_eq!(h.broker.order_count().await, 0);

    let approved = h.orchestrator.approve_signal(&signal.id).await.unwrap();
    assert_eq!(approved.status, SignalStatus::Executed);
    assert!(approved.executed_at.is_some());
    assert_eq!(h.broker.order_count().await, 1);
    assert_eq!(h.events.count_of("signal.approved"), 1);
    assert_eq!(h.events.count_of("signal.executed"), 1);

    // A fresh pending signal left unattended for a day expires.
    h.script_buy_council();
    let meeting = h
        .orchestrator
        .start_meeting(MeetingRequest {
            symbol: "035420".to_string(),
            company_name: "Naver".to_string(),
            title: "Commerce spin-off reports".to_string(),
            trigger_score: 9,
            available_amount: 5_000_000,
            current_price: 200_000,
            trigger_source: TriggerSource::News,
            quant_triggers: None,
        })
        .await;
    let stale = meeting.signal.unwrap();

    h.clock.advance_secs(25 * 3600);
    let expired = h.pipeline.expire_stale().await;
    assert_eq!(expired, 1);
    let row = h.repository.get(stale.db_id.unwrap()).await.unwrap().unwrap();
    assert_eq!(row.signal_status, "expired");
    assert!(h.pipeline.pending_signals().await.is_empty());
}

#[tokio::test]
async fn test_reject_is_terminal() {
    let h = Harness::build_with(HarnessOptions {
        auto_execute: false,
        ..Default::default()
    })
    .await;
    h.fund_account().await;
    h.broker
        .set_daily_prices("005930", MockBroker::trending_bars(260, 68_000, 10))
        .await;
    h.script_buy_council();

    let meeting = h
        .orchestrator
        .start_meeting(MeetingRequest {
            symbol: "005930".to_string(),
            company_name: "Samsung Electronics".to_string(),
            title: "Large foundry order announced".to_string(),
            trigger_score: 9,
            available_amount: 5_000_000,
            current_price: 70_000,
            trigger_source: TriggerSource::News,
            quant_triggers: None,
        })
        .await;
    let signal = meeting.signal.unwrap();

    let rejected = h.orchestrator.reject_signal(&signal.id).await.unwrap();
    assert_eq!(rejected.status, SignalStatus::Rejected);
    // No second approval possible.
    assert!(h.orchestrator.approve_signal(&signal.id).await.is_none());
    assert_eq!(h.broker.order_count().await, 0);
}
