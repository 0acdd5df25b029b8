//! Shared wiring for the integration scenarios: the full service graph over
//! the mock broker, the scripted analyst panel, the in-memory signal store
//! and a manual clock.
#![allow(dead_code)]

use counciltrade::application::council::cost_manager::{CostLimits, CostManager};
use counciltrade::application::council::execution::{ExecutionConfig, ExecutionPipeline};
use counciltrade::application::council::orchestrator::{CouncilConfig, CouncilOrchestrator};
use counciltrade::application::council::risk_gate::RiskConfig;
use counciltrade::application::monitoring::scheduler::{MonitoringScheduler, SchedulerConfig};
use counciltrade::application::signals::scanner::SignalScanner;
use counciltrade::domain::calendar::MarketCalendar;
use counciltrade::domain::council::{AnalystOpinion, AnalystRole};
use counciltrade::domain::events::{EventListener, TradingEvent};
use counciltrade::domain::market::{Balance, Holding};
use counciltrade::domain::ports::{AnalystPanel, BrokerService, Clock, ExpiringSet, NamedLock};
use counciltrade::domain::repositories::SignalRepository;
use counciltrade::infrastructure::analysts::ScriptedAnalystPanel;
use counciltrade::infrastructure::broker::mock::MockBroker;
use counciltrade::infrastructure::cache::{TtlLocks, TtlSet};
use counciltrade::infrastructure::clock::ManualClock;
use counciltrade::infrastructure::event_bus::EventBus;
use counciltrade::infrastructure::persistence::InMemorySignalRepository;
use std::sync::{Arc, Mutex};

/// Event listener recording topics in publish order.
pub struct RecordingListener {
    topics: Mutex<Vec<&'static str>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self {
            topics: Mutex::new(Vec::new()),
        }
    }

    pub fn topics(&self) -> Vec<&'static str> {
        self.topics.lock().unwrap().clone()
    }

    pub fn count_of(&self, topic: &str) -> usize {
        self.topics.lock().unwrap().iter().filter(|t| **t == topic).count()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &TradingEvent) {
        self.topics.lock().unwrap().push(event.topic());
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub broker: Arc<MockBroker>,
    pub repository: Arc<InMemorySignalRepository>,
    pub analysts: Arc<ScriptedAnalystPanel>,
    pub pipeline: Arc<ExecutionPipeline>,
    pub orchestrator: Arc<CouncilOrchestrator>,
    pub scheduler: Arc<MonitoringScheduler>,
    pub cooldowns: Arc<TtlSet>,
    pub locks: Arc<TtlLocks>,
    pub events: Arc<RecordingListener>,
    pub event_bus: EventBus,
}

pub struct HarnessOptions {
    pub auto_execute: bool,
    pub min_confidence: f64,
    pub analyst_timeout_seconds: u64,
    pub scheduler: SchedulerConfig,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            auto_execute: true,
            min_confidence: 0.6,
            analyst_timeout_seconds: 60,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Harness {
    /// Default harness: Monday 2026-08-03 10:00 KST, regular session open.
    pub async fn build() -> Self {
        Self::build_with(HarnessOptions::default()).await
    }

    pub async fn build_with(options: HarnessOptions) -> Self {
        let clock = Arc::new(ManualClock::at(2026, 8, 3, 10, 0));
        let broker = Arc::new(MockBroker::new());
        let repository = Arc::new(InMemorySignalRepository::new());
        let analysts = Arc::new(ScriptedAnalystPanel::new(
            Arc::clone(&clock) as Arc<dyn Clock>
        ));
        let locks = Arc::new(TtlLocks::new(Arc::clone(&clock) as Arc<dyn Clock>));
        let cooldowns = Arc::new(TtlSet::new(Arc::clone(&clock) as Arc<dyn Clock>));
        let cost_manager = Arc::new(CostManager::new(
            CostLimits::default(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        ));
        let calendar = MarketCalendar::new();
        let event_bus = EventBus::new();
        let events = Arc::new(RecordingListener::new());
        event_bus
            .subscribe(Arc::clone(&events) as Arc<dyn EventListener>)
            .await;

        let execution_config = ExecutionConfig {
            trading_enabled: true,
            auto_execute: options.auto_execute,
            respect_trading_hours: true,
            min_confidence: options.min_confidence,
        };

        let pipeline = Arc::new(ExecutionPipeline::new(
            Arc::clone(&broker) as Arc<dyn BrokerService>,
            Arc::clone(&repository) as Arc<dyn SignalRepository>,
            Arc::clone(&locks) as Arc<dyn NamedLock>,
            calendar.clone(),
            Arc::clone(&clock) as Arc<dyn Clock>,
            event_bus.clone(),
            RiskConfig::default(),
            execution_config,
        ));

        let orchestrator = Arc::new(CouncilOrchestrator::new(
            Arc::clone(&analysts) as Arc<dyn AnalystPanel>,
            Arc::clone(&broker) as Arc<dyn BrokerService>,
            Arc::clone(&pipeline),
            Arc::clone(&cost_manager),
            Arc::clone(&clock) as Arc<dyn Clock>,
            event_bus.clone(),
            RiskConfig::default(),
            CouncilConfig {
                analyst_timeout_seconds: options.analyst_timeout_seconds,
                sell_threshold: 3,
            },
        ));

        let scanner = Arc::new(SignalScanner::new(
            Arc::clone(&broker) as Arc<dyn BrokerService>,
            Arc::clone(&clock) as Arc<dyn Clock>,
            event_bus.clone(),
        ));

        let scheduler = Arc::new(MonitoringScheduler::new(
            Arc::clone(&orchestrator),
            Arc::clone(&pipeline),
            scanner,
            Arc::clone(&broker) as Arc<dyn BrokerService>,
            Arc::clone(&repository) as Arc<dyn SignalRepository>,
            cost_manager,
            Arc::clone(&cooldowns) as Arc<dyn ExpiringSet>,
            Arc::clone(&locks) as Arc<dyn NamedLock>,
            calendar,
            Arc::clone(&clock) as Arc<dyn Clock>,
            RiskConfig::default(),
            options.scheduler,
        ));

        Self {
            clock,
            broker,
            repository,
            analysts,
            pipeline,
            orchestrator,
            scheduler,
            cooldowns,
            locks,
            events,
            event_bus,
        }
    }

    /// Balance used by most scenarios: 10M cash, 20M of positions.
    pub async fn fund_account(&self) {
        self.broker
            .set_balance(Balance {
                total_deposit: 10_000_000,
                available_amount: 10_000_000,
                total_purchase: 20_000_000,
                total_evaluation: 20_000_000,
                total_profit_loss: 0,
                profit_rate: 0.0,
            })
            .await;
    }

    /// Script the five analyst turns of a standard successful buy council.
    pub fn script_buy_council(&self) {
        self.analysts.push_opinion(
            AnalystRole::GptQuant,
            AnalystOpinion::Quant {
                score: 8,
                suggested_percent: 30.0,
                target_price: Some(80_000),
                stop_loss: Some(65_000),
            },
            "Volume regime and AVWAP position both favour entry.",
        );
        self.analysts.push_opinion(
            AnalystRole::ClaudeFundamental,
            AnalystOpinion::Fundamental {
                score: 7,
                suggested_percent: 25.0,
            },
            "Earnings trajectory supports a position.",
        );
        self.analysts.push_opinion(
            AnalystRole::GptQuant,
            AnalystOpinion::Quant {
                score: 8,
                suggested_percent: 30.0,
                target_price: Some(80_000),
                stop_loss: Some(65_000),
            },
            "Holding my read after the fundamental case.",
        );
        self.analysts.push_opinion(
            AnalystRole::ClaudeFundamental,
            AnalystOpinion::Fundamental {
                score: 7,
                suggested_percent: 25.0,
            },
            "No change after the quant response.",
        );
        self.analysts.push_opinion(
            AnalystRole::Moderator,
            AnalystOpinion::Consensus {
                suggested_percent: 28.0,
                holding_days: 14,
            },
            "Splitting the difference toward the quant case.",
        );
    }
}

pub fn holding(symbol: &str, name: &str, quantity: i64, avg: i64, current: i64) -> Holding {
    Holding {
        symbol: symbol.to_string(),
        name: name.to_string(),
        quantity,
        avg_price: avg,
        current_price: current,
        evaluation: quantity * current,
        profit_loss: quantity * (current - avg),
        profit_rate: (current - avg) as f64 / avg as f64 * 100.0,
    }
}
