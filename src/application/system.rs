//! Application root: explicit construction and wiring of every service.
//!
//! There are no process-global singletons; collaborators receive their
//! dependencies by `Arc` from here and tests assemble the same graph with
//! doubles.

use crate::application::council::cost_manager::CostManager;
use crate::application::council::execution::ExecutionPipeline;
use crate::application::council::orchestrator::CouncilOrchestrator;
use crate::application::monitoring::scheduler::MonitoringScheduler;
use crate::application::signals::scanner::SignalScanner;
use crate::config::{Config, Mode};
use crate::domain::calendar::MarketCalendar;
use crate::domain::events::LoggingListener;
use crate::domain::ports::{AnalystPanel, BrokerService, Clock, ExpiringSet, NamedLock};
use crate::domain::repositories::SignalRepository;
use crate::infrastructure::analysts::{LlmAnalystPanel, ScriptedAnalystPanel};
use crate::infrastructure::broker::kis::KisRestClient;
use crate::infrastructure::broker::mock::MockBroker;
use crate::infrastructure::cache::{TtlLocks, TtlSet};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::persistence::{Database, SqliteSignalRepository};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

pub struct Application {
    pub orchestrator: Arc<CouncilOrchestrator>,
    pub pipeline: Arc<ExecutionPipeline>,
    pub scheduler: Arc<MonitoringScheduler>,
    pub scanner: Arc<SignalScanner>,
    pub cost_manager: Arc<CostManager>,
    pub event_bus: EventBus,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

impl Application {
    pub async fn build(config: Config) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let calendar = MarketCalendar::new().with_extra_holidays(&config.extra_holidays);

        let event_bus = EventBus::new();
        event_bus.subscribe(Arc::new(LoggingListener)).await;

        let database = Database::new(&config.db_url).await?;
        let repository: Arc<dyn SignalRepository> =
            Arc::new(SqliteSignalRepository::new(database.pool.clone()));

        let broker: Arc<dyn BrokerService> = match config.mode {
            Mode::Mock => {
                info!("Application: using the mock broker");
                Arc::new(MockBroker::new())
            }
            Mode::Kis => {
                info!("Application: using the KIS REST broker");
                Arc::new(KisRestClient::new(config.kis_config(), Arc::clone(&clock)))
            }
        };

        let analysts: Arc<dyn AnalystPanel> = match config.mode {
            Mode::Mock => Arc::new(ScriptedAnalystPanel::new(Arc::clone(&clock))),
            Mode::Kis => Arc::new(LlmAnalystPanel::new(
                Arc::clone(&clock),
                config.quant_backend(),
                config.fundamental_backend(),
            )),
        };

        let locks: Arc<dyn NamedLock> = Arc::new(TtlLocks::new(Arc::clone(&clock)));
        let cooldowns: Arc<dyn ExpiringSet> = Arc::new(TtlSet::new(Arc::clone(&clock)));
        let cost_manager = Arc::new(CostManager::new(config.cost_limits(), Arc::clone(&clock)));

        let pipeline = Arc::new(ExecutionPipeline::new(
            Arc::clone(&broker),
            Arc::clone(&repository),
            Arc::clone(&locks),
            calendar.clone(),
            Arc::clone(&clock),
            event_bus.clone(),
            config.risk_config(),
            config.execution_config(),
        ));

        // Crash-safe restoration before anything else runs.
        pipeline.restore().await?;

        let orchestrator = Arc::new(CouncilOrchestrator::new(
            analysts,
            Arc::clone(&broker),
            Arc::clone(&pipeline),
            Arc::clone(&cost_manager),
            Arc::clone(&clock),
            event_bus.clone(),
            config.risk_config(),
            config.council_config(),
        ));

        let scanner = Arc::new(SignalScanner::new(
            Arc::clone(&broker),
            Arc::clone(&clock),
            event_bus.clone(),
        ));

        let scheduler = Arc::new(MonitoringScheduler::new(
            Arc::clone(&orchestrator),
            Arc::clone(&pipeline),
            Arc::clone(&scanner),
            Arc::clone(&broker),
            Arc::clone(&repository),
            Arc::clone(&cost_manager),
            cooldowns,
            locks,
            calendar,
            clock,
            config.risk_config(),
            config.scheduler_config(),
        ));

        let (stop_tx, stop_rx) = watch::channel(false);

        Ok(Self {
            orchestrator,
            pipeline,
            scheduler,
            scanner,
            cost_manager,
            event_bus,
            stop_tx,
            stop_rx,
        })
    }

    /// Spawn the monitoring scheduler. Returns its join handle.
    pub fn start(&self) -> JoinHandle<()> {
        let scheduler = Arc::clone(&self.scheduler);
        let stop_rx = self.stop_rx.clone();
        tokio::spawn(async move {
            scheduler.run(stop_rx).await;
        })
    }

    /// Flip the global stop signal: running jobs finish their current step,
    /// nothing new starts.
    pub fn shutdown(&self) {
        let _ = self.stop_tx.send(true);
        info!("Application: stop signal sent");
    }
}
