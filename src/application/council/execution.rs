//! Execution pipeline: owns the signal lifecycle from creation to a
//! terminal state.
//!
//! Lifecycle: PENDING -> APPROVED -> EXECUTED, with QUEUED as the
//! session-closed / broker-failure detour and REJECTED / EXPIRED as the
//! terminal failure states. Every transition is written through the signal
//! store; the in-memory pending/queued lists are caches rebuilt from the
//! store on startup.

use crate::application::council::risk_gate::{self, RiskConfig};
use crate::domain::council::{InvestmentSignal, SignalAction, SignalStatus, TriggerSource};
use crate::domain::events::TradingEvent;
use crate::domain::market::{OrderSide, OrderType};
use crate::domain::ports::{BrokerService, Clock, NamedLock};
use crate::domain::repositories::{NewSignalRow, SignalRepository, SignalRow};
use crate::domain::calendar::MarketCalendar;
use crate::infrastructure::event_bus::EventBus;
use anyhow::Result;
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

const QUEUE_LOCK_TTL_SECONDS: i64 = 300;
const PENDING_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub trading_enabled: bool,
    pub auto_execute: bool,
    pub respect_trading_hours: bool,
    pub min_confidence: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            trading_enabled: true,
            auto_execute: false,
            respect_trading_hours: true,
            min_confidence: 0.6,
        }
    }
}

pub struct ExecutionPipeline {
    broker: Arc<dyn BrokerService>,
    repository: Arc<dyn SignalRepository>,
    locks: Arc<dyn NamedLock>,
    calendar: MarketCalendar,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    risk_config: RiskConfig,
    config: ExecutionConfig,
    pending: RwLock<Vec<InvestmentSignal>>,
    queued: RwLock<Vec<InvestmentSignal>>,
}

impl ExecutionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: Arc<dyn BrokerService>,
        repository: Arc<dyn SignalRepository>,
        locks: Arc<dyn NamedLock>,
        calendar: MarketCalendar,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        risk_config: RiskConfig,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            broker,
            repository,
            locks,
            calendar,
            clock,
            event_bus,
            risk_config,
            config,
            pending: RwLock::new(Vec::new()),
            queued: RwLock::new(Vec::new()),
        }
    }

    pub fn risk_config(&self) -> &RiskConfig {
        &self.risk_config
    }

    pub async fn pending_signals(&self) -> Vec<InvestmentSignal> {
        self.pending.read().await.clone()
    }

    pub async fn queued_signals(&self) -> Vec<InvestmentSignal> {
        self.queued.read().await.clone()
    }

    fn session_allows_execution(&self) -> (bool, &'static str) {
        if !self.config.respect_trading_hours {
            return (true, "trading-hours check disabled");
        }
        self.calendar.can_execute(self.clock.now())
    }

    /// Route a freshly built signal: submit, queue, or park for approval.
    /// Persists the row (assigning `db_id`) and publishes the lifecycle
    /// events.
    pub async fn route_new(
        &self,
        mut signal: InvestmentSignal,
        trigger_source: TriggerSource,
        trigger_details: Option<serde_json::Value>,
    ) -> InvestmentSignal {
        let actionable = signal.action != SignalAction::Hold && signal.suggested_quantity > 0;
        let auto = self.config.trading_enabled
            && self.config.auto_execute
            && signal.confidence >= self.config.min_confidence;

        if actionable && auto && signal.status == SignalStatus::Pending {
            let (can_trade, session_reason) = self.session_allows_execution();
            if can_trade {
                self.try_submit(&mut signal, SignalStatus::AutoExecuted).await;
            } else {
                info!(
                    "Execution: {} {} waiting for session open ({session_reason})",
                    signal.symbol, signal.action
                );
                signal.status = SignalStatus::Queued;
            }
        }

        self.persist_new(&mut signal, trigger_source, trigger_details).await;

        match signal.status {
            SignalStatus::Queued => self.queued.write().await.push(signal.clone()),
            SignalStatus::Pending if actionable => {
                self.pending.write().await.push(signal.clone())
            }
            _ => {}
        }

        self.event_bus
            .publish(TradingEvent::SignalCreated(signal.clone()))
            .await;
        if signal.status == SignalStatus::AutoExecuted {
            self.event_bus
                .publish(TradingEvent::SignalExecuted(signal.clone()))
                .await;
        }
        if signal.status == SignalStatus::Rejected {
            self.event_bus
                .publish(TradingEvent::SignalRejected(signal.clone()))
                .await;
        }

        signal
    }

    /// Persist a signal that was blocked before routing (gate failure or
    /// data-quality discard).
    pub async fn persist_rejected(
        &self,
        mut signal: InvestmentSignal,
        trigger_source: TriggerSource,
        reason: &str,
    ) -> InvestmentSignal {
        signal.status = SignalStatus::Rejected;
        signal.consensus_reason = format!("{} | blocked: {reason}", signal.consensus_reason);
        self.persist_new(&mut signal, trigger_source, None).await;
        self.event_bus
            .publish(TradingEvent::SignalRejected(signal.clone()))
            .await;
        signal
    }

    /// Approve a pending signal and re-enter the routing branch.
    pub async fn approve(&self, signal_id: &str) -> Option<InvestmentSignal> {
        let mut signal = self.take_pending(signal_id, SignalStatus::Pending).await?;
        signal.status = SignalStatus::Approved;
        info!("Execution: signal approved: {} {}", signal.symbol, signal.action);
        self.update_row(&signal).await;
        self.event_bus
            .publish(TradingEvent::SignalApproved(signal.clone()))
            .await;

        if signal.action != SignalAction::Hold {
            let (can_trade, session_reason) = self.session_allows_execution();
            if can_trade {
                if self.try_submit(&mut signal, SignalStatus::Executed).await {
                    self.update_row(&signal).await;
                    self.event_bus
                        .publish(TradingEvent::SignalExecuted(signal.clone()))
                        .await;
                } else if signal.status == SignalStatus::Rejected {
                    // Gate block on an approved buy is terminal, never queued.
                    self.update_row(&signal).await;
                    self.event_bus
                        .publish(TradingEvent::SignalRejected(signal.clone()))
                        .await;
                } else {
                    signal.status = SignalStatus::Queued;
                    self.update_row(&signal).await;
                    self.queued.write().await.push(signal.clone());
                }
            } else {
                info!(
                    "Execution: approved {} outside trading hours, queueing ({session_reason})",
                    signal.symbol
                );
                signal.status = SignalStatus::Queued;
                self.update_row(&signal).await;
                self.queued.write().await.push(signal.clone());
            }
        }

        Some(signal)
    }

    /// Reject a pending signal (terminal).
    pub async fn reject(&self, signal_id: &str) -> Option<InvestmentSignal> {
        let mut signal = self.take_pending(signal_id, SignalStatus::Pending).await?;
        signal.status = SignalStatus::Rejected;
        info!("Execution: signal rejected: {}", signal.symbol);
        self.update_row(&signal).await;
        self.event_bus
            .publish(TradingEvent::SignalRejected(signal.clone()))
            .await;
        Some(signal)
    }

    /// Drain the execution queue. Invoked by the scheduler once the session
    /// is tradeable. Per-signal locks plus the store's atomic claim give
    /// at-most-once submission across workers and restarts.
    pub async fn process_queue(&self) -> Vec<InvestmentSignal> {
        let (can_trade, _) = self.session_allows_execution();
        if !can_trade {
            debug!("Execution: market closed, skipping queue drain");
            return Vec::new();
        }

        let rows = match self.repository.queued().await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Execution: queued-signal query failed: {e}");
                return Vec::new();
            }
        };
        if rows.is_empty() {
            return Vec::new();
        }

        let mut executed = Vec::new();
        for row in rows {
            let lock_key = format!("council_queue:processing:{}", row.id);
            if !self.locks.acquire(&lock_key, QUEUE_LOCK_TTL_SECONDS) {
                info!("Execution: signal {} already being processed, skipping", row.id);
                continue;
            }

            let outcome = self.drain_one(&row).await;
            self.locks.release(&lock_key);

            if let Some(signal) = outcome {
                executed.push(signal);
            }
        }

        if !executed.is_empty() {
            info!("Execution: queue drain executed {} signal(s)", executed.len());
        }
        executed
    }

    async fn drain_one(&self, row: &SignalRow) -> Option<InvestmentSignal> {
        // Fresh read: another worker or a restart may have settled this row.
        match self.repository.get(row.id).await {
            Ok(Some(current)) if !current.is_executed => {}
            Ok(_) => {
                info!("Execution: signal {} already executed, skipping", row.id);
                self.remove_queued_by_db_id(row.id).await;
                return None;
            }
            Err(e) => {
                error!("Execution: re-read of signal {} failed: {e}", row.id);
                return None;
            }
        }

        let action = SignalAction::parse(&row.signal_type)?;

        // BUY signals re-run the gates against the balance of *this* moment.
        if action == SignalAction::Buy {
            let gate = risk_gate::check_buy_gates(
                &self.broker,
                &self.risk_config,
                &row.symbol,
                row.suggested_amount,
                Some(row.id),
            )
            .await;
            if gate.blocked {
                let reason = if gate.gate_name == "B" {
                    "insufficient_cash"
                } else {
                    gate.gate_name
                };
                warn!(
                    "Execution: queued buy {} blocked at drain time ({reason}): {}",
                    row.symbol, gate.reason
                );
                if let Err(e) = self
                    .repository
                    .update_status(row.id, SignalStatus::Rejected.as_str(), false)
                    .await
                {
                    error!("Execution: reject update for {} failed: {e}", row.id);
                }
                self.remove_queued_by_db_id(row.id).await;
                return None;
            }
        }

        let side = if action == SignalAction::Buy {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };

        match self
            .broker
            .place_order(&row.symbol, side, row.quantity, 0, OrderType::Market)
            .await
        {
            Ok(result) if result.status == crate::domain::market::OrderOutcome::Submitted => {
                let claimed = self
                    .repository
                    .claim_for_execution(row.id, SignalStatus::AutoExecuted.as_str())
                    .await
                    .unwrap_or(false);
                if !claimed {
                    warn!(
                        "Execution: signal {} was claimed concurrently after submit",
                        row.id
                    );
                }

                let mut signal = signal_from_row(row);
                signal.status = SignalStatus::AutoExecuted;
                signal.executed_at = Some(self.clock.now());
                info!(
                    "Execution: queued signal executed: {} {} x {} (order {})",
                    row.symbol,
                    row.signal_type,
                    row.quantity,
                    result.order_no.as_deref().unwrap_or("-")
                );
                self.remove_queued_by_db_id(row.id).await;
                self.event_bus
                    .publish(TradingEvent::SignalExecuted(signal.clone()))
                    .await;
                Some(signal)
            }
            Ok(result) => {
                warn!(
                    "Execution: queued order for {} not accepted: {}",
                    row.symbol, result.message
                );
                None
            }
            Err(e) => {
                // Transient failure: the row stays queued for the next cycle.
                error!("Execution: queued order for {} failed: {e}", row.symbol);
                None
            }
        }
    }

    /// Rebuild the in-memory lists from the store after a restart. Rows keep
    /// their persisted status; anything else is reclassified under the
    /// current auto-execute policy.
    pub async fn restore(&self) -> Result<(usize, usize)> {
        let rows = self.repository.restorable(50).await?;

        let mut restored_queued = 0usize;
        let mut restored_pending = 0usize;

        for row in rows {
            if row.quantity <= 0 || row.signal_type == "hold" {
                continue;
            }
            let mut signal = signal_from_row(&row);

            match SignalStatus::parse(&row.signal_status) {
                Some(SignalStatus::Queued) => {
                    signal.status = SignalStatus::Queued;
                    self.queued.write().await.push(signal);
                    restored_queued += 1;
                }
                Some(SignalStatus::Pending) => {
                    signal.status = SignalStatus::Pending;
                    self.pending.write().await.push(signal);
                    restored_pending += 1;
                }
                _ => {
                    if self.config.auto_execute && signal.confidence >= self.config.min_confidence {
                        signal.status = SignalStatus::Queued;
                        self.queued.write().await.push(signal);
                        restored_queued += 1;
                    } else {
                        signal.status = SignalStatus::Pending;
                        self.pending.write().await.push(signal);
                        restored_pending += 1;
                    }
                }
            }
        }

        if restored_queued > 0 || restored_pending > 0 {
            info!(
                "Execution: restored unexecuted signals: {restored_queued} queued, \
                 {restored_pending} pending"
            );
        } else {
            info!("Execution: no unexecuted signals to restore");
        }
        Ok((restored_queued, restored_pending))
    }

    /// Move pending signals older than 24 h to EXPIRED.
    pub async fn expire_stale(&self) -> usize {
        let cutoff = self.clock.now() - Duration::hours(PENDING_EXPIRY_HOURS);
        let expired_ids = match self.repository.expire_pending_before(cutoff).await {
            Ok(ids) => ids,
            Err(e) => {
                error!("Execution: expiry sweep failed: {e}");
                return 0;
            }
        };
        if expired_ids.is_empty() {
            return 0;
        }

        let mut pending = self.pending.write().await;
        pending.retain(|s| {
            let expired = s.db_id.map(|id| expired_ids.contains(&id)).unwrap_or(false)
                || s.created_at < cutoff;
            !expired
        });
        info!("Execution: expired {} stale pending signal(s)", expired_ids.len());
        expired_ids.len()
    }

    // Internal helpers

    async fn try_submit(&self, signal: &mut InvestmentSignal, executed_status: SignalStatus) -> bool {
        if signal.action == SignalAction::Buy {
            let gate = risk_gate::check_buy_gates(
                &self.broker,
                &self.risk_config,
                &signal.symbol,
                signal.suggested_amount,
                signal.db_id,
            )
            .await;
            if gate.blocked {
                warn!(
                    "Execution: buy {} blocked by gate {}: {}",
                    signal.symbol, gate.gate_name, gate.reason
                );
                signal.status = SignalStatus::Rejected;
                return false;
            }
        }

        let side = if signal.action == SignalAction::Buy {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };

        match self
            .broker
            .place_order(&signal.symbol, side, signal.suggested_quantity, 0, OrderType::Market)
            .await
        {
            Ok(result) if result.status == crate::domain::market::OrderOutcome::Submitted => {
                signal.status = executed_status;
                signal.executed_at = Some(self.clock.now());
                info!(
                    "Execution: order submitted: {} {} x {} (order {})",
                    signal.symbol,
                    signal.action,
                    signal.suggested_quantity,
                    result.order_no.as_deref().unwrap_or("-")
                );
                true
            }
            Ok(result) => {
                warn!(
                    "Execution: order for {} not accepted, queueing: {}",
                    signal.symbol, result.message
                );
                signal.status = SignalStatus::Queued;
                false
            }
            Err(e) => {
                error!("Execution: order for {} failed, queueing: {e}", signal.symbol);
                signal.status = SignalStatus::Queued;
                false
            }
        }
    }

    async fn persist_new(
        &self,
        signal: &mut InvestmentSignal,
        trigger_source: TriggerSource,
        trigger_details: Option<serde_json::Value>,
    ) {
        // Reason column is capped at 1000 chars; cut on a char boundary.
        let reason: String = signal.consensus_reason.chars().take(1000).collect();
        let row = NewSignalRow {
            symbol: signal.symbol.clone(),
            company_name: signal.company_name.clone(),
            signal_type: signal.action.as_str().to_string(),
            strength: signal.confidence * 100.0,
            source_agent: trigger_source.to_string(),
            reason,
            target_price: signal.target_price,
            stop_loss: signal.stop_loss_price,
            quantity: signal.suggested_quantity,
            signal_status: signal.status.as_str().to_string(),
            trigger_details,
            holding_deadline: signal.holding_deadline,
            quant_score: signal.quant_score,
            fundamental_score: signal.fundamental_score,
            allocation_percent: signal.allocation_percent,
            suggested_amount: signal.suggested_amount,
            is_executed: signal.status == SignalStatus::AutoExecuted,
            created_at: signal.created_at,
        };
        match self.repository.insert(row).await {
            Ok(db_id) => {
                signal.db_id = Some(db_id);
                debug!("Execution: signal persisted: {} (row {db_id})", signal.symbol);
            }
            Err(e) => {
                error!("Execution: persisting signal for {} failed: {e}", signal.symbol);
            }
        }
    }

    async fn update_row(&self, signal: &InvestmentSignal) {
        let Some(db_id) = signal.db_id else {
            return;
        };
        let executed = matches!(
            signal.status,
            SignalStatus::Executed | SignalStatus::AutoExecuted
        );
        if let Err(e) = self
            .repository
            .update_status(db_id, signal.status.as_str(), executed)
            .await
        {
            error!("Execution: status update for row {db_id} failed: {e}");
        }
    }

    async fn take_pending(&self, signal_id: &str, expected: SignalStatus) -> Option<InvestmentSignal> {
        let mut pending = self.pending.write().await;
        let idx = pending
            .iter()
            .position(|s| s.id == signal_id && s.status == expected)?;
        Some(pending.remove(idx))
    }

    async fn remove_queued_by_db_id(&self, db_id: i64) {
        self.queued.write().await.retain(|s| s.db_id != Some(db_id));
    }
}

fn signal_from_row(row: &SignalRow) -> InvestmentSignal {
    InvestmentSignal {
        id: format!("r{}", row.id),
        symbol: row.symbol.clone(),
        company_name: row.company_name.clone(),
        action: SignalAction::parse(&row.signal_type).unwrap_or(SignalAction::Hold),
        allocation_percent: row.allocation_percent,
        suggested_amount: if row.suggested_amount > 0 {
            row.suggested_amount
        } else {
            row.target_price.map(|p| p * row.quantity).unwrap_or(0)
        },
        suggested_quantity: row.quantity,
        target_price: row.target_price,
        stop_loss_price: row.stop_loss,
        current_price: 0,
        quant_summary: String::new(),
        fundamental_summary: String::new(),
        consensus_reason: row.reason.clone(),
        confidence: row.strength / 100.0,
        quant_score: row.quant_score,
        fundamental_score: row.fundamental_score,
        status: SignalStatus::parse(&row.signal_status).unwrap_or(SignalStatus::Pending),
        created_at: row.created_at,
        executed_at: None,
        holding_deadline: row.holding_deadline,
        db_id: Some(row.id),
    }
}
