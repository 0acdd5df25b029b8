//! Pre-trade gate checks and the action/price policy.
//!
//! Everything here is either pure or touches only the broker port, so the
//! orchestrator and the queue drainer share one implementation. Policy:
//! fail safe. If a gate cannot decide cleanly, the trade is blocked.

use crate::domain::council::{SignalAction, TriggerSource};
use crate::domain::ports::BrokerService;
use std::sync::Arc;
use tracing::{info, warn};

/// Risk policy knobs. Percent fields are whole percents (1.0 == 1%).
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub min_position_pct: f64,
    pub min_cash_reserve_pct: f64,
    pub max_positions: usize,
    pub stop_loss_pct: f64,
    pub min_stop_loss_pct: f64,
    pub max_stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub min_take_profit_pct: f64,
    pub max_take_profit_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            min_position_pct: 1.0,
            min_cash_reserve_pct: 10.0,
            max_positions: 10,
            stop_loss_pct: 5.0,
            min_stop_loss_pct: 3.0,
            max_stop_loss_pct: 10.0,
            take_profit_pct: 10.0,
            min_take_profit_pct: 5.0,
            max_take_profit_pct: 30.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GateResult {
    pub blocked: bool,
    pub reason: String,
    pub gate_name: &'static str,
}

impl GateResult {
    pub fn pass() -> Self {
        Self {
            blocked: false,
            reason: String::new(),
            gate_name: "",
        }
    }

    fn block(gate_name: &'static str, reason: String) -> Self {
        Self {
            blocked: true,
            reason,
            gate_name,
        }
    }
}

/// Triple pre-trade gate for BUY signals.
///
/// Gate A: minimum position size. Gate B: cash reserve after the buy.
/// Gate C: distinct position count (additional buys of a held symbol
/// bypass). Broker errors block with gate name "error".
pub async fn check_buy_gates(
    broker: &Arc<dyn BrokerService>,
    config: &RiskConfig,
    symbol: &str,
    suggested_amount: i64,
    signal_db_id: Option<i64>,
) -> GateResult {
    let (balance, holdings) = match tokio::try_join!(broker.get_balance(), broker.get_holdings()) {
        Ok(pair) => pair,
        Err(e) => {
            let reason = format!("gate evaluation error: {e}");
            warn!(
                gate = "error",
                symbol,
                signal_db_id,
                "buy gates failed to evaluate, blocking: {e}"
            );
            audit_gate_block("gate_block_error", symbol, signal_db_id, &reason);
            return GateResult::block("error", reason);
        }
    };

    let mut total_assets = balance.available_amount + balance.total_evaluation;
    if total_assets <= 0 {
        total_assets = suggested_amount;
    }

    // Gate A: minimum position amount.
    let min_position_amount = (total_assets as f64 * config.min_position_pct / 100.0) as i64;
    if suggested_amount < min_position_amount {
        let reason = format!(
            "Gate A below minimum position: suggested {suggested_amount} < minimum \
             {min_position_amount} (total assets {total_assets} x {}%)",
            config.min_position_pct
        );
        audit_gate_block("gate_block_min_position", symbol, signal_db_id, &reason);
        return GateResult::block("A", reason);
    }

    // Gate B: cash reserve after the buy.
    let cash_after_buy = balance.available_amount - suggested_amount;
    let min_cash = (total_assets as f64 * config.min_cash_reserve_pct / 100.0) as i64;
    if cash_after_buy < min_cash {
        let reason = format!(
            "Gate B cash reserve short: cash after buy {cash_after_buy} < minimum {min_cash} \
             (total assets {total_assets} x {}%)",
            config.min_cash_reserve_pct
        );
        audit_gate_block("gate_block_cash_reserve", symbol, signal_db_id, &reason);
        return GateResult::block("B", reason);
    }

    // Gate C: distinct position cap, bypassed for additional buys.
    let held: Vec<&str> = holdings
        .iter()
        .filter(|h| h.quantity > 0)
        .map(|h| h.symbol.as_str())
        .collect();
    let is_additional_buy = held.contains(&symbol);
    if held.len() >= config.max_positions && !is_additional_buy {
        let reason = format!(
            "Gate C max positions reached: holding {} >= cap {}",
            held.len(),
            config.max_positions
        );
        audit_gate_block("gate_block_max_positions", symbol, signal_db_id, &reason);
        return GateResult::block("C", reason);
    }

    GateResult::pass()
}

/// Data-quality gate: two or more analyst failures in one meeting discard
/// the signal.
pub fn check_data_quality_gate(symbol: &str, failures: usize) -> GateResult {
    if failures >= 2 {
        let reason = format!(
            "data-quality gate: {symbol} had {failures} analyst failures, discarding signal"
        );
        audit_gate_block("gate_block_data_quality", symbol, None, &reason);
        return GateResult::block("data_quality", reason);
    }
    GateResult::pass()
}

fn audit_gate_block(event: &str, symbol: &str, signal_db_id: Option<i64>, reason: &str) {
    warn!(event, symbol, signal_db_id, "{reason}");
}

/// Map the deliberation outcome onto BUY / SELL / HOLD.
pub fn determine_action(
    final_percent: f64,
    quant_score: i64,
    fundamental_score: i64,
    news_score: i64,
    trigger_source: TriggerSource,
) -> SignalAction {
    let avg_score = (quant_score + fundamental_score) as f64 / 2.0;

    if trigger_source == TriggerSource::News && news_score <= 3 {
        info!("action SELL: negative news (score {news_score})");
        return SignalAction::Sell;
    }
    if avg_score <= 4.0 {
        info!("action SELL: weak analyst scores (avg {avg_score:.1})");
        return SignalAction::Sell;
    }
    if final_percent < 0.0 {
        info!("action SELL: council recommends unwinding ({final_percent}%)");
        return SignalAction::Sell;
    }

    // Quant-triggered meetings ignore the news score on purpose.
    if trigger_source == TriggerSource::Quant {
        if final_percent >= 10.0 && avg_score >= 5.5 {
            info!("action BUY [quant]: positive analysis ({final_percent}%, avg {avg_score:.1})");
            return SignalAction::Buy;
        }
        if final_percent >= 15.0 && avg_score >= 5.0 {
            info!("action BUY [quant]: high allocation ({final_percent}%, avg {avg_score:.1})");
            return SignalAction::Buy;
        }
    }

    if trigger_source == TriggerSource::News {
        if final_percent >= 10.0 && avg_score >= 6.0 {
            info!("action BUY: positive analysis ({final_percent}%, avg {avg_score:.1})");
            return SignalAction::Buy;
        }
        if news_score >= 8 && avg_score >= 5.0 {
            info!("action BUY: strong news signal (news {news_score}, avg {avg_score:.1})");
            return SignalAction::Buy;
        }
    }

    info!(
        "action HOLD: thresholds unmet ({final_percent}%, avg {avg_score:.1}, source {trigger_source})"
    );
    SignalAction::Hold
}

/// Clamp the analyst stop-loss into the policy band, defaulting to the
/// standard stop when the analyst gave none. None when the price is unknown.
pub fn clamp_stop_loss(
    analyst_stop: Option<i64>,
    current_price: i64,
    config: &RiskConfig,
) -> Option<i64> {
    if current_price <= 0 {
        return None;
    }
    let lowest = (current_price as f64 * (1.0 - config.max_stop_loss_pct / 100.0)) as i64;
    let highest = (current_price as f64 * (1.0 - config.min_stop_loss_pct / 100.0)) as i64;
    match analyst_stop {
        Some(stop) => Some(stop.clamp(lowest, highest)),
        None => Some((current_price as f64 * (1.0 - config.stop_loss_pct / 100.0)) as i64),
    }
}

/// Clamp the analyst target into the policy band, defaulting to the
/// standard take-profit when the analyst gave none.
pub fn clamp_target_price(
    analyst_target: Option<i64>,
    current_price: i64,
    config: &RiskConfig,
) -> Option<i64> {
    if current_price <= 0 {
        return None;
    }
    let lowest = (current_price as f64 * (1.0 + config.min_take_profit_pct / 100.0)) as i64;
    let highest = (current_price as f64 * (1.0 + config.max_take_profit_pct / 100.0)) as i64;
    match analyst_target {
        Some(target) => Some(target.clamp(lowest, highest)),
        None => Some((current_price as f64 * (1.0 + config.take_profit_pct / 100.0)) as i64),
    }
}
