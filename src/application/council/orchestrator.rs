//! Council orchestrator: turns a trigger into a deliberated, sized
//! investment signal.
//!
//! One meeting is a fixed three-round state machine: opening, initial
//! analyses, mutual responses, consensus, signal build, routing, closing.
//! Analyst calls are bounded by a timeout; a timed-out or failed analyst is
//! replaced with a deterministic fallback message and the meeting always
//! runs to completion. Two or more failures trip the data-quality gate and
//! the resulting signal is discarded instead of routed.

use crate::application::council::cost_manager::{AnalysisDepth, CostManager};
use crate::application::council::execution::ExecutionPipeline;
use crate::application::council::risk_gate::{self, RiskConfig};
use crate::application::signals::indicators::IndicatorCalculator;
use crate::application::signals::triggers::TriggerEvaluator;
use crate::domain::council::{
    AnalystOpinion, AnalystRole, CouncilMessage, InvestmentSignal, Meeting, RebalanceReview,
    SignalAction, SignalStatus, TriggerSource, short_id,
};
use crate::domain::events::TradingEvent;
use crate::domain::ports::{AnalystPanel, AnalystRequest, BrokerService, Clock, TechnicalContext};
use crate::domain::signals::TriggerVote;
use crate::infrastructure::event_bus::EventBus;
use chrono::Duration;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

const RECENT_MEETINGS_CAP: usize = 100;

#[derive(Debug, Clone)]
pub struct CouncilConfig {
    pub analyst_timeout_seconds: u64,
    /// Rebalance score (1..=10) at or below which a sell is recommended.
    pub sell_threshold: i64,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            analyst_timeout_seconds: 60,
            sell_threshold: 3,
        }
    }
}

pub struct CouncilOrchestrator {
    analysts: Arc<dyn AnalystPanel>,
    broker: Arc<dyn BrokerService>,
    pipeline: Arc<ExecutionPipeline>,
    cost_manager: Arc<CostManager>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    risk_config: RiskConfig,
    config: CouncilConfig,
    meetings: RwLock<Vec<Meeting>>,
}

/// Parameters for a full council meeting.
#[derive(Debug, Clone)]
pub struct MeetingRequest {
    pub symbol: String,
    pub company_name: String,
    pub title: String,
    /// News score, or the mapped score of a quant trigger (1..=10).
    pub trigger_score: i64,
    pub available_amount: i64,
    pub current_price: i64,
    pub trigger_source: TriggerSource,
    /// Non-neutral trigger details from the quant scan, persisted with the
    /// signal for audit.
    pub quant_triggers: Option<serde_json::Value>,
}

impl CouncilOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        analysts: Arc<dyn AnalystPanel>,
        broker: Arc<dyn BrokerService>,
        pipeline: Arc<ExecutionPipeline>,
        cost_manager: Arc<CostManager>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
        risk_config: RiskConfig,
        config: CouncilConfig,
    ) -> Self {
        Self {
            analysts,
            broker,
            pipeline,
            cost_manager,
            clock,
            event_bus,
            risk_config,
            config,
            meetings: RwLock::new(Vec::new()),
        }
    }

    pub fn pipeline(&self) -> &Arc<ExecutionPipeline> {
        &self.pipeline
    }

    pub async fn get_meeting(&self, meeting_id: &str) -> Option<Meeting> {
        self.meetings
            .read()
            .await
            .iter()
            .find(|m| m.id == meeting_id)
            .cloned()
    }

    pub async fn recent_meetings(&self, limit: usize) -> Vec<Meeting> {
        let meetings = self.meetings.read().await;
        meetings.iter().rev().take(limit).cloned().collect()
    }

    pub async fn approve_signal(&self, signal_id: &str) -> Option<InvestmentSignal> {
        self.pipeline.approve(signal_id).await
    }

    pub async fn reject_signal(&self, signal_id: &str) -> Option<InvestmentSignal> {
        self.pipeline.reject(signal_id).await
    }

    /// Run the full three-round council for one symbol and route the
    /// resulting signal.
    pub async fn start_meeting(&self, request: MeetingRequest) -> Meeting {
        let now = self.clock.now();
        let mut meeting = Meeting::new(
            request.symbol.clone(),
            request.company_name.clone(),
            request.title.clone(),
            request.trigger_score,
            request.trigger_source,
            now,
        );
        let mut failures = 0usize;

        // Round 0: convene.
        let opening_role = match request.trigger_source {
            TriggerSource::News => AnalystRole::GeminiJudge,
            _ => AnalystRole::Moderator,
        };
        let opening = CouncilMessage::new(
            opening_role,
            format!(
                "**Convening the investment council**\n\nTrigger: \"{}\"\nScore: {}/10\n\n\
                 The signal looks material for {} ({}). Opening the deliberation.",
                request.title, request.trigger_score, request.company_name, request.symbol
            ),
            None,
            self.clock.now(),
        );
        self.append(&mut meeting, opening).await;

        let technical = self.fetch_technical(&request.symbol).await;
        if technical.is_none() {
            warn!(
                "Orchestrator [{}]: no usable chart data, counting as an analysis failure",
                request.symbol
            );
            failures += 1;
        }
        let current_price = if request.current_price > 0 {
            request.current_price
        } else {
            technical
                .as_ref()
                .map(|t| t.snapshot.current_price)
                .unwrap_or(0)
        };

        // Round 1: initial analyses.
        meeting.current_round = 1;
        let quant_msg = self
            .call_analyst(
                AnalystRole::GptQuant,
                &meeting,
                &request,
                technical.clone(),
                "Give your initial technical read and suggest an allocation percent.".to_string(),
                Self::buy_fallback(AnalystRole::GptQuant),
                &mut failures,
            )
            .await;
        let (mut quant_score, mut quant_percent, mut quant_target, mut quant_stop) =
            extract_quant(&quant_msg);
        self.append(&mut meeting, quant_msg.clone()).await;

        let fund_msg = self
            .call_analyst(
                AnalystRole::ClaudeFundamental,
                &meeting,
                &request,
                None,
                "Give your initial fundamental read and suggest an allocation percent.".to_string(),
                Self::buy_fallback(AnalystRole::ClaudeFundamental),
                &mut failures,
            )
            .await;
        let (fund_score, mut fund_percent) = extract_fundamental(&fund_msg);
        self.append(&mut meeting, fund_msg.clone()).await;

        // Round 2: mutual responses.
        meeting.current_round = 2;
        let quant_reply = self
            .call_analyst(
                AnalystRole::GptQuant,
                &meeting,
                &request,
                technical.clone(),
                format!(
                    "Review the fundamental analyst's position and adjust your allocation if \
                     warranted:\n\n{}",
                    fund_msg.content
                ),
                Self::buy_fallback(AnalystRole::GptQuant),
                &mut failures,
            )
            .await;
        if let Some(AnalystOpinion::Quant {
            score,
            suggested_percent,
            target_price,
            stop_loss,
        }) = &quant_reply.opinion
        {
            quant_score = *score;
            quant_percent = *suggested_percent;
            if target_price.is_some() {
                quant_target = *target_price;
            }
            if stop_loss.is_some() {
                quant_stop = *stop_loss;
            }
        }
        self.append(&mut meeting, quant_reply.clone()).await;

        let fund_reply = self
            .call_analyst(
                AnalystRole::ClaudeFundamental,
                &meeting,
                &request,
                None,
                format!(
                    "Review the quant analyst's position and adjust your allocation if \
                     warranted:\n\n{}",
                    quant_reply.content
                ),
                Self::buy_fallback(AnalystRole::ClaudeFundamental),
                &mut failures,
            )
            .await;
        if let Some(opinion) = &fund_reply.opinion {
            fund_percent = opinion.suggested_percent();
        }
        self.append(&mut meeting, fund_reply).await;

        // Round 3: consensus.
        meeting.current_round = 3;
        let consensus_msg = self
            .call_analyst(
                AnalystRole::Moderator,
                &meeting,
                &request,
                None,
                format!(
                    "Settle the consensus. The quant analyst proposes {quant_percent:.0}% and \
                     the fundamental analyst {fund_percent:.0}%. The trigger source is \
                     '{}'. Return the final allocation percent and a holding horizon.",
                    request.trigger_source
                ),
                AnalystOpinion::Consensus {
                    suggested_percent: 0.0,
                    holding_days: 10,
                },
                &mut failures,
            )
            .await;
        let (mut final_percent, holding_days) = match &consensus_msg.opinion {
            Some(AnalystOpinion::Consensus {
                suggested_percent,
                holding_days,
            }) => (*suggested_percent, (*holding_days).clamp(5, 21)),
            _ => (0.0, 10),
        };
        self.append(&mut meeting, consensus_msg.clone()).await;

        // A zero consensus inherits the analysts' average.
        if final_percent == 0.0 {
            final_percent = (quant_percent + fund_percent) / 2.0;
        }

        // Signal build.
        let confidence = (quant_score + fund_score) as f64 / 20.0;
        let action = risk_gate::determine_action(
            final_percent,
            quant_score,
            fund_score,
            request.trigger_score,
            request.trigger_source,
        );
        let target_price = risk_gate::clamp_target_price(quant_target, current_price, &self.risk_config);
        let stop_loss_price = risk_gate::clamp_stop_loss(quant_stop, current_price, &self.risk_config);

        let suggested_amount =
            (request.available_amount as f64 * final_percent / 100.0).round() as i64;
        let suggested_quantity = if current_price > 0 {
            suggested_amount / current_price
        } else {
            0
        };
        let holding_deadline = Some(self.clock.today() + Duration::days(holding_days));

        let signal = InvestmentSignal {
            id: short_id(),
            symbol: request.symbol.clone(),
            company_name: request.company_name.clone(),
            action,
            allocation_percent: final_percent,
            suggested_amount,
            suggested_quantity,
            target_price,
            stop_loss_price,
            current_price,
            quant_summary: truncate(&quant_msg.content, 100),
            fundamental_summary: truncate(&fund_msg.content, 100),
            consensus_reason: truncate(&consensus_msg.content, 200),
            confidence,
            quant_score,
            fundamental_score: fund_score,
            status: SignalStatus::Pending,
            created_at: now,
            executed_at: None,
            holding_deadline,
            db_id: None,
        };

        // Route (or discard on the data-quality gate), then close.
        let quality = risk_gate::check_data_quality_gate(&request.symbol, failures);
        let signal = if quality.blocked {
            self.pipeline
                .persist_rejected(signal, request.trigger_source, &quality.reason)
                .await
        } else {
            self.pipeline
                .route_new(signal, request.trigger_source, request.quant_triggers.clone())
                .await
        };

        let closing = CouncilMessage::new(
            AnalystRole::Moderator,
            format!(
                "**Council conclusion**\n\nDecision: {}\nAllocation: {:.1}%\nAmount: {} won\n\
                 Confidence: {:.0}%\n\nQuant score: {}/10\nFundamental score: {}/10\n\nStatus: {}",
                signal.action,
                signal.allocation_percent,
                signal.suggested_amount,
                signal.confidence * 100.0,
                signal.quant_score,
                signal.fundamental_score,
                status_line(signal.status),
            ),
            None,
            self.clock.now(),
        );
        meeting.signal = Some(signal.clone());
        meeting.consensus_reached = true;
        meeting.ended_at = Some(self.clock.now());
        self.append(&mut meeting, closing).await;

        self.cost_manager
            .record_analysis(&request.symbol, AnalysisDepth::Full, failures == 0);
        self.cost_manager
            .cache_signal(&request.symbol, &request.title, &signal);
        self.remember(meeting.clone()).await;

        info!(
            "Orchestrator: meeting done: {} ({}) -> {} {:.1}% [{}]",
            request.company_name,
            request.symbol,
            signal.action,
            signal.allocation_percent,
            signal.status
        );
        meeting
    }

    /// One-round LIGHT sell deliberation for an existing position.
    pub async fn start_sell_meeting(
        &self,
        symbol: &str,
        company_name: &str,
        sell_reason: &str,
        current_holdings: i64,
        avg_buy_price: i64,
        current_price: i64,
    ) -> Meeting {
        let now = self.clock.now();
        let title = format!("Sell review: {sell_reason}");
        let mut meeting = Meeting::new(
            symbol,
            company_name,
            title.clone(),
            3,
            TriggerSource::Sell,
            now,
        );
        let mut failures = 0usize;

        let profit_rate = if avg_buy_price > 0 {
            (current_price - avg_buy_price) as f64 / avg_buy_price as f64 * 100.0
        } else {
            0.0
        };

        let opening = CouncilMessage::new(
            AnalystRole::Moderator,
            format!(
                "**Sell review convened**\n\n{company_name} ({symbol})\nReason: {sell_reason}\n\n\
                 Position: {current_holdings} shares @ {avg_buy_price} won\n\
                 Current price: {current_price} won\nReturn: {profit_rate:+.1}%",
            ),
            None,
            self.clock.now(),
        );
        self.append(&mut meeting, opening).await;

        let technical = self.fetch_technical(symbol).await;
        let current_price = technical
            .as_ref()
            .map(|t| t.snapshot.current_price)
            .filter(|&p| p > 0)
            .unwrap_or(current_price);

        meeting.current_round = 1;
        let sell_request = MeetingRequest {
            symbol: symbol.to_string(),
            company_name: company_name.to_string(),
            title: title.clone(),
            trigger_score: 3,
            available_amount: 0,
            current_price,
            trigger_source: TriggerSource::Sell,
            quant_triggers: None,
        };
        let fallback = AnalystOpinion::Quant {
            score: 5,
            suggested_percent: if profit_rate < 0.0 { 100.0 } else { 30.0 },
            target_price: None,
            stop_loss: None,
        };
        let quant_msg = self
            .call_analyst(
                AnalystRole::GptQuant,
                &meeting,
                &sell_request,
                technical,
                format!(
                    "Assess the exit timing for this held position. Return {profit_rate:+.1}%, \
                     reason: {sell_reason}. Suggest what percent of the position to unwind."
                ),
                fallback,
                &mut failures,
            )
            .await;
        let quant_score = quant_msg
            .opinion
            .as_ref()
            .and_then(|o| o.score())
            .unwrap_or(5);
        let analyst_percent = quant_msg
            .opinion
            .as_ref()
            .map(|o| o.suggested_percent())
            .unwrap_or(30.0);
        self.append(&mut meeting, quant_msg.clone()).await;

        // Hard stops override the analyst: full exit below the stop-loss
        // band, half exit above the take-profit band.
        let (sell_percent, action) = if profit_rate < -self.risk_config.stop_loss_pct {
            (100.0, SignalAction::Sell)
        } else if profit_rate > self.risk_config.take_profit_pct {
            (50.0, SignalAction::PartialSell)
        } else if analyst_percent >= 50.0 {
            (analyst_percent, SignalAction::Sell)
        } else {
            (analyst_percent, SignalAction::PartialSell)
        };

        let sell_quantity = (current_holdings as f64 * sell_percent / 100.0) as i64;
        let sell_amount = sell_quantity * current_price;
        let confidence = 0.7 + if profit_rate.abs() > 10.0 { 0.2 } else { 0.0 };

        let signal = InvestmentSignal {
            id: short_id(),
            symbol: symbol.to_string(),
            company_name: company_name.to_string(),
            action,
            allocation_percent: sell_percent,
            suggested_amount: sell_amount,
            suggested_quantity: sell_quantity,
            target_price: None,
            stop_loss_price: None,
            current_price,
            quant_summary: truncate(&quant_msg.content, 100),
            fundamental_summary: sell_reason.to_string(),
            consensus_reason: format!("sell reason: {sell_reason}, return: {profit_rate:+.1}%"),
            confidence,
            quant_score,
            fundamental_score: 5,
            status: SignalStatus::Pending,
            created_at: now,
            executed_at: None,
            holding_deadline: None,
            db_id: None,
        };

        let signal = self
            .pipeline
            .route_new(signal, TriggerSource::Sell, None)
            .await;

        let closing = CouncilMessage::new(
            AnalystRole::Moderator,
            format!(
                "**Sell review conclusion**\n\nDecision: {}\nUnwind: {:.0}% ({} shares)\n\
                 Estimated amount: {} won\n\nStatus: {}",
                signal.action,
                sell_percent,
                sell_quantity,
                sell_amount,
                status_line(signal.status),
            ),
            None,
            self.clock.now(),
        );
        meeting.signal = Some(signal);
        meeting.consensus_reached = true;
        meeting.ended_at = Some(self.clock.now());
        self.append(&mut meeting, closing).await;

        self.cost_manager
            .record_analysis(symbol, AnalysisDepth::Light, failures == 0);
        self.remember(meeting.clone()).await;

        info!("Orchestrator: sell review done: {company_name} ({symbol}) {sell_percent:.0}%");
        meeting
    }

    /// Daily LIGHT re-evaluation of one holding. Produces no signal; the
    /// caller persists the refreshed prices and escalates on a weak score.
    pub async fn start_rebalance_review(
        &self,
        symbol: &str,
        company_name: &str,
        current_holdings: i64,
        avg_buy_price: i64,
        current_price: i64,
        prev_target_price: Option<i64>,
        prev_stop_loss: Option<i64>,
    ) -> Option<RebalanceReview> {
        let technical = self.fetch_technical(symbol).await;
        let Some(technical) = technical else {
            warn!("Orchestrator [rebalance] {symbol}: no chart data, skipping");
            return None;
        };
        let current_price = if technical.snapshot.current_price > 0 {
            technical.snapshot.current_price
        } else {
            current_price
        };
        let profit_rate = if avg_buy_price > 0 {
            (current_price - avg_buy_price) as f64 / avg_buy_price as f64 * 100.0
        } else {
            0.0
        };

        let prev_target = prev_target_price
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unset".to_string());
        let prev_stop = prev_stop_loss
            .map(|p| p.to_string())
            .unwrap_or_else(|| "unset".to_string());

        let meeting = Meeting::new(
            symbol,
            company_name,
            format!("Daily rebalance review ({profit_rate:+.1}%)"),
            5,
            TriggerSource::Rebalance,
            self.clock.now(),
        );
        let request = MeetingRequest {
            symbol: symbol.to_string(),
            company_name: company_name.to_string(),
            title: meeting.trigger_title.clone(),
            trigger_score: 5,
            available_amount: 0,
            current_price,
            trigger_source: TriggerSource::Rebalance,
            quant_triggers: None,
        };

        let mut failures = 0usize;
        let quant_msg = self
            .call_analyst(
                AnalystRole::GptQuant,
                &meeting,
                &request,
                Some(technical),
                format!(
                    "Daily re-evaluation of a held position: {current_holdings} shares, average \
                     buy {avg_buy_price} won, current {current_price} won, return \
                     {profit_rate:+.1}%. Previous target {prev_target}, previous stop \
                     {prev_stop}. Reset the target and stop from the latest chart."
                ),
                Self::buy_fallback(AnalystRole::GptQuant),
                &mut failures,
            )
            .await;
        if failures > 0 {
            // A failed analyst leaves nothing to act on here.
            return None;
        }

        let (score, _, target, stop) = extract_quant(&quant_msg);
        let new_target = risk_gate::clamp_target_price(target, current_price, &self.risk_config);
        let new_stop = risk_gate::clamp_stop_loss(stop, current_price, &self.risk_config);

        self.cost_manager
            .record_analysis(symbol, AnalysisDepth::Light, true);

        let review = RebalanceReview {
            symbol: symbol.to_string(),
            company_name: company_name.to_string(),
            current_price,
            profit_rate,
            score,
            new_target_price: new_target,
            new_stop_loss: new_stop,
            prev_target_price,
            prev_stop_loss,
            analysis: truncate(&quant_msg.content, 500),
            recommend_sell: score <= self.config.sell_threshold,
        };
        info!(
            "Orchestrator [rebalance] {symbol}: score={}, target={:?}, stop={:?}, \
             recommend_sell={}",
            review.score, review.new_target_price, review.new_stop_loss, review.recommend_sell
        );
        Some(review)
    }

    // Internal helpers

    async fn append(&self, meeting: &mut Meeting, message: CouncilMessage) {
        meeting.add_message(message);
        self.event_bus
            .publish(TradingEvent::MeetingUpdate(meeting.clone()))
            .await;
    }

    async fn remember(&self, meeting: Meeting) {
        let mut meetings = self.meetings.write().await;
        meetings.push(meeting);
        if meetings.len() > RECENT_MEETINGS_CAP {
            let drop = meetings.len() - RECENT_MEETINGS_CAP;
            meetings.drain(..drop);
        }
    }

    fn buy_fallback(role: AnalystRole) -> AnalystOpinion {
        match role {
            AnalystRole::GptQuant => AnalystOpinion::Quant {
                score: 5,
                suggested_percent: 0.0,
                target_price: None,
                stop_loss: None,
            },
            _ => AnalystOpinion::Fundamental {
                score: 5,
                suggested_percent: 0.0,
            },
        }
    }

    /// Invoke one analyst with the meeting timeout. Timeouts and errors are
    /// absorbed into a deterministic fallback message so the deliberation
    /// always terminates.
    #[allow(clippy::too_many_arguments)]
    async fn call_analyst(
        &self,
        role: AnalystRole,
        meeting: &Meeting,
        request: &MeetingRequest,
        technical: Option<TechnicalContext>,
        task: String,
        fallback: AnalystOpinion,
        failures: &mut usize,
    ) -> CouncilMessage {
        let analyst_request = AnalystRequest {
            symbol: request.symbol.clone(),
            company_name: request.company_name.clone(),
            title: request.title.clone(),
            prior_messages: meeting.messages.clone(),
            technical,
            fundamentals: None,
            request: task,
        };

        let timeout = StdDuration::from_secs(self.config.analyst_timeout_seconds);
        let outcome = tokio::time::timeout(
            timeout,
            self.analysts.analyze(role, analyst_request),
        )
        .await;

        match outcome {
            Ok(Ok(message)) => message,
            Ok(Err(e)) => {
                error!("Orchestrator [{}]: {role:?} failed: {e}", request.symbol);
                *failures += 1;
                self.fallback_message(role, fallback)
            }
            Err(_) => {
                error!(
                    "Orchestrator [{}]: {role:?} timed out after {}s",
                    request.symbol, self.config.analyst_timeout_seconds
                );
                *failures += 1;
                self.fallback_message(role, fallback)
            }
        }
    }

    fn fallback_message(&self, role: AnalystRole, opinion: AnalystOpinion) -> CouncilMessage {
        CouncilMessage::new(
            role,
            "[system warning] Analyst unavailable; substituting the mechanical fallback \
             position for this round.",
            Some(opinion),
            self.clock.now(),
        )
    }

    /// Fresh indicator/trigger pass for one symbol. None when the bar
    /// history is missing or too short.
    async fn fetch_technical(&self, symbol: &str) -> Option<TechnicalContext> {
        let bars = match self.broker.get_daily_prices(symbol, None).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!("Orchestrator [{symbol}]: daily price fetch failed: {e}");
                return None;
            }
        };
        let snapshot = IndicatorCalculator::calculate(symbol, &bars);
        if snapshot.is_empty() {
            return None;
        }
        let triggers = TriggerEvaluator::evaluate_all(&snapshot);
        let composite = TriggerEvaluator::composite_score(&triggers);
        let active: Vec<_> = triggers
            .into_iter()
            .filter(|t| t.vote != TriggerVote::Neutral)
            .collect();
        Some(TechnicalContext {
            snapshot,
            triggers: active,
            composite_score: Some(composite),
        })
    }
}

fn extract_quant(message: &CouncilMessage) -> (i64, f64, Option<i64>, Option<i64>) {
    match &message.opinion {
        Some(AnalystOpinion::Quant {
            score,
            suggested_percent,
            target_price,
            stop_loss,
        }) => (*score, *suggested_percent, *target_price, *stop_loss),
        Some(other) => (other.score().unwrap_or(5), other.suggested_percent(), None, None),
        None => (5, 0.0, None, None),
    }
}

fn extract_fundamental(message: &CouncilMessage) -> (i64, f64) {
    match &message.opinion {
        Some(opinion) => (opinion.score().unwrap_or(5), opinion.suggested_percent()),
        None => (5, 0.0),
    }
}

fn truncate(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{cut}...")
    }
}

fn status_line(status: SignalStatus) -> &'static str {
    match status {
        SignalStatus::AutoExecuted => "auto-executed",
        SignalStatus::Executed => "executed",
        SignalStatus::Queued => "queued for the next session",
        SignalStatus::Rejected => "rejected",
        SignalStatus::Expired => "expired",
        SignalStatus::Approved => "approved",
        SignalStatus::Pending => "awaiting approval",
    }
}
