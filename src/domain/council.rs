use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Short random id used for meetings, messages and signals.
pub fn short_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalystRole {
    /// News judgement (meeting trigger, opening statement).
    GeminiJudge,
    /// Technical / quantitative analysis.
    GptQuant,
    /// Fundamental analysis; also runs the consensus pass.
    ClaudeFundamental,
    /// Moderator voice for opening/closing statements.
    Moderator,
}

impl AnalystRole {
    pub fn speaker(&self) -> &'static str {
        match self {
            AnalystRole::GeminiJudge => "Gemini News Judge",
            AnalystRole::GptQuant => "GPT Quant Analyst",
            AnalystRole::ClaudeFundamental => "Claude Fundamental Analyst",
            AnalystRole::Moderator => "Meeting Moderator",
        }
    }
}

/// Typed analyst opinion attached to a council message. One variant per role
/// so downstream code never digs through loose maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalystOpinion {
    Quant {
        /// 1..=10
        score: i64,
        /// 0..=100, percent of available funds
        suggested_percent: f64,
        target_price: Option<i64>,
        stop_loss: Option<i64>,
    },
    Fundamental {
        score: i64,
        suggested_percent: f64,
    },
    Consensus {
        suggested_percent: f64,
        /// Holding horizon in trading days, clamped to 5..=21 by the caller.
        holding_days: i64,
    },
}

impl AnalystOpinion {
    pub fn score(&self) -> Option<i64> {
        match self {
            AnalystOpinion::Quant { score, .. } | AnalystOpinion::Fundamental { score, .. } => {
                Some(*score)
            }
            AnalystOpinion::Consensus { .. } => None,
        }
    }

    pub fn suggested_percent(&self) -> f64 {
        match self {
            AnalystOpinion::Quant { suggested_percent, .. }
            | AnalystOpinion::Fundamental { suggested_percent, .. }
            | AnalystOpinion::Consensus { suggested_percent, .. } => *suggested_percent,
        }
    }
}

/// One utterance in a meeting transcript. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilMessage {
    pub id: String,
    pub role: AnalystRole,
    pub speaker: String,
    /// Markdown body.
    pub content: String,
    pub opinion: Option<AnalystOpinion>,
    pub timestamp: DateTime<FixedOffset>,
}

impl CouncilMessage {
    pub fn new(
        role: AnalystRole,
        content: impl Into<String>,
        opinion: Option<AnalystOpinion>,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: short_id(),
            role,
            speaker: role.speaker().to_string(),
            content: content.into(),
            opinion,
            timestamp,
        }
    }
}

/// What convened a meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    News,
    Quant,
    Sell,
    Rebalance,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggerSource::News => "news",
            TriggerSource::Quant => "quant",
            TriggerSource::Sell => "sell",
            TriggerSource::Rebalance => "rebalance",
        };
        write!(f, "{s}")
    }
}

/// Decision attached to an investment signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalAction {
    Buy,
    Sell,
    PartialSell,
    Hold,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "buy",
            SignalAction::Sell => "sell",
            SignalAction::PartialSell => "partial_sell",
            SignalAction::Hold => "hold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(SignalAction::Buy),
            "sell" => Some(SignalAction::Sell),
            "partial_sell" => Some(SignalAction::PartialSell),
            "hold" => Some(SignalAction::Hold),
            _ => None,
        }
    }

    pub fn is_sell_side(&self) -> bool {
        matches!(self, SignalAction::Sell | SignalAction::PartialSell)
    }
}

impl fmt::Display for SignalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

/// Signal lifecycle state. See the execution pipeline for the transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    AutoExecuted,
    Queued,
    Expired,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Pending => "pending",
            SignalStatus::Approved => "approved",
            SignalStatus::Rejected => "rejected",
            SignalStatus::Executed => "executed",
            SignalStatus::AutoExecuted => "auto_executed",
            SignalStatus::Queued => "queued",
            SignalStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SignalStatus::Pending),
            "approved" => Some(SignalStatus::Approved),
            "rejected" => Some(SignalStatus::Rejected),
            "executed" => Some(SignalStatus::Executed),
            "auto_executed" => Some(SignalStatus::AutoExecuted),
            "queued" => Some(SignalStatus::Queued),
            "expired" => Some(SignalStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SignalStatus::Rejected
                | SignalStatus::Executed
                | SignalStatus::AutoExecuted
                | SignalStatus::Expired
        )
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The core decision record produced by a council meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentSignal {
    pub id: String,
    pub symbol: String,
    pub company_name: String,
    pub action: SignalAction,

    /// Percent of available funds to deploy (sell side: percent of the
    /// position to unwind).
    pub allocation_percent: f64,
    pub suggested_amount: i64,
    pub suggested_quantity: i64,
    pub target_price: Option<i64>,
    pub stop_loss_price: Option<i64>,
    /// Price at signal creation, kept for audit and invariant checks.
    pub current_price: i64,

    pub quant_summary: String,
    pub fundamental_summary: String,
    pub consensus_reason: String,

    /// 0..=1
    pub confidence: f64,
    pub quant_score: i64,
    pub fundamental_score: i64,

    pub status: SignalStatus,
    pub created_at: DateTime<FixedOffset>,
    pub executed_at: Option<DateTime<FixedOffset>>,
    pub holding_deadline: Option<NaiveDate>,

    /// Assigned by the signal store on first insert.
    pub db_id: Option<i64>,
}

/// One convened council meeting with its transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub symbol: String,
    pub company_name: String,
    pub trigger_title: String,
    /// News score or mapped quant score that convened the meeting (1..=10).
    pub trigger_score: i64,
    pub trigger_source: TriggerSource,

    pub messages: Vec<CouncilMessage>,
    pub current_round: u8,
    pub max_rounds: u8,

    pub signal: Option<InvestmentSignal>,
    pub consensus_reached: bool,

    pub started_at: DateTime<FixedOffset>,
    pub ended_at: Option<DateTime<FixedOffset>>,
}

impl Meeting {
    pub fn new(
        symbol: impl Into<String>,
        company_name: impl Into<String>,
        trigger_title: impl Into<String>,
        trigger_score: i64,
        trigger_source: TriggerSource,
        started_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: short_id(),
            symbol: symbol.into(),
            company_name: company_name.into(),
            trigger_title: trigger_title.into(),
            trigger_score,
            trigger_source,
            messages: Vec::new(),
            current_round: 0,
            max_rounds: 3,
            signal: None,
            consensus_reached: false,
            started_at,
            ended_at: None,
        }
    }

    pub fn add_message(&mut self, message: CouncilMessage) {
        self.messages.push(message);
    }

    /// Plain-text rendering of the transcript, fully derived from the
    /// appended messages.
    pub fn transcript(&self) -> String {
        let mut lines = vec![
            format!("Council meeting {}", self.id),
            format!("{} ({})", self.company_name, self.symbol),
            format!("Trigger: {} [{}]", self.trigger_title, self.trigger_source),
            String::new(),
        ];
        for msg in &self.messages {
            lines.push(format!("[{}]", msg.speaker));
            lines.push(msg.content.clone());
            lines.push(String::new());
        }
        if let Some(signal) = &self.signal {
            lines.push(format!(
                "Decision: {} {:.1}% (confidence {:.0}%)",
                signal.action,
                signal.allocation_percent,
                signal.confidence * 100.0
            ));
        }
        lines.join("\n")
    }
}

/// Outcome of a daily rebalance review for one holding. Does not produce a
/// signal by itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceReview {
    pub symbol: String,
    pub company_name: String,
    pub current_price: i64,
    pub profit_rate: f64,
    pub score: i64,
    pub new_target_price: Option<i64>,
    pub new_stop_loss: Option<i64>,
    pub prev_target_price: Option<i64>,
    pub prev_stop_loss: Option<i64>,
    pub analysis: String,
    pub recommend_sell: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn kst(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .unwrap()
    }

    #[test]
    fn test_short_id_length() {
        assert_eq!(short_id().len(), 8);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            SignalStatus::Pending,
            SignalStatus::Approved,
            SignalStatus::Rejected,
            SignalStatus::Executed,
            SignalStatus::AutoExecuted,
            SignalStatus::Queued,
            SignalStatus::Expired,
        ] {
            assert_eq!(SignalStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SignalStatus::parse("cancelled"), None);
    }

    #[test]
    fn test_meeting_transcript_contains_messages() {
        let mut meeting = Meeting::new(
            "005930",
            "Samsung Electronics",
            "Quant buy signal",
            8,
            TriggerSource::Quant,
            kst(2026, 8, 3, 10, 0),
        );
        meeting.add_message(CouncilMessage::new(
            AnalystRole::Moderator,
            "Convening the council",
            None,
            kst(2026, 8, 3, 10, 0),
        ));
        let text = meeting.transcript();
        assert!(text.contains("Samsung Electronics"));
        assert!(text.contains("Convening the council"));
    }

    #[test]
    fn test_opinion_accessors() {
        let quant = AnalystOpinion::Quant {
            score: 8,
            suggested_percent: 30.0,
            target_price: Some(80_000),
            stop_loss: Some(65_000),
        };
        assert_eq!(quant.score(), Some(8));
        assert_eq!(quant.suggested_percent(), 30.0);

        let consensus = AnalystOpinion::Consensus {
            suggested_percent: 28.0,
            holding_days: 14,
        };
        assert_eq!(consensus.score(), None);
    }
}
