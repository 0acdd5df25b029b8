use crate::domain::council::{InvestmentSignal, Meeting};
use serde::Serialize;
use tracing::info;

/// Events published on the in-process bus. Payloads carry full entity
/// snapshots so subscribers never need to read shared state back.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic", rename_all = "snake_case")]
pub enum TradingEvent {
    /// A message was appended to a meeting (or the meeting ended). Emitted
    /// in transcript append order.
    MeetingUpdate(Meeting),
    SignalCreated(InvestmentSignal),
    SignalApproved(InvestmentSignal),
    SignalRejected(InvestmentSignal),
    SignalExecuted(InvestmentSignal),
    ScanProgress {
        current: usize,
        total: usize,
        symbol: String,
        score: Option<i64>,
    },
    ScanCompleted {
        scanned: usize,
        results: usize,
    },
}

impl TradingEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            TradingEvent::MeetingUpdate(_) => "meeting.update",
            TradingEvent::SignalCreated(_) => "signal.created",
            TradingEvent::SignalApproved(_) => "signal.approved",
            TradingEvent::SignalRejected(_) => "signal.rejected",
            TradingEvent::SignalExecuted(_) => "signal.executed",
            TradingEvent::ScanProgress { .. } => "scan.progress",
            TradingEvent::ScanCompleted { .. } => "scan.completed",
        }
    }
}

/// Subscriber interface for the event bus.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &TradingEvent);
}

/// Listener that mirrors events into the log stream.
pub struct LoggingListener;

impl EventListener for LoggingListener {
    fn on_event(&self, event: &TradingEvent) {
        match event {
            TradingEvent::MeetingUpdate(meeting) => info!(
                "Event [{}]: {} ({}) round {} ({} messages)",
                event.topic(),
                meeting.company_name,
                meeting.symbol,
                meeting.current_round,
                meeting.messages.len()
            ),
            TradingEvent::SignalCreated(s)
            | TradingEvent::SignalApproved(s)
            | TradingEvent::SignalRejected(s)
            | TradingEvent::SignalExecuted(s) => info!(
                "Event [{}]: {} {} {:.1}% status={}",
                event.topic(),
                s.symbol,
                s.action,
                s.allocation_percent,
                s.status
            ),
            TradingEvent::ScanProgress {
                current,
                total,
                symbol,
                ..
            } => info!("Event [{}]: {current}/{total} ({symbol})", event.topic()),
            TradingEvent::ScanCompleted { scanned, results } => info!(
                "Event [{}]: scanned {scanned}, {results} results",
                event.topic()
            ),
        }
    }
}
