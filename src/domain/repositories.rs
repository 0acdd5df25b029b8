use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};

/// Persisted form of an investment signal. The store is authoritative; the
/// execution pipeline's in-memory lists are caches over these rows.
#[derive(Debug, Clone)]
pub struct SignalRow {
    pub id: i64,
    pub symbol: String,
    pub company_name: String,
    /// "buy" | "sell" | "partial_sell" | "hold"
    pub signal_type: String,
    /// Confidence scaled to 0..100.
    pub strength: f64,
    /// Trigger source that convened the meeting.
    pub source_agent: String,
    pub reason: String,
    pub target_price: Option<i64>,
    pub stop_loss: Option<i64>,
    pub quantity: i64,
    pub signal_status: String,
    pub trigger_details: Option<serde_json::Value>,
    pub holding_deadline: Option<NaiveDate>,
    pub quant_score: i64,
    pub fundamental_score: i64,
    pub allocation_percent: f64,
    pub suggested_amount: i64,
    pub is_executed: bool,
    pub created_at: DateTime<FixedOffset>,
}

/// Insert payload (the store assigns the id).
#[derive(Debug, Clone)]
pub struct NewSignalRow {
    pub symbol: String,
    pub company_name: String,
    pub signal_type: String,
    pub strength: f64,
    pub source_agent: String,
    pub reason: String,
    pub target_price: Option<i64>,
    pub stop_loss: Option<i64>,
    pub quantity: i64,
    pub signal_status: String,
    pub trigger_details: Option<serde_json::Value>,
    pub holding_deadline: Option<NaiveDate>,
    pub quant_score: i64,
    pub fundamental_score: i64,
    pub allocation_percent: f64,
    pub suggested_amount: i64,
    pub is_executed: bool,
    pub created_at: DateTime<FixedOffset>,
}

/// Transactional store for signals. Must provide an atomic execution claim
/// (row-level lock semantics) for the queue drainer.
#[async_trait]
pub trait SignalRepository: Send + Sync {
    async fn insert(&self, row: NewSignalRow) -> Result<i64>;

    async fn get(&self, id: i64) -> Result<Option<SignalRow>>;

    /// Rows eligible for crash-safe restoration: status in
    /// {pending, queued, approved}, actionable type, quantity > 0.
    async fn restorable(&self, limit: usize) -> Result<Vec<SignalRow>>;

    /// Unexecuted queued rows with an actionable type and quantity > 0.
    async fn queued(&self) -> Result<Vec<SignalRow>>;

    /// Atomically flips `is_executed` from false to true and stamps the new
    /// status. Returns false when another worker already claimed the row;
    /// exactly one caller ever sees true.
    async fn claim_for_execution(&self, id: i64, new_status: &str) -> Result<bool>;

    async fn update_status(&self, id: i64, status: &str, executed: bool) -> Result<()>;

    /// Latest active (unexecuted) BUY row for a symbol:
    /// (stop_loss, target_price, holding_deadline).
    async fn active_buy_prices(
        &self,
        symbol: &str,
    ) -> Result<Option<(Option<i64>, Option<i64>, Option<NaiveDate>)>>;

    /// Update the active BUY row's target/stop, appending `reason` to the
    /// row's change history. No-op when the symbol has no active BUY row.
    async fn update_active_buy_prices(
        &self,
        symbol: &str,
        new_target: Option<i64>,
        new_stop: Option<i64>,
        reason: &str,
    ) -> Result<()>;

    /// Active BUY rows whose holding deadline is on or before `today`.
    async fn deadline_expired_buys(&self, today: NaiveDate) -> Result<Vec<SignalRow>>;

    /// Pending rows created before `cutoff` become expired. Returns the ids.
    async fn expire_pending_before(&self, cutoff: DateTime<FixedOffset>) -> Result<Vec<i64>>;
}
