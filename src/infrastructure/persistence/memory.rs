//! In-memory signal store for Mock mode and tests. Mirrors the SQLite
//! repository's semantics, including the atomic execution claim.

use crate::domain::repositories::{NewSignalRow, SignalRepository, SignalRow};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::sync::Mutex;

pub struct InMemorySignalRepository {
    rows: Mutex<Vec<SignalRow>>,
    next_id: Mutex<i64>,
}

impl InMemorySignalRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            next_id: Mutex::new(1),
        }
    }

    pub fn all(&self) -> Vec<SignalRow> {
        self.rows.lock().unwrap().clone()
    }
}

const ACTIONABLE: [&str; 3] = ["buy", "sell", "partial_sell"];

#[async_trait]
impl SignalRepository for InMemorySignalRepository {
    async fn insert(&self, row: NewSignalRow) -> Result<i64> {
        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;

        self.rows.lock().unwrap().push(SignalRow {
            id,
            symbol: row.symbol,
            company_name: row.company_name,
            signal_type: row.signal_type,
            strength: row.strength,
            source_agent: row.source_agent,
            reason: row.reason,
            target_price: row.target_price,
            stop_loss: row.stop_loss,
            quantity: row.quantity,
            signal_status: row.signal_status,
            trigger_details: row.trigger_details,
            holding_deadline: row.holding_deadline,
            quant_score: row.quant_score,
            fundamental_score: row.fundamental_score,
            allocation_percent: row.allocation_percent,
            suggested_amount: row.suggested_amount,
            is_executed: row.is_executed,
            created_at: row.created_at,
        });
        Ok(id)
    }

    async fn get(&self, id: i64) -> Result<Option<SignalRow>> {
        Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
    }

    async fn restorable(&self, limit: usize) -> Result<Vec<SignalRow>> {
        let rows = self.rows.lock().unwrap();
        let mut out: Vec<SignalRow> = rows
            .iter()
            .filter(|r| {
                matches!(r.signal_status.as_str(), "pending" | "queued" | "approved")
                    && !r.is_executed
                    && ACTIONABLE.contains(&r.signal_type.as_str())
                    && r.quantity > 0
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }

    async fn queued(&self) -> Result<Vec<SignalRow>> {
        let rows = self.rows.lock().unwrap();
        let mut out: Vec<SignalRow> = rows
            .iter()
            .filter(|r| {
                r.signal_status == "queued"
                    && !r.is_executed
                    && ACTIONABLE.contains(&r.signal_type.as_str())
                    && r.quantity > 0
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    async fn claim_for_execution(&self, id: i64, new_status: &str) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        if row.is_executed {
            return Ok(false);
        }
        row.is_executed = true;
        row.signal_status = new_status.to_string();
        Ok(true)
    }

    async fn update_status(&self, id: i64, status: &str, executed: bool) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.signal_status = status.to_string();
            row.is_executed = executed;
        }
        Ok(())
    }

    async fn active_buy_prices(
        &self,
        symbol: &str,
    ) -> Result<Option<(Option<i64>, Option<i64>, Option<NaiveDate>)>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| r.symbol == symbol && r.signal_type == "buy" && !r.is_executed)
            .max_by_key(|r| r.created_at)
            .map(|r| (r.stop_loss, r.target_price, r.holding_deadline)))
    }

    async fn update_active_buy_prices(
        &self,
        symbol: &str,
        new_target: Option<i64>,
        new_stop: Option<i64>,
        reason: &str,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows
            .iter_mut()
            .filter(|r| r.symbol == symbol && r.signal_type == "buy" && !r.is_executed)
            .max_by_key(|r| r.created_at)
        else {
            return Ok(());
        };
        if let Some(target) = new_target {
            row.target_price = Some(target);
        }
        if let Some(stop) = new_stop {
            row.stop_loss = Some(stop);
        }
        let separator = if row.reason.is_empty() { "" } else { " | " };
        row.reason = format!("{}{separator}{reason}", row.reason);
        Ok(())
    }

    async fn deadline_expired_buys(&self, today: NaiveDate) -> Result<Vec<SignalRow>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .filter(|r| {
                r.signal_type == "buy"
                    && !r.is_executed
                    && r.holding_deadline.map(|d| d <= today).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn expire_pending_before(&self, cutoff: DateTime<FixedOffset>) -> Result<Vec<i64>> {
        let mut rows = self.rows.lock().unwrap();
        let mut expired = Vec::new();
        for row in rows.iter_mut() {
            if row.signal_status == "pending" && row.created_at < cutoff {
                row.signal_status = "expired".to_string();
                expired.push(row.id);
            }
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn kst(h: u32, mi: u32) -> DateTime<FixedOffset> {
        chrono::FixedOffset::east_opt(9 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 8, 3, h, mi, 0)
            .unwrap()
    }

    fn new_row(symbol: &str, signal_type: &str, status: &str, at: DateTime<FixedOffset>) -> NewSignalRow {
        NewSignalRow {
            symbol: symbol.to_string(),
            company_name: symbol.to_string(),
            signal_type: signal_type.to_string(),
            strength: 75.0,
            source_agent: "quant".to_string(),
            reason: String::new(),
            target_price: Some(80_000),
            stop_loss: Some(65_000),
            quantity: 10,
            signal_status: status.to_string(),
            trigger_details: None,
            holding_deadline: None,
            quant_score: 8,
            fundamental_score: 7,
            allocation_percent: 20.0,
            suggested_amount: 700_000,
            is_executed: false,
            created_at: at,
        }
    }

    #[tokio::test]
    async fn test_claim_is_exactly_once() {
        let repo = InMemorySignalRepository::new();
        let id = repo.insert(new_row("005930", "buy", "queued", kst(9, 0))).await.unwrap();

        assert!(repo.claim_for_execution(id, "auto_executed").await.unwrap());
        assert!(!repo.claim_for_execution(id, "auto_executed").await.unwrap());

        let row = repo.get(id).await.unwrap().unwrap();
        assert!(row.is_executed);
        assert_eq!(row.signal_status, "auto_executed");
    }

    #[tokio::test]
    async fn test_queued_filters_and_order() {
        let repo = InMemorySignalRepository::new();
        repo.insert(new_row("A", "buy", "queued", kst(10, 0))).await.unwrap();
        repo.insert(new_row("B", "buy", "queued", kst(9, 0))).await.unwrap();
        repo.insert(new_row("C", "hold", "queued", kst(9, 30))).await.unwrap();
        repo.insert(new_row("D", "buy", "pending", kst(9, 30))).await.unwrap();

        let queued = repo.queued().await.unwrap();
        assert_eq!(queued.len(), 2);
        // Oldest first.
        assert_eq!(queued[0].symbol, "B");
        assert_eq!(queued[1].symbol, "A");
    }

    #[tokio::test]
    async fn test_active_buy_prices_latest_wins() {
        let repo = InMemorySignalRepository::new();
        let mut older = new_row("005930", "buy", "pending", kst(9, 0));
        older.stop_loss = Some(60_000);
        repo.insert(older).await.unwrap();
        let mut newer = new_row("005930", "buy", "pending", kst(10, 0));
        newer.stop_loss = Some(66_000);
        repo.insert(newer).await.unwrap();

        let (stop, target, _) = repo.active_buy_prices("005930").await.unwrap().unwrap();
        assert_eq!(stop, Some(66_000));
        assert_eq!(target, Some(80_000));
    }

    #[tokio::test]
    async fn test_expire_pending_before() {
        let repo = InMemorySignalRepository::new();
        let old = repo.insert(new_row("A", "buy", "pending", kst(8, 0))).await.unwrap();
        let fresh = repo.insert(new_row("B", "buy", "pending", kst(11, 0))).await.unwrap();

        let expired = repo.expire_pending_before(kst(10, 0)).await.unwrap();
        assert_eq!(expired, vec![old]);
        assert_eq!(repo.get(old).await.unwrap().unwrap().signal_status, "expired");
        assert_eq!(repo.get(fresh).await.unwrap().unwrap().signal_status, "pending");
    }

    #[tokio::test]
    async fn test_update_active_buy_prices_appends_reason() {
        let repo = InMemorySignalRepository::new();
        let mut row = new_row("005930", "buy", "pending", kst(9, 0));
        row.reason = "council decision".to_string();
        let id = repo.insert(row).await.unwrap();

        repo.update_active_buy_prices("005930", Some(82_000), None, "rebalance 08/03")
            .await
            .unwrap();
        let row = repo.get(id).await.unwrap().unwrap();
        assert_eq!(row.target_price, Some(82_000));
        assert_eq!(row.stop_loss, Some(65_000));
        assert!(row.reason.contains("council decision | rebalance 08/03"));
    }
}
