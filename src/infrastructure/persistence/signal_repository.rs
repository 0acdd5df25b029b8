use crate::domain::repositories::{NewSignalRow, SignalRepository, SignalRow};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

pub struct SqliteSignalRepository {
    pool: SqlitePool,
}

impl SqliteSignalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_from(row: &SqliteRow) -> Result<SignalRow> {
        let created_at: String = row.try_get("created_at")?;
        let created_at = DateTime::<FixedOffset>::parse_from_rfc3339(&created_at)
            .context("invalid created_at in trading_signals")?;

        let holding_deadline: Option<String> = row.try_get("holding_deadline")?;
        let holding_deadline = holding_deadline
            .as_deref()
            .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
            .transpose()
            .context("invalid holding_deadline in trading_signals")?;

        let trigger_details: Option<String> = row.try_get("trigger_details")?;
        let trigger_details = trigger_details
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .unwrap_or(None);

        Ok(SignalRow {
            id: row.try_get("id")?,
            symbol: row.try_get("symbol")?,
            company_name: row.try_get("company_name")?,
            signal_type: row.try_get("signal_type")?,
            strength: row.try_get("strength")?,
            source_agent: row.try_get("source_agent")?,
            reason: row.try_get("reason")?,
            target_price: row.try_get("target_price")?,
            stop_loss: row.try_get("stop_loss")?,
            quantity: row.try_get("quantity")?,
            signal_status: row.try_get("signal_status")?,
            trigger_details,
            holding_deadline,
            quant_score: row.try_get("quant_score")?,
            fundamental_score: row.try_get("fundamental_score")?,
            allocation_percent: row.try_get("allocation_percent")?,
            suggested_amount: row.try_get("suggested_amount")?,
            is_executed: row.try_get("is_executed")?,
            created_at,
        })
    }
}

#[async_trait]
impl SignalRepository for SqliteSignalRepository {
    async fn insert(&self, row: NewSignalRow) -> Result<i64> {
        let trigger_details = row
            .trigger_details
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()?;

        let result = sqlx::query(
            r#"
            INSERT INTO trading_signals (
                symbol, company_name, signal_type, strength, source_agent, reason,
                target_price, stop_loss, quantity, signal_status, trigger_details,
                holding_deadline, quant_score, fundamental_score, allocation_percent,
                suggested_amount, is_executed, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&row.symbol)
        .bind(&row.company_name)
        .bind(&row.signal_type)
        .bind(row.strength)
        .bind(&row.source_agent)
        .bind(&row.reason)
        .bind(row.target_price)
        .bind(row.stop_loss)
        .bind(row.quantity)
        .bind(&row.signal_status)
        .bind(trigger_details)
        .bind(row.holding_deadline.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(row.quant_score)
        .bind(row.fundamental_score)
        .bind(row.allocation_percent)
        .bind(row.suggested_amount)
        .bind(row.is_executed)
        .bind(row.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to insert trading signal")?;

        Ok(result.last_insert_rowid())
    }

    async fn get(&self, id: i64) -> Result<Option<SignalRow>> {
        let row = sqlx::query("SELECT * FROM trading_signals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_from).transpose()
    }

    async fn restorable(&self, limit: usize) -> Result<Vec<SignalRow>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM trading_signals
            WHERE signal_status IN ('pending', 'queued', 'approved')
              AND is_executed = 0
              AND signal_type IN ('buy', 'sell', 'partial_sell')
              AND quantity > 0
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_from).collect()
    }

    async fn queued(&self) -> Result<Vec<SignalRow>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM trading_signals
            WHERE signal_status = 'queued'
              AND is_executed = 0
              AND signal_type IN ('buy', 'sell', 'partial_sell')
              AND quantity > 0
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_from).collect()
    }

    async fn claim_for_execution(&self, id: i64, new_status: &str) -> Result<bool> {
        // Atomic compare-and-set on is_executed; the row-level write lock
        // serialises concurrent claimants, so exactly one sees a change.
        let result = sqlx::query(
            r#"
            UPDATE trading_signals
            SET is_executed = 1, signal_status = ?
            WHERE id = ? AND is_executed = 0
            "#,
        )
        .bind(new_status)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_status(&self, id: i64, status: &str, executed: bool) -> Result<()> {
        sqlx::query("UPDATE trading_signals SET signal_status = ?, is_executed = ? WHERE id = ?")
            .bind(status)
            .bind(executed)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update signal status")?;
        Ok(())
    }

    async fn active_buy_prices(
        &self,
        symbol: &str,
    ) -> Result<Option<(Option<i64>, Option<i64>, Option<NaiveDate>)>> {
        let row = sqlx::query(
            r#"
            SELECT stop_loss, target_price, holding_deadline FROM trading_signals
            WHERE symbol = ? AND signal_type = 'buy' AND is_executed = 0
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let deadline: Option<String> = row.try_get("holding_deadline")?;
        let deadline = deadline
            .as_deref()
            .map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d"))
            .transpose()?;
        Ok(Some((
            row.try_get("stop_loss")?,
            row.try_get("target_price")?,
            deadline,
        )))
    }

    async fn update_active_buy_prices(
        &self,
        symbol: &str,
        new_target: Option<i64>,
        new_stop: Option<i64>,
        reason: &str,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT id, reason FROM trading_signals
            WHERE symbol = ? AND signal_type = 'buy' AND is_executed = 0
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(symbol)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            info!("SignalRepository: no active BUY row for {symbol}, price update skipped");
            return Ok(());
        };
        let id: i64 = row.try_get("id")?;
        let prev_reason: String = row.try_get("reason")?;
        let separator = if prev_reason.is_empty() { "" } else { " | " };
        let combined = format!("{prev_reason}{separator}{reason}");

        sqlx::query(
            r#"
            UPDATE trading_signals
            SET target_price = COALESCE(?, target_price),
                stop_loss = COALESCE(?, stop_loss),
                reason = ?
            WHERE id = ?
            "#,
        )
        .bind(new_target)
        .bind(new_stop)
        .bind(combined)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("SignalRepository: {symbol} prices updated (target={new_target:?}, stop={new_stop:?})");
        Ok(())
    }

    async fn deadline_expired_buys(&self, today: NaiveDate) -> Result<Vec<SignalRow>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM trading_signals
            WHERE signal_type = 'buy'
              AND is_executed = 0
              AND holding_deadline IS NOT NULL
              AND holding_deadline <= ?
            "#,
        )
        .bind(today.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_from).collect()
    }

    async fn expire_pending_before(&self, cutoff: DateTime<FixedOffset>) -> Result<Vec<i64>> {
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT id FROM trading_signals WHERE signal_status = 'pending' AND created_at < ?",
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(&mut *tx)
        .await?;
        let ids: Vec<i64> = rows
            .iter()
            .map(|r| r.try_get::<i64, _>("id"))
            .collect::<Result<_, _>>()?;

        if !ids.is_empty() {
            sqlx::query(
                "UPDATE trading_signals SET signal_status = 'expired' \
                 WHERE signal_status = 'pending' AND created_at < ?",
            )
            .bind(cutoff.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(ids)
    }
}
