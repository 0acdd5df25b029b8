use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// SQLite-backed signal store. WAL mode, so the queue drainer and the
/// orchestrator can write while the monitoring jobs read.
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::prepare_store_path(db_url).await?;

        let options = SqliteConnectOptions::from_str(db_url)
            .with_context(|| format!("Invalid signal store url: {db_url}"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .with_context(|| format!("Signal store unreachable at {db_url}"))?;

        let db = Self { pool };
        db.init().await?;
        info!("Signal store ready: {db_url}");

        Ok(db)
    }

    /// File-backed stores on a first run may point into a directory that
    /// does not exist yet; create it before sqlite tries to.
    async fn prepare_store_path(db_url: &str) -> Result<()> {
        let Some(file_path) = db_url.strip_prefix("sqlite://") else {
            return Ok(());
        };
        match Path::new(file_path).parent() {
            Some(dir) if !dir.exists() => fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Cannot create signal store directory {}", dir.display())),
            _ => Ok(()),
        }
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trading_signals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                company_name TEXT NOT NULL DEFAULT '',
                signal_type TEXT NOT NULL,
                strength REAL NOT NULL DEFAULT 0,
                source_agent TEXT NOT NULL DEFAULT '',
                reason TEXT NOT NULL DEFAULT '',
                target_price INTEGER,
                stop_loss INTEGER,
                quantity INTEGER NOT NULL DEFAULT 0,
                signal_status TEXT NOT NULL DEFAULT 'pending',
                trigger_details TEXT,
                holding_deadline TEXT,
                quant_score INTEGER NOT NULL DEFAULT 0,
                fundamental_score INTEGER NOT NULL DEFAULT 0,
                allocation_percent REAL NOT NULL DEFAULT 0,
                suggested_amount INTEGER NOT NULL DEFAULT 0,
                is_executed BOOLEAN NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trading_signals table")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_signals_status
            ON trading_signals (signal_status, is_executed);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create status index")?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_signals_symbol_type
            ON trading_signals (symbol, signal_type, is_executed, created_at);
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create symbol index")?;

        info!("Database schema initialized.");
        Ok(())
    }
}
