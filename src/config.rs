use crate::application::council::cost_manager::CostLimits;
use crate::application::council::execution::ExecutionConfig;
use crate::application::council::orchestrator::CouncilConfig;
use crate::application::council::risk_gate::RiskConfig;
use crate::application::monitoring::scheduler::SchedulerConfig;
use crate::infrastructure::analysts::llm::LlmBackendConfig;
use crate::infrastructure::broker::kis::KisConfig;
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Mock,
    Kis,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mock" => Ok(Mode::Mock),
            "kis" => Ok(Mode::Kis),
            _ => bail!("Invalid MODE: {}. Must be 'mock' or 'kis'", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub db_url: String,

    pub trading_enabled: bool,
    pub auto_execute: bool,
    pub respect_trading_hours: bool,
    pub min_confidence: f64,

    pub council_threshold: i64,
    pub sell_threshold: i64,
    pub analyst_timeout_seconds: u64,

    pub max_positions: usize,
    pub max_position_per_stock: i64,
    pub min_position_pct: f64,
    pub min_cash_reserve_pct: f64,

    pub stop_loss_pct: f64,
    pub min_stop_loss_pct: f64,
    pub max_stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub min_take_profit_pct: f64,
    pub max_take_profit_pct: f64,

    pub cost_daily_limit_usd: f64,
    pub cost_monthly_limit_usd: f64,
    pub max_full_analysis_per_day: u32,
    pub max_deep_analysis_per_day: u32,
    pub analysis_cooldown_minutes: i64,

    pub sell_cooldown_seconds: i64,
    pub price_sweep_interval_secs: u64,
    pub queue_drain_interval_secs: u64,
    pub scan_interval_secs: u64,
    pub scan_concurrency: usize,
    pub universe_limit: usize,

    pub extra_holidays: Vec<NaiveDate>,

    // KIS open-API credentials
    pub kis_base_url: String,
    pub kis_app_key: String,
    pub kis_app_secret: String,
    pub kis_account_no: String,
    pub kis_paper_trading: bool,

    // Analyst backends (OpenAI-compatible)
    pub quant_api_key: String,
    pub quant_base_url: String,
    pub quant_model: String,
    pub fundamental_api_key: String,
    pub fundamental_base_url: String,
    pub fundamental_model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let mode_str = env::var("MODE").unwrap_or_else(|_| "mock".to_string());
        let mode = Mode::from_str(&mode_str)?;

        let db_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://data/counciltrade.db".to_string());

        let trading_enabled = env::var("TRADING_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .context("Failed to parse TRADING_ENABLED")?;

        let auto_execute = env::var("AUTO_EXECUTE")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .context("Failed to parse AUTO_EXECUTE")?;

        let respect_trading_hours = env::var("RESPECT_TRADING_HOURS")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .context("Failed to parse RESPECT_TRADING_HOURS")?;

        let min_confidence = env::var("MIN_CONFIDENCE")
            .unwrap_or_else(|_| "0.6".to_string())
            .parse::<f64>()
            .context("Failed to parse MIN_CONFIDENCE")?;

        let council_threshold = env::var("COUNCIL_THRESHOLD")
            .unwrap_or_else(|_| "7".to_string())
            .parse::<i64>()
            .context("Failed to parse COUNCIL_THRESHOLD")?;

        let sell_threshold = env::var("SELL_THRESHOLD")
            .unwrap_or_else(|_| "3".to_string())
            .parse::<i64>()
            .context("Failed to parse SELL_THRESHOLD")?;

        let analyst_timeout_seconds = env::var("ANALYST_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .context("Failed to parse ANALYST_TIMEOUT_SECONDS")?;

        let max_positions = env::var("MAX_POSITIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<usize>()
            .context("Failed to parse MAX_POSITIONS")?;

        let max_position_per_stock = env::var("MAX_POSITION_PER_STOCK")
            .unwrap_or_else(|_| "5000000".to_string())
            .parse::<i64>()
            .context("Failed to parse MAX_POSITION_PER_STOCK")?;

        let min_position_pct = env::var("MIN_POSITION_PCT")
            .unwrap_or_else(|_| "1.0".to_string())
            .parse::<f64>()
            .context("Failed to parse MIN_POSITION_PCT")?;

        let min_cash_reserve_pct = env::var("MIN_CASH_RESERVE_PCT")
            .unwrap_or_else(|_| "10.0".to_string())
            .parse::<f64>()
            .context("Failed to parse MIN_CASH_RESERVE_PCT")?;

        let stop_loss_pct = env::var("STOP_LOSS_PCT")
            .unwrap_or_else(|_| "5.0".to_string())
            .parse::<f64>()
            .context("Failed to parse STOP_LOSS_PCT")?;

        let min_stop_loss_pct = env::var("MIN_STOP_LOSS_PCT")
            .unwrap_or_else(|_| "3.0".to_string())
            .parse::<f64>()
            .context("Failed to parse MIN_STOP_LOSS_PCT")?;

        let max_stop_loss_pct = env::var("MAX_STOP_LOSS_PCT")
            .unwrap_or_else(|_| "10.0".to_string())
            .parse::<f64>()
            .context("Failed to parse MAX_STOP_LOSS_PCT")?;

        let take_profit_pct = env::var("TAKE_PROFIT_PCT")
            .unwrap_or_else(|_| "10.0".to_string())
            .parse::<f64>()
            .context("Failed to parse TAKE_PROFIT_PCT")?;

        let min_take_profit_pct = env::var("MIN_TAKE_PROFIT_PCT")
            .unwrap_or_else(|_| "5.0".to_string())
            .parse::<f64>()
            .context("Failed to parse MIN_TAKE_PROFIT_PCT")?;

        let max_take_profit_pct = env::var("MAX_TAKE_PROFIT_PCT")
            .unwrap_or_else(|_| "30.0".to_string())
            .parse::<f64>()
            .context("Failed to parse MAX_TAKE_PROFIT_PCT")?;

        let cost_daily_limit_usd = env::var("COST_DAILY_LIMIT_USD")
            .unwrap_or_else(|_| "5.0".to_string())
            .parse::<f64>()
            .context("Failed to parse COST_DAILY_LIMIT_USD")?;

        let cost_monthly_limit_usd = env::var("COST_MONTHLY_LIMIT_USD")
            .unwrap_or_else(|_| "100.0".to_string())
            .parse::<f64>()
            .context("Failed to parse COST_MONTHLY_LIMIT_USD")?;

        let max_full_analysis_per_day = env::var("MAX_FULL_ANALYSIS_PER_DAY")
            .unwrap_or_else(|_| "20".to_string())
            .parse::<u32>()
            .context("Failed to parse MAX_FULL_ANALYSIS_PER_DAY")?;

        let max_deep_analysis_per_day = env::var("MAX_DEEP_ANALYSIS_PER_DAY")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .context("Failed to parse MAX_DEEP_ANALYSIS_PER_DAY")?;

        let analysis_cooldown_minutes = env::var("ANALYSIS_COOLDOWN_MINUTES")
            .unwrap_or_else(|_| "30".to_string())
            .parse::<i64>()
            .context("Failed to parse ANALYSIS_COOLDOWN_MINUTES")?;

        let sell_cooldown_seconds = env::var("SELL_COOLDOWN_SECONDS")
            .unwrap_or_else(|_| "1800".to_string())
            .parse::<i64>()
            .context("Failed to parse SELL_COOLDOWN_SECONDS")?;

        let price_sweep_interval_secs = env::var("PRICE_SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .context("Failed to parse PRICE_SWEEP_INTERVAL_SECS")?;

        let queue_drain_interval_secs = env::var("QUEUE_DRAIN_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".to_string())
            .parse::<u64>()
            .context("Failed to parse QUEUE_DRAIN_INTERVAL_SECS")?;

        let scan_interval_secs = env::var("SCAN_INTERVAL_SECS")
            .unwrap_or_else(|_| "600".to_string())
            .parse::<u64>()
            .context("Failed to parse SCAN_INTERVAL_SECS")?;

        let scan_concurrency = env::var("SCAN_CONCURRENCY")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<usize>()
            .context("Failed to parse SCAN_CONCURRENCY")?;

        let universe_limit = env::var("UNIVERSE_LIMIT")
            .unwrap_or_else(|_| "500".to_string())
            .parse::<usize>()
            .context("Failed to parse UNIVERSE_LIMIT")?;

        let extra_holidays = env::var("EXTRA_HOLIDAYS")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .with_context(|| format!("Invalid EXTRA_HOLIDAYS entry: {s}"))
            })
            .collect::<Result<Vec<_>>>()?;

        let kis_base_url = env::var("KIS_BASE_URL")
            .unwrap_or_else(|_| "https://openapivts.koreainvestment.com:29443".to_string());
        let kis_app_key = env::var("KIS_APP_KEY").unwrap_or_default();
        let kis_app_secret = env::var("KIS_APP_SECRET").unwrap_or_default();
        let kis_account_no = env::var("KIS_ACCOUNT_NO").unwrap_or_default();
        let kis_paper_trading = env::var("KIS_PAPER_TRADING")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .unwrap_or(true);

        let quant_api_key = env::var("QUANT_API_KEY").unwrap_or_default();
        let quant_base_url =
            env::var("QUANT_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let quant_model = env::var("QUANT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let fundamental_api_key = env::var("FUNDAMENTAL_API_KEY").unwrap_or_default();
        let fundamental_base_url = env::var("FUNDAMENTAL_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let fundamental_model =
            env::var("FUNDAMENTAL_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        let config = Self {
            mode,
            db_url,
            trading_enabled,
            auto_execute,
            respect_trading_hours,
            min_confidence,
            council_threshold,
            sell_threshold,
            analyst_timeout_seconds,
            max_positions,
            max_position_per_stock,
            min_position_pct,
            min_cash_reserve_pct,
            stop_loss_pct,
            min_stop_loss_pct,
            max_stop_loss_pct,
            take_profit_pct,
            min_take_profit_pct,
            max_take_profit_pct,
            cost_daily_limit_usd,
            cost_monthly_limit_usd,
            max_full_analysis_per_day,
            max_deep_analysis_per_day,
            analysis_cooldown_minutes,
            sell_cooldown_seconds,
            price_sweep_interval_secs,
            queue_drain_interval_secs,
            scan_interval_secs,
            scan_concurrency,
            universe_limit,
            extra_holidays,
            kis_base_url,
            kis_app_key,
            kis_app_secret,
            kis_account_no,
            kis_paper_trading,
            quant_api_key,
            quant_base_url,
            quant_model,
            fundamental_api_key,
            fundamental_base_url,
            fundamental_model,
        };
        config.validate()?;
        Ok(config)
    }

    /// Fail fast on a configuration that could place orders under the wrong
    /// policy.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence) {
            bail!("MIN_CONFIDENCE must be within 0..=1, got {}", self.min_confidence);
        }
        if !(1..=10).contains(&self.council_threshold) {
            bail!("COUNCIL_THRESHOLD must be within 1..=10, got {}", self.council_threshold);
        }
        if !(1..=10).contains(&self.sell_threshold) {
            bail!("SELL_THRESHOLD must be within 1..=10, got {}", self.sell_threshold);
        }
        if self.min_stop_loss_pct > self.max_stop_loss_pct {
            bail!(
                "MIN_STOP_LOSS_PCT ({}) must not exceed MAX_STOP_LOSS_PCT ({})",
                self.min_stop_loss_pct,
                self.max_stop_loss_pct
            );
        }
        if self.min_take_profit_pct > self.max_take_profit_pct {
            bail!(
                "MIN_TAKE_PROFIT_PCT ({}) must not exceed MAX_TAKE_PROFIT_PCT ({})",
                self.min_take_profit_pct,
                self.max_take_profit_pct
            );
        }
        if self.max_positions == 0 {
            bail!("MAX_POSITIONS must be positive");
        }
        if self.mode == Mode::Kis
            && (self.kis_app_key.is_empty()
                || self.kis_app_secret.is_empty()
                || self.kis_account_no.is_empty())
        {
            bail!("MODE=kis requires KIS_APP_KEY, KIS_APP_SECRET and KIS_ACCOUNT_NO");
        }
        Ok(())
    }

    pub fn risk_config(&self) -> RiskConfig {
        RiskConfig {
            min_position_pct: self.min_position_pct,
            min_cash_reserve_pct: self.min_cash_reserve_pct,
            max_positions: self.max_positions,
            stop_loss_pct: self.stop_loss_pct,
            min_stop_loss_pct: self.min_stop_loss_pct,
            max_stop_loss_pct: self.max_stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            min_take_profit_pct: self.min_take_profit_pct,
            max_take_profit_pct: self.max_take_profit_pct,
        }
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            trading_enabled: self.trading_enabled,
            auto_execute: self.auto_execute,
            respect_trading_hours: self.respect_trading_hours,
            min_confidence: self.min_confidence,
        }
    }

    pub fn council_config(&self) -> CouncilConfig {
        CouncilConfig {
            analyst_timeout_seconds: self.analyst_timeout_seconds,
            sell_threshold: self.sell_threshold,
        }
    }

    pub fn cost_limits(&self) -> CostLimits {
        CostLimits {
            daily_limit_usd: self.cost_daily_limit_usd,
            monthly_limit_usd: self.cost_monthly_limit_usd,
            max_full_analysis_per_day: self.max_full_analysis_per_day,
            max_deep_analysis_per_day: self.max_deep_analysis_per_day,
            cooldown_same_symbol_minutes: self.analysis_cooldown_minutes,
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            price_sweep_interval_secs: self.price_sweep_interval_secs,
            queue_drain_interval_secs: self.queue_drain_interval_secs,
            scan_interval_secs: self.scan_interval_secs,
            sell_cooldown_seconds: self.sell_cooldown_seconds,
            council_score_threshold: self.council_threshold,
            technical_sell_threshold: self.sell_threshold,
            max_concurrent_scans: self.scan_concurrency,
            universe_limit: self.universe_limit,
            max_amount_per_meeting: self.max_position_per_stock,
            ..SchedulerConfig::default()
        }
    }

    pub fn kis_config(&self) -> KisConfig {
        KisConfig {
            base_url: self.kis_base_url.clone(),
            app_key: self.kis_app_key.clone(),
            app_secret: self.kis_app_secret.clone(),
            account_no: self.kis_account_no.clone(),
            is_paper: self.kis_paper_trading,
        }
    }

    pub fn quant_backend(&self) -> LlmBackendConfig {
        LlmBackendConfig {
            api_key: self.quant_api_key.clone(),
            base_url: self.quant_base_url.clone(),
            model: self.quant_model.clone(),
        }
    }

    pub fn fundamental_backend(&self) -> LlmBackendConfig {
        LlmBackendConfig {
            api_key: self.fundamental_api_key.clone(),
            base_url: self.fundamental_base_url.clone(),
            model: self.fundamental_model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            mode: Mode::Mock,
            db_url: "sqlite://data/test.db".to_string(),
            trading_enabled: true,
            auto_execute: false,
            respect_trading_hours: true,
            min_confidence: 0.6,
            council_threshold: 7,
            sell_threshold: 3,
            analyst_timeout_seconds: 60,
            max_positions: 10,
            max_position_per_stock: 5_000_000,
            min_position_pct: 1.0,
            min_cash_reserve_pct: 10.0,
            stop_loss_pct: 5.0,
            min_stop_loss_pct: 3.0,
            max_stop_loss_pct: 10.0,
            take_profit_pct: 10.0,
            min_take_profit_pct: 5.0,
            max_take_profit_pct: 30.0,
            cost_daily_limit_usd: 5.0,
            cost_monthly_limit_usd: 100.0,
            max_full_analysis_per_day: 20,
            max_deep_analysis_per_day: 5,
            analysis_cooldown_minutes: 30,
            sell_cooldown_seconds: 1800,
            price_sweep_interval_secs: 60,
            queue_drain_interval_secs: 60,
            scan_interval_secs: 600,
            scan_concurrency: 5,
            universe_limit: 500,
            extra_holidays: Vec::new(),
            kis_base_url: String::new(),
            kis_app_key: String::new(),
            kis_app_secret: String::new(),
            kis_account_no: String::new(),
            kis_paper_trading: true,
            quant_api_key: String::new(),
            quant_base_url: String::new(),
            quant_model: String::new(),
            fundamental_api_key: String::new(),
            fundamental_base_url: String::new(),
            fundamental_model: String::new(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn test_invalid_confidence_rejected() {
        let mut config = base_config();
        config.min_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_stop_band_rejected() {
        let mut config = base_config();
        config.min_stop_loss_pct = 12.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_kis_mode_requires_credentials() {
        let mut config = base_config();
        config.mode = Mode::Kis;
        assert!(config.validate().is_err());
        config.kis_app_key = "key".to_string();
        config.kis_app_secret = "secret".to_string();
        config.kis_account_no = "12345678".to_string();
        assert!(config.validate().is_ok());
    }
}
