use crate::domain::council::{AnalystRole, CouncilMessage};
use crate::domain::errors::{AnalystError, BrokerError};
use crate::domain::market::{
    Balance, DailyBar, Holding, KstTime, ListedSymbol, OrderResult, OrderSide, OrderType, PnlItem,
    StockPrice,
};
use crate::domain::signals::{IndicatorSnapshot, TriggerResult};
use async_trait::async_trait;
use chrono::NaiveDate;

/// Time capability. Every component that needs "now" takes this instead of
/// reading the ambient clock, so tests can inject a deterministic one.
pub trait Clock: Send + Sync {
    /// Current civil time in the market time zone (KST, UTC+9).
    fn now(&self) -> KstTime;

    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Broker capability consumed by the core. Implementations hide pagination,
/// token handling and venue quirks.
#[async_trait]
pub trait BrokerService: Send + Sync {
    async fn get_stock_price(&self, symbol: &str) -> Result<Option<StockPrice>, BrokerError>;

    /// Daily bars, latest first. At least ~260 when the listing is old enough.
    async fn get_daily_prices(
        &self,
        symbol: &str,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<DailyBar>, BrokerError>;

    async fn get_balance(&self) -> Result<Balance, BrokerError>;

    async fn get_holdings(&self) -> Result<Vec<Holding>, BrokerError>;

    async fn get_realized_pnl(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PnlItem>, BrokerError>;

    /// `price == 0` means market. Adapters for limit-only venues convert
    /// market orders to a limit at the current quote.
    async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: i64,
        price: i64,
        order_type: OrderType,
    ) -> Result<OrderResult, BrokerError>;

    async fn cancel_order(
        &self,
        order_no: &str,
        symbol: &str,
        quantity: i64,
    ) -> Result<OrderResult, BrokerError>;

    async fn modify_order(
        &self,
        order_no: &str,
        symbol: &str,
        quantity: i64,
        price: i64,
    ) -> Result<OrderResult, BrokerError>;

    /// Listing snapshot for the scan-universe refresh.
    async fn list_market_symbols(&self, market: &str) -> Result<Vec<ListedSymbol>, BrokerError>;
}

/// Technical context handed to the quant analyst.
#[derive(Debug, Clone, Default)]
pub struct TechnicalContext {
    pub snapshot: IndicatorSnapshot,
    /// Non-neutral trigger verdicts only.
    pub triggers: Vec<TriggerResult>,
    pub composite_score: Option<i64>,
}

/// One analyst invocation. The orchestrator only depends on the structured
/// opinion coming back; backends own prompts and transports.
#[derive(Debug, Clone)]
pub struct AnalystRequest {
    pub symbol: String,
    pub company_name: String,
    pub title: String,
    pub prior_messages: Vec<CouncilMessage>,
    pub technical: Option<TechnicalContext>,
    /// Financial-report digest; None switches the fundamental analyst into
    /// no-data mode.
    pub fundamentals: Option<String>,
    pub request: String,
}

#[async_trait]
pub trait AnalystPanel: Send + Sync {
    async fn analyze(
        &self,
        role: AnalystRole,
        request: AnalystRequest,
    ) -> Result<CouncilMessage, AnalystError>;
}

/// Named mutual-exclusion primitive with a TTL, backing the queue drainer's
/// per-signal locks and single-instance jobs.
pub trait NamedLock: Send + Sync {
    /// Non-blocking. True when the lock was acquired.
    fn acquire(&self, key: &str, ttl_seconds: i64) -> bool;
    fn release(&self, key: &str);
}

/// Set of keys that expire, backing the sell cooldowns.
pub trait ExpiringSet: Send + Sync {
    fn insert(&self, key: &str, ttl_seconds: i64);
    fn contains(&self, key: &str) -> bool;
}
