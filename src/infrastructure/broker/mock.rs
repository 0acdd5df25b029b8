//! In-memory broker used in Mock mode and throughout the test suite.

use crate::domain::errors::BrokerError;
use crate::domain::market::{
    Balance, DailyBar, Holding, ListedSymbol, OrderResult, OrderSide, OrderType, PnlItem,
    StockPrice,
};
use crate::domain::ports::BrokerService;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::info;

/// Order as recorded by the mock.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: i64,
    pub price: i64,
    pub order_type: OrderType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderBehaviour {
    Submit,
    Reject,
    Error,
}

pub struct MockBroker {
    prices: RwLock<HashMap<String, i64>>,
    daily: RwLock<HashMap<String, Vec<DailyBar>>>,
    balance: RwLock<Balance>,
    holdings: RwLock<Vec<Holding>>,
    listings: RwLock<Vec<ListedSymbol>>,
    orders: RwLock<Vec<PlacedOrder>>,
    behaviour: RwLock<OrderBehaviour>,
    order_seq: AtomicU64,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            prices: RwLock::new(HashMap::new()),
            daily: RwLock::new(HashMap::new()),
            balance: RwLock::new(Balance::default()),
            holdings: RwLock::new(Vec::new()),
            listings: RwLock::new(Vec::new()),
            orders: RwLock::new(Vec::new()),
            behaviour: RwLock::new(OrderBehaviour::Submit),
            order_seq: AtomicU64::new(1),
        }
    }

    /// Synthetic daily bars: `n` bars ending today, close moving by `step`
    /// per day from `start`, with a 2% intraday range. Latest first, like
    /// the live adapter returns.
    pub fn trending_bars(n: usize, start: i64, step: i64) -> Vec<DailyBar> {
        let first = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();
        let mut bars: Vec<DailyBar> = (0..n)
            .map(|i| {
                let close = (start + step * i as i64).max(100);
                DailyBar {
                    date: first + Duration::days(i as i64),
                    open: close - step / 2,
                    high: close + close / 100,
                    low: close - close / 100,
                    close,
                    volume: 100_000,
                }
            })
            .collect();
        bars.reverse();
        bars
    }

    pub async fn set_price(&self, symbol: &str, price: i64) {
        self.prices.write().await.insert(symbol.to_string(), price);
    }

    pub async fn set_daily_prices(&self, symbol: &str, bars: Vec<DailyBar>) {
        if let Some(latest) = bars.first() {
            self.prices.write().await.insert(symbol.to_string(), latest.close);
        }
        self.daily.write().await.insert(symbol.to_string(), bars);
    }

    pub async fn set_balance(&self, balance: Balance) {
        *self.balance.write().await = balance;
    }

    pub async fn set_holdings(&self, holdings: Vec<Holding>) {
        *self.holdings.write().await = holdings;
    }

    pub async fn set_listings(&self, listings: Vec<ListedSymbol>) {
        *self.listings.write().await = listings;
    }

    /// All subsequent orders are rejected by the venue.
    pub async fn reject_orders(&self) {
        *self.behaviour.write().await = OrderBehaviour::Reject;
    }

    /// All subsequent orders fail with a transient error.
    pub async fn fail_orders(&self) {
        *self.behaviour.write().await = OrderBehaviour::Error;
    }

    pub async fn accept_orders(&self) {
        *self.behaviour.write().await = OrderBehaviour::Submit;
    }

    pub async fn orders(&self) -> Vec<PlacedOrder> {
        self.orders.read().await.clone()
    }

    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

impl Default for MockBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerService for MockBroker {
    async fn get_stock_price(&self, symbol: &str) -> Result<Option<StockPrice>, BrokerError> {
        Ok(self.prices.read().await.get(symbol).map(|&p| StockPrice {
            symbol: symbol.to_string(),
            current_price: p,
            change: 0,
            change_rate: 0.0,
            volume: 0,
        }))
    }

    async fn get_daily_prices(
        &self,
        symbol: &str,
        _end_date: Option<NaiveDate>,
    ) -> Result<Vec<DailyBar>, BrokerError> {
        Ok(self.daily.read().await.get(symbol).cloned().unwrap_or_default())
    }

    async fn get_balance(&self) -> Result<Balance, BrokerError> {
        Ok(self.balance.read().await.clone())
    }

    async fn get_holdings(&self) -> Result<Vec<Holding>, BrokerError> {
        Ok(self.holdings.read().await.clone())
    }

    async fn get_realized_pnl(
        &self,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<PnlItem>, BrokerError> {
        Ok(Vec::new())
    }

    async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: i64,
        price: i64,
        order_type: OrderType,
    ) -> Result<OrderResult, BrokerError> {
        match *self.behaviour.read().await {
            OrderBehaviour::Error => {
                return Err(BrokerError::Transient {
                    reason: "injected transient failure".to_string(),
                });
            }
            OrderBehaviour::Reject => {
                return Ok(OrderResult::rejected("injected venue rejection"));
            }
            OrderBehaviour::Submit => {}
        }

        self.orders.write().await.push(PlacedOrder {
            symbol: symbol.to_string(),
            side,
            quantity,
            price,
            order_type,
        });
        let seq = self.order_seq.fetch_add(1, Ordering::SeqCst);
        info!("MockBroker: order {seq} {side} {symbol} x {quantity} accepted");
        Ok(OrderResult::submitted(format!("MOCK-{seq:06}")))
    }

    async fn cancel_order(
        &self,
        order_no: &str,
        _symbol: &str,
        _quantity: i64,
    ) -> Result<OrderResult, BrokerError> {
        Ok(OrderResult::submitted(order_no))
    }

    async fn modify_order(
        &self,
        order_no: &str,
        _symbol: &str,
        _quantity: i64,
        _price: i64,
    ) -> Result<OrderResult, BrokerError> {
        Ok(OrderResult::submitted(order_no))
    }

    async fn list_market_symbols(&self, market: &str) -> Result<Vec<ListedSymbol>, BrokerError> {
        Ok(self
            .listings
            .read()
            .await
            .iter()
            .filter(|l| l.market == market)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_orders_recorded_until_rejected() {
        let broker = MockBroker::new();
        let r = broker
            .place_order("005930", OrderSide::Buy, 10, 0, OrderType::Market)
            .await
            .unwrap();
        assert_eq!(r.status, crate::domain::market::OrderOutcome::Submitted);
        assert_eq!(broker.order_count().await, 1);

        broker.reject_orders().await;
        let r = broker
            .place_order("005930", OrderSide::Buy, 10, 0, OrderType::Market)
            .await
            .unwrap();
        assert_eq!(r.status, crate::domain::market::OrderOutcome::Rejected);
        assert_eq!(broker.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_trending_bars_shape() {
        let bars = MockBroker::trending_bars(260, 10_000, 50);
        assert_eq!(bars.len(), 260);
        // Latest first.
        assert!(bars[0].close > bars[259].close);
        assert!(bars[0].high >= bars[0].close);
        assert!(bars[0].low <= bars[0].close);
    }
}
