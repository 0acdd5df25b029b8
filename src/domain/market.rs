use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Limit,
    Market,
}

/// One daily OHLCV observation. Prices are integer won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: i64,
    pub high: i64,
    pub low: i64,
    pub close: i64,
    pub volume: i64,
}

/// Point-in-time quote snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockPrice {
    pub symbol: String,
    pub current_price: i64,
    pub change: i64,
    pub change_rate: f64,
    pub volume: i64,
}

/// Account balance snapshot from the broker. Cached at most 10 s by the adapter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Balance {
    pub total_deposit: i64,
    pub available_amount: i64,
    pub total_purchase: i64,
    pub total_evaluation: i64,
    pub total_profit_loss: i64,
    pub profit_rate: f64,
}

/// Open position snapshot from the broker. Cached at most 60 s by the adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub name: String,
    pub quantity: i64,
    pub avg_price: i64,
    pub current_price: i64,
    pub evaluation: i64,
    pub profit_loss: i64,
    pub profit_rate: f64,
}

/// One realised profit/loss line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlItem {
    pub trade_date: NaiveDate,
    pub symbol: String,
    pub name: String,
    pub quantity: i64,
    pub sell_price: i64,
    pub buy_price: i64,
    pub profit_loss: i64,
    pub profit_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderOutcome {
    Submitted,
    Rejected,
    Error,
}

/// Broker response to place/cancel/modify.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub status: OrderOutcome,
    pub order_no: Option<String>,
    pub message: String,
}

impl OrderResult {
    pub fn submitted(order_no: impl Into<String>) -> Self {
        Self {
            status: OrderOutcome::Submitted,
            order_no: Some(order_no.into()),
            message: String::new(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            status: OrderOutcome::Rejected,
            order_no: None,
            message: message.into(),
        }
    }
}

/// A listed instrument as returned by the universe refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListedSymbol {
    pub symbol: String,
    pub name: String,
    pub market: String,
}

pub type KstTime = DateTime<FixedOffset>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_side_display() {
        assert_eq!(OrderSide::Buy.to_string(), "BUY");
        assert_eq!(OrderSide::Sell.to_string(), "SELL");
    }

    #[test]
    fn test_order_result_constructors() {
        let ok = OrderResult::submitted("20260801-0001");
        assert_eq!(ok.status, OrderOutcome::Submitted);
        assert_eq!(ok.order_no.as_deref(), Some("20260801-0001"));

        let bad = OrderResult::rejected("insufficient balance");
        assert_eq!(bad.status, OrderOutcome::Rejected);
        assert!(bad.order_no.is_none());
    }
}
