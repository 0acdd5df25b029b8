//! KIS open-API broker adapter (domestic equities, REST).
//!
//! Hides the venue details behind `BrokerService`: OAuth token lifecycle
//! with single-flight refresh, numeric fields that arrive as strings,
//! continuation-key pagination, and the venue's limit-only order book
//! (market orders are quoted and re-priced as limits before submission).

use crate::domain::errors::BrokerError;
use crate::domain::market::{
    Balance, DailyBar, Holding, KstTime, ListedSymbol, OrderResult, OrderSide, OrderType, PnlItem,
    StockPrice,
};
use crate::domain::ports::{BrokerService, Clock};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;
const BALANCE_CACHE_SECS: i64 = 10;
const HOLDINGS_CACHE_SECS: i64 = 60;
const MIN_DAILY_BARS: usize = 260;

#[derive(Debug, Clone)]
pub struct KisConfig {
    pub base_url: String,
    pub app_key: String,
    pub app_secret: String,
    pub account_no: String,
    /// Paper-trading endpoints use different transaction ids.
    pub is_paper: bool,
}

struct TokenState {
    access_token: String,
    expires_at: KstTime,
}

pub struct KisRestClient {
    http: ClientWithMiddleware,
    config: KisConfig,
    clock: Arc<dyn Clock>,
    // tokio::Mutex so a refresh in flight blocks other requesters: exactly
    // one refresh runs, everyone else waits on it.
    token: Mutex<Option<TokenState>>,
    balance_cache: RwLock<Option<(KstTime, Balance)>>,
    holdings_cache: RwLock<Option<(KstTime, Vec<Holding>)>>,
}

impl KisRestClient {
    pub fn new(config: KisConfig, clock: Arc<dyn Clock>) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        let http = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            http,
            config,
            clock,
            token: Mutex::new(None),
            balance_cache: RwLock::new(None),
            holdings_cache: RwLock::new(None),
        }
    }

    fn tr_id(&self, live: &'static str, paper: &'static str) -> &'static str {
        if self.config.is_paper { paper } else { live }
    }

    /// Valid access token, refreshing when it is within five minutes of
    /// expiry. The mutex makes the refresh single-flight per process.
    async fn access_token(&self) -> Result<String, BrokerError> {
        let mut guard = self.token.lock().await;
        let now = self.clock.now();
        if let Some(token) = guard.as_ref()
            && token.expires_at - now > Duration::seconds(TOKEN_REFRESH_MARGIN_SECS)
        {
            return Ok(token.access_token.clone());
        }

        let url = format!("{}/oauth2/tokenP", self.config.base_url);
        let body = json!({
            "grant_type": "client_credentials",
            "appkey": self.config.app_key,
            "appsecret": self.config.app_secret,
        });
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(transient)?;
        if !response.status().is_success() {
            return Err(BrokerError::Auth {
                reason: format!("token endpoint returned {}", response.status()),
            });
        }
        let payload: Value = response.json().await.map_err(malformed)?;
        let access_token = payload["access_token"]
            .as_str()
            .ok_or_else(|| BrokerError::Auth {
                reason: "token response missing access_token".to_string(),
            })?
            .to_string();
        let expires_in = payload["expires_in"].as_i64().unwrap_or(86_400);

        info!("KisRestClient: access token refreshed (expires in {expires_in}s)");
        *guard = Some(TokenState {
            access_token: access_token.clone(),
            expires_at: now + Duration::seconds(expires_in),
        });
        Ok(access_token)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn get(
        &self,
        path: &str,
        tr_id: &str,
        query: &[(&str, String)],
    ) -> Result<Value, BrokerError> {
        // One retry after a token invalidation covers mid-session expiry.
        for attempt in 0..2 {
            let token = self.access_token().await?;
            let url = format!("{}{path}", self.config.base_url);
            let response = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .header("appkey", &self.config.app_key)
                .header("appsecret", &self.config.app_secret)
                .header("tr_id", tr_id)
                .query(query)
                .send()
                .await
                .map_err(transient)?;

            if response.status() == reqwest::StatusCode::UNAUTHORIZED && attempt == 0 {
                warn!("KisRestClient: 401 on {path}, refreshing token");
                self.invalidate_token().await;
                continue;
            }
            if response.status().is_server_error() {
                return Err(BrokerError::Transient {
                    reason: format!("{path} returned {}", response.status()),
                });
            }
            if !response.status().is_success() {
                return Err(BrokerError::Rejected {
                    reason: format!("{path} returned {}", response.status()),
                });
            }
            return response.json().await.map_err(malformed);
        }
        Err(BrokerError::Auth {
            reason: "token refresh retry exhausted".to_string(),
        })
    }

    async fn post(&self, path: &str, tr_id: &str, body: Value) -> Result<Value, BrokerError> {
        for attempt in 0..2 {
            let token = self.access_token().await?;
            let url = format!("{}{path}", self.config.base_url);
            let response = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .header("appkey", &self.config.app_key)
                .header("appsecret", &self.config.app_secret)
                .header("tr_id", tr_id)
                .json(&body)
                .send()
                .await
                .map_err(transient)?;

            if response.status() == reqwest::StatusCode::UNAUTHORIZED && attempt == 0 {
                self.invalidate_token().await;
                continue;
            }
            if response.status().is_server_error() {
                return Err(BrokerError::Transient {
                    reason: format!("{path} returned {}", response.status()),
                });
            }
            return response.json().await.map_err(malformed);
        }
        Err(BrokerError::Auth {
            reason: "token refresh retry exhausted".to_string(),
        })
    }

    fn order_result_from(payload: &Value) -> OrderResult {
        let rt_cd = payload["rt_cd"].as_str().unwrap_or("");
        let message = payload["msg1"].as_str().unwrap_or("").trim().to_string();
        if rt_cd == "0" {
            let order_no = payload["output"]["ODNO"].as_str().unwrap_or("").to_string();
            OrderResult::submitted(order_no)
        } else {
            OrderResult::rejected(message)
        }
    }

    /// Current quote, used to re-price market orders on the limit-only book.
    async fn quoted_price(&self, symbol: &str) -> Result<i64, BrokerError> {
        let price = self
            .get_stock_price(symbol)
            .await?
            .map(|p| p.current_price)
            .unwrap_or(0);
        if price <= 0 {
            return Err(BrokerError::Malformed {
                reason: format!("no quote available for {symbol}"),
            });
        }
        Ok(price)
    }
}

fn transient<E: std::fmt::Display>(e: E) -> BrokerError {
    BrokerError::Transient {
        reason: e.to_string(),
    }
}

fn malformed<E: std::fmt::Display>(e: E) -> BrokerError {
    BrokerError::Malformed {
        reason: e.to_string(),
    }
}

/// The venue sends numerics as strings, sometimes signed, sometimes empty.
fn parse_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().trim_start_matches('+').parse().unwrap_or(0),
        _ => 0,
    }
}

fn parse_f64(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().trim_start_matches('+').parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.as_str()?.trim(), "%Y%m%d").ok()
}

#[async_trait]
impl BrokerService for KisRestClient {
    async fn get_stock_price(&self, symbol: &str) -> Result<Option<StockPrice>, BrokerError> {
        let payload = self
            .get(
                "/uapi/domestic-stock/v1/quotations/inquire-price",
                "FHKST01010100",
                &[
                    ("FID_COND_MRKT_DIV_CODE", "J".to_string()),
                    ("FID_INPUT_ISCD", symbol.to_string()),
                ],
            )
            .await?;

        let output = &payload["output"];
        if output.is_null() {
            return Ok(None);
        }
        let current_price = parse_i64(&output["stck_prpr"]);
        if current_price <= 0 {
            return Ok(None);
        }
        Ok(Some(StockPrice {
            symbol: symbol.to_string(),
            current_price,
            change: parse_i64(&output["prdy_vrss"]),
            change_rate: parse_f64(&output["prdy_ctrt"]),
            volume: parse_i64(&output["acml_vol"]),
        }))
    }

    async fn get_daily_prices(
        &self,
        symbol: &str,
        end_date: Option<NaiveDate>,
    ) -> Result<Vec<DailyBar>, BrokerError> {
        let mut bars: Vec<DailyBar> = Vec::new();
        let mut until = end_date.unwrap_or_else(|| self.clock.today());

        // The chart endpoint serves ~100 bars per window; walk backwards
        // until we have a year's worth.
        while bars.len() < MIN_DAILY_BARS {
            let start = until - Duration::days(170);
            let payload = self
                .get(
                    "/uapi/domestic-stock/v1/quotations/inquire-daily-itemchartprice",
                    "FHKST03010100",
                    &[
                        ("FID_COND_MRKT_DIV_CODE", "J".to_string()),
                        ("FID_INPUT_ISCD", symbol.to_string()),
                        ("FID_INPUT_DATE_1", start.format("%Y%m%d").to_string()),
                        ("FID_INPUT_DATE_2", until.format("%Y%m%d").to_string()),
                        ("FID_PERIOD_DIV_CODE", "D".to_string()),
                        ("FID_ORG_ADJ_PRC", "0".to_string()),
                    ],
                )
                .await?;

            let Some(rows) = payload["output2"].as_array() else {
                break;
            };
            let mut batch: Vec<DailyBar> = rows
                .iter()
                .filter_map(|row| {
                    let date = parse_date(&row["stck_bsop_date"])?;
                    let close = parse_i64(&row["stck_clpr"]);
                    if close <= 0 {
                        return None;
                    }
                    Some(DailyBar {
                        date,
                        open: parse_i64(&row["stck_oprc"]),
                        high: parse_i64(&row["stck_hgpr"]),
                        low: parse_i64(&row["stck_lwpr"]),
                        close,
                        volume: parse_i64(&row["acml_vol"]),
                    })
                })
                .collect();
            if batch.is_empty() {
                break;
            }
            // Latest first within a window; keep the overall ordering.
            batch.sort_by(|a, b| b.date.cmp(&a.date));
            let oldest = batch.last().map(|b| b.date);
            bars.extend(batch);
            match oldest {
                Some(date) if date < until => until = date - Duration::days(1),
                _ => break,
            }
        }

        Ok(bars)
    }

    async fn get_balance(&self) -> Result<Balance, BrokerError> {
        let now = self.clock.now();
        {
            let cache = self.balance_cache.read().await;
            if let Some((at, balance)) = cache.as_ref()
                && now - *at < Duration::seconds(BALANCE_CACHE_SECS)
            {
                return Ok(balance.clone());
            }
        }

        let payload = self
            .get(
                "/uapi/domestic-stock/v1/trading/inquire-balance",
                self.tr_id("TTTC8434R", "VTTC8434R"),
                &[
                    ("CANO", self.config.account_no.clone()),
                    ("ACNT_PRDT_CD", "01".to_string()),
                    ("AFHR_FLPR_YN", "N".to_string()),
                    ("INQR_DVSN", "02".to_string()),
                    ("UNPR_DVSN", "01".to_string()),
                    ("FUND_STTL_ICLD_YN", "N".to_string()),
                    ("FNCG_AMT_AUTO_RDPT_YN", "N".to_string()),
                    ("PRCS_DVSN", "00".to_string()),
                    ("CTX_AREA_FK100", String::new()),
                    ("CTX_AREA_NK100", String::new()),
                ],
            )
            .await?;

        let summary = payload["output2"]
            .as_array()
            .and_then(|rows| rows.first())
            .cloned()
            .unwrap_or(Value::Null);
        let balance = Balance {
            total_deposit: parse_i64(&summary["dnca_tot_amt"]),
            available_amount: parse_i64(&summary["prvs_rcdl_excc_amt"]),
            total_purchase: parse_i64(&summary["pchs_amt_smtl_amt"]),
            total_evaluation: parse_i64(&summary["evlu_amt_smtl_amt"]),
            total_profit_loss: parse_i64(&summary["evlu_pfls_smtl_amt"]),
            profit_rate: parse_f64(&summary["asst_icdc_erng_rt"]),
        };

        *self.balance_cache.write().await = Some((now, balance.clone()));
        Ok(balance)
    }

    async fn get_holdings(&self) -> Result<Vec<Holding>, BrokerError> {
        let now = self.clock.now();
        {
            let cache = self.holdings_cache.read().await;
            if let Some((at, holdings)) = cache.as_ref()
                && now - *at < Duration::seconds(HOLDINGS_CACHE_SECS)
            {
                return Ok(holdings.clone());
            }
        }

        let payload = self
            .get(
                "/uapi/domestic-stock/v1/trading/inquire-balance",
                self.tr_id("TTTC8434R", "VTTC8434R"),
                &[
                    ("CANO", self.config.account_no.clone()),
                    ("ACNT_PRDT_CD", "01".to_string()),
                    ("AFHR_FLPR_YN", "N".to_string()),
                    ("INQR_DVSN", "02".to_string()),
                    ("UNPR_DVSN", "01".to_string()),
                    ("FUND_STTL_ICLD_YN", "N".to_string()),
                    ("FNCG_AMT_AUTO_RDPT_YN", "N".to_string()),
                    ("PRCS_DVSN", "00".to_string()),
                    ("CTX_AREA_FK100", String::new()),
                    ("CTX_AREA_NK100", String::new()),
                ],
            )
            .await?;

        let holdings: Vec<Holding> = payload["output1"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter(|row| parse_i64(&row["hldg_qty"]) > 0)
                    .map(|row| Holding {
                        symbol: row["pdno"].as_str().unwrap_or("").to_string(),
                        name: row["prdt_name"].as_str().unwrap_or("").trim().to_string(),
                        quantity: parse_i64(&row["hldg_qty"]),
                        avg_price: parse_i64(&row["pchs_avg_pric"]),
                        current_price: parse_i64(&row["prpr"]),
                        evaluation: parse_i64(&row["evlu_amt"]),
                        profit_loss: parse_i64(&row["evlu_pfls_amt"]),
                        profit_rate: parse_f64(&row["evlu_pfls_rt"]),
                    })
                    .collect()
            })
            .unwrap_or_default();

        *self.holdings_cache.write().await = Some((now, holdings.clone()));
        Ok(holdings)
    }

    async fn get_realized_pnl(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PnlItem>, BrokerError> {
        let mut items = Vec::new();
        let mut fk = String::new();
        let mut nk = String::new();

        // Continuation-token pagination, hidden from callers.
        loop {
            let payload = self
                .get(
                    "/uapi/domestic-stock/v1/trading/inquire-period-trade-profit",
                    self.tr_id("TTTC8715R", "VTTC8715R"),
                    &[
                        ("CANO", self.config.account_no.clone()),
                        ("ACNT_PRDT_CD", "01".to_string()),
                        ("INQR_STRT_DT", start.format("%Y%m%d").to_string()),
                        ("INQR_END_DT", end.format("%Y%m%d").to_string()),
                        ("SORT_DVSN", "00".to_string()),
                        ("INQR_DVSN", "00".to_string()),
                        ("CBLC_DVSN", "00".to_string()),
                        ("CTX_AREA_FK100", fk.clone()),
                        ("CTX_AREA_NK100", nk.clone()),
                    ],
                )
                .await?;

            if let Some(rows) = payload["output1"].as_array() {
                for row in rows {
                    let Some(trade_date) = parse_date(&row["trad_dt"]) else {
                        continue;
                    };
                    items.push(PnlItem {
                        trade_date,
                        symbol: row["pdno"].as_str().unwrap_or("").to_string(),
                        name: row["prdt_name"].as_str().unwrap_or("").trim().to_string(),
                        quantity: parse_i64(&row["sll_qty"]),
                        sell_price: parse_i64(&row["sll_pric"]),
                        buy_price: parse_i64(&row["pchs_unpr"]),
                        profit_loss: parse_i64(&row["rlzt_pfls"]),
                        profit_rate: parse_f64(&row["pfls_rt"]),
                    });
                }
            }

            let next_fk = payload["ctx_area_fk100"].as_str().unwrap_or("").trim();
            let next_nk = payload["ctx_area_nk100"].as_str().unwrap_or("").trim();
            if next_nk.is_empty() || next_nk == nk {
                break;
            }
            fk = next_fk.to_string();
            nk = next_nk.to_string();
        }

        Ok(items)
    }

    async fn place_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: i64,
        price: i64,
        order_type: OrderType,
    ) -> Result<OrderResult, BrokerError> {
        if quantity <= 0 {
            return Ok(OrderResult::rejected("quantity must be positive"));
        }

        // The venue only takes limit orders; market intent is expressed as
        // a limit at the current quote.
        let (ord_dvsn, order_price) = match order_type {
            OrderType::Limit if price > 0 => ("00", price),
            _ => ("00", self.quoted_price(symbol).await?),
        };

        let tr_id = match side {
            OrderSide::Buy => self.tr_id("TTTC0802U", "VTTC0802U"),
            OrderSide::Sell => self.tr_id("TTTC0801U", "VTTC0801U"),
        };
        let body = json!({
            "CANO": self.config.account_no,
            "ACNT_PRDT_CD": "01",
            "PDNO": symbol,
            "ORD_DVSN": ord_dvsn,
            "ORD_QTY": quantity.to_string(),
            "ORD_UNPR": order_price.to_string(),
        });

        let payload = self
            .post("/uapi/domestic-stock/v1/trading/order-cash", tr_id, body)
            .await?;
        let result = Self::order_result_from(&payload);
        match result.status {
            crate::domain::market::OrderOutcome::Submitted => info!(
                "KisRestClient: {side} {symbol} x {quantity} @ {order_price} submitted \
                 (order {})",
                result.order_no.as_deref().unwrap_or("-")
            ),
            _ => warn!(
                "KisRestClient: {side} {symbol} x {quantity} rejected: {}",
                result.message
            ),
        }
        Ok(result)
    }

    async fn cancel_order(
        &self,
        order_no: &str,
        symbol: &str,
        quantity: i64,
    ) -> Result<OrderResult, BrokerError> {
        let body = json!({
            "CANO": self.config.account_no,
            "ACNT_PRDT_CD": "01",
            "KRX_FWDG_ORD_ORGNO": "",
            "ORGN_ODNO": order_no,
            "PDNO": symbol,
            "ORD_DVSN": "00",
            "RVSE_CNCL_DVSN_CD": "02",
            "ORD_QTY": quantity.to_string(),
            "ORD_UNPR": "0",
            "QTY_ALL_ORD_YN": "Y",
        });
        let payload = self
            .post(
                "/uapi/domestic-stock/v1/trading/order-rvsecncl",
                self.tr_id("TTTC0803U", "VTTC0803U"),
                body,
            )
            .await?;
        Ok(Self::order_result_from(&payload))
    }

    async fn modify_order(
        &self,
        order_no: &str,
        symbol: &str,
        quantity: i64,
        price: i64,
    ) -> Result<OrderResult, BrokerError> {
        let body = json!({
            "CANO": self.config.account_no,
            "ACNT_PRDT_CD": "01",
            "KRX_FWDG_ORD_ORGNO": "",
            "ORGN_ODNO": order_no,
            "PDNO": symbol,
            "ORD_DVSN": "00",
            "RVSE_CNCL_DVSN_CD": "01",
            "ORD_QTY": quantity.to_string(),
            "ORD_UNPR": price.to_string(),
            "QTY_ALL_ORD_YN": "N",
        });
        let payload = self
            .post(
                "/uapi/domestic-stock/v1/trading/order-rvsecncl",
                self.tr_id("TTTC0803U", "VTTC0803U"),
                body,
            )
            .await?;
        Ok(Self::order_result_from(&payload))
    }

    async fn list_market_symbols(&self, market: &str) -> Result<Vec<ListedSymbol>, BrokerError> {
        let payload = self
            .get(
                "/uapi/domestic-stock/v1/quotations/psearch-result",
                "HHKST03900400",
                &[("user_id", String::new()), ("seq", market.to_string())],
            )
            .await?;

        Ok(payload["output2"]
            .as_array()
            .map(|rows| {
                rows.iter()
                    .filter_map(|row| {
                        let symbol = row["code"].as_str()?.to_string();
                        Some(ListedSymbol {
                            symbol,
                            name: row["name"].as_str().unwrap_or("").to_string(),
                            market: market.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signed_strings() {
        assert_eq!(parse_i64(&json!("70000")), 70_000);
        assert_eq!(parse_i64(&json!("+1200")), 1_200);
        assert_eq!(parse_i64(&json!("-300")), -300);
        assert_eq!(parse_i64(&json!("")), 0);
        assert_eq!(parse_i64(&json!(null)), 0);

        assert_eq!(parse_f64(&json!("+1.72")), 1.72);
        assert_eq!(parse_f64(&json!("-0.55")), -0.55);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date(&json!("20260803")),
            NaiveDate::from_ymd_opt(2026, 8, 3)
        );
        assert_eq!(parse_date(&json!("not-a-date")), None);
    }

    #[test]
    fn test_order_result_mapping() {
        let ok = json!({ "rt_cd": "0", "msg1": "ok", "output": { "ODNO": "0001234567" } });
        let result = KisRestClient::order_result_from(&ok);
        assert_eq!(result.status, crate::domain::market::OrderOutcome::Submitted);
        assert_eq!(result.order_no.as_deref(), Some("0001234567"));

        let bad = json!({ "rt_cd": "1", "msg1": "insufficient deposit" });
        let result = KisRestClient::order_result_from(&bad);
        assert_eq!(result.status, crate::domain::market::OrderOutcome::Rejected);
        assert!(result.message.contains("insufficient"));
    }
}
