//! Quant signal scanner: daily bars -> indicators -> triggers -> scan result.
//!
//! Results live in a symbol map plus a score-ordered index so "top N by
//! score" is a cheap ordered read.

use crate::application::signals::indicators::IndicatorCalculator;
use crate::application::signals::triggers::TriggerEvaluator;
use crate::domain::events::TradingEvent;
use crate::domain::ports::{BrokerService, Clock};
use crate::domain::signals::{ScanResult, TriggerVote};
use crate::infrastructure::event_bus::EventBus;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info, warn};

#[derive(Default)]
struct ScanIndex {
    by_symbol: HashMap<String, ScanResult>,
    // (score, symbol) pairs; iteration in reverse is score-descending.
    by_score: BTreeSet<(i64, String)>,
}

impl ScanIndex {
    fn store(&mut self, result: ScanResult) {
        if let Some(prev) = self.by_symbol.get(&result.symbol) {
            self.by_score.remove(&(prev.composite_score, prev.symbol.clone()));
        }
        self.by_score.insert((result.composite_score, result.symbol.clone()));
        self.by_symbol.insert(result.symbol.clone(), result);
    }

    fn top(&self, limit: usize) -> Vec<ScanResult> {
        self.by_score
            .iter()
            .rev()
            .take(limit)
            .filter_map(|(_, symbol)| self.by_symbol.get(symbol).cloned())
            .collect()
    }
}

pub struct SignalScanner {
    broker: Arc<dyn BrokerService>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    results: RwLock<ScanIndex>,
    is_scanning: AtomicBool,
}

impl SignalScanner {
    pub fn new(broker: Arc<dyn BrokerService>, clock: Arc<dyn Clock>, event_bus: EventBus) -> Self {
        Self {
            broker,
            clock,
            event_bus,
            results: RwLock::new(ScanIndex::default()),
            is_scanning: AtomicBool::new(false),
        }
    }

    /// Scan one symbol. None when bar data is missing or too short, which
    /// the caller treats as an analysis failure.
    pub async fn scan_symbol(&self, symbol: &str, company_name: &str) -> Option<ScanResult> {
        let bars = match self.broker.get_daily_prices(symbol, None).await {
            Ok(bars) => bars,
            Err(e) => {
                warn!("Scanner [{symbol}]: daily price fetch failed: {e}");
                return None;
            }
        };

        let snapshot = IndicatorCalculator::calculate(symbol, &bars);
        if snapshot.is_empty() {
            warn!("Scanner [{symbol}]: only {} bars, skipping", bars.len());
            return None;
        }

        let triggers = TriggerEvaluator::evaluate_all(&snapshot);
        let composite_score = TriggerEvaluator::composite_score(&triggers);
        let action = TriggerEvaluator::determine_action(composite_score);

        let bullish = triggers.iter().filter(|t| t.vote == TriggerVote::Bullish).count();
        let bearish = triggers.iter().filter(|t| t.vote == TriggerVote::Bearish).count();
        let neutral = triggers.iter().filter(|t| t.vote == TriggerVote::Neutral).count();

        let result = ScanResult {
            symbol: symbol.to_string(),
            company_name: company_name.to_string(),
            indicators: snapshot,
            triggers,
            composite_score,
            bullish_count: bullish,
            bearish_count: bearish,
            neutral_count: neutral,
            action,
            scanned_at: self.clock.now(),
        };

        self.results.write().await.store(result.clone());

        debug!(
            "Scanner [{symbol}]: score {composite_score}/100 action {action} \
             (bull {bullish} / bear {bearish} / neutral {neutral})"
        );

        Some(result)
    }

    /// Scan a universe with bounded concurrency. Returns the successful
    /// results, score-descending.
    pub async fn scan_watchlist(
        &self,
        universe: &[(String, String)],
        max_concurrent: usize,
    ) -> Vec<ScanResult> {
        self.is_scanning.store(true, Ordering::SeqCst);
        let total = universe.len();
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let scanned = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(total);
        for (symbol, name) in universe.iter().cloned() {
            let semaphore = Arc::clone(&semaphore);
            let scanned = Arc::clone(&scanned);
            let scanner = self;
            handles.push(async move {
                let _permit = semaphore.acquire().await.expect("semaphore never closed");
                let result = scanner.scan_symbol(&symbol, &name).await;

                // Progress notification every 50 symbols and at the end.
                let done = scanned.fetch_add(1, Ordering::SeqCst) + 1;
                if done % 50 == 0 || done == total {
                    scanner
                        .event_bus
                        .publish(TradingEvent::ScanProgress {
                            current: done,
                            total,
                            symbol,
                            score: result.as_ref().map(|r| r.composite_score),
                        })
                        .await;
                }
                result
            });
        }

        let mut results: Vec<ScanResult> = futures::future::join_all(handles)
            .await
            .into_iter()
            .flatten()
            .collect();

        results.sort_by(|a, b| b.composite_score.cmp(&a.composite_score));
        self.is_scanning.store(false, Ordering::SeqCst);

        self.event_bus
            .publish(TradingEvent::ScanCompleted {
                scanned: total,
                results: results.len(),
            })
            .await;

        info!("Scanner: {total} symbols scanned, {} results", results.len());
        results
    }

    pub async fn top_signals(&self, limit: usize) -> Vec<ScanResult> {
        self.results.read().await.top(limit)
    }

    pub async fn latest(&self, symbol: &str) -> Option<ScanResult> {
        self.results.read().await.by_symbol.get(symbol).cloned()
    }

    pub fn is_scanning(&self) -> bool {
        self.is_scanning.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::broker::mock::MockBroker;
    use crate::infrastructure::clock::ManualClock;

    fn scanner_with(broker: Arc<MockBroker>) -> SignalScanner {
        let clock = Arc::new(ManualClock::at(2026, 8, 3, 10, 0));
        SignalScanner::new(broker, clock, EventBus::new())
    }

    #[tokio::test]
    async fn test_scan_symbol_scores_uptrend_above_downtrend() {
        let broker = Arc::new(MockBroker::new());
        broker.set_daily_prices("UP", MockBroker::trending_bars(260, 10_000, 60)).await;
        broker.set_daily_prices("DOWN", MockBroker::trending_bars(260, 40_000, -60)).await;

        let scanner = scanner_with(Arc::clone(&broker));
        let up = scanner.scan_symbol("UP", "Uptrend Co").await.unwrap();
        let down = scanner.scan_symbol("DOWN", "Downtrend Co").await.unwrap();

        assert!(up.composite_score > down.composite_score);
        assert_eq!(up.triggers.len(), 42);
    }

    #[tokio::test]
    async fn test_scan_symbol_short_history_is_failure() {
        let broker = Arc::new(MockBroker::new());
        broker.set_daily_prices("NEW", MockBroker::trending_bars(10, 10_000, 0)).await;

        let scanner = scanner_with(broker);
        assert!(scanner.scan_symbol("NEW", "Fresh Listing").await.is_none());
    }

    #[tokio::test]
    async fn test_top_signals_order_and_replacement() {
        let broker = Arc::new(MockBroker::new());
        broker.set_daily_prices("A", MockBroker::trending_bars(260, 10_000, 80)).await;
        broker.set_daily_prices("B", MockBroker::trending_bars(260, 10_000, -80)).await;

        let scanner = scanner_with(Arc::clone(&broker));
        scanner.scan_symbol("A", "A Corp").await.unwrap();
        scanner.scan_symbol("B", "B Corp").await.unwrap();

        let top = scanner.top_signals(10).await;
        assert_eq!(top.len(), 2);
        assert!(top[0].composite_score >= top[1].composite_score);

        // Re-scanning a symbol replaces its previous entry instead of
        // duplicating it.
        scanner.scan_symbol("A", "A Corp").await.unwrap();
        assert_eq!(scanner.top_signals(10).await.len(), 2);
    }
}
