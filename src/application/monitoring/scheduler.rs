//! Monitoring scheduler: the long-lived task that keeps holdings, the
//! execution queue and the analysis budget reconciled.
//!
//! Jobs are single-instance by name (named lock) and respect the global
//! stop signal: once it flips, no new job starts and in-flight work
//! finishes its current step.

use crate::application::council::cost_manager::{AnalysisDepth, CostManager, SignalPriority};
use crate::application::council::execution::ExecutionPipeline;
use crate::application::council::orchestrator::{CouncilOrchestrator, MeetingRequest};
use crate::application::council::risk_gate::RiskConfig;
use crate::application::monitoring::price_watch;
use crate::application::signals::scanner::SignalScanner;
use crate::domain::calendar::MarketCalendar;
use crate::domain::council::TriggerSource;
use crate::domain::market::{Holding, KstTime};
use crate::domain::ports::{BrokerService, Clock, ExpiringSet, NamedLock};
use crate::domain::repositories::SignalRepository;
use crate::domain::signals::ScanAction;
use chrono::{Duration as ChronoDuration, NaiveDate, Timelike};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::{RwLock, watch};
use tokio::time::{self, Duration};
use tracing::{error, info, warn};

// Symbols scanned when neither the broker listing nor a previous refresh is
// available.
const FALLBACK_UNIVERSE: [&str; 10] = [
    "005930", "000660", "035420", "035720", "051910", "006400", "005380", "068270", "028260",
    "207940",
];

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub price_sweep_interval_secs: u64,
    pub queue_drain_interval_secs: u64,
    pub scan_interval_secs: u64,
    pub expiry_sweep_interval_secs: u64,
    pub sell_cooldown_seconds: i64,
    pub quant_buy_cooldown_seconds: i64,
    /// Composite score a quant BUY needs before a council is convened.
    pub quant_buy_score_threshold: i64,
    /// Mapped 1..=10 trigger score a candidate needs to convene a council.
    pub council_score_threshold: i64,
    /// Technical subscore (1..=10) at or below which a holding is escalated.
    pub technical_sell_threshold: i64,
    pub max_buy_meetings_per_scan: usize,
    pub max_concurrent_scans: usize,
    pub universe_limit: usize,
    /// Local time of the end-of-day rebalance run.
    pub rebalance_hour: u32,
    pub rebalance_minute: u32,
    /// Cap on the available amount exposed to one council meeting.
    pub max_amount_per_meeting: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            price_sweep_interval_secs: 60,
            queue_drain_interval_secs: 60,
            scan_interval_secs: 600,
            expiry_sweep_interval_secs: 600,
            sell_cooldown_seconds: 1800,
            quant_buy_cooldown_seconds: 3600,
            quant_buy_score_threshold: 75,
            council_score_threshold: 7,
            technical_sell_threshold: 3,
            max_buy_meetings_per_scan: 3,
            max_concurrent_scans: 5,
            universe_limit: 500,
            rebalance_hour: 15,
            rebalance_minute: 40,
            max_amount_per_meeting: 5_000_000,
        }
    }
}

#[derive(Default)]
struct DailyState {
    last_rebalance_day: Option<NaiveDate>,
    last_universe_day: Option<NaiveDate>,
}

pub struct MonitoringScheduler {
    orchestrator: Arc<CouncilOrchestrator>,
    pipeline: Arc<ExecutionPipeline>,
    scanner: Arc<SignalScanner>,
    broker: Arc<dyn BrokerService>,
    repository: Arc<dyn SignalRepository>,
    cost_manager: Arc<CostManager>,
    cooldowns: Arc<dyn ExpiringSet>,
    locks: Arc<dyn NamedLock>,
    calendar: MarketCalendar,
    clock: Arc<dyn Clock>,
    risk_config: RiskConfig,
    config: SchedulerConfig,
    universe: RwLock<Vec<(String, String)>>,
    holdings_cache: RwLock<Option<(KstTime, Vec<Holding>)>>,
    daily: Mutex<DailyState>,
}

impl MonitoringScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        orchestrator: Arc<CouncilOrchestrator>,
        pipeline: Arc<ExecutionPipeline>,
        scanner: Arc<SignalScanner>,
        broker: Arc<dyn BrokerService>,
        repository: Arc<dyn SignalRepository>,
        cost_manager: Arc<CostManager>,
        cooldowns: Arc<dyn ExpiringSet>,
        locks: Arc<dyn NamedLock>,
        calendar: MarketCalendar,
        clock: Arc<dyn Clock>,
        risk_config: RiskConfig,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            orchestrator,
            pipeline,
            scanner,
            broker,
            repository,
            cost_manager,
            cooldowns,
            locks,
            calendar,
            clock,
            risk_config,
            config,
            universe: RwLock::new(Vec::new()),
            holdings_cache: RwLock::new(None),
            daily: Mutex::new(DailyState::default()),
        }
    }

    /// Main loop. Runs until the stop signal flips to true.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) {
        info!(
            "MonitoringScheduler started (sweep {}s, drain {}s, scan {}s)",
            self.config.price_sweep_interval_secs,
            self.config.queue_drain_interval_secs,
            self.config.scan_interval_secs
        );

        let mut sweep = time::interval(Duration::from_secs(self.config.price_sweep_interval_secs));
        let mut drain = time::interval(Duration::from_secs(self.config.queue_drain_interval_secs));
        let mut scan = time::interval(Duration::from_secs(self.config.scan_interval_secs));
        let mut expiry =
            time::interval(Duration::from_secs(self.config.expiry_sweep_interval_secs));
        // Daily jobs piggyback on a coarse housekeeping tick.
        let mut housekeeping = time::interval(Duration::from_secs(60));

        // The first tick of every interval completes immediately.
        sweep.tick().await;
        drain.tick().await;
        scan.tick().await;
        expiry.tick().await;
        housekeeping.tick().await;

        loop {
            tokio::select! {
                changed = stop.changed() => {
                    // A dropped sender also means shutdown.
                    if changed.is_err() || *stop.borrow() {
                        info!("MonitoringScheduler: stop signal received, shutting down");
                        return;
                    }
                }
                _ = sweep.tick() => self.price_sweep().await,
                _ = drain.tick() => self.drain_queue().await,
                _ = scan.tick() => self.run_quant_scan().await,
                _ = expiry.tick() => self.expiry_sweep().await,
                _ = housekeeping.tick() => self.daily_jobs().await,
            }
        }
    }

    /// Walk all holdings and fire sell meetings on price triggers.
    /// Cooldown-bounded per symbol.
    pub async fn price_sweep(&self) {
        if !self.calendar.can_execute(self.clock.now()).0 {
            return;
        }
        if !self.locks.acquire("job:price_sweep", 300) {
            return;
        }

        let holdings = self.cached_holdings().await;
        for holding in holdings.iter().filter(|h| h.quantity > 0) {
            let cooldown_key = format!("sell_monitor:cooldown:{}", holding.symbol);
            if self.cooldowns.contains(&cooldown_key) {
                continue;
            }

            let signal_prices = match self.repository.active_buy_prices(&holding.symbol).await {
                Ok(Some((stop, target, _))) => (stop, target),
                Ok(None) => (None, None),
                Err(e) => {
                    warn!("Scheduler: signal price lookup for {} failed: {e}", holding.symbol);
                    (None, None)
                }
            };

            let mut matched =
                price_watch::evaluate_price_triggers(holding, signal_prices, &self.risk_config);
            if matched.is_none() {
                // Cheap checks passed; pay for a fresh technical pass.
                if let Some(scan) = self.scanner.scan_symbol(&holding.symbol, &holding.name).await
                {
                    matched = price_watch::technical_trigger(
                        &scan,
                        self.config.technical_sell_threshold,
                    );
                }
            }

            if let Some((kind, reason)) = matched {
                info!(
                    "Scheduler: sell trigger for {} ({}): {kind:?} - {reason}",
                    holding.symbol, holding.name
                );
                self.cooldowns
                    .insert(&cooldown_key, self.config.sell_cooldown_seconds);
                self.orchestrator
                    .start_sell_meeting(
                        &holding.symbol,
                        &holding.name,
                        &reason,
                        holding.quantity,
                        holding.avg_price,
                        holding.current_price,
                    )
                    .await;
            }
        }

        self.locks.release("job:price_sweep");
    }

    /// Submit queued signals once the session allows it.
    pub async fn drain_queue(&self) {
        if !self.locks.acquire("job:queue_drain", 300) {
            return;
        }
        self.pipeline.process_queue().await;
        self.locks.release("job:queue_drain");
    }

    /// Expire pending signals that nobody approved within a day.
    pub async fn expiry_sweep(&self) {
        self.pipeline.expire_stale().await;
    }

    /// Scan the universe and cross-check the verdicts against the book:
    /// sell verdicts on holdings convene sell meetings, strong buy verdicts
    /// on new names convene councils.
    pub async fn run_quant_scan(&self) {
        if !self.calendar.can_execute(self.clock.now()).0 {
            return;
        }
        if !self.locks.acquire("job:quant_scan", 1800) {
            return;
        }

        let universe = self.scan_universe().await;
        info!("Scheduler: quant scan over {} symbols", universe.len());
        let results = self
            .scanner
            .scan_watchlist(&universe, self.config.max_concurrent_scans)
            .await;

        let sell_fired = self.check_sell_results(&results).await;
        let buy_fired = self.check_buy_results(&results).await;
        if sell_fired > 0 || buy_fired > 0 {
            info!("Scheduler: scan triggered {sell_fired} sell and {buy_fired} buy meeting(s)");
        }

        self.locks.release("job:quant_scan");
    }

    /// Cross-check scan SELL verdicts against the holdings, convening
    /// cooldown-bounded sell meetings. Returns the number fired.
    pub async fn check_sell_results(
        &self,
        results: &[crate::domain::signals::ScanResult],
    ) -> usize {
        let holdings = self.cached_holdings().await;
        if holdings.is_empty() {
            return 0;
        }
        let mut fired = 0usize;

        for result in results.iter().filter(|r| {
            matches!(r.action, ScanAction::Sell | ScanAction::StrongSell)
        }) {
            let Some(holding) = holdings
                .iter()
                .find(|h| h.symbol == result.symbol && h.quantity > 0)
            else {
                continue;
            };

            let cooldown_key = format!("sell_monitor:cooldown:{}", holding.symbol);
            if self.cooldowns.contains(&cooldown_key) {
                continue;
            }
            self.cooldowns
                .insert(&cooldown_key, self.config.sell_cooldown_seconds);

            let reason = format!(
                "quant scan {} (score {}/100, {} bearish triggers)",
                result.action, result.composite_score, result.bearish_count
            );
            self.orchestrator
                .start_sell_meeting(
                    &holding.symbol,
                    &holding.name,
                    &reason,
                    holding.quantity,
                    holding.avg_price,
                    holding.current_price,
                )
                .await;
            fired += 1;
        }
        fired
    }

    /// Cross-check strong scan BUY verdicts against symbols not yet held,
    /// convening at most `max_buy_meetings_per_scan` councils. Returns the
    /// number fired.
    pub async fn check_buy_results(
        &self,
        results: &[crate::domain::signals::ScanResult],
    ) -> usize {
        let holdings = self.cached_holdings().await;
        let held: Vec<&str> = holdings
            .iter()
            .filter(|h| h.quantity > 0)
            .map(|h| h.symbol.as_str())
            .collect();

        let candidates: Vec<_> = results
            .iter()
            .filter(|r| {
                matches!(r.action, ScanAction::StrongBuy | ScanAction::Buy)
                    && r.composite_score >= self.config.quant_buy_score_threshold
                    && !held.contains(&r.symbol.as_str())
            })
            .take(self.config.max_buy_meetings_per_scan)
            .collect();

        let mut fired = 0usize;
        for result in candidates {
            let cooldown_key = format!("quant_buy_council:cooldown:{}", result.symbol);
            if self.cooldowns.contains(&cooldown_key) {
                continue;
            }

            let mapped_score = if result.action == ScanAction::StrongBuy { 8 } else { 7 };
            if mapped_score < self.config.council_score_threshold {
                continue;
            }

            // Budget check before convening anything.
            let (depth, depth_reason) = self.cost_manager.determine_depth(
                mapped_score,
                &result.symbol,
                false,
                0.0,
                SignalPriority::Medium,
            );
            if depth < AnalysisDepth::Standard {
                info!(
                    "Scheduler: skipping council for {} (depth {depth}: {depth_reason})",
                    result.symbol
                );
                continue;
            }

            self.cooldowns
                .insert(&cooldown_key, self.config.quant_buy_cooldown_seconds);

            let available = match self.broker.get_balance().await {
                Ok(balance) if balance.available_amount > 0 => balance
                    .available_amount
                    .min(self.config.max_amount_per_meeting),
                Ok(_) => self.config.max_amount_per_meeting,
                Err(e) => {
                    warn!("Scheduler: balance fetch failed, using the cap: {e}");
                    self.config.max_amount_per_meeting
                }
            };

            let quant_triggers = json!({
                "composite_score": result.composite_score,
                "bullish_count": result.bullish_count,
                "bearish_count": result.bearish_count,
                "triggers": result
                    .triggers
                    .iter()
                    .filter(|t| t.vote != crate::domain::signals::TriggerVote::Neutral)
                    .map(|t| json!({
                        "id": t.id.code(),
                        "name": t.id.label(),
                        "signal": t.vote,
                        "score": t.score,
                        "details": t.details,
                    }))
                    .collect::<Vec<_>>(),
            });

            self.orchestrator
                .start_meeting(MeetingRequest {
                    symbol: result.symbol.clone(),
                    company_name: if result.company_name.is_empty() {
                        result.symbol.clone()
                    } else {
                        result.company_name.clone()
                    },
                    title: format!(
                        "Quant buy signal: {} (score {}/100, {} bullish triggers)",
                        result.action, result.composite_score, result.bullish_count
                    ),
                    trigger_score: mapped_score,
                    available_amount: available,
                    current_price: result.indicators.current_price,
                    trigger_source: TriggerSource::Quant,
                    quant_triggers: Some(quant_triggers),
                })
                .await;
            fired += 1;
        }
        fired
    }

    /// Once per trading day after the close: re-evaluate every holding,
    /// refresh targets/stops, escalate weak names, then sweep expired
    /// holding deadlines (the deadline path ignores the sell cooldown).
    pub async fn rebalance_and_deadline_sweep(&self) {
        let now = self.clock.now();
        if !self.calendar.is_trading_day(now) {
            info!("Scheduler: not a trading day, skipping rebalance");
            return;
        }
        if !self.locks.acquire("job:rebalance", 3600) {
            return;
        }

        let holdings = self.cached_holdings().await;
        if holdings.is_empty() {
            info!("Scheduler: no holdings, skipping rebalance");
            self.locks.release("job:rebalance");
            return;
        }

        info!("Scheduler: rebalance review over {} holding(s)", holdings.len());
        let mut reviewed = 0usize;
        let mut escalated = 0usize;

        for holding in holdings.iter().filter(|h| h.quantity > 0) {
            let (prev_stop, prev_target) =
                match self.repository.active_buy_prices(&holding.symbol).await {
                    Ok(Some((stop, target, _))) => (stop, target),
                    _ => (None, None),
                };

            let Some(review) = self
                .orchestrator
                .start_rebalance_review(
                    &holding.symbol,
                    &holding.name,
                    holding.quantity,
                    holding.avg_price,
                    holding.current_price,
                    prev_target,
                    prev_stop,
                )
                .await
            else {
                continue;
            };
            reviewed += 1;

            if review.new_target_price.is_some() || review.new_stop_loss.is_some() {
                let reason = format!(
                    "[rebalance {}] score={}, target: {} -> {}, stop: {} -> {}",
                    now.format("%m/%d"),
                    review.score,
                    fmt_price(prev_target),
                    fmt_price(review.new_target_price),
                    fmt_price(prev_stop),
                    fmt_price(review.new_stop_loss),
                );
                if let Err(e) = self
                    .repository
                    .update_active_buy_prices(
                        &holding.symbol,
                        review.new_target_price,
                        review.new_stop_loss,
                        &reason,
                    )
                    .await
                {
                    error!("Scheduler: price refresh for {} failed: {e}", holding.symbol);
                }
            }

            if review.recommend_sell {
                warn!(
                    "Scheduler: rebalance escalating {} (score {})",
                    holding.symbol, review.score
                );
                self.orchestrator
                    .start_sell_meeting(
                        &holding.symbol,
                        &holding.name,
                        &format!("weak rebalance score (score={})", review.score),
                        holding.quantity,
                        holding.avg_price,
                        review.current_price,
                    )
                    .await;
                escalated += 1;
            }
        }

        let deadline_fired = self.deadline_sweep(&holdings).await;
        info!(
            "Scheduler: rebalance done ({reviewed} reviewed, {escalated} escalated, \
             {deadline_fired} deadline-expired)"
        );
        self.locks.release("job:rebalance");
    }

    /// Active BUY signals whose holding deadline passed without the target
    /// being reached get escalated to a sell meeting. The sell cooldown is
    /// deliberately not consulted here.
    async fn deadline_sweep(&self, holdings: &[Holding]) -> usize {
        let today = self.clock.today();
        let expired = match self.repository.deadline_expired_buys(today).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Scheduler: deadline query failed: {e}");
                return 0;
            }
        };

        let mut fired = 0usize;
        for row in expired {
            let Some(holding) = holdings
                .iter()
                .find(|h| h.symbol == row.symbol && h.quantity > 0)
            else {
                continue;
            };
            if let Some(target) = row.target_price
                && holding.current_price >= target
            {
                // Target reached; the take-profit path owns this one.
                continue;
            }

            let deadline = row
                .holding_deadline
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default();
            info!(
                "Scheduler: holding deadline expired for {} (deadline {deadline}, current {}, \
                 target {:?})",
                row.symbol, holding.current_price, row.target_price
            );
            self.orchestrator
                .start_sell_meeting(
                    &holding.symbol,
                    &holding.name,
                    &format!(
                        "holding deadline expired ({deadline}): target unreached, freeing \
                         capital for redeployment"
                    ),
                    holding.quantity,
                    holding.avg_price,
                    holding.current_price,
                )
                .await;
            fired += 1;
        }
        fired
    }

    /// Refresh the scan universe from the broker listing, falling back to
    /// the blue-chip set.
    pub async fn refresh_universe(&self) {
        let mut listings = Vec::new();
        for market in ["KOSPI", "KOSDAQ"] {
            match self.broker.list_market_symbols(market).await {
                Ok(mut batch) => listings.append(&mut batch),
                Err(e) => warn!("Scheduler: listing fetch for {market} failed: {e}"),
            }
        }

        let mut universe: Vec<(String, String)> = listings
            .into_iter()
            .map(|l| (l.symbol, l.name))
            .collect();
        universe.truncate(self.config.universe_limit);

        if universe.is_empty() {
            warn!("Scheduler: empty listing, using the fallback universe");
            universe = FALLBACK_UNIVERSE
                .iter()
                .map(|s| (s.to_string(), s.to_string()))
                .collect();
        }

        info!("Scheduler: scan universe refreshed ({} symbols)", universe.len());
        *self.universe.write().await = universe;
    }

    async fn scan_universe(&self) -> Vec<(String, String)> {
        let universe = self.universe.read().await.clone();
        if universe.is_empty() {
            drop(universe);
            self.refresh_universe().await;
            return self.universe.read().await.clone();
        }
        universe
    }

    async fn daily_jobs(&self) {
        let now = self.clock.now();
        let today = now.date_naive();

        let run_universe = {
            let mut daily = self.daily.lock().unwrap();
            if daily.last_universe_day != Some(today) {
                daily.last_universe_day = Some(today);
                true
            } else {
                false
            }
        };
        if run_universe {
            self.refresh_universe().await;
        }

        let after_close = now.hour() > self.config.rebalance_hour
            || (now.hour() == self.config.rebalance_hour
                && now.minute() >= self.config.rebalance_minute);
        let run_rebalance = {
            let mut daily = self.daily.lock().unwrap();
            if after_close && daily.last_rebalance_day != Some(today) {
                daily.last_rebalance_day = Some(today);
                true
            } else {
                false
            }
        };
        if run_rebalance {
            self.rebalance_and_deadline_sweep().await;
        }
    }

    /// Holdings snapshot cached for 60 s to protect broker rate limits.
    async fn cached_holdings(&self) -> Vec<Holding> {
        let now = self.clock.now();
        {
            let cache = self.holdings_cache.read().await;
            if let Some((at, holdings)) = cache.as_ref()
                && now - *at < ChronoDuration::seconds(60)
            {
                return holdings.clone();
            }
        }

        match self.broker.get_holdings().await {
            Ok(holdings) => {
                *self.holdings_cache.write().await = Some((now, holdings.clone()));
                holdings
            }
            Err(e) => {
                warn!("Scheduler: holdings fetch failed: {e}");
                Vec::new()
            }
        }
    }
}

fn fmt_price(price: Option<i64>) -> String {
    price.map(|p| p.to_string()).unwrap_or_else(|| "unset".to_string())
}
