//! Analyst API cost management.
//!
//! Keeps external analyst spend inside daily/monthly dollar budgets while
//! escalating analysis depth for the cases that deserve it: tier selection,
//! per-tier daily counters, same-symbol cooldown and a short-lived result
//! cache for duplicate headlines.

use crate::domain::council::InvestmentSignal;
use crate::domain::market::KstTime;
use crate::domain::ports::Clock;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisDepth {
    /// Keyword filter only, no analyst call.
    Quick,
    /// Single analyst.
    Light,
    /// Two analysts.
    Standard,
    /// Full three-round council.
    Full,
    /// Full council plus extra rounds.
    Deep,
}

impl AnalysisDepth {
    pub fn estimated_cost_usd(&self) -> f64 {
        match self {
            AnalysisDepth::Quick => 0.0,
            AnalysisDepth::Light => 0.015,
            AnalysisDepth::Standard => 0.075,
            AnalysisDepth::Full => 0.20,
            AnalysisDepth::Deep => 0.40,
        }
    }

    fn demote(&self) -> Option<AnalysisDepth> {
        match self {
            AnalysisDepth::Deep => Some(AnalysisDepth::Full),
            AnalysisDepth::Full => Some(AnalysisDepth::Standard),
            AnalysisDepth::Standard => Some(AnalysisDepth::Light),
            AnalysisDepth::Light => Some(AnalysisDepth::Quick),
            AnalysisDepth::Quick => None,
        }
    }

    fn promote(&self) -> AnalysisDepth {
        match self {
            AnalysisDepth::Quick => AnalysisDepth::Light,
            AnalysisDepth::Light => AnalysisDepth::Standard,
            AnalysisDepth::Standard => AnalysisDepth::Full,
            // Promotion caps at FULL; DEEP is reserved for critical priority.
            AnalysisDepth::Full | AnalysisDepth::Deep => AnalysisDepth::Full,
        }
    }
}

impl fmt::Display for AnalysisDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnalysisDepth::Quick => "quick",
            AnalysisDepth::Light => "light",
            AnalysisDepth::Standard => "standard",
            AnalysisDepth::Full => "full",
            AnalysisDepth::Deep => "deep",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalPriority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct CostLimits {
    pub daily_limit_usd: f64,
    pub monthly_limit_usd: f64,
    pub max_full_analysis_per_day: u32,
    pub max_deep_analysis_per_day: u32,
    pub cooldown_same_symbol_minutes: i64,
}

impl Default for CostLimits {
    fn default() -> Self {
        Self {
            daily_limit_usd: 5.0,
            monthly_limit_usd: 100.0,
            max_full_analysis_per_day: 20,
            max_deep_analysis_per_day: 5,
            cooldown_same_symbol_minutes: 30,
        }
    }
}

/// Append-only record of one analyst run.
#[derive(Debug, Clone)]
pub struct CostRecord {
    pub timestamp: KstTime,
    pub depth: AnalysisDepth,
    pub symbol: String,
    pub estimated_cost_usd: f64,
    pub success: bool,
}

const HISTORY_CAP: usize = 1000;
const CACHE_CAP: usize = 100;
const CACHE_TTL_HOURS: i64 = 1;

struct CostState {
    history: Vec<CostRecord>,
    cache: HashMap<String, (KstTime, InvestmentSignal)>,
    last_analysis: HashMap<String, KstTime>,
    daily_counts: HashMap<AnalysisDepth, u32>,
    last_reset: Option<NaiveDate>,
}

/// Budget stats snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CostStats {
    pub daily_cost: f64,
    pub monthly_cost: f64,
    pub daily_remaining: f64,
    pub monthly_remaining: f64,
    pub daily_limit: f64,
    pub monthly_limit: f64,
    pub cache_size: usize,
    pub history_size: usize,
}

pub struct CostManager {
    limits: CostLimits,
    clock: Arc<dyn Clock>,
    state: Mutex<CostState>,
}

impl CostManager {
    pub fn new(limits: CostLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            limits,
            clock,
            state: Mutex::new(CostState {
                history: Vec::new(),
                cache: HashMap::new(),
                last_analysis: HashMap::new(),
                daily_counts: HashMap::new(),
                last_reset: None,
            }),
        }
    }

    fn cache_key(symbol: &str, title: &str) -> String {
        let prefix: String = title.chars().take(50).collect();
        let digest = Sha256::digest(format!("{symbol}:{prefix}").as_bytes());
        hex::encode(digest)[..16].to_string()
    }

    fn reset_daily_counts(&self, state: &mut CostState) {
        let today = self.clock.today();
        if state.last_reset != Some(today) {
            state.daily_counts.clear();
            state.last_reset = Some(today);
        }
    }

    fn daily_cost(&self, state: &CostState) -> f64 {
        let today = self.clock.today();
        state
            .history
            .iter()
            .filter(|c| c.timestamp.date_naive() == today)
            .map(|c| c.estimated_cost_usd)
            .sum()
    }

    fn monthly_cost(&self, state: &CostState) -> f64 {
        let now = self.clock.now();
        state
            .history
            .iter()
            .filter(|c| {
                c.timestamp.year() == now.year() && c.timestamp.month() == now.month()
            })
            .map(|c| c.estimated_cost_usd)
            .sum()
    }

    /// Remaining (daily, monthly) budget, floored at zero.
    pub fn remaining_budget(&self) -> (f64, f64) {
        let state = self.state.lock().unwrap();
        (
            (self.limits.daily_limit_usd - self.daily_cost(&state)).max(0.0),
            (self.limits.monthly_limit_usd - self.monthly_cost(&state)).max(0.0),
        )
    }

    /// True with remaining minutes when the symbol was analysed within the
    /// cooldown window.
    pub fn is_in_cooldown(&self, symbol: &str) -> (bool, i64) {
        let state = self.state.lock().unwrap();
        let Some(last) = state.last_analysis.get(symbol) else {
            return (false, 0);
        };
        let cooldown_end = *last + Duration::minutes(self.limits.cooldown_same_symbol_minutes);
        let now = self.clock.now();
        if now < cooldown_end {
            (true, (cooldown_end - now).num_minutes().max(1))
        } else {
            (false, 0)
        }
    }

    /// Budget check for one tier. Also rejects any tier above QUICK for a
    /// symbol still in its cooldown window. Read-only until
    /// `record_analysis` runs.
    pub fn can_afford(&self, depth: AnalysisDepth, symbol: Option<&str>) -> (bool, String) {
        {
            let mut state = self.state.lock().unwrap();
            self.reset_daily_counts(&mut state);

            let cost = depth.estimated_cost_usd();
            let daily_remaining = (self.limits.daily_limit_usd - self.daily_cost(&state)).max(0.0);
            let monthly_remaining =
                (self.limits.monthly_limit_usd - self.monthly_cost(&state)).max(0.0);

            if cost > daily_remaining {
                return (false, format!("daily budget exhausted (${daily_remaining:.2} left)"));
            }
            if cost > monthly_remaining {
                return (
                    false,
                    format!("monthly budget exhausted (${monthly_remaining:.2} left)"),
                );
            }

            let count = state.daily_counts.get(&depth).copied().unwrap_or(0);
            if depth == AnalysisDepth::Full && count >= self.limits.max_full_analysis_per_day {
                return (
                    false,
                    format!("daily FULL quota reached ({})", self.limits.max_full_analysis_per_day),
                );
            }
            if depth == AnalysisDepth::Deep && count >= self.limits.max_deep_analysis_per_day {
                return (
                    false,
                    format!("daily DEEP quota reached ({})", self.limits.max_deep_analysis_per_day),
                );
            }
        }

        if depth > AnalysisDepth::Quick
            && let Some(symbol) = symbol
        {
            let (cooling, remaining) = self.is_in_cooldown(symbol);
            if cooling {
                return (false, format!("symbol cooldown ({remaining} min left)"));
            }
        }

        (true, "affordable".to_string())
    }

    /// Pick the analysis tier for a trigger. Base tier from the news score,
    /// promoted for heavyweight holdings, overridden for critical priority,
    /// then stepped down until affordable.
    pub fn determine_depth(
        &self,
        news_score: i64,
        symbol: &str,
        is_holding: bool,
        portfolio_weight: f64,
        priority: SignalPriority,
    ) -> (AnalysisDepth, String) {
        let (mut depth, mut reason) = match news_score {
            ..=3 => (AnalysisDepth::Quick, format!("negative/noise signal (score {news_score})")),
            4..=6 => (AnalysisDepth::Light, format!("mild signal (score {news_score})")),
            7 => (AnalysisDepth::Standard, format!("positive signal (score {news_score})")),
            _ => (AnalysisDepth::Full, format!("strong signal (score {news_score})")),
        };

        if is_holding && portfolio_weight >= 10.0 {
            depth = depth.promote();
            reason.push_str(&format!(" + major holding ({portfolio_weight:.1}%)"));
        }

        if priority == SignalPriority::Critical {
            depth = AnalysisDepth::Deep;
            reason = format!("critical priority - {reason}");
        }

        let (affordable, _) = self.can_afford(depth, Some(symbol));
        if !affordable {
            let mut candidate = depth;
            while let Some(lower) = candidate.demote() {
                candidate = lower;
                if self.can_afford(candidate, Some(symbol)).0 {
                    break;
                }
            }
            depth = candidate;
            reason.push_str(" (downgraded: budget/cooldown)");
        }

        (depth, reason)
    }

    /// Record one finished run: cost history, symbol cooldown stamp, tier
    /// counter.
    pub fn record_analysis(&self, symbol: &str, depth: AnalysisDepth, success: bool) {
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        self.reset_daily_counts(&mut state);

        let cost = depth.estimated_cost_usd();
        state.history.push(CostRecord {
            timestamp: now,
            depth,
            symbol: symbol.to_string(),
            estimated_cost_usd: cost,
            success,
        });
        state.last_analysis.insert(symbol.to_string(), now);
        *state.daily_counts.entry(depth).or_insert(0) += 1;

        if state.history.len() > HISTORY_CAP {
            let keep_from = state.history.len() - HISTORY_CAP / 2;
            state.history.drain(..keep_from);
        }

        let daily = self.daily_cost(&state);
        info!(
            "CostManager: {symbol} {depth} recorded (est ${cost:.3}, daily total ${daily:.2})"
        );
    }

    /// Cached council outcome for a repeated headline, valid for one hour.
    pub fn cached_signal(&self, symbol: &str, title: &str) -> Option<InvestmentSignal> {
        let key = Self::cache_key(symbol, title);
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        match state.cache.get(&key) {
            Some((stored_at, signal)) if now - *stored_at < Duration::hours(CACHE_TTL_HOURS) => {
                info!("CostManager: cache hit for {symbol}");
                Some(signal.clone())
            }
            Some(_) => {
                state.cache.remove(&key);
                None
            }
            None => None,
        }
    }

    pub fn cache_signal(&self, symbol: &str, title: &str, signal: &InvestmentSignal) {
        let key = Self::cache_key(symbol, title);
        let now = self.clock.now();
        let mut state = self.state.lock().unwrap();
        state.cache.insert(key, (now, signal.clone()));

        if state.cache.len() > CACHE_CAP {
            if let Some(oldest) = state
                .cache
                .iter()
                .min_by_key(|(_, (t, _))| *t)
                .map(|(k, _)| k.clone())
            {
                state.cache.remove(&oldest);
            }
        }
    }

    pub fn stats(&self) -> CostStats {
        let state = self.state.lock().unwrap();
        let daily = self.daily_cost(&state);
        let monthly = self.monthly_cost(&state);
        CostStats {
            daily_cost: daily,
            monthly_cost: monthly,
            daily_remaining: (self.limits.daily_limit_usd - daily).max(0.0),
            monthly_remaining: (self.limits.monthly_limit_usd - monthly).max(0.0),
            daily_limit: self.limits.daily_limit_usd,
            monthly_limit: self.limits.monthly_limit_usd,
            cache_size: state.cache.len(),
            history_size: state.history.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::ManualClock;

    fn manager() -> (CostManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(2026, 8, 3, 10, 0));
        let manager = CostManager::new(CostLimits::default(), Arc::clone(&clock) as Arc<dyn Clock>);
        (manager, clock)
    }

    #[test]
    fn test_base_tier_by_score() {
        let (m, _) = manager();
        assert_eq!(m.determine_depth(2, "A", false, 0.0, SignalPriority::Medium).0, AnalysisDepth::Quick);
        assert_eq!(m.determine_depth(5, "B", false, 0.0, SignalPriority::Medium).0, AnalysisDepth::Light);
        assert_eq!(m.determine_depth(7, "C", false, 0.0, SignalPriority::Medium).0, AnalysisDepth::Standard);
        assert_eq!(m.determine_depth(9, "D", false, 0.0, SignalPriority::Medium).0, AnalysisDepth::Full);
    }

    #[test]
    fn test_holding_promotes_one_tier_capped_at_full() {
        let (m, _) = manager();
        assert_eq!(m.determine_depth(5, "A", true, 12.0, SignalPriority::Medium).0, AnalysisDepth::Standard);
        assert_eq!(m.determine_depth(9, "B", true, 15.0, SignalPriority::Medium).0, AnalysisDepth::Full);
        // Light holdings do not promote.
        assert_eq!(m.determine_depth(5, "C", true, 3.0, SignalPriority::Medium).0, AnalysisDepth::Light);
    }

    #[test]
    fn test_critical_priority_forces_deep() {
        let (m, _) = manager();
        let (depth, reason) = m.determine_depth(4, "A", false, 0.0, SignalPriority::Critical);
        assert_eq!(depth, AnalysisDepth::Deep);
        assert!(reason.contains("critical"));
    }

    #[test]
    fn test_can_afford_idempotent_until_recorded() {
        let (m, _) = manager();
        let first = m.can_afford(AnalysisDepth::Full, Some("005930"));
        let second = m.can_afford(AnalysisDepth::Full, Some("005930"));
        assert_eq!(first.0, second.0);

        m.record_analysis("005930", AnalysisDepth::Full, true);
        // Now the symbol cooldown applies.
        assert!(!m.can_afford(AnalysisDepth::Full, Some("005930")).0);
        // A different symbol is unaffected.
        assert!(m.can_afford(AnalysisDepth::Full, Some("000660")).0);
    }

    #[test]
    fn test_cooldown_expires() {
        let (m, clock) = manager();
        m.record_analysis("005930", AnalysisDepth::Light, true);
        assert!(!m.can_afford(AnalysisDepth::Light, Some("005930")).0);
        clock.advance_secs(31 * 60);
        assert!(m.can_afford(AnalysisDepth::Light, Some("005930")).0);
    }

    #[test]
    fn test_quick_ignores_cooldown() {
        let (m, _) = manager();
        m.record_analysis("005930", AnalysisDepth::Light, true);
        assert!(m.can_afford(AnalysisDepth::Quick, Some("005930")).0);
    }

    #[test]
    fn test_full_daily_quota() {
        let (m, clock) = manager();
        for i in 0..20 {
            clock.advance_secs(31 * 60);
            m.record_analysis(&format!("SYM{i}"), AnalysisDepth::Full, true);
        }
        let (ok, reason) = m.can_afford(AnalysisDepth::Full, Some("FRESH"));
        assert!(!ok);
        assert!(reason.contains("FULL quota"));
        // Quota resets the next day.
        clock.advance_secs(24 * 3600);
        assert!(m.can_afford(AnalysisDepth::Full, Some("FRESH")).0);
    }

    #[test]
    fn test_budget_downgrade() {
        let clock = Arc::new(ManualClock::at(2026, 8, 3, 10, 0));
        let limits = CostLimits {
            daily_limit_usd: 0.10,
            ..Default::default()
        };
        let m = CostManager::new(limits, Arc::clone(&clock) as Arc<dyn Clock>);
        // FULL ($0.20) exceeds the $0.10 daily budget; STANDARD ($0.075) fits.
        let (depth, reason) = m.determine_depth(9, "005930", false, 0.0, SignalPriority::Medium);
        assert_eq!(depth, AnalysisDepth::Standard);
        assert!(reason.contains("downgraded"));
    }

    #[test]
    fn test_result_cache_ttl_and_eviction() {
        let (m, clock) = manager();
        let signal = crate::domain::council::InvestmentSignal {
            id: "cafe0001".to_string(),
            symbol: "005930".to_string(),
            company_name: "Samsung Electronics".to_string(),
            action: crate::domain::council::SignalAction::Buy,
            allocation_percent: 20.0,
            suggested_amount: 1_000_000,
            suggested_quantity: 14,
            target_price: Some(80_000),
            stop_loss_price: Some(65_000),
            current_price: 70_000,
            quant_summary: String::new(),
            fundamental_summary: String::new(),
            consensus_reason: String::new(),
            confidence: 0.75,
            quant_score: 8,
            fundamental_score: 7,
            status: crate::domain::council::SignalStatus::Pending,
            created_at: clock.now(),
            executed_at: None,
            holding_deadline: None,
            db_id: None,
        };

        m.cache_signal("005930", "Record quarterly earnings", &signal);
        assert!(m.cached_signal("005930", "Record quarterly earnings").is_some());
        // Title matching only considers the first 50 characters.
        assert!(m.cached_signal("005930", "Different headline").is_none());

        clock.advance_secs(3601);
        assert!(m.cached_signal("005930", "Record quarterly earnings").is_none());
    }

    #[test]
    fn test_history_capped() {
        let (m, clock) = manager();
        for i in 0..1100 {
            clock.advance_secs(60);
            m.record_analysis(&format!("S{i}"), AnalysisDepth::Quick, true);
        }
        assert!(m.stats().history_size <= 1000);
    }
}
