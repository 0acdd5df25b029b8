use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a single trigger vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerVote {
    Bullish,
    Bearish,
    Neutral,
}

/// Strength attached to a trigger vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStrength {
    VeryStrong,
    Strong,
    Moderate,
    Weak,
    None,
}

/// Categorical verdict of a full symbol scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanAction {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    StrongSell,
}

impl fmt::Display for ScanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScanAction::StrongBuy => "strong_buy",
            ScanAction::Buy => "buy",
            ScanAction::Hold => "hold",
            ScanAction::Sell => "sell",
            ScanAction::StrongSell => "strong_sell",
        };
        write!(f, "{s}")
    }
}

macro_rules! trigger_ids {
    ($(($variant:ident, $code:literal, $label:literal)),+ $(,)?) => {
        /// The 42 rule-based triggers, sealed at the type level.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum TriggerId {
            $($variant),+
        }

        impl TriggerId {
            pub const ALL: [TriggerId; 42] = [$(TriggerId::$variant),+];

            pub fn code(&self) -> &'static str {
                match self {
                    $(TriggerId::$variant => $code),+
                }
            }

            pub fn label(&self) -> &'static str {
                match self {
                    $(TriggerId::$variant => $label),+
                }
            }
        }
    };
}

trigger_ids![
    (T01, "T-01", "TV5/20 accumulation"),
    (T02, "T-02", "Turnover spike"),
    (T03, "T-03", "Turnover breakout"),
    (T04, "T-04", "Turnover trend"),
    (T05, "T-05", "Volume surge"),
    (T06, "T-06", "Volume breakout"),
    (T07, "T-07", "Volume dry-up"),
    (T08, "T-08", "Price-volume divergence"),
    (T09, "T-09", "OBV multi-window alignment"),
    (T10, "T-10", "OBV divergence"),
    (T11, "T-11", "OBV breakout"),
    (T12, "T-12", "CMF signal"),
    (T13, "T-13", "CLV signal"),
    (T14, "T-14", "AVWAP entry position"),
    (T15, "T-15", "AVWAP cross"),
    (T16, "T-16", "CMF trend"),
    (T17, "T-17", "MFI signal"),
    (T18, "T-18", "ADX trend strength"),
    (T19, "T-19", "DI cross"),
    (T20, "T-20", "BBWP + TTM squeeze"),
    (T21, "T-21", "BB squeeze release"),
    (T22, "T-22", "Accumulation pattern"),
    (T23, "T-23", "UDVR balance"),
    (T24, "T-24", "Relative volume"),
    (T25, "T-25", "52-week position"),
    (T26, "T-26", "MA alignment"),
    (T27, "T-27", "MA cross"),
    (T28, "T-28", "Price momentum"),
    (T29, "T-29", "Volatility contraction"),
    (T30, "T-30", "Breakout readiness"),
    (T31, "T-31", "Risk/reward"),
    (T32, "T-32", "Trend strength"),
    (T33, "T-33", "Money-flow combo"),
    (T34, "T-34", "Supply-demand balance"),
    (T35, "T-35", "Entry timing"),
    (T36, "T-36", "Exit warning"),
    (T37, "T-37", "Consolidation phase"),
    (T38, "T-38", "Trend reversal"),
    (T39, "T-39", "Volume-price confirmation"),
    (T40, "T-40", "Institutional flow estimate"),
    (T41, "T-41", "Composite buy"),
    (T42, "T-42", "Composite sell"),
];

impl TriggerId {
    /// Composite-score tier: 1 (weight 3), 2 (weight 2), 3 (weight 1).
    pub fn tier(&self) -> u8 {
        use TriggerId::*;
        match self {
            T01 | T02 | T03 | T09 | T14 | T20 => 1,
            T04 | T05 | T06 | T07 | T08 | T10 | T11 | T12 | T13 | T15 | T16 | T17 | T18 | T19
            | T21 | T22 => 2,
            _ => 3,
        }
    }

    pub fn weight(&self) -> i64 {
        match self.tier() {
            1 => 3,
            2 => 2,
            _ => 1,
        }
    }
}

/// Verdict of a single trigger for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResult {
    pub id: TriggerId,
    pub vote: TriggerVote,
    pub strength: TriggerStrength,
    /// 0..=10
    pub score: i64,
    pub details: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub values: serde_json::Value,
}

impl TriggerResult {
    pub fn new(
        id: TriggerId,
        vote: TriggerVote,
        strength: TriggerStrength,
        score: i64,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id,
            vote,
            strength,
            score,
            details: details.into(),
            values: serde_json::Value::Null,
        }
    }

    pub fn with_values(mut self, values: serde_json::Value) -> Self {
        self.values = values;
        self
    }

    pub fn neutral(id: TriggerId, score: i64, details: impl Into<String>) -> Self {
        Self::new(id, TriggerVote::Neutral, TriggerStrength::None, score, details)
    }
}

/// Derived per-symbol indicator snapshot. Recomputed from the last ~260 daily
/// bars, never mutated in place.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub symbol: String,
    pub current_price: i64,
    pub bar_count: usize,

    // Trading value (close * volume) ratios
    pub tv5: f64,
    pub tv20: f64,
    pub tv5_20_ratio: f64,
    pub tv_spike: f64,
    pub today_trading_value: f64,

    // Volume ratios
    pub v5: f64,
    pub v20: f64,
    pub v5_20_ratio: f64,
    pub volume_shock: f64,
    pub today_volume: i64,

    // On-balance volume accumulated over trailing windows
    pub obv_5: f64,
    pub obv_10: f64,
    pub obv_23: f64,
    pub obv_56: f64,

    // Anchored VWAP and percent deviation from it
    pub avwap_20: f64,
    pub avwap_60: f64,
    pub avwap_20_pct: f64,
    pub avwap_60_pct: f64,

    // Money flow
    pub cmf_20: f64,
    pub clv: f64,
    pub mfi_14: f64,

    // Trend
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,

    // Volatility: Bollinger, band-width percentile, Keltner, TTM squeeze
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    pub bb_width: f64,
    pub bbwp: f64,
    pub keltner_upper: f64,
    pub keltner_lower: f64,
    pub ttm_squeeze: bool,
    pub atr: f64,
    pub atr_pct: f64,

    // Supply/demand
    pub udvr_60: f64,
    pub rvol_20: f64,
    pub rvol_50: f64,

    // 52-week range position
    pub high_52w: i64,
    pub low_52w: i64,
    pub position_52w: f64,

    // Moving averages
    pub ma_5: f64,
    pub ma_20: f64,
    pub ma_60: f64,
    pub ma_120: f64,
}

impl IndicatorSnapshot {
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    /// True when too few bars were available for a meaningful evaluation.
    pub fn is_empty(&self) -> bool {
        self.bar_count < 20
    }
}

/// Full scan verdict for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub symbol: String,
    pub company_name: String,
    pub indicators: IndicatorSnapshot,
    pub triggers: Vec<TriggerResult>,
    /// 1..=100, never 0.
    pub composite_score: i64,
    pub bullish_count: usize,
    pub bearish_count: usize,
    pub neutral_count: usize,
    pub action: ScanAction,
    pub scanned_at: DateTime<FixedOffset>,
}

impl ScanResult {
    /// Technical subscore on the 1..=10 scale used by the sell-side
    /// deterioration check.
    pub fn technical_subscore(&self) -> i64 {
        (self.composite_score / 10).clamp(1, 10)
    }
}
