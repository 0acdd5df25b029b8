//! Rule-based trigger evaluation.
//!
//! 42 triggers vote bullish/bearish/neutral over one indicator snapshot.
//! Deterministic and pure; the composite score is a tier-weighted sum
//! normalised into 1..=100.

use crate::domain::signals::{
    IndicatorSnapshot, ScanAction, TriggerId, TriggerResult, TriggerStrength, TriggerVote,
};
use serde_json::json;

use TriggerId::*;
use TriggerStrength as Str;
use TriggerVote::{Bearish, Bullish, Neutral};

pub struct TriggerEvaluator;

impl TriggerEvaluator {
    pub fn evaluate_all(ind: &IndicatorSnapshot) -> Vec<TriggerResult> {
        vec![
            // Tier 1
            Self::t01_tv_accumulation(ind),
            Self::t02_tv_spike(ind),
            Self::t03_tv_breakout(ind),
            Self::t09_obv_alignment(ind),
            Self::t14_avwap_position(ind),
            Self::t20_bbwp_ttm_squeeze(ind),
            // Tier 2
            Self::t04_tv_trend(ind),
            Self::t05_volume_surge(ind),
            Self::t06_volume_breakout(ind),
            Self::t07_volume_dry(ind),
            Self::t08_volume_divergence(ind),
            Self::t10_obv_divergence(ind),
            Self::t11_obv_breakout(ind),
            Self::t12_cmf_signal(ind),
            Self::t13_clv_signal(ind),
            Self::t15_avwap_cross(ind),
            Self::t16_cmf_trend(ind),
            Self::t17_mfi_signal(ind),
            Self::t18_adx_trend(ind),
            Self::t19_di_cross(ind),
            Self::t21_bb_squeeze_release(ind),
            Self::t22_accumulation_pattern(ind),
            // Tier 3
            Self::t23_udvr_signal(ind),
            Self::t24_rvol_signal(ind),
            Self::t25_52w_position(ind),
            Self::t26_ma_alignment(ind),
            Self::t27_ma_cross(ind),
            Self::t28_price_momentum(ind),
            Self::t29_volatility_contraction(ind),
            Self::t30_breakout_readiness(ind),
            Self::t31_risk_reward(ind),
            Self::t32_trend_strength(ind),
            Self::t33_money_flow_combo(ind),
            Self::t34_supply_demand_balance(ind),
            Self::t35_entry_timing(ind),
            Self::t36_exit_warning(ind),
            Self::t37_consolidation_phase(ind),
            Self::t38_trend_reversal(ind),
            Self::t39_volume_price_confirm(ind),
            Self::t40_institutional_flow(ind),
            Self::t41_composite_buy(ind),
            Self::t42_composite_sell(ind),
        ]
    }

    /// Tier-weighted composite score in 1..=100 (never 0). Bullish triggers
    /// add `score * weight`, bearish subtract, neutral contribute nothing;
    /// the signed sum over the maximum attainable sum maps to 50 +/- 50.
    pub fn composite_score(triggers: &[TriggerResult]) -> i64 {
        if triggers.is_empty() {
            return 50;
        }
        let mut total: i64 = 0;
        let mut max_total: i64 = 0;
        for t in triggers {
            let w = t.id.weight();
            match t.vote {
                Bullish => total += t.score * w,
                Bearish => total -= t.score * w,
                Neutral => {}
            }
            max_total += 10 * w;
        }
        if max_total == 0 {
            return 50;
        }
        let ratio = total as f64 / max_total as f64;
        ((50.0 + 50.0 * ratio).round() as i64).clamp(1, 100)
    }

    pub fn determine_action(score: i64) -> ScanAction {
        match score {
            s if s >= 80 => ScanAction::StrongBuy,
            s if s >= 65 => ScanAction::Buy,
            s if s >= 40 => ScanAction::Hold,
            s if s >= 25 => ScanAction::Sell,
            _ => ScanAction::StrongSell,
        }
    }

    // Tier 1

    fn t01_tv_accumulation(ind: &IndicatorSnapshot) -> TriggerResult {
        let ratio = ind.tv5_20_ratio;
        let (vote, strength, score, details) = if (1.5..=3.5).contains(&ratio) {
            if ratio >= 2.5 {
                (Bullish, Str::VeryStrong, 9, format!("strong accumulation (TV5/20={ratio:.2})"))
            } else if ratio >= 2.0 {
                (Bullish, Str::Strong, 7, format!("accumulation under way (TV5/20={ratio:.2})"))
            } else {
                (Bullish, Str::Moderate, 5, format!("early accumulation (TV5/20={ratio:.2})"))
            }
        } else if ratio > 3.5 {
            (Bearish, Str::Moderate, 4, format!("overheating risk (TV5/20={ratio:.2})"))
        } else if ratio >= 1.0 {
            (Neutral, Str::Weak, 3, format!("ordinary turnover (TV5/20={ratio:.2})"))
        } else {
            (Neutral, Str::None, 0, format!("turnover lacking (TV5/20={ratio:.2})"))
        };
        TriggerResult::new(T01, vote, strength, score, details)
            .with_values(json!({ "tv5_20_ratio": ratio }))
    }

    fn t02_tv_spike(ind: &IndicatorSnapshot) -> TriggerResult {
        let spike = ind.tv_spike;
        let (vote, strength, score, details) = if spike >= 50.0 {
            (Bullish, Str::VeryStrong, 10, format!("extreme turnover explosion ({spike:.1}x)"))
        } else if spike >= 10.0 {
            (Bullish, Str::VeryStrong, 9, format!("turnover explosion ({spike:.1}x)"))
        } else if spike >= 5.0 {
            (Bullish, Str::Strong, 7, format!("turnover surge ({spike:.1}x)"))
        } else if spike >= 3.0 {
            (Bullish, Str::Moderate, 5, format!("turnover increase ({spike:.1}x)"))
        } else if spike >= 1.5 {
            (Neutral, Str::Weak, 3, format!("mild turnover increase ({spike:.1}x)"))
        } else {
            (Neutral, Str::None, 0, format!("turnover flat ({spike:.1}x)"))
        };
        TriggerResult::new(T02, vote, strength, score, details)
            .with_values(json!({ "tv_spike": spike }))
    }

    fn t03_tv_breakout(ind: &IndicatorSnapshot) -> TriggerResult {
        // Turnover in units of 100M won.
        let tv_100m = ind.today_trading_value / 100_000_000.0;
        let (vote, strength, score, details) = if tv_100m >= 1000.0 {
            (Bullish, Str::VeryStrong, 9, format!("turnover {tv_100m:.0} (>=1000 x 100M won)"))
        } else if tv_100m >= 500.0 {
            (Bullish, Str::Strong, 7, format!("turnover {tv_100m:.0} (>=500 x 100M won)"))
        } else if tv_100m >= 200.0 {
            (Bullish, Str::Moderate, 5, format!("turnover {tv_100m:.0} (>=200 x 100M won)"))
        } else if tv_100m >= 50.0 {
            (Neutral, Str::Weak, 2, format!("turnover {tv_100m:.0} x 100M won"))
        } else {
            (Neutral, Str::None, 0, format!("turnover {tv_100m:.0} x 100M won (thin liquidity)"))
        };
        TriggerResult::new(T03, vote, strength, score, details)
            .with_values(json!({ "turnover_100m_won": tv_100m }))
    }

    fn t09_obv_alignment(ind: &IndicatorSnapshot) -> TriggerResult {
        let positives = [ind.obv_5, ind.obv_10, ind.obv_23, ind.obv_56]
            .iter()
            .filter(|&&v| v > 0.0)
            .count();
        let (vote, strength, score, details) = match positives {
            4 => (Bullish, Str::VeryStrong, 9, "OBV positive across all windows (4/4)".to_string()),
            3 => (Bullish, Str::Strong, 7, format!("OBV mostly positive ({positives}/4)")),
            2 => (Neutral, Str::Moderate, 4, format!("OBV mixed ({positives}/4)")),
            1 => (Bearish, Str::Moderate, 3, format!("OBV mostly negative ({positives}/4)")),
            _ => (Bearish, Str::Strong, 2, "OBV negative across all windows (0/4)".to_string()),
        };
        TriggerResult::new(T09, vote, strength, score, details).with_values(json!({
            "obv_5": ind.obv_5,
            "obv_10": ind.obv_10,
            "obv_23": ind.obv_23,
            "obv_56": ind.obv_56,
            "positive_count": positives,
        }))
    }

    fn t14_avwap_position(ind: &IndicatorSnapshot) -> TriggerResult {
        let pct = ind.avwap_60_pct;
        let (vote, strength, score, details) = if (-5.0..=0.0).contains(&pct) {
            (Bullish, Str::VeryStrong, 9, format!("prime entry near AVWAP60 ({pct:+.1}%)"))
        } else if (-10.0..-5.0).contains(&pct) {
            (Bullish, Str::Strong, 7, format!("discount below AVWAP60 ({pct:+.1}%)"))
        } else if pct > 0.0 && pct <= 5.0 {
            (Bullish, Str::Moderate, 5, format!("slightly above AVWAP60 ({pct:+.1}%)"))
        } else if pct > 5.0 && pct <= 10.0 {
            (Neutral, Str::Weak, 3, format!("stretched above AVWAP60 ({pct:+.1}%)"))
        } else if pct > 10.0 {
            (Bearish, Str::Moderate, 4, format!("over-extended vs AVWAP60 ({pct:+.1}%)"))
        } else {
            (Bearish, Str::Strong, 3, format!("deep below AVWAP60 ({pct:+.1}%)"))
        };
        TriggerResult::new(T14, vote, strength, score, details)
            .with_values(json!({ "avwap_60_pct": pct, "avwap_20_pct": ind.avwap_20_pct }))
    }

    fn t20_bbwp_ttm_squeeze(ind: &IndicatorSnapshot) -> TriggerResult {
        let bbwp = ind.bbwp;
        let squeeze = ind.ttm_squeeze;
        let (vote, strength, score, details) = if squeeze && bbwp <= 20.0 {
            (Bullish, Str::VeryStrong, 10, format!("extreme compression + TTM squeeze (BBWP={bbwp:.0}%)"))
        } else if squeeze && bbwp <= 40.0 {
            (Bullish, Str::Strong, 8, format!("TTM squeeze in progress (BBWP={bbwp:.0}%)"))
        } else if bbwp <= 20.0 {
            (Bullish, Str::Strong, 7, format!("volatility tightly compressed (BBWP={bbwp:.0}%)"))
        } else if bbwp <= 40.0 {
            (Neutral, Str::Moderate, 4, format!("volatility on the low side (BBWP={bbwp:.0}%)"))
        } else if bbwp >= 80.0 {
            (Bearish, Str::Moderate, 3, format!("volatility overextended (BBWP={bbwp:.0}%)"))
        } else {
            (Neutral, Str::None, 2, format!("volatility ordinary (BBWP={bbwp:.0}%)"))
        };
        TriggerResult::new(T20, vote, strength, score, details)
            .with_values(json!({ "bbwp": bbwp, "ttm_squeeze": squeeze }))
    }

    // Tier 2

    fn t04_tv_trend(ind: &IndicatorSnapshot) -> TriggerResult {
        let ratio = ind.tv5_20_ratio;
        let r = if ratio >= 1.5 {
            TriggerResult::new(T04, Bullish, Str::Moderate, 6, format!("turnover trending up ({ratio:.2}x)"))
        } else if ratio <= 0.5 {
            TriggerResult::new(T04, Bearish, Str::Moderate, 4, format!("turnover trending down ({ratio:.2}x)"))
        } else {
            TriggerResult::new(T04, Neutral, Str::Weak, 3, format!("turnover sideways ({ratio:.2}x)"))
        };
        r.with_values(json!({ "tv5_20_ratio": ratio }))
    }

    fn t05_volume_surge(ind: &IndicatorSnapshot) -> TriggerResult {
        let shock = ind.volume_shock;
        let r = if shock >= 5.0 {
            TriggerResult::new(T05, Bullish, Str::VeryStrong, 8, format!("volume explosion ({shock:.1}x)"))
        } else if shock >= 3.0 {
            TriggerResult::new(T05, Bullish, Str::Strong, 6, format!("volume surge ({shock:.1}x)"))
        } else if shock >= 2.0 {
            TriggerResult::new(T05, Bullish, Str::Moderate, 5, format!("volume increase ({shock:.1}x)"))
        } else {
            TriggerResult::new(T05, Neutral, Str::None, 2, format!("volume ordinary ({shock:.1}x)"))
        };
        r.with_values(json!({ "volume_shock": shock }))
    }

    fn t06_volume_breakout(ind: &IndicatorSnapshot) -> TriggerResult {
        let ratio = ind.v5_20_ratio;
        let r = if ratio >= 2.0 {
            TriggerResult::new(T06, Bullish, Str::Strong, 7, format!("5d volume doubled the 20d average ({ratio:.2}x)"))
        } else if ratio >= 1.5 {
            TriggerResult::new(T06, Bullish, Str::Moderate, 5, format!("volume building up ({ratio:.2}x)"))
        } else {
            TriggerResult::new(T06, Neutral, Str::None, 2, format!("volume flat ({ratio:.2}x)"))
        };
        r.with_values(json!({ "v5_20_ratio": ratio }))
    }

    fn t07_volume_dry(ind: &IndicatorSnapshot) -> TriggerResult {
        let ratio = ind.v5_20_ratio;
        let shock = ind.volume_shock;
        if ratio <= 0.5 && shock <= 0.5 {
            TriggerResult::new(
                T07,
                Bullish,
                Str::Moderate,
                5,
                format!("volume dried up, possible quiet accumulation (V5/20={ratio:.2}, shock={shock:.2})"),
            )
            .with_values(json!({ "v5_20_ratio": ratio, "volume_shock": shock }))
        } else if ratio <= 0.7 {
            TriggerResult::new(T07, Neutral, Str::Weak, 3, format!("volume shrinking (V5/20={ratio:.2})"))
                .with_values(json!({ "v5_20_ratio": ratio }))
        } else {
            TriggerResult::neutral(T07, 2, format!("volume sufficient (V5/20={ratio:.2})"))
                .with_values(json!({ "v5_20_ratio": ratio }))
        }
    }

    fn t08_volume_divergence(ind: &IndicatorSnapshot) -> TriggerResult {
        let ratio = ind.v5_20_ratio;
        if ratio >= 2.0 && ind.position_52w <= 30.0 {
            TriggerResult::new(T08, Bullish, Str::Strong, 7, "volume surge at the lows (possible reversal)")
                .with_values(json!({ "v5_20_ratio": ratio, "position_52w": ind.position_52w }))
        } else if ratio <= 0.5 && ind.position_52w >= 80.0 {
            TriggerResult::new(T08, Bearish, Str::Moderate, 4, "volume fading at the highs (bearish divergence)")
                .with_values(json!({ "v5_20_ratio": ratio, "position_52w": ind.position_52w }))
        } else {
            TriggerResult::neutral(T08, 2, "no divergence")
        }
    }

    fn t10_obv_divergence(ind: &IndicatorSnapshot) -> TriggerResult {
        if ind.obv_5 > 0.0 && ind.obv_10 > 0.0 && ind.obv_56 < 0.0 {
            TriggerResult::new(T10, Bullish, Str::Strong, 7, "short-window OBV turned positive (early accumulation)")
                .with_values(json!({ "obv_5": ind.obv_5, "obv_56": ind.obv_56 }))
        } else if ind.obv_5 < 0.0 && ind.obv_56 > 0.0 {
            TriggerResult::new(T10, Bearish, Str::Moderate, 4, "short-window OBV turned negative (outflow starting)")
                .with_values(json!({ "obv_5": ind.obv_5, "obv_56": ind.obv_56 }))
        } else {
            TriggerResult::neutral(T10, 2, "no OBV divergence")
        }
    }

    fn t11_obv_breakout(ind: &IndicatorSnapshot) -> TriggerResult {
        if ind.obv_5 > 0.0 && ind.obv_10 > 0.0 && ind.obv_23 > 0.0 {
            TriggerResult::new(T11, Bullish, Str::Strong, 7, "OBV positive over short and medium windows")
                .with_values(json!({ "obv_5": ind.obv_5, "obv_10": ind.obv_10, "obv_23": ind.obv_23 }))
        } else {
            TriggerResult::neutral(T11, 2, "no OBV breakout")
        }
    }

    fn t12_cmf_signal(ind: &IndicatorSnapshot) -> TriggerResult {
        let cmf = ind.cmf_20;
        let r = if cmf >= 0.15 {
            TriggerResult::new(T12, Bullish, Str::Strong, 7, format!("strong money inflow (CMF={cmf:.3})"))
        } else if cmf >= 0.05 {
            TriggerResult::new(T12, Bullish, Str::Moderate, 5, format!("money inflow (CMF={cmf:.3})"))
        } else if cmf <= -0.15 {
            TriggerResult::new(T12, Bearish, Str::Strong, 3, format!("strong money outflow (CMF={cmf:.3})"))
        } else if cmf <= -0.05 {
            TriggerResult::new(T12, Bearish, Str::Moderate, 4, format!("money outflow (CMF={cmf:.3})"))
        } else {
            TriggerResult::new(T12, Neutral, Str::Weak, 3, format!("CMF neutral ({cmf:.3})"))
        };
        r.with_values(json!({ "cmf_20": cmf }))
    }

    fn t13_clv_signal(ind: &IndicatorSnapshot) -> TriggerResult {
        let clv = ind.clv;
        let r = if clv >= 0.5 {
            TriggerResult::new(T13, Bullish, Str::Strong, 7, format!("close near the high (CLV={clv:.2})"))
        } else if clv >= 0.0 {
            TriggerResult::new(T13, Bullish, Str::Weak, 4, format!("close above mid-range (CLV={clv:.2})"))
        } else if clv <= -0.5 {
            TriggerResult::new(T13, Bearish, Str::Strong, 3, format!("close near the low (CLV={clv:.2})"))
        } else {
            TriggerResult::new(T13, Bearish, Str::Weak, 4, format!("close below mid-range (CLV={clv:.2})"))
        };
        r.with_values(json!({ "clv": clv }))
    }

    fn t15_avwap_cross(ind: &IndicatorSnapshot) -> TriggerResult {
        let p20 = ind.avwap_20_pct;
        let p60 = ind.avwap_60_pct;
        if p20 > 0.0 && p60 > 0.0 && ind.current_price > 0 {
            TriggerResult::new(T15, Bullish, Str::Moderate, 6, "price above both AVWAP 20 and 60")
                .with_values(json!({ "avwap_20_pct": p20, "avwap_60_pct": p60 }))
        } else if p20 < 0.0 && p60 < 0.0 {
            TriggerResult::new(T15, Bearish, Str::Moderate, 4, "price below both AVWAP 20 and 60")
                .with_values(json!({ "avwap_20_pct": p20, "avwap_60_pct": p60 }))
        } else {
            TriggerResult::new(T15, Neutral, Str::Weak, 3, "AVWAP mixed")
        }
    }

    fn t16_cmf_trend(ind: &IndicatorSnapshot) -> TriggerResult {
        let cmf = ind.cmf_20;
        if cmf > 0.1 {
            TriggerResult::new(T16, Bullish, Str::Moderate, 6, format!("sustained money inflow (CMF={cmf:.3})"))
                .with_values(json!({ "cmf_20": cmf }))
        } else if cmf < -0.1 {
            TriggerResult::new(T16, Bearish, Str::Moderate, 4, format!("sustained money outflow (CMF={cmf:.3})"))
                .with_values(json!({ "cmf_20": cmf }))
        } else {
            TriggerResult::neutral(T16, 2, format!("CMF trend weak ({cmf:.3})"))
        }
    }

    fn t17_mfi_signal(ind: &IndicatorSnapshot) -> TriggerResult {
        let mfi = ind.mfi_14;
        let r = if mfi >= 80.0 {
            TriggerResult::new(T17, Bearish, Str::Moderate, 4, format!("MFI overbought ({mfi:.0})"))
        } else if mfi <= 20.0 {
            TriggerResult::new(T17, Bullish, Str::Strong, 7, format!("MFI oversold ({mfi:.0})"))
        } else if mfi <= 40.0 {
            TriggerResult::new(T17, Bullish, Str::Moderate, 5, format!("MFI approaching the lows ({mfi:.0})"))
        } else {
            TriggerResult::new(T17, Neutral, Str::None, 3, format!("MFI ordinary ({mfi:.0})"))
        };
        r.with_values(json!({ "mfi_14": mfi }))
    }

    fn t18_adx_trend(ind: &IndicatorSnapshot) -> TriggerResult {
        let adx = ind.adx;
        if adx >= 40.0 {
            let bullish = ind.plus_di > ind.minus_di;
            let vote = if bullish { Bullish } else { Bearish };
            TriggerResult::new(
                T18,
                vote,
                Str::VeryStrong,
                if bullish { 8 } else { 3 },
                format!("strong trend (ADX={adx:.0}, +DI={:.0}, -DI={:.0})", ind.plus_di, ind.minus_di),
            )
            .with_values(json!({ "adx": adx, "plus_di": ind.plus_di, "minus_di": ind.minus_di }))
        } else if adx >= 25.0 {
            let bullish = ind.plus_di > ind.minus_di;
            let vote = if bullish { Bullish } else { Bearish };
            TriggerResult::new(T18, vote, Str::Moderate, if bullish { 5 } else { 4 }, format!("trend developing (ADX={adx:.0})"))
                .with_values(json!({ "adx": adx }))
        } else {
            TriggerResult::new(T18, Neutral, Str::Weak, 3, format!("weak trend / ranging (ADX={adx:.0})"))
                .with_values(json!({ "adx": adx }))
        }
    }

    fn t19_di_cross(ind: &IndicatorSnapshot) -> TriggerResult {
        let diff = ind.plus_di - ind.minus_di;
        let values = json!({ "plus_di": ind.plus_di, "minus_di": ind.minus_di });
        let r = if diff > 15.0 {
            TriggerResult::new(T19, Bullish, Str::Strong, 7, format!("+DI dominant ({diff:.0})"))
        } else if diff > 5.0 {
            TriggerResult::new(T19, Bullish, Str::Moderate, 5, format!("+DI slightly ahead ({diff:.0})"))
        } else if diff < -15.0 {
            TriggerResult::new(T19, Bearish, Str::Strong, 3, format!("-DI dominant ({diff:.0})"))
        } else if diff < -5.0 {
            TriggerResult::new(T19, Bearish, Str::Moderate, 4, format!("-DI slightly ahead ({diff:.0})"))
        } else {
            TriggerResult::new(T19, Neutral, Str::None, 3, "DI balanced".to_string())
        };
        r.with_values(values)
    }

    fn t21_bb_squeeze_release(ind: &IndicatorSnapshot) -> TriggerResult {
        let bbwp = ind.bbwp;
        if !ind.ttm_squeeze && bbwp <= 30.0 {
            TriggerResult::new(T21, Bullish, Str::Strong, 7, format!("squeeze just released (BBWP={bbwp:.0}%)"))
                .with_values(json!({ "bbwp": bbwp, "ttm_squeeze": ind.ttm_squeeze }))
        } else if !ind.ttm_squeeze && bbwp >= 70.0 {
            TriggerResult::new(T21, Neutral, Str::Weak, 3, format!("volatility expanding (BBWP={bbwp:.0}%)"))
                .with_values(json!({ "bbwp": bbwp }))
        } else {
            TriggerResult::neutral(T21, 2, "no squeeze release")
        }
    }

    fn t22_accumulation_pattern(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut hits = 0;
        if (1.5..=3.5).contains(&ind.tv5_20_ratio) {
            hits += 1;
        }
        if ind.obv_5 > 0.0 && ind.obv_10 > 0.0 {
            hits += 1;
        }
        if ind.cmf_20 > 0.05 {
            hits += 1;
        }
        if hits >= 3 {
            TriggerResult::new(T22, Bullish, Str::VeryStrong, 9, format!("TV+OBV+CMF all confirm accumulation ({hits}/3)"))
        } else if hits == 2 {
            TriggerResult::new(T22, Bullish, Str::Strong, 6, format!("partial accumulation pattern ({hits}/3)"))
        } else {
            TriggerResult::neutral(T22, 2, format!("no accumulation pattern ({hits}/3)"))
        }
    }

    // Tier 3

    fn t23_udvr_signal(ind: &IndicatorSnapshot) -> TriggerResult {
        let udvr = ind.udvr_60;
        let r = if udvr >= 2.0 {
            TriggerResult::new(T23, Bullish, Str::Strong, 7, format!("up-day volume dominates (UDVR={udvr:.1})"))
        } else if udvr >= 1.3 {
            TriggerResult::new(T23, Bullish, Str::Moderate, 5, format!("up-day volume ahead ({udvr:.1})"))
        } else if udvr <= 0.5 {
            TriggerResult::new(T23, Bearish, Str::Strong, 3, format!("down-day volume dominates ({udvr:.1})"))
        } else {
            TriggerResult::new(T23, Neutral, Str::None, 3, format!("UDVR balanced ({udvr:.1})"))
        };
        r.with_values(json!({ "udvr_60": udvr }))
    }

    fn t24_rvol_signal(ind: &IndicatorSnapshot) -> TriggerResult {
        let rvol = ind.rvol_20;
        let r = if rvol >= 3.0 {
            TriggerResult::new(T24, Bullish, Str::Strong, 7, format!("RVOL {rvol:.1}x (attention)"))
        } else if rvol >= 1.5 {
            TriggerResult::new(T24, Bullish, Str::Moderate, 5, format!("RVOL {rvol:.1}x"))
        } else {
            TriggerResult::new(T24, Neutral, Str::None, 2, format!("RVOL {rvol:.1}x (ordinary)"))
        };
        r.with_values(json!({ "rvol_20": rvol }))
    }

    fn t25_52w_position(ind: &IndicatorSnapshot) -> TriggerResult {
        let pos = ind.position_52w;
        let r = if pos <= 20.0 {
            TriggerResult::new(T25, Bullish, Str::Strong, 7, format!("52-week low zone ({pos:.0}%)"))
        } else if pos <= 40.0 {
            TriggerResult::new(T25, Bullish, Str::Moderate, 5, format!("lower 52-week range ({pos:.0}%)"))
        } else if pos >= 90.0 {
            TriggerResult::new(T25, Bearish, Str::Moderate, 3, format!("near the 52-week high ({pos:.0}%)"))
        } else {
            TriggerResult::new(T25, Neutral, Str::None, 3, format!("mid 52-week range ({pos:.0}%)"))
        };
        r.with_values(json!({ "position_52w": pos }))
    }

    fn t26_ma_alignment(ind: &IndicatorSnapshot) -> TriggerResult {
        let (ma5, ma20, ma60) = (ind.ma_5, ind.ma_20, ind.ma_60);
        if ma5 > 0.0 && ma20 > 0.0 && ma60 > 0.0 {
            if ma5 > ma20 && ma20 > ma60 {
                return TriggerResult::new(T26, Bullish, Str::Strong, 7, "bullish MA stack (5>20>60)");
            } else if ma5 < ma20 && ma20 < ma60 {
                return TriggerResult::new(T26, Bearish, Str::Strong, 3, "bearish MA stack (5<20<60)");
            }
        }
        TriggerResult::new(T26, Neutral, Str::None, 3, "moving averages mixed")
    }

    fn t27_ma_cross(ind: &IndicatorSnapshot) -> TriggerResult {
        let price = ind.current_price as f64;
        let ma20 = ind.ma_20;
        if price > 0.0 && ma20 > 0.0 {
            let pct = (price - ma20) / ma20 * 100.0;
            if (0.0..=3.0).contains(&pct) {
                return TriggerResult::new(T27, Bullish, Str::Moderate, 6, format!("fresh break above the 20MA ({pct:+.1}%)"))
                    .with_values(json!({ "price_vs_ma20_pct": pct }));
            } else if (-3.0..0.0).contains(&pct) {
                return TriggerResult::new(T27, Bearish, Str::Moderate, 4, format!("slipping below the 20MA ({pct:+.1}%)"))
                    .with_values(json!({ "price_vs_ma20_pct": pct }));
            }
        }
        TriggerResult::new(T27, Neutral, Str::None, 3, "no MA cross")
    }

    fn t28_price_momentum(ind: &IndicatorSnapshot) -> TriggerResult {
        if ind.ma_5 > 0.0 && ind.ma_20 > 0.0 {
            let momentum = (ind.ma_5 - ind.ma_20) / ind.ma_20 * 100.0;
            if momentum > 5.0 {
                return TriggerResult::new(T28, Bullish, Str::Strong, 7, format!("strong upward momentum ({momentum:+.1}%)"));
            } else if momentum > 0.0 {
                return TriggerResult::new(T28, Bullish, Str::Weak, 4, format!("upward momentum ({momentum:+.1}%)"));
            } else if momentum < -5.0 {
                return TriggerResult::new(T28, Bearish, Str::Strong, 3, format!("strong downward momentum ({momentum:+.1}%)"));
            }
        }
        TriggerResult::new(T28, Neutral, Str::None, 3, "momentum ordinary")
    }

    fn t29_volatility_contraction(ind: &IndicatorSnapshot) -> TriggerResult {
        let atr_pct = ind.atr_pct;
        let bbwp = ind.bbwp;
        if atr_pct > 0.0 && atr_pct <= 2.0 && bbwp <= 30.0 {
            TriggerResult::new(T29, Bullish, Str::Strong, 7, format!("ATR and BBWP contracting (ATR%={atr_pct:.1}, BBWP={bbwp:.0})"))
        } else if atr_pct <= 3.0 && bbwp <= 40.0 {
            TriggerResult::new(T29, Bullish, Str::Moderate, 5, format!("volatility low (ATR%={atr_pct:.1})"))
        } else {
            TriggerResult::new(T29, Neutral, Str::None, 3, format!("volatility ordinary (ATR%={atr_pct:.1})"))
        }
    }

    fn t30_breakout_readiness(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut ready = 0;
        if ind.ttm_squeeze {
            ready += 1;
        }
        if ind.tv5_20_ratio >= 1.5 {
            ready += 1;
        }
        if ind.obv_5 > 0.0 && ind.obv_10 > 0.0 {
            ready += 1;
        }
        if ind.adx < 20.0 {
            ready += 1;
        }
        if ready >= 3 {
            TriggerResult::new(T30, Bullish, Str::Strong, 8, format!("breakout imminent ({ready}/4 conditions)"))
        } else if ready == 2 {
            TriggerResult::new(T30, Bullish, Str::Moderate, 5, format!("breakout setting up ({ready}/4)"))
        } else {
            TriggerResult::neutral(T30, 2, format!("breakout not ready ({ready}/4)"))
        }
    }

    fn t31_risk_reward(ind: &IndicatorSnapshot) -> TriggerResult {
        if ind.atr > 0.0 && ind.current_price > 0 {
            let risk_pct = ind.atr_pct;
            let reward_pct = ind.avwap_60_pct.abs();
            if risk_pct > 0.0 {
                let rr = reward_pct / risk_pct;
                if rr >= 3.0 {
                    return TriggerResult::new(T31, Bullish, Str::Strong, 7, format!("R:R={rr:.1} (favourable)"));
                } else if rr >= 2.0 {
                    return TriggerResult::new(T31, Bullish, Str::Moderate, 5, format!("R:R={rr:.1}"));
                }
            }
        }
        TriggerResult::new(T31, Neutral, Str::None, 3, "R:R not computable / ordinary")
    }

    fn t32_trend_strength(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut strength = 0;
        if ind.adx >= 25.0 {
            strength += 1;
        }
        if ind.plus_di > ind.minus_di {
            strength += 1;
        }
        if ind.ma_5 > ind.ma_20 {
            strength += 1;
        }
        if ind.current_price as f64 > ind.ma_60 {
            strength += 1;
        }
        if strength >= 4 {
            TriggerResult::new(T32, Bullish, Str::VeryStrong, 8, format!("strong uptrend ({strength}/4)"))
        } else if strength >= 3 {
            TriggerResult::new(T32, Bullish, Str::Moderate, 6, format!("uptrend ({strength}/4)"))
        } else if strength <= 1 {
            TriggerResult::new(T32, Bearish, Str::Moderate, 4, format!("downtrend ({strength}/4)"))
        } else {
            TriggerResult::new(T32, Neutral, Str::None, 3, format!("trend mixed ({strength}/4)"))
        }
    }

    fn t33_money_flow_combo(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut bullish = 0;
        if ind.cmf_20 > 0.05 {
            bullish += 1;
        }
        if ind.mfi_14 < 50.0 {
            bullish += 1;
        }
        if ind.clv > 0.0 {
            bullish += 1;
        }
        if bullish >= 3 {
            TriggerResult::new(T33, Bullish, Str::Strong, 7, format!("money inflow confirmed across measures ({bullish}/3)"))
        } else if bullish >= 2 {
            TriggerResult::new(T33, Bullish, Str::Moderate, 5, format!("money inflow leaning ({bullish}/3)"))
        } else if bullish == 0 {
            TriggerResult::new(T33, Bearish, Str::Moderate, 4, "money outflow across measures")
        } else {
            TriggerResult::new(T33, Neutral, Str::None, 3, "money flow mixed")
        }
    }

    fn t34_supply_demand_balance(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut balance = 0;
        if ind.obv_10 > 0.0 {
            balance += 1;
        }
        if ind.udvr_60 > 1.2 {
            balance += 1;
        }
        if ind.cmf_20 > 0.0 {
            balance += 1;
        }
        if balance >= 3 {
            TriggerResult::new(T34, Bullish, Str::Strong, 7, format!("buy-side supply/demand edge ({balance}/3)"))
        } else if balance == 0 {
            TriggerResult::new(T34, Bearish, Str::Moderate, 4, "sell-side supply/demand edge")
        } else {
            TriggerResult::new(T34, Neutral, Str::None, 3, format!("supply/demand balanced ({balance}/3)"))
        }
    }

    fn t35_entry_timing(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut good = 0;
        if (-5.0..=5.0).contains(&ind.avwap_60_pct) {
            good += 1;
        }
        if ind.bbwp <= 40.0 {
            good += 1;
        }
        if ind.mfi_14 <= 50.0 {
            good += 1;
        }
        if ind.clv >= 0.0 {
            good += 1;
        }
        if good >= 4 {
            TriggerResult::new(T35, Bullish, Str::VeryStrong, 9, format!("optimal entry timing ({good}/4)"))
        } else if good >= 3 {
            TriggerResult::new(T35, Bullish, Str::Strong, 7, format!("good entry ({good}/4)"))
        } else if good >= 2 {
            TriggerResult::new(T35, Neutral, Str::Moderate, 4, format!("ordinary ({good}/4)"))
        } else {
            TriggerResult::new(T35, Bearish, Str::Weak, 3, format!("poor entry ({good}/4)"))
        }
    }

    fn t36_exit_warning(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut warning = 0;
        if ind.mfi_14 >= 80.0 {
            warning += 1;
        }
        if ind.bbwp >= 80.0 {
            warning += 1;
        }
        if ind.position_52w >= 90.0 {
            warning += 1;
        }
        if ind.cmf_20 < -0.1 {
            warning += 1;
        }
        if warning >= 3 {
            TriggerResult::new(T36, Bearish, Str::VeryStrong, 2, format!("strong exit warning ({warning}/4)"))
        } else if warning >= 2 {
            TriggerResult::new(T36, Bearish, Str::Moderate, 4, format!("exit caution ({warning}/4)"))
        } else {
            TriggerResult::new(T36, Neutral, Str::None, 5, format!("no exit warning ({warning}/4)"))
        }
    }

    fn t37_consolidation_phase(ind: &IndicatorSnapshot) -> TriggerResult {
        if ind.adx < 20.0 && ind.bbwp <= 30.0 {
            TriggerResult::new(T37, Bullish, Str::Moderate, 6, "tight consolidation (potential breakout)")
        } else if ind.adx < 20.0 {
            TriggerResult::new(T37, Neutral, Str::Weak, 3, "consolidating")
        } else {
            TriggerResult::new(T37, Neutral, Str::None, 3, "not consolidating")
        }
    }

    fn t38_trend_reversal(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut reversal = 0;
        if ind.position_52w <= 25.0 && ind.obv_5 > 0.0 {
            reversal += 1;
        }
        if ind.mfi_14 <= 30.0 && ind.cmf_20 > 0.0 {
            reversal += 1;
        }
        if ind.volume_shock >= 2.0 && ind.clv >= 0.3 {
            reversal += 1;
        }
        if reversal >= 2 {
            TriggerResult::new(T38, Bullish, Str::Strong, 7, format!("bottom reversal signs ({reversal}/3)"))
        } else if reversal == 1 {
            TriggerResult::new(T38, Bullish, Str::Weak, 4, format!("early reversal ({reversal}/3)"))
        } else {
            TriggerResult::neutral(T38, 3, "no reversal signs")
        }
    }

    fn t39_volume_price_confirm(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut confirmed = 0;
        if ind.volume_shock >= 1.5 && ind.clv >= 0.3 {
            confirmed += 1;
        }
        if ind.v5_20_ratio >= 1.3 && ind.current_price as f64 > ind.ma_20 {
            confirmed += 1;
        }
        if confirmed >= 2 {
            TriggerResult::new(T39, Bullish, Str::Strong, 7, "volume and price rising together")
        } else if confirmed == 1 {
            TriggerResult::new(T39, Bullish, Str::Weak, 4, "partial confirmation")
        } else {
            TriggerResult::neutral(T39, 3, "unconfirmed")
        }
    }

    fn t40_institutional_flow(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut inst = 0;
        if (1.5..=3.0).contains(&ind.tv5_20_ratio) {
            inst += 1;
        }
        if ind.obv_23 > 0.0 {
            inst += 1;
        }
        if ind.atr_pct <= 3.0 {
            inst += 1;
        }
        if inst >= 3 {
            TriggerResult::new(T40, Bullish, Str::Strong, 7, format!("institutional accumulation pattern ({inst}/3)"))
        } else if inst == 2 {
            TriggerResult::new(T40, Bullish, Str::Moderate, 5, format!("possible institutional interest ({inst}/3)"))
        } else {
            TriggerResult::neutral(T40, 3, "no institutional pattern")
        }
    }

    fn t41_composite_buy(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut buys = 0;
        if ind.tv5_20_ratio >= 1.5 {
            buys += 1;
        }
        if ind.obv_5 > 0.0 && ind.obv_10 > 0.0 {
            buys += 1;
        }
        if (-5.0..=5.0).contains(&ind.avwap_60_pct) {
            buys += 1;
        }
        if ind.cmf_20 > 0.0 {
            buys += 1;
        }
        if ind.bbwp <= 40.0 {
            buys += 1;
        }
        if buys >= 4 {
            TriggerResult::new(T41, Bullish, Str::VeryStrong, 9, format!("strong buy confluence ({buys}/5)"))
        } else if buys >= 3 {
            TriggerResult::new(T41, Bullish, Str::Strong, 7, format!("buy leaning ({buys}/5)"))
        } else if buys >= 2 {
            TriggerResult::new(T41, Neutral, Str::Moderate, 4, format!("buy on hold ({buys}/5)"))
        } else {
            TriggerResult::new(T41, Bearish, Str::Weak, 3, format!("not a buy ({buys}/5)"))
        }
    }

    fn t42_composite_sell(ind: &IndicatorSnapshot) -> TriggerResult {
        let mut sells = 0;
        if ind.mfi_14 >= 80.0 {
            sells += 1;
        }
        if ind.bbwp >= 80.0 {
            sells += 1;
        }
        if ind.position_52w >= 85.0 {
            sells += 1;
        }
        if ind.cmf_20 < -0.05 {
            sells += 1;
        }
        if ind.obv_5 < 0.0 && ind.obv_10 < 0.0 {
            sells += 1;
        }
        if sells >= 4 {
            TriggerResult::new(T42, Bearish, Str::VeryStrong, 1, format!("strong sell confluence ({sells}/5)"))
        } else if sells >= 3 {
            TriggerResult::new(T42, Bearish, Str::Strong, 3, format!("sell warning ({sells}/5)"))
        } else if sells >= 2 {
            TriggerResult::new(T42, Neutral, Str::Moderate, 4, format!("sell caution ({sells}/5)"))
        } else {
            TriggerResult::new(T42, Bullish, Str::Weak, 6, format!("no sell signal ({sells}/5)"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            symbol: "005930".to_string(),
            bar_count: 260,
            current_price: 70_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_t01_accumulation_band() {
        let mut ind = snapshot();
        ind.tv5_20_ratio = 2.6;
        let t = TriggerEvaluator::t01_tv_accumulation(&ind);
        assert_eq!(t.vote, Bullish);
        assert_eq!(t.score, 9);

        ind.tv5_20_ratio = 4.0;
        let t = TriggerEvaluator::t01_tv_accumulation(&ind);
        assert_eq!(t.vote, Bearish);

        ind.tv5_20_ratio = 1.2;
        let t = TriggerEvaluator::t01_tv_accumulation(&ind);
        assert_eq!(t.vote, Neutral);
    }

    #[test]
    fn test_t02_spike_steps() {
        let mut ind = snapshot();
        for (spike, score) in [(55.0, 10), (12.0, 9), (6.0, 7), (3.5, 5)] {
            ind.tv_spike = spike;
            let t = TriggerEvaluator::t02_tv_spike(&ind);
            assert_eq!(t.vote, Bullish);
            assert_eq!(t.score, score, "spike {spike}");
        }
        ind.tv_spike = 1.0;
        assert_eq!(TriggerEvaluator::t02_tv_spike(&ind).score, 0);
    }

    #[test]
    fn test_t14_avwap_bands() {
        let mut ind = snapshot();
        ind.avwap_60_pct = -2.0;
        let t = TriggerEvaluator::t14_avwap_position(&ind);
        assert_eq!((t.vote, t.score), (Bullish, 9));

        ind.avwap_60_pct = -8.0;
        assert_eq!(TriggerEvaluator::t14_avwap_position(&ind).score, 7);

        ind.avwap_60_pct = 12.0;
        assert_eq!(TriggerEvaluator::t14_avwap_position(&ind).vote, Bearish);
    }

    #[test]
    fn test_t20_squeeze() {
        let mut ind = snapshot();
        ind.ttm_squeeze = true;
        ind.bbwp = 15.0;
        let t = TriggerEvaluator::t20_bbwp_ttm_squeeze(&ind);
        assert_eq!((t.vote, t.score), (Bullish, 10));

        ind.ttm_squeeze = false;
        ind.bbwp = 85.0;
        assert_eq!(TriggerEvaluator::t20_bbwp_ttm_squeeze(&ind).vote, Bearish);
    }

    #[test]
    fn test_evaluate_all_returns_42_in_id_order_coverage() {
        let ind = snapshot();
        let triggers = TriggerEvaluator::evaluate_all(&ind);
        assert_eq!(triggers.len(), 42);
        let mut ids: Vec<&str> = triggers.iter().map(|t| t.id.code()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 42, "every trigger id appears exactly once");
    }

    #[test]
    fn test_composite_score_neutral_baseline() {
        // All-neutral votes must land on the midpoint.
        let ind = snapshot();
        let triggers: Vec<TriggerResult> = TriggerEvaluator::evaluate_all(&ind)
            .into_iter()
            .map(|mut t| {
                t.vote = Neutral;
                t
            })
            .collect();
        assert_eq!(TriggerEvaluator::composite_score(&triggers), 50);
    }

    #[test]
    fn test_composite_score_monotone_on_vote_flip() {
        // Flipping one bullish trigger to bearish never raises the score.
        let mut ind = snapshot();
        ind.tv5_20_ratio = 2.0;
        ind.tv_spike = 6.0;
        ind.obv_5 = 100.0;
        ind.obv_10 = 100.0;
        ind.cmf_20 = 0.1;

        let triggers = TriggerEvaluator::evaluate_all(&ind);
        let base = TriggerEvaluator::composite_score(&triggers);

        for i in 0..triggers.len() {
            if triggers[i].vote != Bullish {
                continue;
            }
            let mut flipped = triggers.clone();
            flipped[i].vote = Bearish;
            let score = TriggerEvaluator::composite_score(&flipped);
            assert!(score <= base, "flipping {} raised the score", flipped[i].id.code());
        }
    }

    #[test]
    fn test_composite_never_zero() {
        let ind = snapshot();
        let triggers: Vec<TriggerResult> = TriggerEvaluator::evaluate_all(&ind)
            .into_iter()
            .map(|mut t| {
                t.vote = Bearish;
                t.score = 10;
                t
            })
            .collect();
        assert_eq!(TriggerEvaluator::composite_score(&triggers), 1);
    }

    #[test]
    fn test_action_mapping() {
        assert_eq!(TriggerEvaluator::determine_action(85), ScanAction::StrongBuy);
        assert_eq!(TriggerEvaluator::determine_action(80), ScanAction::StrongBuy);
        assert_eq!(TriggerEvaluator::determine_action(70), ScanAction::Buy);
        assert_eq!(TriggerEvaluator::determine_action(65), ScanAction::Buy);
        assert_eq!(TriggerEvaluator::determine_action(50), ScanAction::Hold);
        assert_eq!(TriggerEvaluator::determine_action(40), ScanAction::Hold);
        assert_eq!(TriggerEvaluator::determine_action(30), ScanAction::Sell);
        assert_eq!(TriggerEvaluator::determine_action(25), ScanAction::Sell);
        assert_eq!(TriggerEvaluator::determine_action(20), ScanAction::StrongSell);
    }
}
