//! Quant indicator calculator.
//!
//! Pure function of a symbol's daily bars: no I/O, no clock. The broker
//! returns bars latest-first; everything here works on the oldest-first
//! ordering.

use crate::domain::market::DailyBar;
use crate::domain::signals::IndicatorSnapshot;

/// Minimum number of bars for a meaningful snapshot. Below this the
/// calculator returns an empty snapshot and the caller treats the symbol as
/// an analysis failure.
pub const MIN_BARS: usize = 20;

pub struct IndicatorCalculator;

impl IndicatorCalculator {
    /// Compute the full snapshot from `daily_prices` (latest first).
    pub fn calculate(symbol: &str, daily_prices: &[DailyBar]) -> IndicatorSnapshot {
        if daily_prices.len() < MIN_BARS {
            return IndicatorSnapshot::empty(symbol);
        }

        let mut bars: Vec<DailyBar> = daily_prices.to_vec();
        bars.reverse();

        let mut snap = IndicatorSnapshot {
            symbol: symbol.to_string(),
            bar_count: bars.len(),
            ..Default::default()
        };

        let latest = bars[bars.len() - 1];
        snap.current_price = latest.close;
        snap.today_volume = latest.volume;

        let closes: Vec<f64> = bars.iter().map(|b| b.close as f64).collect();
        let highs: Vec<f64> = bars.iter().map(|b| b.high as f64).collect();
        let lows: Vec<f64> = bars.iter().map(|b| b.low as f64).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();
        // Trading value approximated as close * volume.
        let trading_values: Vec<f64> = bars
            .iter()
            .map(|b| b.close as f64 * b.volume as f64)
            .collect();
        snap.today_trading_value = *trading_values.last().unwrap_or(&0.0);

        Self::trading_value_ratios(&mut snap, &trading_values);
        Self::volume_ratios(&mut snap, &volumes);
        Self::obv_windows(&mut snap, &closes, &volumes);
        Self::avwap(&mut snap, &bars);
        Self::cmf_clv(&mut snap, &bars);
        Self::adx(&mut snap, &highs, &lows, &closes);
        Self::atr(&mut snap, &highs, &lows, &closes);
        Self::bollinger_bbwp_ttm(&mut snap, &closes);
        Self::mfi(&mut snap, &highs, &lows, &closes, &volumes);
        Self::udvr(&mut snap, &closes, &volumes);
        Self::rvol(&mut snap, &volumes);
        Self::week52_position(&mut snap, &highs, &lows);
        Self::moving_averages(&mut snap, &closes);

        snap
    }

    fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    fn tail(values: &[f64], n: usize) -> &[f64] {
        &values[values.len().saturating_sub(n)..]
    }

    fn trading_value_ratios(snap: &mut IndicatorSnapshot, tvs: &[f64]) {
        let n = tvs.len();
        if n < 5 {
            return;
        }
        snap.tv5 = Self::mean(Self::tail(tvs, 5));
        snap.tv20 = Self::mean(Self::tail(tvs, 20.min(n)));
        if snap.tv20 > 0.0 {
            snap.tv5_20_ratio = snap.tv5 / snap.tv20;
            snap.tv_spike = tvs[n - 1] / snap.tv20;
        }
    }

    fn volume_ratios(snap: &mut IndicatorSnapshot, volumes: &[f64]) {
        let n = volumes.len();
        if n < 5 {
            return;
        }
        snap.v5 = Self::mean(Self::tail(volumes, 5));
        snap.v20 = Self::mean(Self::tail(volumes, 20.min(n)));
        if snap.v20 > 0.0 {
            snap.v5_20_ratio = snap.v5 / snap.v20;
            snap.volume_shock = volumes[n - 1] / snap.v20;
        }
    }

    /// OBV accumulated inside each trailing window (not the running series).
    fn obv_windows(snap: &mut IndicatorSnapshot, closes: &[f64], volumes: &[f64]) {
        let n = closes.len();
        if n < 2 {
            return;
        }
        let window_obv = |period: usize| -> f64 {
            if n < period + 1 {
                return 0.0;
            }
            let mut obv = 0.0;
            for i in (n - period)..n {
                if closes[i] > closes[i - 1] {
                    obv += volumes[i];
                } else if closes[i] < closes[i - 1] {
                    obv -= volumes[i];
                }
            }
            obv
        };
        snap.obv_5 = window_obv(5);
        snap.obv_10 = window_obv(10);
        snap.obv_23 = window_obv(23);
        snap.obv_56 = window_obv(56);
    }

    fn avwap(snap: &mut IndicatorSnapshot, bars: &[DailyBar]) {
        let n = bars.len();
        let vwap = |period: usize| -> f64 {
            if n < period || period == 0 {
                return 0.0;
            }
            let mut pv = 0.0;
            let mut v = 0.0;
            for bar in &bars[n - period..] {
                let typical = (bar.high + bar.low + bar.close) as f64 / 3.0;
                pv += typical * bar.volume as f64;
                v += bar.volume as f64;
            }
            if v > 0.0 { pv / v } else { 0.0 }
        };
        snap.avwap_20 = vwap(20.min(n));
        snap.avwap_60 = if n >= 60 { vwap(60) } else { vwap(n) };

        let price = snap.current_price as f64;
        if price > 0.0 {
            if snap.avwap_20 > 0.0 {
                snap.avwap_20_pct = (price - snap.avwap_20) / snap.avwap_20 * 100.0;
            }
            if snap.avwap_60 > 0.0 {
                snap.avwap_60_pct = (price - snap.avwap_60) / snap.avwap_60 * 100.0;
            }
        }
    }

    fn cmf_clv(snap: &mut IndicatorSnapshot, bars: &[DailyBar]) {
        let n = bars.len();
        if n == 0 {
            return;
        }
        let clv_of = |bar: &DailyBar| -> f64 {
            let (h, l, c) = (bar.high as f64, bar.low as f64, bar.close as f64);
            if h != l { ((c - l) - (h - c)) / (h - l) } else { 0.0 }
        };
        snap.clv = clv_of(&bars[n - 1]);

        let period = 20.min(n);
        let mut mfv = 0.0;
        let mut vol = 0.0;
        for bar in &bars[n - period..] {
            mfv += clv_of(bar) * bar.volume as f64;
            vol += bar.volume as f64;
        }
        snap.cmf_20 = if vol > 0.0 { mfv / vol } else { 0.0 };
    }

    fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
        if values.len() < period {
            return Vec::new();
        }
        let mut smoothed = vec![values[..period].iter().sum::<f64>()];
        for &v in &values[period..] {
            let prev = *smoothed.last().unwrap();
            smoothed.push(prev - prev / period as f64 + v);
        }
        smoothed
    }

    fn adx(snap: &mut IndicatorSnapshot, highs: &[f64], lows: &[f64], closes: &[f64]) {
        let n = closes.len();
        let period = 14;
        if n < period + 1 {
            return;
        }

        let mut trs = Vec::with_capacity(n - 1);
        let mut plus_dms = Vec::with_capacity(n - 1);
        let mut minus_dms = Vec::with_capacity(n - 1);
        for i in 1..n {
            let tr = (highs[i] - lows[i])
                .max((highs[i] - closes[i - 1]).abs())
                .max((lows[i] - closes[i - 1]).abs());
            trs.push(tr);

            let up = highs[i] - highs[i - 1];
            let down = lows[i - 1] - lows[i];
            plus_dms.push(if up > down && up > 0.0 { up } else { 0.0 });
            minus_dms.push(if down > up && down > 0.0 { down } else { 0.0 });
        }

        let tr_s = Self::wilder_smooth(&trs, period);
        let plus_s = Self::wilder_smooth(&plus_dms, period);
        let minus_s = Self::wilder_smooth(&minus_dms, period);
        if tr_s.is_empty() || plus_s.is_empty() || minus_s.is_empty() {
            return;
        }

        let mut dxs = Vec::with_capacity(tr_s.len());
        let mut plus_di = 0.0;
        let mut minus_di = 0.0;
        for i in 0..tr_s.len() {
            let (pdi, mdi) = if tr_s[i] > 0.0 {
                (plus_s[i] / tr_s[i] * 100.0, minus_s[i] / tr_s[i] * 100.0)
            } else {
                (0.0, 0.0)
            };
            plus_di = pdi;
            minus_di = mdi;
            let sum = pdi + mdi;
            dxs.push(if sum > 0.0 { (pdi - mdi).abs() / sum * 100.0 } else { 0.0 });
        }

        let adx_s = Self::wilder_smooth(&dxs, period);
        if let Some(&adx) = adx_s.last() {
            // Wilder smoothing keeps a running sum; scale back to the average.
            snap.adx = adx / period as f64;
        }
        snap.plus_di = plus_di;
        snap.minus_di = minus_di;
    }

    fn atr(snap: &mut IndicatorSnapshot, highs: &[f64], lows: &[f64], closes: &[f64]) {
        let n = closes.len();
        let period = 14;
        if n < period + 1 {
            return;
        }
        let mut trs = Vec::with_capacity(n - 1);
        for i in 1..n {
            let tr = (highs[i] - lows[i])
                .max((highs[i] - closes[i - 1]).abs())
                .max((lows[i] - closes[i - 1]).abs());
            trs.push(tr);
        }
        let mut atr = trs[..period].iter().sum::<f64>() / period as f64;
        for &tr in &trs[period..] {
            atr = (atr * (period as f64 - 1.0) + tr) / period as f64;
        }
        snap.atr = atr;
        if snap.current_price > 0 {
            snap.atr_pct = atr / snap.current_price as f64 * 100.0;
        }
    }

    fn bollinger_bbwp_ttm(snap: &mut IndicatorSnapshot, closes: &[f64]) {
        let n = closes.len();
        let period = 20;
        let std_mult = 2.0;
        if n < period {
            return;
        }

        let band_width = |window: &[f64]| -> (f64, f64, f64, f64) {
            let sma = Self::mean(window);
            let var = window.iter().map(|x| (x - sma).powi(2)).sum::<f64>() / window.len() as f64;
            let std = var.sqrt();
            let upper = sma + std_mult * std;
            let lower = sma - std_mult * std;
            let width = if sma > 0.0 { (upper - lower) / sma } else { 0.0 };
            (sma, upper, lower, width)
        };

        let (sma, upper, lower, width) = band_width(&closes[n - period..]);
        snap.bb_middle = sma;
        snap.bb_upper = upper;
        snap.bb_lower = lower;
        snap.bb_width = width;

        // BBWP: percentile rank of today's band width within the last year.
        let lookback = 252.min(n - period);
        if lookback > 0 {
            let mut widths = Vec::with_capacity(lookback + 1);
            for end in (n - lookback)..=n {
                if end >= period {
                    let (_, _, _, w) = band_width(&closes[end - period..end]);
                    widths.push(w);
                }
            }
            if !widths.is_empty() {
                let current = *widths.last().unwrap();
                let below = widths.iter().filter(|&&w| w < current).count();
                snap.bbwp = below as f64 / widths.len() as f64 * 100.0;
            }
        }

        // TTM squeeze: Bollinger inside Keltner (20 EMA +/- 1.5 ATR).
        if let Some(ema_20) = Self::ema(closes, 20) {
            let keltner_mult = 1.5;
            snap.keltner_upper = ema_20 + keltner_mult * snap.atr;
            snap.keltner_lower = ema_20 - keltner_mult * snap.atr;
            snap.ttm_squeeze =
                snap.bb_lower > snap.keltner_lower && snap.bb_upper < snap.keltner_upper;
        }
    }

    fn mfi(
        snap: &mut IndicatorSnapshot,
        highs: &[f64],
        lows: &[f64],
        closes: &[f64],
        volumes: &[f64],
    ) {
        let n = closes.len();
        let period = 14;
        if n < period + 1 {
            return;
        }
        let typical: Vec<f64> = (0..n).map(|i| (highs[i] + lows[i] + closes[i]) / 3.0).collect();

        let mut pos = 0.0;
        let mut neg = 0.0;
        for i in (n - period)..n {
            let raw = typical[i] * volumes[i];
            if typical[i] > typical[i - 1] {
                pos += raw;
            } else if typical[i] < typical[i - 1] {
                neg += raw;
            }
        }
        snap.mfi_14 = if neg > 0.0 {
            100.0 - 100.0 / (1.0 + pos / neg)
        } else if pos > 0.0 {
            100.0
        } else {
            50.0
        };
    }

    fn udvr(snap: &mut IndicatorSnapshot, closes: &[f64], volumes: &[f64]) {
        let n = closes.len();
        let period = 60.min(n.saturating_sub(1));
        if period < 1 {
            return;
        }
        let mut up = 0.0;
        let mut down = 0.0;
        for i in (n - period)..n {
            if closes[i] > closes[i - 1] {
                up += volumes[i];
            } else if closes[i] < closes[i - 1] {
                down += volumes[i];
            }
        }
        snap.udvr_60 = if down > 0.0 {
            up / down
        } else if up > 0.0 {
            10.0
        } else {
            1.0
        };
    }

    fn rvol(snap: &mut IndicatorSnapshot, volumes: &[f64]) {
        let n = volumes.len();
        if n >= 20 {
            let avg = Self::mean(Self::tail(volumes, 20));
            if avg > 0.0 {
                snap.rvol_20 = volumes[n - 1] / avg;
            }
        }
        if n >= 50 {
            let avg = Self::mean(Self::tail(volumes, 50));
            if avg > 0.0 {
                snap.rvol_50 = volumes[n - 1] / avg;
            }
        }
    }

    fn week52_position(snap: &mut IndicatorSnapshot, highs: &[f64], lows: &[f64]) {
        let n = highs.len();
        let period = 252.min(n);
        let recent_highs = &highs[n - period..];
        let recent_lows = &lows[n - period..];

        snap.high_52w = recent_highs.iter().cloned().fold(0.0, f64::max) as i64;
        snap.low_52w = recent_lows
            .iter()
            .cloned()
            .filter(|&l| l > 0.0)
            .fold(f64::INFINITY, f64::min) as i64;

        let range = snap.high_52w - snap.low_52w;
        if range > 0 {
            snap.position_52w = (snap.current_price - snap.low_52w) as f64 / range as f64 * 100.0;
        }
    }

    fn moving_averages(snap: &mut IndicatorSnapshot, closes: &[f64]) {
        let n = closes.len();
        if n >= 5 {
            snap.ma_5 = Self::mean(Self::tail(closes, 5));
        }
        if n >= 20 {
            snap.ma_20 = Self::mean(Self::tail(closes, 20));
        }
        if n >= 60 {
            snap.ma_60 = Self::mean(Self::tail(closes, 60));
        }
        if n >= 120 {
            snap.ma_120 = Self::mean(Self::tail(closes, 120));
        }
    }

    fn ema(values: &[f64], period: usize) -> Option<f64> {
        let n = values.len();
        if n < period || period == 0 {
            return None;
        }
        let multiplier = 2.0 / (period as f64 + 1.0);
        let mut ema = values[..period].iter().sum::<f64>() / period as f64;
        for &v in &values[period..] {
            ema = (v - ema) * multiplier + ema;
        }
        Some(ema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    /// Bars oldest-to-newest from (close, volume) pairs; returned latest
    /// first like the broker does.
    fn bars_from(closes_and_volumes: &[(i64, i64)]) -> Vec<DailyBar> {
        let start = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let mut bars: Vec<DailyBar> = closes_and_volumes
            .iter()
            .enumerate()
            .map(|(i, &(close, volume))| DailyBar {
                date: start + chrono::Duration::days(i as i64),
                open: close,
                high: close + close / 100,
                low: close - close / 100,
                close,
                volume,
            })
            .collect();
        bars.reverse();
        bars
    }

    fn flat_bars(n: usize, close: i64, volume: i64) -> Vec<DailyBar> {
        bars_from(&vec![(close, volume); n])
    }

    #[test]
    fn test_too_few_bars_yields_empty_snapshot() {
        let bars = flat_bars(10, 50_000, 1_000);
        let snap = IndicatorCalculator::calculate("005930", &bars);
        assert!(snap.is_empty());
        assert_eq!(snap.current_price, 0);
    }

    #[test]
    fn test_moving_averages_on_flat_series() {
        let bars = flat_bars(130, 50_000, 1_000);
        let snap = IndicatorCalculator::calculate("005930", &bars);
        assert_eq!(snap.current_price, 50_000);
        assert!((snap.ma_5 - 50_000.0).abs() < 1e-6);
        assert!((snap.ma_20 - 50_000.0).abs() < 1e-6);
        assert!((snap.ma_60 - 50_000.0).abs() < 1e-6);
        assert!((snap.ma_120 - 50_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_volume_shock_detects_spike() {
        let mut series = vec![(50_000, 1_000); 59];
        series.push((50_000, 10_000));
        let snap = IndicatorCalculator::calculate("005930", &bars_from(&series));
        // Today's volume vs the 20-day average (19 quiet days + the spike).
        assert!(snap.volume_shock > 6.0, "shock = {}", snap.volume_shock);
        assert!(snap.tv_spike > 6.0);
    }

    #[test]
    fn test_obv_positive_on_uptrend() {
        let series: Vec<(i64, i64)> = (0..80).map(|i| (50_000 + i * 100, 1_000)).collect();
        let snap = IndicatorCalculator::calculate("005930", &bars_from(&series));
        assert!(snap.obv_5 > 0.0);
        assert!(snap.obv_10 > 0.0);
        assert!(snap.obv_23 > 0.0);
        assert!(snap.obv_56 > 0.0);
        assert!(snap.udvr_60 >= 10.0);
    }

    #[test]
    fn test_52w_position_bounds() {
        let rising: Vec<(i64, i64)> = (0..260).map(|i| (10_000 + i * 50, 1_000)).collect();
        let snap = IndicatorCalculator::calculate("005930", &bars_from(&rising));
        assert!(snap.position_52w > 90.0);

        let falling: Vec<(i64, i64)> = (0..260).map(|i| (30_000 - i * 50, 1_000)).collect();
        let snap = IndicatorCalculator::calculate("005930", &bars_from(&falling));
        assert!(snap.position_52w < 10.0);
    }

    #[test]
    fn test_avwap_pct_near_zero_on_flat_series() {
        let snap = IndicatorCalculator::calculate("005930", &flat_bars(120, 50_000, 1_000));
        assert!(snap.avwap_60 > 0.0);
        assert!(snap.avwap_60_pct.abs() < 1.0);
    }

    #[test]
    fn test_mfi_extremes() {
        let rising: Vec<(i64, i64)> = (0..40).map(|i| (50_000 + i * 500, 1_000)).collect();
        let snap = IndicatorCalculator::calculate("005930", &bars_from(&rising));
        assert!((snap.mfi_14 - 100.0).abs() < 1e-6);

        let falling: Vec<(i64, i64)> = (0..40).map(|i| (70_000 - i * 500, 1_000)).collect();
        let snap = IndicatorCalculator::calculate("005930", &bars_from(&falling));
        assert!(snap.mfi_14 < 1.0);
    }

    #[test]
    fn test_atr_positive_with_range() {
        let snap = IndicatorCalculator::calculate("005930", &flat_bars(60, 50_000, 1_000));
        // Bars carry a 2% high-low range, so ATR must be positive.
        assert!(snap.atr > 0.0);
        assert!(snap.atr_pct > 0.0);
    }
}
