use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// KST offset (UTC+9). The market calendar is defined in civil KST.
pub fn kst_offset() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("KST offset is valid")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketSession {
    Closed,
    /// Off-hours single-price session before the open (08:30-09:00).
    PreMarket,
    /// Regular session (09:00-15:30).
    Regular,
    /// Off-hours single-price sessions after the close
    /// (15:40-16:00 and 18:00-18:30).
    PostMarket,
}

const REGULAR_OPEN: NaiveTime = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
const REGULAR_CLOSE: NaiveTime = NaiveTime::from_hms_opt(15, 30, 0).unwrap();
const PRE_OPEN: NaiveTime = NaiveTime::from_hms_opt(8, 30, 0).unwrap();
const PRE_CLOSE: NaiveTime = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
const POST_1_OPEN: NaiveTime = NaiveTime::from_hms_opt(15, 40, 0).unwrap();
const POST_1_CLOSE: NaiveTime = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
const POST_2_OPEN: NaiveTime = NaiveTime::from_hms_opt(18, 0, 0).unwrap();
const POST_2_CLOSE: NaiveTime = NaiveTime::from_hms_opt(18, 30, 0).unwrap();

// KRX holidays. Static for the current year and the next; refreshed with the
// yearly exchange notice.
const HOLIDAYS_2025: &[(u32, u32)] = &[
    (1, 1),
    (1, 28),
    (1, 29),
    (1, 30),
    (3, 1),
    (5, 5),
    (5, 6),
    (6, 6),
    (8, 15),
    (10, 5),
    (10, 6),
    (10, 7),
    (10, 9),
    (12, 25),
];

const HOLIDAYS_2026: &[(u32, u32)] = &[
    (1, 1),
    (2, 16),
    (2, 17),
    (2, 18),
    (3, 1),
    (5, 5),
    (5, 24),
    (6, 6),
    (8, 15),
    (9, 24),
    (9, 25),
    (9, 26),
    (10, 9),
    (12, 25),
];

/// Answers "can an order execute now?" and "when is the next tradeable
/// instant?" for supplied timestamps. Callers always pass the time in; the
/// calendar itself never reads a clock.
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    holidays: HashSet<NaiveDate>,
}

impl MarketCalendar {
    pub fn new() -> Self {
        let mut holidays = HashSet::new();
        for &(m, d) in HOLIDAYS_2025 {
            holidays.insert(NaiveDate::from_ymd_opt(2025, m, d).expect("valid holiday"));
        }
        for &(m, d) in HOLIDAYS_2026 {
            holidays.insert(NaiveDate::from_ymd_opt(2026, m, d).expect("valid holiday"));
        }
        Self { holidays }
    }

    /// Extra closures (exchange notices, temporary halts) from configuration.
    pub fn with_extra_holidays(mut self, extra: &[NaiveDate]) -> Self {
        self.holidays.extend(extra.iter().copied());
        self
    }

    pub fn is_holiday(&self, t: DateTime<FixedOffset>) -> bool {
        self.holidays.contains(&t.date_naive())
    }

    pub fn is_weekend(&self, t: DateTime<FixedOffset>) -> bool {
        matches!(t.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn is_trading_day(&self, t: DateTime<FixedOffset>) -> bool {
        !self.is_weekend(t) && !self.is_holiday(t)
    }

    pub fn session(&self, t: DateTime<FixedOffset>) -> MarketSession {
        if !self.is_trading_day(t) {
            return MarketSession::Closed;
        }
        let now = t.time();
        if (REGULAR_OPEN..REGULAR_CLOSE).contains(&now) {
            MarketSession::Regular
        } else if (PRE_OPEN..PRE_CLOSE).contains(&now) {
            MarketSession::PreMarket
        } else if (POST_1_OPEN..POST_1_CLOSE).contains(&now)
            || (POST_2_OPEN..POST_2_CLOSE).contains(&now)
        {
            MarketSession::PostMarket
        } else {
            MarketSession::Closed
        }
    }

    pub fn can_execute(&self, t: DateTime<FixedOffset>) -> (bool, &'static str) {
        match self.session(t) {
            MarketSession::Regular => (true, "regular session"),
            MarketSession::PreMarket => (true, "pre-market single-price session"),
            MarketSession::PostMarket => (true, "post-market single-price session"),
            MarketSession::Closed => {
                if self.is_weekend(t) {
                    (false, "market closed (weekend)")
                } else if self.is_holiday(t) {
                    (false, "market closed (holiday)")
                } else {
                    (false, "market closed")
                }
            }
        }
    }

    /// First tradeable instant at or after `t`, with its session. Searches at
    /// most 30 days forward.
    pub fn next_open(&self, t: DateTime<FixedOffset>) -> (DateTime<FixedOffset>, MarketSession) {
        let at = |date: NaiveDate, time: NaiveTime| {
            t.timezone()
                .from_local_datetime(&date.and_time(time))
                .single()
                .expect("KST has no DST gaps")
        };

        if self.is_trading_day(t) {
            let now = t.time();
            let session = self.session(t);
            if session != MarketSession::Closed {
                return (t, session);
            }
            let today = t.date_naive();
            if now < PRE_OPEN {
                return (at(today, PRE_OPEN), MarketSession::PreMarket);
            }
            if now < POST_1_OPEN {
                return (at(today, POST_1_OPEN), MarketSession::PostMarket);
            }
            if now < POST_2_OPEN {
                return (at(today, POST_2_OPEN), MarketSession::PostMarket);
            }
        }

        let mut date = t.date_naive() + Duration::days(1);
        for _ in 0..30 {
            let probe = at(date, REGULAR_OPEN);
            if self.is_trading_day(probe) {
                return (at(date, PRE_OPEN), MarketSession::PreMarket);
            }
            date += Duration::days(1);
        }
        // 30-day safety stop; the calendar never has a gap this long.
        (at(date, PRE_OPEN), MarketSession::PreMarket)
    }

    /// Seconds until the next tradeable instant, None when already tradeable.
    pub fn seconds_until_open(&self, t: DateTime<FixedOffset>) -> Option<i64> {
        if self.can_execute(t).0 {
            return None;
        }
        let (open, _) = self.next_open(t);
        Some((open - t).num_seconds())
    }
}

impl Default for MarketCalendar {
    fn default() -> Self {
        Self::new()
    }
}
