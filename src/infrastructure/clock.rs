use crate::domain::calendar::kst_offset;
use crate::domain::market::KstTime;
use crate::domain::ports::Clock;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Mutex;

/// Wall clock in KST.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> KstTime {
        Utc::now().with_timezone(&kst_offset())
    }
}

/// Deterministic clock for tests; set or advance it explicitly.
pub struct ManualClock {
    now: Mutex<KstTime>,
}

impl ManualClock {
    pub fn new(now: KstTime) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> Self {
        let t = kst_offset()
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .unwrap();
        Self::new(t)
    }

    pub fn set(&self, t: KstTime) {
        *self.now.lock().unwrap() = t;
    }

    pub fn set_to(&self, year: i32, month: u32, day: u32, hour: u32, minute: u32) {
        self.set(
            kst_offset()
                .with_ymd_and_hms(year, month, day, hour, minute, 0)
                .unwrap(),
        );
    }

    pub fn advance_secs(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap();
        *now += Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> KstTime {
        *self.now.lock().unwrap()
    }
}
