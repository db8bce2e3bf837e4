//! Time as a capability: `TODAY()`/`NOW()` read through a [`Clock`] instead
//! of calling `chrono::Local` directly, so evaluation stays deterministic in
//! tests. Only the `system-clock` feature wires up wall-clock time.

use chrono::{NaiveDate, NaiveDateTime};

pub trait Clock {
    fn today(&self) -> NaiveDate;
    fn now(&self) -> NaiveDateTime;
}

/// A clock that always reports the same instant, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: NaiveDateTime,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Self {
        let date = NaiveDate::from_ymd_opt(year, month, day).expect("valid date");
        Self {
            now: date.and_hms_opt(0, 0, 0).expect("valid time"),
        }
    }
}

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.now.date()
    }

    fn now(&self) -> NaiveDateTime {
        self.now
    }
}

/// The host's wall clock, via `chrono::Local`. Gated behind `system-clock`
/// so a caller that never opts in can't accidentally depend on ambient time.
#[cfg(feature = "system-clock")]
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[cfg(feature = "system-clock")]
impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }

    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}
