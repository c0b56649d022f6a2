//! Periods of the day, used to pick and rotate the background image.
//!
//! Periods cover whole local hours, both bounds inclusive:
//!
//! | period  | hours  |
//! |---------|--------|
//! | morning | 5..=9  |
//! | day     | 10..=15|
//! | evening | 16..=19|
//! | night   | 20..=4 |

use std::fmt;

use chrono::{Days, Duration, Local, NaiveDateTime, NaiveTime, Timelike};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DayTime {
    Morning,
    Day,
    Evening,
    Night,
}

impl DayTime {
    /// In order of the day. Night wraps past midnight.
    pub const ALL: [DayTime; 4] = [DayTime::Morning, DayTime::Day, DayTime::Evening, DayTime::Night];

    /// First hour of the period.
    pub fn start_hour(self) -> u32 {
        match self {
            DayTime::Morning => 5,
            DayTime::Day => 10,
            DayTime::Evening => 16,
            DayTime::Night => 20,
        }
    }

    /// Last hour of the period, inclusive.
    pub fn end_hour(self) -> u32 {
        match self {
            DayTime::Morning => 9,
            DayTime::Day => 15,
            DayTime::Evening => 19,
            DayTime::Night => 4,
        }
    }

    pub fn next(self) -> DayTime {
        match self {
            DayTime::Morning => DayTime::Day,
            DayTime::Day => DayTime::Evening,
            DayTime::Evening => DayTime::Night,
            DayTime::Night => DayTime::Morning,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DayTime::Morning => "morning",
            DayTime::Day => "day",
            DayTime::Evening => "evening",
            DayTime::Night => "night",
        }
    }

    /// The period `at` falls into.
    pub fn at(at: NaiveDateTime) -> DayTime {
        let hour = at.hour();
        // Night wraps around midnight, so it never matches here.
        Self::ALL
            .into_iter()
            .find(|period| period.start_hour() <= hour && hour <= period.end_hour())
            .unwrap_or(DayTime::Night)
    }

    pub fn now() -> DayTime {
        Self::at(Local::now().naive_local())
    }

    /// Time from `at` until the next period begins.
    pub fn time_until_next_period_start(at: NaiveDateTime) -> Duration {
        let next = Self::at(at).next();
        let start = NaiveTime::from_hms_opt(next.start_hour(), 0, 0).unwrap_or(NaiveTime::MIN);

        let mut boundary = at.date().and_time(start);
        if boundary <= at {
            boundary = at
                .date()
                .checked_add_days(Days::new(1))
                .map(|date| date.and_time(start))
                .unwrap_or(boundary);
        }
        boundary - at
    }
}

impl fmt::Display for DayTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
