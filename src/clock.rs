// 🕰️ Clock & calendar periods
// The engine never calls Utc::now() directly: every "today" comes from a Clock,
// so deadline checks can be replayed against a fixed date.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RosterError};

// ============================================================================
// CLOCK
// ============================================================================

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar date of `now()` in the given timezone
    fn today(&self, tz: Tz) -> NaiveDate {
        self.now().with_timezone(&tz).date_naive()
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Frozen clock for tests and replays
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Noon UTC on the given day. Panics on an invalid date.
    pub fn on(year: i32, month: u32, day: u32) -> Self {
        FixedClock(
            Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
                .single()
                .expect("FixedClock::on needs a valid calendar date"),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ============================================================================
// PERIOD
// ============================================================================

/// A reporting window: UTC instants for event filtering, local calendar days
/// for membership/absence comparisons and messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl Period {
    /// Period bounded by two UTC instants
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Period {
            start,
            end,
            first_day: start.date_naive(),
            last_day: end.date_naive(),
        }
    }

    /// Calendar month in `tz`: first day 00:00 to last day 23:59
    pub fn month(tz: Tz, year: i32, month: u32) -> Result<Self> {
        let first_day = NaiveDate::from_ymd_opt(year, month, 1)
            .ok_or_else(|| RosterError::invariant(format!("invalid month {}-{}", year, month)))?;
        let last_day = last_day_of_month(first_day);

        let start = tz
            .with_ymd_and_hms(year, month, 1, 0, 0, 0)
            .earliest()
            .ok_or_else(|| RosterError::invariant(format!("no local midnight on {}", first_day)))?;
        let end = tz
            .with_ymd_and_hms(year, month, last_day.day(), 23, 59, 0)
            .latest()
            .ok_or_else(|| RosterError::invariant(format!("no local 23:59 on {}", last_day)))?;

        Ok(Period {
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
            first_day,
            last_day,
        })
    }

    /// Month preceding the one `today` falls in
    pub fn previous_month(tz: Tz, today: NaiveDate) -> Result<Self> {
        let (year, month) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        Period::month(tz, year, month)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }

    /// "between 2024-01-01 and 2024-01-31"
    pub fn between_label(&self) -> String {
        format!(
            "between {} and {}",
            self.first_day.format("%Y-%m-%d"),
            self.last_day.format("%Y-%m-%d")
        )
    }
}

fn last_day_of_month(first_day: NaiveDate) -> NaiveDate {
    let (year, month) = if first_day.month() == 12 {
        (first_day.year() + 1, 1)
    } else {
        (first_day.year(), first_day.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(first_day)
}
