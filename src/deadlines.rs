// ⏳ Time & Absence Calculator
//
// Every compliance deadline is join_date + base offset + lifetime absent days.
// Absent days are summed per record: deleted absences count, overlapping
// absences are not merged.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::entities::{Absence, Member, Rank};

/// Days after joining to attend the required number of events
pub const ATTENDANCE_DEADLINE_DAYS: i64 = 60;

/// Qualifying events an entry-level member must attend
pub const REQUIRED_QUALIFYING_EVENTS: u32 = 5;

/// Days after joining to qualify for promotion
pub const QUALIFICATION_DEADLINE_DAYS: i64 = 56;

/// Days after joining to pass the initial assessment
pub const ASSESSMENT_DEADLINE_DAYS: i64 = 14;

/// Sum of (end - start) over every absence record, never negative
pub fn total_absent_days(absences: &[Absence]) -> i64 {
    absences.iter().map(|a| a.days().max(0)).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadlines {
    pub absent_days: i64,
    pub attendance: NaiveDate,
    pub required_events: u32,
    pub qualification: NaiveDate,
    pub initial_assessment: NaiveDate,
}

impl Deadlines {
    /// `absences` must be every absence owned by the member
    pub fn compute(join_date: NaiveDate, absences: &[Absence]) -> Self {
        let absent_days = total_absent_days(absences);
        let shift = |base: i64| join_date + Duration::days(base + absent_days);

        Deadlines {
            absent_days,
            attendance: shift(ATTENDANCE_DEADLINE_DAYS),
            required_events: REQUIRED_QUALIFYING_EVENTS,
            qualification: shift(QUALIFICATION_DEADLINE_DAYS),
            initial_assessment: shift(ASSESSMENT_DEADLINE_DAYS),
        }
    }

    pub fn for_member(member: &Member, absences: &[Absence]) -> Self {
        Deadlines::compute(member.join_date, absences)
    }

    /// Attendance deadline and the event count it requires
    pub fn attendance_deadline_and_count(&self) -> (NaiveDate, u32) {
        (self.attendance, self.required_events)
    }

    /// Days left until the qualification deadline (negative once passed)
    pub fn qualification_due_days(&self, today: NaiveDate) -> i64 {
        (self.qualification - today).num_days()
    }

    /// Days left for the initial assessment; None when it does not apply
    pub fn assessment_due_days(
        &self,
        member: &Member,
        rank: &Rank,
        entry_level_marker: &str,
        today: NaiveDate,
    ) -> Option<i64> {
        if !rank.is_entry_level(entry_level_marker) || member.mods_assessed {
            return None;
        }
        Some((self.initial_assessment - today).num_days())
    }
}
