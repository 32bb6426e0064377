// 📊 Attendance Evaluator
// Per-event adequacy (ratio of the event span actually attended) and
// per-period adequacy (enough adequate events inside a window).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::clock::Period;
use crate::entities::{Absence, AttendanceDetail, Event, Member};

pub const NOT_A_MEMBER_FOR_PERIOD: &str = "Was not a member for entire period.";
pub const ABSENT_DURING_PERIOD: &str = "Was marked absent during period.";
pub const NO_ATTENDANCE_ISSUES: &str = "No attendance issues.";

// ============================================================================
// PER EVENT
// ============================================================================

impl AttendanceDetail {
    /// attended / (end - start), clamped to [0.0, 1.0]; 0.0 for zero-length events
    pub fn ratio(&self) -> f64 {
        let span = self.event.duration_seconds();
        if span <= 0 {
            return 0.0;
        }
        let ratio = self.attendance.attended_seconds as f64 / span as f64;
        ratio.clamp(0.0, 1.0)
    }

    /// Strictly above the event type's minimum; exactly-at-threshold fails
    pub fn is_adequate(&self) -> bool {
        self.ratio() > self.event_type.minimum_required_ratio
    }

    pub fn is_training(&self, training_event_type: &str) -> bool {
        self.event_type.is_named(training_event_type)
    }
}

/// Number of adequate attendances (promotion gate)
pub fn events_attended(attendances: &[AttendanceDetail]) -> usize {
    attendances.iter().filter(|a| a.is_adequate()).count()
}

// ============================================================================
// PER PERIOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodRequirement {
    pub min_total_events: usize,
    pub min_trainings: usize,

    /// Late joiners and members on leave pass automatically
    pub treat_absence_as_adequate: bool,
}

impl Default for PeriodRequirement {
    fn default() -> Self {
        PeriodRequirement {
            min_total_events: 1,
            min_trainings: 0,
            treat_absence_as_adequate: false,
        }
    }
}

impl PeriodRequirement {
    pub fn excusing_absence(mut self) -> Self {
        self.treat_absence_as_adequate = true;
        self
    }

    pub fn with_min_total_events(mut self, count: usize) -> Self {
        self.min_total_events = count;
        self
    }

    pub fn with_min_trainings(mut self, count: usize) -> Self {
        self.min_trainings = count;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAdequacy {
    pub adequate: bool,
    pub reason: String,
    pub attended_training: usize,
    pub attended_other: usize,
}

impl PeriodAdequacy {
    fn excused(reason: &str) -> Self {
        PeriodAdequacy {
            adequate: true,
            reason: reason.to_string(),
            attended_training: 0,
            attended_other: 0,
        }
    }

    pub fn attended_total(&self) -> usize {
        self.attended_training + self.attended_other
    }
}

/// "Did not attend enough events between <start> and <end>."
pub fn not_enough_events_message(period: &Period) -> String {
    format!("Did not attend enough events {}.", period.between_label())
}

pub fn not_enough_trainings_message(period: &Period) -> String {
    format!("Did not attend enough trainings {}.", period.between_label())
}

/// Judge a member's attendance over `period`.
///
/// `absences` is every absence the member owns (deleted ones too);
/// `attendances` may be all of the member's attendances, only those whose
/// event is in `events` are counted.
pub fn period_adequacy(
    member: &Member,
    absences: &[Absence],
    attendances: &[AttendanceDetail],
    events: &[Event],
    period: &Period,
    requirement: &PeriodRequirement,
    training_event_type: &str,
) -> PeriodAdequacy {
    if requirement.treat_absence_as_adequate {
        if member.join_date > period.first_day {
            return PeriodAdequacy::excused(NOT_A_MEMBER_FOR_PERIOD);
        }

        if absence_matches(absences, period.first_day, period.last_day) > 0 {
            return PeriodAdequacy::excused(ABSENT_DURING_PERIOD);
        }
    }

    let event_ids: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();

    let mut attended_training = 0;
    let mut attended_other = 0;

    for detail in attendances
        .iter()
        .filter(|a| event_ids.contains(a.attendance.event_id.as_str()))
    {
        if !detail.is_adequate() {
            continue;
        }
        if detail.is_training(training_event_type) {
            attended_training += 1;
        } else {
            attended_other += 1;
        }
    }

    let (adequate, reason) = if attended_training + attended_other < requirement.min_total_events {
        (false, not_enough_events_message(period))
    } else if attended_training < requirement.min_trainings {
        (false, not_enough_trainings_message(period))
    } else {
        (true, NO_ATTENDANCE_ISSUES.to_string())
    };

    PeriodAdequacy {
        adequate,
        reason,
        attended_training,
        attended_other,
    }
}

/// Sum of the four overlap cases over all absences; one absence may add
/// up to three matches
pub fn absence_matches(absences: &[Absence], first: NaiveDate, last: NaiveDate) -> usize {
    absences.iter().map(|a| a.overlap_matches(first, last)).sum()
}

/// An active, unconcluded absence covers `today`
pub fn is_absent(absences: &[Absence], today: NaiveDate) -> bool {
    absences.iter().any(|a| a.is_in_effect_on(today))
}

/// First non-deleted absence covering `date` (concluded ones included)
pub fn absence_covering(absences: &[Absence], date: NaiveDate) -> Option<&Absence> {
    absences
        .iter()
        .find(|a| !a.status.is_deleted() && a.covers(date))
}
