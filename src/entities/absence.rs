// 🏖️ Absence Entity (leave of absence)
//
// Inclusive date range. start_date <= end_date is enforced on construction;
// invalid ranges are rejected, never swapped.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::RecordStatus;
use crate::error::{Result, RosterError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsenceType {
    pub id: String,
    pub name: String,
    pub deprecated: bool,
}

impl AbsenceType {
    pub fn new(name: &str) -> Self {
        AbsenceType {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            deprecated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Absence {
    pub id: String,
    pub member_id: String,
    pub absence_type_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub concluded: bool,
    pub status: RecordStatus,
}

impl Absence {
    pub fn new(
        member_id: &str,
        absence_type_id: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self> {
        if end_date < start_date {
            return Err(RosterError::invariant(format!(
                "absence ends ({}) before it starts ({})",
                end_date, start_date
            )));
        }

        Ok(Absence {
            id: uuid::Uuid::new_v4().to_string(),
            member_id: member_id.to_string(),
            absence_type_id: absence_type_id.to_string(),
            start_date,
            end_date,
            concluded: false,
            status: RecordStatus::Active,
        })
    }

    /// end - start in whole days (a single-day absence counts 0)
    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Still running: not deleted, not concluded, covers `date`
    pub fn is_in_effect_on(&self, date: NaiveDate) -> bool {
        !self.status.is_deleted() && !self.concluded && self.covers(date)
    }

    /// Number of ways this absence touches [first, last]: starts-before-and-covers-first,
    /// covers-last, lies-inside, spans-whole-period. One absence can match several.
    pub fn overlap_matches(&self, first: NaiveDate, last: NaiveDate) -> usize {
        let covers_first = self.covers(first);
        let covers_last = self.covers(last);
        let inside = self.start_date >= first && self.end_date <= last;
        let spans = self.start_date <= first && self.end_date >= last;

        [covers_first, covers_last, inside, spans]
            .iter()
            .filter(|hit| **hit)
            .count()
    }
}
