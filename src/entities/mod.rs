// Entity Models
//
// Each record has a stable UUID identity. Records that must survive for
// history (members, absences) carry an explicit RecordStatus instead of
// being removed.

pub mod rank;
pub mod member;
pub mod absence;
pub mod event;
pub mod attendance;
pub mod warning;
pub mod contribution;

pub use rank::{Rank, MemberGroup};
pub use member::Member;
pub use absence::{Absence, AbsenceType};
pub use event::{Event, EventType};
pub use attendance::{Attendance, AttendanceDetail};
pub use warning::{Warning, WarningType};
pub use contribution::{Contribution, ContributionType};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

// ============================================================================
// RECORD STATUS (soft delete)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Deleted,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Deleted => "deleted",
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, RecordStatus::Deleted)
    }
}

impl ToSql for RecordStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RecordStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "active" => Ok(RecordStatus::Active),
            "deleted" => Ok(RecordStatus::Deleted),
            other => Err(FromSqlError::Other(
                format!("unknown record status '{}'", other).into(),
            )),
        }
    }
}
