// 👤 Member Entity
//
// Identity: UUID. Members are never hard-deleted: merges and clean-ups flip
// `status` to Deleted so attendance history stays intact.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::RecordStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub name: String,

    /// In-game alias
    pub alias: Option<String>,
    pub email: Option<String>,

    pub rank_id: String,
    pub group_id: Option<String>,

    pub join_date: NaiveDate,
    pub discharged: bool,
    pub discharge_date: Option<NaiveDate>,

    /// Initial (mod) assessment done
    pub mods_assessed: bool,
    /// Basic qualification assessment done
    pub bqf_assessed: bool,

    pub status: RecordStatus,
}

impl Member {
    /// Register a member. Assessment flags start set; use
    /// [`Member::pending_assessments`] for a fresh recruit.
    pub fn new(name: &str, rank_id: &str, join_date: NaiveDate) -> Self {
        Member {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            alias: None,
            email: None,
            rank_id: rank_id.to_string(),
            group_id: None,
            join_date,
            discharged: false,
            discharge_date: None,
            mods_assessed: true,
            bqf_assessed: true,
            status: RecordStatus::Active,
        }
    }

    pub fn pending_assessments(mut self) -> Self {
        self.mods_assessed = false;
        self.bqf_assessed = false;
        self
    }

    pub fn with_alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn in_group(mut self, group_id: &str) -> Self {
        self.group_id = Some(group_id.to_string());
        self
    }

    pub fn is_deleted(&self) -> bool {
        self.status.is_deleted()
    }

    /// On the active roster: neither deleted nor discharged
    pub fn is_active(&self) -> bool {
        !self.is_deleted() && !self.discharged
    }

    pub fn discharge(&mut self, on: NaiveDate) {
        self.discharged = true;
        self.discharge_date = Some(on);
    }

    pub fn soft_delete(&mut self) {
        self.status = RecordStatus::Deleted;
    }

    pub fn lowered_name(&self) -> String {
        self.name.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn test_new_member_is_active() {
        let member = Member::new("Alice", "rank-1", join());
        assert!(member.is_active());
        assert!(member.mods_assessed && member.bqf_assessed);
        assert!(!member.id.is_empty());
    }

    #[test]
    fn test_discharged_or_deleted_is_inactive() {
        let mut discharged = Member::new("Bob", "rank-1", join());
        discharged.discharge(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(!discharged.is_active());
        assert!(!discharged.is_deleted());

        let mut deleted = Member::new("Carol", "rank-1", join());
        deleted.soft_delete();
        assert!(!deleted.is_active());
        assert!(deleted.is_deleted());
    }

    #[test]
    fn test_pending_assessments_clears_flags() {
        let recruit = Member::new("Dave", "rank-1", join()).pending_assessments();
        assert!(!recruit.mods_assessed);
        assert!(!recruit.bqf_assessed);
    }
}
