// 📋 Roster queries
// Active/recruit/leader selections plus a per-member status summary.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::adequacy::{absence_covering, events_attended, is_absent};
use crate::classifier::{ready_for_promotion, recruit_warning, DueCheck};
use crate::config::EngineConfig;
use crate::db::{self, MemberFilter};
use crate::deadlines::Deadlines;
use crate::entities::{Member, Rank};
use crate::error::{Result, RosterError};

fn rank_index(conn: &Connection) -> Result<HashMap<String, Rank>> {
    Ok(db::all_ranks(conn)?
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect())
}

fn rank_of<'a>(ranks: &'a HashMap<String, Rank>, member: &Member) -> Result<&'a Rank> {
    ranks
        .get(&member.rank_id)
        .ok_or_else(|| RosterError::not_found("Rank", member.rank_id.clone()))
}

/// Active members with their rank, filtered by a rank predicate
fn active_where<F>(conn: &Connection, filter: &MemberFilter, keep: F) -> Result<Vec<Member>>
where
    F: Fn(&Rank) -> bool,
{
    let ranks = rank_index(conn)?;
    let mut selected = Vec::new();
    for member in db::list_members(conn, filter)? {
        if keep(rank_of(&ranks, &member)?) {
            selected.push(member);
        }
    }
    Ok(selected)
}

/// Not deleted, not discharged; recruits only when asked for
pub fn active_members(
    conn: &Connection,
    config: &EngineConfig,
    include_recruits: bool,
) -> Result<Vec<Member>> {
    active_where(conn, &MemberFilter::active(), |rank| {
        include_recruits || !rank.is_entry_level(&config.entry_level_marker)
    })
}

/// Active members holding an entry-level rank
pub fn recruits(conn: &Connection, config: &EngineConfig) -> Result<Vec<Member>> {
    active_where(conn, &MemberFilter::active(), |rank| {
        rank.is_entry_level(&config.entry_level_marker)
    })
}

/// Active members whose rank may lead a group
pub fn qualified_leaders(conn: &Connection, config: &EngineConfig) -> Result<Vec<Member>> {
    active_where(conn, &MemberFilter::active(), |rank| {
        config.is_qualified_leader_rank(&rank.name)
    })
}

/// Active members who had joined on or before `date`
pub fn active_members_joined_by(
    conn: &Connection,
    config: &EngineConfig,
    date: NaiveDate,
    include_recruits: bool,
) -> Result<Vec<Member>> {
    let filter = MemberFilter::active().joined_by(date);
    active_where(conn, &filter, |rank| {
        include_recruits || !rank.is_entry_level(&config.entry_level_marker)
    })
}

// ============================================================================
// MEMBER STATUS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberStatus {
    pub member_id: String,
    pub name: String,
    pub rank: String,
    pub is_recruit: bool,
    pub join_date: NaiveDate,
    pub deadlines: Deadlines,
    pub qualification_due_days: i64,
    pub assessment_due_days: Option<i64>,
    pub events_attended: usize,
    pub ready_for_promotion: bool,
    pub absent: bool,
    /// End date of the absence covering `today`, if any
    pub absent_until: Option<NaiveDate>,
    pub recruit_warning: DueCheck,
    pub open_warnings: Vec<String>,
}

/// Everything the engine knows about one member as of `today`
pub fn member_status(
    conn: &Connection,
    config: &EngineConfig,
    member_id: &str,
    today: NaiveDate,
) -> Result<MemberStatus> {
    let member = db::get_member(conn, member_id)?;
    let rank = db::get_rank(conn, &member.rank_id)?;
    let marker = &config.entry_level_marker;

    let absences = db::absences_for_member(conn, &member.id)?;
    let attendances = db::attendance_details_for_member(conn, &member.id)?;
    let deadlines = Deadlines::for_member(&member, &absences);
    let attended = events_attended(&attendances);

    let open_warnings = db::warnings_for_member(conn, &member.id)?
        .into_iter()
        .filter(|w| !w.acknowledged)
        .map(|w| w.message)
        .collect();

    Ok(MemberStatus {
        member_id: member.id.clone(),
        name: member.name.clone(),
        rank: rank.name.clone(),
        is_recruit: rank.is_entry_level(marker),
        join_date: member.join_date,
        qualification_due_days: deadlines.qualification_due_days(today),
        assessment_due_days: deadlines.assessment_due_days(&member, &rank, marker, today),
        events_attended: attended,
        ready_for_promotion: ready_for_promotion(&member, &rank, marker, attended),
        absent: is_absent(&absences, today),
        absent_until: absence_covering(&absences, today).map(|a| a.end_date),
        recruit_warning: recruit_warning(&member, &rank, marker, &deadlines, today),
        deadlines,
        open_warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::MOD_ASSESSMENT_OVERDUE;
    use crate::fixtures::{d, Fixture};

    fn names(members: &[Member]) -> Vec<&str> {
        members.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_active_members_and_recruits() {
        let fx = Fixture::new();
        fx.recruit("Rookie", d(2024, 1, 1));
        fx.private("Vet", d(2023, 1, 1));

        let mut gone = Member::new("Gone", &fx.private_rank.id, d(2023, 1, 1));
        gone.discharge(d(2023, 6, 1));
        fx.add_member(gone);

        let mut deleted = Member::new("Deleted", &fx.private_rank.id, d(2023, 1, 1));
        deleted.soft_delete();
        fx.add_member(deleted);

        assert_eq!(names(&active_members(&fx.conn, &fx.config, true).unwrap()), vec!["Rookie", "Vet"]);
        assert_eq!(names(&active_members(&fx.conn, &fx.config, false).unwrap()), vec!["Vet"]);
        assert_eq!(names(&recruits(&fx.conn, &fx.config).unwrap()), vec!["Rookie"]);
    }

    #[test]
    fn test_qualified_leaders_exact_match() {
        let fx = Fixture::new();
        fx.add_member(Member::new("Sarge", &fx.ssgt_rank.id, d(2022, 1, 1)));
        fx.private("Vet", d(2023, 1, 1));

        let leaders = qualified_leaders(&fx.conn, &fx.config).unwrap();
        assert_eq!(names(&leaders), vec!["Sarge"]);
    }

    #[test]
    fn test_joined_by() {
        let fx = Fixture::new();
        fx.private("Early", d(2024, 1, 1));
        fx.private("Late", d(2024, 3, 10));
        fx.recruit("Rookie", d(2024, 1, 1));

        let members = active_members_joined_by(&fx.conn, &fx.config, d(2024, 3, 1), true).unwrap();
        assert_eq!(names(&members), vec!["Early", "Rookie"]);

        let members = active_members_joined_by(&fx.conn, &fx.config, d(2024, 3, 1), false).unwrap();
        assert_eq!(names(&members), vec!["Early"]);
    }

    #[test]
    fn test_member_status_for_overdue_recruit() {
        let fx = Fixture::new();
        let member = fx.recruit("Alice", d(2024, 1, 1));
        fx.absence(&member, d(2024, 1, 18), d(2024, 1, 25));

        let status = member_status(&fx.conn, &fx.config, &member.id, d(2024, 1, 20)).unwrap();
        assert!(status.is_recruit);
        assert!(status.absent);
        assert_eq!(status.absent_until, Some(d(2024, 1, 25)));
        // 7 absent days push the assessment deadline to 2024-01-22
        assert_eq!(status.assessment_due_days, Some(2));
        assert!(!status.recruit_warning.due);
        assert!(!status.ready_for_promotion);

        let later = member_status(&fx.conn, &fx.config, &member.id, d(2024, 2, 1)).unwrap();
        assert_eq!(later.recruit_warning.reason.as_deref(), Some(MOD_ASSESSMENT_OVERDUE));
        assert!(!later.absent);
        println!("✅ {}", serde_json::to_string(&later).unwrap());
    }

    #[test]
    fn test_member_status_unknown_member() {
        let fx = Fixture::new();
        let err = member_status(&fx.conn, &fx.config, "nobody", d(2024, 1, 1)).unwrap_err();
        assert!(err.is_not_found());
    }
}
