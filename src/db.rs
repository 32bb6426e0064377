// 🗄️ Record store - SQLite persistence for every roster entity
//
// Free functions over a borrowed Connection. Soft-deleted rows stay in their
// tables; every roster query filters on `status` explicitly.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::clock::Period;
use crate::entities::{
    Absence, AbsenceType, Attendance, AttendanceDetail, Contribution, ContributionType, Event,
    EventType, Member, MemberGroup, Rank, RecordStatus, Warning, WarningType,
};
use crate::error::{Result, RosterError};

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery (in-memory databases silently keep "memory")
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS ranks (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL COLLATE NOCASE
        );

        CREATE TABLE IF NOT EXISTS member_groups (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL COLLATE NOCASE,
            leader_id TEXT
        );

        CREATE TABLE IF NOT EXISTS members (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            alias TEXT,
            email TEXT,
            rank_id TEXT NOT NULL,
            group_id TEXT,
            join_date TEXT NOT NULL,
            discharged INTEGER NOT NULL DEFAULT 0,
            discharge_date TEXT,
            mods_assessed INTEGER NOT NULL DEFAULT 1,
            bqf_assessed INTEGER NOT NULL DEFAULT 1,
            status TEXT NOT NULL DEFAULT 'active'
        );

        CREATE TABLE IF NOT EXISTS event_types (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            default_start_hour INTEGER NOT NULL,
            default_end_hour INTEGER NOT NULL,
            minimum_required_ratio REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            event_type_id TEXT NOT NULL,
            start_dt TEXT NOT NULL,
            end_dt TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS absence_types (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL COLLATE NOCASE,
            deprecated INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS absences (
            id TEXT PRIMARY KEY,
            member_id TEXT NOT NULL,
            absence_type_id TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            concluded INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active',
            CHECK (start_date <= end_date)
        );

        CREATE TABLE IF NOT EXISTS attendances (
            id TEXT PRIMARY KEY,
            event_id TEXT NOT NULL,
            member_id TEXT NOT NULL,
            attended_seconds INTEGER NOT NULL,
            UNIQUE (event_id, member_id)
        );

        CREATE TABLE IF NOT EXISTS warning_types (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL COLLATE NOCASE
        );

        CREATE TABLE IF NOT EXISTS warnings (
            id TEXT PRIMARY KEY,
            dedup_key TEXT UNIQUE NOT NULL,
            member_id TEXT NOT NULL,
            warning_type_id TEXT NOT NULL,
            message TEXT NOT NULL,
            notified INTEGER NOT NULL DEFAULT 0,
            acknowledged INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS contribution_types (
            id TEXT PRIMARY KEY,
            name TEXT UNIQUE NOT NULL COLLATE NOCASE
        );

        CREATE TABLE IF NOT EXISTS contributions (
            id TEXT PRIMARY KEY,
            member_id TEXT NOT NULL,
            contribution_type_id TEXT NOT NULL,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL
        );

        -- Audit trail: every engine mutation is an entry
        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            action TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        );

        -- Messages handed over to the external mailer
        CREATE TABLE IF NOT EXISTS notification_outbox (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender TEXT NOT NULL,
            recipients TEXT NOT NULL,
            subject TEXT NOT NULL,
            body TEXT NOT NULL,
            queued_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_members_status ON members(status, discharged);
        CREATE INDEX IF NOT EXISTS idx_absences_member ON absences(member_id);
        CREATE INDEX IF NOT EXISTS idx_attendances_member ON attendances(member_id);
        CREATE INDEX IF NOT EXISTS idx_events_start ON events(start_dt);
        CREATE INDEX IF NOT EXISTS idx_warnings_pending ON warnings(notified, acknowledged);
        CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_log(entity_type, entity_id);",
    )?;

    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ============================================================================
// RANKS & GROUPS
// ============================================================================

fn rank_from_row(row: &Row) -> rusqlite::Result<Rank> {
    Ok(Rank {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

pub fn insert_rank(conn: &Connection, rank: &Rank) -> Result<()> {
    conn.execute(
        "INSERT INTO ranks (id, name) VALUES (?1, ?2)",
        params![rank.id, rank.name],
    )?;
    Ok(())
}

pub fn get_rank(conn: &Connection, id: &str) -> Result<Rank> {
    conn.query_row("SELECT id, name FROM ranks WHERE id = ?1", [id], rank_from_row)
        .optional()?
        .ok_or_else(|| RosterError::not_found("Rank", id))
}

/// Case-insensitive exact name lookup
pub fn find_rank_by_name(conn: &Connection, name: &str) -> Result<Rank> {
    conn.query_row(
        "SELECT id, name FROM ranks WHERE name = ?1 COLLATE NOCASE",
        [name],
        rank_from_row,
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("Rank", name))
}

pub fn all_ranks(conn: &Connection) -> Result<Vec<Rank>> {
    let mut stmt = conn.prepare("SELECT id, name FROM ranks ORDER BY name")?;
    let ranks = stmt
        .query_map([], rank_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ranks)
}

fn group_from_row(row: &Row) -> rusqlite::Result<MemberGroup> {
    Ok(MemberGroup {
        id: row.get(0)?,
        name: row.get(1)?,
        leader_id: row.get(2)?,
    })
}

pub fn insert_group(conn: &Connection, group: &MemberGroup) -> Result<()> {
    conn.execute(
        "INSERT INTO member_groups (id, name, leader_id) VALUES (?1, ?2, ?3)",
        params![group.id, group.name, group.leader_id],
    )?;
    Ok(())
}

pub fn get_group(conn: &Connection, id: &str) -> Result<MemberGroup> {
    conn.query_row(
        "SELECT id, name, leader_id FROM member_groups WHERE id = ?1",
        [id],
        group_from_row,
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("MemberGroup", id))
}

pub fn find_group_by_name(conn: &Connection, name: &str) -> Result<MemberGroup> {
    conn.query_row(
        "SELECT id, name, leader_id FROM member_groups WHERE name = ?1 COLLATE NOCASE",
        [name],
        group_from_row,
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("MemberGroup", name))
}

pub fn all_groups(conn: &Connection) -> Result<Vec<MemberGroup>> {
    let mut stmt = conn.prepare("SELECT id, name, leader_id FROM member_groups ORDER BY name")?;
    let groups = stmt
        .query_map([], group_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(groups)
}

// ============================================================================
// MEMBERS
// ============================================================================

const MEMBER_COLUMNS: &str = "id, name, alias, email, rank_id, group_id, join_date, discharged, \
     discharge_date, mods_assessed, bqf_assessed, status";

fn member_from_row(row: &Row) -> rusqlite::Result<Member> {
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        alias: row.get(2)?,
        email: row.get(3)?,
        rank_id: row.get(4)?,
        group_id: row.get(5)?,
        join_date: row.get(6)?,
        discharged: row.get(7)?,
        discharge_date: row.get(8)?,
        mods_assessed: row.get(9)?,
        bqf_assessed: row.get(10)?,
        status: row.get(11)?,
    })
}

/// Predicate for member retrieval. The default selects the active roster.
#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub include_deleted: bool,
    pub include_discharged: bool,
    pub group_id: Option<String>,
    pub joined_on_or_before: Option<NaiveDate>,
}

impl MemberFilter {
    pub fn active() -> Self {
        MemberFilter::default()
    }

    /// Every row, deleted and discharged included
    pub fn everyone() -> Self {
        MemberFilter {
            include_deleted: true,
            include_discharged: true,
            ..MemberFilter::default()
        }
    }

    pub fn in_group(mut self, group_id: &str) -> Self {
        self.group_id = Some(group_id.to_string());
        self
    }

    pub fn joined_by(mut self, date: NaiveDate) -> Self {
        self.joined_on_or_before = Some(date);
        self
    }

    fn matches(&self, member: &Member) -> bool {
        if !self.include_deleted && member.status.is_deleted() {
            return false;
        }
        if !self.include_discharged && member.discharged {
            return false;
        }
        if let Some(group_id) = &self.group_id {
            if member.group_id.as_deref() != Some(group_id.as_str()) {
                return false;
            }
        }
        if let Some(date) = self.joined_on_or_before {
            if member.join_date > date {
                return false;
            }
        }
        true
    }
}

pub fn insert_member(conn: &Connection, member: &Member) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO members ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            MEMBER_COLUMNS
        ),
        params![
            member.id,
            member.name,
            member.alias,
            member.email,
            member.rank_id,
            member.group_id,
            member.join_date,
            member.discharged,
            member.discharge_date,
            member.mods_assessed,
            member.bqf_assessed,
            member.status,
        ],
    )?;
    Ok(())
}

pub fn update_member(conn: &Connection, member: &Member) -> Result<()> {
    let changed = conn.execute(
        "UPDATE members SET name = ?2, alias = ?3, email = ?4, rank_id = ?5, group_id = ?6,
            join_date = ?7, discharged = ?8, discharge_date = ?9, mods_assessed = ?10,
            bqf_assessed = ?11, status = ?12
         WHERE id = ?1",
        params![
            member.id,
            member.name,
            member.alias,
            member.email,
            member.rank_id,
            member.group_id,
            member.join_date,
            member.discharged,
            member.discharge_date,
            member.mods_assessed,
            member.bqf_assessed,
            member.status,
        ],
    )?;

    if changed == 0 {
        return Err(RosterError::not_found("Member", member.id.clone()));
    }
    Ok(())
}

pub fn get_member(conn: &Connection, id: &str) -> Result<Member> {
    conn.query_row(
        &format!("SELECT {} FROM members WHERE id = ?1", MEMBER_COLUMNS),
        [id],
        member_from_row,
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("Member", id))
}

/// Members matching `filter`, ordered by name
pub fn list_members(conn: &Connection, filter: &MemberFilter) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM members ORDER BY name COLLATE NOCASE",
        MEMBER_COLUMNS
    ))?;
    let members = stmt
        .query_map([], member_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(members.into_iter().filter(|m| filter.matches(m)).collect())
}

// ============================================================================
// EVENTS
// ============================================================================

fn event_type_from_row(row: &Row) -> rusqlite::Result<EventType> {
    Ok(EventType {
        id: row.get(0)?,
        name: row.get(1)?,
        default_start_hour: row.get(2)?,
        default_end_hour: row.get(3)?,
        minimum_required_ratio: row.get(4)?,
    })
}

pub fn insert_event_type(conn: &Connection, event_type: &EventType) -> Result<()> {
    conn.execute(
        "INSERT INTO event_types (id, name, default_start_hour, default_end_hour, minimum_required_ratio)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event_type.id,
            event_type.name,
            event_type.default_start_hour,
            event_type.default_end_hour,
            event_type.minimum_required_ratio,
        ],
    )?;
    Ok(())
}

pub fn get_event_type(conn: &Connection, id: &str) -> Result<EventType> {
    conn.query_row(
        "SELECT id, name, default_start_hour, default_end_hour, minimum_required_ratio
         FROM event_types WHERE id = ?1",
        [id],
        event_type_from_row,
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("EventType", id))
}

pub fn find_event_type_by_name(conn: &Connection, name: &str) -> Result<EventType> {
    conn.query_row(
        "SELECT id, name, default_start_hour, default_end_hour, minimum_required_ratio
         FROM event_types WHERE name = ?1 COLLATE NOCASE",
        [name],
        event_type_from_row,
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("EventType", name))
}

fn event_from_row(row: &Row) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        name: row.get(1)?,
        event_type_id: row.get(2)?,
        start_dt: row.get(3)?,
        end_dt: row.get(4)?,
        duration_minutes: row.get(5)?,
    })
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    conn.execute(
        "INSERT INTO events (id, name, event_type_id, start_dt, end_dt, duration_minutes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            event.id,
            event.name,
            event.event_type_id,
            event.start_dt,
            event.end_dt,
            event.duration_minutes,
        ],
    )?;
    Ok(())
}

pub fn get_event(conn: &Connection, id: &str) -> Result<Event> {
    conn.query_row(
        "SELECT id, name, event_type_id, start_dt, end_dt, duration_minutes FROM events WHERE id = ?1",
        [id],
        event_from_row,
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("Event", id))
}

pub fn all_events(conn: &Connection) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, event_type_id, start_dt, end_dt, duration_minutes FROM events",
    )?;
    let mut events = stmt
        .query_map([], event_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    events.sort_by_key(|e| e.start_dt);
    Ok(events)
}

/// Events starting inside the period, ordered by start.
/// Filtered on parsed timestamps rather than stored text.
pub fn events_in_period(conn: &Connection, period: &Period) -> Result<Vec<Event>> {
    Ok(all_events(conn)?
        .into_iter()
        .filter(|e| period.contains(e.start_dt))
        .collect())
}

// ============================================================================
// ABSENCES
// ============================================================================

pub fn insert_absence_type(conn: &Connection, absence_type: &AbsenceType) -> Result<()> {
    conn.execute(
        "INSERT INTO absence_types (id, name, deprecated) VALUES (?1, ?2, ?3)",
        params![absence_type.id, absence_type.name, absence_type.deprecated],
    )?;
    Ok(())
}

pub fn find_absence_type_by_name(conn: &Connection, name: &str) -> Result<AbsenceType> {
    conn.query_row(
        "SELECT id, name, deprecated FROM absence_types WHERE name = ?1 COLLATE NOCASE",
        [name],
        |row| {
            Ok(AbsenceType {
                id: row.get(0)?,
                name: row.get(1)?,
                deprecated: row.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("AbsenceType", name))
}

fn absence_from_row(row: &Row) -> rusqlite::Result<Absence> {
    Ok(Absence {
        id: row.get(0)?,
        member_id: row.get(1)?,
        absence_type_id: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        concluded: row.get(5)?,
        status: row.get(6)?,
    })
}

pub fn insert_absence(conn: &Connection, absence: &Absence) -> Result<()> {
    if absence.end_date < absence.start_date {
        return Err(RosterError::invariant(format!(
            "absence {} ends before it starts",
            absence.id
        )));
    }

    conn.execute(
        "INSERT INTO absences (id, member_id, absence_type_id, start_date, end_date, concluded, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            absence.id,
            absence.member_id,
            absence.absence_type_id,
            absence.start_date,
            absence.end_date,
            absence.concluded,
            absence.status,
        ],
    )?;
    Ok(())
}

pub fn update_absence(conn: &Connection, absence: &Absence) -> Result<()> {
    if absence.end_date < absence.start_date {
        return Err(RosterError::invariant(format!(
            "absence {} ends before it starts",
            absence.id
        )));
    }

    let changed = conn.execute(
        "UPDATE absences SET member_id = ?2, absence_type_id = ?3, start_date = ?4,
            end_date = ?5, concluded = ?6, status = ?7
         WHERE id = ?1",
        params![
            absence.id,
            absence.member_id,
            absence.absence_type_id,
            absence.start_date,
            absence.end_date,
            absence.concluded,
            absence.status,
        ],
    )?;

    if changed == 0 {
        return Err(RosterError::not_found("Absence", absence.id.clone()));
    }
    Ok(())
}

/// Every absence of the member, deleted ones included
pub fn absences_for_member(conn: &Connection, member_id: &str) -> Result<Vec<Absence>> {
    let mut stmt = conn.prepare(
        "SELECT id, member_id, absence_type_id, start_date, end_date, concluded, status
         FROM absences WHERE member_id = ?1 ORDER BY start_date",
    )?;
    let absences = stmt
        .query_map([member_id], absence_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(absences)
}

pub fn reassign_absence(conn: &Connection, absence_id: &str, member_id: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE absences SET member_id = ?2 WHERE id = ?1",
        params![absence_id, member_id],
    )?;
    if changed == 0 {
        return Err(RosterError::not_found("Absence", absence_id));
    }
    Ok(())
}

// ============================================================================
// ATTENDANCES
// ============================================================================

fn attendance_from_row(row: &Row) -> rusqlite::Result<Attendance> {
    Ok(Attendance {
        id: row.get(0)?,
        event_id: row.get(1)?,
        member_id: row.get(2)?,
        attended_seconds: row.get(3)?,
    })
}

/// Fails with DuplicateAttendance if the (event, member) pair already exists
pub fn insert_attendance(conn: &Connection, attendance: &Attendance) -> Result<()> {
    let result = conn.execute(
        "INSERT INTO attendances (id, event_id, member_id, attended_seconds) VALUES (?1, ?2, ?3, ?4)",
        params![
            attendance.id,
            attendance.event_id,
            attendance.member_id,
            attendance.attended_seconds,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(RosterError::DuplicateAttendance {
            event_id: attendance.event_id.clone(),
            member_id: attendance.member_id.clone(),
        }),
        Err(e) => Err(e.into()),
    }
}

pub fn find_attendance(
    conn: &Connection,
    event_id: &str,
    member_id: &str,
) -> Result<Option<Attendance>> {
    let attendance = conn
        .query_row(
            "SELECT id, event_id, member_id, attended_seconds FROM attendances
             WHERE event_id = ?1 AND member_id = ?2",
            params![event_id, member_id],
            attendance_from_row,
        )
        .optional()?;
    Ok(attendance)
}

pub fn attendances_for_member(conn: &Connection, member_id: &str) -> Result<Vec<Attendance>> {
    let mut stmt = conn.prepare(
        "SELECT id, event_id, member_id, attended_seconds FROM attendances WHERE member_id = ?1",
    )?;
    let attendances = stmt
        .query_map([member_id], attendance_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(attendances)
}

const ATTENDANCE_DETAIL_SELECT: &str = "SELECT a.id, a.event_id, a.member_id, a.attended_seconds,
        e.id, e.name, e.event_type_id, e.start_dt, e.end_dt, e.duration_minutes,
        t.id, t.name, t.default_start_hour, t.default_end_hour, t.minimum_required_ratio
     FROM attendances a
     JOIN events e ON e.id = a.event_id
     JOIN event_types t ON t.id = e.event_type_id";

fn attendance_detail_from_row(row: &Row) -> rusqlite::Result<AttendanceDetail> {
    Ok(AttendanceDetail {
        attendance: Attendance {
            id: row.get(0)?,
            event_id: row.get(1)?,
            member_id: row.get(2)?,
            attended_seconds: row.get(3)?,
        },
        event: Event {
            id: row.get(4)?,
            name: row.get(5)?,
            event_type_id: row.get(6)?,
            start_dt: row.get(7)?,
            end_dt: row.get(8)?,
            duration_minutes: row.get(9)?,
        },
        event_type: EventType {
            id: row.get(10)?,
            name: row.get(11)?,
            default_start_hour: row.get(12)?,
            default_end_hour: row.get(13)?,
            minimum_required_ratio: row.get(14)?,
        },
    })
}

/// A member's attendances joined with event and event type
pub fn attendance_details_for_member(
    conn: &Connection,
    member_id: &str,
) -> Result<Vec<AttendanceDetail>> {
    let mut stmt = conn.prepare(&format!("{} WHERE a.member_id = ?1", ATTENDANCE_DETAIL_SELECT))?;
    let details = stmt
        .query_map([member_id], attendance_detail_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(details)
}

/// An event's attendances, leaving out rows owned by deleted members
pub fn attendance_details_for_event(
    conn: &Connection,
    event_id: &str,
) -> Result<Vec<AttendanceDetail>> {
    let mut stmt = conn.prepare(&format!(
        "{} JOIN members m ON m.id = a.member_id WHERE a.event_id = ?1 AND m.status != 'deleted'",
        ATTENDANCE_DETAIL_SELECT
    ))?;
    let details = stmt
        .query_map([event_id], attendance_detail_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(details)
}

pub fn set_attendance_seconds(conn: &Connection, attendance_id: &str, seconds: i64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE attendances SET attended_seconds = ?2 WHERE id = ?1",
        params![attendance_id, seconds],
    )?;
    if changed == 0 {
        return Err(RosterError::not_found("Attendance", attendance_id));
    }
    Ok(())
}

pub fn delete_attendance(conn: &Connection, attendance_id: &str) -> Result<()> {
    conn.execute("DELETE FROM attendances WHERE id = ?1", [attendance_id])?;
    Ok(())
}

pub fn reassign_attendance(conn: &Connection, attendance: &Attendance, member_id: &str) -> Result<()> {
    let result = conn.execute(
        "UPDATE attendances SET member_id = ?2 WHERE id = ?1",
        params![attendance.id, member_id],
    );

    match result {
        Ok(0) => Err(RosterError::not_found("Attendance", attendance.id.clone())),
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(RosterError::DuplicateAttendance {
            event_id: attendance.event_id.clone(),
            member_id: member_id.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// WARNINGS
// ============================================================================

pub fn insert_warning_type(conn: &Connection, warning_type: &WarningType) -> Result<()> {
    conn.execute(
        "INSERT INTO warning_types (id, name) VALUES (?1, ?2)",
        params![warning_type.id, warning_type.name],
    )?;
    Ok(())
}

fn warning_type_from_row(row: &Row) -> rusqlite::Result<WarningType> {
    Ok(WarningType {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

pub fn get_warning_type(conn: &Connection, id: &str) -> Result<WarningType> {
    conn.query_row(
        "SELECT id, name FROM warning_types WHERE id = ?1",
        [id],
        warning_type_from_row,
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("WarningType", id))
}

pub fn find_warning_type_by_name(conn: &Connection, name: &str) -> Result<WarningType> {
    conn.query_row(
        "SELECT id, name FROM warning_types WHERE name = ?1 COLLATE NOCASE",
        [name],
        warning_type_from_row,
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("WarningType", name))
}

const WARNING_COLUMNS: &str =
    "id, member_id, warning_type_id, message, notified, acknowledged, created_at";

fn warning_from_row(row: &Row) -> rusqlite::Result<Warning> {
    Ok(Warning {
        id: row.get(0)?,
        member_id: row.get(1)?,
        warning_type_id: row.get(2)?,
        message: row.get(3)?,
        notified: row.get(4)?,
        acknowledged: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Lookup by the (member, type, message) dedup key
pub fn find_warning(
    conn: &Connection,
    member_id: &str,
    warning_type_id: &str,
    message: &str,
) -> Result<Option<Warning>> {
    let key = crate::entities::warning::dedup_key(member_id, warning_type_id, message);
    let warning = conn
        .query_row(
            &format!("SELECT {} FROM warnings WHERE dedup_key = ?1", WARNING_COLUMNS),
            [key],
            warning_from_row,
        )
        .optional()?;
    Ok(warning)
}

pub fn insert_warning(conn: &Connection, warning: &Warning) -> Result<()> {
    let result = conn.execute(
        "INSERT INTO warnings (id, dedup_key, member_id, warning_type_id, message, notified, acknowledged, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            warning.id,
            warning.dedup_key(),
            warning.member_id,
            warning.warning_type_id,
            warning.message,
            warning.notified,
            warning.acknowledged,
            warning.created_at,
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(RosterError::invariant(format!(
            "warning '{}' already exists for member {}",
            warning.message, warning.member_id
        ))),
        Err(e) => Err(e.into()),
    }
}

pub fn delete_warning(conn: &Connection, warning_id: &str) -> Result<()> {
    conn.execute("DELETE FROM warnings WHERE id = ?1", [warning_id])?;
    Ok(())
}

pub fn get_warning(conn: &Connection, warning_id: &str) -> Result<Warning> {
    conn.query_row(
        &format!("SELECT {} FROM warnings WHERE id = ?1", WARNING_COLUMNS),
        [warning_id],
        warning_from_row,
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("Warning", warning_id))
}

/// notified = false AND acknowledged = false, oldest first.
/// Warnings of deleted or discharged members are never pending.
pub fn pending_warnings(conn: &Connection) -> Result<Vec<Warning>> {
    let mut stmt = conn.prepare(
        "SELECT w.id, w.member_id, w.warning_type_id, w.message, w.notified, w.acknowledged, w.created_at
         FROM warnings w
         JOIN members m ON m.id = w.member_id
         WHERE w.notified = 0 AND w.acknowledged = 0
           AND m.status != 'deleted' AND m.discharged = 0
         ORDER BY w.created_at",
    )?;
    let warnings = stmt
        .query_map([], warning_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(warnings)
}

pub fn all_warnings(conn: &Connection) -> Result<Vec<Warning>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM warnings ORDER BY created_at",
        WARNING_COLUMNS
    ))?;
    let warnings = stmt
        .query_map([], warning_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(warnings)
}

pub fn warnings_of_type(conn: &Connection, warning_type_id: &str) -> Result<Vec<Warning>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM warnings WHERE warning_type_id = ?1 ORDER BY created_at",
        WARNING_COLUMNS
    ))?;
    let warnings = stmt
        .query_map([warning_type_id], warning_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(warnings)
}

/// Returns the number of rows removed
pub fn delete_warnings_for_member(conn: &Connection, member_id: &str) -> Result<usize> {
    Ok(conn.execute("DELETE FROM warnings WHERE member_id = ?1", [member_id])?)
}

pub fn warnings_for_member(conn: &Connection, member_id: &str) -> Result<Vec<Warning>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM warnings WHERE member_id = ?1 ORDER BY created_at",
        WARNING_COLUMNS
    ))?;
    let warnings = stmt
        .query_map([member_id], warning_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(warnings)
}

pub fn mark_warning_notified(conn: &Connection, warning_id: &str) -> Result<()> {
    let changed = conn.execute("UPDATE warnings SET notified = 1 WHERE id = ?1", [warning_id])?;
    if changed == 0 {
        return Err(RosterError::not_found("Warning", warning_id));
    }
    Ok(())
}

pub fn mark_warning_acknowledged(conn: &Connection, warning_id: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE warnings SET acknowledged = 1 WHERE id = ?1",
        [warning_id],
    )?;
    if changed == 0 {
        return Err(RosterError::not_found("Warning", warning_id));
    }
    Ok(())
}

pub fn count_unacknowledged_warnings(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM warnings WHERE acknowledged = 0",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn count_warnings(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM warnings", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// CONTRIBUTIONS
// ============================================================================

pub fn insert_contribution_type(conn: &Connection, contribution_type: &ContributionType) -> Result<()> {
    conn.execute(
        "INSERT INTO contribution_types (id, name) VALUES (?1, ?2)",
        params![contribution_type.id, contribution_type.name],
    )?;
    Ok(())
}

pub fn get_contribution_type(conn: &Connection, id: &str) -> Result<ContributionType> {
    conn.query_row(
        "SELECT id, name FROM contribution_types WHERE id = ?1",
        [id],
        |row| {
            Ok(ContributionType {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| RosterError::not_found("ContributionType", id))
}

pub fn insert_contribution(conn: &Connection, contribution: &Contribution) -> Result<()> {
    conn.execute(
        "INSERT INTO contributions (id, member_id, contribution_type_id, start_date, end_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            contribution.id,
            contribution.member_id,
            contribution.contribution_type_id,
            contribution.start_date,
            contribution.end_date,
        ],
    )?;
    Ok(())
}

pub fn contributions_ending_on(conn: &Connection, date: NaiveDate) -> Result<Vec<Contribution>> {
    let mut stmt = conn.prepare(
        "SELECT id, member_id, contribution_type_id, start_date, end_date
         FROM contributions WHERE end_date = ?1",
    )?;
    let contributions = stmt
        .query_map([date], |row| {
            Ok(Contribution {
                id: row.get(0)?,
                member_id: row.get(1)?,
                contribution_type_id: row.get(2)?,
                start_date: row.get(3)?,
                end_date: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(contributions)
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// "Every change is an entry"
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditEntry {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl AuditEntry {
    pub fn new(
        action: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn insert_audit_entry(conn: &Connection, entry: &AuditEntry) -> Result<()> {
    let data_json = serde_json::to_string(&entry.data)?;

    conn.execute(
        "INSERT INTO audit_log (entry_id, timestamp, action, entity_type, entity_id, data, actor)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            entry.entry_id,
            entry.timestamp,
            entry.action,
            entry.entity_type,
            entry.entity_id,
            data_json,
            entry.actor,
        ],
    )?;

    Ok(())
}

pub fn audit_entries_for(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<AuditEntry>> {
    let mut stmt = conn.prepare(
        "SELECT entry_id, timestamp, action, entity_type, entity_id, data, actor
         FROM audit_log WHERE entity_type = ?1 AND entity_id = ?2 ORDER BY id",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, DateTime<Utc>>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut entries = Vec::with_capacity(rows.len());
    for (entry_id, timestamp, action, entity_type, entity_id, data, actor) in rows {
        entries.push(AuditEntry {
            entry_id,
            timestamp,
            action,
            entity_type,
            entity_id,
            data: serde_json::from_str(&data)?,
            actor,
        });
    }

    Ok(entries)
}

// ============================================================================
// NOTIFICATION OUTBOX
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OutboxMessage {
    pub sender: String,
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
    pub queued_at: DateTime<Utc>,
}

pub fn insert_outbox_message(conn: &Connection, message: &OutboxMessage) -> Result<()> {
    conn.execute(
        "INSERT INTO notification_outbox (sender, recipients, subject, body, queued_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            message.sender,
            message.recipients.join(", "),
            message.subject,
            message.body,
            message.queued_at,
        ],
    )?;
    Ok(())
}

pub fn outbox_messages(conn: &Connection) -> Result<Vec<OutboxMessage>> {
    let mut stmt = conn.prepare(
        "SELECT sender, recipients, subject, body, queued_at FROM notification_outbox ORDER BY id",
    )?;
    let messages = stmt
        .query_map([], |row| {
            let recipients: String = row.get(1)?;
            Ok(OutboxMessage {
                sender: row.get(0)?,
                recipients: recipients
                    .split(", ")
                    .filter(|r| !r.is_empty())
                    .map(|r| r.to_string())
                    .collect(),
                subject: row.get(2)?,
                body: row.get(3)?,
                queued_at: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(messages)
}
