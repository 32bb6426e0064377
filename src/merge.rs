// 🔀 Member Merge Resolver
//
// Absorbs a duplicate (source) member record into a surviving (target) one.
// Planning is a pure fold over both records; applying the plan is the only
// step that touches the store, inside a single transaction.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::config::EngineConfig;
use crate::db::{self, AuditEntry};
use crate::entities::{Absence, Attendance, Member, Rank};
use crate::error::{Result, RosterError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferOp {
    /// Move a source absence onto the target
    ReassignAbsence { absence_id: String },

    /// Move a source attendance onto the target (no clash on the event)
    ReassignAttendance { attendance: Attendance },

    /// Both sides attended the same event: the target row keeps the larger
    /// duration and the source row is discarded
    CollapseAttendance {
        keep_id: String,
        seconds: i64,
        discard_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergePlan {
    pub merged: Member,
    pub retired: Member,
    pub transfers: Vec<TransferOp>,
}

impl MergePlan {
    pub fn collapsed(&self) -> usize {
        self.transfers
            .iter()
            .filter(|t| matches!(t, TransferOp::CollapseAttendance { .. }))
            .count()
    }
}

/// One side of a merge with everything it owns
#[derive(Debug, Clone, Copy)]
pub struct MergeSide<'a> {
    pub member: &'a Member,
    pub rank: &'a Rank,
    pub attendances: &'a [Attendance],
    pub absences: &'a [Absence],
}

fn fill_if_empty(current: &Option<String>, other: &Option<String>) -> Option<String> {
    match current {
        Some(value) if !value.is_empty() => current.clone(),
        _ => other.clone().or_else(|| current.clone()),
    }
}

/// Fold `source` into `target`
pub fn plan_merge(
    config: &EngineConfig,
    target: &MergeSide,
    source: &MergeSide,
) -> Result<MergePlan> {
    if target.member.id == source.member.id {
        return Err(RosterError::invariant(format!(
            "cannot merge member {} into itself",
            target.member.id
        )));
    }
    for side in [target, source] {
        if side.member.is_deleted() {
            return Err(RosterError::invariant(format!(
                "member {} is deleted and cannot take part in a merge",
                side.member.id
            )));
        }
    }

    let marker = &config.entry_level_marker;
    let mut merged = target.member.clone();

    if target.rank.is_entry_level(marker) && !source.rank.is_entry_level(marker) {
        merged.rank_id = source.member.rank_id.clone();
    }
    merged.email = fill_if_empty(&target.member.email, &source.member.email);
    merged.alias = fill_if_empty(&target.member.alias, &source.member.alias);
    merged.join_date = target.member.join_date.min(source.member.join_date);
    merged.mods_assessed |= source.member.mods_assessed;
    merged.bqf_assessed |= source.member.bqf_assessed;

    let mut transfers: Vec<TransferOp> = source
        .absences
        .iter()
        .map(|a| TransferOp::ReassignAbsence {
            absence_id: a.id.clone(),
        })
        .collect();

    let target_by_event: HashMap<&str, &Attendance> = target
        .attendances
        .iter()
        .map(|a| (a.event_id.as_str(), a))
        .collect();

    for attendance in source.attendances {
        match target_by_event.get(attendance.event_id.as_str()) {
            Some(existing) => transfers.push(TransferOp::CollapseAttendance {
                keep_id: existing.id.clone(),
                seconds: existing.attended_seconds.max(attendance.attended_seconds),
                discard_id: attendance.id.clone(),
            }),
            None => transfers.push(TransferOp::ReassignAttendance {
                attendance: attendance.clone(),
            }),
        }
    }

    let mut retired = source.member.clone();
    retired.soft_delete();

    Ok(MergePlan {
        merged,
        retired,
        transfers,
    })
}

/// Apply a plan atomically
pub fn apply_merge(conn: &Connection, plan: &MergePlan) -> Result<()> {
    let tx = conn.unchecked_transaction()?;

    db::update_member(&tx, &plan.merged)?;

    for transfer in &plan.transfers {
        match transfer {
            TransferOp::ReassignAbsence { absence_id } => {
                db::reassign_absence(&tx, absence_id, &plan.merged.id)?;
            }
            TransferOp::ReassignAttendance { attendance } => {
                db::reassign_attendance(&tx, attendance, &plan.merged.id)?;
            }
            TransferOp::CollapseAttendance {
                keep_id,
                seconds,
                discard_id,
            } => {
                db::set_attendance_seconds(&tx, keep_id, *seconds)?;
                db::delete_attendance(&tx, discard_id)?;
            }
        }
    }

    db::update_member(&tx, &plan.retired)?;

    // The retired record is out of every sweep; its warnings would never clear
    let warnings_dropped = db::delete_warnings_for_member(&tx, &plan.retired.id)?;

    db::insert_audit_entry(
        &tx,
        &AuditEntry::new(
            "member_merged",
            "member",
            &plan.merged.id,
            serde_json::json!({
                "source_id": plan.retired.id,
                "transfers": plan.transfers.len(),
                "collapsed": plan.collapsed(),
                "warnings_dropped": warnings_dropped,
            }),
            "merge",
        ),
    )?;

    tx.commit()?;
    Ok(())
}

/// Load both members, plan and apply. Returns the applied plan.
pub fn merge(
    conn: &Connection,
    config: &EngineConfig,
    target_id: &str,
    source_id: &str,
) -> Result<MergePlan> {
    let target = db::get_member(conn, target_id)?;
    let source = db::get_member(conn, source_id)?;
    let target_rank = db::get_rank(conn, &target.rank_id)?;
    let source_rank = db::get_rank(conn, &source.rank_id)?;

    let target_attendances = db::attendances_for_member(conn, &target.id)?;
    let source_attendances = db::attendances_for_member(conn, &source.id)?;
    let source_absences = db::absences_for_member(conn, &source.id)?;

    let plan = plan_merge(
        config,
        &MergeSide {
            member: &target,
            rank: &target_rank,
            attendances: &target_attendances,
            absences: &[],
        },
        &MergeSide {
            member: &source,
            rank: &source_rank,
            attendances: &source_attendances,
            absences: &source_absences,
        },
    )?;

    apply_merge(conn, &plan)?;

    info!(
        target = %plan.merged.name,
        source = %plan.retired.name,
        transfers = plan.transfers.len(),
        collapsed = plan.collapsed(),
        "members merged"
    );
    Ok(plan)
}
