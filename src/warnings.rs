// 🚩 Warning Reconciler - idempotent warning state + batch refreshes
//
// Warning state is a function of the latest classifier output:
//   existing + inactive  -> delete
//   missing  + active    -> create (notified = false, acknowledged = false)
//   otherwise            -> no-op
// Running any refresh twice over unchanged data mutates nothing.

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::adequacy::{
    not_enough_events_message, not_enough_trainings_message, period_adequacy, PeriodRequirement,
};
use crate::classifier::{
    mod_assessment_due, qualification_due, MOD_ASSESSMENT_OVERDUE, PROMOTION_DEADLINE_REACHED,
};
use crate::clock::{Clock, Period};
use crate::config::EngineConfig;
use crate::db::{self, AuditEntry};
use crate::deadlines::Deadlines;
use crate::entities::{Warning, WarningType};
use crate::error::{Result, RosterError};
use crate::roster;

const ACTOR: &str = "warning_engine";

/// Days ahead a contributor tag expiry is announced
pub const CONTRIBUTION_EXPIRY_NOTICE_DAYS: i64 = 14;

// ============================================================================
// RECONCILE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    Created,
    Removed,
    Unchanged,
}

/// Bring the (member, type, message) warning in line with `should_be_active`.
/// The warning row and its audit entry are written together or not at all.
pub fn reconcile_warning(
    conn: &Connection,
    member_id: &str,
    warning_type_id: &str,
    should_be_active: bool,
    message: &str,
) -> Result<ReconcileOutcome> {
    let tx = conn.unchecked_transaction()?;
    let existing = db::find_warning(&tx, member_id, warning_type_id, message)?;

    let outcome = match (existing, should_be_active) {
        (Some(warning), false) => {
            db::delete_warning(&tx, &warning.id)?;
            db::insert_audit_entry(
                &tx,
                &AuditEntry::new(
                    "warning_removed",
                    "member",
                    member_id,
                    serde_json::json!({
                        "warning_id": warning.id,
                        "warning_type_id": warning_type_id,
                        "message": message,
                        "was_notified": warning.notified,
                    }),
                    ACTOR,
                ),
            )?;
            debug!(member_id, message, "warning cleared");
            ReconcileOutcome::Removed
        }
        (None, true) => {
            let warning = Warning::new(member_id, warning_type_id, message);
            db::insert_warning(&tx, &warning)?;
            db::insert_audit_entry(
                &tx,
                &AuditEntry::new(
                    "warning_created",
                    "member",
                    member_id,
                    serde_json::json!({
                        "warning_id": warning.id,
                        "warning_type_id": warning_type_id,
                        "message": message,
                    }),
                    ACTOR,
                ),
            )?;
            debug!(member_id, message, "warning raised");
            ReconcileOutcome::Created
        }
        _ => ReconcileOutcome::Unchanged,
    };

    tx.commit()?;
    Ok(outcome)
}

// ============================================================================
// REFRESH SUMMARY
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefreshSummary {
    pub sweep: String,
    pub examined: usize,
    pub created: usize,
    pub removed: usize,
    pub failed: usize,
    /// "<member id>: <error>" per failed member
    pub failures: Vec<String>,
}

impl RefreshSummary {
    fn new(sweep: &str) -> Self {
        RefreshSummary {
            sweep: sweep.to_string(),
            ..RefreshSummary::default()
        }
    }

    fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Created => self.created += 1,
            ReconcileOutcome::Removed => self.removed += 1,
            ReconcileOutcome::Unchanged => {}
        }
    }

    fn fail(&mut self, subject_id: &str, error: &RosterError) {
        self.failed += 1;
        self.failures.push(format!("{}: {}", subject_id, error));
    }

    /// Warnings created plus warnings removed
    pub fn net_mutations(&self) -> usize {
        self.created + self.removed
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} examined, {} created, {} removed, {} failed",
            self.sweep, self.examined, self.created, self.removed, self.failed
        )
    }
}

/// A warning together with the names needed to display it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningView {
    pub warning: Warning,
    pub member_name: String,
    pub warning_type: String,
}

// ============================================================================
// WARNING ENGINE
// ============================================================================

pub struct WarningEngine {
    config: EngineConfig,
    clock: Box<dyn Clock>,
}

impl WarningEngine {
    pub fn new(config: EngineConfig, clock: impl Clock + 'static) -> Self {
        WarningEngine {
            config,
            clock: Box::new(clock),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Current date in the configured timezone
    pub fn today(&self) -> NaiveDate {
        self.clock.today(self.config.timezone)
    }

    fn warning_type(&self, conn: &Connection, name: &str) -> Result<WarningType> {
        db::find_warning_type_by_name(conn, name)
    }

    /// Run `step` for one member; failures are logged and counted, not propagated
    fn isolate<F>(&self, summary: &mut RefreshSummary, member_id: &str, step: F)
    where
        F: FnOnce() -> Result<Vec<ReconcileOutcome>>,
    {
        summary.examined += 1;
        match step() {
            Ok(outcomes) => outcomes.into_iter().for_each(|o| summary.record(o)),
            Err(e) => {
                warn!(member_id, error = %e, "{} failed for member", summary.sweep);
                summary.fail(member_id, &e);
            }
        }
    }

    /// Remove `messages` of this type from members the sweep no longer covers
    /// (promoted, discharged, merged away)
    fn clear_uncovered(
        &self,
        conn: &Connection,
        summary: &mut RefreshSummary,
        warning_type_id: &str,
        messages: &[&str],
        covered: &HashSet<&str>,
    ) -> Result<()> {
        for warning in db::warnings_of_type(conn, warning_type_id)? {
            if covered.contains(warning.member_id.as_str())
                || !messages.contains(&warning.message.as_str())
            {
                continue;
            }
            self.isolate(summary, &warning.member_id, || {
                let outcome =
                    reconcile_warning(conn, &warning.member_id, warning_type_id, false, &warning.message)?;
                Ok(vec![outcome])
            });
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Batch refreshes
    // ------------------------------------------------------------------------

    /// Recruits past their initial-assessment deadline without the assessment
    pub fn add_and_update_mod_assessment_due(&self, conn: &Connection) -> Result<RefreshSummary> {
        let warning_type = self.warning_type(conn, &self.config.warning_types.mod_assessment_due)?;
        let today = self.today();
        let mut summary = RefreshSummary::new("mod_assessment_due");
        let recruits = roster::recruits(conn, &self.config)?;

        for member in &recruits {
            self.isolate(&mut summary, &member.id, || {
                let absences = db::absences_for_member(conn, &member.id)?;
                let deadlines = Deadlines::for_member(member, &absences);
                let check = mod_assessment_due(member, &deadlines, today);
                let outcome = reconcile_warning(
                    conn,
                    &member.id,
                    &warning_type.id,
                    check.due,
                    MOD_ASSESSMENT_OVERDUE,
                )?;
                Ok(vec![outcome])
            });
        }

        let covered: HashSet<&str> = recruits.iter().map(|m| m.id.as_str()).collect();
        self.clear_uncovered(conn, &mut summary, &warning_type.id, &[MOD_ASSESSMENT_OVERDUE], &covered)?;

        info!("{}", summary.summary());
        Ok(summary)
    }

    /// Recruits past their qualification deadline
    pub fn add_and_update_grunt_qualification_due(&self, conn: &Connection) -> Result<RefreshSummary> {
        let warning_type = self.warning_type(conn, &self.config.warning_types.qualification_due)?;
        let today = self.today();
        let mut summary = RefreshSummary::new("qualification_due");
        let recruits = roster::recruits(conn, &self.config)?;

        for member in &recruits {
            self.isolate(&mut summary, &member.id, || {
                let absences = db::absences_for_member(conn, &member.id)?;
                let deadlines = Deadlines::for_member(member, &absences);
                let check = qualification_due(&deadlines, today);
                let outcome = reconcile_warning(
                    conn,
                    &member.id,
                    &warning_type.id,
                    check.due,
                    PROMOTION_DEADLINE_REACHED,
                )?;
                Ok(vec![outcome])
            });
        }

        let covered: HashSet<&str> = recruits.iter().map(|m| m.id.as_str()).collect();
        self.clear_uncovered(
            conn,
            &mut summary,
            &warning_type.id,
            &[PROMOTION_DEADLINE_REACHED],
            &covered,
        )?;

        info!("{}", summary.summary());
        Ok(summary)
    }

    /// Low attendance over one calendar month, for every active member
    pub fn add_and_update_low_attendances_for_month(
        &self,
        conn: &Connection,
        year: i32,
        month: u32,
    ) -> Result<RefreshSummary> {
        let period = Period::month(self.config.timezone, year, month)?;
        self.add_and_update_low_attendances_for_period(conn, &period)
    }

    /// Month before the clock's current month (January wraps to December)
    pub fn add_and_update_low_attendance_for_previous_month(
        &self,
        conn: &Connection,
    ) -> Result<RefreshSummary> {
        let period = Period::previous_month(self.config.timezone, self.today())?;
        self.add_and_update_low_attendances_for_period(conn, &period)
    }

    fn add_and_update_low_attendances_for_period(
        &self,
        conn: &Connection,
        period: &Period,
    ) -> Result<RefreshSummary> {
        let warning_type = self.warning_type(conn, &self.config.warning_types.low_attendance)?;
        let events = db::events_in_period(conn, period)?;
        let requirement = PeriodRequirement::default();
        let mut summary = RefreshSummary::new("low_attendance");

        // Every shortfall message this period can raise, so a recovered
        // member has the earlier warning removed
        let shortfalls = [
            not_enough_events_message(period),
            not_enough_trainings_message(period),
        ];

        let members = roster::active_members(conn, &self.config, true)?;

        for member in &members {
            self.isolate(&mut summary, &member.id, || {
                let absences = db::absences_for_member(conn, &member.id)?;
                let attendances = db::attendance_details_for_member(conn, &member.id)?;
                let result = period_adequacy(
                    member,
                    &absences,
                    &attendances,
                    &events,
                    period,
                    &requirement,
                    &self.config.training_event_type,
                );

                let mut outcomes = Vec::with_capacity(shortfalls.len());
                for message in &shortfalls {
                    let active = !result.adequate && &result.reason == message;
                    outcomes.push(reconcile_warning(
                        conn,
                        &member.id,
                        &warning_type.id,
                        active,
                        message,
                    )?);
                }
                Ok(outcomes)
            });
        }

        let covered: HashSet<&str> = members.iter().map(|m| m.id.as_str()).collect();
        let messages: Vec<&str> = shortfalls.iter().map(String::as_str).collect();
        self.clear_uncovered(conn, &mut summary, &warning_type.id, &messages, &covered)?;

        info!(
            period = %period.between_label(),
            events = events.len(),
            "{}",
            summary.summary()
        );
        Ok(summary)
    }

    /// Contributor tags running out exactly CONTRIBUTION_EXPIRY_NOTICE_DAYS from today
    pub fn add_and_update_contribution_about_to_expire(
        &self,
        conn: &Connection,
    ) -> Result<RefreshSummary> {
        let warning_type =
            self.warning_type(conn, &self.config.warning_types.contribution_expiring)?;
        let expiry = self.today() + Duration::days(CONTRIBUTION_EXPIRY_NOTICE_DAYS);
        let mut summary = RefreshSummary::new("contribution_expiring");

        for contribution in db::contributions_ending_on(conn, expiry)? {
            summary.examined += 1;
            let step = || -> Result<ReconcileOutcome> {
                let member = db::get_member(conn, &contribution.member_id)?;
                let contribution_type =
                    db::get_contribution_type(conn, &contribution.contribution_type_id)?;
                let message = format!(
                    "{}'s {} contributor tag will run out at {}. Send them the stationary PM.",
                    member.name,
                    contribution_type.name,
                    contribution.end_date.format("%Y-%m-%d")
                );
                reconcile_warning(conn, &member.id, &warning_type.id, true, &message)
            };

            match step() {
                Ok(outcome) => summary.record(outcome),
                Err(e) => {
                    warn!(contribution_id = %contribution.id, error = %e, "contribution expiry check failed");
                    summary.fail(&contribution.member_id, &e);
                }
            }
        }

        info!("{}", summary.summary());
        Ok(summary)
    }

    /// Every refresh, in order. One sweep failing (e.g. a missing warning
    /// type) does not stop the others.
    pub fn refresh_all(&self, conn: &Connection) -> Vec<(&'static str, Result<RefreshSummary>)> {
        vec![
            ("mod_assessment_due", self.add_and_update_mod_assessment_due(conn)),
            ("qualification_due", self.add_and_update_grunt_qualification_due(conn)),
            (
                "low_attendance",
                self.add_and_update_low_attendance_for_previous_month(conn),
            ),
            (
                "contribution_expiring",
                self.add_and_update_contribution_about_to_expire(conn),
            ),
        ]
    }
}

// ============================================================================
// MANAGEMENT
// ============================================================================

pub fn acknowledge_warning(conn: &Connection, warning_id: &str, actor: &str) -> Result<()> {
    let warning = db::get_warning(conn, warning_id)?;
    db::mark_warning_acknowledged(conn, warning_id)?;
    db::insert_audit_entry(
        conn,
        &AuditEntry::new(
            "warning_acknowledged",
            "member",
            &warning.member_id,
            serde_json::json!({ "warning_id": warning_id, "message": warning.message }),
            actor,
        ),
    )?;
    Ok(())
}

/// All warnings, sorted by member name
pub fn warnings_by_member_name(conn: &Connection) -> Result<Vec<WarningView>> {
    let mut views = Vec::new();
    for warning in db::all_warnings(conn)? {
        let member = db::get_member(conn, &warning.member_id)?;
        let warning_type = db::get_warning_type(conn, &warning.warning_type_id)?;
        views.push(WarningView {
            warning,
            member_name: member.name,
            warning_type: warning_type.name,
        });
    }
    views.sort_by(|a, b| a.member_name.to_lowercase().cmp(&b.member_name.to_lowercase()));
    Ok(views)
}

pub fn unacknowledged_warning_count(conn: &Connection) -> Result<i64> {
    db::count_unacknowledged_warnings(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::entities::Contribution;
    use crate::fixtures::{d, Fixture};

    fn engine(fx: &Fixture, clock: FixedClock) -> WarningEngine {
        WarningEngine::new(fx.config.clone(), clock)
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let fx = Fixture::new();
        let member = fx.recruit("Alice", d(2024, 1, 1));
        let wt = fx.warning_type("Low Attendance");

        let first = reconcile_warning(&fx.conn, &member.id, &wt.id, true, "msg").unwrap();
        let second = reconcile_warning(&fx.conn, &member.id, &wt.id, true, "msg").unwrap();
        assert_eq!(first, ReconcileOutcome::Created);
        assert_eq!(second, ReconcileOutcome::Unchanged);
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 1);

        let removed = reconcile_warning(&fx.conn, &member.id, &wt.id, false, "msg").unwrap();
        let again = reconcile_warning(&fx.conn, &member.id, &wt.id, false, "msg").unwrap();
        assert_eq!(removed, ReconcileOutcome::Removed);
        assert_eq!(again, ReconcileOutcome::Unchanged);
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 0);
    }

    #[test]
    fn test_reconcile_rolls_back_without_audit() {
        let fx = Fixture::new();
        let member = fx.recruit("Alice", d(2024, 1, 1));
        let wt = fx.warning_type("Low Attendance");
        reconcile_warning(&fx.conn, &member.id, &wt.id, true, "msg").unwrap();

        fx.conn.execute("DROP TABLE audit_log", []).unwrap();
        assert!(reconcile_warning(&fx.conn, &member.id, &wt.id, false, "msg").is_err());
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 1);
    }

    #[test]
    fn test_reconcile_keeps_distinct_messages_apart() {
        let fx = Fixture::new();
        let member = fx.recruit("Alice", d(2024, 1, 1));
        let wt = fx.warning_type("Low Attendance");

        reconcile_warning(&fx.conn, &member.id, &wt.id, true, "January").unwrap();
        reconcile_warning(&fx.conn, &member.id, &wt.id, true, "February").unwrap();
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 2);

        // Clearing one message leaves the other alone
        reconcile_warning(&fx.conn, &member.id, &wt.id, false, "January").unwrap();
        let remaining = db::warnings_for_member(&fx.conn, &member.id).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message, "February");
    }

    #[test]
    fn test_mod_assessment_sweep_and_rerun() {
        let fx = Fixture::new();
        let overdue = fx.recruit("Alice", d(2024, 1, 1));
        fx.recruit("Bob", d(2024, 1, 18));
        fx.private("Carol", d(2023, 1, 1));

        let engine = engine(&fx, FixedClock::on(2024, 1, 20));
        let summary = engine.add_and_update_mod_assessment_due(&fx.conn).unwrap();
        assert_eq!(summary.examined, 2);
        assert_eq!(summary.created, 1);

        let warnings = db::warnings_for_member(&fx.conn, &overdue.id).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, MOD_ASSESSMENT_OVERDUE);
        assert!(!warnings[0].notified);
        assert!(!warnings[0].acknowledged);

        let rerun = engine.add_and_update_mod_assessment_due(&fx.conn).unwrap();
        assert_eq!(rerun.net_mutations(), 0);
    }

    #[test]
    fn test_warning_cleared_when_condition_clears() {
        let fx = Fixture::new();
        let mut member = fx.recruit("Alice", d(2024, 1, 1));
        let engine = engine(&fx, FixedClock::on(2024, 1, 20));

        engine.add_and_update_mod_assessment_due(&fx.conn).unwrap();
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 1);

        member.mods_assessed = true;
        db::update_member(&fx.conn, &member).unwrap();

        let summary = engine.add_and_update_mod_assessment_due(&fx.conn).unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 0);
    }

    #[test]
    fn test_promotion_clears_recruit_warnings() {
        let fx = Fixture::new();
        let mut member = fx.recruit("Alice", d(2024, 1, 1));
        let engine = engine(&fx, FixedClock::on(2024, 3, 1));

        engine.add_and_update_mod_assessment_due(&fx.conn).unwrap();
        engine.add_and_update_grunt_qualification_due(&fx.conn).unwrap();
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 2);

        member.rank_id = fx.private_rank.id.clone();
        member.mods_assessed = true;
        member.bqf_assessed = true;
        db::update_member(&fx.conn, &member).unwrap();

        let mods = engine.add_and_update_mod_assessment_due(&fx.conn).unwrap();
        let qual = engine.add_and_update_grunt_qualification_due(&fx.conn).unwrap();
        assert_eq!(mods.removed, 1);
        assert_eq!(qual.removed, 1);
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 0);
        assert_eq!(unacknowledged_warning_count(&fx.conn).unwrap(), 0);
    }

    #[test]
    fn test_qualification_rerun_is_idempotent() {
        let fx = Fixture::new();
        fx.recruit("Alice", d(2024, 1, 1));
        fx.recruit("Bob", d(2024, 2, 20));
        let engine = engine(&fx, FixedClock::on(2024, 3, 1));

        let first = engine.add_and_update_grunt_qualification_due(&fx.conn).unwrap();
        assert_eq!(first.created, 1);

        let rerun = engine.add_and_update_grunt_qualification_due(&fx.conn).unwrap();
        assert_eq!(rerun.net_mutations(), 0);
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 1);
    }

    #[test]
    fn test_discharge_clears_low_attendance() {
        let fx = Fixture::new();
        let mut member = fx.private("Slacker", d(2023, 1, 1));
        fx.event(&fx.coop, d(2024, 3, 5));
        let engine = engine(&fx, FixedClock::on(2024, 4, 2));

        engine.add_and_update_low_attendances_for_month(&fx.conn, 2024, 3).unwrap();
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 1);

        member.discharge(d(2024, 4, 1));
        db::update_member(&fx.conn, &member).unwrap();

        let summary = engine.add_and_update_low_attendances_for_month(&fx.conn, 2024, 3).unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 0);
    }

    #[test]
    fn test_uncovered_clear_leaves_other_messages() {
        let fx = Fixture::new();
        let vet = fx.private("Vet", d(2023, 1, 1));
        let wt = fx.warning_type("Mod Assessment Due");
        reconcile_warning(&fx.conn, &vet.id, &wt.id, true, "Raised by hand.").unwrap();

        let engine = engine(&fx, FixedClock::on(2024, 3, 1));
        let summary = engine.add_and_update_mod_assessment_due(&fx.conn).unwrap();
        assert_eq!(summary.removed, 0);
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 1);
    }

    #[test]
    fn test_qualification_sweep_respects_absence() {
        let fx = Fixture::new();
        let away = fx.recruit("Away", d(2024, 1, 1));
        fx.absence(&away, d(2024, 2, 1), d(2024, 2, 10));
        let present = fx.recruit("Present", d(2024, 1, 1));

        // Day 60: past 56, not past 65
        let engine = engine(&fx, FixedClock::on(2024, 3, 1));
        let summary = engine.add_and_update_grunt_qualification_due(&fx.conn).unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(db::warnings_for_member(&fx.conn, &present.id).unwrap().len(), 1);
        assert!(db::warnings_for_member(&fx.conn, &away.id).unwrap().is_empty());
    }

    #[test]
    fn test_low_attendance_month() {
        let fx = Fixture::new();
        let slacker = fx.private("Slacker", d(2023, 1, 1));
        let regular = fx.private("Regular", d(2023, 1, 1));

        let op = fx.event(&fx.coop, d(2024, 3, 5));
        fx.attend(&op, &regular, 3600);
        fx.attend(&op, &slacker, 600);

        let engine = engine(&fx, FixedClock::on(2024, 4, 2));
        let summary = engine.add_and_update_low_attendances_for_month(&fx.conn, 2024, 3).unwrap();
        assert_eq!(summary.examined, 2);
        assert_eq!(summary.created, 1);

        let warnings = db::warnings_for_member(&fx.conn, &slacker.id).unwrap();
        assert_eq!(
            warnings[0].message,
            "Did not attend enough events between 2024-03-01 and 2024-03-31."
        );

        // Previous-month sweep on 2024-04-02 targets March too: nothing changes
        let rerun = engine.add_and_update_low_attendance_for_previous_month(&fx.conn).unwrap();
        assert_eq!(rerun.net_mutations(), 0);
    }

    #[test]
    fn test_low_attendance_cleared_after_correction() {
        let fx = Fixture::new();
        let member = fx.private("Member", d(2023, 1, 1));
        let op = fx.event(&fx.coop, d(2024, 3, 5));
        let engine = engine(&fx, FixedClock::on(2024, 4, 2));

        engine.add_and_update_low_attendances_for_month(&fx.conn, 2024, 3).unwrap();
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 1);

        // Late-arriving attendance data
        fx.attend(&op, &member, 3600);
        let summary = engine.add_and_update_low_attendances_for_month(&fx.conn, 2024, 3).unwrap();
        assert_eq!(summary.removed, 1);
        assert_eq!(db::count_warnings(&fx.conn).unwrap(), 0);
    }

    #[test]
    fn test_missing_warning_type_is_fatal_to_batch() {
        let fx = Fixture::new();
        fx.recruit("Alice", d(2024, 1, 1));
        let mut config = fx.config.clone();
        config.warning_types.mod_assessment_due = "Nope".to_string();

        let engine = WarningEngine::new(config, FixedClock::on(2024, 1, 20));
        let err = engine.add_and_update_mod_assessment_due(&fx.conn).unwrap_err();
        assert!(err.is_not_found());

        // Other sweeps still run
        let results = engine.refresh_all(&fx.conn);
        assert!(results[0].1.is_err());
        assert!(results[1].1.is_ok());
    }

    #[test]
    fn test_member_failure_does_not_abort_batch() {
        let fx = Fixture::new();
        fx.recruit("Alice", d(2024, 1, 1));
        fx.recruit("Bob", d(2024, 1, 1));

        // Unreadable absence row: loading this member's absences fails
        let broken = fx.recruit("Broken", d(2024, 1, 1));
        fx.conn
            .execute(
                "INSERT INTO absences (id, member_id, absence_type_id, start_date, end_date, concluded, status)
                 VALUES ('x', ?1, 'loa', '2024-02-01', '2024-02-05', 0, 'bogus')",
                [&broken.id],
            )
            .unwrap();

        let engine = engine(&fx, FixedClock::on(2024, 1, 20));
        let summary = engine.add_and_update_mod_assessment_due(&fx.conn).unwrap();
        assert_eq!(summary.examined, 3);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.created, 2);
        assert!(summary.failures[0].starts_with(&broken.id));
    }

    #[test]
    fn test_contribution_expiry_warning() {
        let fx = Fixture::new();
        let member = fx.private("Donor", d(2023, 1, 1));
        let contribution =
            Contribution::new(&member.id, &fx.tag.id, d(2024, 1, 1), d(2024, 5, 15)).unwrap();
        db::insert_contribution(&fx.conn, &contribution).unwrap();

        let engine = engine(&fx, FixedClock::on(2024, 5, 1));
        let summary = engine.add_and_update_contribution_about_to_expire(&fx.conn).unwrap();
        assert_eq!(summary.created, 1);

        let warnings = db::warnings_for_member(&fx.conn, &member.id).unwrap();
        assert_eq!(
            warnings[0].message,
            "Donor's Donator contributor tag will run out at 2024-05-15. Send them the stationary PM."
        );

        let other_day = WarningEngine::new(fx.config.clone(), FixedClock::on(2024, 5, 2));
        assert_eq!(
            other_day
                .add_and_update_contribution_about_to_expire(&fx.conn)
                .unwrap()
                .examined,
            0
        );
    }

    #[test]
    fn test_acknowledge_and_listing() {
        let fx = Fixture::new();
        let zed = fx.private("Zed", d(2023, 1, 1));
        let amy = fx.private("amy", d(2023, 1, 1));
        let wt = fx.warning_type("Low Attendance");
        reconcile_warning(&fx.conn, &zed.id, &wt.id, true, "z").unwrap();
        reconcile_warning(&fx.conn, &amy.id, &wt.id, true, "a").unwrap();

        let views = warnings_by_member_name(&fx.conn).unwrap();
        assert_eq!(views[0].member_name, "amy");
        assert_eq!(views[1].member_name, "Zed");
        assert_eq!(views[0].warning_type, "Low Attendance");

        assert_eq!(unacknowledged_warning_count(&fx.conn).unwrap(), 2);
        acknowledge_warning(&fx.conn, &views[0].warning.id, "staff").unwrap();
        assert_eq!(unacknowledged_warning_count(&fx.conn).unwrap(), 1);

        let err = acknowledge_warning(&fx.conn, "missing", "staff").unwrap_err();
        assert!(err.is_not_found());
    }
}
