// 📈 Period report
//
// Per-event statistics, weekly turnout, the monthly group/member attendance
// grid and its per-group CSV export.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use tracing::warn;

use crate::adequacy::{absence_covering, period_adequacy, PeriodAdequacy, PeriodRequirement};
use crate::clock::Period;
use crate::config::EngineConfig;
use crate::db::{self, MemberFilter};
use crate::entities::{Absence, AttendanceDetail, Event, Member, MemberGroup, Rank};
use crate::error::Result;

pub const MARK_ADEQUATE: &str = "X";
pub const MARK_INADEQUATE: &str = "?";
pub const MARK_MISSING: &str = " ";

// ============================================================================
// EVENT STATS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStats {
    pub event_id: String,
    pub duration_minutes: i64,
    /// Mean attendance ratio over everyone recorded (0.0 when nobody was)
    pub average_attendance: f64,
    pub player_count: usize,
}

pub fn stats_for(event: &Event, attendances: &[AttendanceDetail]) -> EventStats {
    let average_attendance = if attendances.is_empty() {
        0.0
    } else {
        attendances.iter().map(|a| a.ratio()).sum::<f64>() / attendances.len() as f64
    };

    EventStats {
        event_id: event.id.clone(),
        duration_minutes: event.duration_minutes,
        average_attendance,
        player_count: attendances.len(),
    }
}

pub fn event_stats(conn: &Connection, event_id: &str) -> Result<EventStats> {
    let event = db::get_event(conn, event_id)?;
    let attendances = db::attendance_details_for_event(conn, &event.id)?;
    Ok(stats_for(&event, &attendances))
}

// ============================================================================
// WEEKLY SUMMARY
// ============================================================================

/// Turnout over one Sunday-to-Sunday week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekSummary {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    /// Largest head count at a single event
    pub week_max: usize,
    /// Mean head count per event (0.0 for a week without events)
    pub week_avg: f64,
}

/// Weekly buckets from the Sunday on or before the first event through the
/// week holding the last one. Deleted members are not counted.
pub fn weekly_summary(conn: &Connection, config: &EngineConfig) -> Result<Vec<WeekSummary>> {
    let events = db::all_events(conn)?;
    let local = |dt: DateTime<Utc>| dt.with_timezone(&config.timezone).date_naive();

    let (Some(first), Some(last)) = (events.first(), events.last()) else {
        return Ok(Vec::new());
    };
    let first_day = local(first.start_dt);
    let last_day = local(last.start_dt);

    // (start day, end day, head count)
    let mut counts = Vec::with_capacity(events.len());
    for event in &events {
        let head_count = db::attendance_details_for_event(conn, &event.id)?.len();
        counts.push((local(event.start_dt), local(event.end_dt), head_count));
    }

    let mut weeks = Vec::new();
    let mut week_start =
        first_day - Duration::days(i64::from(first_day.weekday().num_days_from_sunday()));

    while week_start <= last_day {
        let week_end = week_start + Duration::days(7);
        let in_week: Vec<usize> = counts
            .iter()
            .filter(|(start, end, _)| *start >= week_start && *end < week_end)
            .map(|(_, _, count)| *count)
            .collect();

        let week_avg = if in_week.is_empty() {
            0.0
        } else {
            in_week.iter().sum::<usize>() as f64 / in_week.len() as f64
        };

        weeks.push(WeekSummary {
            week_start,
            week_end,
            week_max: in_week.iter().copied().max().unwrap_or(0),
            week_avg,
        });
        week_start = week_end;
    }

    Ok(weeks)
}

// ============================================================================
// PERIOD REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEvent {
    pub event_id: String,
    pub name: String,
    pub start_date: NaiveDate,
    pub event_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRow {
    pub member_id: String,
    pub name: String,
    pub adequacy: PeriodAdequacy,
    /// One marker per report event, in event order
    pub markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSection {
    pub group: String,
    pub members: Vec<MemberRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodReport {
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub events: Vec<ReportEvent>,
    pub groups: Vec<GroupSection>,
}

impl PeriodReport {
    pub fn member_count(&self) -> usize {
        self.groups.iter().map(|g| g.members.len()).sum()
    }
}

/// Marker for one member at one event: presence, optionally prefixed by
/// "- " (not yet a member, or unassessed recruit) or "LOA " (on leave)
fn marker_for(
    member: &Member,
    rank: &Rank,
    config: &EngineConfig,
    absences: &[Absence],
    attendance: Option<&AttendanceDetail>,
    event_date: NaiveDate,
) -> String {
    let presence = match attendance {
        Some(a) if a.is_adequate() => MARK_ADEQUATE,
        Some(_) => MARK_INADEQUATE,
        None => MARK_MISSING,
    };

    let unassessed_recruit =
        rank.is_entry_level(&config.entry_level_marker) && !member.mods_assessed;

    if unassessed_recruit || member.join_date > event_date {
        format!("- {}", presence)
    } else if absence_covering(absences, event_date).is_some() {
        format!("LOA {}", presence)
    } else {
        presence.to_string()
    }
}

pub fn build_period_report(
    conn: &Connection,
    config: &EngineConfig,
    period: &Period,
) -> Result<PeriodReport> {
    let events = db::events_in_period(conn, period)?;
    let ranks: HashMap<String, Rank> = db::all_ranks(conn)?
        .into_iter()
        .map(|r| (r.id.clone(), r))
        .collect();

    let mut report_events = Vec::with_capacity(events.len());
    for event in &events {
        let event_type = db::get_event_type(conn, &event.event_type_id)?;
        report_events.push(ReportEvent {
            event_id: event.id.clone(),
            name: event.name.clone(),
            start_date: event.start_dt.with_timezone(&config.timezone).date_naive(),
            event_type: event_type.name,
        });
    }

    let requirement = PeriodRequirement::default().excusing_absence();
    let mut groups = Vec::new();

    for group in db::all_groups(conn)? {
        let mut rows = Vec::new();

        for member in db::list_members(conn, &MemberFilter::active().in_group(&group.id))? {
            let Some(rank) = ranks.get(&member.rank_id) else {
                warn!(member = %member.name, rank_id = %member.rank_id, "member has unknown rank, left out of report");
                continue;
            };
            let absences = db::absences_for_member(conn, &member.id)?;
            let attendances = db::attendance_details_for_member(conn, &member.id)?;

            let adequacy = period_adequacy(
                &member,
                &absences,
                &attendances,
                &events,
                period,
                &requirement,
                &config.training_event_type,
            );

            let markers = report_events
                .iter()
                .map(|event| {
                    let attendance = attendances
                        .iter()
                        .find(|a| a.attendance.event_id == event.event_id);
                    marker_for(&member, rank, config, &absences, attendance, event.start_date)
                })
                .collect();

            rows.push(MemberRow {
                member_id: member.id.clone(),
                name: member.name.clone(),
                adequacy,
                markers,
            });
        }

        groups.push(GroupSection {
            group: group.name,
            members: rows,
        });
    }

    Ok(PeriodReport {
        first_day: period.first_day,
        last_day: period.last_day,
        events: report_events,
        groups,
    })
}

// ============================================================================
// GROUP CSV EXPORT
// ============================================================================

/// "2024-03-alpha.csv"
pub fn group_month_filename(period: &Period, group: &MemberGroup) -> String {
    format!(
        "{}-{}.csv",
        period.first_day.format("%Y-%m"),
        group.name.to_lowercase()
    )
}

/// One row per active group member, one column per event in the period:
/// "X" for an adequate attendance, " " otherwise. Ends with a legend row.
pub fn write_group_month_csv<W: Write>(
    conn: &Connection,
    config: &EngineConfig,
    period: &Period,
    group_id: &str,
    writer: W,
) -> Result<()> {
    let events = db::events_in_period(conn, period)?;
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(writer);

    let mut header = vec!["Member".to_string()];
    header.extend(events.iter().map(|e| {
        e.start_dt
            .with_timezone(&config.timezone)
            .format("%Y-%m-%d")
            .to_string()
    }));
    wtr.write_record(&header)?;

    for member in db::list_members(conn, &MemberFilter::active().in_group(group_id))? {
        let attendances = db::attendance_details_for_member(conn, &member.id)?;
        let mut row = vec![member.name.clone()];
        for event in &events {
            let adequate = attendances
                .iter()
                .any(|a| a.attendance.event_id == event.id && a.is_adequate());
            row.push(if adequate { MARK_ADEQUATE } else { MARK_MISSING }.to_string());
        }
        wtr.write_record(&row)?;
    }

    wtr.write_record(["X = attended"])?;
    wtr.flush()?;
    Ok(())
}
