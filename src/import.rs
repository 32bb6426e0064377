// 📥 Roster import - CSV → members
//
// Columns: Name, Alias, Email, Rank, Group, Join_Date, plus optional
// Mods_Assessed / Bqf_Assessed (default true). Rank and group are resolved
// by name; a row that cannot be resolved fails alone.

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::db::{self, AuditEntry};
use crate::entities::Member;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterRow {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "Alias", default)]
    pub alias: Option<String>,

    #[serde(rename = "Email", default)]
    pub email: Option<String>,

    #[serde(rename = "Rank")]
    pub rank: String,

    #[serde(rename = "Group", default)]
    pub group: Option<String>,

    #[serde(rename = "Join_Date")]
    pub join_date: NaiveDate,

    #[serde(rename = "Mods_Assessed", default)]
    pub mods_assessed: Option<bool>,

    #[serde(rename = "Bqf_Assessed", default)]
    pub bqf_assessed: Option<bool>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn load_roster_csv(path: &Path) -> Result<Vec<RosterRow>> {
    let rdr = csv::Reader::from_path(path)?;
    read_rows(rdr)
}

pub fn read_roster<R: Read>(reader: R) -> Result<Vec<RosterRow>> {
    read_rows(csv::Reader::from_reader(reader))
}

fn read_rows<R: Read>(mut rdr: csv::Reader<R>) -> Result<Vec<RosterRow>> {
    let mut rows = Vec::new();
    for result in rdr.deserialize() {
        rows.push(result?);
    }
    Ok(rows)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub failed: usize,
    /// "<row name>: <error>" per failed row
    pub failures: Vec<String>,
}

fn import_row(conn: &Connection, row: &RosterRow) -> Result<Member> {
    let rank = db::find_rank_by_name(conn, row.rank.trim())?;
    let mut member = Member::new(row.name.trim(), &rank.id, row.join_date);

    if let Some(alias) = non_empty(&row.alias) {
        member = member.with_alias(alias);
    }
    if let Some(email) = non_empty(&row.email) {
        member = member.with_email(email);
    }
    if let Some(group_name) = non_empty(&row.group) {
        let group = db::find_group_by_name(conn, group_name)?;
        member = member.in_group(&group.id);
    }
    member.mods_assessed = row.mods_assessed.unwrap_or(true);
    member.bqf_assessed = row.bqf_assessed.unwrap_or(true);

    let tx = conn.unchecked_transaction()?;
    db::insert_member(&tx, &member)?;
    db::insert_audit_entry(
        &tx,
        &AuditEntry::new(
            "member_imported",
            "member",
            &member.id,
            serde_json::to_value(row)?,
            "roster_import",
        ),
    )?;
    tx.commit()?;
    Ok(member)
}

/// Register every row; failures are counted and logged per row
pub fn import_roster(conn: &Connection, rows: &[RosterRow]) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for row in rows {
        match import_row(conn, row) {
            Ok(_) => summary.imported += 1,
            Err(e) => {
                warn!(name = %row.name, error = %e, "roster row skipped");
                summary.failed += 1;
                summary.failures.push(format!("{}: {}", row.name, e));
            }
        }
    }

    info!(imported = summary.imported, failed = summary.failed, "roster import finished");
    Ok(summary)
}
