// Roster Warden - Core Library
// Member lifecycle, attendance adequacy and compliance warnings.
// Exposes all modules for use in the CLI and tests.

pub mod error;
pub mod config;
pub mod clock;
pub mod entities;
pub mod db;
pub mod deadlines;      // Time & absence calculator
pub mod adequacy;       // Per-event and per-period attendance
pub mod classifier;     // Due-checks and promotion readiness
pub mod roster;         // Active / recruit / leader queries
pub mod warnings;       // Warning reconciler + batch refreshes
pub mod notify;         // Notification sweep
pub mod merge;          // Member merge resolver
pub mod report;         // Event stats, weekly summary, period report, CSV export
pub mod import;         // CSV roster import

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export commonly used types
pub use error::{Result, RosterError};
pub use config::{EngineConfig, WarningTypeNames};
pub use clock::{Clock, FixedClock, Period, SystemClock};
pub use entities::{
    Absence, AbsenceType, Attendance, AttendanceDetail, Contribution, ContributionType, Event,
    EventType, Member, MemberGroup, Rank, RecordStatus, Warning, WarningType,
};
pub use db::{setup_database, MemberFilter};
pub use deadlines::{total_absent_days, Deadlines};
pub use adequacy::{period_adequacy, PeriodAdequacy, PeriodRequirement};
pub use classifier::{ready_for_promotion, recruit_warning, DueCheck};
pub use roster::{member_status, MemberStatus};
pub use warnings::{reconcile_warning, ReconcileOutcome, RefreshSummary, WarningEngine};
pub use notify::{
    send_exception_notice, send_warning_emails, GroupLeaderComposer, Notifier, OutboxNotifier,
    SweepSummary, WarningComposer,
};
pub use merge::{merge, plan_merge, MergePlan, MergeSide, TransferOp};
pub use report::{
    build_period_report, event_stats, group_month_filename, weekly_summary, write_group_month_csv,
    EventStats, PeriodReport, WeekSummary,
};
pub use import::{import_roster, load_roster_csv, ImportSummary, RosterRow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
