// Roster Warden CLI - batch entry point for an external scheduler
//
//   roster-warden init
//   roster-warden import <roster.csv>
//   roster-warden refresh
//   roster-warden notify
//   roster-warden merge <target-id> <source-id>
//   roster-warden status <member-id|name>
//   roster-warden report <YYYY-MM>
//   roster-warden summary
//   roster-warden export <YYYY-MM> <group>

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::env;
use std::fs::File;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roster_warden::{
    build_period_report, db, group_month_filename, import_roster, load_roster_csv,
    member_status, merge, send_exception_notice, send_warning_emails, setup_database,
    warnings, weekly_summary, write_group_month_csv, EngineConfig, GroupLeaderComposer,
    MemberFilter, OutboxNotifier, Period, SystemClock, WarningEngine, WarningType,
};

const USAGE: &str = "usage: roster-warden <init|import <csv>|refresh|notify|merge <target> <source>|status <member>|report <YYYY-MM>|summary|export <YYYY-MM> <group>>";

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let config = EngineConfig::from_env().context("Failed to load configuration")?;

    match args.get(1).map(String::as_str) {
        Some("init") => run_init(&config),
        Some("import") => {
            let path = args.get(2).context(USAGE)?;
            run_import(&config, Path::new(path))
        }
        Some("refresh") => run_refresh(&config),
        Some("notify") => run_notify(&config),
        Some("merge") => match (args.get(2), args.get(3)) {
            (Some(target), Some(source)) => run_merge(&config, target, source),
            _ => bail!(USAGE),
        },
        Some("status") => {
            let member = args.get(2).context(USAGE)?;
            run_status(&config, member)
        }
        Some("report") => {
            let month = args.get(2).context(USAGE)?;
            run_report(&config, month)
        }
        Some("summary") => run_summary(&config),
        Some("export") => match (args.get(2), args.get(3)) {
            (Some(month), Some(group)) => run_export(&config, month, group),
            _ => bail!(USAGE),
        },
        _ => bail!(USAGE),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn open(config: &EngineConfig) -> Result<Connection> {
    let conn = Connection::open(&config.database_path).with_context(|| {
        format!("Failed to open database {}", config.database_path.display())
    })?;
    setup_database(&conn).context("Failed to set up schema")?;
    Ok(conn)
}

fn run_init(config: &EngineConfig) -> Result<()> {
    println!("🗄️  Initializing roster database");
    let conn = open(config)?;

    // Warning types the batch refreshes look up by name
    for name in config.warning_types.all() {
        match db::find_warning_type_by_name(&conn, name) {
            Ok(_) => println!("✓ Warning type '{}' present", name),
            Err(e) if e.is_not_found() => {
                db::insert_warning_type(&conn, &WarningType::new(name))?;
                println!("✓ Warning type '{}' created", name);
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("✅ Database ready at {}", config.database_path.display());
    Ok(())
}

fn run_import(config: &EngineConfig, csv_path: &Path) -> Result<()> {
    println!("📂 Importing roster from {}", csv_path.display());
    let rows = load_roster_csv(csv_path)
        .with_context(|| format!("Failed to read {}", csv_path.display()))?;
    let conn = open(config)?;

    let summary = import_roster(&conn, &rows)?;
    println!("✓ Imported {} members", summary.imported);
    for failure in &summary.failures {
        println!("❌ {}", failure);
    }
    Ok(())
}

fn run_refresh(config: &EngineConfig) -> Result<()> {
    let conn = open(config)?;
    let engine = WarningEngine::new(config.clone(), SystemClock);

    println!("🚩 Refreshing warnings ({})", engine.today());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut failures = Vec::new();
    for (sweep, result) in engine.refresh_all(&conn) {
        match result {
            Ok(summary) => println!("✓ {}", summary.summary()),
            Err(e) => {
                println!("❌ {}: {}", sweep, e);
                failures.push(format!("{}: {}", sweep, e));
            }
        }
    }

    println!(
        "\n⚠️  {} unacknowledged warnings",
        warnings::unacknowledged_warning_count(&conn)?
    );

    if !failures.is_empty() {
        let notifier = OutboxNotifier::new(&conn, &config.notification_address);
        if let Err(e) = send_exception_notice(config, &notifier, &failures.join("\n")) {
            tracing::error!(error = %e, "exception notice not queued");
        }
        bail!("{} refresh sweep(s) failed", failures.len());
    }
    Ok(())
}

fn run_notify(config: &EngineConfig) -> Result<()> {
    let conn = open(config)?;
    let composer = GroupLeaderComposer::from_config(config);
    let notifier = OutboxNotifier::new(&conn, &config.notification_address);

    let summary = send_warning_emails(&conn, config, &composer, &notifier)?;
    println!("📨 {}", summary.summary());
    Ok(())
}

fn run_merge(config: &EngineConfig, target: &str, source: &str) -> Result<()> {
    let conn = open(config)?;
    let plan = merge(&conn, config, target, source)
        .with_context(|| format!("Failed to merge {} into {}", source, target))?;

    println!(
        "🔀 Merged '{}' into '{}' ({} transfers, {} collapsed attendances)",
        plan.retired.name,
        plan.merged.name,
        plan.transfers.len(),
        plan.collapsed()
    );
    Ok(())
}

fn run_status(config: &EngineConfig, key: &str) -> Result<()> {
    let conn = open(config)?;
    let member_id = match db::get_member(&conn, key) {
        Ok(member) => member.id,
        Err(e) if e.is_not_found() => db::list_members(&conn, &MemberFilter::everyone())?
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(key))
            .map(|m| m.id)
            .with_context(|| format!("No member with id or name '{}'", key))?,
        Err(e) => return Err(e.into()),
    };

    let engine = WarningEngine::new(config.clone(), SystemClock);
    let status = member_status(&conn, config, &member_id, engine.today())?;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn parse_month(config: &EngineConfig, month: &str) -> Result<Period> {
    let (year, month) = month
        .split_once('-')
        .and_then(|(y, m)| Some((y.parse::<i32>().ok()?, m.parse::<u32>().ok()?)))
        .with_context(|| format!("Expected YYYY-MM, got '{}'", month))?;
    Ok(Period::month(config.timezone, year, month)?)
}

fn run_report(config: &EngineConfig, month: &str) -> Result<()> {
    let period = parse_month(config, month)?;
    let conn = open(config)?;
    let report = build_period_report(&conn, config, &period)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_summary(config: &EngineConfig) -> Result<()> {
    let conn = open(config)?;
    let weeks = weekly_summary(&conn, config)?;
    println!("{}", serde_json::to_string_pretty(&weeks)?);
    Ok(())
}

fn run_export(config: &EngineConfig, month: &str, group_name: &str) -> Result<()> {
    let period = parse_month(config, month)?;
    let conn = open(config)?;
    let group = db::find_group_by_name(&conn, group_name)
        .with_context(|| format!("No group named '{}'", group_name))?;

    let filename = group_month_filename(&period, &group);
    let file = File::create(&filename).with_context(|| format!("Failed to create {}", filename))?;
    write_group_month_csv(&conn, config, &period, &group.id, file)?;

    println!("📄 Wrote {}", filename);
    Ok(())
}
