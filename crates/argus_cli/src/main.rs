//! `argus` command line entry point.
//!
//! # Responsibility
//! - Open an incident database and print incident selections as JSON.
//! - Check timeslots against a timestamp.

use anyhow::{anyhow, Context, Result};
use argus_core::db::open_db;
use argus_core::{
    default_log_level, init_logging, FilterSpec, IncidentService, NotificationService,
    SqliteIncidentRepository, SqliteNotificationRepository,
};
use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "argus", version, about = "Query incidents and notification settings")]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "ARGUS_DB")]
    db: PathBuf,

    /// Absolute directory for rolling log files; logging is off when unset.
    #[arg(long, env = "ARGUS_LOG_DIR")]
    log_dir: Option<String>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "ARGUS_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print incidents selected by a notification profile's filters.
    ProfileIncidents { profile_id: i64 },
    /// Print incidents matching an ad-hoc JSON filter specification.
    FilterIncidents { spec: String },
    /// Print whether a timeslot contains the given time (default: now).
    TimeslotCheck {
        timeslot_id: i64,
        /// RFC 3339 timestamp; its offset decides weekday and time of day.
        #[arg(long)]
        at: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or(default_log_level());
        init_logging(level, log_dir).context("failed to initialize logging")?;
    }

    let output = run(&cli, Utc::now())?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn run(cli: &Cli, now: DateTime<Utc>) -> Result<Value> {
    let conn = open_db(&cli.db)
        .with_context(|| format!("failed to open database `{}`", cli.db.display()))?;
    let incidents = IncidentService::new(SqliteIncidentRepository::new(&conn));
    let notifications = NotificationService::new(
        SqliteNotificationRepository::new(&conn),
        SqliteIncidentRepository::new(&conn),
    );

    let output = match &cli.command {
        Command::ProfileIncidents { profile_id } => {
            let selected = notifications.profile_incidents(*profile_id, now)?;
            serde_json::to_value(incidents.views(&selected, now)?)?
        }
        Command::FilterIncidents { spec } => {
            let spec = FilterSpec::from_json(spec).context("invalid filter specification")?;
            let selected = incidents.filter_incidents(&spec, now)?;
            serde_json::to_value(incidents.views(&selected, now)?)?
        }
        Command::TimeslotCheck { timeslot_id, at } => {
            let at = parse_timestamp(at.as_deref(), now)?;
            let within = notifications.timeslot_contains(*timeslot_id, &at)?;
            json!({
                "timeslot": timeslot_id,
                "at": at.to_rfc3339(),
                "within": within,
            })
        }
    };
    Ok(output)
}

fn parse_timestamp(value: Option<&str>, now: DateTime<Utc>) -> Result<DateTime<FixedOffset>> {
    match value {
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map_err(|err| anyhow!("invalid --at timestamp `{text}`: {err}")),
        None => Ok(now.fixed_offset()),
    }
}
