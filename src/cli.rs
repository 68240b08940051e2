use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use structopt::StructOpt;
use tracing::level_filters::LevelFilter;

#[derive(Debug, StructOpt)]
pub enum Command {
    /// Create the database file with the initial tasks.
    Init,
    /// List all tasks with their overall duration.
    List,
    /// Add a new task.
    Add {
        /// The task name.
        #[structopt()]
        name: String,
    },
    /// Show how the recorded time is spread over the tasks.
    Eval {
        /// Only tasks with a record starting after this day (d.m.yyyy or yyyy-mm-dd).
        #[structopt(long, parse(try_from_str = parse_day))]
        from: Option<DateTime<Local>>,

        /// Only tasks with a record starting before this day (d.m.yyyy or yyyy-mm-dd).
        #[structopt(long, parse(try_from_str = parse_day))]
        to: Option<DateTime<Local>>,
    },
    /// Start and stop tasks interactively. Type "help" for the commands.
    Session,
    /// Remove all records and restore the initial tasks.
    Reset,
}

#[derive(Debug, StructOpt)]
#[structopt(name = "Zeitfresser", about = "A minimalistic task time tracker.")]
pub struct CommandLineArgs {
    #[structopt(subcommand)]
    pub action: Command,

    /// Use a different database file.
    #[structopt(parse(from_os_str), short, long, env = "ZEITFRESSER_DB")]
    pub db_file: Option<PathBuf>,

    /// Work on placeholder tasks kept in memory only, ignoring the database.
    #[structopt(long)]
    pub in_memory: bool,

    /// Log level (error, warn, info, debug, trace). Defaults to RUST_LOG.
    #[structopt(long)]
    pub log: Option<LevelFilter>,
}

/// Local midnight at the start of the given day.
pub fn parse_day(value: &str) -> Result<DateTime<Local>> {
    let day = NaiveDate::parse_from_str(value, "%d.%m.%Y")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map_err(|_| anyhow!("Invalid date {value:?}, expected d.m.yyyy or yyyy-mm-dd."))?;

    let midnight = day
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("Invalid date {value:?}."))?;

    Local
        .from_local_datetime(&midnight)
        .earliest()
        .ok_or_else(|| anyhow!("Day {value:?} has no local midnight."))
}
