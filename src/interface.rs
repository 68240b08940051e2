use std::io::{BufRead, Write};
use std::time::Duration as STDDuration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use humantime::format_duration;
use prettytable::{row, Table};

use crate::cli::parse_day;
use crate::manager::{task_entries, task_labels, TaskManager, Toggle};
use crate::store::TaskStore;
use crate::task::{Task, TaskId};

const NAME_WIDTH: usize = 30;

const SESSION_HELP: &str = "\
commands:
  <id> | toggle <id>     start the task if it is stopped, stop it otherwise
  start <id>             start a task
  stop <id>              stop a task and save its time
  add <name>             add a new task
  list                   show all tasks
  eval [from|-] [to|-]   show recorded time, optionally between two days
  help                   show this text
  quit                   leave the session";

/// Print the task table.
pub fn list<S: TaskStore>(manager: &TaskManager<S>, out: &mut impl Write) -> Result<()> {
    let mut table = Table::new();
    table.add_row(row!["id", "task", "state", "time spent"]);
    for task in manager.task_list() {
        table.add_row(row![
            task.id(),
            textwrap::fill(task.name(), NAME_WIDTH),
            fmt_state(task),
            fmt_duration(task.overall_duration())
        ]);
    }
    table.print(out)?;
    Ok(())
}

pub fn add_task<S: TaskStore>(
    manager: &mut TaskManager<S>,
    name: &str,
    out: &mut impl Write,
) -> Result<()> {
    let task = manager.add_task_with_name(name)?;
    writeln!(out, "{task} added")?;
    Ok(())
}

/// Print how the recorded time is distributed over the tasks that match the
/// given period.
pub fn eval<S: TaskStore>(
    manager: &TaskManager<S>,
    from: Option<DateTime<Local>>,
    to: Option<DateTime<Local>>,
    out: &mut impl Write,
) -> Result<()> {
    let tasks = manager.filtered_tasks(from, to);
    if tasks.is_empty() {
        writeln!(out, "No time recorded.")?;
        return Ok(());
    }

    let labels = task_labels(tasks.iter().copied());
    let entries = task_entries(tasks.iter().copied());
    let total: f64 = entries.iter().map(|entry| entry.duration).sum();

    let mut table = Table::new();
    table.add_row(row!["task", "time spent", "share"]);
    for (label, entry) in labels.iter().zip(&entries) {
        table.add_row(row![
            textwrap::fill(label, NAME_WIDTH),
            fmt_duration(entry.duration),
            format!("{:.1}%", entry.duration / total * 100.0)
        ]);
    }
    table.add_row(row!["total", fmt_duration(total), ""]);
    table.print(out)?;
    Ok(())
}

/// Read commands from `input` until it ends or the user quits. A failing
/// command is reported and the session goes on.
pub fn session<S: TaskStore>(
    manager: &mut TaskManager<S>,
    input: impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "Type \"help\" for the list of commands.")?;

    for line in input.lines() {
        let line = line.context("Failed to read from input.")?;
        match session_command(manager, &line, out) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => writeln!(out, "{e}")?,
        }
    }

    for task in manager.active_tasks() {
        writeln!(out, "{task} is still running, its time is discarded.")?;
    }
    Ok(())
}

/// Run a single session command. Returns false once the user wants to leave.
fn session_command<S: TaskStore>(
    manager: &mut TaskManager<S>,
    line: &str,
    out: &mut impl Write,
) -> Result<bool> {
    let mut words = line.split_whitespace();
    let command = match words.next() {
        Some(command) => command,
        None => return Ok(true),
    };

    match command {
        "quit" | "exit" => return Ok(false),
        "help" => writeln!(out, "{SESSION_HELP}")?,
        "list" => list(manager, out)?,
        "add" => {
            let name = words.collect::<Vec<_>>().join(" ");
            add_task(manager, &name, out)?;
        }
        "eval" => {
            let from = optional_day(words.next())?;
            let to = optional_day(words.next())?;
            eval(manager, from, to, out)?;
        }
        "start" => {
            let id = task_id(words.next())?;
            manager.start_task(id)?;
            report(manager, id, Toggle::Started, out)?;
        }
        "stop" => {
            let id = task_id(words.next())?;
            manager.stop_task(id)?;
            report(manager, id, Toggle::Stopped, out)?;
        }
        "toggle" => {
            let id = task_id(words.next())?;
            let toggle = manager.toggle_task(id)?;
            report(manager, id, toggle, out)?;
        }
        other => {
            let id = other
                .parse::<TaskId>()
                .map_err(|_| anyhow!("Unknown command {other:?}, type \"help\"."))?;
            let toggle = manager.toggle_task(id)?;
            report(manager, id, toggle, out)?;
        }
    }
    Ok(true)
}

fn report<S: TaskStore>(
    manager: &TaskManager<S>,
    id: TaskId,
    toggle: Toggle,
    out: &mut impl Write,
) -> Result<()> {
    let task = manager
        .task(id)
        .ok_or_else(|| anyhow!("Task {id} disappeared."))?;
    match toggle {
        Toggle::Started => writeln!(out, "{task} started")?,
        Toggle::Stopped => writeln!(
            out,
            "{task} stopped. Duration: {} s",
            manager.overall_duration_for_task(id)? / 1000.0
        )?,
    }
    Ok(())
}

fn task_id(word: Option<&str>) -> Result<TaskId> {
    let word = word.ok_or_else(|| anyhow!("Missing task id."))?;
    word.parse()
        .with_context(|| format!("Invalid task id {word:?}."))
}

fn optional_day(word: Option<&str>) -> Result<Option<DateTime<Local>>> {
    match word {
        None | Some("-") => Ok(None),
        Some(day) => parse_day(day).map(Some),
    }
}

fn fmt_state(task: &Task) -> &'static str {
    if task.is_active() {
        "running"
    } else {
        "stopped"
    }
}

/// Format milliseconds with seconds precision.
fn fmt_duration(millis: f64) -> String {
    let secs = (millis / 1000.0).max(0.0) as u64;
    format_duration(STDDuration::from_secs(secs)).to_string()
}
