use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Local};

use crate::error::{Error, Result};
use crate::record::{Record, RecordState};

pub type TaskId = u32;

/// Source of ids for tasks that never went through a store.
static NEXT_TASK_ID: AtomicU32 = AtomicU32::new(1);

/// A named unit of work. A task owns its records in chronological order and
/// is active exactly while its newest record is running.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    id: TaskId,
    name: String,
    records: Vec<Record>,
    // index into `records`, always the last one when set
    active_record: Option<usize>,
}

impl Task {
    /// Create a task with a fresh, process-unique id.
    pub fn with_name(name: impl Into<String>) -> Result<Self> {
        let name = validate_name(name.into())?;
        let id = NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed);
        Ok(Self::new(id, name))
    }

    /// Create a task under an id assigned elsewhere, usually by a store. The
    /// task starts without records.
    pub fn with_id(id: TaskId, name: impl Into<String>) -> Result<Self> {
        let name = validate_name(name.into())?;
        Ok(Self::new(id, name))
    }

    fn new(id: TaskId, name: String) -> Self {
        Self {
            id,
            name,
            records: Vec::new(),
            active_record: None,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn active_record(&self) -> Option<&Record> {
        self.active_record.map(|index| &self.records[index])
    }

    pub fn is_active(&self) -> bool {
        self.active_record.is_some()
    }

    pub fn has_any_records(&self) -> bool {
        !self.records.is_empty()
    }

    /// Start working on the task: a new record is appended and started.
    pub fn start(&mut self) -> Result<()> {
        if self.is_active() {
            return Err(Error::IllegalState("Task has already been started!"));
        }

        let mut record = Record::new();
        record.start()?;
        self.records.push(record);
        self.active_record = Some(self.records.len() - 1);
        Ok(())
    }

    /// Stop the task, finishing its active record. The finished record is
    /// returned so that it can be persisted.
    pub fn stop(&mut self) -> Result<&Record> {
        let index = self
            .active_record
            .ok_or(Error::IllegalState("Can't stop inactive task."))?;

        self.records[index].stop()?;
        self.active_record = None;
        Ok(&self.records[index])
    }

    /// Attach an existing record, e.g. one read back from storage.
    pub fn add_record(&mut self, record: Record) -> Result<()> {
        if record.state() == RecordState::Running {
            return Err(Error::InvalidArgument(
                "Record argument must not be running!".to_string(),
            ));
        }
        if self.is_active() {
            return Err(Error::IllegalState(
                "Can't add a record to an active task.",
            ));
        }
        self.records.push(record);
        Ok(())
    }

    /// Sum of all record durations in milliseconds. Unfinished records count
    /// as zero.
    pub fn overall_duration(&self) -> f64 {
        self.records
            .iter()
            .map(|record| record.duration().num_milliseconds() as f64)
            .sum()
    }

    /// Whether at least one record started strictly after `date`.
    pub fn has_records_after(&self, date: DateTime<Local>) -> bool {
        self.records
            .iter()
            .filter_map(Record::start_time)
            .any(|start| start > date)
    }

    /// Whether at least one record started strictly before `date`.
    pub fn has_records_before(&self, date: DateTime<Local>) -> bool {
        self.records
            .iter()
            .filter_map(Record::start_time)
            .any(|start| start < date)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.name)
    }
}

fn validate_name(name: String) -> Result<String> {
    if name.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "Argument \"name\" must not be empty!".to_string(),
        ));
    }
    Ok(name)
}
