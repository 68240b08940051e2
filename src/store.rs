use tracing::debug;

use crate::error::Result;
use crate::record::Record;
use crate::task::{Task, TaskId};

/// Where a [`TaskManager`](crate::manager::TaskManager) gets its tasks from
/// and where finished records go.
pub trait TaskStore {
    /// All known tasks, each carrying its historical records.
    fn load_tasks(&self) -> Result<Vec<Task>>;

    /// Register a new task and return it with its assigned id.
    fn add_task(&self, name: &str) -> Result<Task>;

    /// Save a finished record for the given task.
    fn persist_record(&self, task_id: TaskId, record: &Record) -> Result<()>;
}

impl<T: TaskStore + ?Sized> TaskStore for &T {
    fn load_tasks(&self) -> Result<Vec<Task>> {
        (**self).load_tasks()
    }

    fn add_task(&self, name: &str) -> Result<Task> {
        (**self).add_task(name)
    }

    fn persist_record(&self, task_id: TaskId, record: &Record) -> Result<()> {
        (**self).persist_record(task_id, record)
    }
}

pub const DEFAULT_TASK_NAMES: [&str; 3] = ["Dummy Task #1", "Dummy Task #2", "Dummy Task #3"];

/// A fixed set of placeholder tasks living only in memory. Nothing is ever
/// written anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultTaskStore;

impl TaskStore for DefaultTaskStore {
    fn load_tasks(&self) -> Result<Vec<Task>> {
        DEFAULT_TASK_NAMES.iter().map(|name| Task::with_name(*name)).collect()
    }

    fn add_task(&self, name: &str) -> Result<Task> {
        Task::with_name(name)
    }

    fn persist_record(&self, task_id: TaskId, record: &Record) -> Result<()> {
        debug!(task_id, duration = ?record.duration(), "Not persisting record in memory store");
        Ok(())
    }
}
