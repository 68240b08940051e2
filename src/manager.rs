use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::TaskStore;
use crate::task::{Task, TaskId};

/// One slice of the evaluation chart: a task's overall duration in
/// milliseconds together with the task it belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry {
    pub duration: f64,
    pub task_id: TaskId,
}

/// What [`TaskManager::toggle_task`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Started,
    Stopped,
}

/// Holds the tasks of the current session and mediates every start and stop.
/// Finished records are handed to the store right after the task stops.
pub struct TaskManager<S> {
    store: S,
    tasks: Vec<Task>,
}

impl<S: TaskStore> TaskManager<S> {
    /// Load the task list from `store`.
    pub fn open(store: S) -> Result<Self> {
        let tasks = store.load_tasks()?;
        Ok(Self { store, tasks })
    }

    /// Replace the task list with a fresh copy from the store. Running
    /// records are lost.
    pub fn reload(&mut self) -> Result<()> {
        self.tasks = self.store.load_tasks()?;
        Ok(())
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn task_list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id() == id)
    }

    pub fn active_tasks(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|task| task.is_active()).collect()
    }

    pub fn add_task_with_name(&mut self, name: &str) -> Result<&Task> {
        if name.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "Argument \"taskName\" must not be null or empty!".to_string(),
            ));
        }
        let task = self.store.add_task(name)?;
        debug!(%task, "Added task");
        self.tasks.push(task);
        Ok(&self.tasks[self.tasks.len() - 1])
    }

    pub fn start_task(&mut self, id: TaskId) -> Result<()> {
        let task = self.task_mut(id)?;
        task.start()?;
        debug!(%task, "Started task");
        Ok(())
    }

    /// Stop the task and hand the record it just finished to the store. The
    /// task is stopped even if the store fails to save the record; that
    /// failure is only logged.
    pub fn stop_task(&mut self, id: TaskId) -> Result<()> {
        let index = self.position(id)?;
        let record = self.tasks[index].stop()?;
        debug!(task_id = id, duration = ?record.duration(), "Stopped task");
        if let Err(e) = self.store.persist_record(id, record) {
            warn!(task_id = id, "Failed to save record: {e}");
        }
        Ok(())
    }

    /// Stop the task if it is active, start it otherwise.
    pub fn toggle_task(&mut self, id: TaskId) -> Result<Toggle> {
        if self.is_task_active(id)? {
            self.stop_task(id)?;
            Ok(Toggle::Stopped)
        } else {
            self.start_task(id)?;
            Ok(Toggle::Started)
        }
    }

    pub fn is_task_active(&self, id: TaskId) -> Result<bool> {
        Ok(self.task_ref(id)?.is_active())
    }

    pub fn overall_duration_for_task(&self, id: TaskId) -> Result<f64> {
        Ok(self.task_ref(id)?.overall_duration())
    }

    /// Tasks with recorded time, optionally narrowed to those having a record
    /// that starts after `from` and one (not necessarily the same) that
    /// starts before `to`. Order of the task list is kept.
    pub fn filtered_tasks(
        &self,
        from: Option<DateTime<Local>>,
        to: Option<DateTime<Local>>,
    ) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|task| from.map_or(true, |from| task.has_records_after(from)))
            .filter(|task| to.map_or(true, |to| task.has_records_before(to)))
            .filter(|task| task.overall_duration() > 0.0)
            .collect()
    }

    fn position(&self, id: TaskId) -> Result<usize> {
        self.tasks
            .iter()
            .position(|task| task.id() == id)
            .ok_or_else(|| unknown_task(id))
    }

    fn task_ref(&self, id: TaskId) -> Result<&Task> {
        self.task(id).ok_or_else(|| unknown_task(id))
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        let index = self.position(id)?;
        Ok(&mut self.tasks[index])
    }
}

fn unknown_task(id: TaskId) -> Error {
    Error::InvalidArgument(format!("Argument \"task\" refers to unknown task {id}!"))
}

/// Task names, in the order given.
pub fn task_labels<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Vec<String> {
    tasks.into_iter().map(|task| task.name().to_string()).collect()
}

/// Chart entries, in the order given.
pub fn task_entries<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Vec<Entry> {
    tasks
        .into_iter()
        .map(|task| Entry {
            duration: task.overall_duration(),
            task_id: task.id(),
        })
        .collect()
}
