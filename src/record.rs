use chrono::{DateTime, Duration, Local};

use crate::error::{Error, Result};

/// Identifier of a persisted record. Fresh records carry 0 until they are
/// read back from a store.
pub type RecordId = u32;

/// A single phase of work on a task, from `start` to `end`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    id: RecordId,
    start: Option<DateTime<Local>>,
    end: Option<DateTime<Local>>,
    finished: bool,
}

/// The lifecycle of a record. Once finished, a record never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Fresh,
    Running,
    Finished,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a record that is already over (rows read back from a store,
    /// test fixtures). Either timestamp may be absent when it could not be
    /// recovered; the record is finished regardless. An end before the start
    /// is moved up to the start.
    pub(crate) fn from_parts(
        id: RecordId,
        start: Option<DateTime<Local>>,
        end: Option<DateTime<Local>>,
    ) -> Self {
        let end = match (start, end) {
            (Some(start), Some(end)) => Some(std::cmp::max(start, end)),
            _ => end,
        };
        Self {
            id,
            start,
            end,
            finished: true,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn start_time(&self) -> Option<DateTime<Local>> {
        self.start
    }

    pub fn end_time(&self) -> Option<DateTime<Local>> {
        self.end
    }

    pub fn state(&self) -> RecordState {
        match (self.finished, self.start) {
            (true, _) => RecordState::Finished,
            (false, Some(_)) => RecordState::Running,
            (false, None) => RecordState::Fresh,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state() == RecordState::Finished
    }

    /// Start the record now. Only a fresh record can be started.
    pub fn start(&mut self) -> Result<()> {
        match self.state() {
            RecordState::Fresh => {
                self.start = Some(Local::now());
                Ok(())
            }
            RecordState::Running => Err(Error::IllegalState("Record is already active!")),
            RecordState::Finished => Err(Error::IllegalState("Record has already been finished!")),
        }
    }

    /// Stop a running record now.
    pub fn stop(&mut self) -> Result<()> {
        match (self.state(), self.start) {
            (RecordState::Running, Some(start)) => {
                // The wall clock may step backwards; end never precedes start.
                self.end = Some(std::cmp::max(Local::now(), start));
                self.finished = true;
                Ok(())
            }
            (RecordState::Finished, _) => {
                Err(Error::IllegalState("Record has already been finished!"))
            }
            _ => Err(Error::IllegalState("Record has not been started yet!")),
        }
    }

    /// The time elapsed between start and end, zero unless both are known.
    pub fn duration(&self) -> Duration {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end - start,
            _ => Duration::zero(),
        }
    }
}
