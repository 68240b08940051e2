use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};
use tracing::{debug, info, warn};

use crate::error::{Error, Result, StorageContext};
use crate::record::{Record, RecordId};
use crate::store::TaskStore;
use crate::task::{Task, TaskId};

/// Format of every timestamp written to the record table (local time).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// File name of the database inside the application data directory.
pub const DATABASE_NAME: &str = "zeitfresser.db";

/// Tasks a freshly created database starts with.
pub const INITIAL_TASK_NAMES: [&str; 6] =
    ["Vorlesungen", "Mails", "Internet", "Lesen", "Spielen", "Putzen"];

/// Tasks and records kept in an SQLite database.
pub struct SqliteStore {
    db: Connection,
}

impl SqliteStore {
    /// Open the database at `path`, creating and seeding it if it does not
    /// exist.
    pub fn open(path: &Path) -> Result<Self> {
        let exists = path.exists();
        let db = Connection::open(path).context("Failed to open database.")?;
        let store = Self { db };
        if !exists {
            info!(?path, "Creating new database");
            store.init()?;
        }
        Ok(store)
    }

    /// A throwaway database, seeded like a new file.
    pub fn open_in_memory() -> Result<Self> {
        let db = Connection::open_in_memory().context("Failed to open database.")?;
        let store = Self { db };
        store.init()?;
        Ok(store)
    }

    /// Create both tables and insert the initial tasks.
    pub fn init(&self) -> Result<()> {
        self.db
            .execute(
                "CREATE TABLE if not exists tasks (
                  _id             INTEGER PRIMARY KEY AUTOINCREMENT,
                  name            TEXT
                  )",
                [],
            )
            .context("Failed to create tasks table.")?;

        self.db
            .execute(
                "CREATE TABLE if not exists record (
                  _id             INTEGER PRIMARY KEY AUTOINCREMENT,
                  taskId          INTEGER,
                  start           NUMERIC,
                  \"end\"           NUMERIC,
                  FOREIGN KEY(taskId) REFERENCES tasks(_id)
                  )",
                [],
            )
            .context("Failed to create record table.")?;

        for name in INITIAL_TASK_NAMES {
            self.db
                .execute("INSERT INTO tasks (name) VALUES(?1)", params![name])
                .context("Failed to insert initial tasks.")?;
        }
        Ok(())
    }

    /// Throw away every task and record, then start over with the initial
    /// tasks.
    pub fn reset(&self) -> Result<()> {
        self.db
            .execute("DROP TABLE IF EXISTS record", [])
            .context("Failed to drop record table.")?;
        self.db
            .execute("DROP TABLE IF EXISTS tasks", [])
            .context("Failed to drop tasks table.")?;
        info!("Database reset");
        self.init()
    }

    fn populate_task_with_records(&self, task: &mut Task) -> Result<()> {
        let mut stmt = self
            .db
            .prepare("SELECT _id, start, \"end\" FROM record WHERE taskId = ?1 ORDER BY _id")
            .context("Failed to fetch records from database.")?;

        let rows = stmt
            .query_map(params![task.id()], record_from_row)
            .context("Failed to fetch records from database.")?;

        for record in rows {
            let record = record.context("Failed to read record row.")?;
            task.add_record(record)?;
        }
        Ok(())
    }
}

impl TaskStore for SqliteStore {
    fn load_tasks(&self) -> Result<Vec<Task>> {
        let mut stmt = self
            .db
            .prepare("SELECT _id, name FROM tasks ORDER BY name ASC")
            .context("Failed to fetch tasks from database.")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, TaskId>(0)?, row.get::<_, Option<String>>(1)?))
            })
            .context("Failed to fetch tasks from database.")?;

        let mut tasks = Vec::new();
        for row in rows {
            let (id, name) = row.context("Failed to read task row.")?;
            let mut task = match Task::with_id(id, name.unwrap_or_default()) {
                Ok(task) => task,
                Err(e) => {
                    warn!(id, "Skipping task row: {e}");
                    continue;
                }
            };
            self.populate_task_with_records(&mut task)?;
            tasks.push(task);
        }

        debug!(count = tasks.len(), "Loaded tasks");
        Ok(tasks)
    }

    fn add_task(&self, name: &str) -> Result<Task> {
        // validate before touching the table
        let task = Task::with_id(0, name)?;
        self.db
            .execute("INSERT INTO tasks (name) VALUES(?1)", params![task.name()])
            .context("Failed to insert task to database.")?;

        let id = TaskId::try_from(self.db.last_insert_rowid()).map_err(|_| {
            Error::InvalidArgument("Task id out of range.".to_string())
        })?;
        Task::with_id(id, task.name())
    }

    fn persist_record(&self, task_id: TaskId, record: &Record) -> Result<()> {
        let (Some(start), Some(end)) = (record.start_time(), record.end_time()) else {
            return Err(Error::InvalidArgument(
                "Only finished records can be persisted!".to_string(),
            ));
        };

        self.db
            .execute(
                "INSERT INTO record (taskId, start, \"end\") VALUES(?1, ?2, ?3)",
                params![task_id, format_timestamp(start), format_timestamp(end)],
            )
            .context("Failed to insert record to database.")?;
        debug!(task_id, "Persisted record");
        Ok(())
    }
}

pub fn format_timestamp(timestamp: DateTime<Local>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|e| {
        Error::ParseFailure {
            value: value.to_string(),
            reason: e.to_string(),
        }
    })?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| Error::ParseFailure {
            value: value.to_string(),
            reason: "no such local time".to_string(),
        })
}

/// A timestamp column that is missing or unreadable becomes `None`.
fn timestamp_column(row: &Row, index: usize) -> rusqlite::Result<Option<DateTime<Local>>> {
    let value = match row.get_ref(index)? {
        ValueRef::Null => return Ok(None),
        ValueRef::Text(text) => String::from_utf8_lossy(text).into_owned(),
        other => {
            warn!(column = index, kind = ?other.data_type(), "Unexpected timestamp value");
            return Ok(None);
        }
    };

    match parse_timestamp(&value) {
        Ok(timestamp) => Ok(Some(timestamp)),
        Err(e) => {
            warn!("Failed to parse date: {e}");
            Ok(None)
        }
    }
}

/// Return a record from a row in this order: [_id, start, end]
fn record_from_row(row: &Row) -> rusqlite::Result<Record> {
    let id = row.get::<_, RecordId>(0)?;
    let start = timestamp_column(row, 1)?;
    let end = timestamp_column(row, 2)?;
    if let (Some(start), Some(end)) = (start, end) {
        // local times repeat when the clocks go back
        if end < start {
            warn!(record = id, %start, %end, "Record ends before it starts, counting it as zero");
        }
    }
    Ok(Record::from_parts(id, start, end))
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use chrono::Duration;

    use super::*;
    use crate::logging::TEST_LOGGING;

    fn finished_record(start: &str, minutes: i64) -> Record {
        let start = parse_timestamp(start).unwrap();
        Record::from_parts(0, Some(start), Some(start + Duration::minutes(minutes)))
    }

    fn task_named<'a>(tasks: &'a [Task], name: &str) -> &'a Task {
        tasks.iter().find(|task| task.name() == name).unwrap()
    }

    #[test]
    fn new_store_is_seeded_and_sorted() -> anyhow::Result<()> {
        LazyLock::force(&TEST_LOGGING);
        let store = SqliteStore::open_in_memory()?;
        let tasks = store.load_tasks()?;
        let names: Vec<_> = tasks.iter().map(Task::name).collect();
        assert_eq!(
            names,
            ["Internet", "Lesen", "Mails", "Putzen", "Spielen", "Vorlesungen"]
        );
        assert!(tasks.iter().all(|task| !task.has_any_records()));
        Ok(())
    }

    #[test]
    fn persisted_records_are_loaded_back() -> anyhow::Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let mails = task_named(&store.load_tasks()?, "Mails").id();

        store.persist_record(mails, &finished_record("2016-11-02T09:00:00", 30))?;
        store.persist_record(mails, &finished_record("2016-11-03T14:15:00", 15))?;

        let tasks = store.load_tasks()?;
        let task = task_named(&tasks, "Mails");
        assert_eq!(task.records().len(), 2);
        assert_eq!(task.overall_duration(), 45.0 * 60_000.0);
        assert!(task.records()[0].id() < task.records()[1].id());
        assert_eq!(
            format_timestamp(task.records()[1].start_time().unwrap()),
            "2016-11-03T14:15:00"
        );
        assert!(!task_named(&tasks, "Lesen").has_any_records());
        Ok(())
    }

    #[test]
    fn unfinished_record_is_not_persisted() -> anyhow::Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let mut record = Record::new();
        record.start()?;
        assert!(matches!(
            store.persist_record(1, &record),
            Err(Error::InvalidArgument(_))
        ));
        Ok(())
    }

    #[test]
    fn corrupt_timestamp_is_left_absent() -> anyhow::Result<()> {
        LazyLock::force(&TEST_LOGGING);
        let store = SqliteStore::open_in_memory()?;
        let lesen = task_named(&store.load_tasks()?, "Lesen").id();
        store.db.execute(
            "INSERT INTO record (taskId, start, \"end\") VALUES(?1, 'garbage', '2016-11-02T10:00:00')",
            params![lesen],
        )?;
        store.persist_record(lesen, &finished_record("2016-11-02T11:00:00", 5))?;

        let tasks = store.load_tasks()?;
        let task = task_named(&tasks, "Lesen");
        assert_eq!(task.records().len(), 2);
        assert!(task.records()[0].start_time().is_none());
        assert!(task.records()[0].end_time().is_some());
        assert_eq!(task.overall_duration(), 5.0 * 60_000.0);
        Ok(())
    }

    #[test]
    fn record_without_readable_end_keeps_its_start() -> anyhow::Result<()> {
        LazyLock::force(&TEST_LOGGING);
        let store = SqliteStore::open_in_memory()?;
        let spielen = task_named(&store.load_tasks()?, "Spielen").id();
        store.db.execute(
            "INSERT INTO record (taskId, start, \"end\") VALUES(?1, '2016-11-02T10:00:00', NULL)",
            params![spielen],
        )?;
        store.db.execute(
            "INSERT INTO record (taskId, start, \"end\") VALUES(?1, '2016-11-02T12:00:00', 'garbage')",
            params![spielen],
        )?;

        let tasks = store.load_tasks()?;
        let task = task_named(&tasks, "Spielen");
        assert_eq!(task.records().len(), 2);
        assert!(task.records().iter().all(Record::is_finished));
        assert!(task.records().iter().all(|record| record.end_time().is_none()));
        assert!(!task.is_active());
        assert_eq!(task.overall_duration(), 0.0);

        let day = parse_timestamp("2016-11-02T00:00:00")?;
        assert!(task.has_records_after(day));
        assert!(task.has_records_before(day + Duration::days(1)));
        Ok(())
    }

    #[test]
    fn record_ending_before_its_start_counts_as_zero() -> anyhow::Result<()> {
        LazyLock::force(&TEST_LOGGING);
        let store = SqliteStore::open_in_memory()?;
        let mails = task_named(&store.load_tasks()?, "Mails").id();
        store.db.execute(
            "INSERT INTO record (taskId, start, \"end\") VALUES(?1, '2016-11-02T10:00:00', '2016-11-02T09:00:00')",
            params![mails],
        )?;
        store.persist_record(mails, &finished_record("2016-11-02T11:00:00", 30))?;

        let tasks = store.load_tasks()?;
        let task = task_named(&tasks, "Mails");
        assert_eq!(task.records().len(), 2);
        assert_eq!(task.records()[0].duration(), Duration::zero());
        assert_eq!(task.overall_duration(), 30.0 * 60_000.0);
        Ok(())
    }

    #[test]
    fn add_task_assigns_id() -> anyhow::Result<()> {
        let store = SqliteStore::open_in_memory()?;
        let task = store.add_task("Kochen")?;
        assert_eq!(task.id(), 7);

        let tasks = store.load_tasks()?;
        assert_eq!(task_named(&tasks, "Kochen").id(), task.id());
        assert!(matches!(store.add_task(" "), Err(Error::InvalidArgument(_))));
        assert_eq!(store.load_tasks()?.len(), 7);
        Ok(())
    }

    #[test]
    fn reset_restores_initial_tasks() -> anyhow::Result<()> {
        let store = SqliteStore::open_in_memory()?;
        store.add_task("Kochen")?;
        let internet = task_named(&store.load_tasks()?, "Internet").id();
        store.persist_record(internet, &finished_record("2016-11-02T09:00:00", 30))?;

        store.reset()?;
        let tasks = store.load_tasks()?;
        assert_eq!(tasks.len(), INITIAL_TASK_NAMES.len());
        assert!(tasks.iter().all(|task| !task.has_any_records()));
        Ok(())
    }

    #[test]
    fn file_database_survives_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(DATABASE_NAME);
        {
            let store = SqliteStore::open(&path)?;
            let id = task_named(&store.load_tasks()?, "Putzen").id();
            store.persist_record(id, &finished_record("2016-11-02T09:00:00", 10))?;
        }

        let store = SqliteStore::open(&path)?;
        let tasks = store.load_tasks()?;
        assert_eq!(tasks.len(), INITIAL_TASK_NAMES.len());
        assert_eq!(task_named(&tasks, "Putzen").records().len(), 1);
        Ok(())
    }

    #[test]
    fn timestamp_format_round_trips_to_the_second() {
        let value = "2016-11-02T09:05:07";
        assert_eq!(format_timestamp(parse_timestamp(value).unwrap()), value);
        assert!(matches!(
            parse_timestamp("02.11.2016"),
            Err(Error::ParseFailure { .. })
        ));
    }
}
