//! Record store: durable tasks, lists and settings on SQLite

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{AppSettings, Snapshot, Task, TaskList, timestamp};

/// Key of the singleton settings record
pub const SETTINGS_KEY: &str = "app-settings";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS lists (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    color TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    content TEXT,
    status TEXT NOT NULL DEFAULT 'pending',
    priority TEXT NOT NULL DEFAULT 'medium',
    list_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_list ON tasks(list_id);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
"#;

const TASK_COLUMNS: &str =
    "id, title, content, status, priority, list_id, created_at, updated_at, completed_at";
const LIST_COLUMNS: &str = "id, name, description, color, created_at, updated_at";

enum Location {
    File(PathBuf),
    Memory,
}

/// SQLite-backed record store
///
/// Nothing is opened until [`Database::init`] runs; every other call fails
/// with [`Error::StoreUnavailable`] before that. Scans return records in
/// insertion order.
pub struct Database {
    location: Location,
    conn: Mutex<Option<Connection>>,
}

impl Database {
    /// Store backed by a file, created on `init`
    pub fn new(path: &Path) -> Self {
        Self {
            location: Location::File(path.to_path_buf()),
            conn: Mutex::new(None),
        }
    }

    /// Store that lives only as long as this value
    pub fn in_memory() -> Self {
        Self {
            location: Location::Memory,
            conn: Mutex::new(None),
        }
    }

    /// Open the connection and create the schema. Safe to call repeatedly.
    pub async fn init(&self) -> Result<()> {
        let mut guard = self.conn.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let conn = match &self.location {
            Location::File(path) => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent)?;
                }
                Connection::open(path)?
            }
            Location::Memory => Connection::open_in_memory()?,
        };
        conn.execute_batch(SCHEMA)?;

        tracing::debug!(location = %self.describe(), "Record store initialized");
        *guard = Some(conn);
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.location {
            Location::File(path) => path.display().to_string(),
            Location::Memory => ":memory:".to_string(),
        }
    }

    async fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or(Error::StoreUnavailable)?;
        f(conn)
    }

    pub async fn get_task(&self, id: &str) -> Result<Option<Task>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
            Ok(conn.query_row(&sql, params![id], task_from_row).optional()?)
        })
        .await
    }

    pub async fn get_tasks(&self) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY rowid");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], task_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    /// Tasks belonging to one list
    pub async fn get_tasks_by_list(&self, list_id: &str) -> Result<Vec<Task>> {
        self.with_conn(|conn| select_tasks_by_list(conn, list_id)).await
    }

    /// Insert or replace a task by id
    pub async fn save_task(&self, task: &Task) -> Result<()> {
        self.with_conn(|conn| upsert_task(conn, task)).await
    }

    pub async fn delete_task(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
            Ok(())
        })
        .await
    }

    pub async fn get_list(&self, id: &str) -> Result<Option<TaskList>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {LIST_COLUMNS} FROM lists WHERE id = ?1");
            Ok(conn.query_row(&sql, params![id], list_from_row).optional()?)
        })
        .await
    }

    pub async fn get_lists(&self) -> Result<Vec<TaskList>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {LIST_COLUMNS} FROM lists ORDER BY rowid");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], list_from_row)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await
    }

    /// Insert or replace a list by id
    pub async fn save_list(&self, list: &TaskList) -> Result<()> {
        self.with_conn(|conn| upsert_list(conn, list)).await
    }

    /// Delete a list together with every task that belongs to it.
    ///
    /// Returns the tasks that were removed.
    pub async fn delete_list(&self, id: &str) -> Result<Vec<Task>> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let removed = select_tasks_by_list(&tx, id)?;
            tx.execute("DELETE FROM lists WHERE id = ?1", params![id])?;
            tx.execute("DELETE FROM tasks WHERE list_id = ?1", params![id])?;
            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    pub async fn get_settings(&self) -> Result<Option<AppSettings>> {
        self.with_conn(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT value FROM settings WHERE key = ?1",
                    params![SETTINGS_KEY],
                    |row| row.get(0),
                )
                .optional()?;
            raw.map(|raw| serde_json::from_str(&raw).map_err(Error::from))
                .transpose()
        })
        .await
    }

    pub async fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        let value = serde_json::to_string(settings)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
                params![SETTINGS_KEY, value],
            )?;
            Ok(())
        })
        .await
    }

    /// Make the tasks and lists collections equal to `snapshot`, atomically.
    /// Settings are left alone.
    pub async fn replace_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM tasks", [])?;
            tx.execute("DELETE FROM lists", [])?;
            for list in &snapshot.lists {
                upsert_list(&tx, list)?;
            }
            for task in &snapshot.tasks {
                upsert_task(&tx, task)?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    /// Empty all three collections in one transaction
    pub async fn clear_all(&self) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            tx.execute_batch("DELETE FROM tasks; DELETE FROM lists; DELETE FROM settings;")?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}

fn select_tasks_by_list(conn: &Connection, list_id: &str) -> Result<Vec<Task>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE list_id = ?1 ORDER BY rowid");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![list_id], task_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn upsert_task(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        r#"INSERT INTO tasks (id, title, content, status, priority, list_id,
           created_at, updated_at, completed_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
           ON CONFLICT(id) DO UPDATE SET title = excluded.title, content = excluded.content,
           status = excluded.status, priority = excluded.priority, list_id = excluded.list_id,
           created_at = excluded.created_at, updated_at = excluded.updated_at,
           completed_at = excluded.completed_at"#,
        params![
            &task.id,
            &task.title,
            &task.content,
            task.status.as_str(),
            task.priority.as_str(),
            &task.list_id,
            timestamp::format(&task.created_at),
            timestamp::format(&task.updated_at),
            task.completed_at.as_ref().map(timestamp::format),
        ],
    )?;
    Ok(())
}

fn upsert_list(conn: &Connection, list: &TaskList) -> Result<()> {
    conn.execute(
        r#"INSERT INTO lists (id, name, description, color, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(id) DO UPDATE SET name = excluded.name,
           description = excluded.description, color = excluded.color,
           created_at = excluded.created_at, updated_at = excluded.updated_at"#,
        params![
            &list.id,
            &list.name,
            &list.description,
            &list.color,
            timestamp::format(&list.created_at),
            timestamp::format(&list.updated_at),
        ],
    )?;
    Ok(())
}

fn conversion_error(idx: usize, err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn time_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    timestamp::parse(&raw).map_err(|e| conversion_error(idx, e))
}

fn optional_time_column(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| timestamp::parse(&raw).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn enum_column<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: String| conversion_error(idx, e))
}

fn task_from_row(row: &Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        status: enum_column(row, 3)?,
        priority: enum_column(row, 4)?,
        list_id: row.get(5)?,
        created_at: time_column(row, 6)?,
        updated_at: time_column(row, 7)?,
        completed_at: optional_time_column(row, 8)?,
    })
}

fn list_from_row(row: &Row) -> rusqlite::Result<TaskList> {
    Ok(TaskList {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        created_at: time_column(row, 4)?,
        updated_at: time_column(row, 5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TaskStatus, Theme, now};

    fn list(id: &str) -> TaskList {
        let ts = now();
        TaskList {
            id: id.to_string(),
            name: format!("List {id}"),
            description: None,
            color: Some("#3b82f6".to_string()),
            created_at: ts,
            updated_at: ts,
        }
    }

    fn task(id: &str, list_id: &str) -> Task {
        let ts = now();
        Task {
            id: id.to_string(),
            title: format!("Task {id}"),
            content: Some("details".to_string()),
            status: TaskStatus::Pending,
            priority: Priority::High,
            created_at: ts,
            updated_at: ts,
            list_id: list_id.to_string(),
            completed_at: None,
        }
    }

    async fn open_memory() -> Database {
        let db = Database::in_memory();
        db.init().await.unwrap();
        db
    }

    #[tokio::test]
    async fn operations_fail_before_init() {
        let db = Database::in_memory();
        assert!(matches!(db.get_tasks().await, Err(Error::StoreUnavailable)));
        assert!(matches!(
            db.save_list(&list("L1")).await,
            Err(Error::StoreUnavailable)
        ));
        assert!(matches!(db.clear_all().await, Err(Error::StoreUnavailable)));
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let db = open_memory().await;
        db.save_list(&list("L1")).await.unwrap();
        db.init().await.unwrap();
        assert_eq!(db.get_lists().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn task_round_trips_through_store() {
        let db = open_memory().await;
        let mut t = task("t1", "L1");
        t.set_status(TaskStatus::Completed, now());
        db.save_task(&t).await.unwrap();

        assert_eq!(db.get_task("t1").await.unwrap(), Some(t));
        assert_eq!(db.get_task("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_task_overwrites_by_id() {
        let db = open_memory().await;
        let mut t = task("t1", "L1");
        db.save_task(&t).await.unwrap();
        t.title = "Renamed".to_string();
        db.save_task(&t).await.unwrap();

        let tasks = db.get_tasks().await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Renamed");
    }

    #[tokio::test]
    async fn tasks_can_be_looked_up_by_list() {
        let db = open_memory().await;
        db.save_task(&task("a", "L1")).await.unwrap();
        db.save_task(&task("b", "L2")).await.unwrap();
        db.save_task(&task("c", "L1")).await.unwrap();

        let ids: Vec<_> = db
            .get_tasks_by_list("L1")
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn deleting_a_list_removes_its_tasks() {
        let db = open_memory().await;
        db.save_list(&list("L1")).await.unwrap();
        db.save_list(&list("L2")).await.unwrap();
        db.save_task(&task("a", "L1")).await.unwrap();
        db.save_task(&task("b", "L2")).await.unwrap();

        let removed = db.delete_list("L1").await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id, "a");
        assert_eq!(db.get_list("L1").await.unwrap(), None);
        let remaining = db.get_tasks().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].list_id, "L2");
    }

    #[tokio::test]
    async fn settings_are_stored_under_fixed_key() {
        let db = open_memory().await;
        assert_eq!(db.get_settings().await.unwrap(), None);

        let mut settings = AppSettings::default();
        settings.theme = Theme::Dark;
        settings.auto_sync = true;
        db.save_settings(&settings).await.unwrap();

        assert_eq!(db.get_settings().await.unwrap(), Some(settings));
    }

    #[tokio::test]
    async fn replace_snapshot_drops_records_not_in_snapshot() {
        let db = open_memory().await;
        db.save_list(&list("old")).await.unwrap();
        db.save_task(&task("stale", "old")).await.unwrap();
        db.save_settings(&AppSettings::default()).await.unwrap();

        let snapshot = Snapshot {
            tasks: vec![task("t2", "L2"), task("t1", "L2")],
            lists: vec![list("L2")],
        };
        db.replace_snapshot(&snapshot).await.unwrap();

        assert_eq!(db.get_tasks().await.unwrap(), snapshot.tasks);
        assert_eq!(db.get_lists().await.unwrap(), snapshot.lists);
        assert!(db.get_settings().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn clear_all_empties_every_collection() {
        let db = open_memory().await;
        db.save_list(&list("L1")).await.unwrap();
        db.save_task(&task("t1", "L1")).await.unwrap();
        db.save_settings(&AppSettings::default()).await.unwrap();

        db.clear_all().await.unwrap();

        assert!(db.get_lists().await.unwrap().is_empty());
        assert!(db.get_tasks().await.unwrap().is_empty());
        assert_eq!(db.get_settings().await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tickit.sqlite");

        let db = Database::new(&path);
        db.init().await.unwrap();
        db.save_list(&list("L1")).await.unwrap();
        drop(db);

        let reopened = Database::new(&path);
        reopened.init().await.unwrap();
        assert_eq!(reopened.get_lists().await.unwrap().len(), 1);
    }
}
