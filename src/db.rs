//! Database module for taskbot
//!
//! Provides persistence for chats, tasks and their comments/links.

mod schema;

pub use schema::*;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Task already exists: {0}")]
    Duplicate(String),
    #[error("Corrupt task row: {0}")]
    Corrupt(String),
    #[error("Task store unavailable: {0}")]
    Unavailable(String),
}

pub type DbResult<T> = Result<T, StoreError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

/// Raw task columns before entries are attached
struct TaskRow {
    id: i64,
    name: String,
    due_date: String,
    importance: String,
    description: Option<String>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.lock();
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Task Operations ====================

    /// Register the chat if unknown, then insert the task with its entries
    pub fn add_task(&self, chat_id: ChatId, task: &TaskItem) -> DbResult<()> {
        let mut conn = self.lock();
        let now = Utc::now().to_rfc3339();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO chats (chat_id, created_at) VALUES (?1, ?2)",
            params![chat_id.0, now],
        )?;

        let inserted = tx.execute(
            "INSERT INTO tasks (chat_id, name, due_date, importance, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                chat_id.0,
                task.name,
                task.due_date.format(DATE_FORMAT).to_string(),
                task.importance.as_str(),
                task.description,
                now,
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::Duplicate(task.name.clone()));
            }
            Err(e) => return Err(e.into()),
        }

        let task_id = tx.last_insert_rowid();
        let entries = task
            .comments
            .iter()
            .map(|c| (TaskField::Comments, c))
            .chain(task.links.iter().map(|l| (TaskField::Links, l)));
        for (kind, value) in entries {
            tx.execute(
                "INSERT INTO task_entries (task_id, kind, value, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![task_id, kind.as_str(), value, now],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// All tasks for a chat, in insertion order
    pub fn get_tasks(&self, chat_id: ChatId) -> DbResult<Vec<TaskItem>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, due_date, importance, description
             FROM tasks WHERE chat_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![chat_id.0], parse_task_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut entries = load_entries(&conn, chat_id, None)?;
        rows.into_iter()
            .map(|row| {
                let id = row.id;
                row.into_task(entries.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    /// Get a single task by name
    pub fn get_task(&self, chat_id: ChatId, name: &str) -> DbResult<TaskItem> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT id, name, due_date, importance, description
                 FROM tasks WHERE chat_id = ?1 AND name = ?2",
                params![chat_id.0, name],
                parse_task_row,
            )
            .optional()?
            .ok_or_else(|| StoreError::TaskNotFound(name.to_string()))?;

        let mut entries = load_entries(&conn, chat_id, Some(row.id))?;
        let id = row.id;
        row.into_task(entries.remove(&id).unwrap_or_default())
    }

    /// Delete a task (entries are deleted by CASCADE)
    pub fn remove_task(&self, chat_id: ChatId, name: &str) -> DbResult<()> {
        let conn = self.lock();
        let deleted = conn.execute(
            "DELETE FROM tasks WHERE chat_id = ?1 AND name = ?2",
            params![chat_id.0, name],
        )?;

        if deleted == 0 {
            return Err(StoreError::TaskNotFound(name.to_string()));
        }
        Ok(())
    }

    /// Delete every task of a chat, returning how many were removed
    pub fn remove_all_tasks(&self, chat_id: ChatId) -> DbResult<usize> {
        let conn = self.lock();
        let deleted = conn.execute("DELETE FROM tasks WHERE chat_id = ?1", params![chat_id.0])?;
        Ok(deleted)
    }

    /// Write one detail field: `description` replaces, `comments`/`links` append
    pub fn update_task_details(
        &self,
        chat_id: ChatId,
        name: &str,
        field: TaskField,
        value: &str,
    ) -> DbResult<()> {
        let conn = self.lock();
        let affected = match field {
            TaskField::Description => conn.execute(
                "UPDATE tasks SET description = ?1 WHERE chat_id = ?2 AND name = ?3",
                params![value, chat_id.0, name],
            )?,
            TaskField::Comments | TaskField::Links => conn.execute(
                "INSERT INTO task_entries (task_id, kind, value, created_at)
                 SELECT id, ?1, ?2, ?3 FROM tasks WHERE chat_id = ?4 AND name = ?5",
                params![
                    field.as_str(),
                    value,
                    Utc::now().to_rfc3339(),
                    chat_id.0,
                    name
                ],
            )?,
        };

        if affected == 0 {
            return Err(StoreError::TaskNotFound(name.to_string()));
        }
        Ok(())
    }

    // ==================== Chat Operations ====================

    /// Every chat that has ever stored a task
    pub fn chat_ids(&self) -> DbResult<BTreeSet<ChatId>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT chat_id FROM chats")?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(ids.into_iter().map(ChatId).collect())
    }
}

fn parse_task_row(row: &rusqlite::Row) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        name: row.get(1)?,
        due_date: row.get(2)?,
        importance: row.get(3)?,
        description: row.get(4)?,
    })
}

impl TaskRow {
    fn into_task(self, (comments, links): (Vec<String>, Vec<String>)) -> DbResult<TaskItem> {
        let due_date = NaiveDate::parse_from_str(&self.due_date, DATE_FORMAT)
            .map_err(|e| StoreError::Corrupt(format!("{}: due date {}: {e}", self.name, self.due_date)))?;
        let importance = self
            .importance
            .parse::<Importance>()
            .map_err(|bad| StoreError::Corrupt(format!("{}: importance {bad}", self.name)))?;

        Ok(TaskItem {
            name: self.name,
            due_date,
            importance,
            description: self.description,
            comments,
            links,
        })
    }
}

/// Comments and links per task id, in insertion order
fn load_entries(
    conn: &Connection,
    chat_id: ChatId,
    task_id: Option<i64>,
) -> DbResult<HashMap<i64, (Vec<String>, Vec<String>)>> {
    let mut stmt = conn.prepare(
        "SELECT e.task_id, e.kind, e.value
         FROM task_entries e JOIN tasks t ON t.id = e.task_id
         WHERE t.chat_id = ?1 AND (?2 IS NULL OR e.task_id = ?2)
         ORDER BY e.id ASC",
    )?;
    let rows = stmt.query_map(params![chat_id.0, task_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;

    let mut entries: HashMap<i64, (Vec<String>, Vec<String>)> = HashMap::new();
    for row in rows {
        let (id, kind, value) = row?;
        let slot = entries.entry(id).or_default();
        match kind.parse::<TaskField>() {
            Ok(TaskField::Comments) => slot.0.push(value),
            Ok(TaskField::Links) => slot.1.push(value),
            _ => return Err(StoreError::Corrupt(format!("entry kind {kind}"))),
        }
    }
    Ok(entries)
}
