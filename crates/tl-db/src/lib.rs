//! Storage layer for the task time log.
//!
//! Provides persistence for tasks, tags, log entries, diary entries, todo
//! items and the info table using `rusqlite`, and enforces the timeline
//! invariants on every mutation.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! Shared access goes through [`SharedDatabase`], which serializes the command path
//! and the [`Heartbeat`] worker behind a single mutex. Reads take the same lock so an
//! implicit task switch (close one entry, open the next) is never observed half-done.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). This format ensures:
//! - Lexicographic ordering matches chronological ordering
//! - Human-readable values in the database
//! - Timezone-aware (always UTC)
//!
//! ## Info Table
//!
//! The `info` table is a flat key/value store. It carries the `schema_version`
//! marker and one row per bookmark, keyed `<name>.bookmark`.

mod heartbeat;
mod notes;
mod shared;
mod timeline;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use thiserror::Error;

use tl_core::{BookmarkName, EntryId, TagIndex, TagName, TaskName, ValidationError};

pub use heartbeat::{DEFAULT_INTERVAL, Heartbeat};
pub use shared::SharedDatabase;
pub use timeline::EntryFilter;

/// Schema version written by this code.
pub const SCHEMA_VERSION: i64 = 1;

/// Info key holding the schema version.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Reserved suffix marking bookmark keys in the info table.
pub const BOOKMARK_SUFFIX: &str = ".bookmark";

/// How long a write waits for another connection to release the database.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored or supplied value failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {context}: {timestamp}")]
    TimestampParse {
        context: String,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// The database was written by a newer version.
    #[error("unsupported schema version {found} (this build supports up to {supported})")]
    UnsupportedSchema { found: i64, supported: i64 },
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("tag not found: {0}")]
    TagNotFound(String),
    #[error("entry not found: {0}")]
    EntryNotFound(EntryId),
    #[error("no pending todo matches: {0}")]
    TodoNotFound(String),
    #[error("bookmark not found: {0}")]
    BookmarkNotFound(String),
    #[error("task already exists: {0}")]
    DuplicateTask(String),
    #[error("tag already exists: {0}")]
    DuplicateTag(String),
    /// An operation needed a current task and none is running.
    #[error("no task is currently running")]
    NoCurrentTask,
    /// Resume was requested with no earlier task to return to.
    #[error("no previous task to resume")]
    NoPreviousTask,
    /// The mutation would create overlapping or inverted intervals.
    #[error("ordering violation: {0}")]
    OrderingViolation(String),
}

/// Broad classification of [`DbError`] for callers that render or branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Duplicate,
    InvalidState,
    OrderingViolation,
    Invalid,
    Storage,
}

impl DbError {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::TaskNotFound(_)
            | Self::TagNotFound(_)
            | Self::EntryNotFound(_)
            | Self::TodoNotFound(_)
            | Self::BookmarkNotFound(_) => ErrorKind::NotFound,
            Self::DuplicateTask(_) | Self::DuplicateTag(_) => ErrorKind::Duplicate,
            Self::NoCurrentTask | Self::NoPreviousTask => ErrorKind::InvalidState,
            Self::OrderingViolation(_) => ErrorKind::OrderingViolation,
            Self::Validation(_) => ErrorKind::Invalid,
            Self::Sqlite(_) | Self::TimestampParse { .. } | Self::UnsupportedSchema { .. } => {
                ErrorKind::Storage
            }
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Begins a transaction that holds the write lock from its first statement.
    ///
    /// Checks and writes then see the same state even when another process
    /// (such as a running `tl track`) shares the file; contention waits on the
    /// busy timeout instead of failing on a lock upgrade.
    fn write_transaction(&mut self) -> Result<Transaction<'_>, DbError> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS info (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS task_tags (
                task_id INTEGER NOT NULL,
                tag_id INTEGER NOT NULL,
                PRIMARY KEY (task_id, tag_id),
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE,
                FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_task_tags_tag ON task_tags(tag_id);

            -- Log entries: at most one row has end_at NULL (the current task)
            -- start_at/end_at/last_seen: ISO 8601 format (e.g., '2024-01-15T10:30:00.000Z')
            CREATE TABLE IF NOT EXISTS log_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                start_at TEXT NOT NULL,
                end_at TEXT,
                last_seen TEXT,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_log_entries_start ON log_entries(start_at);
            CREATE INDEX IF NOT EXISTS idx_log_entries_task ON log_entries(task_id);

            CREATE TABLE IF NOT EXISTS diary_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                text TEXT NOT NULL,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_diary_entries_timestamp ON diary_entries(timestamp);

            CREATE TABLE IF NOT EXISTS todo_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                text TEXT NOT NULL,
                done INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                completed_at TEXT,
                FOREIGN KEY (task_id) REFERENCES tasks(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_todo_items_pending ON todo_items(done, created_at);
            ",
        )?;

        let version: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM info WHERE key = ?",
                [SCHEMA_VERSION_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match version.as_deref().map(str::parse::<i64>) {
            None => {
                self.conn.execute(
                    "INSERT INTO info (key, value) VALUES (?, ?)",
                    params![SCHEMA_VERSION_KEY, SCHEMA_VERSION.to_string()],
                )?;
            }
            Some(Ok(found)) if found > SCHEMA_VERSION => {
                return Err(DbError::UnsupportedSchema {
                    found,
                    supported: SCHEMA_VERSION,
                });
            }
            Some(Ok(_)) => {}
            Some(Err(_)) => {
                return Err(DbError::UnsupportedSchema {
                    found: -1,
                    supported: SCHEMA_VERSION,
                });
            }
        }
        Ok(())
    }

    // ========== Tasks ==========

    /// Creates a task.
    pub fn add_task(&mut self, name: &TaskName) -> Result<(), DbError> {
        let tx = self.write_transaction()?;
        if find_task_id(&tx, name)?.is_some() {
            return Err(DbError::DuplicateTask(name.to_string()));
        }
        tx.execute(
            "INSERT INTO tasks (name, created_at) VALUES (?, ?)",
            params![name.as_str(), format_timestamp(Utc::now())],
        )?;
        tx.commit()?;
        tracing::debug!(task = %name, "task created");
        Ok(())
    }

    /// Deletes a task with its tag associations and all log, diary, and todo records.
    pub fn remove_task(&mut self, name: &TaskName) -> Result<(), DbError> {
        let tx = self.write_transaction()?;
        let task_id = task_id(&tx, name)?;
        tx.execute("DELETE FROM tasks WHERE id = ?", [task_id])?;
        tx.commit()?;
        tracing::debug!(task = %name, "task removed");
        Ok(())
    }

    /// Renames a task, keeping every association.
    pub fn rename_task(&mut self, from: &TaskName, to: &TaskName) -> Result<(), DbError> {
        let tx = self.write_transaction()?;
        let task_id = task_id(&tx, from)?;
        if find_task_id(&tx, to)?.is_some() {
            return Err(DbError::DuplicateTask(to.to_string()));
        }
        tx.execute(
            "UPDATE tasks SET name = ? WHERE id = ?",
            params![to.as_str(), task_id],
        )?;
        tx.commit()?;
        tracing::debug!(from = %from, to = %to, "task renamed");
        Ok(())
    }

    /// Returns true if the task exists.
    pub fn task_exists(&self, name: &TaskName) -> Result<bool, DbError> {
        Ok(find_task_id(&self.conn, name)?.is_some())
    }

    /// Lists task names alphabetically.
    pub fn list_tasks(&self) -> Result<Vec<TaskName>, DbError> {
        let mut stmt = self.conn.prepare("SELECT name FROM tasks ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(TaskName::new(row?)?);
        }
        Ok(tasks)
    }

    /// The most recently created task, used when `start` is given no task.
    pub fn last_created_task(&self) -> Result<Option<TaskName>, DbError> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM tasks ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.map(TaskName::new).transpose()?)
    }

    // ========== Tags ==========

    /// Creates a tag.
    pub fn add_tag(&mut self, name: &TagName) -> Result<(), DbError> {
        let tx = self.write_transaction()?;
        if find_tag_id(&tx, name)?.is_some() {
            return Err(DbError::DuplicateTag(name.to_string()));
        }
        tx.execute("INSERT INTO tags (name) VALUES (?)", [name.as_str()])?;
        tx.commit()?;
        tracing::debug!(tag = %name, "tag created");
        Ok(())
    }

    /// Deletes a tag, detaching it from every task. Tasks are left intact.
    pub fn remove_tag(&mut self, name: &TagName) -> Result<(), DbError> {
        let tx = self.write_transaction()?;
        let tag_id = tag_id(&tx, name)?;
        tx.execute("DELETE FROM tags WHERE id = ?", [tag_id])?;
        tx.commit()?;
        tracing::debug!(tag = %name, "tag removed");
        Ok(())
    }

    /// Renames a tag, keeping its task associations.
    pub fn rename_tag(&mut self, from: &TagName, to: &TagName) -> Result<(), DbError> {
        let tx = self.write_transaction()?;
        let tag_id = tag_id(&tx, from)?;
        if find_tag_id(&tx, to)?.is_some() {
            return Err(DbError::DuplicateTag(to.to_string()));
        }
        tx.execute(
            "UPDATE tags SET name = ? WHERE id = ?",
            params![to.as_str(), tag_id],
        )?;
        tx.commit()?;
        tracing::debug!(from = %from, to = %to, "tag renamed");
        Ok(())
    }

    /// Lists tag names alphabetically.
    pub fn list_tags(&self) -> Result<Vec<TagName>, DbError> {
        let mut stmt = self.conn.prepare("SELECT name FROM tags ORDER BY name ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(TagName::new(row?)?);
        }
        Ok(tags)
    }

    /// Attaches a tag to a task, ignoring an existing association.
    pub fn tag_task(&mut self, task: &TaskName, tag: &TagName) -> Result<(), DbError> {
        let tx = self.write_transaction()?;
        let task_id = task_id(&tx, task)?;
        let tag_id = tag_id(&tx, tag)?;
        tx.execute(
            "INSERT OR IGNORE INTO task_tags (task_id, tag_id) VALUES (?, ?)",
            params![task_id, tag_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Detaches a tag from a task. Returns false if they were not associated.
    pub fn untag_task(&mut self, task: &TaskName, tag: &TagName) -> Result<bool, DbError> {
        let tx = self.write_transaction()?;
        let task_id = task_id(&tx, task)?;
        let tag_id = tag_id(&tx, tag)?;
        let removed = tx.execute(
            "DELETE FROM task_tags WHERE task_id = ? AND tag_id = ?",
            params![task_id, tag_id],
        )?;
        tx.commit()?;
        Ok(removed > 0)
    }

    /// Tags of a task, alphabetically.
    pub fn tags_of(&self, task: &TaskName) -> Result<Vec<TagName>, DbError> {
        let task_id = task_id(&self.conn, task)?;
        let mut stmt = self.conn.prepare(
            "
            SELECT g.name
            FROM task_tags tt
            JOIN tags g ON g.id = tt.tag_id
            WHERE tt.task_id = ?
            ORDER BY g.name ASC
            ",
        )?;
        let rows = stmt.query_map([task_id], |row| row.get::<_, String>(0))?;
        let mut tags = Vec::new();
        for row in rows {
            tags.push(TagName::new(row?)?);
        }
        Ok(tags)
    }

    /// Tasks carrying a tag, alphabetically.
    pub fn tasks_with_tag(&self, tag: &TagName) -> Result<Vec<TaskName>, DbError> {
        let tag_id = tag_id(&self.conn, tag)?;
        let mut stmt = self.conn.prepare(
            "
            SELECT t.name
            FROM task_tags tt
            JOIN tasks t ON t.id = tt.task_id
            WHERE tt.tag_id = ?
            ORDER BY t.name ASC
            ",
        )?;
        let rows = stmt.query_map([tag_id], |row| row.get::<_, String>(0))?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(TaskName::new(row?)?);
        }
        Ok(tasks)
    }

    /// Tags for every tagged task.
    pub fn tag_index(&self) -> Result<TagIndex, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT t.name, g.name
            FROM task_tags tt
            JOIN tasks t ON t.id = tt.task_id
            JOIN tags g ON g.id = tt.tag_id
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            let task: String = row.get(0)?;
            let tag: String = row.get(1)?;
            Ok((task, tag))
        })?;
        let mut index = TagIndex::new();
        for row in rows {
            let (task, tag) = row?;
            index
                .entry(TaskName::new(task)?)
                .or_default()
                .insert(TagName::new(tag)?);
        }
        Ok(index)
    }

    // ========== Info Table ==========

    /// Reads a raw info value.
    pub fn info(&self, key: &str) -> Result<Option<String>, DbError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM info WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// Lists info keys alphabetically.
    pub fn info_keys(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare("SELECT key FROM info ORDER BY key ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }

    /// The schema version recorded in the info table.
    pub fn schema_version(&self) -> Result<i64, DbError> {
        let value = self.info(SCHEMA_VERSION_KEY)?.unwrap_or_default();
        value.parse().map_err(|_| DbError::UnsupportedSchema {
            found: -1,
            supported: SCHEMA_VERSION,
        })
    }

    /// Stores a named instant, replacing any earlier value.
    pub fn set_bookmark(&mut self, name: &BookmarkName, at: DateTime<Utc>) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO info (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![bookmark_key(name), format_timestamp(at)],
        )?;
        tracing::debug!(bookmark = %name, at = %at, "bookmark set");
        Ok(())
    }

    /// Resolves a bookmark to its instant.
    pub fn bookmark(&self, name: &BookmarkName) -> Result<DateTime<Utc>, DbError> {
        let key = bookmark_key(name);
        let value = self
            .info(&key)?
            .ok_or_else(|| DbError::BookmarkNotFound(name.to_string()))?;
        parse_timestamp(&value, &key)
    }

    /// Lists bookmarks by name.
    pub fn bookmarks(&self) -> Result<Vec<(BookmarkName, DateTime<Utc>)>, DbError> {
        let mut bookmarks = Vec::new();
        for key in self.info_keys()? {
            let Some(name) = key.strip_suffix(BOOKMARK_SUFFIX) else {
                continue;
            };
            let name = BookmarkName::new(name)?;
            let at = self.bookmark(&name)?;
            bookmarks.push((name, at));
        }
        Ok(bookmarks)
    }

    /// Deletes a bookmark.
    pub fn remove_bookmark(&mut self, name: &BookmarkName) -> Result<(), DbError> {
        let removed = self
            .conn
            .execute("DELETE FROM info WHERE key = ?", [bookmark_key(name)])?;
        if removed == 0 {
            return Err(DbError::BookmarkNotFound(name.to_string()));
        }
        Ok(())
    }
}

fn bookmark_key(name: &BookmarkName) -> String {
    format!("{name}{BOOKMARK_SUFFIX}")
}

fn find_task_id(conn: &Connection, name: &TaskName) -> Result<Option<i64>, DbError> {
    Ok(conn
        .query_row("SELECT id FROM tasks WHERE name = ?", [name.as_str()], |row| {
            row.get(0)
        })
        .optional()?)
}

fn task_id(conn: &Connection, name: &TaskName) -> Result<i64, DbError> {
    find_task_id(conn, name)?.ok_or_else(|| DbError::TaskNotFound(name.to_string()))
}

fn find_tag_id(conn: &Connection, name: &TagName) -> Result<Option<i64>, DbError> {
    Ok(conn
        .query_row("SELECT id FROM tags WHERE name = ?", [name.as_str()], |row| {
            row.get(0)
        })
        .optional()?)
}

fn tag_id(conn: &Connection, name: &TagName) -> Result<i64, DbError> {
    find_tag_id(conn, name)?.ok_or_else(|| DbError::TagNotFound(name.to_string()))
}

/// Drops sub-millisecond precision so in-memory values match stored ones.
fn normalize(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(3)
}

fn parse_timestamp(timestamp: &str, context: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            context: context.to_string(),
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
