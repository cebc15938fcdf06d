//! Log entries and the running/stopped task state machine.
//!
//! The current task is never stored on its own: it is the task of the single
//! entry whose `end_at` is NULL. Every mutation re-checks the ordering
//! invariant inside its transaction before writing:
//! for entries `a` and `b`, `a.start <= b.start` implies `a.end <= b.start`.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use tl_core::{EntryId, LogEntry, TagName, TaskName, TimeWindow};

use crate::{
    Database, DbError, format_timestamp, normalize, parse_timestamp, tag_id, task_id,
};

const ENTRY_SELECT: &str = "
    SELECT e.id, t.name, e.start_at, e.end_at, e.last_seen
    FROM log_entries e
    JOIN tasks t ON t.id = e.task_id
";

/// Restricts which entries (and diary notes) a query returns.
///
/// Task and tag filters combine: an entry must belong to one of the listed
/// tasks and to a task carrying one of the listed tags. Empty lists do not
/// filter.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub tasks: Vec<TaskName>,
    pub tags: Vec<TagName>,
    pub window: TimeWindow,
}

impl EntryFilter {
    /// Appends the task/tag conditions for `column` to `clauses`, validating names.
    pub(crate) fn push_membership(
        &self,
        conn: &Connection,
        column: &str,
        clauses: &mut Vec<String>,
        args: &mut Vec<String>,
    ) -> Result<(), DbError> {
        if !self.tasks.is_empty() {
            for task in &self.tasks {
                task_id(conn, task)?;
            }
            let placeholders = vec!["?"; self.tasks.len()].join(", ");
            clauses.push(format!(
                "{column} IN (SELECT id FROM tasks WHERE name IN ({placeholders}))"
            ));
            args.extend(self.tasks.iter().map(ToString::to_string));
        }
        if !self.tags.is_empty() {
            for tag in &self.tags {
                tag_id(conn, tag)?;
            }
            let placeholders = vec!["?"; self.tags.len()].join(", ");
            clauses.push(format!(
                "{column} IN (
                    SELECT tt.task_id FROM task_tags tt
                    JOIN tags g ON g.id = tt.tag_id
                    WHERE g.name IN ({placeholders})
                )"
            ));
            args.extend(self.tags.iter().map(ToString::to_string));
        }
        Ok(())
    }
}

#[derive(Debug)]
struct EntryRow {
    id: i64,
    task: String,
    start: String,
    end: Option<String>,
    last_seen: Option<String>,
}

impl EntryRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task: row.get(1)?,
            start: row.get(2)?,
            end: row.get(3)?,
            last_seen: row.get(4)?,
        })
    }

    fn into_entry(self) -> Result<LogEntry, DbError> {
        let context = format!("log entry {}", self.id);
        Ok(LogEntry {
            id: EntryId::new(self.id),
            task: TaskName::new(self.task)?,
            start: parse_timestamp(&self.start, &context)?,
            end: self
                .end
                .map(|end| parse_timestamp(&end, &context))
                .transpose()?,
            last_seen: self
                .last_seen
                .map(|seen| parse_timestamp(&seen, &context))
                .transpose()?,
        })
    }
}

fn query_entry(
    conn: &Connection,
    condition: &str,
    args: &[String],
) -> Result<Option<LogEntry>, DbError> {
    let sql = format!("{ENTRY_SELECT} {condition}");
    let row = conn
        .query_row(&sql, params_from_iter(args.iter()), EntryRow::from_row)
        .optional()?;
    row.map(EntryRow::into_entry).transpose()
}

fn open_entry(conn: &Connection) -> Result<Option<LogEntry>, DbError> {
    query_entry(conn, "WHERE e.end_at IS NULL", &[])
}

fn find_entry(conn: &Connection, id: EntryId) -> Result<LogEntry, DbError> {
    query_entry(conn, "WHERE e.id = ?", &[id.get().to_string()])?
        .ok_or(DbError::EntryNotFound(id))
}

/// Entry immediately before `entry` in (start, id) order.
fn preceding_entry(conn: &Connection, entry: &LogEntry) -> Result<Option<LogEntry>, DbError> {
    let start = format_timestamp(entry.start);
    query_entry(
        conn,
        "WHERE e.start_at < ?1 OR (e.start_at = ?1 AND e.id < ?2)
         ORDER BY e.start_at DESC, e.id DESC LIMIT 1",
        &[start, entry.id.get().to_string()],
    )
}

/// Entry immediately after `entry` in (start, id) order.
fn following_entry(conn: &Connection, entry: &LogEntry) -> Result<Option<LogEntry>, DbError> {
    let start = format_timestamp(entry.start);
    query_entry(
        conn,
        "WHERE e.start_at > ?1 OR (e.start_at = ?1 AND e.id > ?2)
         ORDER BY e.start_at ASC, e.id ASC LIMIT 1",
        &[start, entry.id.get().to_string()],
    )
}

/// Latest instant already claimed by the timeline.
///
/// Closed entries claim up to their end. The open entry claims only its start,
/// since starting a new task closes it at the new start.
fn timeline_tail(conn: &Connection) -> Result<Option<DateTime<Utc>>, DbError> {
    let tail: Option<String> = conn.query_row(
        "SELECT MAX(COALESCE(end_at, start_at)) FROM log_entries",
        [],
        |row| row.get(0),
    )?;
    tail.map(|tail| parse_timestamp(&tail, "timeline tail"))
        .transpose()
}

impl Database {
    /// Starts `task` at `at`, closing the current entry at the same instant.
    ///
    /// Fails if `at` precedes any part of the recorded timeline.
    pub fn start(&mut self, task: &TaskName, at: DateTime<Utc>) -> Result<EntryId, DbError> {
        let at = normalize(at);
        let tx = self.write_transaction()?;
        let task_id = task_id(&tx, task)?;

        if let Some(tail) = timeline_tail(&tx)? {
            if at < tail {
                return Err(DbError::OrderingViolation(format!(
                    "cannot start {task} at {at}: timeline already extends to {tail}"
                )));
            }
        }

        let at_text = format_timestamp(at);
        let closed = tx.execute(
            "UPDATE log_entries SET end_at = ? WHERE end_at IS NULL",
            [&at_text],
        )?;
        tx.execute(
            "INSERT INTO log_entries (task_id, start_at) VALUES (?, ?)",
            params![task_id, at_text],
        )?;
        let id = EntryId::new(tx.last_insert_rowid());
        tx.commit()?;

        tracing::debug!(task = %task, at = %at, entry = %id, closed_previous = closed > 0, "task started");
        Ok(id)
    }

    /// Stops the current task at `at` and returns the closed entry.
    pub fn stop(&mut self, at: DateTime<Utc>) -> Result<LogEntry, DbError> {
        let at = normalize(at);
        let tx = self.write_transaction()?;
        let mut entry = open_entry(&tx)?.ok_or(DbError::NoCurrentTask)?;
        if at < entry.start {
            return Err(DbError::OrderingViolation(format!(
                "cannot stop {} at {at}: it started at {}",
                entry.task, entry.start
            )));
        }
        tx.execute(
            "UPDATE log_entries SET end_at = ? WHERE id = ?",
            params![format_timestamp(at), entry.id.get()],
        )?;
        tx.commit()?;

        tracing::debug!(task = %entry.task, at = %at, entry = %entry.id, "task stopped");
        entry.end = Some(at);
        Ok(entry)
    }

    /// Stops the current task at its last heartbeat checkpoint.
    ///
    /// Used after an unclean exit left an entry running. Falls back to the
    /// entry's start when no checkpoint was ever written.
    pub fn stop_at_last_seen(&mut self) -> Result<LogEntry, DbError> {
        let entry = open_entry(&self.conn)?.ok_or(DbError::NoCurrentTask)?;
        let at = entry.last_seen.unwrap_or(entry.start).max(entry.start);
        self.stop(at)
    }

    /// Starts the previous task again.
    pub fn resume(&mut self, at: DateTime<Utc>) -> Result<(TaskName, EntryId), DbError> {
        let task = self.previous()?.ok_or(DbError::NoPreviousTask)?;
        let id = self.start(&task, at)?;
        Ok((task, id))
    }

    /// The open entry, if any.
    pub fn current_entry(&self) -> Result<Option<LogEntry>, DbError> {
        open_entry(&self.conn)
    }

    /// The task of the open entry, if any.
    pub fn current(&self) -> Result<Option<TaskName>, DbError> {
        Ok(self.current_entry()?.map(|entry| entry.task))
    }

    /// Start of the open entry.
    pub fn current_start(&self) -> Result<DateTime<Utc>, DbError> {
        self.current_entry()?
            .map(|entry| entry.start)
            .ok_or(DbError::NoCurrentTask)
    }

    /// Last heartbeat checkpoint of the open entry.
    pub fn current_last_seen(&self) -> Result<Option<DateTime<Utc>>, DbError> {
        Ok(self.current_entry()?.and_then(|entry| entry.last_seen))
    }

    /// Most recently started closed entry whose task differs from the current one.
    fn previous_entry(&self) -> Result<Option<LogEntry>, DbError> {
        match self.current_entry()? {
            Some(current) => query_entry(
                &self.conn,
                "WHERE e.end_at IS NOT NULL AND t.name <> ?
                 ORDER BY e.start_at DESC, e.id DESC LIMIT 1",
                &[current.task.to_string()],
            ),
            None => query_entry(
                &self.conn,
                "WHERE e.end_at IS NOT NULL ORDER BY e.start_at DESC, e.id DESC LIMIT 1",
                &[],
            ),
        }
    }

    /// The task to return to with [`Database::resume`].
    pub fn previous(&self) -> Result<Option<TaskName>, DbError> {
        Ok(self.previous_entry()?.map(|entry| entry.task))
    }

    /// The previous task with the duration of that single entry.
    pub fn previous_with_duration(&self) -> Result<Option<(TaskName, Duration)>, DbError> {
        Ok(self.previous_entry()?.map(|entry| {
            let duration = entry.end.map_or_else(Duration::zero, |end| end - entry.start);
            (entry.task, duration)
        }))
    }

    /// Looks up an entry by ID.
    pub fn entry(&self, id: EntryId) -> Result<LogEntry, DbError> {
        find_entry(&self.conn, id)
    }

    /// Moves the start of an entry.
    ///
    /// The new start must not precede the end of the entry before it and
    /// must not pass the entry's own end.
    pub fn set_entry_start(&mut self, id: EntryId, start: DateTime<Utc>) -> Result<(), DbError> {
        let start = normalize(start);
        let tx = self.write_transaction()?;
        let entry = find_entry(&tx, id)?;

        if let Some(end) = entry.end {
            if start > end {
                return Err(DbError::OrderingViolation(format!(
                    "entry {id} would start at {start} after its end {end}"
                )));
            }
        }
        if let Some(prev) = preceding_entry(&tx, &entry)? {
            match prev.end {
                Some(prev_end) if start >= prev_end => {}
                Some(prev_end) => {
                    return Err(DbError::OrderingViolation(format!(
                        "entry {id} would start at {start}, overlapping entry {} which ends at {prev_end}",
                        prev.id
                    )));
                }
                None => {
                    return Err(DbError::OrderingViolation(format!(
                        "entry {} before entry {id} is still open",
                        prev.id
                    )));
                }
            }
        }

        tx.execute(
            "UPDATE log_entries SET start_at = ? WHERE id = ?",
            params![format_timestamp(start), id.get()],
        )?;
        tx.commit()?;
        tracing::debug!(entry = %id, start = %start, "entry start edited");
        Ok(())
    }

    /// Moves (or sets) the end of an entry.
    ///
    /// The new end must not precede the entry's start and must not pass the
    /// start of the entry after it. Setting the end of the open entry stops it.
    pub fn set_entry_end(&mut self, id: EntryId, end: DateTime<Utc>) -> Result<(), DbError> {
        let end = normalize(end);
        let tx = self.write_transaction()?;
        let entry = find_entry(&tx, id)?;

        if end < entry.start {
            return Err(DbError::OrderingViolation(format!(
                "entry {id} would end at {end} before its start {}",
                entry.start
            )));
        }
        if let Some(next) = following_entry(&tx, &entry)? {
            if end > next.start {
                return Err(DbError::OrderingViolation(format!(
                    "entry {id} would end at {end}, overlapping entry {} which starts at {}",
                    next.id, next.start
                )));
            }
        }

        tx.execute(
            "UPDATE log_entries SET end_at = ? WHERE id = ?",
            params![format_timestamp(end), id.get()],
        )?;
        tx.commit()?;
        tracing::debug!(entry = %id, end = %end, "entry end edited");
        Ok(())
    }

    /// Reassigns an entry to another task.
    pub fn set_entry_task(&mut self, id: EntryId, task: &TaskName) -> Result<(), DbError> {
        let tx = self.write_transaction()?;
        find_entry(&tx, id)?;
        let task_id = task_id(&tx, task)?;
        tx.execute(
            "UPDATE log_entries SET task_id = ? WHERE id = ?",
            params![task_id, id.get()],
        )?;
        tx.commit()?;
        tracing::debug!(entry = %id, task = %task, "entry task edited");
        Ok(())
    }

    /// Lists entries matching `filter`, ordered by start then ID.
    ///
    /// An entry is included when its interval intersects the filter window.
    pub fn entries(&self, filter: &EntryFilter) -> Result<Vec<LogEntry>, DbError> {
        let mut clauses = Vec::new();
        let mut args = Vec::new();
        filter.push_membership(&self.conn, "e.task_id", &mut clauses, &mut args)?;

        if let Some(end) = filter.window.end {
            clauses.push("e.start_at < ?".to_string());
            args.push(format_timestamp(end));
        }
        if let Some(start) = filter.window.start {
            let start = format_timestamp(start);
            clauses.push("(e.end_at IS NULL OR e.end_at > ? OR e.start_at >= ?)".to_string());
            args.push(start.clone());
            args.push(start);
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!("{ENTRY_SELECT} {where_clause} ORDER BY e.start_at ASC, e.id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), EntryRow::from_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }

    /// Records a liveness checkpoint on the open entry.
    ///
    /// Returns false when no task is current. Repeating a checkpoint is harmless.
    pub fn checkpoint(&mut self, now: DateTime<Utc>) -> Result<bool, DbError> {
        let updated = self.conn.execute(
            "UPDATE log_entries SET last_seen = ? WHERE end_at IS NULL",
            [format_timestamp(normalize(now))],
        )?;
        Ok(updated > 0)
    }
}
