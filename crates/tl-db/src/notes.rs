//! Diary entries and todo items.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};

use tl_core::{DiaryEntry, TaskName, TodoItem, TodoScope, ValidationError};

use crate::timeline::EntryFilter;
use crate::{Database, DbError, format_timestamp, normalize, parse_timestamp, tag_id, task_id};

const TODO_SELECT: &str = "
    SELECT d.id, t.name, d.text, d.done, d.created_at, d.completed_at
    FROM todo_items d
    JOIN tasks t ON t.id = d.task_id
";

#[derive(Debug)]
struct TodoRow {
    id: i64,
    task: String,
    text: String,
    done: bool,
    created: String,
    completed_at: Option<String>,
}

impl TodoRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task: row.get(1)?,
            text: row.get(2)?,
            done: row.get(3)?,
            created: row.get(4)?,
            completed_at: row.get(5)?,
        })
    }

    fn into_item(self) -> Result<TodoItem, DbError> {
        let context = format!("todo item {}", self.id);
        Ok(TodoItem {
            id: self.id,
            task: TaskName::new(self.task)?,
            text: self.text,
            done: self.done,
            created: parse_timestamp(&self.created, &context)?,
            completed_at: self
                .completed_at
                .map(|at| parse_timestamp(&at, &context))
                .transpose()?,
        })
    }
}

fn non_empty(text: &str, field: &'static str) -> Result<String, DbError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ValidationError::Empty { field }.into());
    }
    Ok(text.to_string())
}

fn query_todos(conn: &Connection, condition: &str, args: &[String]) -> Result<Vec<TodoItem>, DbError> {
    let sql = format!("{TODO_SELECT} {condition}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args.iter()), TodoRow::from_row)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?.into_item()?);
    }
    Ok(items)
}

impl Database {
    /// Attaches a note to the current task at `at`.
    pub fn add_diary_entry(&mut self, text: &str, at: DateTime<Utc>) -> Result<DiaryEntry, DbError> {
        let text = non_empty(text, "diary text")?;
        let at = normalize(at);
        let tx = self.write_transaction()?;
        let (task_id, task, start): (i64, String, String) = tx
            .query_row(
                "
                SELECT t.id, t.name, e.start_at
                FROM log_entries e
                JOIN tasks t ON t.id = e.task_id
                WHERE e.end_at IS NULL
                ",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?
            .ok_or(DbError::NoCurrentTask)?;
        let start = parse_timestamp(&start, "log entry start")?;
        if at < start {
            return Err(DbError::OrderingViolation(format!(
                "cannot note {task} at {at}: it only became current at {start}"
            )));
        }
        tx.execute(
            "INSERT INTO diary_entries (task_id, timestamp, text) VALUES (?, ?, ?)",
            params![task_id, format_timestamp(at), text],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::debug!(task = %task, entry = id, "diary entry added");
        Ok(DiaryEntry {
            id,
            timestamp: at,
            task: TaskName::new(task)?,
            text,
        })
    }

    /// Lists diary entries matching `filter`, ordered by timestamp.
    ///
    /// A note matches the window when its timestamp falls inside it.
    pub fn diary_entries(&self, filter: &EntryFilter) -> Result<Vec<DiaryEntry>, DbError> {
        let mut clauses = Vec::new();
        let mut args = Vec::new();
        filter.push_membership(&self.conn, "d.task_id", &mut clauses, &mut args)?;
        if let Some(start) = filter.window.start {
            clauses.push("d.timestamp >= ?".to_string());
            args.push(format_timestamp(start));
        }
        if let Some(end) = filter.window.end {
            clauses.push("d.timestamp < ?".to_string());
            args.push(format_timestamp(end));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "
            SELECT d.id, t.name, d.timestamp, d.text
            FROM diary_entries d
            JOIN tasks t ON t.id = d.task_id
            {where_clause}
            ORDER BY d.timestamp ASC, d.id ASC
            "
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut entries = Vec::new();
        for row in rows {
            let (id, task, timestamp, text) = row?;
            entries.push(DiaryEntry {
                id,
                timestamp: parse_timestamp(&timestamp, &format!("diary entry {id}"))?,
                task: TaskName::new(task)?,
                text,
            });
        }
        Ok(entries)
    }

    /// Adds a pending todo item to a task.
    pub fn add_todo(
        &mut self,
        task: &TaskName,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<TodoItem, DbError> {
        let text = non_empty(text, "todo text")?;
        let at = normalize(at);
        let tx = self.write_transaction()?;
        let task_id = task_id(&tx, task)?;
        tx.execute(
            "INSERT INTO todo_items (task_id, text, done, created_at) VALUES (?, ?, 0, ?)",
            params![task_id, text, format_timestamp(at)],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::debug!(task = %task, todo = id, "todo added");
        Ok(TodoItem {
            id,
            task: task.clone(),
            text,
            done: false,
            created: at,
            completed_at: None,
        })
    }

    /// Marks the pending item whose text equals `text` as done.
    ///
    /// Matching is exact after trimming. When several pending items share the
    /// text, the earliest created one is completed.
    pub fn complete_todo(&mut self, text: &str, at: DateTime<Utc>) -> Result<TodoItem, DbError> {
        let wanted = text.trim();
        let at = normalize(at);
        let tx = self.write_transaction()?;
        let mut item = query_todos(
            &tx,
            "WHERE d.done = 0 AND d.text = ? ORDER BY d.created_at ASC, d.id ASC LIMIT 1",
            &[wanted.to_string()],
        )?
        .into_iter()
        .next()
        .ok_or_else(|| DbError::TodoNotFound(wanted.to_string()))?;

        tx.execute(
            "UPDATE todo_items SET done = 1, completed_at = ? WHERE id = ?",
            params![format_timestamp(at), item.id],
        )?;
        tx.commit()?;

        tracing::debug!(task = %item.task, todo = item.id, "todo completed");
        item.done = true;
        item.completed_at = Some(at);
        Ok(item)
    }

    /// Lists pending todo items in creation order.
    pub fn pending_todos(&self, scope: &TodoScope) -> Result<Vec<TodoItem>, DbError> {
        match scope {
            TodoScope::AnyPending => query_todos(
                &self.conn,
                "WHERE d.done = 0 ORDER BY d.created_at ASC, d.id ASC",
                &[],
            ),
            TodoScope::Task(task) => {
                let task_id = task_id(&self.conn, task)?;
                query_todos(
                    &self.conn,
                    "WHERE d.done = 0 AND d.task_id = ? ORDER BY d.created_at ASC, d.id ASC",
                    &[task_id.to_string()],
                )
            }
            TodoScope::Tag(tag) => {
                let tag_id = tag_id(&self.conn, tag)?;
                query_todos(
                    &self.conn,
                    "WHERE d.done = 0
                       AND d.task_id IN (SELECT task_id FROM task_tags WHERE tag_id = ?)
                     ORDER BY d.created_at ASC, d.id ASC",
                    &[tag_id.to_string()],
                )
            }
        }
    }

    /// Lists every todo item of a task, done or not.
    pub fn todos_of(&self, task: &TaskName) -> Result<Vec<TodoItem>, DbError> {
        let task_id = task_id(&self.conn, task)?;
        query_todos(
            &self.conn,
            "WHERE d.task_id = ? ORDER BY d.created_at ASC, d.id ASC",
            &[task_id.to_string()],
        )
    }
}
