//! Timeline records: log entries, diary entries, and todo items.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{EntryId, TagName, TaskName};
use crate::window::TimeWindow;

/// A span of time spent on a single task.
///
/// At most one entry in the store is open (`end = None`); that entry's task is
/// the current task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Store-assigned identifier.
    pub id: EntryId,
    /// The task this time was spent on.
    pub task: TaskName,
    /// When work started.
    pub start: DateTime<Utc>,
    /// When work stopped, or `None` while still running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    /// Most recent liveness checkpoint written while the entry was open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl LogEntry {
    /// Returns true while the entry has no end.
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// The end of the entry, substituting `now` while it is still running.
    pub fn end_or(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.end.unwrap_or(now)
    }

    /// Length of the entry (`end - start`, or `now - start` while open).
    ///
    /// Never negative, even when `now` precedes the start of an open entry.
    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        (self.end_or(now) - self.start).max(Duration::zero())
    }

    /// Portion of the entry that lies inside `window`.
    pub fn clipped_duration(&self, window: &TimeWindow, now: DateTime<Utc>) -> Duration {
        window.clip(self.start, self.end_or(now))
    }
}

/// A free-text note attached to the task that was current when it was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub task: TaskName,
    pub text: String,
}

/// An action item attached to a task.
///
/// Items move one way only, from pending to done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: i64,
    pub task: TaskName,
    pub text: String,
    pub done: bool,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Which pending todo items a query should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoScope {
    /// Every pending item.
    AnyPending,
    /// Pending items of a single task.
    Task(TaskName),
    /// Pending items of every task carrying the tag.
    Tag(TagName),
}
