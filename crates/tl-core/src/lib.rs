//! Core domain logic for the task time log.
//!
//! This crate contains the fundamental types and logic for:
//! - Names and identifiers: validated task, tag, and bookmark names
//! - Timeline records: log entries, diary entries, todo items
//! - Summaries: per-task and per-tag totals, context switches, diaries

pub mod entry;
pub mod summary;
pub mod types;
pub mod window;

pub use entry::{DiaryEntry, LogEntry, TodoItem, TodoScope};
pub use summary::{DiaryView, Lens, ListedEntry, SummaryConfig, TagIndex};
pub use types::{BookmarkName, EntryId, TagName, TaskName, ValidationError};
pub use window::TimeWindow;
