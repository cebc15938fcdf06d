//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Task time log.
///
/// Records which task you are working on, lets you fix the record after the
/// fact, and summarizes where the time went.
#[derive(Debug, Parser)]
#[command(name = "tl", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage tasks.
    #[command(subcommand)]
    Task(TaskAction),

    /// Manage tags.
    #[command(subcommand)]
    Tag(TagAction),

    /// Start working on a task, stopping the current one.
    Start {
        /// Task to start (defaults to the most recently created task).
        task: Option<String>,

        /// When work started (defaults to now).
        #[arg(long)]
        at: Option<String>,
    },

    /// Stop the current task.
    Stop {
        /// When work stopped (defaults to now).
        #[arg(long, conflicts_with = "at_last_seen")]
        at: Option<String>,

        /// Stop at the last heartbeat checkpoint (after a crash).
        #[arg(long)]
        at_last_seen: bool,
    },

    /// Go back to the previous task.
    Resume {
        /// When work resumed (defaults to now).
        #[arg(long)]
        at: Option<String>,
    },

    /// Show the current and previous task.
    Status,

    /// List log entries.
    Entries {
        #[command(flatten)]
        filter: FilterArgs,

        /// Only show entries at least `long_entry_hours` long.
        #[arg(long)]
        long: bool,
    },

    /// Inspect or edit a single log entry.
    #[command(subcommand)]
    Entry(EntryAction),

    /// Write or read diary notes.
    #[command(subcommand)]
    Diary(DiaryAction),

    /// Manage todo items.
    #[command(subcommand)]
    Todo(TodoAction),

    /// Summarize tracked time.
    Report {
        /// What to summarize.
        #[arg(value_enum, default_value_t = ReportKind::Totals)]
        kind: ReportKind,

        #[command(flatten)]
        filter: FilterArgs,

        /// Group by tag instead of task.
        #[arg(long)]
        by_tag: bool,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Manage named instants usable wherever a time is accepted.
    #[command(subcommand)]
    Bookmark(BookmarkAction),

    /// Keep the heartbeat running in the foreground until interrupted.
    Track,
}

#[derive(Debug, Subcommand)]
pub enum TaskAction {
    /// Create a task.
    Add { name: String },
    /// Delete a task and all of its records.
    Rm { name: String },
    /// Rename a task.
    Rename { from: String, to: String },
    /// List tasks with their tags.
    List,
    /// Attach a tag to a task.
    Tag { task: String, tag: String },
    /// Detach a tag from a task.
    Untag { task: String, tag: String },
}

#[derive(Debug, Subcommand)]
pub enum TagAction {
    /// Create a tag.
    Add { name: String },
    /// Delete a tag (tasks are kept).
    Rm { name: String },
    /// Rename a tag.
    Rename { from: String, to: String },
    /// List tags with their tasks.
    List,
}

#[derive(Debug, Subcommand)]
pub enum EntryAction {
    /// Show an entry.
    Show { id: i64 },
    /// Move an entry's start.
    SetStart { id: i64, at: String },
    /// Move an entry's end.
    SetEnd { id: i64, at: String },
    /// Reassign an entry to another task.
    SetTask { id: i64, task: String },
}

#[derive(Debug, Subcommand)]
pub enum DiaryAction {
    /// Add a note to the current task.
    Add { text: String },
    /// Show diary notes.
    Show {
        #[command(flatten)]
        filter: FilterArgs,

        /// Interleave all tasks' notes chronologically.
        #[arg(long)]
        merge: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum TodoAction {
    /// Add a todo item to a task.
    Add { task: String, text: String },
    /// Mark the pending item with this exact text as done.
    Done { text: String },
    /// List pending items.
    List {
        /// Only items of this task.
        #[arg(long, conflicts_with = "tag")]
        task: Option<String>,

        /// Only items of tasks carrying this tag.
        #[arg(long)]
        tag: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum BookmarkAction {
    /// Store a named instant.
    Set {
        name: String,
        /// The instant to store (defaults to now).
        #[arg(long)]
        at: Option<String>,
    },
    /// List bookmarks.
    List,
    /// Delete a bookmark.
    Rm { name: String },
}

/// Selection shared by listing and reporting commands.
#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// Only these tasks (repeatable).
    #[arg(long = "task")]
    pub tasks: Vec<String>,

    /// Only tasks carrying these tags (repeatable).
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Named period.
    #[arg(long, value_enum, conflicts_with_all = ["from", "to"])]
    pub period: Option<Period>,

    /// Window start (RFC 3339, "N hours ago", HH:MM, "now", or a bookmark).
    #[arg(long)]
    pub from: Option<String>,

    /// Window end, exclusive.
    #[arg(long)]
    pub to: Option<String>,
}

/// Named periods, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Period {
    Today,
    Yesterday,
    Week,
    LastWeek,
}

/// Report type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportKind {
    /// Time per task or tag.
    Totals,
    /// Context switches per task or tag.
    Switches,
}
