//! Task time log CLI library.
//!
//! This crate provides the CLI interface for the task time log.

mod cli;
pub mod commands;
mod config;

pub use cli::{
    BookmarkAction, Cli, Commands, DiaryAction, EntryAction, FilterArgs, Period, ReportKind,
    TagAction, TaskAction, TodoAction,
};
pub use config::Config;
