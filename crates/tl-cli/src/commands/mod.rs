//! CLI subcommand implementations.

pub mod bookmark;
pub mod diary;
pub mod entries;
pub mod report;
pub mod tag;
pub mod task;
pub mod timer;
pub mod todo;
pub mod track;
pub mod util;
