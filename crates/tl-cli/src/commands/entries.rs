//! Entry commands: list log entries and edit individual entries.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};

use tl_core::summary::entry_listing;
use tl_core::{EntryId, TaskName};
use tl_db::Database;

use super::util::{build_filter, format_duration, format_instant, parse_instant};
use crate::cli::{EntryAction, FilterArgs};

/// Lists entries matching the filter. With `long_floor`, only entries at
/// least that long are shown.
pub fn list<W: Write>(
    writer: &mut W,
    db: &Database,
    args: &FilterArgs,
    long_floor: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<()> {
    let filter = build_filter(db, args, now)?;
    let entries = db.entries(&filter)?;
    let listing = entry_listing(&entries, now, long_floor);

    if listing.is_empty() {
        writeln!(writer, "No entries.")?;
        return Ok(());
    }

    for listed in listing {
        let entry = &listed.entry;
        let end = entry
            .end
            .map_or_else(|| "running".to_string(), format_instant);
        writeln!(
            writer,
            "{:>5}  {}  {:<16}  {:>7}  {}",
            entry.id.get(),
            format_instant(entry.start),
            end,
            format_duration(listed.duration),
            entry.task
        )?;
    }
    Ok(())
}

/// Shows or edits a single entry.
pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    action: &EntryAction,
    now: DateTime<Utc>,
) -> Result<()> {
    match action {
        EntryAction::Show { id } => {
            let entry = db.entry(EntryId::new(*id))?;
            writeln!(writer, "Entry {}", entry.id)?;
            writeln!(writer, "Task:     {}", entry.task)?;
            writeln!(writer, "Start:    {}", format_instant(entry.start))?;
            match entry.end {
                Some(end) => writeln!(writer, "End:      {}", format_instant(end))?,
                None => writeln!(writer, "End:      running")?,
            }
            writeln!(writer, "Duration: {}", format_duration(entry.duration(now)))?;
            if let Some(last_seen) = entry.last_seen {
                writeln!(writer, "Last seen: {}", format_instant(last_seen))?;
            }
        }
        EntryAction::SetStart { id, at } => {
            let at = parse_instant(db, at, now)?;
            db.set_entry_start(EntryId::new(*id), at)?;
            writeln!(writer, "Entry {id} now starts at {}", format_instant(at))?;
        }
        EntryAction::SetEnd { id, at } => {
            let at = parse_instant(db, at, now)?;
            db.set_entry_end(EntryId::new(*id), at)?;
            writeln!(writer, "Entry {id} now ends at {}", format_instant(at))?;
        }
        EntryAction::SetTask { id, task } => {
            let task = TaskName::new(task.as_str())?;
            db.set_entry_task(EntryId::new(*id), &task)?;
            writeln!(writer, "Entry {id} now belongs to {task}")?;
        }
    }
    Ok(())
}
