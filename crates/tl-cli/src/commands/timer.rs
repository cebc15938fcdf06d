//! Timeline commands: start, stop, resume, and status.

use std::io::Write;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use tl_core::TaskName;
use tl_db::Database;

use super::util::{format_duration, format_instant, parse_instant_or_now};

/// Starts a task, defaulting to the most recently created one.
pub fn start<W: Write>(
    writer: &mut W,
    db: &mut Database,
    task: Option<&str>,
    at: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let task = match task {
        Some(task) => TaskName::new(task)?,
        None => match db.last_created_task()? {
            Some(task) => task,
            None => bail!("no tasks yet; create one with `tl task add <name>`"),
        },
    };
    let at = parse_instant_or_now(db, at, now)?;
    let stopped = db.current()?;

    let id = db.start(&task, at)?;
    if let Some(stopped) = stopped {
        writeln!(writer, "Stopped {stopped}")?;
    }
    writeln!(writer, "Started {task} at {} (entry {id})", format_instant(at))?;
    Ok(())
}

/// Stops the current task.
pub fn stop<W: Write>(
    writer: &mut W,
    db: &mut Database,
    at: Option<&str>,
    at_last_seen: bool,
    now: DateTime<Utc>,
) -> Result<()> {
    let entry = if at_last_seen {
        db.stop_at_last_seen()?
    } else {
        let at = parse_instant_or_now(db, at, now)?;
        db.stop(at)?
    };
    writeln!(
        writer,
        "Stopped {} after {}",
        entry.task,
        format_duration(entry.duration(now))
    )?;
    Ok(())
}

/// Returns to the previous task.
pub fn resume<W: Write>(
    writer: &mut W,
    db: &mut Database,
    at: Option<&str>,
    now: DateTime<Utc>,
) -> Result<()> {
    let at = parse_instant_or_now(db, at, now)?;
    let (task, id) = db.resume(at)?;
    writeln!(writer, "Resumed {task} at {} (entry {id})", format_instant(at))?;
    Ok(())
}

/// Shows the current and previous task.
pub fn status<W: Write>(writer: &mut W, db: &Database, now: DateTime<Utc>) -> Result<()> {
    match db.current_entry()? {
        Some(entry) => {
            writeln!(
                writer,
                "Current: {} since {} ({})",
                entry.task,
                format_instant(entry.start),
                format_duration(entry.duration(now))
            )?;
            if let Some(last_seen) = entry.last_seen {
                writeln!(writer, "Last seen: {}", format_instant(last_seen))?;
            }
        }
        None => writeln!(writer, "Current: none")?,
    }

    match db.previous_with_duration()? {
        Some((task, duration)) => {
            writeln!(writer, "Previous: {task} ({})", format_duration(duration))?;
        }
        None => writeln!(writer, "Previous: none")?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn db_with_tasks(names: &[&str]) -> Database {
        let mut db = Database::open_in_memory().unwrap();
        for name in names {
            db.add_task(&TaskName::new(*name).unwrap()).unwrap();
        }
        db
    }

    #[test]
    fn start_defaults_to_latest_task() {
        let mut db = db_with_tasks(&["design", "review"]);
        let mut output = Vec::new();
        start(&mut output, &mut db, None, None, ts("2025-01-01T09:00:00Z")).unwrap();

        assert_eq!(db.current().unwrap().unwrap().as_str(), "review");
        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Started review at "));
    }

    #[test]
    fn start_without_tasks_fails() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        let err = start(&mut output, &mut db, None, None, ts("2025-01-01T09:00:00Z")).unwrap_err();
        assert!(err.to_string().contains("no tasks yet"));
    }

    #[test]
    fn start_reports_the_stopped_task() {
        let mut db = db_with_tasks(&["design", "review"]);
        let mut output = Vec::new();
        start(
            &mut output,
            &mut db,
            Some("design"),
            Some("2025-01-01T09:00:00Z"),
            ts("2025-01-01T12:00:00Z"),
        )
        .unwrap();
        let mut output = Vec::new();
        start(
            &mut output,
            &mut db,
            Some("review"),
            Some("2025-01-01T10:00:00Z"),
            ts("2025-01-01T12:00:00Z"),
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Stopped design\nStarted review at "));
    }

    #[test]
    fn stop_reports_duration() {
        let mut db = db_with_tasks(&["design"]);
        db.start(&TaskName::new("design").unwrap(), ts("2025-01-01T09:00:00Z"))
            .unwrap();

        let mut output = Vec::new();
        stop(
            &mut output,
            &mut db,
            Some("2025-01-01T10:30:00Z"),
            false,
            ts("2025-01-01T12:00:00Z"),
        )
        .unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @"Stopped design after 1h 30m");
        assert!(db.current().unwrap().is_none());
    }

    #[test]
    fn stop_at_last_seen_uses_checkpoint() {
        let mut db = db_with_tasks(&["design"]);
        db.start(&TaskName::new("design").unwrap(), ts("2025-01-01T09:00:00Z"))
            .unwrap();
        db.checkpoint(ts("2025-01-01T09:20:00Z")).unwrap();

        let mut output = Vec::new();
        stop(&mut output, &mut db, None, true, ts("2025-01-01T12:00:00Z")).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_snapshot!(output, @"Stopped design after 20m");
    }

    #[test]
    fn stop_without_current_task_fails() {
        let mut db = db_with_tasks(&["design"]);
        let mut output = Vec::new();
        let err = stop(&mut output, &mut db, None, false, ts("2025-01-01T12:00:00Z")).unwrap_err();
        assert!(err.to_string().contains("no task is currently running"));
    }

    #[test]
    fn resume_returns_to_previous_task() {
        let mut db = db_with_tasks(&["design", "review"]);
        db.start(&TaskName::new("design").unwrap(), ts("2025-01-01T09:00:00Z"))
            .unwrap();
        db.start(&TaskName::new("review").unwrap(), ts("2025-01-01T10:00:00Z"))
            .unwrap();

        let mut output = Vec::new();
        resume(&mut output, &mut db, None, ts("2025-01-01T11:00:00Z")).unwrap();

        assert_eq!(db.current().unwrap().unwrap().as_str(), "design");
        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Resumed design at "));
    }

    #[test]
    fn status_shows_current_and_previous() {
        let mut db = db_with_tasks(&["design", "review"]);
        let mut output = Vec::new();
        status(&mut output, &db, ts("2025-01-01T09:00:00Z")).unwrap();
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Current: none\nPrevious: none\n"
        );

        db.start(&TaskName::new("design").unwrap(), ts("2025-01-01T09:00:00Z"))
            .unwrap();
        db.start(&TaskName::new("review").unwrap(), ts("2025-01-01T09:45:00Z"))
            .unwrap();

        let mut output = Vec::new();
        status(&mut output, &db, ts("2025-01-01T11:00:00Z")).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(output.starts_with("Current: review since "));
        assert!(output.contains("(1h 15m)"));
        assert!(output.ends_with("Previous: design (45m)\n"));
    }
}
