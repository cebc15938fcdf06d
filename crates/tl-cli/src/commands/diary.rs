//! Diary commands: attach notes to the current task and read them back.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use tl_core::summary::diary_view;
use tl_core::{DiaryEntry, DiaryView};
use tl_db::Database;

use super::util::{build_filter, format_instant};
use crate::cli::DiaryAction;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    action: &DiaryAction,
    now: DateTime<Utc>,
) -> Result<()> {
    match action {
        DiaryAction::Add { text } => {
            let entry = db.add_diary_entry(text, now)?;
            writeln!(writer, "Noted on {}", entry.task)?;
        }
        DiaryAction::Show { filter, merge } => {
            let filter = build_filter(db, filter, now)?;
            let view = diary_view(db.diary_entries(&filter)?, *merge);
            write_view(writer, &view)?;
        }
    }
    Ok(())
}

fn write_view<W: Write>(writer: &mut W, view: &DiaryView) -> Result<()> {
    if view.is_empty() {
        writeln!(writer, "No diary entries.")?;
        return Ok(());
    }

    match view {
        DiaryView::Merged(entries) => {
            for entry in entries {
                write_note(writer, entry, true)?;
            }
        }
        DiaryView::Grouped(groups) => {
            for (index, (task, entries)) in groups.iter().enumerate() {
                if index > 0 {
                    writeln!(writer)?;
                }
                writeln!(writer, "{task}")?;
                for entry in entries {
                    write_note(writer, entry, false)?;
                }
            }
        }
    }
    Ok(())
}

fn write_note<W: Write>(writer: &mut W, entry: &DiaryEntry, with_task: bool) -> Result<()> {
    let at = format_instant(entry.timestamp);
    if with_task {
        writeln!(writer, "{at}  [{}] {}", entry.task, entry.text)?;
    } else {
        writeln!(writer, "  {at}  {}", entry.text)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use tl_core::TaskName;

    use crate::cli::FilterArgs;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn seeded() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        let design = TaskName::new("design").unwrap();
        let review = TaskName::new("review").unwrap();
        db.add_task(&design).unwrap();
        db.add_task(&review).unwrap();

        db.start(&design, ts("2025-01-01T09:00:00Z")).unwrap();
        db.add_diary_entry("sketched layout", ts("2025-01-01T09:10:00Z"))
            .unwrap();
        db.start(&review, ts("2025-01-01T10:00:00Z")).unwrap();
        db.add_diary_entry("left comments", ts("2025-01-01T10:05:00Z"))
            .unwrap();
        db.start(&design, ts("2025-01-01T11:00:00Z")).unwrap();
        db.add_diary_entry("picked colours", ts("2025-01-01T11:30:00Z"))
            .unwrap();
        db
    }

    fn show(db: &mut Database, merge: bool) -> String {
        let mut output = Vec::new();
        let action = DiaryAction::Show {
            filter: FilterArgs::default(),
            merge,
        };
        run(&mut output, db, &action, ts("2025-01-01T12:00:00Z")).unwrap();
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn grouped_view_lists_notes_under_each_task() {
        let mut db = seeded();
        let output = show(&mut db, false);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "design");
        assert!(lines[1].ends_with("sketched layout"));
        assert!(lines[2].ends_with("picked colours"));
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "review");
        assert!(lines[5].ends_with("left comments"));
    }

    #[test]
    fn merged_view_interleaves_chronologically() {
        let mut db = seeded();
        let output = show(&mut db, true);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("[design] sketched layout"));
        assert!(lines[1].ends_with("[review] left comments"));
        assert!(lines[2].ends_with("[design] picked colours"));
    }

    #[test]
    fn add_requires_a_current_task() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        let action = DiaryAction::Add {
            text: "orphan".to_string(),
        };
        let err = run(&mut output, &mut db, &action, ts("2025-01-01T12:00:00Z")).unwrap_err();
        assert!(err.to_string().contains("no task is currently running"));
    }

    #[test]
    fn add_before_current_entry_started_fails() {
        let mut db = Database::open_in_memory().unwrap();
        let design = TaskName::new("design").unwrap();
        db.add_task(&design).unwrap();
        db.start(&design, ts("2025-01-01T12:00:00Z")).unwrap();

        let mut output = Vec::new();
        let action = DiaryAction::Add {
            text: "too early".to_string(),
        };
        let err = run(&mut output, &mut db, &action, ts("2025-01-01T11:00:00Z")).unwrap_err();
        assert!(err.to_string().contains("ordering violation"));
    }

    #[test]
    fn empty_diary_says_so() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(show(&mut db, false), "No diary entries.\n");
    }
}
