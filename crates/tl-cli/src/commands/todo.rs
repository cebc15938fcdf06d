//! Todo commands: add, complete, and list pending items.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use tl_core::{TagName, TaskName, TodoScope};
use tl_db::Database;

use crate::cli::TodoAction;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    action: &TodoAction,
    now: DateTime<Utc>,
) -> Result<()> {
    match action {
        TodoAction::Add { task, text } => {
            let task = TaskName::new(task.as_str())?;
            let item = db.add_todo(&task, text, now)?;
            writeln!(writer, "Added to {}: {}", item.task, item.text)?;
        }
        TodoAction::Done { text } => {
            let item = db.complete_todo(text, now)?;
            writeln!(writer, "Done ({}): {}", item.task, item.text)?;
        }
        TodoAction::List { task, tag } => {
            let scope = match (task, tag) {
                (Some(task), _) => TodoScope::Task(TaskName::new(task.as_str())?),
                (None, Some(tag)) => TodoScope::Tag(TagName::new(tag.as_str())?),
                (None, None) => TodoScope::AnyPending,
            };
            let items = db.pending_todos(&scope)?;
            if items.is_empty() {
                writeln!(writer, "Nothing pending.")?;
            }
            for item in items {
                writeln!(writer, "[{}] {}", item.task, item.text)?;
            }
        }
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

    fn exec(db: &mut Database, action: TodoAction, now: &str) -> Result<String> {
        let mut output = Vec::new();
        run(&mut output, db, &action, ts(now))?;
        Ok(String::from_utf8(output).unwrap())
    }

    fn add(db: &mut Database, task: &str, text: &str, now: &str) {
        exec(
            db,
            TodoAction::Add {
                task: task.into(),
                text: text.into(),
            },
            now,
        )
        .unwrap();
    }

    fn seeded() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        for name in ["design", "review"] {
            db.add_task(&TaskName::new(name).unwrap()).unwrap();
        }
        let tag = TagName::new("client-a").unwrap();
        db.add_tag(&tag).unwrap();
        db.tag_task(&TaskName::new("review").unwrap(), &tag).unwrap();

        add(&mut db, "design", "pick fonts", "2025-01-01T09:00:00Z");
        add(&mut db, "review", "reply to Sam", "2025-01-01T09:05:00Z");
        add(&mut db, "review", "pick fonts", "2025-01-01T09:10:00Z");
        db
    }

    #[test]
    fn list_pending_in_creation_order() {
        let mut db = seeded();
        let output = exec(
            &mut db,
            TodoAction::List {
                task: None,
                tag: None,
            },
            "2025-01-01T10:00:00Z",
        )
        .unwrap();
        assert_snapshot!(output, @r"
        [design] pick fonts
        [review] reply to Sam
        [review] pick fonts
        ");
    }

    #[test]
    fn done_completes_the_earliest_match() {
        let mut db = seeded();
        let output = exec(
            &mut db,
            TodoAction::Done {
                text: " pick fonts ".into(),
            },
            "2025-01-01T10:00:00Z",
        )
        .unwrap();
        assert_eq!(output, "Done (design): pick fonts\n");

        let output = exec(
            &mut db,
            TodoAction::List {
                task: None,
                tag: Some("client-a".into()),
            },
            "2025-01-01T10:00:00Z",
        )
        .unwrap();
        assert_snapshot!(output, @r"
        [review] reply to Sam
        [review] pick fonts
        ");
    }

    #[test]
    fn done_without_match_fails() {
        let mut db = seeded();
        let err = exec(
            &mut db,
            TodoAction::Done {
                text: "pick".into(),
            },
            "2025-01-01T10:00:00Z",
        )
        .unwrap_err();
        assert!(err.to_string().contains("no pending todo matches"));
    }

    #[test]
    fn list_for_task_with_nothing_pending() {
        let mut db = seeded();
        exec(
            &mut db,
            TodoAction::Done {
                text: "pick fonts".into(),
            },
            "2025-01-01T10:00:00Z",
        )
        .unwrap();
        let output = exec(
            &mut db,
            TodoAction::List {
                task: Some("design".into()),
                tag: None,
            },
            "2025-01-01T10:00:00Z",
        )
        .unwrap();
        assert_eq!(output, "Nothing pending.\n");
    }
}
