//! Task commands: create, delete, rename, list, and tag tasks.

use std::io::Write;

use anyhow::Result;

use tl_core::{TagName, TaskName};
use tl_db::Database;

use crate::cli::TaskAction;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, action: &TaskAction) -> Result<()> {
    match action {
        TaskAction::Add { name } => {
            let name = TaskName::new(name.as_str())?;
            db.add_task(&name)?;
            writeln!(writer, "Created task {name}")?;
        }
        TaskAction::Rm { name } => {
            let name = TaskName::new(name.as_str())?;
            db.remove_task(&name)?;
            writeln!(writer, "Removed task {name}")?;
        }
        TaskAction::Rename { from, to } => {
            let from = TaskName::new(from.as_str())?;
            let to = TaskName::new(to.as_str())?;
            db.rename_task(&from, &to)?;
            writeln!(writer, "Renamed task {from} to {to}")?;
        }
        TaskAction::List => list(writer, db)?,
        TaskAction::Tag { task, tag } => {
            let task = TaskName::new(task.as_str())?;
            let tag = TagName::new(tag.as_str())?;
            db.tag_task(&task, &tag)?;
            writeln!(writer, "Tagged {task} with {tag}")?;
        }
        TaskAction::Untag { task, tag } => {
            let task = TaskName::new(task.as_str())?;
            let tag = TagName::new(tag.as_str())?;
            if db.untag_task(&task, &tag)? {
                writeln!(writer, "Removed tag {tag} from {task}")?;
            } else {
                writeln!(writer, "{task} was not tagged {tag}")?;
            }
        }
    }
    Ok(())
}

fn list<W: Write>(writer: &mut W, db: &Database) -> Result<()> {
    let tasks = db.list_tasks()?;
    if tasks.is_empty() {
        writeln!(writer, "No tasks.")?;
        return Ok(());
    }

    let index = db.tag_index()?;
    for task in tasks {
        match index.get(&task) {
            Some(tags) if !tags.is_empty() => {
                let tags: Vec<&str> = tags.iter().map(TagName::as_str).collect();
                writeln!(writer, "{task} [{}]", tags.join(", "))?;
            }
            _ => writeln!(writer, "{task}")?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    fn exec(db: &mut Database, action: TaskAction) -> Result<String> {
        let mut output = Vec::new();
        run(&mut output, db, &action)?;
        Ok(String::from_utf8(output).unwrap())
    }

    #[test]
    fn task_list_shows_tags() {
        let mut db = Database::open_in_memory().unwrap();
        exec(&mut db, TaskAction::Add { name: "design".into() }).unwrap();
        exec(&mut db, TaskAction::Add { name: "review".into() }).unwrap();
        db.add_tag(&TagName::new("client-a").unwrap()).unwrap();
        db.add_tag(&TagName::new("urgent").unwrap()).unwrap();
        exec(
            &mut db,
            TaskAction::Tag {
                task: "design".into(),
                tag: "urgent".into(),
            },
        )
        .unwrap();
        exec(
            &mut db,
            TaskAction::Tag {
                task: "design".into(),
                tag: "client-a".into(),
            },
        )
        .unwrap();

        let output = exec(&mut db, TaskAction::List).unwrap();
        assert_snapshot!(output, @r"
        design [client-a, urgent]
        review
        ");
    }

    #[test]
    fn task_add_rejects_duplicates_and_blank_names() {
        let mut db = Database::open_in_memory().unwrap();
        exec(&mut db, TaskAction::Add { name: "design".into() }).unwrap();

        let err = exec(&mut db, TaskAction::Add { name: "design".into() }).unwrap_err();
        assert!(err.to_string().contains("task already exists"));

        assert!(exec(&mut db, TaskAction::Add { name: "  ".into() }).is_err());
    }

    #[test]
    fn task_rename_and_remove() {
        let mut db = Database::open_in_memory().unwrap();
        exec(&mut db, TaskAction::Add { name: "design".into() }).unwrap();

        let output = exec(
            &mut db,
            TaskAction::Rename {
                from: "design".into(),
                to: "redesign".into(),
            },
        )
        .unwrap();
        assert_eq!(output, "Renamed task design to redesign\n");

        exec(&mut db, TaskAction::Rm { name: "redesign".into() }).unwrap();
        assert_eq!(exec(&mut db, TaskAction::List).unwrap(), "No tasks.\n");

        let err = exec(&mut db, TaskAction::Rm { name: "redesign".into() }).unwrap_err();
        assert!(err.to_string().contains("task not found"));
    }

    #[test]
    fn task_untag_reports_missing_association() {
        let mut db = Database::open_in_memory().unwrap();
        exec(&mut db, TaskAction::Add { name: "design".into() }).unwrap();
        db.add_tag(&TagName::new("urgent").unwrap()).unwrap();

        let output = exec(
            &mut db,
            TaskAction::Untag {
                task: "design".into(),
                tag: "urgent".into(),
            },
        )
        .unwrap();
        assert_eq!(output, "design was not tagged urgent\n");
    }
}
