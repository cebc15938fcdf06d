//! Tag commands: create, delete, rename, and list tags.

use std::io::Write;

use anyhow::Result;

use tl_core::{TagName, TaskName};
use tl_db::Database;

use crate::cli::TagAction;

pub fn run<W: Write>(writer: &mut W, db: &mut Database, action: &TagAction) -> Result<()> {
    match action {
        TagAction::Add { name } => {
            let name = TagName::new(name.as_str())?;
            db.add_tag(&name)?;
            writeln!(writer, "Created tag {name}")?;
        }
        TagAction::Rm { name } => {
            let name = TagName::new(name.as_str())?;
            db.remove_tag(&name)?;
            writeln!(writer, "Removed tag {name}")?;
        }
        TagAction::Rename { from, to } => {
            let from = TagName::new(from.as_str())?;
            let to = TagName::new(to.as_str())?;
            db.rename_tag(&from, &to)?;
            writeln!(writer, "Renamed tag {from} to {to}")?;
        }
        TagAction::List => {
            let tags = db.list_tags()?;
            if tags.is_empty() {
                writeln!(writer, "No tags.")?;
            }
            for tag in tags {
                let tasks = db.tasks_with_tag(&tag)?;
                if tasks.is_empty() {
                    writeln!(writer, "{tag}: (no tasks)")?;
                    continue;
                }
                let tasks: Vec<&str> = tasks.iter().map(TaskName::as_str).collect();
                writeln!(writer, "{tag}: {}", tasks.join(", "))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;

    fn exec(db: &mut Database, action: TagAction) -> Result<String> {
        let mut output = Vec::new();
        run(&mut output, db, &action)?;
        Ok(String::from_utf8(output).unwrap())
    }

    #[test]
    fn tag_list_shows_tasks() {
        let mut db = Database::open_in_memory().unwrap();
        for task in ["design", "review"] {
            db.add_task(&TaskName::new(task).unwrap()).unwrap();
        }
        exec(&mut db, TagAction::Add { name: "client-a".into() }).unwrap();
        exec(&mut db, TagAction::Add { name: "idle".into() }).unwrap();
        let tag = TagName::new("client-a").unwrap();
        db.tag_task(&TaskName::new("review").unwrap(), &tag).unwrap();
        db.tag_task(&TaskName::new("design").unwrap(), &tag).unwrap();

        let output = exec(&mut db, TagAction::List).unwrap();
        assert_snapshot!(output, @r"
        client-a: design, review
        idle: (no tasks)
        ");
    }

    #[test]
    fn tag_remove_keeps_tasks() {
        let mut db = Database::open_in_memory().unwrap();
        let task = TaskName::new("design").unwrap();
        db.add_task(&task).unwrap();
        exec(&mut db, TagAction::Add { name: "urgent".into() }).unwrap();
        db.tag_task(&task, &TagName::new("urgent").unwrap()).unwrap();

        exec(&mut db, TagAction::Rm { name: "urgent".into() }).unwrap();

        assert!(db.task_exists(&task).unwrap());
        assert!(db.tags_of(&task).unwrap().is_empty());
    }

    #[test]
    fn tag_rename_rejects_existing_target() {
        let mut db = Database::open_in_memory().unwrap();
        exec(&mut db, TagAction::Add { name: "a".into() }).unwrap();
        exec(&mut db, TagAction::Add { name: "b".into() }).unwrap();

        let err = exec(
            &mut db,
            TagAction::Rename {
                from: "a".into(),
                to: "b".into(),
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("tag already exists"));
    }
}
