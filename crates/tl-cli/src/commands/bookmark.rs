//! Bookmark commands: named instants usable wherever a time is accepted.

use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};

use tl_core::BookmarkName;
use tl_db::Database;

use super::util::{format_instant, parse_instant_or_now};
use crate::cli::BookmarkAction;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    action: &BookmarkAction,
    now: DateTime<Utc>,
) -> Result<()> {
    match action {
        BookmarkAction::Set { name, at } => {
            let name = BookmarkName::new(name.as_str())?;
            let at = parse_instant_or_now(db, at.as_deref(), now)?;
            db.set_bookmark(&name, at)?;
            writeln!(writer, "Bookmarked {name} at {}", format_instant(at))?;
        }
        BookmarkAction::List => {
            let bookmarks = db.bookmarks()?;
            if bookmarks.is_empty() {
                writeln!(writer, "No bookmarks.")?;
            }
            for (name, at) in bookmarks {
                writeln!(writer, "{name}  {}", format_instant(at))?;
            }
        }
        BookmarkAction::Rm { name } => {
            let name = BookmarkName::new(name.as_str())?;
            db.remove_bookmark(&name)?;
            writeln!(writer, "Removed bookmark {name}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn set_list_and_remove() {
        let mut db = Database::open_in_memory().unwrap();
        let now = ts("2025-01-01T12:00:00Z");
        let mut output = Vec::new();

        run(
            &mut output,
            &mut db,
            &BookmarkAction::Set {
                name: "standup".into(),
                at: Some("2 hours ago".into()),
            },
            now,
        )
        .unwrap();
        assert_eq!(
            db.bookmark(&BookmarkName::new("standup").unwrap()).unwrap(),
            ts("2025-01-01T10:00:00Z")
        );

        let mut output = Vec::new();
        run(&mut output, &mut db, &BookmarkAction::List, now).unwrap();
        let listing = String::from_utf8(output).unwrap();
        assert!(listing.starts_with("standup  "));

        let mut output = Vec::new();
        run(
            &mut output,
            &mut db,
            &BookmarkAction::Rm {
                name: "standup".into(),
            },
            now,
        )
        .unwrap();
        let mut output = Vec::new();
        run(&mut output, &mut db, &BookmarkAction::List, now).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No bookmarks.\n");
    }

    #[test]
    fn bookmark_can_reference_another_bookmark() {
        let mut db = Database::open_in_memory().unwrap();
        let now = ts("2025-01-01T12:00:00Z");
        db.set_bookmark(&BookmarkName::new("lunch").unwrap(), ts("2025-01-01T11:00:00Z"))
            .unwrap();

        let mut output = Vec::new();
        run(
            &mut output,
            &mut db,
            &BookmarkAction::Set {
                name: "after-lunch".into(),
                at: Some("lunch".into()),
            },
            now,
        )
        .unwrap();
        assert_eq!(
            db.bookmark(&BookmarkName::new("after-lunch").unwrap()).unwrap(),
            ts("2025-01-01T11:00:00Z")
        );
    }

    #[test]
    fn invalid_names_are_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        let result = run(
            &mut output,
            &mut db,
            &BookmarkAction::Set {
                name: "two words".into(),
                at: None,
            },
            ts("2025-01-01T12:00:00Z"),
        );
        assert!(result.is_err());

        let err = run(
            &mut output,
            &mut db,
            &BookmarkAction::Set {
                name: "now".into(),
                at: None,
            },
            ts("2025-01-01T12:00:00Z"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("is reserved"));
    }
}
