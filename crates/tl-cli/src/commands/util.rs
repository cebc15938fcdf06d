//! Shared utilities for CLI commands.
//!
//! Resolves user-supplied time expressions into instants and windows, and
//! formats durations and instants for display.

use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use chrono::{
    DateTime, Datelike, Duration, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc,
};
use regex::Regex;

use tl_core::{BookmarkName, TagName, TaskName, TimeWindow};
use tl_db::{Database, EntryFilter};

use crate::cli::{FilterArgs, Period};

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(second|minute|hour|day|week)s?\s+ago$")
        .expect("relative time pattern is valid")
});

/// Conservative bounds for relative time parsing (~1000 years in minutes).
const MAX_RELATIVE_MINUTES: i64 = 1000 * 365 * 24 * 60;

/// Parse a time expression into an instant.
///
/// Supports:
/// - `now`
/// - ISO 8601: "2026-01-15T10:30:00Z"
/// - Relative: "2 hours ago", "30 minutes ago", "1 day ago", "1 week ago"
/// - Local wall-clock time today: "09:30"
/// - A bookmark name
pub fn parse_instant(db: &Database, s: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Some(caps) = RELATIVE_TIME_RE.captures(s) {
        let n: i64 = caps[1]
            .parse()
            .context("failed to parse number in relative time")?;
        let (max_for_unit, seconds_per_unit) = match &caps[2] {
            "second" => (MAX_RELATIVE_MINUTES * 60, 1),
            "minute" => (MAX_RELATIVE_MINUTES, 60),
            "hour" => (MAX_RELATIVE_MINUTES / 60, 60 * 60),
            "day" => (MAX_RELATIVE_MINUTES / (60 * 24), 60 * 60 * 24),
            "week" => (MAX_RELATIVE_MINUTES / (60 * 24 * 7), 60 * 60 * 24 * 7),
            unit => bail!("Unknown time unit: {unit}"),
        };
        if n > max_for_unit {
            bail!("Relative time value too large: {n} {}", &caps[2]);
        }
        return Ok(now - Duration::seconds(n * seconds_per_unit));
    }

    if let Ok(time) = NaiveTime::parse_from_str(s, "%H:%M") {
        let today = now.with_timezone(&Local).date_naive();
        return local_to_utc(today, time)
            .with_context(|| format!("{s} does not exist today in the local timezone"));
    }

    if let Ok(name) = BookmarkName::new(s) {
        return db
            .bookmark(&name)
            .with_context(|| format!("unrecognized time expression: {s}"));
    }

    bail!(
        "Invalid time: {s}. Use ISO 8601 (e.g., 2026-01-15T10:30:00Z), relative (e.g., '2 hours ago'), HH:MM, 'now', or a bookmark name"
    )
}

/// Parse an optional time expression, defaulting to `now`.
pub fn parse_instant_or_now(
    db: &Database,
    s: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    s.map_or(Ok(now), |s| parse_instant(db, s, now))
}

fn local_to_utc(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

// ========== Period Date Calculation ==========

/// Converts a local date at midnight to UTC.
/// Handles DST ambiguity by picking the earlier time.
fn local_midnight_to_utc(local_date: NaiveDate) -> DateTime<Utc> {
    let midnight = local_date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight) {
        // Single or ambiguous (DST fall-back): use the earlier time
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => {
            // DST spring-forward gap at midnight; 1am local exists
            let one_am = midnight + Duration::hours(1);
            Local
                .from_local_datetime(&one_am)
                .earliest()
                .map_or_else(|| one_am.and_utc(), |dt| dt.with_timezone(&Utc))
        }
    }
}

/// Get boundaries for a given period as a half-open window, using `today` as reference.
pub fn period_window(period: Period, today: NaiveDate) -> TimeWindow {
    let monday = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
    let (start, end) = match period {
        Period::Today => (today, today + Duration::days(1)),
        Period::Yesterday => (today - Duration::days(1), today),
        Period::Week => (monday, monday + Duration::days(7)),
        Period::LastWeek => (monday - Duration::days(7), monday),
    };
    TimeWindow {
        start: Some(local_midnight_to_utc(start)),
        end: Some(local_midnight_to_utc(end)),
    }
}

/// Builds a store filter from command-line selection arguments.
pub fn build_filter(db: &Database, args: &FilterArgs, now: DateTime<Utc>) -> Result<EntryFilter> {
    let tasks = args
        .tasks
        .iter()
        .map(TaskName::new)
        .collect::<Result<Vec<_>, _>>()?;
    let tags = args
        .tags
        .iter()
        .map(TagName::new)
        .collect::<Result<Vec<_>, _>>()?;

    let window = match args.period {
        Some(period) => period_window(period, now.with_timezone(&Local).date_naive()),
        None => {
            let start = args
                .from
                .as_deref()
                .map(|s| parse_instant(db, s, now))
                .transpose()?;
            let end = args
                .to
                .as_deref()
                .map(|s| parse_instant(db, s, now))
                .transpose()?;
            TimeWindow::new(start, end)?
        }
    };

    Ok(EntryFilter {
        tasks,
        tags,
        window,
    })
}

/// Describes a window for report headers.
pub fn describe_window(window: &TimeWindow) -> String {
    match (window.start, window.end) {
        (None, None) => "all time".to_string(),
        (Some(start), None) => format!("since {}", format_instant(start)),
        (None, Some(end)) => format!("until {}", format_instant(end)),
        (Some(start), Some(end)) => {
            format!("{} to {}", format_instant(start), format_instant(end))
        }
    }
}

// ========== Display ==========

/// Formats an instant in local time.
pub fn format_instant(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

/// Formats a duration as "Xh Ym" if at least an hour, "Xm" otherwise.
/// Negative durations are shown as 0m.
pub fn format_duration(duration: Duration) -> String {
    let total_minutes = duration.num_minutes().max(0);
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 1 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Generates a 10-character progress bar.
/// Values <5% of max get a single block for visibility.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn progress_bar(value: i64, max: i64) -> String {
    if max <= 0 {
        return "░░░░░░░░░░".to_string();
    }

    let ratio = value as f64 / max as f64;
    let filled = if ratio < 0.05 && value > 0 {
        1
    } else {
        (ratio * 10.0).round().clamp(0.0, 10.0) as usize
    };

    let empty = 10 - filled;
    format!("{}{}", "█".repeat(filled), "░".repeat(empty))
}
