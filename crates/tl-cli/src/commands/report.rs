//! Report command for summarizing tracked time.
//!
//! Totals clip every entry to the selected window and group by task or tag.
//! Switch counts walk the whole timeline inside the window, so a task/tag
//! filter narrows which rows are shown without changing what counts as the
//! preceding entry.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use tl_core::summary::{self, SwitchCounts, Totals};
use tl_core::{Lens, SummaryConfig, TagName, TimeWindow};
use tl_db::{Database, EntryFilter};

use super::util::{build_filter, describe_window, format_duration, progress_bar};
use crate::cli::{FilterArgs, ReportKind};

/// Grouping used for report rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grouping {
    Task,
    Tag,
}

/// Computed report contents, independent of output format.
#[derive(Debug, Clone)]
pub struct ReportData {
    pub kind: ReportKind,
    pub grouping: Grouping,
    pub window: TimeWindow,
    pub totals: Totals,
    pub switches: SwitchCounts,
    pub tracked: Duration,
}

/// Computes report data from the store.
pub fn generate_report_data(
    db: &Database,
    kind: ReportKind,
    args: &FilterArgs,
    by_tag: bool,
    config: &SummaryConfig,
    now: DateTime<Utc>,
) -> Result<ReportData> {
    let filter = build_filter(db, args, now)?;
    let entries = db.entries(&filter)?;
    let index = db.tag_index()?;
    let only: BTreeSet<TagName> = filter.tags.iter().cloned().collect();

    let (grouping, lens) = if by_tag {
        let only = (!only.is_empty()).then_some(&only);
        (Grouping::Tag, Lens::Tag { index: &index, only })
    } else {
        (Grouping::Task, Lens::Task)
    };

    let totals = summary::total_time(&entries, &lens, &filter.window, now);
    let tracked = summary::total_tracked(&entries, &filter.window, now);

    let switches = if kind == ReportKind::Switches {
        let timeline = db.entries(&EntryFilter {
            window: filter.window,
            ..EntryFilter::default()
        })?;
        summary::switch_counts(&timeline, &lens, config.switch_threshold)
            .into_iter()
            .filter(|(key, _)| totals.contains_key(key))
            .collect()
    } else {
        SwitchCounts::new()
    };

    Ok(ReportData {
        kind,
        grouping,
        window: filter.window,
        totals,
        switches,
        tracked,
    })
}

fn grouping_label(grouping: Grouping) -> &'static str {
    match grouping {
        Grouping::Task => "task",
        Grouping::Tag => "tag",
    }
}

/// Formats the report for terminal display.
pub fn format_report(data: &ReportData) -> String {
    let mut out = String::new();
    let label = grouping_label(data.grouping);
    let period = describe_window(&data.window);

    match data.kind {
        ReportKind::Totals => {
            writeln!(out, "Time by {label} ({period})").unwrap();
            if data.totals.is_empty() {
                writeln!(out).unwrap();
                writeln!(out, "No time tracked.").unwrap();
                return out;
            }

            let rows = summary::ranked(&data.totals);
            let width = name_width(rows.iter().map(|(name, _)| name.as_str()));
            let max = rows.first().map_or(0, |(_, d)| d.num_seconds());
            writeln!(out).unwrap();
            for (name, duration) in &rows {
                writeln!(
                    out,
                    "{name:<width$}  {}  {}",
                    progress_bar(duration.num_seconds(), max),
                    format_duration(*duration)
                )
                .unwrap();
            }
            writeln!(out).unwrap();
            writeln!(out, "Total tracked: {}", format_duration(data.tracked)).unwrap();
        }
        ReportKind::Switches => {
            writeln!(out, "Context switches by {label} ({period})").unwrap();
            if data.switches.is_empty() {
                writeln!(out).unwrap();
                writeln!(out, "No entries.").unwrap();
                return out;
            }

            let rows = summary::ranked(&data.switches);
            let width = name_width(rows.iter().map(|(name, _)| name.as_str()));
            let total: u32 = rows.iter().map(|(_, count)| count).sum();
            writeln!(out).unwrap();
            for (name, count) in &rows {
                writeln!(out, "{name:<width$}  {count}").unwrap();
            }
            writeln!(out).unwrap();
            writeln!(out, "Total switches: {total}").unwrap();
        }
    }
    out
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(|name| name.chars().count()).max().unwrap_or(0)
}

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport {
    pub kind: &'static str,
    pub grouping: Grouping,
    pub window: JsonWindow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_seconds: Option<i64>,
    pub rows: Vec<JsonRow>,
}

#[derive(Debug, Serialize)]
pub struct JsonWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct JsonRow {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub switches: Option<u32>,
}

/// Formats the report as JSON.
pub fn format_report_json(data: &ReportData) -> Result<String> {
    let window = JsonWindow {
        start: data.window.start,
        end: data.window.end,
    };
    let report = match data.kind {
        ReportKind::Totals => JsonReport {
            kind: "totals",
            grouping: data.grouping,
            window,
            tracked_seconds: Some(data.tracked.num_seconds()),
            rows: summary::ranked(&data.totals)
                .into_iter()
                .map(|(name, duration)| JsonRow {
                    name,
                    seconds: Some(duration.num_seconds()),
                    switches: None,
                })
                .collect(),
        },
        ReportKind::Switches => JsonReport {
            kind: "switches",
            grouping: data.grouping,
            window,
            tracked_seconds: None,
            rows: summary::ranked(&data.switches)
                .into_iter()
                .map(|(name, count)| JsonRow {
                    name,
                    seconds: None,
                    switches: Some(count),
                })
                .collect(),
        },
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Runs the report command.
#[expect(
    clippy::too_many_arguments,
    reason = "report options map one-to-one onto CLI flags"
)]
pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    kind: ReportKind,
    args: &FilterArgs,
    by_tag: bool,
    json: bool,
    config: &SummaryConfig,
    now: DateTime<Utc>,
) -> Result<()> {
    let data = generate_report_data(db, kind, args, by_tag, config, now)?;
    tracing::debug!(
        rows = data.totals.len(),
        tracked = %format_duration(data.tracked),
        "report generated"
    );
    if json {
        writeln!(writer, "{}", format_report_json(&data)?)?;
    } else {
        write!(writer, "{}", format_report(&data))?;
    }
    Ok(())
}
