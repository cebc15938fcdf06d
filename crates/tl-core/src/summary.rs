//! Summary engine.
//!
//! Aggregates an ordered stream of log entries into report values.
//!
//! # Algorithm Summary
//!
//! 1. Totals: clip every entry to the query window and add the clipped
//!    duration to each key the entry maps to under the chosen [`Lens`]
//! 2. Switches: walk consecutive entry pairs; the later entry's keys that the
//!    earlier entry lacks count as a switch when the gap between them is
//!    below the threshold
//! 3. Diary: group notes by task, or interleave them when merging
//!
//! Under the tag lens a task carrying N tags contributes its full duration to
//! each of the N tags. Tags are overlapping views of one timeline, so tag
//! totals do not sum to the tracked time.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::entry::{DiaryEntry, LogEntry};
use crate::types::{TagName, TaskName};
use crate::window::TimeWindow;

/// Gap below which a change of task counts as a context switch.
pub const SWITCH_THRESHOLD: Duration = Duration::seconds(60);

/// Default floor for surfacing suspiciously long entries.
pub const LONG_ENTRY_FLOOR: Duration = Duration::hours(4);

/// Tags of each task, as loaded from the store.
pub type TagIndex = BTreeMap<TaskName, BTreeSet<TagName>>;

/// Configuration for summary calculation.
#[derive(Debug, Clone, Copy)]
pub struct SummaryConfig {
    /// Entries separated by at least this gap start a fresh session rather
    /// than counting as a switch.
    /// Default: 60 seconds.
    pub switch_threshold: Duration,

    /// Minimum duration for the long-entry listing.
    /// Default: 4 hours.
    pub long_entry_floor: Duration,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            switch_threshold: SWITCH_THRESHOLD,
            long_entry_floor: LONG_ENTRY_FLOOR,
        }
    }
}

/// How entries are grouped into summary keys.
#[derive(Debug, Clone, Copy)]
pub enum Lens<'a> {
    /// One key per task name.
    Task,
    /// One key per tag of the entry's task.
    Tag {
        index: &'a TagIndex,
        /// Restrict output to these tags.
        only: Option<&'a BTreeSet<TagName>>,
    },
}

impl Lens<'_> {
    fn keys(&self, task: &TaskName) -> Vec<String> {
        match self {
            Self::Task => vec![task.to_string()],
            Self::Tag { index, only } => index
                .get(task)
                .into_iter()
                .flatten()
                .filter(|tag| only.is_none_or(|only| only.contains(*tag)))
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Accumulated duration per key.
pub type Totals = BTreeMap<String, Duration>;

/// Number of switches attributed to each key.
pub type SwitchCounts = BTreeMap<String, u32>;

/// Sums clipped durations per key.
///
/// Entries outside the window contribute nothing; entries that intersect it
/// contribute `min(end, window.end) - max(start, window.start)`. Open entries
/// run until `now`.
pub fn total_time(
    entries: &[LogEntry],
    lens: &Lens<'_>,
    window: &TimeWindow,
    now: DateTime<Utc>,
) -> Totals {
    let mut totals = Totals::new();
    for entry in entries {
        if !window.intersects(entry.start, entry.end) {
            continue;
        }
        let clipped = entry.clipped_duration(window, now);
        for key in lens.keys(&entry.task) {
            *totals.entry(key).or_insert_with(Duration::zero) += clipped;
        }
    }
    totals
}

/// Total clipped time across all entries.
///
/// Entries never overlap, so the sum equals the length of their union.
pub fn total_tracked(entries: &[LogEntry], window: &TimeWindow, now: DateTime<Utc>) -> Duration {
    entries
        .iter()
        .filter(|entry| window.intersects(entry.start, entry.end))
        .map(|entry| entry.clipped_duration(window, now))
        .fold(Duration::zero(), |acc, d| acc + d)
}

/// Counts context switches per key.
///
/// Entries must be sorted by start ascending. Every key seen appears in the
/// result, with zero when nothing switched into it.
pub fn switch_counts(entries: &[LogEntry], lens: &Lens<'_>, threshold: Duration) -> SwitchCounts {
    let mut counts = SwitchCounts::new();
    let mut previous: Option<(&LogEntry, Vec<String>)> = None;

    for entry in entries {
        let keys = lens.keys(&entry.task);
        for key in &keys {
            counts.entry(key.clone()).or_insert(0);
        }

        if let Some((prev, prev_keys)) = &previous {
            let gap = entry.start - prev.end.unwrap_or(entry.start);
            if gap < threshold {
                for key in keys.iter().filter(|key| !prev_keys.contains(key)) {
                    if let Some(count) = counts.get_mut(key) {
                        *count += 1;
                    }
                }
            }
        }
        previous = Some((entry, keys));
    }

    counts
}

/// Diary notes arranged for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "layout", content = "entries", rename_all = "snake_case")]
pub enum DiaryView {
    /// All notes in one chronological sequence.
    Merged(Vec<DiaryEntry>),
    /// Notes grouped by task, each group chronological.
    Grouped(BTreeMap<TaskName, Vec<DiaryEntry>>),
}

impl DiaryView {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Merged(entries) => entries.is_empty(),
            Self::Grouped(groups) => groups.is_empty(),
        }
    }
}

/// Arranges diary notes, either interleaved or grouped by task.
pub fn diary_view(mut entries: Vec<DiaryEntry>, merge: bool) -> DiaryView {
    entries.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
    if merge {
        return DiaryView::Merged(entries);
    }
    let mut groups: BTreeMap<TaskName, Vec<DiaryEntry>> = BTreeMap::new();
    for entry in entries {
        groups.entry(entry.task.clone()).or_default().push(entry);
    }
    DiaryView::Grouped(groups)
}

/// An entry with its computed duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntry {
    pub entry: LogEntry,
    pub duration: Duration,
}

/// Lists entries with their durations.
///
/// With a `floor`, only entries lasting at least that long are kept, which
/// surfaces anomalies such as a task left running overnight.
pub fn entry_listing(
    entries: &[LogEntry],
    now: DateTime<Utc>,
    floor: Option<Duration>,
) -> Vec<ListedEntry> {
    entries
        .iter()
        .map(|entry| ListedEntry {
            entry: entry.clone(),
            duration: entry.duration(now),
        })
        .filter(|listed| floor.is_none_or(|floor| listed.duration >= floor))
        .collect()
}

/// Orders summary values by value descending, ties broken by key ascending.
pub fn ranked<V: Ord + Copy>(values: &BTreeMap<String, V>) -> Vec<(String, V)> {
    let mut ranked: Vec<(String, V)> = values.iter().map(|(k, v)| (k.clone(), *v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}
