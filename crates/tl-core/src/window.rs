//! Half-open query windows.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ValidationError;

/// A half-open time window `[start, end)`.
///
/// Either bound may be absent, in which case the window is unbounded on that
/// side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// A window covering all of time.
    pub const UNBOUNDED: Self = Self {
        start: None,
        end: None,
    };

    /// Creates a window, rejecting an end that precedes the start.
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, ValidationError> {
        if let (Some(start), Some(end)) = (start, end) {
            if end < start {
                return Err(ValidationError::InvertedWindow {
                    start: start.to_rfc3339(),
                    end: end.to_rfc3339(),
                });
            }
        }
        Ok(Self { start, end })
    }

    /// Creates a bounded window `[start, end)`.
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        Self::new(Some(start), Some(end))
    }

    /// Returns true if `instant` falls inside the window.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| instant >= start) && self.end.is_none_or(|end| instant < end)
    }

    /// Returns true if the interval `[start, end]` intersects the window.
    ///
    /// An open interval (`end = None`) extends forever. A zero-length interval
    /// intersects when its instant lies inside the window.
    pub fn intersects(&self, start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> bool {
        if self.end.is_some_and(|window_end| start >= window_end) {
            return false;
        }
        match (self.start, end) {
            (None, _) | (_, None) => true,
            (Some(window_start), Some(end)) => end > window_start || start >= window_start,
        }
    }

    /// Returns the length of `[start, end)` that lies inside the window.
    pub fn clip(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Duration {
        let start = self.start.map_or(start, |window_start| start.max(window_start));
        let end = self.end.map_or(end, |window_end| end.min(window_end));
        if end > start {
            end - start
        } else {
            Duration::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn new_rejects_inverted_bounds() {
        let result = TimeWindow::between(ts("2025-01-02T00:00:00Z"), ts("2025-01-01T00:00:00Z"));
        assert!(matches!(result, Err(ValidationError::InvertedWindow { .. })));
    }

    #[test]
    fn contains_is_half_open() {
        let window =
            TimeWindow::between(ts("2025-01-01T00:00:00Z"), ts("2025-01-02T00:00:00Z")).unwrap();
        assert!(window.contains(ts("2025-01-01T00:00:00Z")));
        assert!(window.contains(ts("2025-01-01T23:59:59Z")));
        assert!(!window.contains(ts("2025-01-02T00:00:00Z")));
    }

    #[test]
    fn intersects_handles_open_and_boundary_intervals() {
        let window =
            TimeWindow::between(ts("2025-01-01T09:00:00Z"), ts("2025-01-01T10:00:00Z")).unwrap();

        // ends exactly at window start
        assert!(!window.intersects(ts("2025-01-01T08:00:00Z"), Some(ts("2025-01-01T09:00:00Z"))));
        // starts exactly at window end
        assert!(!window.intersects(ts("2025-01-01T10:00:00Z"), None));
        // still running from before the window
        assert!(window.intersects(ts("2025-01-01T08:00:00Z"), None));
        // zero-length at window start
        assert!(window.intersects(ts("2025-01-01T09:00:00Z"), Some(ts("2025-01-01T09:00:00Z"))));
    }

    #[test]
    fn clip_trims_to_window() {
        let window =
            TimeWindow::between(ts("2025-01-01T09:00:00Z"), ts("2025-01-01T10:00:00Z")).unwrap();
        let clipped = window.clip(ts("2025-01-01T08:30:00Z"), ts("2025-01-01T09:15:00Z"));
        assert_eq!(clipped, Duration::minutes(15));

        let outside = window.clip(ts("2025-01-01T11:00:00Z"), ts("2025-01-01T12:00:00Z"));
        assert_eq!(outside, Duration::zero());

        let unbounded = TimeWindow::UNBOUNDED.clip(
            ts("2025-01-01T11:00:00Z"),
            ts("2025-01-01T12:00:00Z"),
        );
        assert_eq!(unbounded, Duration::hours(1));
    }
}
