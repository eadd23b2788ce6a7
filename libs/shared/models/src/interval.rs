use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open wall-clock interval within a single day: `[start, end)`.
///
/// A slot ending at 10:00 does not conflict with one starting at 10:00.
/// Times are naive minutes-of-day; timezone normalization happens at the
/// request boundary, never here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeInterval {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Interval length in whole minutes. Negative when the interval is malformed.
    pub fn duration_minutes(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_minutes()
    }

    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }

    /// Half-open overlap test.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True when the intervals share exactly one endpoint without overlapping.
    pub fn is_adjacent(&self, other: &TimeInterval) -> bool {
        self.end == other.start || other.end == self.start
    }

    /// True when `other` lies entirely within `self`.
    pub fn contains(&self, other: &TimeInterval) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True when `t` falls inside the interval (start inclusive, end exclusive).
    pub fn contains_time(&self, t: NaiveTime) -> bool {
        self.start <= t && t < self.end
    }

    /// Union of two overlapping or adjacent intervals. `None` when there is a
    /// gap between them.
    pub fn merge(&self, other: &TimeInterval) -> Option<TimeInterval> {
        if !self.overlaps(other) && !self.is_adjacent(other) {
            return None;
        }

        Some(TimeInterval {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        })
    }

    /// Remove `other` from `self`, yielding the 0, 1, or 2 remaining pieces.
    pub fn subtract(&self, other: &TimeInterval) -> Vec<TimeInterval> {
        if !self.overlaps(other) {
            return vec![*self];
        }

        let mut pieces = Vec::new();
        if self.start < other.start {
            pieces.push(TimeInterval::new(self.start, other.start));
        }
        if other.end < self.end {
            pieces.push(TimeInterval::new(other.end, self.end));
        }
        pieces
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}
