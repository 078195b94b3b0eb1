//! Double-booking detection.

use chrono::Duration;
use chrono_tz::Tz;
use log::debug;

use super::{EventQuery, ExistingEvent, TimeRange};

/// Half-open interval overlap: touching boundaries do not overlap.
pub fn overlaps<T: PartialOrd>(a_start: T, a_end: T, b_start: T, b_end: T) -> bool {
    let start = if a_start > b_start { a_start } else { b_start };
    let end = if a_end < b_end { a_end } else { b_end };
    start < end
}

#[derive(Debug, Clone)]
pub struct ConflictDetector {
    padding: Duration,
    timezone: Tz,
}

impl ConflictDetector {
    pub fn new(padding: Duration, timezone: Tz) -> Self {
        Self { padding, timezone }
    }

    /// Backend query covering `range` widened by the padding on both sides.
    pub fn query_window(&self, range: &TimeRange) -> EventQuery {
        let (start, end) = range.utc_bounds(self.timezone);
        EventQuery::between(start - self.padding, end + self.padding)
    }

    /// Candidates whose range overlaps `range`, in candidate order.
    pub fn find_conflicts<'a>(
        &self,
        range: &TimeRange,
        candidates: &'a [ExistingEvent],
    ) -> Vec<&'a ExistingEvent> {
        let (start, end) = range.utc_bounds(self.timezone);
        candidates
            .iter()
            .filter(|event| {
                let (event_start, event_end) = event.range().utc_bounds(self.timezone);
                overlaps(start, end, event_start, event_end)
            })
            .collect()
    }

    /// Creation-block policy: the first overlapping event is the one reported.
    pub fn first_conflict<'a>(
        &self,
        range: &TimeRange,
        candidates: &'a [ExistingEvent],
    ) -> Option<&'a ExistingEvent> {
        let conflicts = self.find_conflicts(range, candidates);
        if conflicts.len() > 1 {
            debug!("{} conflicts found, reporting the first", conflicts.len());
        }
        conflicts.into_iter().next()
    }
}
