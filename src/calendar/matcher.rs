//! Narrowing a calendar's events down to the one a deletion request refers to.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use super::backend::CalendarBackend;
use super::{CalendarError, EventQuery, ExistingEvent, TimeRange};
use crate::parser::utils::collapse_whitespace;

static TEMPORAL_FILLER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        \b\d{4}-\d{2}-\d{2}(?:[T\ ]\d{1,2}:\d{2}(?::\d{2})?)?\b     # iso dates
        | \b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b                        # slash dates
        | \b\d{1,2}(?::\d{2})?\s*[ap]\.?m\b\.?                    # 3pm, 10:30 am
        | \b\d{1,2}:\d{2}\b                                       # 14:30
        | \b(?:on|at|today|tonight|tomorrow|am|pm|noon|midnight)\b",
    )
    .expect("valid temporal filler regex")
});

/// Strip temporal filler from a summary hint so only the subject remains.
pub fn clean_hint(hint: &str) -> String {
    collapse_whitespace(&TEMPORAL_FILLER_RE.replace_all(hint, " "))
}

/// Events whose summary contains `hint` case-insensitively. No hint keeps everything.
pub fn filter_by_hint(hint: Option<&str>, candidates: Vec<ExistingEvent>) -> Vec<ExistingEvent> {
    match hint {
        None => candidates,
        Some(hint) => {
            let needle = hint.to_lowercase();
            candidates.into_iter().filter(|e| e.summary.to_lowercase().contains(&needle)).collect()
        }
    }
}

/// Single-deletion policy: the chronologically first match is the target.
pub fn select_for_deletion(matches: &[ExistingEvent], timezone: Tz) -> Option<&ExistingEvent> {
    matches.iter().min_by_key(|event| event.start.to_utc(timezone))
}

pub struct EventMatcher {
    backend: Arc<dyn CalendarBackend>,
    padding: Duration,
    timezone: Tz,
    max_results: u32,
}

impl EventMatcher {
    pub fn new(backend: Arc<dyn CalendarBackend>, padding: Duration, timezone: Tz, max_results: u32) -> Self {
        Self { backend, padding, timezone, max_results }
    }

    /// Matching events on one calendar, in chronological order.
    ///
    /// With a window the search covers the padded window; without one it covers upcoming
    /// events from `now`. If that finds nothing, there was no window, and there is a hint,
    /// the whole calendar is searched again without time bounds or a result cap.
    ///
    /// A hint made only of temporal filler matches nothing unless a window narrows the search.
    pub async fn find_matches(
        &self,
        calendar_id: &str,
        summary_hint: Option<&str>,
        window: Option<&TimeRange>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExistingEvent>, CalendarError> {
        let cleaned = summary_hint.map(clean_hint).filter(|h| !h.is_empty());
        debug!("Deletion hint {:?} cleaned to {:?}", summary_hint, cleaned);
        let hint_given = summary_hint.is_some_and(|h| !h.trim().is_empty());
        if hint_given && cleaned.is_none() && window.is_none() {
            warn!("Deletion hint {:?} names no event; refusing an unfiltered match", summary_hint);
            return Ok(Vec::new());
        }

        let query = match window {
            Some(range) => {
                let (start, end) = range.utc_bounds(self.timezone);
                EventQuery::between(start - self.padding, end + self.padding)
            }
            None => EventQuery::starting_at(now),
        }
        .limit(self.max_results);

        let candidates = self.backend.list_events(calendar_id, &query).await?;
        let mut matches = filter_by_hint(cleaned.as_deref(), candidates);

        if matches.is_empty() && window.is_none() && cleaned.is_some() {
            info!("No upcoming match for {:?}; searching all of {}", cleaned, calendar_id);
            let everything = self.backend.list_events(calendar_id, &EventQuery::unbounded()).await?;
            matches = filter_by_hint(cleaned.as_deref(), everything);
        }

        matches.sort_by_key(|event| event.start.to_utc(self.timezone));
        Ok(matches)
    }
}
