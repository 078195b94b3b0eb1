//! Calendar data types shared by the backends, the service and the parsers.
//
// `EventTime` is serialized in the backend's own `{date}` / `{dateTime, timeZone}` shape,
// so a value built by the normalizer reaches the wire without conversion.

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal identifier of the account's main calendar.
pub const PRIMARY_CALENDAR: &str = "primary";

/// One end of an event's time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventTime {
    /// All-day value: a plain calendar date.
    Date { date: NaiveDate },
    /// Timed value: an instant plus the timezone it should be displayed in.
    DateTime {
        #[serde(rename = "dateTime")]
        date_time: DateTime<FixedOffset>,
        #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
        time_zone: Option<String>,
    },
}

impl EventTime {
    pub fn date(date: NaiveDate) -> Self {
        EventTime::Date { date }
    }

    pub fn instant(date_time: DateTime<FixedOffset>, time_zone: impl Into<String>) -> Self {
        EventTime::DateTime { date_time, time_zone: Some(time_zone.into()) }
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, EventTime::Date { .. })
    }

    pub fn time_zone(&self) -> Option<&str> {
        match self {
            EventTime::DateTime { time_zone, .. } => time_zone.as_deref(),
            EventTime::Date { .. } => None,
        }
    }

    /// Same instant, displayed in `zone`. Dates are unchanged.
    pub fn in_zone(self, zone: &str) -> Self {
        match self {
            EventTime::DateTime { date_time, .. } => EventTime::instant(date_time, zone),
            date => date,
        }
    }

    /// Position on the UTC timeline. Dates are taken as local midnight in `tz`.
    pub fn to_utc(&self, tz: Tz) -> DateTime<Utc> {
        match self {
            EventTime::DateTime { date_time, .. } => date_time.with_timezone(&Utc),
            EventTime::Date { date } => {
                let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
                tz.from_local_datetime(&midnight)
                    .earliest()
                    .map(|dt| dt.with_timezone(&Utc))
                    .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
            }
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Date { date } => write!(f, "{}", date.format("%Y-%m-%d")),
            EventTime::DateTime { date_time, .. } => write!(f, "{}", date_time.to_rfc3339()),
        }
    }
}

/// Start/end pair with an exclusive end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: EventTime,
    pub end: EventTime,
}

impl TimeRange {
    pub fn new(start: EventTime, end: EventTime) -> Self {
        Self { start, end }
    }

    pub fn is_all_day(&self) -> bool {
        self.start.is_all_day()
    }

    pub fn utc_bounds(&self, tz: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start.to_utc(tz), self.end.to_utc(tz))
    }
}

/// Entry of the backend's calendar list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarInfo {
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub primary: bool,
}

impl CalendarInfo {
    pub fn new(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self { id: id.into(), summary: summary.into(), primary: false }
    }

    pub fn primary(id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self { id: id.into(), summary: summary.into(), primary: true }
    }
}

/// Resolved calendar target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarRef {
    Primary,
    Id(String),
}

impl CalendarRef {
    pub fn as_str(&self) -> &str {
        match self {
            CalendarRef::Primary => PRIMARY_CALENDAR,
            CalendarRef::Id(id) => id,
        }
    }
}

impl fmt::Display for CalendarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event already stored by the backend. Read-only from this crate's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingEvent {
    pub id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
    pub calendar_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_link: Option<String>,
}

impl ExistingEvent {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start.clone(), self.end.clone())
    }
}

/// Payload of an insert call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub summary: String,
    pub range: TimeRange,
    pub description: Option<String>,
    pub attendees: Vec<String>,
}

/// What the backend hands back after an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertedEvent {
    pub id: String,
    pub html_link: Option<String>,
}

/// Filter for listing events. Unset bounds mean unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub time_min: Option<DateTime<Utc>>,
    pub time_max: Option<DateTime<Utc>>,
    pub max_results: Option<u32>,
}

impl EventQuery {
    pub fn between(time_min: DateTime<Utc>, time_max: DateTime<Utc>) -> Self {
        Self { time_min: Some(time_min), time_max: Some(time_max), max_results: None }
    }

    pub fn starting_at(time_min: DateTime<Utc>) -> Self {
        Self { time_min: Some(time_min), time_max: None, max_results: None }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn limit(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// Event extracted from one utterance, consumed by a single create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    /// Alias-resolved id, or `primary`.
    pub calendar_id: String,
    pub summary: String,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub description: Option<String>,
    pub attendees: Vec<String>,
    pub all_day: bool,
}

impl Default for EventDraft {
    fn default() -> Self {
        Self {
            calendar_id: PRIMARY_CALENDAR.to_string(),
            summary: String::new(),
            start: None,
            end: None,
            description: None,
            attendees: Vec::new(),
            all_day: false,
        }
    }
}

impl EventDraft {
    /// A draft can go straight to the backend only with both a summary and a start.
    pub fn is_actionable(&self) -> bool {
        !self.summary.trim().is_empty() && self.start.is_some()
    }
}
