//! Calendar operations exposed as tools: create, next, delete, list.
//!
//! `CalendarService` owns the injected backend handle and wires the time normalizer,
//! calendar resolver, conflict detector and event matcher together.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::backend::CalendarBackend;
use super::conflict::ConflictDetector;
use super::matcher::{select_for_deletion, EventMatcher};
use super::resolver::{resolve, AliasTable};
use super::{
    description_with_names, partition_attendees, CalendarError, CalendarInfo, CalendarRef,
    EventQuery, EventTime, ExistingEvent, NewEvent, TimeRange, PRIMARY_CALENDAR,
};
use crate::config::CalendarConfig;
use crate::parser::{DateParser, NaturalDateParser, ParseSettings, TimeNormalizer};

/// Arguments of `create_new_event`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEventArgs {
    #[serde(default)]
    pub calendar_id: Option<String>,
    pub summary: String,
    pub start_str: String,
    #[serde(default)]
    pub end_str: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub attendees: Option<Vec<String>>,
    #[serde(default)]
    pub all_day: Option<bool>,
    /// Overrides the configured `check_conflicts` for this call.
    #[serde(default)]
    pub ignore_conflict: Option<bool>,
    /// IANA zone a timed event is shown in; the configured zone otherwise.
    #[serde(default)]
    pub time_zone: Option<String>,
}

/// Arguments of `delete_event`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteEventArgs {
    pub calendar_id: Option<String>,
    pub summary: Option<String>,
    pub start_str: Option<String>,
    pub end_str: Option<String>,
    pub all_day: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    pub success: bool,
    pub event_id: String,
    pub link: Option<String>,
    pub calendar_id: String,
    pub summary: String,
    pub start: EventTime,
    pub end: EventTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextEvent {
    pub calendar: String,
    pub summary: String,
    pub start: String,
    pub id: String,
}

pub struct CalendarService {
    backend: Arc<dyn CalendarBackend>,
    normalizer: TimeNormalizer,
    aliases: AliasTable,
    settings: ParseSettings,
    detector: ConflictDetector,
    matcher: EventMatcher,
    default_duration: Duration,
    check_conflicts: bool,
    max_results: u32,
}

impl CalendarService {
    pub fn new(backend: Arc<dyn CalendarBackend>, config: &CalendarConfig) -> Result<Self> {
        let timezone = config.timezone()?;
        let padding = config.conflict_padding();
        let default_duration = config.default_duration();
        Ok(Self {
            normalizer: TimeNormalizer::new(Arc::new(NaturalDateParser))
                .with_default_duration(default_duration),
            aliases: AliasTable::new(config.aliases.clone()),
            settings: config.parse_settings()?,
            detector: ConflictDetector::new(padding, timezone),
            matcher: EventMatcher::new(backend.clone(), padding, timezone, config.max_results),
            backend,
            default_duration,
            check_conflicts: config.check_conflicts,
            max_results: config.max_results,
        })
    }

    pub fn with_date_parser(mut self, parser: Arc<dyn DateParser>) -> Self {
        self.normalizer = TimeNormalizer::new(parser).with_default_duration(self.default_duration);
        self
    }

    /// Pin "now" for every relative expression and upcoming-event query.
    pub fn with_base_time(mut self, base: DateTime<Tz>) -> Self {
        self.settings = self.settings.with_base(base);
        self
    }

    pub fn settings(&self) -> &ParseSettings {
        &self.settings
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    fn timezone(&self) -> Tz {
        self.settings.timezone
    }

    fn now(&self) -> DateTime<Utc> {
        self.settings.now().with_timezone(&Utc)
    }

    /// Alias table first, then `primary`, then the backend's calendar list.
    async fn resolve_calendar(&self, requested: Option<&str>) -> Result<CalendarRef, CalendarError> {
        let requested = requested.map(str::trim).filter(|r| !r.is_empty()).unwrap_or(PRIMARY_CALENDAR);
        if let Some(id) = self.aliases.lookup(requested) {
            debug!("Calendar alias '{}' -> {}", requested, id);
            return Ok(CalendarRef::Id(id.to_string()));
        }
        if requested.eq_ignore_ascii_case(PRIMARY_CALENDAR) {
            return Ok(CalendarRef::Primary);
        }
        let known = self.backend.list_calendars().await?;
        resolve(requested, &known)
    }

    pub async fn create_event(&self, args: CreateEventArgs) -> Result<CreatedEvent, CalendarError> {
        let all_day = args.all_day.unwrap_or(false);
        let mut range =
            self.normalizer.normalize(&args.start_str, args.end_str.as_deref(), all_day, &self.settings)?;
        if let Some(zone) = args.time_zone.as_deref().map(str::trim).filter(|z| !z.is_empty()) {
            if zone.parse::<Tz>().is_err() {
                return Err(CalendarError::Parse(format!("unknown time zone '{}'", zone)));
            }
            range = TimeRange::new(range.start.in_zone(zone), range.end.in_zone(zone));
        }
        let calendar = self.resolve_calendar(args.calendar_id.as_deref()).await?;
        info!("Creating '{}' on {} ({} -> {})", args.summary, calendar, range.start, range.end);

        let check = args.ignore_conflict.map_or(self.check_conflicts, |ignore| !ignore);
        if check {
            let query = self.detector.query_window(&range).limit(self.max_results);
            let existing = self.backend.list_events(calendar.as_str(), &query).await?;
            if let Some(conflict) = self.detector.first_conflict(&range, &existing) {
                warn!("'{}' conflicts with '{}' ({})", args.summary, conflict.summary, conflict.id);
                return Err(CalendarError::ConflictDetected(Box::new(conflict.clone())));
            }
        }

        let (emails, names) = partition_attendees(args.attendees.as_deref().unwrap_or_default());
        let event = NewEvent {
            summary: args.summary.trim().to_string(),
            description: description_with_names(args.description.as_deref(), &names),
            attendees: emails,
            range,
        };

        let inserted = self.backend.insert_event(calendar.as_str(), &event).await?;
        Ok(CreatedEvent {
            success: true,
            event_id: inserted.id,
            link: inserted.html_link,
            calendar_id: calendar.as_str().to_string(),
            summary: event.summary,
            start: event.range.start,
            end: event.range.end,
        })
    }

    /// Earliest upcoming event across every calendar.
    pub async fn get_next_event(&self) -> Result<Option<NextEvent>, CalendarError> {
        let now = self.now();
        let query = EventQuery::starting_at(now).limit(1);
        let mut best: Option<(DateTime<Utc>, NextEvent)> = None;

        for calendar in self.backend.list_calendars().await? {
            let events = match self.backend.list_events(&calendar.id, &query).await {
                Ok(events) => events,
                Err(e) => {
                    warn!("Skipping calendar {}: {}", calendar.id, e);
                    continue;
                }
            };
            let Some(event) = events.into_iter().next() else { continue };
            let start = event.start.to_utc(self.timezone());
            if best.as_ref().map_or(true, |(current, _)| start < *current) {
                best = Some((
                    start,
                    NextEvent {
                        calendar: if calendar.summary.is_empty() { calendar.id.clone() } else { calendar.summary.clone() },
                        summary: event.summary,
                        start: event.start.to_string(),
                        id: event.id,
                    },
                ));
            }
        }

        Ok(best.map(|(_, event)| event))
    }

    /// Delete the first chronological event matching the hint and/or window.
    pub async fn delete_event(&self, args: DeleteEventArgs) -> Result<ExistingEvent, CalendarError> {
        let calendar = self.resolve_calendar(args.calendar_id.as_deref()).await?;
        let window = match args.start_str.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(start) => Some(self.normalizer.normalize(
                start,
                args.end_str.as_deref(),
                args.all_day.unwrap_or(false),
                &self.settings,
            )?),
            None => None,
        };

        let matches = self
            .matcher
            .find_matches(calendar.as_str(), args.summary.as_deref(), window.as_ref(), self.now())
            .await?;
        let target = select_for_deletion(&matches, self.timezone()).cloned().ok_or_else(|| {
            CalendarError::NoMatchFound(match (&args.summary, &window) {
                (Some(summary), _) => summary.clone(),
                (None, Some(range)) => format!("{} - {}", range.start, range.end),
                (None, None) => "upcoming events".to_string(),
            })
        })?;
        if matches.len() > 1 {
            info!("{} events match; deleting only the earliest", matches.len());
        }

        self.backend.delete_event(calendar.as_str(), &target.id).await?;
        info!("Deleted '{}' ({}) from {}", target.summary, target.id, calendar);
        Ok(target)
    }

    pub async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, CalendarError> {
        self.backend.list_calendars().await
    }
}
