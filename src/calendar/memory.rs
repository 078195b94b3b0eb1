//! Process-local calendar store with the same list/insert/delete semantics as the REST
//! backend. Used by tests and by `backend = "memory"`.

use async_trait::async_trait;
use chrono_tz::Tz;
use log::debug;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::backend::CalendarBackend;
use super::{
    CalendarError, CalendarInfo, EventQuery, ExistingEvent, InsertedEvent, NewEvent, TimeRange,
    PRIMARY_CALENDAR,
};

pub const DEFAULT_PRIMARY_ID: &str = "me@calvox.local";

#[derive(Debug, Default)]
struct Store {
    calendars: Vec<CalendarInfo>,
    events: Vec<ExistingEvent>,
}

#[derive(Debug)]
pub struct InMemoryCalendar {
    timezone: Tz,
    store: Mutex<Store>,
}

impl InMemoryCalendar {
    /// A store holding one primary calendar.
    pub fn new(timezone: Tz) -> Self {
        Self::with_calendars(timezone, vec![CalendarInfo::primary(DEFAULT_PRIMARY_ID, "Calendar")])
    }

    pub fn with_calendars(timezone: Tz, calendars: Vec<CalendarInfo>) -> Self {
        Self { timezone, store: Mutex::new(Store { calendars, events: Vec::new() }) }
    }

    /// Put an event straight into the store, bypassing conflict checks.
    pub fn seed(
        &self,
        calendar_id: &str,
        summary: &str,
        range: TimeRange,
    ) -> Result<ExistingEvent, CalendarError> {
        let mut store = self.lock()?;
        let calendar_id = resolve_id(&store, calendar_id)?;
        let id = Uuid::new_v4().simple().to_string();
        let event = ExistingEvent {
            html_link: Some(link(&calendar_id, &id)),
            id,
            summary: summary.to_string(),
            start: range.start,
            end: range.end,
            calendar_id,
        };
        store.events.push(event.clone());
        Ok(event)
    }

    /// Snapshot of every stored event, in insertion order.
    pub fn events(&self) -> Vec<ExistingEvent> {
        self.store.lock().map(|store| store.events.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Store>, CalendarError> {
        self.store
            .lock()
            .map_err(|e| CalendarError::Backend(format!("calendar store poisoned: {}", e)))
    }
}

fn resolve_id(store: &Store, calendar_id: &str) -> Result<String, CalendarError> {
    let found = if calendar_id == PRIMARY_CALENDAR {
        store.calendars.iter().find(|c| c.primary)
    } else {
        store.calendars.iter().find(|c| c.id == calendar_id)
    };
    found
        .map(|c| c.id.clone())
        .ok_or_else(|| CalendarError::Backend(format!("404 Not Found: calendar {}", calendar_id)))
}

fn link(calendar_id: &str, event_id: &str) -> String {
    format!("memory://{}/{}", calendar_id, event_id)
}

#[async_trait]
impl CalendarBackend for InMemoryCalendar {
    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, CalendarError> {
        Ok(self.lock()?.calendars.clone())
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
    ) -> Result<Vec<ExistingEvent>, CalendarError> {
        let store = self.lock()?;
        let calendar_id = resolve_id(&store, calendar_id)?;

        let mut events: Vec<ExistingEvent> = store
            .events
            .iter()
            .filter(|event| event.calendar_id == calendar_id)
            .filter(|event| {
                let (start, end) = event.range().utc_bounds(self.timezone);
                query.time_min.map_or(true, |min| end > min)
                    && query.time_max.map_or(true, |max| start < max)
            })
            .cloned()
            .collect();
        events.sort_by_key(|event| event.start.to_utc(self.timezone));
        if let Some(cap) = query.max_results {
            events.truncate(cap as usize);
        }

        debug!("Memory backend: {} events in {}", events.len(), calendar_id);
        Ok(events)
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &NewEvent,
    ) -> Result<InsertedEvent, CalendarError> {
        let mut store = self.lock()?;
        let calendar_id = resolve_id(&store, calendar_id)?;
        let id = Uuid::new_v4().simple().to_string();
        let html_link = link(&calendar_id, &id);

        store.events.push(ExistingEvent {
            id: id.clone(),
            summary: event.summary.clone(),
            start: event.range.start.clone(),
            end: event.range.end.clone(),
            calendar_id,
            html_link: Some(html_link.clone()),
        });
        Ok(InsertedEvent { id, html_link: Some(html_link) })
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        let mut store = self.lock()?;
        let calendar_id = resolve_id(&store, calendar_id)?;
        let before = store.events.len();
        store.events.retain(|event| !(event.calendar_id == calendar_id && event.id == event_id));
        if store.events.len() == before {
            return Err(CalendarError::Backend(format!("404 Not Found: event {}", event_id)));
        }
        Ok(())
    }
}
