//! Calendar backend seam.
//!
//! Every component that talks to a calendar store receives an `Arc<dyn CalendarBackend>`
//! at construction time; there is no process-global client.

use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::sync::Arc;

use super::google::GoogleCalendar;
use super::memory::InMemoryCalendar;
use super::{CalendarError, CalendarInfo, EventQuery, ExistingEvent, InsertedEvent, NewEvent};
use crate::config::{BackendKind, Config};

#[async_trait]
pub trait CalendarBackend: Send + Sync {
    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, CalendarError>;

    /// Events of one calendar inside the query window, ordered by start ascending and
    /// capped at `query.max_results`.
    async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
    ) -> Result<Vec<ExistingEvent>, CalendarError>;

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &NewEvent,
    ) -> Result<InsertedEvent, CalendarError>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError>;
}

/// Build the backend named in the configuration.
pub fn create_backend(config: &Config) -> Result<Arc<dyn CalendarBackend>> {
    match config.calendar.backend {
        BackendKind::Google => {
            info!("Using Google Calendar backend at {}", config.google.api_base);
            Ok(Arc::new(GoogleCalendar::from_config(&config.google)?))
        }
        BackendKind::Memory => {
            info!("Using in-memory calendar backend");
            Ok(Arc::new(InMemoryCalendar::new(config.calendar.timezone()?)))
        }
    }
}
