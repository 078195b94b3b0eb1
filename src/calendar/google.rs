//! Google Calendar v3 REST backend.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::fs;
use std::path::Path;
use url::Url;

use super::backend::CalendarBackend;
use super::{
    CalendarError, CalendarInfo, EventQuery, EventTime, ExistingEvent, InsertedEvent, NewEvent,
};
use crate::config::{default_token_path, GoogleConfig};

pub const TOKEN_ENV_VAR: &str = "GOOGLE_CALENDAR_TOKEN";

#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsResponse {
    #[serde(default)]
    items: Vec<EventResource>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResource {
    id: String,
    #[serde(default)]
    summary: String,
    start: Option<EventTime>,
    end: Option<EventTime>,
    html_link: Option<String>,
}

#[derive(Debug, Serialize)]
struct Attendee<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct InsertBody<'a> {
    summary: &'a str,
    start: &'a EventTime,
    end: &'a EventTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attendees: Vec<Attendee<'a>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsertResponse {
    id: String,
    html_link: Option<String>,
}

pub struct GoogleCalendar {
    client: Client,
    base_url: Url,
    token: SecretString,
}

impl GoogleCalendar {
    pub fn new(api_base: &str, token: SecretString) -> Result<Self> {
        let base_url = Url::parse(api_base.trim_end_matches('/'))
            .with_context(|| format!("Invalid Google Calendar API base '{}'", api_base))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("Google Calendar API base '{}' is not a base URL", api_base));
        }
        Ok(Self { client: Client::new(), base_url, token })
    }

    pub fn from_config(config: &GoogleConfig) -> Result<Self> {
        let token = load_token(config)?;
        Self::new(&config.api_base, token)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CalendarError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CalendarError::Backend("API base cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url).bearer_auth(self.token.expose_secret())
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response, CalendarError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CalendarError::Backend(format!("{}: {}", status, error_message(&body))))
    }
}

/// Pull `error.message` out of a Google error payload, falling back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Bearer token from the environment or from a token JSON file.
pub fn load_token(config: &GoogleConfig) -> Result<SecretString> {
    if let Ok(token) = env::var(TOKEN_ENV_VAR) {
        if !token.trim().is_empty() {
            debug!("Using Google token from {}", TOKEN_ENV_VAR);
            return Ok(SecretString::from(token.trim().to_string()));
        }
    }

    let path = match &config.token_path {
        Some(path) => path.clone(),
        None => default_token_path()?,
    };
    read_token_file(&path)
}

fn read_token_file(path: &Path) -> Result<SecretString> {
    let content = fs::read_to_string(path).with_context(|| {
        format!(
            "No Google token: set {} or write a token file to {}",
            TOKEN_ENV_VAR,
            path.display()
        )
    })?;
    let json: Value = serde_json::from_str(&content)
        .with_context(|| format!("Token file {} is not valid JSON", path.display()))?;
    let token = json["token"]
        .as_str()
        .or_else(|| json["access_token"].as_str())
        .ok_or_else(|| anyhow!("Token file {} has no 'token' or 'access_token' field", path.display()))?;
    Ok(SecretString::from(token.to_string()))
}

#[async_trait]
impl CalendarBackend for GoogleCalendar {
    async fn list_calendars(&self) -> Result<Vec<CalendarInfo>, CalendarError> {
        let url = self.endpoint(&["users", "me", "calendarList"])?;
        let response = self.send(self.request(Method::GET, url)).await?;
        let list: CalendarListResponse = response.json().await?;
        debug!("Fetched {} calendars", list.items.len());
        Ok(list.items)
    }

    async fn list_events(
        &self,
        calendar_id: &str,
        query: &EventQuery,
    ) -> Result<Vec<ExistingEvent>, CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let mut params: Vec<(&str, String)> =
            vec![("singleEvents", "true".to_string()), ("orderBy", "startTime".to_string())];
        if let Some(min) = query.time_min {
            params.push(("timeMin", min.to_rfc3339()));
        }
        if let Some(max) = query.time_max {
            params.push(("timeMax", max.to_rfc3339()));
        }
        if let Some(cap) = query.max_results {
            params.push(("maxResults", cap.to_string()));
        }

        // Follow nextPageToken until the window or the cap is exhausted.
        let mut found = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut page_params = params.clone();
            if let Some(token) = &page_token {
                page_params.push(("pageToken", token.clone()));
            }
            let response = self.send(self.request(Method::GET, url.clone()).query(&page_params)).await?;
            let page: EventsResponse = response.json().await?;
            found.extend(page.items.into_iter().filter_map(|item| {
                Some(ExistingEvent {
                    id: item.id,
                    summary: item.summary,
                    start: item.start?,
                    end: item.end?,
                    calendar_id: calendar_id.to_string(),
                    html_link: item.html_link,
                })
            }));

            let capped = query.max_results.is_some_and(|cap| found.len() >= cap as usize);
            match page.next_page_token {
                Some(token) if !capped => {
                    debug!("Fetching next page of {} events ({} so far)", calendar_id, found.len());
                    page_token = Some(token);
                }
                _ => break,
            }
        }
        if let Some(cap) = query.max_results {
            found.truncate(cap as usize);
        }
        Ok(found)
    }

    async fn insert_event(
        &self,
        calendar_id: &str,
        event: &NewEvent,
    ) -> Result<InsertedEvent, CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events"])?;
        let body = InsertBody {
            summary: &event.summary,
            start: &event.range.start,
            end: &event.range.end,
            description: event.description.as_deref(),
            attendees: event.attendees.iter().map(|email| Attendee { email }).collect(),
        };
        debug!("Insert payload: {}", serde_json::to_string(&body).unwrap_or_default());

        let response = self.send(self.request(Method::POST, url).json(&body)).await?;
        let inserted: InsertResponse = response.json().await?;
        info!("Inserted event {} into {}", inserted.id, calendar_id);
        Ok(InsertedEvent { id: inserted.id, html_link: inserted.html_link })
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        let url = self.endpoint(&["calendars", calendar_id, "events", event_id])?;
        self.send(self.request(Method::DELETE, url)).await?;
        info!("Deleted event {} from {}", event_id, calendar_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn calendar() -> GoogleCalendar {
        GoogleCalendar::new("https://www.googleapis.com/calendar/v3/", SecretString::from("t".to_string()))
            .unwrap()
    }

    #[test]
    fn test_endpoint_encodes_calendar_id() {
        let url = calendar().endpoint(&["calendars", "team#x@group.calendar.google.com", "events"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://www.googleapis.com/calendar/v3/calendars/team%23x@group.calendar.google.com/events"
        );
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(r#"{"error":{"code":404,"message":"Not Found"}}"#), "Not Found");
        assert_eq!(error_message("bad gateway\n"), "bad gateway");
    }

    #[test]
    fn test_read_token_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("token.json");
        fs::write(&path, r#"{"access_token":"ya29.abc","refresh_token":"r"}"#)?;
        assert_eq!(read_token_file(&path)?.expose_secret(), "ya29.abc");

        fs::write(&path, r#"{"token":"ya29.def"}"#)?;
        assert_eq!(read_token_file(&path)?.expose_secret(), "ya29.def");

        fs::write(&path, r#"{"refresh_token":"r"}"#)?;
        assert!(read_token_file(&path).is_err());
        assert!(read_token_file(&PathBuf::from("/nonexistent/token.json")).is_err());
        Ok(())
    }
}
