use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use calvox::calendar::google::GoogleCalendar;
use calvox::calendar::service::CreateEventArgs;
use calvox::calendar::{CalendarBackend, CalendarError, CalendarService, EventQuery, EventTime};
use calvox::config::CalendarConfig;

const CHICAGO: Tz = chrono_tz::America::Chicago;

fn backend(server: &MockServer) -> GoogleCalendar {
    calvox::init_logger();
    GoogleCalendar::new(&server.uri(), SecretString::from("test-token".to_string())).unwrap()
}

#[tokio::test]
async fn test_list_calendars() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "calendar#calendarList",
            "items": [
                {"id": "me@example.com", "summary": "me@example.com", "primary": true},
                {"id": "team@group.calendar.google.com", "summary": "Team"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let calendars = backend(&server).list_calendars().await.unwrap();
    assert_eq!(calendars.len(), 2);
    assert!(calendars[0].primary);
    assert_eq!(calendars[1].summary, "Team");
    assert!(!calendars[1].primary);
}

#[tokio::test]
async fn test_list_events_sends_window_and_skips_incomplete_items() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(query_param("singleEvents", "true"))
        .and(query_param("orderBy", "startTime"))
        .and(query_param("timeMin", "2026-10-14T14:00:00+00:00"))
        .and(query_param("maxResults", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {
                    "id": "evt1",
                    "summary": "Standup",
                    "start": {"dateTime": "2026-10-15T09:00:00-05:00", "timeZone": "America/Chicago"},
                    "end": {"dateTime": "2026-10-15T09:15:00-05:00", "timeZone": "America/Chicago"},
                    "htmlLink": "https://calendar.google.com/event?eid=evt1"
                },
                {"id": "cancelled", "status": "cancelled"},
                {
                    "id": "evt2",
                    "start": {"date": "2026-10-20"},
                    "end": {"date": "2026-10-21"}
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let from = Utc.with_ymd_and_hms(2026, 10, 14, 14, 0, 0).unwrap();
    let events = backend(&server).list_events("primary", &EventQuery::starting_at(from).limit(5)).await.unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].summary, "Standup");
    assert_eq!(events[0].calendar_id, "primary");
    assert_eq!(events[0].html_link.as_deref(), Some("https://calendar.google.com/event?eid=evt1"));
    assert_eq!(events[1].summary, "");
    assert!(events[1].start.is_all_day());
}

fn timed(id: &str, summary: &str, day: u32) -> serde_json::Value {
    json!({
        "id": id,
        "summary": summary,
        "start": {"dateTime": format!("2024-01-{:02}T09:00:00-06:00", day)},
        "end": {"dateTime": format!("2024-01-{:02}T10:00:00-06:00", day)}
    })
}

#[tokio::test]
async fn test_list_events_follows_page_tokens() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(query_param("pageToken", "page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [timed("old-dentist", "Dentist", 3)]
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [timed("s1", "Standup", 1), timed("s2", "Standup", 2)],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = backend(&server).list_events("primary", &EventQuery::unbounded()).await.unwrap();

    let ids: Vec<&str> = events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["s1", "s2", "old-dentist"]);
}

#[tokio::test]
async fn test_list_events_stops_paging_at_the_cap() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .and(query_param("maxResults", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [timed("s1", "Standup", 1), timed("s2", "Standup", 2)],
            "nextPageToken": "page-2"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = backend(&server).list_events("primary", &EventQuery::unbounded().limit(2)).await.unwrap();
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn test_errors_carry_status_and_message() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/calendars/primary/events/gone"))
        .respond_with(ResponseTemplate::new(410).set_body_json(json!({
            "error": {"code": 410, "message": "Resource has been deleted"}
        })))
        .mount(&server)
        .await;

    match backend(&server).delete_event("primary", "gone").await {
        Err(CalendarError::Backend(message)) => {
            assert!(message.contains("410"), "{}", message);
            assert!(message.contains("Resource has been deleted"), "{}", message);
        }
        other => panic!("expected a backend error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_event() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/calendars/primary/events/evt1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server).delete_event("primary", "evt1").await.unwrap();
}

#[tokio::test]
async fn test_service_inserts_with_attendees_split() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .and(body_partial_json(json!({
            "summary": "Lunch",
            "start": {"dateTime": "2030-01-15T12:00:00-06:00", "timeZone": "America/Chicago"},
            "end": {"dateTime": "2030-01-15T13:00:00-06:00", "timeZone": "America/Chicago"},
            "description": "Attendees: Sarah",
            "attendees": [{"email": "bob@example.com"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "new1",
            "htmlLink": "https://calendar.google.com/event?eid=new1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let base = CHICAGO.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap();
    let service = CalendarService::new(Arc::new(backend(&server)), &CalendarConfig::default())
        .unwrap()
        .with_base_time(base);
    let created = service
        .create_event(CreateEventArgs {
            summary: "Lunch".to_string(),
            start_str: "2030-01-15T12:00:00-06:00".to_string(),
            attendees: Some(vec!["bob@example.com".to_string(), "Sarah".to_string()]),
            ..CreateEventArgs::default()
        })
        .await
        .unwrap();

    assert_eq!(created.event_id, "new1");
    assert_eq!(created.link.as_deref(), Some("https://calendar.google.com/event?eid=new1"));
    assert_eq!(
        created.start,
        EventTime::instant(DateTime::parse_from_rfc3339("2030-01-15T12:00:00-06:00").unwrap(), "America/Chicago")
    );
}
