use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::TimeZone;
use chrono_tz::Tz;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use calvox::api_server::{router, ApiState};
use calvox::calendar::memory::InMemoryCalendar;
use calvox::calendar::CalendarService;
use calvox::config::CalendarConfig;
use calvox::tools::ToolRegistry;

const CHICAGO: Tz = chrono_tz::America::Chicago;

fn app(calendar: Arc<InMemoryCalendar>) -> Router {
    calvox::init_logger();
    let base = CHICAGO.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap();
    let service = CalendarService::new(calendar, &CalendarConfig::default()).unwrap().with_base_time(base);
    router(Arc::new(ApiState { tools: Arc::new(ToolRegistry::new(Arc::new(service))) }))
}

async fn invoke(app: Router, body: Value) -> (StatusCode, Value) {
    let request = Request::post("/invoke")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let app = app(Arc::new(InMemoryCalendar::new(CHICAGO)));
    let response = app.oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_lists_all_tools() {
    let app = app(Arc::new(InMemoryCalendar::new(CHICAGO)));
    let response = app.oneshot(Request::get("/tools").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let names: Vec<&str> = body["tools"].as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["create_new_event", "get_next_event", "delete_event", "list_calendars"]);
}

#[tokio::test]
async fn test_create_then_conflict() {
    let calendar = Arc::new(InMemoryCalendar::new(CHICAGO));
    let args = json!({
        "summary": "Board meeting",
        "start_str": "2030-01-15T10:00:00-06:00",
        "end_str": "2030-01-15T11:00:00-06:00"
    });

    let (status, body) = invoke(app(calendar.clone()), json!({ "tool": "create_new_event", "args": args })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["summary"], json!("Board meeting"));
    assert!(body["eventId"].is_string());

    let (status, body) = invoke(app(calendar.clone()), json!({ "tool": "create_new_event", "args": args })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["conflict"]["summary"], json!("Board meeting"));
    assert_eq!(calendar.events().len(), 1);
}

#[tokio::test]
async fn test_unknown_tool_is_bad_request() {
    let app = app(Arc::new(InMemoryCalendar::new(CHICAGO)));
    let (status, body) = invoke(app, json!({ "tool": "send_email" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("unknown_tool"));
}

#[tokio::test]
async fn test_missing_required_argument_is_bad_request() {
    let app = app(Arc::new(InMemoryCalendar::new(CHICAGO)));
    let (status, body) = invoke(app, json!({ "tool": "create_new_event", "args": { "summary": "No start" } })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], json!("invalid_arguments"));
}

#[tokio::test]
async fn test_unparseable_time_is_unprocessable() {
    let app = app(Arc::new(InMemoryCalendar::new(CHICAGO)));
    let args = json!({ "summary": "Someday", "start_str": "when pigs fly" });
    let (status, body) = invoke(app, json!({ "tool": "create_new_event", "args": args })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], json!("parse_error"));
}

#[tokio::test]
async fn test_delete_and_list_calendars() {
    let calendar = Arc::new(InMemoryCalendar::new(CHICAGO));
    let create = json!({ "summary": "Dentist", "start_str": "2026-10-20T08:00:00-05:00" });
    invoke(app(calendar.clone()), json!({ "tool": "create_new_event", "args": create })).await;

    let (status, body) =
        invoke(app(calendar.clone()), json!({ "tool": "delete_event", "args": { "summary": "dentist" } })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"]["summary"], json!("Dentist"));
    assert!(calendar.events().is_empty());

    let (status, body) =
        invoke(app(calendar.clone()), json!({ "tool": "delete_event", "args": { "summary": "dentist" } })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("no_match_found"));

    let (status, body) = invoke(app(calendar), json!({ "tool": "list_calendars" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["calendars"][0]["primary"], json!(true));
}
