use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};

use calvox::app::Application;
use calvox::calendar::memory::InMemoryCalendar;
use calvox::calendar::{CalendarService, TimeRange, EventTime};
use calvox::config::Config;
use calvox::dispatcher::{DispatchOutcome, DispatchRoute};
use calvox::llm::{FunctionCaller, FunctionDeclaration, LlmReply};
use calvox::voice::{Heard, ScriptedSource};

const CHICAGO: Tz = chrono_tz::America::Chicago;

/// Replays one canned reply and remembers what it was asked.
struct FakeModel {
    reply: Result<LlmReply, String>,
    seen: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeModel {
    fn new(reply: Result<LlmReply, String>) -> Arc<Self> {
        Arc::new(Self { reply, seen: Mutex::new(Vec::new()) })
    }

    fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl FunctionCaller for FakeModel {
    async fn call(&self, utterance: &str, tools: &[FunctionDeclaration]) -> Result<LlmReply> {
        self.seen
            .lock()
            .unwrap()
            .push((utterance.to_string(), tools.iter().map(|t| t.name.clone()).collect()));
        self.reply.clone().map_err(|e| anyhow!(e))
    }
}

fn app(calendar: Arc<InMemoryCalendar>, llm: Option<Arc<dyn FunctionCaller>>) -> Application {
    calvox::init_logger();
    let config = Config::default();
    let base = CHICAGO.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap();
    let service = CalendarService::new(calendar, &config.calendar).unwrap().with_base_time(base);
    Application::from_parts(config, Arc::new(service), llm)
}

fn at(rfc3339: &str) -> EventTime {
    EventTime::instant(DateTime::parse_from_rfc3339(rfc3339).unwrap(), "America/Chicago")
}

#[tokio::test]
async fn test_direct_route_creates_event_without_model() {
    let calendar = Arc::new(InMemoryCalendar::new(CHICAGO));
    let model = FakeModel::new(Ok(LlmReply::Text("unused".to_string())));
    let app = app(calendar.clone(), Some(model.clone()));

    let outcome = app.say("Team meeting tomorrow at 10am").await;

    assert_eq!(outcome.route(), DispatchRoute::DirectDraft);
    assert!(outcome.succeeded(), "{:?}", outcome);
    assert!(model.calls().is_empty());
    let events = calendar.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].summary, "Team meeting");
    assert_eq!(events[0].start.to_utc(CHICAGO), at("2026-10-15T10:00:00-05:00").to_utc(CHICAGO));
}

#[tokio::test]
async fn test_direct_route_keeps_spoken_zone() {
    let calendar = Arc::new(InMemoryCalendar::new(CHICAGO));
    let app = app(calendar.clone(), None);

    let outcome = app.say("Team call tomorrow at 3pm PST").await;

    assert!(outcome.succeeded(), "{:?}", outcome);
    let events = calendar.events();
    assert_eq!(events.len(), 1);
    let pacific = DateTime::parse_from_rfc3339("2026-10-15T15:00:00-07:00").unwrap();
    assert_eq!(events[0].start, EventTime::instant(pacific, "America/Los_Angeles"));
    assert_eq!(events[0].start.time_zone(), Some("America/Los_Angeles"));
}

#[tokio::test]
async fn test_direct_route_reports_conflict() {
    let calendar = Arc::new(InMemoryCalendar::new(CHICAGO));
    calendar
        .seed("primary", "1:1", TimeRange::new(at("2026-10-15T10:30:00-05:00"), at("2026-10-15T11:00:00-05:00")))
        .unwrap();
    let app = app(calendar.clone(), None);

    match app.say("Team meeting tomorrow at 10am").await {
        DispatchOutcome::ToolInvoked { route, tool, result } => {
            assert_eq!(route, DispatchRoute::DirectDraft);
            assert_eq!(tool, "create_new_event");
            assert_eq!(result["success"], json!(false));
            assert_eq!(result["error"], json!("conflict_detected"));
            assert_eq!(result["conflict"]["summary"], json!("1:1"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(calendar.events().len(), 1);
}

#[tokio::test]
async fn test_model_function_call_is_invoked() {
    let calendar = Arc::new(InMemoryCalendar::new(CHICAGO));
    calendar
        .seed("primary", "Planning", TimeRange::new(at("2026-10-16T10:00:00-05:00"), at("2026-10-16T11:00:00-05:00")))
        .unwrap();
    let model = FakeModel::new(Ok(LlmReply::FunctionCall { name: "get_next_event".to_string(), args: json!({}) }));
    let app = app(calendar, Some(model.clone()));

    let outcome = app.say("What's my next event?").await;

    assert_eq!(outcome.route(), DispatchRoute::LlmFallback);
    match outcome {
        DispatchOutcome::ToolInvoked { tool, result, .. } => {
            assert_eq!(tool, "get_next_event");
            assert_eq!(result["summary"], json!("Planning"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }

    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "What's my next event?");
    assert_eq!(calls[0].1, vec!["create_new_event", "get_next_event"]);
}

#[tokio::test]
async fn test_model_may_not_call_undeclared_tools() {
    let calendar = Arc::new(InMemoryCalendar::new(CHICAGO));
    calendar
        .seed("primary", "Planning", TimeRange::new(at("2026-10-16T10:00:00-05:00"), at("2026-10-16T11:00:00-05:00")))
        .unwrap();
    let model = FakeModel::new(Ok(LlmReply::FunctionCall {
        name: "delete_event".to_string(),
        args: json!({ "summary": "Planning" }),
    }));
    let app = app(calendar.clone(), Some(model));

    let outcome = app.say("get rid of planning").await;

    assert!(!outcome.succeeded());
    assert_eq!(calendar.events().len(), 1);
}

#[tokio::test]
async fn test_model_text_reply_becomes_message() {
    let calendar = Arc::new(InMemoryCalendar::new(CHICAGO));
    let model = FakeModel::new(Ok(LlmReply::Text("You have nothing planned.".to_string())));
    let app = app(calendar, Some(model));

    assert_eq!(
        app.say("Am I free?").await,
        DispatchOutcome::Message { route: DispatchRoute::LlmFallback, text: "You have nothing planned.".to_string() }
    );
}

#[tokio::test]
async fn test_model_failure_becomes_message() {
    let calendar = Arc::new(InMemoryCalendar::new(CHICAGO));
    let model = FakeModel::new(Err("quota exceeded".to_string()));
    let app = app(calendar, Some(model));

    match app.say("Am I free?").await {
        DispatchOutcome::Message { route, text } => {
            assert_eq!(route, DispatchRoute::LlmFallback);
            assert!(text.contains("quota exceeded"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[tokio::test]
async fn test_without_model_incomplete_draft_is_a_message() {
    let calendar = Arc::new(InMemoryCalendar::new(CHICAGO));
    let app = app(calendar.clone(), None);

    let outcome = app.say("Buy flowers for mom").await;

    assert!(matches!(outcome, DispatchOutcome::Message { route: DispatchRoute::LlmFallback, .. }));
    assert!(calendar.events().is_empty());
}

#[tokio::test]
async fn test_command_loop_handles_utterances_until_closed() {
    let calendar = Arc::new(InMemoryCalendar::new(CHICAGO));
    let app = app(calendar.clone(), None);
    let mut source = ScriptedSource::new(vec![
        Heard::Utterance("Team meeting tomorrow at 10am".to_string()),
        Heard::Nothing,
        Heard::Utterance("Offsite all day next Tuesday".to_string()),
        Heard::Closed,
        Heard::Utterance("never reached at 3pm".to_string()),
    ]);

    let handled = app.command_loop(&mut source).await;

    assert_eq!(handled, 2);
    assert_eq!(calendar.events().len(), 2);
}
