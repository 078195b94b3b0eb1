//! Tool registry: the named operations reachable through `/invoke` and the LLM.

use axum::http::StatusCode;
use log::{info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::calendar::service::{CreateEventArgs, DeleteEventArgs};
use crate::calendar::{CalendarError, CalendarService};
use crate::llm::FunctionDeclaration;

pub const CREATE_NEW_EVENT: &str = "create_new_event";
pub const GET_NEXT_EVENT: &str = "get_next_event";
pub const DELETE_EVENT: &str = "delete_event";
pub const LIST_CALENDARS: &str = "list_calendars";

/// Tools the language model is allowed to call.
pub const LLM_TOOLS: &[&str] = &[CREATE_NEW_EVENT, GET_NEXT_EVENT];

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error("Failed to encode tool result: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::InvalidArguments { .. } => "invalid_arguments",
            ToolError::Calendar(e) => e.kind(),
            ToolError::Encoding(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ToolError::UnknownTool(_) | ToolError::InvalidArguments { .. } => StatusCode::BAD_REQUEST,
            ToolError::Calendar(CalendarError::Parse(_) | CalendarError::InvalidRange(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ToolError::Calendar(
                CalendarError::CalendarNotFound { .. } | CalendarError::NoMatchFound(_),
            ) => StatusCode::NOT_FOUND,
            ToolError::Calendar(CalendarError::ConflictDetected(_)) => StatusCode::CONFLICT,
            ToolError::Calendar(CalendarError::Backend(_)) => StatusCode::BAD_GATEWAY,
            ToolError::Encoding(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Structured failure result.
    pub fn to_result(&self) -> Value {
        let mut result = json!({
            "success": false,
            "error": self.kind(),
            "message": self.to_string(),
        });
        match self {
            ToolError::Calendar(CalendarError::ConflictDetected(event)) => {
                result["conflict"] = serde_json::to_value(event.as_ref()).unwrap_or(Value::Null);
            }
            ToolError::Calendar(CalendarError::CalendarNotFound { available, .. }) => {
                result["available"] = json!(available);
            }
            _ => {}
        }
        result
    }
}

fn create_event_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "calendar_id": {"type": "string", "description": "Calendar id, display name, alias or 'primary'."},
            "summary": {"type": "string", "description": "Event title."},
            "start_str": {"type": "string", "description": "Start, e.g. 'tomorrow at 10am' or ISO 8601."},
            "end_str": {"type": "string", "description": "Optional end. Defaults to one hour (or one day) after the start."},
            "description": {"type": "string"},
            "attendees": {"type": "array", "items": {"type": "string"}, "description": "E-mail addresses or names."},
            "all_day": {"type": "boolean"},
            "ignore_conflict": {"type": "boolean", "description": "Create even if it overlaps another event."},
            "time_zone": {"type": "string", "description": "IANA zone the event is shown in, e.g. 'America/Los_Angeles'."}
        },
        "required": ["summary", "start_str"]
    })
}

fn delete_event_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "calendar_id": {"type": "string"},
            "summary": {"type": "string", "description": "Words from the event title."},
            "start_str": {"type": "string", "description": "Start of the window to search."},
            "end_str": {"type": "string"},
            "all_day": {"type": "boolean"}
        }
    })
}

fn no_parameters() -> Value {
    json!({"type": "object", "properties": {}})
}

fn declaration(name: &str, description: &str, parameters: Value) -> FunctionDeclaration {
    FunctionDeclaration { name: name.to_string(), description: description.to_string(), parameters }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    Ok(serde_json::to_value(value)?)
}

pub struct ToolRegistry {
    service: Arc<CalendarService>,
}

impl ToolRegistry {
    pub fn new(service: Arc<CalendarService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &CalendarService {
        &self.service
    }

    /// Every tool, as listed by `GET /tools`.
    pub fn descriptors(&self) -> Vec<FunctionDeclaration> {
        vec![
            declaration(CREATE_NEW_EVENT, "Create a new calendar event.", create_event_schema()),
            declaration(GET_NEXT_EVENT, "Get the next upcoming event across all calendars.", no_parameters()),
            declaration(DELETE_EVENT, "Delete the earliest event matching a title and/or time.", delete_event_schema()),
            declaration(LIST_CALENDARS, "List the calendars of the account.", no_parameters()),
        ]
    }

    /// The subset declared to the language model.
    pub fn llm_declarations(&self) -> Vec<FunctionDeclaration> {
        self.descriptors().into_iter().filter(|d| LLM_TOOLS.contains(&d.name.as_str())).collect()
    }

    pub async fn invoke(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        info!("Invoking tool {}", tool);
        let args = if args.is_null() { json!({}) } else { args };
        match tool {
            CREATE_NEW_EVENT => {
                let args: CreateEventArgs = parse_args(tool, args)?;
                let created = self.service.create_event(args).await?;
                encode(&created)
            }
            GET_NEXT_EVENT => {
                let next = self.service.get_next_event().await?;
                encode(&next)
            }
            DELETE_EVENT => {
                let args: DeleteEventArgs = parse_args(tool, args)?;
                let deleted = self.service.delete_event(args).await?;
                Ok(json!({ "success": true, "deleted": encode(&deleted)? }))
            }
            LIST_CALENDARS => {
                let calendars = self.service.list_calendars().await?;
                Ok(json!({ "success": true, "calendars": encode(&calendars)? }))
            }
            other => {
                warn!("Unknown tool requested: {}", other);
                Err(ToolError::UnknownTool(other.to_string()))
            }
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args)
        .map_err(|e| ToolError::InvalidArguments { tool: tool.to_string(), reason: e.to_string() })
}
