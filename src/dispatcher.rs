//! Routes one utterance to exactly one tool call or one message.
//!
//! The fast path is the pattern-based [`CommandParser`]; when its draft is not actionable
//! the utterance goes to the language model with the create/next tool declarations.

use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

use crate::calendar::service::CreateEventArgs;
use crate::calendar::{EventDraft, EventTime};
use crate::llm::{FunctionCaller, LlmReply};
use crate::parser::CommandParser;
use crate::tools::{ToolError, ToolRegistry, CREATE_NEW_EVENT, LLM_TOOLS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchRoute {
    DirectDraft,
    LlmFallback,
}

impl fmt::Display for DispatchRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchRoute::DirectDraft => f.write_str("direct"),
            DispatchRoute::LlmFallback => f.write_str("llm"),
        }
    }
}

/// Terminal state of one dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// A tool ran; `result` is its success or failure payload.
    ToolInvoked { route: DispatchRoute, tool: String, result: Value },
    /// Nothing ran; `text` is for the user.
    Message { route: DispatchRoute, text: String },
}

impl DispatchOutcome {
    pub fn route(&self) -> DispatchRoute {
        match self {
            DispatchOutcome::ToolInvoked { route, .. } | DispatchOutcome::Message { route, .. } => *route,
        }
    }

    pub fn succeeded(&self) -> bool {
        match self {
            DispatchOutcome::ToolInvoked { result, .. } => result["success"] != json!(false),
            DispatchOutcome::Message { .. } => false,
        }
    }
}

pub struct Dispatcher {
    parser: CommandParser,
    tools: Arc<ToolRegistry>,
    llm: Option<Arc<dyn FunctionCaller>>,
}

impl Dispatcher {
    pub fn new(parser: CommandParser, tools: Arc<ToolRegistry>, llm: Option<Arc<dyn FunctionCaller>>) -> Self {
        Self { parser, tools, llm }
    }

    /// Handle one utterance. Failures come back as outcomes, never as errors.
    pub async fn dispatch(&self, utterance: &str) -> DispatchOutcome {
        let draft = self.parser.parse(utterance);
        if draft.is_actionable() {
            info!("Dispatch route: direct draft '{}'", draft.summary);
            let args = match serde_json::to_value(draft_to_args(&draft)) {
                Ok(args) => args,
                Err(e) => {
                    return DispatchOutcome::Message {
                        route: DispatchRoute::DirectDraft,
                        text: format!("Could not encode event: {}", e),
                    }
                }
            };
            return self.invoke(DispatchRoute::DirectDraft, CREATE_NEW_EVENT, args).await;
        }

        debug!("Draft not actionable ({:?}); using language model", draft);
        let route = DispatchRoute::LlmFallback;
        let Some(llm) = &self.llm else {
            return DispatchOutcome::Message {
                route,
                text: "Sorry, I could not work out an event from that.".to_string(),
            };
        };

        match llm.call(utterance, &self.tools.llm_declarations()).await {
            Ok(LlmReply::FunctionCall { name, args }) => {
                if !LLM_TOOLS.contains(&name.as_str()) {
                    warn!("Model asked for undeclared tool {}", name);
                    let result = ToolError::UnknownTool(name.clone()).to_result();
                    return DispatchOutcome::ToolInvoked { route, tool: name, result };
                }
                self.invoke(route, &name, args).await
            }
            Ok(LlmReply::Text(text)) => DispatchOutcome::Message { route, text },
            Err(e) => {
                warn!("Language model call failed: {:#}", e);
                DispatchOutcome::Message { route, text: format!("Language model unavailable: {}", e) }
            }
        }
    }

    async fn invoke(&self, route: DispatchRoute, tool: &str, args: Value) -> DispatchOutcome {
        let result = match self.tools.invoke(tool, args).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Tool {} failed: {}", tool, e);
                e.to_result()
            }
        };
        DispatchOutcome::ToolInvoked { route, tool: tool.to_string(), result }
    }
}

fn time_arg(time: &EventTime) -> String {
    match time {
        EventTime::Date { date } => date.format("%Y-%m-%d").to_string(),
        EventTime::DateTime { date_time, .. } => date_time.to_rfc3339(),
    }
}

/// Tool arguments for an actionable draft.
pub fn draft_to_args(draft: &EventDraft) -> CreateEventArgs {
    CreateEventArgs {
        calendar_id: Some(draft.calendar_id.clone()),
        summary: draft.summary.clone(),
        start_str: draft.start.as_ref().map(time_arg).unwrap_or_default(),
        end_str: draft.end.as_ref().map(time_arg),
        description: draft.description.clone(),
        attendees: (!draft.attendees.is_empty()).then(|| draft.attendees.clone()),
        all_day: Some(draft.all_day),
        ignore_conflict: None,
        time_zone: draft.start.as_ref().and_then(EventTime::time_zone).map(str::to_string),
    }
}
