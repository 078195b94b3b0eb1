//! Language-model collaborator: one function-calling round trip per utterance.

pub mod gemini;
pub mod openai;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use log::info;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::sync::Arc;

use crate::config::{Config, LLMProvider};

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// A tool the model may call, with a JSON-schema parameter object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// What the model sent back.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmReply {
    FunctionCall { name: String, args: Value },
    Text(String),
}

#[async_trait]
pub trait FunctionCaller: Send + Sync {
    async fn call(&self, utterance: &str, tools: &[FunctionDeclaration]) -> Result<LlmReply>;
}

/// System instruction anchoring relative dates.
pub fn context_instruction(timezone: Tz) -> String {
    let now = Utc::now().with_timezone(&timezone);
    format!(
        "You manage the user's calendar. Current date and time: {} ({}). \
         Pass dates and times to tools as the user said them or as ISO 8601.",
        now.format("%A %Y-%m-%d %H:%M"),
        timezone.name()
    )
}

fn api_key(var: &str) -> Result<SecretString> {
    env::var(var)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from)
        .ok_or_else(|| anyhow!("{} environment variable not set", var))
}

/// Build the configured client, or `None` when the fallback is switched off.
pub fn create_function_caller(config: &Config) -> Result<Option<Arc<dyn FunctionCaller>>> {
    let timezone = config.calendar.timezone()?;
    let model = config.language_model.model.clone();
    match config.language_model.provider {
        LLMProvider::Gemini => {
            info!("Using Gemini function calling");
            let client = GeminiClient::new(api_key(gemini::API_KEY_VAR)?, model, timezone);
            Ok(Some(Arc::new(client)))
        }
        LLMProvider::OpenAI => {
            info!("Using OpenAI function calling");
            let client = OpenAiClient::new(api_key(openai::API_KEY_VAR)?, model, timezone);
            Ok(Some(Arc::new(client)))
        }
        LLMProvider::None => {
            info!("Language model fallback disabled");
            Ok(None)
        }
    }
}
