//! Gemini `generateContent` client with function declarations.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono_tz::Tz;
use log::{debug, info, warn};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{context_instruction, FunctionCaller, FunctionDeclaration, LlmReply};

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

pub struct GeminiClient {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    timezone: Tz,
}

impl GeminiClient {
    pub fn new(api_key: SecretString, model: Option<String>, timezone: Tz) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timezone,
        }
    }

    /// Point the client at another endpoint, e.g. a local mock.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(&self, utterance: &str, tools: &[FunctionDeclaration]) -> Value {
        json!({
            "systemInstruction": { "parts": [{ "text": context_instruction(self.timezone) }] },
            "contents": [{ "role": "user", "parts": [{ "text": utterance }] }],
            "tools": [{ "functionDeclarations": tools }],
        })
    }
}

#[async_trait]
impl FunctionCaller for GeminiClient {
    async fn call(&self, utterance: &str, tools: &[FunctionDeclaration]) -> Result<LlmReply> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        info!("Asking {} about '{}'", self.model, utterance);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&self.request_body(utterance, tools))
            .send()
            .await
            .context("Failed to reach Gemini")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read Gemini response")?;
        if !status.is_success() {
            warn!("Gemini API error: {} - {}", status, body);
            return Err(anyhow!("Gemini API error {}: {}", status, body));
        }
        debug!("Gemini response: {}", body);

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse Gemini response")?;
        let parts = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .ok_or_else(|| anyhow!("No response from Gemini"))?;

        let mut text = String::new();
        for part in parts {
            if let Some(call) = part.function_call {
                let args = if call.args.is_null() { json!({}) } else { call.args };
                return Ok(LlmReply::FunctionCall { name: call.name, args });
            }
            if let Some(fragment) = part.text {
                text.push_str(&fragment);
            }
        }
        Ok(LlmReply::Text(text.trim().to_string()))
    }
}
