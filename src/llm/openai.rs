//! OpenAI chat-completions client with tool calling.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono_tz::Tz;
use log::{debug, info, warn};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{context_instruction, FunctionCaller, FunctionDeclaration, LlmReply};

pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAiTool<'a> {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: &'a FunctionDeclaration,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    tools: Vec<OpenAiTool<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallResponse>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallResponse {
    function: FunctionCallResponse,
}

#[derive(Debug, Deserialize)]
struct FunctionCallResponse {
    name: String,
    #[serde(default)]
    arguments: String,
}

pub struct OpenAiClient {
    client: Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    timezone: Tz,
}

impl OpenAiClient {
    pub fn new(api_key: SecretString, model: Option<String>, timezone: Tz) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
            timezone,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl FunctionCaller for OpenAiClient {
    async fn call(&self, utterance: &str, tools: &[FunctionDeclaration]) -> Result<LlmReply> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: context_instruction(self.timezone) },
                ChatMessage { role: "user", content: utterance.to_string() },
            ],
            tools: tools.iter().map(|function| OpenAiTool { tool_type: "function", function }).collect(),
        };
        info!("Asking {} about '{}'", self.model, utterance);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .context("Failed to reach OpenAI")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read OpenAI response")?;
        if !status.is_success() {
            warn!("OpenAI API error: {} - {}", status, body);
            return Err(anyhow!("OpenAI API error {}: {}", status, body));
        }
        debug!("OpenAI response: {}", body);

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).context("Failed to parse OpenAI response")?;
        let message = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| anyhow!("No response from OpenAI"))?;

        if let Some(call) = message.tool_calls.and_then(|calls| calls.into_iter().next()) {
            let args: Value = if call.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&call.function.arguments)
                    .with_context(|| format!("Invalid tool arguments: {}", call.function.arguments))?
            };
            return Ok(LlmReply::FunctionCall { name: call.function.name, args });
        }
        Ok(LlmReply::Text(message.content.unwrap_or_default().trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tools() -> Vec<FunctionDeclaration> {
        vec![FunctionDeclaration {
            name: "create_new_event".to_string(),
            description: "Create a new calendar event.".to_string(),
            parameters: json!({"type": "object", "properties": {"summary": {"type": "string"}}}),
        }]
    }

    #[tokio::test]
    async fn test_tool_call_arguments_are_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": null, "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {
                        "name": "create_new_event",
                        "arguments": "{\"summary\":\"Gym\",\"start_str\":\"tomorrow 7am\"}"
                    }
                }]}}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(SecretString::from("sk-test".to_string()), None, Tz::UTC)
            .with_base_url(server.uri());
        let reply = client.call("gym tomorrow 7am", &tools()).await.unwrap();
        assert_eq!(
            reply,
            LlmReply::FunctionCall {
                name: "create_new_event".to_string(),
                args: json!({"summary": "Gym", "start_str": "tomorrow 7am"}),
            }
        );
    }

    #[tokio::test]
    async fn test_plain_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": " Which day? "}}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(SecretString::from("sk-test".to_string()), None, Tz::UTC)
            .with_base_url(server.uri());
        assert_eq!(client.call("book it", &tools()).await.unwrap(), LlmReply::Text("Which day?".to_string()));
    }
}
