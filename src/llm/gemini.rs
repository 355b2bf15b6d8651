//! Gemini `generateContent` backend.

use super::{ChatTurn, CompletionRequest, ModelBackend, ModelReply};
use crate::config::LlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use serde::Deserialize;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model backend speaking the Gemini REST API.
pub struct GeminiBackend {
    client: reqwest::Client,
    model: String,
    api_key: String,
}

impl GeminiBackend {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Value {
        let mut contents = Vec::new();
        for turn in &request.turns {
            contents.push(match turn {
                ChatTurn::User { text } => serde_json::json!({
                    "role": "user",
                    "parts": [{"text": text}],
                }),
                ChatTurn::Assistant { text } => serde_json::json!({
                    "role": "model",
                    "parts": [{"text": text}],
                }),
                ChatTurn::ToolCall { name, args } => serde_json::json!({
                    "role": "model",
                    "parts": [{"functionCall": {"name": name, "args": args}}],
                }),
                ChatTurn::ToolResult { name, output } => serde_json::json!({
                    "role": "function",
                    "parts": [{
                        "functionResponse": {
                            "name": name,
                            "response": {"content": output},
                        }
                    }],
                }),
            });
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "systemInstruction": {"parts": [{"text": request.system_instruction}]},
            "generationConfig": {"temperature": 0.4, "maxOutputTokens": 8192},
        });

        if !request.tools.is_empty() {
            let declarations: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|tool| {
                    serde_json::json!({
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    })
                })
                .collect();
            body["tools"] = serde_json::json!([{"functionDeclarations": declarations}]);
        }

        body
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(rename = "functionCall", default)]
    function_call: Option<FunctionCall>,
}

#[derive(Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelReply, LlmError> {
        let url = format!(
            "{BASE_URL}/models/{}:generateContent?key={}",
            self.model, self.api_key
        );
        let body = self.build_body(request);

        tracing::debug!(model = %self.model, turns = request.turns.len(), "model request");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Http(error)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: truncate(&message, 500),
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|error| LlmError::Malformed(error.to_string()))?;

        let content = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .ok_or(LlmError::EmptyResponse)?;

        // A candidate may interleave text and a function call; a requested
        // call takes precedence so the loop can execute it.
        let mut text_parts = Vec::new();
        for part in content.parts {
            if let Some(call) = part.function_call {
                return Ok(ModelReply::ToolCall {
                    name: call.name,
                    args: call.args,
                });
            }
            if let Some(text) = part.text {
                text_parts.push(text);
            }
        }

        let text = text_parts.join("").trim().to_string();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(ModelReply::Text(text))
    }
}

fn truncate(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}
