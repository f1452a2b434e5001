//! OpenAI Chat Completions adapter (JSON mode).

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use super::prompts::{structuring_prompt, JSON_ONLY_SYSTEM};
use super::{
    build_http_client, parse_candidate, send_with_retry, OracleError, StructuringOracle,
    MAX_TOKENS, TEMPERATURE,
};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const MODEL: &str = "gpt-4o";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
    response_format: Value,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Clone)]
pub struct OpenAiOracle {
    client: Client,
    api_key: String,
}

impl OpenAiOracle {
    pub fn new(api_key: String) -> Result<Self, OracleError> {
        Ok(Self {
            client: build_http_client()?,
            api_key,
        })
    }
}

#[async_trait]
impl StructuringOracle for OpenAiOracle {
    fn name(&self) -> &str {
        "openai"
    }

    async fn propose(&self, text: &str, schema: &str) -> Result<Value, OracleError> {
        let prompt = structuring_prompt(text, schema);
        let body = ChatRequest {
            model: MODEL,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
            response_format: json!({"type": "json_object"}),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: JSON_ONLY_SYSTEM,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let response = send_with_retry(self.name(), || {
            self.client
                .post(OPENAI_API_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;

        let parsed: ChatResponse = response.json().await?;
        if let Some(usage) = &parsed.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "OpenAI call succeeded"
            );
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(OracleError::EmptyContent)?;
        parse_candidate(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_content_extraction() {
        let parsed: ChatResponse = serde_json::from_value(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"skills\": [\"Rust\"]}"}}]
        }))
        .unwrap();
        assert!(parsed.usage.is_none());
        let content = parsed.choices[0].message.content.clone().unwrap();
        assert_eq!(parse_candidate(&content).unwrap()["skills"][0], "Rust");
    }
}
