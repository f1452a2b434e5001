//! Google Gemini generateContent adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::prompts::{structuring_prompt, JSON_ONLY_SYSTEM};
use super::{
    build_http_client, parse_candidate, send_with_retry, OracleError, StructuringOracle,
    MAX_TOKENS, TEMPERATURE,
};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const MODEL: &str = "gemini-1.5-pro";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn text(&self) -> Option<String> {
        let parts = &self.candidates.first()?.content.as_ref()?.parts;
        let joined: String = parts.iter().filter_map(|p| p.text.as_deref()).collect();
        (!joined.trim().is_empty()).then_some(joined)
    }
}

#[derive(Clone)]
pub struct GeminiOracle {
    client: Client,
    api_key: String,
}

impl GeminiOracle {
    pub fn new(api_key: String) -> Result<Self, OracleError> {
        Ok(Self {
            client: build_http_client()?,
            api_key,
        })
    }
}

#[async_trait]
impl StructuringOracle for GeminiOracle {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn propose(&self, text: &str, schema: &str) -> Result<Value, OracleError> {
        let prompt = structuring_prompt(text, schema);
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: JSON_ONLY_SYSTEM,
                }],
            },
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_TOKENS,
                response_mime_type: "application/json",
            },
        };
        let url = format!("{GEMINI_API_BASE}/{MODEL}:generateContent");

        let response = send_with_retry(self.name(), || {
            self.client
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed.text().ok_or(OracleError::EmptyContent)?;
        parse_candidate(&text)
    }
}
