/// LLM Client — the structuring oracles behind the CV pipeline.
///
/// ARCHITECTURAL RULE: No other module may call a model provider directly.
/// Every provider is an adapter implementing `StructuringOracle`, and the
/// structuring chain only ever sees that trait.
///
/// All adapters pin temperature to 0 so the same document structures the
/// same way across runs.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub mod anthropic;
pub mod gemini;
pub mod openai;
pub mod prompts;

pub use anthropic::AnthropicOracle;
pub use gemini::GeminiOracle;
pub use openai::OpenAiOracle;

pub const TEMPERATURE: f32 = 0.0;
const MAX_TOKENS: u32 = 8192;
const MAX_RETRIES: u32 = 3;
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("Timed out after {after:?}")]
    Timeout { after: Duration },
}

/// The one capability the pipeline needs from a provider: turn free text into
/// a best-effort JSON candidate for the given schema. The candidate is
/// untrusted; it may be incomplete or violate the schema.
#[async_trait]
pub trait StructuringOracle: Send + Sync {
    fn name(&self) -> &str;

    async fn propose(&self, text: &str, schema: &str) -> Result<Value, OracleError>;
}

pub(crate) fn build_http_client() -> Result<Client, OracleError> {
    Ok(Client::builder().timeout(HTTP_TIMEOUT).build()?)
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// Sends a request built by `make_request`, retrying on transport errors,
/// 429 and 5xx with exponential backoff (1s, 2s). Other non-success statuses
/// fail immediately.
pub(crate) async fn send_with_retry(
    provider: &str,
    make_request: impl Fn() -> RequestBuilder,
) -> Result<Response, OracleError> {
    let mut last_error: Option<OracleError> = None;

    for attempt in 0..MAX_RETRIES {
        if attempt > 0 {
            let delay = Duration::from_millis(1000 * (1 << (attempt - 1)));
            warn!(
                provider,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Oracle call failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }

        let response = match make_request().send().await {
            Ok(r) => r,
            Err(e) => {
                last_error = Some(OracleError::Http(e));
                continue;
            }
        };

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!(provider, %status, "Oracle API returned retryable status");
            last_error = Some(if status.as_u16() == 429 {
                OracleError::RateLimited {
                    retries: attempt + 1,
                }
            } else {
                OracleError::Api {
                    status: status.as_u16(),
                    message: body,
                }
            });
            continue;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        debug!(provider, attempt, "Oracle call succeeded");
        return Ok(response);
    }

    Err(last_error.unwrap_or(OracleError::RateLimited {
        retries: MAX_RETRIES,
    }))
}

/// Parses model text into a JSON candidate, tolerating code fences.
pub(crate) fn parse_candidate(text: &str) -> Result<Value, OracleError> {
    let text = strip_json_fences(text);
    if text.is_empty() {
        return Err(OracleError::EmptyContent);
    }
    Ok(serde_json::from_str(text)?)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_parse_candidate() {
        let value = parse_candidate("```json\n{\"profile\": \"x\"}\n```").unwrap();
        assert_eq!(value["profile"], "x");
        assert!(matches!(parse_candidate("  "), Err(OracleError::EmptyContent)));
        assert!(matches!(parse_candidate("not json"), Err(OracleError::Parse(_))));
    }
}
