use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Structuring providers that can appear in `ORACLE_PROVIDER_ORDER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    OpenAi,
    Gemini,
}

impl Provider {
    fn key_var(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAi),
            "gemini" => Ok(Provider::Gemini),
            other => bail!("Unknown structuring provider '{other}'"),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
        };
        f.write_str(name)
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if a value is malformed or no provider key is set.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub provider_order: Vec<Provider>,
    pub oracle_timeout: Duration,
    pub max_concurrent_chunks: usize,
    pub chunk_threshold_chars: usize,
    pub chunk_target_chars: usize,
    pub chunk_overlap_chars: usize,
    pub ocr_enabled: bool,
    pub min_pdf_text_chars: usize,
    pub default_client_label: String,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider_order = get("ORACLE_PROVIDER_ORDER")
            .unwrap_or_else(|| "anthropic,openai,gemini".to_string())
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(Provider::from_str)
            .collect::<Result<Vec<_>>>()
            .context("ORACLE_PROVIDER_ORDER must be a comma-separated list of providers")?;

        let config = Config {
            port: parse_or(&get, "PORT", 8080)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            anthropic_api_key: get(Provider::Anthropic.key_var()),
            openai_api_key: get(Provider::OpenAi.key_var()),
            gemini_api_key: get(Provider::Gemini.key_var()),
            provider_order,
            oracle_timeout: Duration::from_secs(parse_or(&get, "ORACLE_TIMEOUT_SECS", 90)?),
            max_concurrent_chunks: parse_or(&get, "MAX_CONCURRENT_CHUNKS", 3)?,
            chunk_threshold_chars: parse_or(&get, "CHUNK_THRESHOLD_CHARS", 48_000)?,
            chunk_target_chars: parse_or(&get, "CHUNK_TARGET_CHARS", 40_000)?,
            chunk_overlap_chars: parse_or(&get, "CHUNK_OVERLAP_CHARS", 2_000)?,
            ocr_enabled: parse_or(&get, "OCR_ENABLED", false)?,
            min_pdf_text_chars: parse_or(&get, "MIN_PDF_TEXT_CHARS", 100)?,
            default_client_label: get("DEFAULT_CLIENT_LABEL").unwrap_or_else(|| "EHS".to_string()),
            max_upload_bytes: parse_or(&get, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.enabled_providers().is_empty() {
            bail!(
                "No structuring provider is usable: set at least one of ANTHROPIC_API_KEY, \
                 OPENAI_API_KEY, GEMINI_API_KEY for a provider listed in ORACLE_PROVIDER_ORDER"
            );
        }
        if self.oracle_timeout.is_zero() {
            bail!("ORACLE_TIMEOUT_SECS must be greater than zero");
        }
        if self.max_concurrent_chunks == 0 {
            bail!("MAX_CONCURRENT_CHUNKS must be at least 1");
        }
        if self.chunk_target_chars < 2 || self.chunk_overlap_chars * 2 >= self.chunk_target_chars {
            bail!(
                "CHUNK_OVERLAP_CHARS ({}) must be less than half of CHUNK_TARGET_CHARS ({})",
                self.chunk_overlap_chars,
                self.chunk_target_chars
            );
        }
        if self.chunk_threshold_chars == 0 {
            bail!("CHUNK_THRESHOLD_CHARS must be greater than zero");
        }
        Ok(())
    }

    fn api_key(&self, provider: Provider) -> Option<&String> {
        match provider {
            Provider::Anthropic => self.anthropic_api_key.as_ref(),
            Provider::OpenAi => self.openai_api_key.as_ref(),
            Provider::Gemini => self.gemini_api_key.as_ref(),
        }
    }

    /// Providers in fallback order, restricted to those with a key.
    pub fn enabled_providers(&self) -> Vec<(Provider, String)> {
        let mut seen = Vec::new();
        self.provider_order
            .iter()
            .filter(|p| {
                let first = !seen.contains(*p);
                seen.push(**p);
                first
            })
            .filter_map(|p| self.api_key(*p).map(|key| (*p, key.clone())))
            .collect()
    }
}

// Keys are left out on purpose.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("port", &self.port)
            .field("rust_log", &self.rust_log)
            .field("provider_order", &self.provider_order)
            .field("oracle_timeout", &self.oracle_timeout)
            .field("max_concurrent_chunks", &self.max_concurrent_chunks)
            .field("chunk_threshold_chars", &self.chunk_threshold_chars)
            .field("chunk_target_chars", &self.chunk_target_chars)
            .field("chunk_overlap_chars", &self.chunk_overlap_chars)
            .field("ocr_enabled", &self.ocr_enabled)
            .field("min_pdf_text_chars", &self.min_pdf_text_chars)
            .field("default_client_label", &self.default_client_label)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .finish_non_exhaustive()
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}
