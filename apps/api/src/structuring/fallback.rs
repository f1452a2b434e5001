//! Ordered provider fallback.
//!
//! Providers are tried in configured order. A transport/API failure, a timeout
//! and a schema-invalid candidate all count as a failed attempt and move on to
//! the next provider. The first candidate that passes the validator wins.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::llm_client::{OracleError, StructuringOracle};
use crate::models::CvDraft;
use crate::normalization::{validate, ValidationError};

use super::prompts::schema_description;

#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("candidate rejected by schema validator: {0}")]
    Invalid(#[from] ValidationError),
}

#[derive(Debug)]
pub struct FailedAttempt {
    pub provider: String,
    pub error: AttemptError,
}

impl fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

#[derive(Debug, Error)]
pub enum StructuringError {
    #[error("all {} provider attempt(s) failed; last: {}", .attempts.len(), last_attempt(.attempts))]
    AllProvidersFailed { attempts: Vec<FailedAttempt> },

    #[error("no structuring providers configured")]
    NoProviders,
}

impl StructuringError {
    /// The error from the final attempt, if any attempt was made.
    pub fn last(&self) -> Option<&AttemptError> {
        match self {
            StructuringError::AllProvidersFailed { attempts } => attempts.last().map(|a| &a.error),
            StructuringError::NoProviders => None,
        }
    }
}

fn last_attempt(attempts: &[FailedAttempt]) -> String {
    attempts
        .last()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

#[derive(Clone)]
pub struct ProviderChain {
    providers: Vec<Arc<dyn StructuringOracle>>,
    timeout: Duration,
    schema: Arc<str>,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn StructuringOracle>>, timeout: Duration) -> Self {
        Self {
            providers,
            timeout,
            schema: schema_description().into(),
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Structures one text unit (whole document or one chunk) into a
    /// validated draft.
    pub async fn structure(&self, text: &str) -> Result<CvDraft, StructuringError> {
        if self.providers.is_empty() {
            return Err(StructuringError::NoProviders);
        }

        let mut attempts = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match self.attempt(provider.as_ref(), text).await {
                Ok(draft) => {
                    info!(provider = provider.name(), failed_before = attempts.len(), "Candidate accepted");
                    return Ok(draft);
                }
                Err(error) => {
                    warn!(provider = provider.name(), error = %error, "Provider attempt failed");
                    attempts.push(FailedAttempt {
                        provider: provider.name().to_string(),
                        error,
                    });
                }
            }
        }

        Err(StructuringError::AllProvidersFailed { attempts })
    }

    async fn attempt(&self, provider: &dyn StructuringOracle, text: &str) -> Result<CvDraft, AttemptError> {
        let candidate = tokio::time::timeout(self.timeout, provider.propose(text, &self.schema))
            .await
            .map_err(|_| OracleError::Timeout {
                after: self.timeout,
            })??;
        Ok(validate(candidate)?)
    }
}
