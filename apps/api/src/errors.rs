use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::extraction::ExtractError;
use crate::normalization::{FilenameError, ValidationError};
use crate::pipeline::PipelineError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid CV draft: {0}")]
    InvalidDraft(#[from] ValidationError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl From<FilenameError> for AppError {
    fn from(err: FilenameError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String, Option<&'static str>) {
        match self {
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), None)
            }
            AppError::InvalidDraft(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_DRAFT",
                e.to_string(),
                Some("validation"),
            ),
            AppError::Pipeline(e) => {
                let stage = Some(e.stage());
                let (status, code) = match e {
                    PipelineError::Extraction(ExtractError::UnsupportedFormat { .. }) => {
                        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT")
                    }
                    PipelineError::Extraction(ExtractError::CorruptDocument { .. }) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "CORRUPT_DOCUMENT")
                    }
                    PipelineError::Extraction(ExtractError::Ocr(_)) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "OCR_FAILED")
                    }
                    PipelineError::EmptyDocument => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "EMPTY_DOCUMENT")
                    }
                    PipelineError::AllProvidersFailed(_) => {
                        tracing::error!("Structuring failed: {e}");
                        (StatusCode::BAD_GATEWAY, "ALL_PROVIDERS_FAILED")
                    }
                    PipelineError::NoViableChunks { .. } => {
                        tracing::error!("Structuring failed: {e}");
                        (StatusCode::BAD_GATEWAY, "NO_VIABLE_CHUNKS")
                    }
                    PipelineError::ValidationFailed(_) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_FAILED")
                    }
                    PipelineError::Cancelled => (StatusCode::REQUEST_TIMEOUT, "CANCELLED"),
                    PipelineError::Internal(_) => {
                        tracing::error!("Pipeline error: {e}");
                        return (
                            StatusCode::INTERNAL_SERVER_ERROR,
                            "INTERNAL_ERROR",
                            "An internal server error occurred".to_string(),
                            stage,
                        );
                    }
                };
                (status, code, e.to_string(), stage)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, stage) = self.parts();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "stage": stage
            }
        }));

        (status, body).into_response()
    }
}
