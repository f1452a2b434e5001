//! Axum route handlers for the CV API.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::AppError;
use crate::models::{ComplianceReport, CvDraft, RawDocument};
use crate::normalization::{
    check_compliance, check_compliance_with, derive_filename, normalize, validate,
    ComplianceOptions,
};
use crate::state::AppState;

use super::ProcessedCv;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    #[serde(flatten)]
    pub processed: ProcessedCv,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    pub draft: CvDraft,
    pub compliance: ComplianceReport,
}

#[derive(Debug, Deserialize)]
pub struct FilenameRequest {
    pub draft: Value,
    pub candidate_id: String,
    #[serde(default)]
    pub client_label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FilenameResponse {
    pub filename: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/cv/process
///
/// Multipart upload: `file` (required), `candidate_id` and `client_label`
/// (optional). Runs the full pipeline. If the client disconnects, the handler
/// future is dropped and the guard cancels the run.
pub async fn handle_process(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, AppError> {
    let mut upload: Option<RawDocument> = None;
    let mut candidate_id: Option<String> = None;
    let mut client_label: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let mime_type = field.content_type().unwrap_or_default().to_string();
                let filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Could not read file: {e}")))?;
                let doc = RawDocument::new(bytes, mime_type);
                upload = Some(match filename {
                    Some(filename) => doc.with_filename(filename),
                    None => doc,
                });
            }
            "candidate_id" | "client_label" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid '{name}' field: {e}")))?;
                let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
                if name == "candidate_id" {
                    candidate_id = value;
                } else {
                    client_label = value;
                }
            }
            _ => {}
        }
    }

    let doc = upload.ok_or_else(|| AppError::Validation("'file' part is required".to_string()))?;
    if doc.bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let processed = state.pipeline.process(doc, cancel).await?;

    let filename = match candidate_id {
        Some(id) => {
            let label = client_label.unwrap_or_else(|| state.config.default_client_label.clone());
            Some(derive_filename(&processed.draft.header, &id, &label)?)
        }
        None => None,
    };

    Ok(Json(ProcessResponse {
        processed,
        filename,
    }))
}

/// POST /api/v1/cv/compliance
///
/// Scores a draft without reprocessing its source document. An optional
/// top-level `font` declares the font of the rendered CV.
pub async fn handle_compliance(
    Json(mut body): Json<Value>,
) -> Result<Json<ComplianceReport>, AppError> {
    let declared_font = take_font(&mut body)?;
    let draft = validate(body)?;
    let report = check_compliance_with(&draft, &ComplianceOptions { declared_font });
    info!(score = report.score, issues = report.issues.len(), "Compliance checked");
    Ok(Json(report))
}

/// POST /api/v1/cv/normalize
///
/// Validates a draft, runs the rule engine over it and returns the result
/// with a fresh compliance report.
pub async fn handle_normalize(Json(body): Json<Value>) -> Result<Json<NormalizeResponse>, AppError> {
    let draft = normalize(&validate(body)?);
    let compliance = check_compliance(&draft);
    Ok(Json(NormalizeResponse { draft, compliance }))
}

/// POST /api/v1/cv/filename
pub async fn handle_filename(
    State(state): State<AppState>,
    Json(request): Json<FilenameRequest>,
) -> Result<Json<FilenameResponse>, AppError> {
    let draft = normalize(&validate(request.draft)?);
    let label = request
        .client_label
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| state.config.default_client_label.clone());
    let filename = derive_filename(&draft.header, &request.candidate_id, &label)?;
    Ok(Json(FilenameResponse { filename }))
}

fn take_font(body: &mut Value) -> Result<Option<String>, AppError> {
    match body.as_object_mut().and_then(|root| root.remove("font")) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(font)) => Ok(Some(font)),
        Some(_) => Err(AppError::Validation("'font' must be a string".to_string())),
    }
}
