// CV processing pipeline
// Implements: extract → (chunk) → structure → normalize → merge → validate → score

pub mod handlers;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::chunking::{chunk, merge_in_document_order};
use crate::extraction::{extract, ExtractError, ExtractOptions};
use crate::models::{ComplianceReport, CvDraft, ExtractionMetadata, RawDocument, TextChunk};
use crate::normalization::{check_compliance, normalize, revalidate};
use crate::structuring::{AttemptError, ProviderChain, StructuringError};

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    #[error("document contains no extractable text")]
    EmptyDocument,

    #[error("structuring failed: {0}")]
    AllProvidersFailed(StructuringError),

    #[error("structured output failed schema validation: {0}")]
    ValidationFailed(String),

    #[error("none of the {chunks} chunk(s) could be structured")]
    NoViableChunks { chunks: usize },

    #[error("processing was cancelled")]
    Cancelled,

    #[error("internal pipeline error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// The stage that failed, so callers can offer a stage-specific retry.
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Extraction(_) | PipelineError::EmptyDocument => "extraction",
            PipelineError::AllProvidersFailed(_) | PipelineError::NoViableChunks { .. } => {
                "structuring"
            }
            PipelineError::ValidationFailed(_) => "validation",
            PipelineError::Cancelled | PipelineError::Internal(_) => "pipeline",
        }
    }
}

impl From<StructuringError> for PipelineError {
    /// A schema-invalid final attempt is reported as a validation failure;
    /// anything else as provider exhaustion.
    fn from(err: StructuringError) -> Self {
        match err.last() {
            Some(AttemptError::Invalid(_)) => PipelineError::ValidationFailed(err.to_string()),
            _ => PipelineError::AllProvidersFailed(err),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PipelineSettings {
    /// Texts longer than this many chars are chunked.
    pub chunk_threshold_chars: usize,
    pub chunk_target_chars: usize,
    pub chunk_overlap_chars: usize,
    /// Upper bound on in-flight oracle calls for one document.
    pub max_concurrent_chunks: usize,
    pub extract: ExtractOptions,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_threshold_chars: 48_000,
            chunk_target_chars: 40_000,
            chunk_overlap_chars: 2_000,
            max_concurrent_chunks: 3,
            extract: ExtractOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessedCv {
    pub draft: CvDraft,
    pub compliance: ComplianceReport,
    pub extraction: ExtractionMetadata,
}

#[derive(Clone)]
pub struct Pipeline {
    chain: ProviderChain,
    settings: Arc<PipelineSettings>,
}

impl Pipeline {
    pub fn new(chain: ProviderChain, settings: PipelineSettings) -> Self {
        Self {
            chain,
            settings: Arc::new(settings),
        }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.chain.provider_names()
    }

    /// Runs one uploaded document through the whole pipeline. Cancelling the
    /// token drops every in-flight oracle call; no partial draft is returned.
    pub async fn process(
        &self,
        doc: RawDocument,
        cancel: CancellationToken,
    ) -> Result<ProcessedCv, PipelineError> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "process",
            %run_id,
            mime = %doc.mime_type,
            filename = doc.filename.as_deref().unwrap_or("-"),
            bytes = doc.size(),
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!(%run_id, "Processing cancelled; discarding partial results");
                Err(PipelineError::Cancelled)
            }
            result = self.run(doc).instrument(span) => result,
        }
    }

    async fn run(&self, doc: RawDocument) -> Result<ProcessedCv, PipelineError> {
        let options = self.settings.extract.clone();
        let extracted = tokio::task::spawn_blocking(move || extract(&doc, &options))
            .await
            .map_err(|e| PipelineError::Internal(format!("extraction task failed: {e}")))??;

        if extracted.text.trim().is_empty() {
            return Err(PipelineError::EmptyDocument);
        }

        let chars = extracted.char_len();
        let draft = if chars > self.settings.chunk_threshold_chars {
            self.structure_chunked(&extracted.text).await?
        } else {
            let structured = self.chain.structure(&extracted.text).await?;
            finalize(&structured)?
        };

        let compliance = check_compliance(&draft);
        info!(
            chars,
            experience = draft.experience.len(),
            education = draft.education.len(),
            score = compliance.score,
            issues = compliance.issues.len(),
            "CV processed"
        );

        Ok(ProcessedCv {
            draft,
            compliance,
            extraction: extracted.metadata,
        })
    }

    async fn structure_chunked(&self, text: &str) -> Result<CvDraft, PipelineError> {
        let settings = &self.settings;
        let chunks: Vec<TextChunk> =
            chunk(text, settings.chunk_target_chars, settings.chunk_overlap_chars).collect();
        let total = chunks.len();
        info!(
            chunks = total,
            target = settings.chunk_target_chars,
            overlap = settings.chunk_overlap_chars,
            "Text exceeds single-pass budget; structuring in chunks"
        );

        let chain = &self.chain;
        let outcomes: Vec<(usize, Result<CvDraft, StructuringError>)> = stream::iter(chunks)
            .map(move |c| async move { (c.index, chain.structure(&c.text).await) })
            .buffer_unordered(settings.max_concurrent_chunks.max(1))
            .collect()
            .await;

        let mut drafts = Vec::with_capacity(total);
        let mut last_error = None;
        for (index, outcome) in outcomes {
            match outcome {
                Ok(draft) => drafts.push((index, normalize(&draft))),
                Err(e) => {
                    warn!(chunk = index, error = %e, "Chunk could not be structured; skipping");
                    last_error = Some(e);
                }
            }
        }

        if drafts.is_empty() {
            return Err(match last_error {
                Some(e) if total == 1 => e.into(),
                _ => PipelineError::NoViableChunks { chunks: total },
            });
        }

        let viable = drafts.len();
        let merged = merge_in_document_order(drafts)
            .map_err(|_| PipelineError::NoViableChunks { chunks: total })?;
        info!(
            viable,
            total,
            experience = merged.experience.len(),
            education = merged.education.len(),
            "Chunk results merged"
        );

        finalize(&merged)
    }
}

/// Normalizes and re-validates a draft before it leaves the pipeline.
fn finalize(draft: &CvDraft) -> Result<CvDraft, PipelineError> {
    revalidate(&normalize(draft)).map_err(|e| PipelineError::ValidationFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::*;
    use crate::extraction::fixtures::minimal_pdf;
    use crate::extraction::{MIME_PDF, MIME_TEXT};
    use crate::llm_client::{OracleError, StructuringOracle};
    use crate::normalization::rules::{RULE_DATE_NORMALIZATION, RULE_TITLE_CAPITALIZATION};
    use crate::normalization::schema::tests::valid_candidate;
    use crate::structuring::fallback::tests::{Behavior, MockOracle};

    fn pipeline_with(providers: Vec<Arc<dyn StructuringOracle>>, settings: PipelineSettings) -> Pipeline {
        Pipeline::new(ProviderChain::new(providers, Duration::from_secs(30)), settings)
    }

    /// Builds a candidate from `ROLE: … | COMPANY: … | FROM: … | TO: …` lines
    /// present in the text it is given, like a well-behaved oracle would.
    struct LineOracle;

    #[async_trait]
    impl StructuringOracle for LineOracle {
        fn name(&self) -> &str {
            "lines"
        }

        async fn propose(&self, text: &str, _schema: &str) -> Result<Value, OracleError> {
            let experience: Vec<Value> = text
                .lines()
                .filter_map(|line| line.strip_prefix("ROLE: "))
                .filter_map(|rest| {
                    let parts: Vec<&str> = rest.split(" | ").collect();
                    let field = |prefix: &str| {
                        parts.iter().find_map(|p| p.strip_prefix(prefix)).map(str::to_string)
                    };
                    Some(json!({
                        "role": parts.first()?,
                        "company": field("COMPANY: ")?,
                        "startDate": field("FROM: ")?,
                        "endDate": field("TO: ")?,
                        "bullets": ["Delivered projects on time."]
                    }))
                })
                .collect();

            Ok(json!({
                "header": {"name": "jane doe", "title": "engineer"},
                "personalDetails": {"languages": ["English"]},
                "profile": "Experienced engineer.",
                "experience": experience,
                "education": [{
                    "degree": "bsc computing",
                    "institution": "University of Leeds",
                    "startDate": "2005-09",
                    "endDate": "2008-06",
                    "details": ["First class honours."]
                }],
                "skills": ["Rust"],
                "interests": ["Climbing"]
            }))
        }
    }

    fn long_cv(jobs: usize) -> String {
        let filler = "Delivered projects on time and within budget. ".repeat(22);
        (0..jobs)
            .map(|k| {
                format!(
                    "ROLE: engineer {k} | COMPANY: Company {k} | FROM: {}-01 | TO: {}-12\n{filler}",
                    1960 + k,
                    1960 + k
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[tokio::test]
    async fn test_three_page_pdf_end_to_end() {
        let pdf = minimal_pdf(&[
            "Jane Doe - lead developer",
            "Acme Ltd 2019-06 to 2021-09",
            "Skills Rust PostgreSQL",
        ]);
        let oracle = MockOracle::new("mock", Behavior::Answer(valid_candidate()));
        let pipeline = pipeline_with(vec![oracle], PipelineSettings::default());

        let doc = RawDocument::new(pdf, MIME_PDF).with_filename("jane.pdf");
        let out = pipeline.process(doc, CancellationToken::new()).await.unwrap();

        assert_eq!(out.extraction.page_count, 3);
        let job = &out.draft.experience[0];
        assert_eq!(job.start_date, "Jun 2019");
        assert_eq!(job.end_date, "Sep 2021");
        assert_eq!(job.role, "Lead Developer");
        let rules = &out.draft.audit.rules_applied;
        assert!(rules.iter().any(|r| r == RULE_DATE_NORMALIZATION));
        assert!(rules.iter().any(|r| r == RULE_TITLE_CAPITALIZATION));
        assert!(out.draft.personal_details.date_of_birth.is_none());
        assert!(out.compliance.compliant);
    }

    #[tokio::test]
    async fn test_oversized_text_is_chunked_without_duplicate_entries() {
        let text = long_cv(60);
        assert!(text.chars().count() > 60_000);

        let settings = PipelineSettings::default();
        let chunks: Vec<TextChunk> =
            chunk(&text, settings.chunk_target_chars, settings.chunk_overlap_chars).collect();
        assert!(chunks.len() >= 2);
        let straddling = (0..60).any(|k| {
            let marker = format!("ROLE: engineer {k} |");
            chunks.iter().filter(|c| c.text.contains(&marker)).count() > 1
        });
        assert!(straddling, "fixture must place an entry in two chunks");

        let pipeline = pipeline_with(vec![Arc::new(LineOracle)], settings);
        let doc = RawDocument::new(text.into_bytes(), MIME_TEXT);
        let out = pipeline.process(doc, CancellationToken::new()).await.unwrap();

        assert_eq!(out.draft.experience.len(), 60);
        assert_eq!(out.draft.experience[0].role, "Engineer 59");
        assert_eq!(out.draft.experience[0].start_date, "Jan 2019");
        assert_eq!(out.draft.experience[59].start_date, "Jan 1960");
        assert_eq!(out.draft.education.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_chunks_are_skipped_when_others_succeed() {
        struct FirstChunkFails;

        #[async_trait]
        impl StructuringOracle for FirstChunkFails {
            fn name(&self) -> &str {
                "flaky"
            }

            async fn propose(&self, text: &str, schema: &str) -> Result<Value, OracleError> {
                if text.contains("ROLE: engineer 0 |") {
                    return Err(OracleError::EmptyContent);
                }
                LineOracle.propose(text, schema).await
            }
        }

        let pipeline = pipeline_with(vec![Arc::new(FirstChunkFails)], PipelineSettings::default());
        let doc = RawDocument::new(long_cv(60).into_bytes(), MIME_TEXT);
        let out = pipeline.process(doc, CancellationToken::new()).await.unwrap();
        assert!(!out.draft.experience.is_empty());
        assert!(out.draft.experience.len() < 60);
    }

    #[tokio::test]
    async fn test_every_chunk_failing_is_no_viable_chunks() {
        let oracle = MockOracle::new("down", Behavior::Fail);
        let pipeline = pipeline_with(vec![oracle], PipelineSettings::default());
        let doc = RawDocument::new(long_cv(60).into_bytes(), MIME_TEXT);
        let err = pipeline.process(doc, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoViableChunks { .. }));
        assert_eq!(err.stage(), "structuring");
    }

    #[tokio::test]
    async fn test_single_pass_failures_map_to_stage() {
        let down = MockOracle::new("down", Behavior::Fail);
        let pipeline = pipeline_with(vec![down], PipelineSettings::default());
        let doc = RawDocument::new("Jane Doe, engineer", MIME_TEXT);
        let err = pipeline.process(doc, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::AllProvidersFailed(_)));

        let invalid = MockOracle::new("bad", Behavior::Answer(json!({"profile": "x"})));
        let pipeline = pipeline_with(vec![invalid], PipelineSettings::default());
        let doc = RawDocument::new("Jane Doe, engineer", MIME_TEXT);
        let err = pipeline.process(doc, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::ValidationFailed(_)));
        assert_eq!(err.stage(), "validation");
    }

    #[tokio::test]
    async fn test_extraction_errors_surface_without_calling_oracle() {
        let oracle = MockOracle::new("mock", Behavior::Answer(valid_candidate()));
        let pipeline = pipeline_with(vec![oracle.clone()], PipelineSettings::default());

        let doc = RawDocument::new(vec![0u8; 8], "image/png");
        let err = pipeline.process(doc, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Extraction(ExtractError::UnsupportedFormat { .. })
        ));
        assert_eq!(err.stage(), "extraction");

        let doc = RawDocument::new("  \n\n  ", MIME_TEXT);
        let err = pipeline.process(doc, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyDocument));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_discards_in_flight_work() {
        let oracle = MockOracle::new("slow", Behavior::Hang);
        let pipeline = pipeline_with(vec![oracle], PipelineSettings::default());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let doc = RawDocument::new("Jane Doe, engineer", MIME_TEXT);
        let err = pipeline.process(doc, cancel).await.unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }
}
