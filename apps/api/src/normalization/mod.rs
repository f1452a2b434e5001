// EHS normalization core
// Implements: schema validation, the rule engine, compliance scoring, filename derivation.
// Everything here is pure and synchronous; no I/O, no LLM calls.

pub mod compliance;
pub mod dates;
pub mod filename;
pub mod pii;
pub mod rules;
pub mod schema;
pub mod text;

pub use compliance::{check_compliance, check_compliance_with, ComplianceOptions};
pub use filename::{derive_filename, FilenameError};
pub use rules::normalize;
pub use schema::{
    is_missing_value, revalidate, validate, ValidationError, CV_DRAFT_SCHEMA, MISSING_VALUE,
};
