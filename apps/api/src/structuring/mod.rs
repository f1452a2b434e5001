// Structuring
// Implements: ordered provider fallback with per-call timeout and schema validation

pub mod fallback;
pub mod prompts;

pub use fallback::{AttemptError, ProviderChain, StructuringError};
