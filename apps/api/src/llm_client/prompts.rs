// Shared prompt constants and prompt-building utilities.
// Domain-specific instructions live with the caller (structuring/prompts.rs);
// this file holds the provider-agnostic framing every adapter sends.

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Builds the user message: the target schema followed by the source text.
pub fn structuring_prompt(text: &str, schema: &str) -> String {
    format!(
        "Convert the document below into a single JSON object that matches this schema.\n\n\
         SCHEMA:\n{schema}\n\n\
         DOCUMENT:\n<<<\n{text}\n>>>"
    )
}
