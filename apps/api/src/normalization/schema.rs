//! Schema Validator: the only door from untyped oracle output into a `CvDraft`.
//!
//! Missing required fields, empty required strings and empty required arrays
//! are rejected with field-level detail. Unknown fields are carried along in
//! the `extra` maps, never rejected.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{
    Audit, CvDraft, EducationEntry, ExperienceEntry, ExtraFields, Header, PersonalDetails,
};

/// Human/LLM readable description of the CvDraft schema, sent with every
/// structuring request.
pub const CV_DRAFT_SCHEMA: &str = r#"{
  "header": {"name": "string (required)", "title": "string (required)", "photoUrl": "absolute URL | null"},
  "personalDetails": {
    "nationality": "string",
    "languages": ["string (at least one)"],
    "dateOfBirth": "string",
    "maritalStatus": "string"
  },
  "profile": "string (required professional summary)",
  "experience": [
    {"role": "string", "company": "string", "startDate": "string", "endDate": "string",
     "bullets": ["string (at least one)"]}
  ],
  "education": [
    {"degree": "string", "institution": "string", "startDate": "string", "endDate": "string",
     "details": ["string (at least one)"]}
  ],
  "skills": ["string (at least one)"],
  "interests": ["string (at least one)"]
}
Every array must contain at least one entry. Every string must be non-empty."#;

/// Stand-in a provider uses for a required value the text does not contain.
pub const MISSING_VALUE: &str = "Not stated";

/// True for [`MISSING_VALUE`] in any casing or spacing.
pub fn is_missing_value(value: &str) -> bool {
    value.split_whitespace().collect::<Vec<_>>().join(" ").eq_ignore_ascii_case(MISSING_VALUE)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} schema violation(s): {}", .violations.len(), summarize(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .take(5)
        .map(|v| format!("{}: {}", v.path, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Top-level shape used only after the structural walk has passed.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CandidateFields {
    header: Header,
    personal_details: PersonalDetails,
    profile: String,
    experience: Vec<ExperienceEntry>,
    education: Vec<EducationEntry>,
    skills: Vec<String>,
    interests: Vec<String>,
    #[serde(default)]
    audit: Audit,
    #[serde(flatten)]
    extra: ExtraFields,
}

/// Validates an oracle candidate (or any inbound JSON) into a `CvDraft`.
pub fn validate(mut candidate: Value) -> Result<CvDraft, ValidationError> {
    let violations = collect_violations(&candidate);
    if !violations.is_empty() {
        return Err(ValidationError { violations });
    }

    // An explicit `"audit": null` means "no trail yet".
    if let Some(root) = candidate.as_object_mut() {
        if root.get("audit").is_some_and(Value::is_null) {
            root.remove("audit");
        }
    }

    let fields: CandidateFields = serde_json::from_value(candidate).map_err(|e| ValidationError {
        violations: vec![FieldViolation {
            path: "$".to_string(),
            message: e.to_string(),
        }],
    })?;

    Ok(CvDraft {
        header: fields.header,
        personal_details: fields.personal_details,
        profile: fields.profile,
        experience: fields.experience,
        education: fields.education,
        skills: fields.skills,
        interests: fields.interests,
        audit: fields.audit,
        extra: fields.extra,
    })
}

/// Re-checks a draft that was produced by a transform (normalize, merge).
pub fn revalidate(draft: &CvDraft) -> Result<CvDraft, ValidationError> {
    validate(draft.to_value())
}

fn collect_violations(candidate: &Value) -> Vec<FieldViolation> {
    let mut out = Vec::new();

    let Some(root) = candidate.as_object() else {
        push(&mut out, "$", "expected a JSON object");
        return out;
    };

    if let Some(header) = object_at(root, "header", "header", &mut out) {
        require_string(header, "name", "header.name", &mut out);
        require_string(header, "title", "header.title", &mut out);
        check_photo_url(header, &mut out);
    }

    if let Some(details) = object_at(root, "personalDetails", "personalDetails", &mut out) {
        require_string_array(details, "languages", "personalDetails.languages", &mut out);
        for key in ["nationality", "dateOfBirth", "maritalStatus"] {
            optional_string(details, key, &format!("personalDetails.{key}"), &mut out);
        }
    }

    require_string(root, "profile", "profile", &mut out);

    if let Some(entries) = require_array(root, "experience", "experience", &mut out) {
        for (i, entry) in entries.iter().enumerate() {
            let base = format!("experience[{i}]");
            let Some(entry) = entry.as_object() else {
                push(&mut out, &base, "expected an object");
                continue;
            };
            for key in ["role", "company", "startDate", "endDate"] {
                require_string(entry, key, &format!("{base}.{key}"), &mut out);
            }
            require_string_array(entry, "bullets", &format!("{base}.bullets"), &mut out);
        }
    }

    if let Some(entries) = require_array(root, "education", "education", &mut out) {
        for (i, entry) in entries.iter().enumerate() {
            let base = format!("education[{i}]");
            let Some(entry) = entry.as_object() else {
                push(&mut out, &base, "expected an object");
                continue;
            };
            for key in ["degree", "institution", "startDate", "endDate"] {
                require_string(entry, key, &format!("{base}.{key}"), &mut out);
            }
            require_string_array(entry, "details", &format!("{base}.details"), &mut out);
        }
    }

    require_string_array(root, "skills", "skills", &mut out);
    require_string_array(root, "interests", "interests", &mut out);

    if let Some(audit) = root.get("audit").filter(|v| !v.is_null()) {
        match audit.as_object() {
            Some(audit) => {
                for key in ["rulesApplied", "issues"] {
                    if let Some(list) = audit.get(key) {
                        let all_strings = list
                            .as_array()
                            .map(|a| a.iter().all(Value::is_string))
                            .unwrap_or(false);
                        if !all_strings {
                            push(&mut out, &format!("audit.{key}"), "expected an array of strings");
                        }
                    }
                }
            }
            None => push(&mut out, "audit", "expected an object"),
        }
    }

    out
}

fn push(out: &mut Vec<FieldViolation>, path: &str, message: &str) {
    out.push(FieldViolation {
        path: path.to_string(),
        message: message.to_string(),
    });
}

fn object_at<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
    out: &mut Vec<FieldViolation>,
) -> Option<&'a Map<String, Value>> {
    match parent.get(key) {
        None | Some(Value::Null) => {
            push(out, path, "required object is missing");
            None
        }
        Some(Value::Object(map)) => Some(map),
        Some(_) => {
            push(out, path, "expected an object");
            None
        }
    }
}

fn require_string(parent: &Map<String, Value>, key: &str, path: &str, out: &mut Vec<FieldViolation>) {
    match parent.get(key) {
        None | Some(Value::Null) => push(out, path, "required string is missing"),
        Some(Value::String(s)) if s.trim().is_empty() => {
            push(out, path, "required string is empty")
        }
        Some(Value::String(_)) => {}
        Some(_) => push(out, path, "expected a string"),
    }
}

fn optional_string(parent: &Map<String, Value>, key: &str, path: &str, out: &mut Vec<FieldViolation>) {
    match parent.get(key) {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) if s.trim().is_empty() => {
            push(out, path, "string must be non-empty when present")
        }
        Some(Value::String(_)) => {}
        Some(_) => push(out, path, "expected a string"),
    }
}

fn require_array<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
    path: &str,
    out: &mut Vec<FieldViolation>,
) -> Option<&'a Vec<Value>> {
    match parent.get(key) {
        None | Some(Value::Null) => {
            push(out, path, "required array is missing");
            None
        }
        Some(Value::Array(items)) if items.is_empty() => {
            push(out, path, "array must contain at least one entry");
            None
        }
        Some(Value::Array(items)) => Some(items),
        Some(_) => {
            push(out, path, "expected an array");
            None
        }
    }
}

fn require_string_array(
    parent: &Map<String, Value>,
    key: &str,
    path: &str,
    out: &mut Vec<FieldViolation>,
) {
    let Some(items) = require_array(parent, key, path, out) else {
        return;
    };
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::String(s) if s.trim().is_empty() => {
                push(out, &format!("{path}[{i}]"), "string must be non-empty")
            }
            Value::String(_) => {}
            _ => push(out, &format!("{path}[{i}]"), "expected a string"),
        }
    }
}

fn check_photo_url(header: &Map<String, Value>, out: &mut Vec<FieldViolation>) {
    match header.get("photoUrl") {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) => match url::Url::parse(s) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            Ok(_) => push(out, "header.photoUrl", "URL must use http or https"),
            Err(e) => push(out, "header.photoUrl", &format!("invalid URL: {e}")),
        },
        Some(_) => push(out, "header.photoUrl", "expected a string"),
    }
}
