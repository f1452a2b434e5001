//! PII / inappropriate personal-detail stripping.
//!
//! Keys are compared after lowercasing and dropping non-alphanumerics, so
//! `dateOfBirth`, `date_of_birth` and `Date of Birth` are the same key.

use serde_json::Value;

use crate::models::{CvDraft, ExtraFields};

const DENYLIST: &[&str] = &[
    "age",
    "dateofbirth",
    "dob",
    "birthdate",
    "dependents",
    "dependants",
    "maritalstatus",
    "religion",
    "ethnicity",
    "nationality",
    "race",
    "politicalaffiliation",
];

pub fn is_denylisted(key: &str) -> bool {
    let folded: String = key
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect();
    DENYLIST.contains(&folded.as_str())
}

/// Removes every denylisted field from the draft and returns the JSON paths
/// that were removed, in document order.
pub fn strip_denylisted_fields(draft: &mut CvDraft) -> Vec<String> {
    let mut removed = Vec::new();

    let details = &mut draft.personal_details;
    if details.nationality.take().is_some() {
        removed.push("personalDetails.nationality".to_string());
    }
    if details.date_of_birth.take().is_some() {
        removed.push("personalDetails.dateOfBirth".to_string());
    }
    if details.marital_status.take().is_some() {
        removed.push("personalDetails.maritalStatus".to_string());
    }

    strip_extra(&mut draft.header.extra, "header", &mut removed);
    strip_extra(&mut draft.personal_details.extra, "personalDetails", &mut removed);
    for (i, entry) in draft.experience.iter_mut().enumerate() {
        strip_extra(&mut entry.extra, &format!("experience[{i}]"), &mut removed);
    }
    for (i, entry) in draft.education.iter_mut().enumerate() {
        strip_extra(&mut entry.extra, &format!("education[{i}]"), &mut removed);
    }
    strip_extra(&mut draft.extra, "", &mut removed);

    removed
}

fn strip_extra(extra: &mut ExtraFields, base: &str, removed: &mut Vec<String>) {
    let doomed: Vec<String> = extra.keys().filter(|k| is_denylisted(k)).cloned().collect();
    for key in doomed {
        extra.remove(&key);
        removed.push(join(base, &key));
    }
    for (key, value) in extra.iter_mut() {
        strip_value(value, &join(base, key), removed);
    }
}

fn strip_value(value: &mut Value, path: &str, removed: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            let doomed: Vec<String> = map.keys().filter(|k| is_denylisted(k)).cloned().collect();
            for key in doomed {
                map.remove(&key);
                removed.push(join(path, &key));
            }
            for (key, child) in map.iter_mut() {
                strip_value(child, &join(path, key), removed);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter_mut().enumerate() {
                strip_value(child, &format!("{path}[{i}]"), removed);
            }
        }
        _ => {}
    }
}

/// Lists denylisted keys present anywhere in a serialized draft, ignoring the
/// audit trail. Does not mutate.
pub fn find_denylisted_fields(draft: &CvDraft) -> Vec<String> {
    let mut found = Vec::new();
    if let Value::Object(root) = draft.to_value() {
        for (key, value) in &root {
            if key == "audit" {
                continue;
            }
            if is_denylisted(key) {
                found.push(key.clone());
            }
            collect(value, key, &mut found);
        }
    }
    found
}

fn collect(value: &Value, path: &str, found: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = join(path, key);
                if is_denylisted(key) {
                    found.push(child_path.clone());
                }
                collect(child, &child_path, found);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect(child, &format!("{path}[{i}]"), found);
            }
        }
        _ => {}
    }
}

fn join(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{base}.{key}")
    }
}
