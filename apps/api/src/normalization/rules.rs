//! The EHS rule engine.
//!
//! `normalize` is a pure transform over an already-valid draft. Rules run in a
//! fixed order and each one records its id in `audit.rulesApplied` only when it
//! actually changed something, so a second pass changes nothing.

use tracing::debug;

use crate::models::{Audit, CvDraft};

use super::dates::{normalize_date, DateOutcome};
use super::pii::strip_denylisted_fields;
use super::text::{
    capitalize_title, correct_common_mistakes, split_into_bullets, strip_redundant_phrases,
};

pub const RULE_DATE_NORMALIZATION: &str = "date_normalization";
pub const RULE_TITLE_CAPITALIZATION: &str = "title_capitalization";
pub const RULE_REDUNDANT_PHRASE_REMOVAL: &str = "redundant_phrase_removal";
pub const RULE_COMMON_MISTAKE_CORRECTION: &str = "common_mistake_correction";
pub const RULE_PII_STRIPPING: &str = "pii_stripping";
pub const RULE_BULLET_CONVERSION: &str = "bullet_conversion";

/// Applies every EHS rule and returns the normalized copy. The input is never
/// mutated; soft problems land in `audit.issues` instead of failing.
pub fn normalize(draft: &CvDraft) -> CvDraft {
    let mut out = draft.clone();

    strip_pii(&mut out);
    remove_redundant_phrases(&mut out);
    correct_mistakes(&mut out);
    convert_bullets(&mut out);
    capitalize_titles(&mut out);
    normalize_dates(&mut out);

    debug!(
        rules = out.audit.rules_applied.len(),
        issues = out.audit.issues.len(),
        "Draft normalized"
    );
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Individual rules
// ────────────────────────────────────────────────────────────────────────────

fn strip_pii(draft: &mut CvDraft) {
    let removed = strip_denylisted_fields(draft);
    if removed.is_empty() {
        return;
    }
    draft.audit.record_rule(RULE_PII_STRIPPING);
    for path in removed {
        draft
            .audit
            .record_issue(format!("Removed personal detail field '{path}'"));
    }
}

fn remove_redundant_phrases(draft: &mut CvDraft) {
    let mut changed = rewrite(&mut draft.profile, strip_redundant_phrases);
    for entry in &mut draft.experience {
        changed |= rewrite_all(&mut entry.bullets, strip_redundant_phrases);
    }
    for entry in &mut draft.education {
        changed |= rewrite_all(&mut entry.details, strip_redundant_phrases);
    }
    changed |= rewrite_all(&mut draft.skills, strip_redundant_phrases);
    changed |= rewrite_all(&mut draft.interests, strip_redundant_phrases);

    mark(&mut draft.audit, changed, RULE_REDUNDANT_PHRASE_REMOVAL);
}

fn correct_mistakes(draft: &mut CvDraft) {
    let mut changed = rewrite(&mut draft.profile, correct_common_mistakes);
    changed |= rewrite(&mut draft.header.title, correct_common_mistakes);
    for entry in &mut draft.experience {
        changed |= rewrite(&mut entry.role, correct_common_mistakes);
        changed |= rewrite_all(&mut entry.bullets, correct_common_mistakes);
    }
    for entry in &mut draft.education {
        changed |= rewrite_all(&mut entry.details, correct_common_mistakes);
    }

    mark(&mut draft.audit, changed, RULE_COMMON_MISTAKE_CORRECTION);
}

fn convert_bullets(draft: &mut CvDraft) {
    let mut changed = false;
    for entry in &mut draft.experience {
        changed |= split_all(&mut entry.bullets);
    }
    for entry in &mut draft.education {
        changed |= split_all(&mut entry.details);
    }
    mark(&mut draft.audit, changed, RULE_BULLET_CONVERSION);
}

fn capitalize_titles(draft: &mut CvDraft) {
    let mut changed = rewrite(&mut draft.header.name, capitalize_title);
    changed |= rewrite(&mut draft.header.title, capitalize_title);
    for entry in &mut draft.experience {
        changed |= rewrite(&mut entry.role, capitalize_title);
    }
    for entry in &mut draft.education {
        changed |= rewrite(&mut entry.degree, capitalize_title);
    }
    mark(&mut draft.audit, changed, RULE_TITLE_CAPITALIZATION);
}

fn normalize_dates(draft: &mut CvDraft) {
    let mut changed = false;
    let mut issues = Vec::new();

    for entry in &mut draft.experience {
        let owner = format!("experience '{}' at '{}'", entry.role, entry.company);
        changed |= normalize_one(&mut entry.start_date, false, "startDate", &owner, &mut issues);
        changed |= normalize_one(&mut entry.end_date, true, "endDate", &owner, &mut issues);
    }
    for entry in &mut draft.education {
        let owner = format!("education '{}' at '{}'", entry.degree, entry.institution);
        changed |= normalize_one(&mut entry.start_date, false, "startDate", &owner, &mut issues);
        changed |= normalize_one(&mut entry.end_date, true, "endDate", &owner, &mut issues);
    }

    mark(&mut draft.audit, changed, RULE_DATE_NORMALIZATION);
    for issue in issues {
        draft.audit.record_issue(issue);
    }
}

fn normalize_one(
    value: &mut String,
    is_end_date: bool,
    field: &str,
    owner: &str,
    issues: &mut Vec<String>,
) -> bool {
    match normalize_date(value, is_end_date) {
        DateOutcome::Canonical => false,
        DateOutcome::Normalized(canonical) => {
            *value = canonical;
            true
        }
        DateOutcome::Unrecognized => {
            issues.push(format!("Unrecognized {field} '{value}' in {owner}"));
            false
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn rewrite(field: &mut String, rule: impl Fn(&str) -> String) -> bool {
    let next = rule(field.as_str());
    if next == *field {
        false
    } else {
        *field = next;
        true
    }
}

fn rewrite_all(items: &mut [String], rule: impl Fn(&str) -> String) -> bool {
    items
        .iter_mut()
        .fold(false, |changed, item| rewrite(item, &rule) | changed)
}

fn split_all(items: &mut Vec<String>) -> bool {
    let split: Vec<String> = items.iter().flat_map(|item| split_into_bullets(item)).collect();
    if split == *items {
        false
    } else {
        *items = split;
        true
    }
}

fn mark(audit: &mut Audit, changed: bool, rule: &str) {
    if changed {
        audit.record_rule(rule);
    }
}
