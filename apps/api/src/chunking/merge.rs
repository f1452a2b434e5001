//! Merger: folds per-chunk drafts into one record.
//!
//! Singular fields are earliest-wins. Experience and education entries are
//! deduplicated by a composite key (first occurrence wins) and then sorted
//! reverse-chronologically by start date. Skills and interests are a
//! case-insensitive union. Audit trails are unioned.

use std::collections::HashSet;

use thiserror::Error;
use tracing::debug;

use crate::models::{CvDraft, EducationEntry, ExperienceEntry};
use crate::normalization::dates::sort_key;
use crate::normalization::{is_missing_value, MISSING_VALUE};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("no chunk produced a usable draft")]
    NoViableChunks,
}

/// Merges chunk results that may have arrived in any order. Results are put
/// back in document order by chunk index before merging.
pub fn merge_in_document_order(mut results: Vec<(usize, CvDraft)>) -> Result<CvDraft, MergeError> {
    results.sort_by_key(|(index, _)| *index);
    let drafts: Vec<CvDraft> = results.into_iter().map(|(_, draft)| draft).collect();
    merge(&drafts)
}

/// Merges drafts given in document order.
pub fn merge(drafts: &[CvDraft]) -> Result<CvDraft, MergeError> {
    let (first, rest) = drafts.split_first().ok_or(MergeError::NoViableChunks)?;
    let mut merged = first.clone();

    for draft in rest {
        for (key, value) in &draft.extra {
            merged
                .extra
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        merged.audit.absorb(&draft.audit);
        fill_missing(&mut merged.header.name, &draft.header.name);
        fill_missing(&mut merged.header.title, &draft.header.title);
        fill_missing(&mut merged.profile, &draft.profile);
    }

    merged.experience = drop_placeholders(
        dedup_by_key(drafts.iter().flat_map(|d| d.experience.iter()), experience_key),
        |e| is_missing_value(&e.role) && is_missing_value(&e.company),
    );
    merged.education = drop_placeholders(
        dedup_by_key(drafts.iter().flat_map(|d| d.education.iter()), education_key),
        |e| is_missing_value(&e.degree) && is_missing_value(&e.institution),
    );
    sort_reverse_chronological(&mut merged.experience, |e| &e.start_date);
    sort_reverse_chronological(&mut merged.education, |e| &e.start_date);

    merged.skills = drop_placeholders(
        union_case_insensitive(drafts.iter().flat_map(|d| d.skills.iter())),
        |s| is_missing_value(s),
    );
    merged.interests = drop_placeholders(
        union_case_insensitive(drafts.iter().flat_map(|d| d.interests.iter())),
        |s| is_missing_value(s),
    );

    // Issues about dropped placeholders are stale; normalizing the merged
    // draft records again the ones that still apply.
    let quoted = format!("'{}'", MISSING_VALUE.to_lowercase());
    merged
        .audit
        .issues
        .retain(|issue| !issue.to_lowercase().contains(&quoted));

    debug!(
        chunks = drafts.len(),
        experience = merged.experience.len(),
        education = merged.education.len(),
        skills = merged.skills.len(),
        "Merged chunk drafts"
    );
    Ok(merged)
}

/// A chunk without a section answers with the placeholder; drop those items
/// unless nothing else was found.
fn drop_placeholders<T>(items: Vec<T>, is_placeholder: impl Fn(&T) -> bool) -> Vec<T> {
    if items.iter().all(&is_placeholder) {
        return items;
    }
    items.into_iter().filter(|item| !is_placeholder(item)).collect()
}

fn fill_missing(target: &mut String, candidate: &str) {
    if is_missing_value(target) && !is_missing_value(candidate) {
        *target = candidate.to_string();
    }
}

fn fold(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn experience_key(entry: &ExperienceEntry) -> (String, String, String) {
    (fold(&entry.company), fold(&entry.role), fold(&entry.start_date))
}

fn education_key(entry: &EducationEntry) -> (String, String, String) {
    (
        fold(&entry.institution),
        fold(&entry.degree),
        fold(&entry.start_date),
    )
}

fn dedup_by_key<'a, T, K>(items: impl Iterator<Item = &'a T>, key: impl Fn(&T) -> K) -> Vec<T>
where
    T: Clone + 'a,
    K: Eq + std::hash::Hash,
{
    let mut seen = HashSet::new();
    items
        .filter(|item| seen.insert(key(item)))
        .cloned()
        .collect()
}

/// Stable: equal or unparseable start dates keep their document order, and
/// entries without a parseable date sink to the end.
fn sort_reverse_chronological<T>(items: &mut [T], start_date: impl Fn(&T) -> &String) {
    items.sort_by(|a, b| sort_key(start_date(b)).cmp(&sort_key(start_date(a))));
}

fn union_case_insensitive<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .filter(|item| seen.insert(fold(item)))
        .cloned()
        .collect()
}
