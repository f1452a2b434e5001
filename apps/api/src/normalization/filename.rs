use thiserror::Error;

use crate::models::Header;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilenameError {
    #[error("header name has no usable first name")]
    MissingFirstName,

    #[error("candidate id must not be empty")]
    MissingCandidateId,

    #[error("client label must not be empty")]
    MissingClientLabel,
}

/// Derives `"{firstName} ({candidateId}) {clientLabel} CV"` from an already
/// normalized header. Characters that are unsafe in filenames are dropped.
pub fn derive_filename(
    header: &Header,
    candidate_id: &str,
    client_label: &str,
) -> Result<String, FilenameError> {
    let first_name = header
        .name
        .split_whitespace()
        .map(sanitize)
        .find(|part| !part.is_empty())
        .ok_or(FilenameError::MissingFirstName)?;

    let candidate_id = sanitize(candidate_id.trim());
    if candidate_id.is_empty() {
        return Err(FilenameError::MissingCandidateId);
    }

    let client_label = sanitize(client_label.trim());
    if client_label.is_empty() {
        return Err(FilenameError::MissingClientLabel);
    }

    Ok(format!("{first_name} ({candidate_id}) {client_label} CV"))
}

fn sanitize(part: &str) -> String {
    part.chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '(' | ')'))
        .filter(|c| !c.is_control())
        .collect()
}
