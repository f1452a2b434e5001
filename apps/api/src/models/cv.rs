//! The canonical CV Draft record and its derived compliance report.
//!
//! A `CvDraft` is only ever produced by `normalization::schema::validate` (or by
//! the rule engine / merger transforming an already-valid draft). It is
//! deliberately not `Deserialize`: JSON crossing into the system must go
//! through the validator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields that were not part of the schema but arrived with an object.
/// Kept (ordered) so the PII rule can find denylisted keys wherever they sit.
pub type ExtraFields = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// `nationality`, `date_of_birth` and `marital_status` are denylisted by the
/// PII rule. They are accepted from a candidate but are absent from every
/// normalized draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marital_status: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceEntry {
    pub role: String,
    pub company: String,
    pub start_date: String,
    pub end_date: String,
    pub bullets: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EducationEntry {
    pub degree: String,
    pub institution: String,
    pub start_date: String,
    pub end_date: String,
    pub details: Vec<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Append-only trail of which rules fired and which soft problems were seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audit {
    #[serde(default)]
    pub rules_applied: Vec<String>,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl Audit {
    /// Records a rule id once; later duplicates are ignored.
    pub fn record_rule(&mut self, rule: &str) {
        if !self.rules_applied.iter().any(|r| r == rule) {
            self.rules_applied.push(rule.to_string());
        }
    }

    /// Records an issue once; later duplicates are ignored.
    pub fn record_issue(&mut self, issue: impl Into<String>) {
        let issue = issue.into();
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }

    /// Set-union of two trails, keeping first-seen order.
    pub fn absorb(&mut self, other: &Audit) {
        for rule in &other.rules_applied {
            self.record_rule(rule);
        }
        for issue in &other.issues {
            self.record_issue(issue.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CvDraft {
    pub header: Header,
    pub personal_details: PersonalDetails,
    pub profile: String,
    pub experience: Vec<ExperienceEntry>,
    pub education: Vec<EducationEntry>,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub audit: Audit,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

impl CvDraft {
    /// Serializes to a JSON value; infallible for this shape.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Derived, non-persisted compliance summary. `compliant` is true iff
/// `issues` is empty; `score` is reported independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub compliant: bool,
    pub issues: Vec<String>,
    pub score: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_record_rule_is_set_like() {
        let mut audit = Audit::default();
        audit.record_rule("date_normalization");
        audit.record_rule("date_normalization");
        audit.record_rule("title_capitalization");
        assert_eq!(
            audit.rules_applied,
            vec!["date_normalization", "title_capitalization"]
        );
    }

    #[test]
    fn test_audit_absorb_keeps_first_seen_order() {
        let mut a = Audit {
            rules_applied: vec!["b".into()],
            issues: vec!["x".into()],
        };
        let b = Audit {
            rules_applied: vec!["a".into(), "b".into()],
            issues: vec!["y".into(), "x".into()],
        };
        a.absorb(&b);
        assert_eq!(a.rules_applied, vec!["b", "a"]);
        assert_eq!(a.issues, vec!["x", "y"]);
    }

    #[test]
    fn test_personal_details_skips_absent_denylisted_fields() {
        let details = PersonalDetails {
            nationality: None,
            languages: vec!["English".into()],
            date_of_birth: None,
            marital_status: None,
            extra: ExtraFields::new(),
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json, serde_json::json!({ "languages": ["English"] }));
    }
}
