//! Compliance scoring. Read-only over a draft; the report is derived fresh on
//! every call.

use serde::Deserialize;

use crate::models::{ComplianceReport, CvDraft};

use super::dates::{is_canonical_date, is_canonical_end_date};
use super::pii::find_denylisted_fields;
use super::text::{capitalize_title, contains_redundant_phrase, has_typography_issue};

/// The only font the EHS template allows.
pub const EHS_FONT: &str = "Arial";

const DATE_PENALTY: u32 = 10;
const TITLE_PENALTY: u32 = 5;
const DENYLIST_PENALTY: u32 = 15;
const PHRASE_PENALTY: u32 = 5;
const FONT_PENALTY: u32 = 10;
const TYPOGRAPHY_PENALTY: u32 = 5;

/// Facts about the rendered document the draft itself does not carry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ComplianceOptions {
    #[serde(default)]
    pub declared_font: Option<String>,
}

pub fn check_compliance(draft: &CvDraft) -> ComplianceReport {
    check_compliance_with(draft, &ComplianceOptions::default())
}

pub fn check_compliance_with(draft: &CvDraft, options: &ComplianceOptions) -> ComplianceReport {
    let mut tally = Tally::default();

    // Dates
    for (i, entry) in draft.experience.iter().enumerate() {
        check_date(&mut tally, &format!("experience[{i}].startDate"), &entry.start_date, false);
        check_date(&mut tally, &format!("experience[{i}].endDate"), &entry.end_date, true);
    }
    for (i, entry) in draft.education.iter().enumerate() {
        check_date(&mut tally, &format!("education[{i}].startDate"), &entry.start_date, false);
        check_date(&mut tally, &format!("education[{i}].endDate"), &entry.end_date, true);
    }

    // Capitalization
    check_title(&mut tally, "header.name", &draft.header.name);
    check_title(&mut tally, "header.title", &draft.header.title);
    for (i, entry) in draft.experience.iter().enumerate() {
        check_title(&mut tally, &format!("experience[{i}].role"), &entry.role);
    }
    for (i, entry) in draft.education.iter().enumerate() {
        check_title(&mut tally, &format!("education[{i}].degree"), &entry.degree);
    }

    for path in find_denylisted_fields(draft) {
        tally.add(
            DENYLIST_PENALTY,
            format!("Denylisted personal detail '{path}' is present"),
        );
    }

    // Free text: residual phrases and typography
    for (path, text) in free_text_fields(draft) {
        if contains_redundant_phrase(text) {
            tally.add(PHRASE_PENALTY, format!("{path} contains a self-referential phrase"));
        }
        if has_typography_issue(text) {
            tally.add(
                TYPOGRAPHY_PENALTY,
                format!("{path} has doubled spaces or an embedded bullet glyph"),
            );
        }
    }

    if let Some(font) = options.declared_font.as_deref() {
        if !font.trim().eq_ignore_ascii_case(EHS_FONT) {
            tally.add(
                FONT_PENALTY,
                format!("Font '{}' does not match the EHS font '{EHS_FONT}'", font.trim()),
            );
        }
    }

    tally.into_report()
}

fn check_date(tally: &mut Tally, path: &str, value: &str, is_end_date: bool) {
    let ok = if is_end_date {
        is_canonical_end_date(value)
    } else {
        is_canonical_date(value)
    };
    if !ok {
        tally.add(DATE_PENALTY, format!("{path} '{value}' is not in 'Mon YYYY' form"));
    }
}

fn check_title(tally: &mut Tally, path: &str, value: &str) {
    if capitalize_title(value) != value {
        tally.add(TITLE_PENALTY, format!("{path} '{value}' is not title-cased"));
    }
}

fn free_text_fields(draft: &CvDraft) -> Vec<(String, &str)> {
    let mut fields = vec![("profile".to_string(), draft.profile.as_str())];
    for (i, entry) in draft.experience.iter().enumerate() {
        for (j, bullet) in entry.bullets.iter().enumerate() {
            fields.push((format!("experience[{i}].bullets[{j}]"), bullet.as_str()));
        }
    }
    for (i, entry) in draft.education.iter().enumerate() {
        for (j, detail) in entry.details.iter().enumerate() {
            fields.push((format!("education[{i}].details[{j}]"), detail.as_str()));
        }
    }
    for (i, skill) in draft.skills.iter().enumerate() {
        fields.push((format!("skills[{i}]"), skill.as_str()));
    }
    for (i, interest) in draft.interests.iter().enumerate() {
        fields.push((format!("interests[{i}]"), interest.as_str()));
    }
    fields
}

#[derive(Default)]
struct Tally {
    penalty: u32,
    issues: Vec<String>,
}

impl Tally {
    fn add(&mut self, penalty: u32, issue: String) {
        self.penalty += penalty;
        self.issues.push(issue);
    }

    fn into_report(self) -> ComplianceReport {
        let score = 100u32.saturating_sub(self.penalty) as u8;
        ComplianceReport {
            compliant: self.issues.is_empty(),
            issues: self.issues,
            score,
        }
    }
}
