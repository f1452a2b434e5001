// Prompt fragments for turning a résumé into a CvDraft candidate.
// The oracle output is validated afterwards; these instructions only make a
// valid first answer more likely.

use crate::normalization::{CV_DRAFT_SCHEMA, MISSING_VALUE};

const EXTRACTION_RULES: &str = "\
RULES:
- Use ONLY information present in the document. Do NOT invent employers, dates or qualifications.
- Copy dates exactly as written (e.g. \"2019-06\", \"June 2019\", \"present\"); they are normalized later.
- One experience entry per role; keep its bullet points as separate strings.
- If the document is a fragment of a longer CV, structure what is present and still return every required key.
- Omit personalDetails keys (nationality, dateOfBirth, maritalStatus) that the document does not state.";

/// Schema description sent with every structuring request.
pub fn schema_description() -> String {
    format!(
        "{CV_DRAFT_SCHEMA}\n\n{EXTRACTION_RULES}\n\
         - When a required value is genuinely absent, use exactly \"{MISSING_VALUE}\" rather than an empty string."
    )
}
