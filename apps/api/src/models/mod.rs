pub mod cv;
pub mod document;

pub use cv::{
    Audit, ComplianceReport, CvDraft, EducationEntry, ExperienceEntry, ExtraFields, Header,
    PersonalDetails,
};
pub use document::{ExtractedText, ExtractionMetadata, RawDocument, SourceFormat, TextChunk};
