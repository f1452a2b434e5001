// Oversized-document handling
// Implements: overlapping boundary-aware chunking and the cross-chunk merger.

pub mod chunker;
pub mod merge;

pub use chunker::chunk;
pub use merge::merge_in_document_order;
