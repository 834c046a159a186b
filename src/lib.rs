//! TEI XML → Markdown extraction for scholarly full text.
//!
//! Takes the structured XML a full-text extraction service produces for a
//! paper and renders a reference-resolved Markdown document: title,
//! authors, abstract, the body sections worth keeping, numbered
//! footnotes, and the bibliography. Inline citation markers become
//! author/year labels, noise subtrees (tables, formulas, figures) are
//! dropped, and sections unlikely to matter downstream (conclusions,
//! acknowledgements, appendices, ...) are filtered by a configurable
//! policy.
//!
//! The transform is pure and synchronous: one document string in, one
//! Markdown string out, no I/O. Batches parallelize trivially from the
//! outside.

pub mod error;
pub mod tei;

pub use error::ExtractError;
pub use tei::{extract_markdown, SectionPolicy};
