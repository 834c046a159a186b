use thiserror::Error;

/// Hard failures of the TEI → Markdown transform.
///
/// Unresolved citation or footnote targets are not errors: the renderer
/// degrades to raw-text / empty output for those and keeps going.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("malformed XML: {0}")]
    MalformedInput(String),
    #[error("transform produced no usable content")]
    EmptyOutput,
}
