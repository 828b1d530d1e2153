//! Construction-time error taxonomy.
//!
//! These are the errors that can be raised before any I/O happens:
//! invalid selectors, unknown preset or model names, and malformed
//! persisted stores. Runtime I/O paths use `anyhow::Result` and wrap
//! these via `?`.

use thiserror::Error;

/// Errors raised while compiling selectors, resolving presets, or
/// validating a persisted store.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A field path expression that cannot be compiled.
    #[error("invalid field path: {0}")]
    InvalidPath(String),

    /// A selector input that normalized to zero entries.
    #[error("field selector list is empty")]
    EmptySelector,

    /// Two selector entries normalized to the same pointer.
    #[error("duplicate field selector: {0}")]
    DuplicateSelector(String),

    /// A preset key outside the closed preset set.
    #[error("unknown preset: {0}")]
    UnknownPreset(String),

    /// An embedding or chat model id no provider claims.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// A local store directory without a model descriptor.
    #[error("store has no model descriptor (model.json): {0}")]
    MissingModelDescriptor(String),

    /// A persisted store file that fails to parse or is inconsistent.
    #[error("malformed store: {0}")]
    MalformedStore(String),
}
