//! The document type flowing through projection, storage, and retrieval.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Metadata key naming the content field a document was projected from.
///
/// Present on every split-projected document; absent on composite
/// projections, where a single document carries all content fields.
pub const CONTENT_SOURCE_KEY: &str = "_contentSource";

/// A content/metadata pair produced by the projector.
///
/// Immutable after creation; owned by whichever collection holds it
/// (a result list, a persisted docstore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Value,
}

impl Document {
    /// Create a document. `metadata` should be a JSON object; anything
    /// else is kept as-is and simply never matches pointer lookups.
    pub fn new(content: impl Into<String>, metadata: Value) -> Self {
        Self {
            content: content.into(),
            metadata,
        }
    }

    /// The `_contentSource` provenance tag, if present.
    pub fn content_source(&self) -> Option<&str> {
        self.metadata.get(CONTENT_SOURCE_KEY)?.as_str()
    }
}
