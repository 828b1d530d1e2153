//! Projection of raw records into documents.
//!
//! Two modes:
//!
//! - **Split** — one document per content selector, each tagged with
//!   `_contentSource`, all sharing the same metadata. This is what gets
//!   embedded at build time.
//! - **Composite** — exactly one document per record; the content is a
//!   serialized object keyed by selector name and the metadata is the
//!   rest of the record. Used when an association lookup should hand back
//!   the original object rather than per-field documents.
//!
//! Mode selection is always an explicit caller flag, never inferred.

use serde_json::{Map, Value};

use crate::document::{Document, CONTENT_SOURCE_KEY};
use crate::selector::FieldSelectorSet;

/// What to do when a content pointer resolves to nothing on a record.
///
/// The default preserves the source behavior: emit a document with empty
/// content rather than dropping it, so output cardinality stays equal to
/// the selector count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingContentPolicy {
    #[default]
    EmptyContent,
    Skip,
}

/// Which reconciliation strategy [`DocumentProjector::project`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionMode {
    Split,
    Composite,
}

/// Projects raw records into documents via declarative field selectors.
#[derive(Debug, Clone)]
pub struct DocumentProjector {
    content: FieldSelectorSet,
    metadata: Option<FieldSelectorSet>,
    missing: MissingContentPolicy,
}

impl DocumentProjector {
    pub fn new(content: FieldSelectorSet, metadata: Option<FieldSelectorSet>) -> Self {
        Self {
            content,
            metadata,
            missing: MissingContentPolicy::default(),
        }
    }

    pub fn with_missing_policy(mut self, policy: MissingContentPolicy) -> Self {
        self.missing = policy;
        self
    }

    pub fn content_selectors(&self) -> &FieldSelectorSet {
        &self.content
    }

    pub fn metadata_selectors(&self) -> Option<&FieldSelectorSet> {
        self.metadata.as_ref()
    }

    /// Project one record in the given mode.
    pub fn project(&self, record: &Value, mode: ProjectionMode) -> Vec<Document> {
        match mode {
            ProjectionMode::Split => self.split(record),
            ProjectionMode::Composite => vec![self.composite(record)],
        }
    }

    /// One document per content selector, in selector order.
    ///
    /// Metadata is either the extracted metadata selectors (missing
    /// fields present as `null`) or a deep copy of the whole record, and
    /// is shared across the outputs plus a per-document `_contentSource`.
    pub fn split(&self, record: &Value) -> Vec<Document> {
        let base = self.base_metadata(record);

        let mut docs = Vec::with_capacity(self.content.len());
        for (name, pointer) in self.content.iter() {
            let value = pointer.get(record);
            let content = match value {
                Some(v) if !v.is_null() => content_text(v),
                _ => match self.missing {
                    MissingContentPolicy::EmptyContent => String::new(),
                    MissingContentPolicy::Skip => continue,
                },
            };

            let mut metadata = base.clone();
            if let Some(obj) = metadata.as_object_mut() {
                obj.insert(CONTENT_SOURCE_KEY.to_string(), Value::String(name.into()));
            }
            docs.push(Document::new(content, metadata));
        }
        docs
    }

    /// Exactly one document wrapping the whole record.
    ///
    /// Content is a serialized object keyed by content-selector name;
    /// metadata is the extracted metadata selectors if configured,
    /// otherwise the remainder of the record with content fields removed.
    /// Carries no `_contentSource`.
    pub fn composite(&self, record: &Value) -> Document {
        let mut payload = Map::new();
        for (name, pointer) in self.content.iter() {
            let value = pointer.get(record).cloned().unwrap_or(Value::Null);
            payload.insert(name.to_string(), value);
        }

        let metadata = match &self.metadata {
            Some(selectors) if !selectors.is_empty() => extract_metadata(selectors, record),
            _ => {
                let mut rest = record.clone();
                for (_, pointer) in self.content.iter() {
                    pointer.remove(&mut rest);
                }
                rest
            }
        };

        let content = Value::Object(payload).to_string();
        Document::new(content, metadata)
    }

    fn base_metadata(&self, record: &Value) -> Value {
        match &self.metadata {
            Some(selectors) if !selectors.is_empty() => extract_metadata(selectors, record),
            _ => record.clone(),
        }
    }
}

fn extract_metadata(selectors: &FieldSelectorSet, record: &Value) -> Value {
    let mut out = Value::Object(Map::new());
    for (_, pointer) in selectors.iter() {
        let value = pointer.get(record).cloned().unwrap_or(Value::Null);
        pointer.set(&mut out, value);
    }
    out
}

/// A string value is taken as-is; any other JSON value is serialized.
fn content_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn projector(content: &str, meta: Option<&str>) -> DocumentProjector {
        let content = FieldSelectorSet::parse(content).unwrap();
        let metadata = meta.map(|m| FieldSelectorSet::parse(m).unwrap());
        DocumentProjector::new(content, metadata)
    }

    #[test]
    fn test_split_cardinality_order_provenance() {
        // The worked example: { id: 7, title: "Intro", body: "Hello" }.
        let record = json!({ "id": 7, "title": "Intro", "body": "Hello" });
        let docs = projector("title,body", Some("id")).split(&record);

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "Intro");
        assert_eq!(docs[0].metadata["id"], json!(7));
        assert_eq!(docs[0].content_source(), Some("title"));
        assert_eq!(docs[1].content, "Hello");
        assert_eq!(docs[1].metadata["id"], json!(7));
        assert_eq!(docs[1].content_source(), Some("body"));
    }

    #[test]
    fn test_split_metadata_defaults_to_whole_record() {
        let record = json!({ "title": "Intro", "extra": { "a": 1 } });
        let docs = projector("title", None).split(&record);
        assert_eq!(docs[0].metadata["extra"], json!({ "a": 1 }));
        assert_eq!(docs[0].metadata["title"], json!("Intro"));
    }

    #[test]
    fn test_split_missing_metadata_field_becomes_null() {
        let record = json!({ "title": "Intro" });
        let docs = projector("title", Some("id,title")).split(&record);
        assert_eq!(docs[0].metadata["id"], Value::Null);
        assert!(docs[0].metadata.get("id").is_some(), "entry must exist");
    }

    #[test]
    fn test_split_missing_content_default_policy() {
        let record = json!({ "title": "Intro" });
        let docs = projector("title,body", Some("title")).split(&record);
        assert_eq!(docs.len(), 2, "missing content still yields a document");
        assert_eq!(docs[1].content, "");
        assert_eq!(docs[1].content_source(), Some("body"));
    }

    #[test]
    fn test_split_missing_content_skip_policy() {
        let record = json!({ "title": "Intro" });
        let docs = projector("title,body", Some("title"))
            .with_missing_policy(MissingContentPolicy::Skip)
            .split(&record);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content_source(), Some("title"));
    }

    #[test]
    fn test_split_nested_metadata_selector() {
        let record = json!({ "title": "Intro", "meta": { "author": "li" } });
        let docs = projector("title", Some("/meta/author")).split(&record);
        assert_eq!(docs[0].metadata["meta"]["author"], json!("li"));
    }

    #[test]
    fn test_composite_round_trip() {
        let record = json!({ "id": 7, "title": "Intro", "body": "Hello" });
        let p = projector("title,body", None);
        let doc = p.composite(&record);

        // Content fields are re-derivable through the same selectors.
        let payload: Value = serde_json::from_str(&doc.content).unwrap();
        assert_eq!(payload["title"], json!("Intro"));
        assert_eq!(payload["body"], json!("Hello"));

        // Metadata is the remainder, content fields removed.
        assert_eq!(doc.metadata, json!({ "id": 7 }));
        assert_eq!(doc.content_source(), None);
    }

    #[test]
    fn test_composite_with_metadata_selectors() {
        let record = json!({ "id": 7, "title": "Intro", "body": "Hello" });
        let doc = projector("title,body", Some("id")).composite(&record);
        assert_eq!(doc.metadata, json!({ "id": 7 }));
    }

    #[test]
    fn test_mode_flag_is_explicit() {
        let record = json!({ "title": "Intro", "body": "Hello" });
        let p = projector("title,body", None);
        assert_eq!(p.project(&record, ProjectionMode::Split).len(), 2);
        assert_eq!(p.project(&record, ProjectionMode::Composite).len(), 1);
    }

    #[test]
    fn test_split_colliding_leaves_keep_distinct_provenance() {
        let record = json!({ "a": { "x": "from-a" }, "b": { "x": "from-b" } });
        let docs = projector("/a/x,/b/x", None).split(&record);

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content_source(), Some("/a/x"));
        assert_eq!(docs[1].content_source(), Some("/b/x"));
    }

    #[test]
    fn test_composite_colliding_leaves_keep_both_fields() {
        let record = json!({ "a": { "x": "from-a" }, "b": { "x": "from-b" } });
        let doc = projector("/a/x,/b/x", None).composite(&record);

        let payload: Value = serde_json::from_str(&doc.content).unwrap();
        assert_eq!(payload.as_object().unwrap().len(), 2);
        assert_eq!(payload["/a/x"], json!("from-a"));
        assert_eq!(payload["/b/x"], json!("from-b"));
    }

    #[test]
    fn test_non_string_content_serialized() {
        let record = json!({ "count": 3 });
        let docs = projector("count", None).split(&record);
        assert_eq!(docs[0].content, "3");
    }
}
