//! Compiled field-path expressions over JSON records.
//!
//! A [`FieldPointer`] addresses a value inside a nested record. Paths use
//! the JSON-pointer shape (`/a/b`, with `~0`/`~1` escapes); a bare field
//! name with no leading separator is normalized to a single top-level
//! segment, so `"title"` and `"/title"` compile to the same pointer.
//!
//! Also home to [`MetaFilter`] — the `{pointer: expected}` filter map used
//! throughout the retrieval pipeline — and [`compile_filter`], which turns
//! one into a document predicate (all clauses AND-ed, exact match only).

use std::collections::BTreeMap;

use serde_json::Value;

use crate::document::Document;
use crate::error::SchemaError;

/// A compiled path expression: an ordered list of object-key segments.
///
/// Two pointers are equal iff their normalized segment lists are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPointer {
    segments: Vec<String>,
}

impl FieldPointer {
    /// Compile a path expression.
    ///
    /// Fails only on the empty string. A string without a leading `/` is
    /// a single top-level segment; otherwise the path splits on `/` with
    /// `~1` → `/` and `~0` → `~` unescaping.
    pub fn compile(path: &str) -> Result<Self, SchemaError> {
        if path.is_empty() {
            return Err(SchemaError::InvalidPath(
                "empty path expression".to_string(),
            ));
        }

        let segments = if let Some(rest) = path.strip_prefix('/') {
            rest.split('/').map(unescape_segment).collect()
        } else {
            vec![path.to_string()]
        };

        Ok(Self { segments })
    }

    /// The normalized path string, always with a leading separator.
    pub fn as_path(&self) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            out.push('/');
            out.push_str(&escape_segment(seg));
        }
        out
    }

    /// Read the value at this pointer, or `None` if any intermediate
    /// segment is absent or not an object.
    pub fn get<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        let mut cur = record;
        for seg in &self.segments {
            cur = cur.as_object()?.get(seg)?;
        }
        Some(cur)
    }

    /// Remove and return the value at this pointer, if present.
    pub fn remove(&self, record: &mut Value) -> Option<Value> {
        let mut cur = record;
        for (i, seg) in self.segments.iter().enumerate() {
            let obj = cur.as_object_mut()?;
            if i == self.segments.len() - 1 {
                return obj.remove(seg);
            }
            cur = obj.get_mut(seg)?;
        }
        None
    }

    /// Write a value at this pointer, creating intermediate objects.
    ///
    /// Silently does nothing if an intermediate value exists and is not
    /// an object.
    pub fn set(&self, record: &mut Value, value: Value) {
        let mut cur = record;
        for (i, seg) in self.segments.iter().enumerate() {
            let obj = match cur.as_object_mut() {
                Some(obj) => obj,
                None => return,
            };
            if i == self.segments.len() - 1 {
                obj.insert(seg.clone(), value);
                return;
            }
            cur = obj
                .entry(seg.clone())
                .or_insert_with(|| Value::Object(Default::default()));
        }
    }
}

fn unescape_segment(seg: &str) -> String {
    seg.replace("~1", "/").replace("~0", "~")
}

fn escape_segment(seg: &str) -> String {
    seg.replace('~', "~0").replace('/', "~1")
}

/// A metadata filter: pointer path → expected value, exact match.
pub type MetaFilter = BTreeMap<String, Value>;

/// Revise a filter map so every key carries a leading separator.
pub fn normalize_filter(filter: &MetaFilter) -> MetaFilter {
    filter
        .iter()
        .map(|(k, v)| (normalize_path(k), v.clone()))
        .collect()
}

/// Revise a list of path expressions so each carries a leading separator.
pub fn normalize_paths(paths: &[String]) -> Vec<String> {
    paths.iter().map(|p| normalize_path(p)).collect()
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// A compiled document predicate.
pub type MetaPredicate = Box<dyn Fn(&Document) -> bool + Send + Sync>;

/// Compile a filter map into a predicate over document metadata.
///
/// Every clause must match exactly (no coercion, no partial matching);
/// an absent pointer never matches.
pub fn compile_filter(filter: &MetaFilter) -> Result<MetaPredicate, SchemaError> {
    let rules: Vec<(FieldPointer, Value)> = filter
        .iter()
        .map(|(path, expected)| Ok((FieldPointer::compile(path)?, expected.clone())))
        .collect::<Result<_, SchemaError>>()?;

    Ok(Box::new(move |doc: &Document| {
        rules
            .iter()
            .all(|(pointer, expected)| pointer.get(&doc.metadata) == Some(expected))
    }))
}
