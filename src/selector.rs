//! Named, ordered field selector sets.
//!
//! A selector set is built from either a comma-joined string
//! (`"title,body"`) or an explicit list; both normalize to the same
//! pointers. Order is significant — it drives output document order —
//! and no two entries may normalize to the same pointer. Each entry's
//! name is its declared expression, so names are unique whenever the
//! pointers are (`/a/x` and `/b/x` stay distinguishable).

use crate::error::SchemaError;
use crate::pointer::FieldPointer;

/// An ordered list of named field pointers.
#[derive(Debug, Clone)]
pub struct FieldSelectorSet {
    names: Vec<String>,
    pointers: Vec<FieldPointer>,
}

impl FieldSelectorSet {
    /// Build from a comma-joined string. Blank entries are skipped.
    pub fn parse(input: &str) -> Result<Self, SchemaError> {
        let entries: Vec<String> = input
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self::from_list(&entries)
    }

    /// Build from an explicit list of path expressions.
    pub fn from_list(entries: &[String]) -> Result<Self, SchemaError> {
        if entries.is_empty() {
            return Err(SchemaError::EmptySelector);
        }

        let mut names = Vec::with_capacity(entries.len());
        let mut pointers: Vec<FieldPointer> = Vec::with_capacity(entries.len());

        for entry in entries {
            let pointer = FieldPointer::compile(entry)?;
            if pointers.contains(&pointer) {
                return Err(SchemaError::DuplicateSelector(entry.clone()));
            }
            names.push(entry.clone());
            pointers.push(pointer);
        }

        Ok(Self { names, pointers })
    }

    pub fn len(&self) -> usize {
        self.pointers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.is_empty()
    }

    /// Iterate `(declared name, pointer)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldPointer)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.pointers.iter())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn pointers(&self) -> &[FieldPointer] {
        &self.pointers
    }
}
