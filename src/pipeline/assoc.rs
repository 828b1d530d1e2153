//! Association stage: follow metadata keys from retrieved documents to
//! their sibling records.
//!
//! For each input document the stage reads the configured match
//! pointers out of the document's metadata, maps them through a
//! [`MatchKeyMapper`], merges them over the static filter, and runs one
//! metadata lookup. Results concatenate in input order; a lookup that
//! finds nothing contributes nothing and never raises. With no input
//! documents the stage runs a single lookup with the static filter
//! alone, or yields nothing when that filter is empty too.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::document::Document;
use crate::error::SchemaError;
use crate::pipeline::Stage;
use crate::pointer::{FieldPointer, MetaFilter};
use crate::service::{MetadataSearchOptions, RetrievalService};

/// Maps a match key read from document metadata into the key the
/// association backend expects. Loaders that rename or retype fields
/// between the embedded store and the source of truth plug in here.
pub trait MatchKeyMapper: Send + Sync {
    fn map(&self, path: &str, value: &Value) -> (String, Value);
}

/// The default: keys pass through untouched.
pub struct IdentityMapper;

impl MatchKeyMapper for IdentityMapper {
    fn map(&self, path: &str, value: &Value) -> (String, Value) {
        (path.to_string(), value.clone())
    }
}

/// Renames paths through a fixed table; unlisted paths pass through.
pub struct RenameMapper {
    table: BTreeMap<String, String>,
}

impl RenameMapper {
    pub fn new(table: BTreeMap<String, String>) -> Self {
        Self { table }
    }
}

impl MatchKeyMapper for RenameMapper {
    fn map(&self, path: &str, value: &Value) -> (String, Value) {
        let mapped = self.table.get(path).cloned().unwrap_or_else(|| path.to_string());
        (mapped, value.clone())
    }
}

pub struct AssociationStage {
    service: Arc<dyn RetrievalService>,
    match_by: Vec<FieldPointer>,
    static_filter: MetaFilter,
    mapper: Box<dyn MatchKeyMapper>,
    options: MetadataSearchOptions,
}

impl AssociationStage {
    pub fn new(
        service: Arc<dyn RetrievalService>,
        match_by: &[String],
        static_filter: MetaFilter,
        options: MetadataSearchOptions,
    ) -> Result<Self, SchemaError> {
        let match_by = match_by
            .iter()
            .map(|p| FieldPointer::compile(p))
            .collect::<Result<_, _>>()?;
        Ok(Self {
            service,
            match_by,
            static_filter,
            mapper: Box::new(IdentityMapper),
            options,
        })
    }

    pub fn with_mapper(mut self, mapper: Box<dyn MatchKeyMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    /// The lookup filter for one input document: static clauses plus one
    /// clause per match pointer that resolves on the document's metadata.
    fn filter_for(&self, doc: &Document) -> MetaFilter {
        let mut filter = self.static_filter.clone();
        for pointer in &self.match_by {
            if let Some(value) = pointer.get(&doc.metadata) {
                let (path, value) = self.mapper.map(&pointer.as_path(), value);
                filter.insert(path, value);
            }
        }
        filter
    }
}

#[async_trait]
impl Stage for AssociationStage {
    async fn run(&self, input: &[Document]) -> Result<Vec<Document>> {
        if input.is_empty() {
            // Nothing to key a lookup with: same quiet outcome as an
            // input document whose derived filter comes up empty.
            if self.static_filter.is_empty() {
                return Ok(Vec::new());
            }
            return self
                .service
                .metadata_search(&self.static_filter, &self.options)
                .await;
        }

        let mut out = Vec::new();
        for doc in input {
            let filter = self.filter_for(doc);
            if filter.is_empty() {
                continue;
            }
            let hits = self.service.metadata_search(&filter, &self.options).await?;
            out.extend(hits);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pointer::MetaPredicate;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every filter it was asked, answers from a fixed table.
    struct RecordingService {
        responses: BTreeMap<String, Vec<Document>>,
        seen: Mutex<Vec<MetaFilter>>,
    }

    #[async_trait]
    impl RetrievalService for RecordingService {
        async fn similarity_search(
            &self,
            _query: &str,
            _limit: usize,
            _predicate: Option<&MetaPredicate>,
        ) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }

        async fn metadata_search(
            &self,
            filter: &MetaFilter,
            _options: &MetadataSearchOptions,
        ) -> Result<Vec<Document>> {
            self.seen.lock().unwrap().push(filter.clone());
            let key = serde_json::to_string(filter).unwrap();
            Ok(self.responses.get(&key).cloned().unwrap_or_default())
        }
    }

    fn filter_key(entries: &[(&str, Value)]) -> String {
        let filter: MetaFilter = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        serde_json::to_string(&filter).unwrap()
    }

    #[tokio::test]
    async fn test_one_lookup_per_input_document() {
        let mut responses = BTreeMap::new();
        responses.insert(
            filter_key(&[("/id", json!(1))]),
            vec![Document::new("sibling-1", json!({ "id": 1 }))],
        );
        let service = Arc::new(RecordingService {
            responses,
            seen: Mutex::new(Vec::new()),
        });

        let stage = AssociationStage::new(
            service.clone(),
            &["id".to_string()],
            MetaFilter::new(),
            MetadataSearchOptions::default(),
        )
        .unwrap();

        let input = vec![
            Document::new("a", json!({ "id": 1 })),
            Document::new("b", json!({ "id": 2 })),
        ];
        let out = stage.run(&input).await.unwrap();

        assert_eq!(service.seen.lock().unwrap().len(), 2);
        // The second lookup found nothing and contributed nothing.
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "sibling-1");
    }

    #[tokio::test]
    async fn test_no_input_runs_static_filter_once() {
        let mut static_filter = MetaFilter::new();
        static_filter.insert("/kind".to_string(), json!("book"));

        let mut responses = BTreeMap::new();
        responses.insert(
            filter_key(&[("/kind", json!("book"))]),
            vec![Document::new("book-doc", json!({}))],
        );
        let service = Arc::new(RecordingService {
            responses,
            seen: Mutex::new(Vec::new()),
        });

        let stage = AssociationStage::new(
            service.clone(),
            &["id".to_string()],
            static_filter,
            MetadataSearchOptions::default(),
        )
        .unwrap();

        let out = stage.run(&[]).await.unwrap();
        assert_eq!(service.seen.lock().unwrap().len(), 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "book-doc");
    }

    #[tokio::test]
    async fn test_static_filter_merges_under_match_keys() {
        let service = Arc::new(RecordingService {
            responses: BTreeMap::new(),
            seen: Mutex::new(Vec::new()),
        });
        let mut static_filter = MetaFilter::new();
        static_filter.insert("/kind".to_string(), json!("book"));

        let stage = AssociationStage::new(
            service.clone(),
            &["id".to_string()],
            static_filter,
            MetadataSearchOptions::default(),
        )
        .unwrap();

        stage
            .run(&[Document::new("a", json!({ "id": 7 }))])
            .await
            .unwrap();

        let seen = service.seen.lock().unwrap();
        assert_eq!(seen[0].get("/kind"), Some(&json!("book")));
        assert_eq!(seen[0].get("/id"), Some(&json!(7)));
    }

    #[tokio::test]
    async fn test_rename_mapper_rewrites_lookup_keys() {
        let service = Arc::new(RecordingService {
            responses: BTreeMap::new(),
            seen: Mutex::new(Vec::new()),
        });

        let mut table = BTreeMap::new();
        table.insert("/id".to_string(), "/recordId".to_string());

        let stage = AssociationStage::new(
            service.clone(),
            &["id".to_string()],
            MetaFilter::new(),
            MetadataSearchOptions::default(),
        )
        .unwrap()
        .with_mapper(Box::new(RenameMapper::new(table)));

        stage
            .run(&[Document::new("a", json!({ "id": 7 }))])
            .await
            .unwrap();

        let seen = service.seen.lock().unwrap();
        assert_eq!(seen[0].get("/recordId"), Some(&json!(7)));
        assert!(seen[0].get("/id").is_none());
    }

    #[tokio::test]
    async fn test_no_input_and_empty_static_filter_yields_nothing() {
        let service = Arc::new(RecordingService {
            responses: BTreeMap::new(),
            seen: Mutex::new(Vec::new()),
        });
        let stage = AssociationStage::new(
            service.clone(),
            &["id".to_string()],
            MetaFilter::new(),
            MetadataSearchOptions::default(),
        )
        .unwrap();

        let out = stage.run(&[]).await.unwrap();
        assert!(out.is_empty());
        assert!(service.seen.lock().unwrap().is_empty(), "no lookup issued");
    }

    #[tokio::test]
    async fn test_unresolvable_match_keys_skip_document() {
        let service = Arc::new(RecordingService {
            responses: BTreeMap::new(),
            seen: Mutex::new(Vec::new()),
        });
        let stage = AssociationStage::new(
            service.clone(),
            &["id".to_string()],
            MetaFilter::new(),
            MetadataSearchOptions::default(),
        )
        .unwrap();

        // No metadata key resolves and there is no static filter, so no
        // lookup is issued for this document.
        let out = stage
            .run(&[Document::new("a", json!({ "other": 1 }))])
            .await
            .unwrap();
        assert!(out.is_empty());
        assert!(service.seen.lock().unwrap().is_empty());
    }
}
