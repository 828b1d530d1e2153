//! Vector retrieval stage.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::document::Document;
use crate::error::SchemaError;
use crate::pipeline::Stage;
use crate::pointer::{compile_filter, MetaFilter, MetaPredicate};
use crate::service::RetrievalService;

/// Similarity search against the backing service. Ignores input
/// documents; the query is fixed at construction, and the metadata
/// filter is compiled into a predicate exactly once.
pub struct VectorStage {
    service: Arc<dyn RetrievalService>,
    query: String,
    limit: usize,
    predicate: Option<MetaPredicate>,
}

impl VectorStage {
    pub fn new(
        service: Arc<dyn RetrievalService>,
        query: impl Into<String>,
        limit: usize,
        filter: &MetaFilter,
    ) -> Result<Self, SchemaError> {
        let predicate = if filter.is_empty() {
            None
        } else {
            Some(compile_filter(filter)?)
        };
        Ok(Self {
            service,
            query: query.into(),
            limit,
            predicate,
        })
    }
}

#[async_trait]
impl Stage for VectorStage {
    async fn run(&self, _input: &[Document]) -> Result<Vec<Document>> {
        self.service
            .similarity_search(&self.query, self.limit, self.predicate.as_ref())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MetadataSearchOptions;
    use serde_json::json;

    struct StubService {
        docs: Vec<Document>,
    }

    #[async_trait]
    impl RetrievalService for StubService {
        async fn similarity_search(
            &self,
            _query: &str,
            limit: usize,
            predicate: Option<&MetaPredicate>,
        ) -> Result<Vec<Document>> {
            Ok(self
                .docs
                .iter()
                .filter(|d| predicate.map_or(true, |p| p(d)))
                .take(limit)
                .cloned()
                .collect())
        }

        async fn metadata_search(
            &self,
            _filter: &MetaFilter,
            _options: &MetadataSearchOptions,
        ) -> Result<Vec<Document>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_filter_compiled_and_applied() {
        let service = Arc::new(StubService {
            docs: vec![
                Document::new("a", json!({ "kind": "x" })),
                Document::new("b", json!({ "kind": "y" })),
            ],
        });
        let mut filter = MetaFilter::new();
        filter.insert("/kind".to_string(), json!("y"));

        let stage = VectorStage::new(service, "query", 10, &filter).unwrap();
        let out = stage.run(&[]).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "b");
    }

    #[tokio::test]
    async fn test_input_documents_ignored() {
        let service = Arc::new(StubService {
            docs: vec![Document::new("fresh", json!({}))],
        });
        let stage = VectorStage::new(service, "query", 10, &MetaFilter::new()).unwrap();
        let out = stage
            .run(&[Document::new("stale", json!({}))])
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "fresh");
    }
}
