//! The retrieval backend contract and store-locator resolution.
//!
//! A store locator is either a `sqlite:` URL, which selects the live
//! collection backend, or a filesystem directory holding a persisted
//! local index. Both backends answer the same two questions: nearest
//! documents to a query text, and documents matching a metadata filter.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::collection::CollectionService;
use crate::config::Config;
use crate::document::Document;
use crate::embedding::create_provider;
use crate::error::SchemaError;
use crate::index::{LocalIndexService, MODEL_FILE};
use crate::loader::LoaderDescriptor;
use crate::pointer::{MetaFilter, MetaPredicate};
use crate::selector::FieldSelectorSet;

/// Options for a metadata lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataSearchOptions {
    /// Search the association side-car instead of the embedded docstore.
    pub use_assoc_store: bool,
    /// Hand back one composite document per record instead of
    /// per-field documents.
    pub retrieve_object: bool,
}

/// A retrieval backend.
#[async_trait]
pub trait RetrievalService: Send + Sync {
    /// Nearest documents to `query`, best first, at most `limit`, with
    /// an optional post-filter applied before the limit.
    async fn similarity_search(
        &self,
        query: &str,
        limit: usize,
        predicate: Option<&MetaPredicate>,
    ) -> Result<Vec<Document>>;

    /// Documents whose metadata matches every clause of `filter`.
    async fn metadata_search(
        &self,
        filter: &MetaFilter,
        options: &MetadataSearchOptions,
    ) -> Result<Vec<Document>>;

    /// Where the un-embedded source records live, if the store was built
    /// from a live collection.
    fn loader_descriptor(&self) -> Option<&LoaderDescriptor> {
        None
    }
}

/// What the collection backend needs beyond its URL. A local index
/// ignores all of this; its documents were projected at build time.
#[derive(Debug, Clone, Default)]
pub struct ServiceOptions {
    pub content: Option<FieldSelectorSet>,
    pub metadata: Option<FieldSelectorSet>,
    pub table: Option<String>,
}

/// Scheme prefix selecting the collection backend.
pub const SQLITE_PREFIX: &str = "sqlite:";

/// Resolve a store locator into a backend.
///
/// A `sqlite:` locator needs a table name in `options`. Anything else is
/// taken as a local index directory; a directory without `model.json` is
/// a fatal configuration error, never a silent fallback.
pub async fn resolve_service(
    locator: &str,
    options: &ServiceOptions,
    config: &Config,
) -> Result<Arc<dyn RetrievalService>> {
    if locator.starts_with(SQLITE_PREFIX) {
        let table = options
            .table
            .as_deref()
            .context("collection store needs a table name")?;
        let content = options
            .content
            .clone()
            .context("collection store needs content selectors")?;
        return Ok(Arc::new(CollectionService::new(
            locator.to_string(),
            table.to_string(),
            content,
            options.metadata.clone(),
        )));
    }

    let dir = Path::new(locator);
    if !dir.join(MODEL_FILE).is_file() {
        bail!(SchemaError::MissingModelDescriptor(locator.to_string()));
    }

    let model = LocalIndexService::read_model(dir)?;
    let provider = create_provider(&model, &config.embedding)?;
    let service = LocalIndexService::load(dir, provider)?;
    Ok(Arc::new(service))
}
