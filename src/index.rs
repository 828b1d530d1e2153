//! Local persisted index backend.
//!
//! A store directory holds everything a query run needs:
//!
//! - `index.json` — `{ dims, count }` header
//! - `vectors.bin` — count × dims little-endian f32 values, concatenated
//! - `docstore.json` — `[key, Document]` pairs parallel to the vectors
//! - `model.json` — `{ name }` of the embedding model the vectors came from
//! - `loader.json` — source collection descriptor, collection builds only
//! - `docstore-assoc.json` — `[key, Document]` pairs of un-embedded siblings
//!
//! Search is brute-force cosine over the in-memory vectors; the store is
//! loaded once per run and read-only afterward.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::document::Document;
use crate::embedding::{blob_to_vec, cosine_similarity, embed_query, vec_to_blob, EmbeddingProvider};
use crate::error::SchemaError;
use crate::loader::LoaderDescriptor;
use crate::pointer::{compile_filter, MetaFilter, MetaPredicate};
use crate::service::{MetadataSearchOptions, RetrievalService};

pub const INDEX_FILE: &str = "index.json";
pub const VECTORS_FILE: &str = "vectors.bin";
pub const DOCSTORE_FILE: &str = "docstore.json";
pub const MODEL_FILE: &str = "model.json";
pub const LOADER_FILE: &str = "loader.json";
pub const ASSOC_FILE: &str = "docstore-assoc.json";

#[derive(Debug, Serialize, Deserialize)]
struct IndexHeader {
    dims: usize,
    count: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelDescriptor {
    name: String,
}

/// The local backend: vectors, docstore, and optional side-cars, all
/// resident in memory.
pub struct LocalIndexService {
    provider: Box<dyn EmbeddingProvider>,
    vectors: Vec<Vec<f32>>,
    docs: Vec<Document>,
    assoc_docs: Vec<Document>,
    descriptor: Option<LoaderDescriptor>,
}

impl LocalIndexService {
    /// Read the embedding model id out of a store directory.
    pub fn read_model(dir: &Path) -> Result<String> {
        let path = dir.join(MODEL_FILE);
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let descriptor: ModelDescriptor = serde_json::from_str(&text)
            .map_err(|e| SchemaError::MalformedStore(format!("{MODEL_FILE}: {e}")))?;
        Ok(descriptor.name)
    }

    /// Load a store directory. The provider must match the store's
    /// `model.json`; [`crate::service::resolve_service`] wires that up.
    pub fn load(dir: &Path, provider: Box<dyn EmbeddingProvider>) -> Result<Self> {
        let header: IndexHeader = read_json(&dir.join(INDEX_FILE))?;

        let blob = std::fs::read(dir.join(VECTORS_FILE))
            .with_context(|| format!("failed to read {}", dir.join(VECTORS_FILE).display()))?;
        let expected = header
            .count
            .checked_mul(header.dims)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                SchemaError::MalformedStore(format!(
                    "{INDEX_FILE}: vector count {} x dims {} overflows",
                    header.count, header.dims
                ))
            })?;
        if blob.len() != expected {
            bail!(SchemaError::MalformedStore(format!(
                "{VECTORS_FILE}: expected {expected} bytes for {} x {} vectors, got {}",
                header.count,
                header.dims,
                blob.len()
            )));
        }
        let all = blob_to_vec(&blob);
        let vectors: Vec<Vec<f32>> = all.chunks(header.dims.max(1)).map(<[f32]>::to_vec).collect();

        let pairs: Vec<(u64, Document)> = read_json(&dir.join(DOCSTORE_FILE))?;
        if pairs.len() != header.count {
            bail!(SchemaError::MalformedStore(format!(
                "{DOCSTORE_FILE}: {} documents but index header says {}",
                pairs.len(),
                header.count
            )));
        }
        let docs = pairs.into_iter().map(|(_, doc)| doc).collect();

        let assoc_path = dir.join(ASSOC_FILE);
        let assoc_docs = if assoc_path.is_file() {
            let pairs: Vec<(u64, Document)> = read_json(&assoc_path)?;
            pairs.into_iter().map(|(_, doc)| doc).collect()
        } else {
            Vec::new()
        };

        let loader_path = dir.join(LOADER_FILE);
        let descriptor = if loader_path.is_file() {
            Some(read_json(&loader_path)?)
        } else {
            None
        };

        Ok(Self {
            provider,
            vectors,
            docs,
            assoc_docs,
            descriptor,
        })
    }
}

#[async_trait]
impl RetrievalService for LocalIndexService {
    async fn similarity_search(
        &self,
        query: &str,
        limit: usize,
        predicate: Option<&MetaPredicate>,
    ) -> Result<Vec<Document>> {
        let query_vec = embed_query(self.provider.as_ref(), query).await?;

        let mut scored: Vec<(f32, &Document)> = self
            .vectors
            .iter()
            .zip(&self.docs)
            .map(|(vec, doc)| (cosine_similarity(&query_vec, vec), doc))
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .map(|(_, doc)| doc)
            .filter(|doc| predicate.map_or(true, |p| p(doc)))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn metadata_search(
        &self,
        filter: &MetaFilter,
        options: &MetadataSearchOptions,
    ) -> Result<Vec<Document>> {
        if filter.is_empty() {
            bail!("metadata search needs at least one filter clause");
        }
        let predicate = compile_filter(filter)?;
        let source = if options.use_assoc_store {
            &self.assoc_docs
        } else {
            &self.docs
        };
        Ok(source.iter().filter(|d| predicate(d)).cloned().collect())
    }

    fn loader_descriptor(&self) -> Option<&LoaderDescriptor> {
        self.descriptor.as_ref()
    }
}

/// Write a complete store directory. `vectors` and `docs` must be
/// parallel; keys in the persisted docstores are synthetic positions.
pub fn persist_store(
    dir: &Path,
    model: &str,
    dims: usize,
    vectors: &[Vec<f32>],
    docs: &[Document],
    assoc_docs: &[Document],
    descriptor: Option<&LoaderDescriptor>,
) -> Result<()> {
    if vectors.len() != docs.len() {
        bail!(
            "vector/document count mismatch: {} vectors, {} documents",
            vectors.len(),
            docs.len()
        );
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create store directory {}", dir.display()))?;

    let header = IndexHeader {
        dims,
        count: vectors.len(),
    };
    write_json(&dir.join(INDEX_FILE), &header)?;

    let mut blob = Vec::with_capacity(vectors.len() * dims * 4);
    for vec in vectors {
        blob.extend_from_slice(&vec_to_blob(vec));
    }
    std::fs::write(dir.join(VECTORS_FILE), blob)
        .with_context(|| format!("failed to write {}", dir.join(VECTORS_FILE).display()))?;

    write_json(&dir.join(DOCSTORE_FILE), &keyed(docs))?;
    write_json(
        &dir.join(MODEL_FILE),
        &ModelDescriptor {
            name: model.to_string(),
        },
    )?;
    if !assoc_docs.is_empty() {
        write_json(&dir.join(ASSOC_FILE), &keyed(assoc_docs))?;
    }
    if let Some(descriptor) = descriptor {
        write_json(&dir.join(LOADER_FILE), descriptor)?;
    }
    Ok(())
}

fn keyed(docs: &[Document]) -> Vec<(u64, &Document)> {
    docs.iter().enumerate().map(|(i, d)| (i as u64, d)).collect()
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).map_err(|e| {
        SchemaError::MalformedStore(format!(
            "{}: {e}",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        ))
        .into()
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string(value)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))
}
