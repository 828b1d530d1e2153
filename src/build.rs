//! Build pipeline: load raw records, project, chunk, embed, persist.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use crate::chunk::split_text;
use crate::config::Config;
use crate::document::Document;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::index::persist_store;
use crate::loader::{
    load_collection_records, load_csv_records, load_json_records, LoaderDescriptor,
};
use crate::project::{DocumentProjector, ProjectionMode};
use crate::selector::FieldSelectorSet;
use crate::service::SQLITE_PREFIX;

#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Input: a `.json` array file, a `.csv` file, or a `sqlite:` URL.
    pub input: String,
    /// Output store directory.
    pub output: PathBuf,
    /// Embedding model id to build with and record in `model.json`.
    pub model: String,
    /// Content selector expressions.
    pub content: Vec<String>,
    /// Metadata selector expressions; empty means whole-record metadata.
    pub metadata: Vec<String>,
    /// Chunk-size cap in characters; clamped to the provider's limit.
    pub chunk_size: Option<usize>,
    /// Also persist composite projections of every record as the
    /// association side-car.
    pub with_assoc: bool,
    /// Table name, `sqlite:` inputs only.
    pub table: Option<String>,
}

/// Run a build end to end. Returns the number of embedded documents.
pub async fn run_build(options: &BuildOptions, config: &Config) -> Result<usize> {
    let provider = create_provider(&options.model, &config.embedding)?;

    let content = FieldSelectorSet::from_list(&options.content)?;
    let metadata = if options.metadata.is_empty() {
        None
    } else {
        Some(FieldSelectorSet::from_list(&options.metadata)?)
    };
    let projector = DocumentProjector::new(content, metadata);

    let (records, descriptor) = load_records(options).await?;
    println!("Loaded {} records from {}", records.len(), options.input);

    let chunk_cap = options
        .chunk_size
        .unwrap_or_else(|| provider.max_chunk_chars())
        .min(provider.max_chunk_chars());

    let mut docs = Vec::new();
    for record in &records {
        for doc in projector.project(record, ProjectionMode::Split) {
            docs.extend(chunk_document(doc, chunk_cap));
        }
    }
    println!("Projected {} documents", docs.len());

    let vectors = embed_all(provider.as_ref(), &docs, config.embedding.batch_size).await?;

    let assoc_docs: Vec<Document> = if options.with_assoc {
        records
            .iter()
            .map(|r| projector.composite(r))
            .collect()
    } else {
        Vec::new()
    };

    persist_store(
        &options.output,
        &options.model,
        provider.dims(),
        &vectors,
        &docs,
        &assoc_docs,
        descriptor.as_ref(),
    )?;
    println!(
        "Wrote store to {} ({} vectors, dims {})",
        options.output.display(),
        vectors.len(),
        provider.dims()
    );
    Ok(docs.len())
}

async fn load_records(
    options: &BuildOptions,
) -> Result<(Vec<serde_json::Value>, Option<LoaderDescriptor>)> {
    if options.input.starts_with(SQLITE_PREFIX) {
        let table = options
            .table
            .as_deref()
            .context("building from a collection needs a table name")?;
        let (records, descriptor) =
            load_collection_records(&options.input, table, &options.content, &options.metadata)
                .await?;
        return Ok((records, Some(descriptor)));
    }

    let path = Path::new(&options.input);
    let records = match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => load_csv_records(path)?,
        Some("json") => load_json_records(path)?,
        _ => bail!("unsupported input {}: expected .json, .csv, or a sqlite: URL", options.input),
    };
    Ok((records, None))
}

/// Split one projected document into chunk documents sharing its
/// metadata. Empty content stays a single empty document so the store
/// keeps one entry per content field.
fn chunk_document(doc: Document, chunk_cap: usize) -> Vec<Document> {
    let chunks = split_text(&doc.content, chunk_cap);
    if chunks.is_empty() {
        return vec![doc];
    }
    chunks
        .into_iter()
        .map(|chunk| Document::new(chunk, doc.metadata.clone()))
        .collect()
}

async fn embed_all(
    provider: &dyn EmbeddingProvider,
    docs: &[Document],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut vectors = Vec::with_capacity(docs.len());
    for batch in docs.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|d| d.content.clone()).collect();
        let mut batch_vectors = provider.embed(&texts).await?;
        if batch_vectors.len() != texts.len() {
            bail!(
                "embedding provider returned {} vectors for {} inputs",
                batch_vectors.len(),
                texts.len()
            );
        }
        vectors.append(&mut batch_vectors);
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_records(dir: &Path) -> PathBuf {
        let path = dir.join("records.json");
        let records = json!([
            { "id": 1, "title": "Rust intro", "body": "ownership and borrowing" },
            { "id": 2, "title": "Gardening", "body": "soil and compost" }
        ]);
        std::fs::write(&path, records.to_string()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_build_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_records(dir.path());
        let output = dir.path().join("store");

        let options = BuildOptions {
            input: input.display().to_string(),
            output: output.clone(),
            model: "hash-16".to_string(),
            content: vec!["title".to_string(), "body".to_string()],
            metadata: vec!["id".to_string()],
            chunk_size: None,
            with_assoc: true,
            table: None,
        };
        let count = run_build(&options, &Config::default()).await.unwrap();

        // 2 records x 2 content selectors.
        assert_eq!(count, 4);
        for file in ["index.json", "vectors.bin", "docstore.json", "model.json", "docstore-assoc.json"] {
            assert!(output.join(file).is_file(), "missing {file}");
        }
        assert!(!output.join("loader.json").exists(), "file input has no loader descriptor");
    }

    #[tokio::test]
    async fn test_chunking_multiplies_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.json");
        let records = json!([{ "id": 1, "body": "first paragraph\n\nsecond paragraph" }]);
        std::fs::write(&path, records.to_string()).unwrap();

        let options = BuildOptions {
            input: path.display().to_string(),
            output: dir.path().join("store"),
            model: "hash-16".to_string(),
            content: vec!["body".to_string()],
            metadata: vec!["id".to_string()],
            chunk_size: Some(20),
            with_assoc: false,
            table: None,
        };
        let count = run_build(&options, &Config::default()).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_unknown_input_extension_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.yaml");
        std::fs::write(&path, "- id: 1").unwrap();

        let options = BuildOptions {
            input: path.display().to_string(),
            output: dir.path().join("store"),
            model: "hash-16".to_string(),
            content: vec!["body".to_string()],
            metadata: vec![],
            chunk_size: None,
            with_assoc: false,
            table: None,
        };
        assert!(run_build(&options, &Config::default()).await.is_err());
    }
}
