//! Embedding providers and vector utilities.
//!
//! Providers are keyed by the model id persisted in a store's
//! `model.json`, so a query-time load resolves the exact provider the
//! index was built with:
//!
//! | Model id | Provider |
//! |----------|----------|
//! | `text-embedding-3-small`, `text-embedding-3-large` | OpenAI API |
//! | `hash-<dims>` (e.g. `hash-64`) | Deterministic offline hashing |
//!
//! The hash provider embeds nothing semantic — it is a deterministic
//! bag-of-words projection for offline runs and tests.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingSettings;
use crate::error::SchemaError;

/// An embedding backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// The model identifier persisted in `model.json`.
    fn model_name(&self) -> &str;

    /// Embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Largest content size (in characters) a single embed call accepts.
    /// The build pipeline caps its chunk size at this.
    fn max_chunk_chars(&self) -> usize {
        8000
    }

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> Result<Vec<f32>> {
    let vectors = provider.embed(&[text.to_string()]).await?;
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
}

/// Resolve a provider from a model id.
pub fn create_provider(
    model: &str,
    settings: &EmbeddingSettings,
) -> Result<Box<dyn EmbeddingProvider>, SchemaError> {
    if let Some(dims) = model.strip_prefix("hash-").and_then(|d| d.parse().ok()) {
        return Ok(Box::new(HashProvider::new(model.to_string(), dims)));
    }
    match model {
        "text-embedding-3-small" => Ok(Box::new(OpenAiEmbedding::new(
            model.to_string(),
            1536,
            settings.clone(),
        ))),
        "text-embedding-3-large" => Ok(Box::new(OpenAiEmbedding::new(
            model.to_string(),
            3072,
            settings.clone(),
        ))),
        other => Err(SchemaError::UnknownModel(other.to_string())),
    }
}

// ============ Deterministic hash provider ============

/// Offline provider: FNV-hashes whitespace tokens into a fixed number of
/// buckets and L2-normalizes the result. Deterministic across runs.
pub struct HashProvider {
    model: String,
    dims: usize,
}

impl HashProvider {
    pub fn new(model: String, dims: usize) -> Self {
        Self { model, dims }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims.max(1)];
        for token in text.split_whitespace() {
            let bucket = fnv1a(token.to_lowercase().as_bytes()) as usize % vec.len();
            vec[bucket] += 1.0;
        }
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }
        vec
    }
}

#[async_trait]
impl EmbeddingProvider for HashProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

// ============ OpenAI provider ============

/// Provider calling `POST /v1/embeddings`. Needs `OPENAI_API_KEY`.
pub struct OpenAiEmbedding {
    model: String,
    dims: usize,
    settings: EmbeddingSettings,
}

impl OpenAiEmbedding {
    pub fn new(model: String, dims: usize, settings: EmbeddingSettings) -> Self {
        Self {
            model,
            dims,
            settings,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .build()?;

        let url = format!(
            "{}/embeddings",
            self.settings.api_base.trim_end_matches('/')
        );
        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .json(&serde_json::json!({ "model": self.model, "input": texts }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("embeddings API error {}: {}", status, body);
        }

        let json: serde_json::Value = response.json().await?;
        let data = json
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| anyhow::anyhow!("invalid embeddings response: missing data array"))?;

        let mut vectors = Vec::with_capacity(data.len());
        for item in data {
            let embedding = item
                .get("embedding")
                .and_then(|e| e.as_array())
                .ok_or_else(|| anyhow::anyhow!("invalid embeddings response: missing embedding"))?;
            vectors.push(
                embedding
                    .iter()
                    .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                    .collect(),
            );
        }
        Ok(vectors)
    }
}

// ============ Vector codecs ============

/// Encode a float vector as little-endian f32 bytes, 4 bytes per value.
/// This is the on-disk format of a store's `vectors.bin`.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian f32 bytes back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in `[-1, 1]`; `0.0` for empty or mismatched lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |acc, (x, y)| {
            (acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
        });
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}
