//! Raw record loaders for the build pipeline.
//!
//! Three sources: a JSON file holding an array of objects, a CSV file
//! with a header row, and a live sqlite table. The collection loader is
//! the only one that also produces a [`LoaderDescriptor`], persisted
//! beside the built index so query-time association lookups can go back
//! to the live rows.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::collection::{fetch_all_rows, open_pool};

/// Where a built index's source records live.
///
/// Written once at build time, read-only afterward. Only collection
/// sources get one; file sources have no live counterpart to point at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderDescriptor {
    /// Source kind; currently always `"collection"`.
    pub kind: String,
    /// Database URL, `sqlite:` scheme.
    pub url: String,
    /// Table the records came from.
    pub table: String,
    /// Content selector expressions used at build time.
    pub content_field_names: Vec<String>,
    /// Metadata selector expressions used at build time, if any.
    pub metadata_field_names: Vec<String>,
}

/// Load records from a JSON file. The top level must be an array;
/// anything else is fatal.
pub fn load_json_records(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse JSON in {}", path.display()))?;
    match value {
        Value::Array(records) => Ok(records),
        other => bail!(
            "{}: expected a top-level JSON array, got {}",
            path.display(),
            json_kind(&other)
        ),
    }
}

/// Load records from a CSV file with a header row. Every cell becomes a
/// string value keyed by its header.
pub fn load_csv_records(path: &Path) -> Result<Vec<Value>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read CSV header in {}", path.display()))?
        .clone();

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.with_context(|| format!("failed to read CSV row in {}", path.display()))?;
        let mut obj = serde_json::Map::new();
        for (header, cell) in headers.iter().zip(row.iter()) {
            obj.insert(header.to_string(), Value::String(cell.to_string()));
        }
        records.push(Value::Object(obj));
    }
    Ok(records)
}

/// Load every row of a sqlite table as a JSON object, plus the
/// descriptor to persist beside the built index.
pub async fn load_collection_records(
    url: &str,
    table: &str,
    content_fields: &[String],
    metadata_fields: &[String],
) -> Result<(Vec<Value>, LoaderDescriptor)> {
    let pool = open_pool(url).await?;
    let result = fetch_all_rows(&pool, table).await;
    pool.close().await;
    let records = result?;

    let descriptor = LoaderDescriptor {
        kind: "collection".to_string(),
        url: url.to_string(),
        table: table.to_string(),
        content_field_names: content_fields.to_vec(),
        metadata_field_names: metadata_fields.to_vec(),
    };
    Ok((records, descriptor))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
