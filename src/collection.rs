//! Live sqlite collection backend.
//!
//! Rows are fetched as raw JSON records and pushed through the same
//! projector the build pipeline uses, so both backends hand out documents
//! of the same shape. "Similarity" here is term matching over the content
//! columns, not vector distance; a collection has no embeddings.
//!
//! A connection pool is opened per logical query and closed on every
//! path, success or error.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Column, Row};
use std::str::FromStr;

use crate::document::Document;
use crate::pointer::{compile_filter, MetaFilter, MetaPredicate};
use crate::project::{DocumentProjector, ProjectionMode};
use crate::selector::FieldSelectorSet;
use crate::service::{MetadataSearchOptions, RetrievalService};

pub struct CollectionService {
    url: String,
    table: String,
    projector: DocumentProjector,
    content: FieldSelectorSet,
}

impl CollectionService {
    pub fn new(
        url: String,
        table: String,
        content: FieldSelectorSet,
        metadata: Option<FieldSelectorSet>,
    ) -> Self {
        Self {
            url,
            table,
            projector: DocumentProjector::new(content.clone(), metadata),
            content,
        }
    }

    async fn fetch_records(&self) -> Result<Vec<Value>> {
        let pool = open_pool(&self.url).await?;
        let result = fetch_all_rows(&pool, &self.table).await;
        pool.close().await;
        result
    }
}

#[async_trait]
impl RetrievalService for CollectionService {
    /// Term matching in place of vector similarity: the query splits on
    /// whitespace and commas, and a record matches when any content
    /// column contains any term (case-insensitive). Results keep row
    /// order and stop at `limit` after the predicate.
    async fn similarity_search(
        &self,
        query: &str,
        limit: usize,
        predicate: Option<&MetaPredicate>,
    ) -> Result<Vec<Document>> {
        let terms: Vec<String> = query
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect();

        let records = self.fetch_records().await?;
        let mut out = Vec::new();
        for record in &records {
            if !record_matches(record, &self.content, &terms) {
                continue;
            }
            for doc in self.projector.project(record, ProjectionMode::Split) {
                if predicate.map_or(true, |p| p(&doc)) {
                    out.push(doc);
                    if out.len() == limit {
                        return Ok(out);
                    }
                }
            }
        }
        Ok(out)
    }

    async fn metadata_search(
        &self,
        filter: &MetaFilter,
        options: &MetadataSearchOptions,
    ) -> Result<Vec<Document>> {
        if filter.is_empty() {
            bail!("metadata search needs at least one filter clause");
        }
        let record_predicate = compile_record_filter(filter)?;
        let mode = if options.retrieve_object {
            ProjectionMode::Composite
        } else {
            ProjectionMode::Split
        };

        let records = self.fetch_records().await?;
        let mut out = Vec::new();
        for record in records.iter().filter(|r| record_predicate(r)) {
            out.extend(self.projector.project(record, mode));
        }
        Ok(out)
    }
}

/// A filter over raw records rather than projected documents. Clauses
/// are AND-ed exact matches, the same semantics as the document-side
/// predicate.
fn compile_record_filter(filter: &MetaFilter) -> Result<impl Fn(&Value) -> bool> {
    let predicate: MetaPredicate = compile_filter(filter)?;
    Ok(move |record: &Value| predicate(&Document::new("", record.clone())))
}

fn record_matches(record: &Value, content: &FieldSelectorSet, terms: &[String]) -> bool {
    if terms.is_empty() {
        return true;
    }
    for (_, pointer) in content.iter() {
        let text = match pointer.get(record) {
            Some(Value::String(s)) => s.to_lowercase(),
            Some(other) if !other.is_null() => other.to_string().to_lowercase(),
            _ => continue,
        };
        if terms.iter().any(|t| text.contains(t)) {
            return true;
        }
    }
    false
}

// ============ Shared sqlite plumbing ============

pub(crate) async fn open_pool(url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid sqlite URL: {url}"))?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    Ok(pool)
}

/// Fetch every row of `table` as a JSON object keyed by column name.
/// Integer, float, and text columns map to their JSON counterparts;
/// NULL maps to JSON null.
pub(crate) async fn fetch_all_rows(pool: &SqlitePool, table: &str) -> Result<Vec<Value>> {
    if !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("invalid table name: {table}");
    }
    let query = format!("SELECT * FROM \"{table}\"");
    let rows = sqlx::query(&query)
        .fetch_all(pool)
        .await
        .with_context(|| format!("failed to query table {table}"))?;

    Ok(rows.iter().map(row_to_json).collect())
}

fn row_to_json(row: &sqlx::sqlite::SqliteRow) -> Value {
    let mut obj = Map::new();
    for column in row.columns() {
        let name = column.name();
        let value = if let Ok(v) = row.try_get::<i64, _>(name) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<f64, _>(name) {
            Value::from(v)
        } else if let Ok(v) = row.try_get::<String, _>(name) {
            Value::String(v)
        } else {
            Value::Null
        };
        obj.insert(name.to_string(), value);
    }
    Value::Object(obj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seed(dir: &std::path::Path) -> String {
        let url = format!("sqlite:{}?mode=rwc", dir.join("test.db").display());
        let pool = open_pool(&url).await.unwrap();
        sqlx::query("CREATE TABLE docs (id INTEGER, title TEXT, body TEXT)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO docs VALUES (1, 'Rust intro', 'memory safety'), (2, 'Cooking', 'pasta recipes')")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;
        url
    }

    fn service(url: &str) -> CollectionService {
        CollectionService::new(
            url.to_string(),
            "docs".to_string(),
            FieldSelectorSet::parse("title,body").unwrap(),
            Some(FieldSelectorSet::parse("id").unwrap()),
        )
    }

    #[tokio::test]
    async fn test_term_match_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let url = seed(dir.path()).await;
        let hits = service(&url).similarity_search("rust", 10, None).await.unwrap();

        assert!(!hits.is_empty());
        assert!(hits.iter().all(|d| d.metadata["id"] == json!(1)));
    }

    #[tokio::test]
    async fn test_metadata_search_split_vs_composite() {
        let dir = tempfile::tempdir().unwrap();
        let url = seed(dir.path()).await;
        let service = service(&url);

        let mut filter = MetaFilter::new();
        filter.insert("/id".to_string(), json!(2));

        let split = service
            .metadata_search(&filter, &MetadataSearchOptions::default())
            .await
            .unwrap();
        assert_eq!(split.len(), 2, "one document per content selector");
        assert_eq!(split[0].content_source(), Some("title"));

        let options = MetadataSearchOptions {
            retrieve_object: true,
            ..Default::default()
        };
        let composite = service.metadata_search(&filter, &options).await.unwrap();
        assert_eq!(composite.len(), 1);
        let payload: Value = serde_json::from_str(&composite[0].content).unwrap();
        assert_eq!(payload["title"], json!("Cooking"));
    }

    #[tokio::test]
    async fn test_limit_caps_results() {
        let dir = tempfile::tempdir().unwrap();
        let url = seed(dir.path()).await;
        let hits = service(&url)
            .similarity_search("rust pasta", 1, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_bad_table_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let url = seed(dir.path()).await;
        let bad = CollectionService::new(
            url,
            "docs; DROP TABLE docs".to_string(),
            FieldSelectorSet::parse("title").unwrap(),
            None,
        );
        assert!(bad.similarity_search("x", 1, None).await.is_err());
    }
}
