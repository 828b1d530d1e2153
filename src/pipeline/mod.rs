//! Composable retrieval pipeline.
//!
//! A pipeline owns an immutable, ordered list of stages fixed at
//! construction. Execution is a fold: each stage receives the previous
//! stage's output documents and produces its own, and the final stage's
//! output is the pipeline's result — a stage that returns nothing wins
//! with nothing.
//!
//! Stage-specific inputs (the query text, the question, filters) are
//! baked into each stage at construction, so a stage can never run
//! without its backing service or parameters.

pub mod answer;
pub mod assoc;
pub mod vector;

use anyhow::Result;
use async_trait::async_trait;

use crate::document::Document;

/// One step of a retrieval pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Transform the previous stage's output into this stage's output.
    /// The first stage of a pipeline receives an empty slice.
    async fn run(&self, input: &[Document]) -> Result<Vec<Document>>;
}

/// An immutable stage chain.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order. Backend errors abort the run; the
    /// answer stage alone degrades softly.
    pub async fn run(&self) -> Result<Vec<Document>> {
        let mut docs = Vec::new();
        for stage in &self.stages {
            docs = stage.run(&docs).await?;
        }
        Ok(docs)
    }
}
