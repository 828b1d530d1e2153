//! Answer-synthesis stage.
//!
//! The one stage that degrades instead of erroring: with nothing to
//! ground an answer in, or a chat model no provider claims, it returns
//! an empty result so the rest of the pipeline's output is not lost to
//! a hard failure at the very end.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use crate::chat;
use crate::config::ChatSettings;
use crate::document::Document;
use crate::pipeline::Stage;

pub struct AnswerStage {
    model: String,
    question: String,
    settings: ChatSettings,
}

impl AnswerStage {
    pub fn new(model: impl Into<String>, question: impl Into<String>, settings: ChatSettings) -> Self {
        Self {
            model: model.into(),
            question: question.into(),
            settings,
        }
    }
}

#[async_trait]
impl Stage for AnswerStage {
    async fn run(&self, input: &[Document]) -> Result<Vec<Document>> {
        if input.is_empty() {
            eprintln!("answer stage: no context documents, skipping synthesis");
            return Ok(Vec::new());
        }
        if !chat::is_known_chat_model(&self.model) {
            eprintln!("answer stage: unrecognized chat model {:?}, skipping synthesis", self.model);
            return Ok(Vec::new());
        }

        let context = input
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let answer = chat::complete(&self.model, &context, &self.question, &self.settings).await?;

        Ok(vec![Document::new(
            answer,
            json!({ "question": self.question, "model": self.model }),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_input_soft_fails() {
        let stage = AnswerStage::new("gpt-4o-mini", "why?", ChatSettings::default());
        let out = stage.run(&[]).await.unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_model_soft_fails() {
        let stage = AnswerStage::new("not-a-model", "why?", ChatSettings::default());
        let out = stage
            .run(&[Document::new("context", json!({}))])
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
