//! Chat-completion shim used by the answer stage.
//!
//! Only models with a known provider are dispatched; anything else is
//! reported as unrecognized so the caller can degrade instead of erroring
//! mid-pipeline.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::ChatSettings;

/// Chat model ids with a wired provider.
const KNOWN_CHAT_MODELS: &[&str] = &["gpt-4o-mini", "gpt-4o"];

/// Whether a chat model id has a provider behind it.
pub fn is_known_chat_model(model: &str) -> bool {
    KNOWN_CHAT_MODELS.contains(&model)
}

/// Answer a question against stuffed context via the chat completions API.
/// Needs `OPENAI_API_KEY`.
pub async fn complete(
    model: &str,
    context: &str,
    question: &str,
    settings: &ChatSettings,
) -> Result<String> {
    let api_key =
        std::env::var("OPENAI_API_KEY").map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

    let prompt = format!(
        "Answer the question using only the context below. If the context \
         does not contain the answer, say so.\n\nContext:\n{context}\n\nQuestion: {question}"
    );

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()?;

    let url = format!("{}/chat/completions", settings.api_base.trim_end_matches('/'));
    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", api_key))
        .json(&serde_json::json!({
            "model": model,
            "temperature": settings.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        }))
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("chat API error {}: {}", status, body);
    }

    let json: serde_json::Value = response.json().await?;
    let answer = json
        .pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("invalid chat response: missing message content"))?;

    Ok(answer.to_string())
}
