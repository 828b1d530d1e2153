//! Optional TOML configuration for provider settings.
//!
//! Everything that shapes a run (selectors, store locator, preset) comes
//! from the CLI; the config file only carries transport-level provider
//! knobs. A missing file means defaults.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub chat: ChatSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            batch_size: default_batch_size(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatSettings {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_batch_size() -> usize {
    64
}
fn default_temperature() -> f64 {
    0.5
}

/// Load the config file, or defaults when it does not exist.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "failed to parse config file")?;

    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if !(0.0..=2.0).contains(&config.chat.temperature) {
        anyhow::bail!("chat.temperature must be in [0.0, 2.0]");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config(Path::new("/nonexistent/docloom.toml")).unwrap();
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.chat.temperature, 0.5);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = std::env::temp_dir().join("docloom-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("docloom.toml");
        std::fs::write(&path, "[embedding]\ntimeout_secs = 5\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.embedding.timeout_secs, 5);
        assert_eq!(config.embedding.batch_size, 64);
    }

    #[test]
    fn test_invalid_batch_size_rejected() {
        let dir = std::env::temp_dir().join("docloom-config-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.toml");
        std::fs::write(&path, "[embedding]\nbatch_size = 0\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
