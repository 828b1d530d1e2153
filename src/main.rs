//! # docloom CLI
//!
//! The `docloom` binary builds persisted vector stores from raw records
//! and runs retrieval presets against them.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docloom build` | Load records, project, chunk, embed, and write a store |
//! | `docloom retrieve` | Run a retrieval preset against a store |
//!
//! ## Examples
//!
//! ```bash
//! # Build a store from a JSON array file with the offline hash model
//! docloom build --input records.json --store ./store \
//!     --model hash-64 --content title,body --meta id --with-assoc
//!
//! # Build from a live sqlite table
//! docloom build --input sqlite:data.db --table articles --store ./store \
//!     --model text-embedding-3-small --content title,body --meta id
//!
//! # Similarity search
//! docloom retrieve --store ./store --preset vector-doc --text "intro" --limit 4
//!
//! # Follow retrieved documents back to their source records
//! docloom retrieve --store ./store --preset assoc-doc --text "intro" \
//!     --match-by id --retrieve-object
//!
//! # Synthesize an answer from retrieved context
//! docloom retrieve --store ./store --preset feed-llm \
//!     --text "what is ownership?" --chat-model gpt-4o-mini
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use docloom::build::{run_build, BuildOptions};
use docloom::config::load_config;
use docloom::pointer::MetaFilter;
use docloom::preset::{run_preset, Preset, PresetOptions};

/// docloom — field projection and composable retrieval over
/// semi-structured records.
#[derive(Parser)]
#[command(
    name = "docloom",
    about = "Field projection and composable retrieval over semi-structured records",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Only provider-level settings live here (API base, timeouts,
    /// batch size, temperature). A missing file means defaults.
    #[arg(long, global = true, default_value = "./docloom.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build a persisted store from raw records.
    ///
    /// Loads records from a JSON array file, a CSV file, or a sqlite
    /// table; projects them into documents via the content/metadata
    /// selectors; chunks and embeds the content; and writes the store
    /// directory.
    Build {
        /// Input source: a `.json` file, a `.csv` file, or a `sqlite:` URL.
        #[arg(long)]
        input: String,

        /// Output store directory.
        #[arg(long)]
        store: PathBuf,

        /// Embedding model id (`hash-<dims>`, `text-embedding-3-small`,
        /// `text-embedding-3-large`). Recorded in the store for query time.
        #[arg(long, default_value = "hash-64")]
        model: String,

        /// Comma-joined content field selectors, e.g. `title,body` or
        /// `/meta/abstract`.
        #[arg(long)]
        content: String,

        /// Comma-joined metadata field selectors. Omitted means each
        /// document carries the whole record as metadata.
        #[arg(long)]
        meta: Option<String>,

        /// Chunk-size cap in characters. Clamped to the model's limit.
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Also persist one composite document per record as the
        /// association side-car, for `assoc-doc` lookups.
        #[arg(long)]
        with_assoc: bool,

        /// Table name, `sqlite:` inputs only.
        #[arg(long)]
        table: Option<String>,
    },

    /// Run a retrieval preset against a store.
    ///
    /// The store is either a directory written by `docloom build` or a
    /// `sqlite:` URL addressing a live table.
    Retrieve {
        /// Store locator: a store directory or a `sqlite:` URL.
        #[arg(long)]
        store: String,

        /// Preset: `vector-doc`, `assoc-doc`, `feed-llm`,
        /// `meta-vector-doc`, or `meta-assoc-doc`.
        #[arg(long, default_value = "vector-doc")]
        preset: String,

        /// Query text, or the question for `feed-llm`.
        #[arg(long, default_value = "")]
        text: String,

        /// Maximum number of vector-stage results.
        #[arg(long, default_value_t = 4)]
        limit: usize,

        /// Metadata filter clause `path=value`, repeatable. Values parse
        /// as JSON where possible, else as strings.
        #[arg(long = "filter")]
        filter: Vec<String>,

        /// Static filter clause for association lookups, repeatable.
        #[arg(long = "assoc-filter")]
        assoc_filter: Vec<String>,

        /// Comma-joined metadata pointers that key association lookups.
        #[arg(long)]
        match_by: Option<String>,

        /// Comma-joined content selectors for projecting collection rows.
        #[arg(long)]
        as_doc: Option<String>,

        /// Comma-joined metadata selectors for projecting collection rows.
        #[arg(long)]
        as_meta: Option<String>,

        /// Return one composite document per matched record instead of
        /// per-field documents.
        #[arg(long)]
        retrieve_object: bool,

        /// Table name, `sqlite:` stores only.
        #[arg(long)]
        table: Option<String>,

        /// Chat model for the `feed-llm` preset.
        #[arg(long, default_value = "gpt-4o-mini")]
        chat_model: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Build {
            input,
            store,
            model,
            content,
            meta,
            chunk_size,
            with_assoc,
            table,
        } => {
            let options = BuildOptions {
                input,
                output: store,
                model,
                content: split_selectors(&content),
                metadata: meta.as_deref().map(split_selectors).unwrap_or_default(),
                chunk_size,
                with_assoc,
                table,
            };
            run_build(&options, &config).await?;
        }

        Commands::Retrieve {
            store,
            preset,
            text,
            limit,
            filter,
            assoc_filter,
            match_by,
            as_doc,
            as_meta,
            retrieve_object,
            table,
            chat_model,
        } => {
            let preset: Preset = preset.parse()?;
            let options = PresetOptions {
                store,
                text,
                limit,
                filter: parse_filter(&filter)?,
                assoc_filter: parse_filter(&assoc_filter)?,
                match_by: match_by.as_deref().map(split_selectors).unwrap_or_default(),
                as_doc: as_doc.as_deref().map(split_selectors).unwrap_or_default(),
                as_meta: as_meta.as_deref().map(split_selectors).unwrap_or_default(),
                retrieve_object,
                table,
                chat_model,
            };
            let docs = run_preset(preset, &options, &config).await?;
            println!("{}", serde_json::to_string_pretty(&docs)?);
        }
    }
    Ok(())
}

fn split_selectors(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse repeated `path=value` clauses into a filter map. A value that
/// parses as JSON keeps its type; anything else is a string.
fn parse_filter(entries: &[String]) -> Result<MetaFilter> {
    let mut filter = MetaFilter::new();
    for entry in entries {
        let (path, raw) = entry
            .split_once('=')
            .with_context(|| format!("invalid filter clause {entry:?}: expected path=value"))?;
        if path.is_empty() {
            bail!("invalid filter clause {entry:?}: empty path");
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        filter.insert(path.to_string(), value);
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filter_values_parse_as_json_when_possible() {
        let filter = parse_filter(&["id=7".to_string(), "kind=book".to_string()]).unwrap();
        assert_eq!(filter.get("id"), Some(&json!(7)));
        assert_eq!(filter.get("kind"), Some(&json!("book")));
    }

    #[test]
    fn test_filter_clause_without_equals_rejected() {
        assert!(parse_filter(&["id".to_string()]).is_err());
    }

    #[test]
    fn test_selector_splitting_trims_and_drops_blanks() {
        assert_eq!(split_selectors("title, body,,"), ["title", "body"]);
    }
}
