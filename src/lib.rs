//! # docloom
//!
//! A field-projection and retrieval toolkit for semi-structured records.
//!
//! docloom turns JSON-shaped records into content/metadata documents via
//! declarative field selectors, embeds them into a persisted local
//! index, and answers queries through composable retrieval pipelines
//! that run against either that index or a live sqlite collection.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────┐
//! │   Loaders    │──▶│  Projector   │──▶│  Local store   │
//! │ JSON/CSV/DB  │   │ split/whole  │   │ vectors+docs  │
//! └──────────────┘   └──────────────┘   └───────┬───────┘
//!                                               │
//!                        ┌──────────────────────┤
//!                        ▼                      ▼
//!                  ┌──────────┐          ┌──────────────┐
//!                  │ Pipeline │          │  Collection  │
//!                  │  stages  │◀────────▶│   (sqlite)   │
//!                  └──────────┘          └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! docloom build --input records.json --store ./store \
//!     --model hash-64 --content title,body --meta id
//! docloom retrieve --store ./store --preset vector-doc --text "intro"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`pointer`] | Compiled field-path expressions and metadata filters |
//! | [`selector`] | Ordered, named selector sets |
//! | [`document`] | The content/metadata document type |
//! | [`project`] | Split and composite record projection |
//! | [`service`] | Retrieval backend trait and store-locator resolution |
//! | [`index`] | Persisted local vector index backend |
//! | [`collection`] | Live sqlite collection backend |
//! | [`pipeline`] | Stage trait and fold-based pipeline execution |
//! | [`preset`] | Named stage chains behind a closed preset enum |
//! | [`embedding`] | Embedding providers and vector codecs |
//! | [`chat`] | Chat-completion shim for answer synthesis |
//! | [`chunk`] | Content splitting for the build pipeline |
//! | [`loader`] | Raw record loaders and the loader descriptor |
//! | [`build`] | Build pipeline: load, project, chunk, embed, persist |
//! | [`config`] | Optional TOML configuration |
//! | [`error`] | Construction-time error taxonomy |

pub mod build;
pub mod chat;
pub mod chunk;
pub mod collection;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod pointer;
pub mod preset;
pub mod project;
pub mod selector;
pub mod service;
