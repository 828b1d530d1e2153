//! Named pipeline presets.
//!
//! The preset set is a closed enum; an unknown key fails at parse time
//! with the valid keys listed, and adding a preset means the compiler
//! walks every dispatch site. Each preset maps to a fixed stage chain:
//!
//! | Key | Stages |
//! |-----|--------|
//! | `vector-doc` | vector |
//! | `assoc-doc` | vector → association |
//! | `feed-llm` | vector → answer |
//! | `meta-vector-doc` | association (static filter over the docstore) |
//! | `meta-assoc-doc` | association (static filter over the side-car) |

use anyhow::Result;
use std::str::FromStr;
use std::sync::Arc;

use crate::collection::CollectionService;
use crate::config::Config;
use crate::document::Document;
use crate::error::SchemaError;
use crate::pipeline::answer::AnswerStage;
use crate::pipeline::assoc::AssociationStage;
use crate::pipeline::vector::VectorStage;
use crate::pipeline::{Pipeline, Stage};
use crate::pointer::{normalize_filter, normalize_paths, MetaFilter};
use crate::selector::FieldSelectorSet;
use crate::service::{resolve_service, MetadataSearchOptions, RetrievalService, ServiceOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    VectorDoc,
    AssocDoc,
    FeedLlm,
    MetaVectorDoc,
    MetaAssocDoc,
}

impl Preset {
    pub const ALL: [Preset; 5] = [
        Preset::VectorDoc,
        Preset::AssocDoc,
        Preset::FeedLlm,
        Preset::MetaVectorDoc,
        Preset::MetaAssocDoc,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Preset::VectorDoc => "vector-doc",
            Preset::AssocDoc => "assoc-doc",
            Preset::FeedLlm => "feed-llm",
            Preset::MetaVectorDoc => "meta-vector-doc",
            Preset::MetaAssocDoc => "meta-assoc-doc",
        }
    }
}

impl FromStr for Preset {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|p| p.key() == s)
            .ok_or_else(|| SchemaError::UnknownPreset(s.to_string()))
    }
}

/// Everything a preset run needs beyond the preset key.
#[derive(Debug, Clone, Default)]
pub struct PresetOptions {
    /// Store locator: `sqlite:` URL or local index directory.
    pub store: String,
    /// Query text, or the question for answer synthesis.
    pub text: String,
    /// Result cap for the vector stage.
    pub limit: usize,
    /// Metadata filter for the vector stage, and the static filter of
    /// the metadata presets.
    pub filter: MetaFilter,
    /// Static filter merged into every association lookup.
    pub assoc_filter: MetaFilter,
    /// Metadata pointers read off retrieved documents to key
    /// association lookups.
    pub match_by: Vec<String>,
    /// Content selectors for projecting collection rows.
    pub as_doc: Vec<String>,
    /// Metadata selectors for projecting collection rows.
    pub as_meta: Vec<String>,
    /// Hand back composite objects from association lookups.
    pub retrieve_object: bool,
    /// Table name, collection stores only.
    pub table: Option<String>,
    /// Chat model for the `feed-llm` preset.
    pub chat_model: String,
}

/// Resolve the store, assemble the preset's stage chain, and run it.
pub async fn run_preset(
    preset: Preset,
    options: &PresetOptions,
    config: &Config,
) -> Result<Vec<Document>> {
    let filter = normalize_filter(&options.filter);
    let assoc_filter = normalize_filter(&options.assoc_filter);
    let match_by = normalize_paths(&options.match_by);

    let service_options = ServiceOptions {
        content: selector_set(&options.as_doc)?,
        metadata: selector_set(&options.as_meta)?,
        table: options.table.clone(),
    };
    let service = resolve_service(&options.store, &service_options, config).await?;

    let vector = |filter: &MetaFilter| -> Result<Box<dyn Stage>, SchemaError> {
        Ok(Box::new(VectorStage::new(
            service.clone(),
            options.text.clone(),
            options.limit,
            filter,
        )?))
    };

    let stages: Vec<Box<dyn Stage>> = match preset {
        Preset::VectorDoc => vec![vector(&filter)?],
        Preset::AssocDoc => {
            let (target, use_assoc_store) = assoc_target(&service, &service_options);
            let search = MetadataSearchOptions {
                use_assoc_store,
                retrieve_object: options.retrieve_object,
            };
            vec![
                vector(&filter)?,
                Box::new(AssociationStage::new(target, &match_by, assoc_filter, search)?),
            ]
        }
        Preset::FeedLlm => vec![
            vector(&filter)?,
            Box::new(AnswerStage::new(
                options.chat_model.clone(),
                options.text.clone(),
                config.chat.clone(),
            )),
        ],
        Preset::MetaVectorDoc => {
            let search = MetadataSearchOptions {
                use_assoc_store: false,
                retrieve_object: options.retrieve_object,
            };
            vec![Box::new(AssociationStage::new(
                service.clone(),
                &[],
                filter,
                search,
            )?)]
        }
        Preset::MetaAssocDoc => {
            let (target, use_assoc_store) = assoc_target(&service, &service_options);
            let search = MetadataSearchOptions {
                use_assoc_store,
                retrieve_object: options.retrieve_object,
            };
            vec![Box::new(AssociationStage::new(target, &[], filter, search)?)]
        }
    };

    Pipeline::new(stages).run().await
}

/// Where association lookups go. A local store built from a live
/// collection carries a loader descriptor; the un-embedded truth lives
/// in that collection, so lookups go back to it. Otherwise they hit the
/// store's own association side-car.
fn assoc_target(
    service: &Arc<dyn RetrievalService>,
    options: &ServiceOptions,
) -> (Arc<dyn RetrievalService>, bool) {
    match service.loader_descriptor() {
        Some(descriptor) => {
            let content = options
                .content
                .clone()
                .or_else(|| FieldSelectorSet::from_list(&descriptor.content_field_names).ok());
            let metadata = options
                .metadata
                .clone()
                .or_else(|| FieldSelectorSet::from_list(&descriptor.metadata_field_names).ok());
            match content {
                Some(content) => (
                    Arc::new(CollectionService::new(
                        descriptor.url.clone(),
                        descriptor.table.clone(),
                        content,
                        metadata,
                    )),
                    false,
                ),
                // Descriptor without usable selectors: stay local.
                None => (service.clone(), true),
            }
        }
        None => (service.clone(), true),
    }
}

fn selector_set(paths: &[String]) -> Result<Option<FieldSelectorSet>, SchemaError> {
    if paths.is_empty() {
        Ok(None)
    } else {
        FieldSelectorSet::from_list(paths).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_round_trips() {
        for preset in Preset::ALL {
            assert_eq!(preset.key().parse::<Preset>().unwrap(), preset);
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(matches!(
            "semantic-doc".parse::<Preset>(),
            Err(SchemaError::UnknownPreset(_))
        ));
    }
}
