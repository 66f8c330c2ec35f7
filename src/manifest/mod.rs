//! Declarative manifests
//!
//! Parse connector manifests and build their runtime components.
//!
//! # Overview
//!
//! - [`DeclarativeManifest`] - streams, requesters, paginators, routers
//! - [`load_manifest_from_str`] - YAML/JSON parsing with validation
//! - [`ComponentFactory`] - resolves definitions into a [`SimpleRetriever`]
//!
//! [`SimpleRetriever`]: crate::retriever::SimpleRetriever

mod factory;
mod parser;
mod types;

pub use factory::ComponentFactory;
pub use parser::{load_manifest, load_manifest_from_str, load_manifest_from_value};
pub use types::{
    AddedFieldDefinition, AuthenticatorDefinition, BackoffStrategyDefinition, DeclarativeManifest,
    ErrorHandlerDefinition, ExtractorDefinition, OAuthDefinition, PageTokenOptionDefinition,
    PaginationStrategyDefinition, PaginatorDefinition, PartitionRouterDefinition, PrimaryKey,
    RecordFilterDefinition, RecordSelectorDefinition, RefreshTokenUpdaterDefinition,
    RequesterDefinition, RetrieverDefinition, SpecDefinition, StreamDefinition,
    TransformationDefinition,
};

#[cfg(test)]
mod tests;
