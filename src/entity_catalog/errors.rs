//! # Entity Catalog Error Types
//!
//! Errors raised while loading entity schemas and while resolving dotted
//! property paths against them.
//!
//! ## Error Categories
//!
//! - **Configuration Errors**: file I/O and YAML parsing while loading a schema
//! - **Definition Errors**: structurally invalid entity or attribute definitions
//! - **Resolution Errors**: a property path that does not exist on the root entity

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EntityCatalogError {
    #[error("Failed to read entity schema file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse entity schema: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid entity schema: {message}")]
    InvalidDefinition { message: String },
    #[error("No entity or embeddable named `{type_name}`")]
    UnknownType { type_name: String },
}

impl EntityCatalogError {
    /// Create an InvalidDefinition error that names the offending type and attribute
    pub fn attribute_error(
        owner: impl Into<String>,
        attribute: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        EntityCatalogError::InvalidDefinition {
            message: format!(
                "{}.{}: {}",
                owner.into(),
                attribute.into(),
                message.into()
            ),
        }
    }
}

/// Failure to map a dotted property path onto the entity metamodel.
///
/// `path` is always the path exactly as the caller wrote it (before alias
/// substitution) so diagnostics point back at the query text.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PropertyResolutionError {
    #[error("Property `{path}` not found: `{segment}` is not an attribute of `{owner}`")]
    UnknownSegment {
        path: String,
        segment: String,
        owner: String,
    },
    #[error("Property `{path}` cannot navigate past `{segment}`: it is not an entity or embeddable")]
    NotNavigable { path: String, segment: String },
    #[error("Property `{path}`: count() requires a collection-valued path")]
    AggregateOnSingular { path: String },
    #[error("Property `{path}` does not end in a value or a collection")]
    NotComparable { path: String },
    #[error("Property `{path}` is empty or malformed")]
    MalformedPath { path: String },
    #[error("Root type `{root}` is not a known entity")]
    UnknownRoot { root: String },
}

impl PropertyResolutionError {
    /// The path as originally written by the caller.
    pub fn path(&self) -> &str {
        match self {
            PropertyResolutionError::UnknownSegment { path, .. }
            | PropertyResolutionError::NotNavigable { path, .. }
            | PropertyResolutionError::AggregateOnSingular { path }
            | PropertyResolutionError::NotComparable { path }
            | PropertyResolutionError::MalformedPath { path } => path,
            PropertyResolutionError::UnknownRoot { root } => root,
        }
    }
}
