pub mod config;
pub mod errors;
pub mod metamodel;
pub mod property_resolver;

#[cfg(test)]
pub mod testing;

// Re-export commonly used types
pub use config::{AttributeDefinition, EntityDefinition, EntitySchemaConfig};
pub use errors::{EntityCatalogError, PropertyResolutionError};
pub use metamodel::{
    Attribute, AttributeKind, ManagedKind, ManagedType, MetadataProvider, Metamodel, ScalarType,
};
pub use property_resolver::{AggregateFunction, PathSegment, PropertyResolver, ResolvedPath};
