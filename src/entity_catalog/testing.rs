//! Shared metamodel fixture for unit tests.

use super::config::EntitySchemaConfig;
use super::metamodel::Metamodel;

/// Books with reviews, authors, an owning library and embedded owner details.
pub const LIBRARY_SCHEMA: &str = include_str!("../../tests/fixtures/library_schema.yaml");

pub fn library_metamodel() -> Metamodel {
    EntitySchemaConfig::from_yaml_str(LIBRARY_SCHEMA)
        .and_then(|config| config.to_metamodel())
        .expect("library fixture schema is valid")
}
