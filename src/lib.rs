//! searchcriteria - FIQL / OData search expressions as typed criteria queries
//!
//! This crate turns search expressions into queries through:
//! - FIQL and OData parsers producing one condition tree
//! - Property resolution against a YAML-defined entity metamodel
//! - A criteria visitor building joins, predicates and projections
//! - SQL generation and an in-memory reference executor

pub mod config;
pub mod criteria;
pub mod entity_catalog;
pub mod executor;
pub mod search_condition;
pub mod search_parser;
pub mod sql_generator;
