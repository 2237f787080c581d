//! Query execution boundary.
//!
//! A [`QueryExecutor`] runs a [`TypedQuery`] against some data store. The
//! crate ships [`memory::InMemoryDatabase`], which evaluates queries over
//! JSON tables and is what the integration tests run against.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::criteria::{CriteriaBuildError, TypedQuery};

pub mod memory;

pub use memory::InMemoryDatabase;

pub trait QueryExecutor {
    fn execute(&self, query: &TypedQuery) -> Result<Vec<ResultRow>, ExecutionError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ResultRow {
    /// Root entity as a nested object keyed by attribute name
    Entity(Value),
    Tuple(Tuple),
    Array(Vec<Value>),
    Count(i64),
}

impl ResultRow {
    pub fn as_entity(&self) -> Option<&Value> {
        match self {
            ResultRow::Entity(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            ResultRow::Tuple(tuple) => Some(tuple),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            ResultRow::Array(values) => Some(values),
            _ => None,
        }
    }
}

/// Named values of one tuple-selection row, in selection order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tuple {
    names: Vec<String>,
    values: Vec<Value>,
}

impl Tuple {
    pub fn new(names: Vec<String>, values: Vec<Value>) -> Self {
        Tuple { names, values }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|idx| self.values.get(idx))
    }

    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExecutionError {
    #[error(transparent)]
    Build(#[from] CriteriaBuildError),

    #[error("Unknown table `{table}`")]
    UnknownTable { table: String },

    #[error("Failed to read data file {path}: {error}")]
    DataRead { path: String, error: String },

    #[error("Failed to parse data: {error}")]
    DataParse { error: String },

    #[error("Invalid LIKE pattern `{pattern}`: {error}")]
    InvalidPattern { pattern: String, error: String },

    #[error("Cannot construct {type_name}: {message}")]
    Construct { type_name: String, message: String },

    #[error("Unexpected result: {message}")]
    UnexpectedResult { message: String },
}
