use thiserror::Error;

use crate::entity_catalog::{EntityCatalogError, PropertyResolutionError};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CriteriaBuildError {
    #[error(transparent)]
    Resolution(#[from] PropertyResolutionError),

    #[error(transparent)]
    Catalog(#[from] EntityCatalogError),

    #[error("Path `{path}` needs a collection join that was not declared for this query")]
    UndeclaredJoin { path: String },

    #[error("Cannot select `{attribute}`: {reason}")]
    InvalidSelection { attribute: String, reason: String },

    #[error("Condition on `{found}` cannot be applied to a query rooted at `{expected}`")]
    RootMismatch { expected: String, found: String },

    #[error("Visitor already holds a built predicate; create a new visitor per expression")]
    VisitorReused,

    #[error("Value `{value}` cannot be compared with `{path}`: {reason}")]
    InvalidValue {
        path: String,
        value: String,
        reason: String,
    },

    #[error("No attributes requested for selection")]
    EmptySelection,
}
