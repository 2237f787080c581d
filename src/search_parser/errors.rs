use nom::error::{ContextError, ParseError};
use std::fmt;
use thiserror::Error;

use crate::entity_catalog::PropertyResolutionError;

/// nom error carrying the context stack collected while a grammar rule failed.
#[derive(Debug, PartialEq)]
pub struct SearchSyntaxError<'a> {
    pub errors: Vec<(&'a str, &'static str)>,
}

impl<'a> SearchSyntaxError<'a> {
    /// Innermost (first recorded) failure with its remaining input
    pub fn innermost(&self) -> Option<&(&'a str, &'static str)> {
        self.errors
            .iter()
            .find(|(_, ctx)| !ctx.starts_with("unknown"))
            .or_else(|| self.errors.first())
    }

    /// Convert into a positioned parse error against the full `expression`.
    pub fn into_parse_error(self, expression: &str) -> SearchParseError {
        let (remaining, message) = self
            .innermost()
            .copied()
            .unwrap_or((expression, "unable to parse"));
        SearchParseError::Syntax {
            position: expression.len().saturating_sub(remaining.len()),
            message: message.to_string(),
        }
    }
}

impl<'a> ParseError<&'a str> for SearchSyntaxError<'a> {
    fn from_error_kind(input: &'a str, _kind: nom::error::ErrorKind) -> Self {
        SearchSyntaxError {
            errors: vec![(input, "unknown error")],
        }
    }

    fn append(input: &'a str, _kind: nom::error::ErrorKind, mut other: Self) -> Self {
        other.errors.push((input, "unknown error (appended)"));
        other
    }
}

impl<'a> ContextError<&'a str> for SearchSyntaxError<'a> {
    fn add_context(input: &'a str, ctx: &'static str, mut other: Self) -> Self {
        other.errors.push((input, ctx));
        other
    }
}

impl fmt::Display for SearchSyntaxError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (input, ctx) in &self.errors {
            writeln!(f, "{}: {:}", ctx, input)?;
        }
        Ok(())
    }
}

impl<'a> From<nom::error::Error<&'a str>> for SearchSyntaxError<'a> {
    fn from(err: nom::error::Error<&'a str>) -> Self {
        SearchSyntaxError {
            errors: vec![(err.input, "Unable to parse")],
        }
    }
}

/// Failure to turn a query string into a condition tree.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchParseError {
    #[error("Syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },
    #[error("Unexpected closing bracket at position {position}")]
    UnexpectedClosingBracket { position: usize },
    #[error("Unmatched opening and closing brackets in expression: {expression}")]
    UnmatchedBrackets { expression: String },
    #[error("Dangling operator at the end of expression: ...{fragment}")]
    DanglingOperator { fragment: String },
    #[error("Not a comparison expression: {expression}")]
    NotAComparison { expression: String },
    #[error("Unknown comparison operator `{operator}`")]
    UnknownOperator { operator: String },
    #[error("Property `{property}` (value `{value}`) cannot be resolved: {source}")]
    PropertyNotFound {
        property: String,
        value: String,
        #[source]
        source: PropertyResolutionError,
    },
    #[error("Cannot convert value \"{value}\" to a value of type {target}")]
    TypeCoercion { value: String, target: String },
    #[error("Value \"{value}\" cannot consist of wildcards only")]
    InvalidWildcard { value: String },
    #[error("Value \"{value}\" is not correctly percent-encoded")]
    InvalidEncoding { value: String },
    #[error("Expression contains no usable comparison")]
    EmptyCondition,
    #[error(transparent)]
    Resolution(#[from] PropertyResolutionError),
}
