//! Parsed search condition tree and its visitor protocol.
//!
//! Trees are built by the search parsers and never mutated afterwards. Any
//! number of visitors can walk the same tree through [`SearchCondition::accept`].

use serde::Serialize;
use std::fmt;

use crate::entity_catalog::{AggregateFunction, ResolvedPath};

pub mod matcher;
pub mod typed_value;

pub use typed_value::TypedValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConditionType {
    Equals,
    NotEquals,
    LessThan,
    LessOrEquals,
    GreaterThan,
    GreaterOrEquals,
}

impl ConditionType {
    /// FIQL operator token
    pub fn fiql_operator(&self) -> &'static str {
        match self {
            ConditionType::Equals => "==",
            ConditionType::NotEquals => "!=",
            ConditionType::LessThan => "=lt=",
            ConditionType::LessOrEquals => "=le=",
            ConditionType::GreaterThan => "=gt=",
            ConditionType::GreaterOrEquals => "=ge=",
        }
    }

    /// OData operator keyword
    pub fn odata_operator(&self) -> &'static str {
        match self {
            ConditionType::Equals => "eq",
            ConditionType::NotEquals => "ne",
            ConditionType::LessThan => "lt",
            ConditionType::LessOrEquals => "le",
            ConditionType::GreaterThan => "gt",
            ConditionType::GreaterOrEquals => "ge",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fiql_operator())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompositeKind {
    And,
    Or,
}

impl fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeKind::And => write!(f, "AND"),
            CompositeKind::Or => write!(f, "OR"),
        }
    }
}

/// A single `property <op> value` comparison with its resolved attribute chain.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveStatement {
    property: String,
    condition: ConditionType,
    value: TypedValue,
    path: ResolvedPath,
}

impl PrimitiveStatement {
    pub(crate) fn new(
        property: impl Into<String>,
        condition: ConditionType,
        value: TypedValue,
        path: ResolvedPath,
    ) -> Self {
        PrimitiveStatement {
            property: property.into(),
            condition,
            value,
            path,
        }
    }

    /// Property as written in the query (alias, not the mapped path)
    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn condition(&self) -> ConditionType {
        self.condition
    }

    pub fn value(&self) -> &TypedValue {
        &self.value
    }

    pub fn path(&self) -> &ResolvedPath {
        &self.path
    }
}

/// `count(path) <op> value`; the statement carries the inner path.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateComparison {
    function: AggregateFunction,
    statement: PrimitiveStatement,
}

impl AggregateComparison {
    pub(crate) fn new(function: AggregateFunction, statement: PrimitiveStatement) -> Self {
        AggregateComparison {
            function,
            statement,
        }
    }

    pub fn function(&self) -> AggregateFunction {
        self.function
    }

    pub fn statement(&self) -> &PrimitiveStatement {
        &self.statement
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchCondition {
    Comparison(PrimitiveStatement),
    Aggregate(AggregateComparison),
    Composite {
        kind: CompositeKind,
        conditions: Vec<SearchCondition>,
    },
}

impl SearchCondition {
    /// AND of `conditions`; a single condition is returned as is.
    pub fn and(conditions: Vec<SearchCondition>) -> SearchCondition {
        Self::composite(CompositeKind::And, conditions)
    }

    /// OR of `conditions`; a single condition is returned as is.
    pub fn or(conditions: Vec<SearchCondition>) -> SearchCondition {
        Self::composite(CompositeKind::Or, conditions)
    }

    fn composite(kind: CompositeKind, mut conditions: Vec<SearchCondition>) -> SearchCondition {
        if conditions.len() == 1 {
            if let Some(only) = conditions.pop() {
                return only;
            }
        }
        SearchCondition::Composite { kind, conditions }
    }

    /// Double dispatch into the visitor method matching this node.
    pub fn accept<V>(&self, visitor: &mut V) -> Result<(), V::Error>
    where
        V: SearchConditionVisitor + ?Sized,
    {
        match self {
            SearchCondition::Comparison(statement) => visitor.visit_comparison(statement),
            SearchCondition::Aggregate(aggregate) => visitor.visit_aggregate(aggregate),
            SearchCondition::Composite { kind, conditions } => {
                visitor.visit_composite(*kind, conditions)
            }
        }
    }

    /// The leaf statement of a comparison or aggregate node
    pub fn statement(&self) -> Option<&PrimitiveStatement> {
        match self {
            SearchCondition::Comparison(statement) => Some(statement),
            SearchCondition::Aggregate(aggregate) => Some(aggregate.statement()),
            SearchCondition::Composite { .. } => None,
        }
    }

    /// All leaf statements in source order
    pub fn statements(&self) -> Vec<&PrimitiveStatement> {
        match self {
            SearchCondition::Composite { conditions, .. } => {
                conditions.iter().flat_map(|c| c.statements()).collect()
            }
            leaf => leaf.statement().into_iter().collect(),
        }
    }
}

/// Walks a [`SearchCondition`] tree.
///
/// Composite nodes hand their children to the visitor; implementations recurse
/// with `child.accept(self)` in order and combine the results themselves.
pub trait SearchConditionVisitor {
    type Error;

    fn visit_comparison(&mut self, statement: &PrimitiveStatement) -> Result<(), Self::Error>;

    fn visit_aggregate(&mut self, aggregate: &AggregateComparison) -> Result<(), Self::Error>;

    fn visit_composite(
        &mut self,
        kind: CompositeKind,
        conditions: &[SearchCondition],
    ) -> Result<(), Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity_catalog::testing::library_metamodel;
    use crate::entity_catalog::PropertyResolver;

    fn statement(property: &str, value: TypedValue) -> SearchCondition {
        let model = library_metamodel();
        let resolver = PropertyResolver::new(&model, "Book").unwrap();
        let path = resolver.resolve(property).unwrap();
        SearchCondition::Comparison(PrimitiveStatement::new(
            property,
            ConditionType::Equals,
            value,
            path,
        ))
    }

    /// Records the order in which nodes are visited
    struct TraceVisitor(Vec<String>);

    impl SearchConditionVisitor for TraceVisitor {
        type Error = ();

        fn visit_comparison(&mut self, statement: &PrimitiveStatement) -> Result<(), ()> {
            self.0.push(statement.property().to_string());
            Ok(())
        }

        fn visit_aggregate(&mut self, aggregate: &AggregateComparison) -> Result<(), ()> {
            self.0.push(format!("count:{}", aggregate.statement().property()));
            Ok(())
        }

        fn visit_composite(
            &mut self,
            kind: CompositeKind,
            conditions: &[SearchCondition],
        ) -> Result<(), ()> {
            self.0.push(kind.to_string());
            for condition in conditions {
                condition.accept(self)?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_single_child_composite_collapses() {
        let leaf = statement("id", TypedValue::Integer(1));
        assert_eq!(SearchCondition::and(vec![leaf.clone()]), leaf);
    }

    #[test]
    fn test_accept_dispatches_in_source_order() {
        let tree = SearchCondition::or(vec![
            SearchCondition::and(vec![
                statement("id", TypedValue::Integer(10)),
                statement("bookTitle", TypedValue::String("num10".into())),
            ]),
            statement("authors", TypedValue::String("John".into())),
        ]);

        let mut trace = TraceVisitor(Vec::new());
        tree.accept(&mut trace).unwrap();
        assert_eq!(trace.0, vec!["OR", "AND", "id", "bookTitle", "authors"]);

        let props: Vec<&str> = tree.statements().iter().map(|s| s.property()).collect();
        assert_eq!(props, vec!["id", "bookTitle", "authors"]);
    }
}
