//! Search-condition visitor producing criteria predicates.
//!
//! Leaves are turned into predicates through [`PredicateHooks`], which has one
//! method for plain comparisons and one for collection-size comparisons so
//! either can be replaced on its own. Composites combine their children's
//! predicates in source order.

use std::collections::HashMap;

use super::builder::{CriteriaBuilder, JoinPolicy};
use super::errors::CriteriaBuildError;
use super::{ComparisonOperator, Expression, OrderByItem, Predicate};
use crate::entity_catalog::{MetadataProvider, PropertyResolver, ResolvedPath};
use crate::search_condition::{
    AggregateComparison, CompositeKind, ConditionType, PrimitiveStatement, SearchCondition,
    SearchConditionVisitor, TypedValue,
};

/// A resolved property together with the expression it was bound to.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath<'p> {
    pub resolved: &'p ResolvedPath,
    pub expression: Expression,
}

impl AttributePath<'_> {
    /// Property as written in the query
    pub fn property(&self) -> &str {
        &self.resolved.original
    }
}

/// Predicate construction for leaf conditions.
pub trait PredicateHooks {
    /// Predicate for a value comparison; `value` is already coerced to the attribute type.
    fn comparison_predicate(
        &self,
        path: &AttributePath<'_>,
        condition: ConditionType,
        value: &TypedValue,
    ) -> Predicate {
        default_comparison_predicate(path, condition, value)
    }

    /// Predicate comparing the size of the collection at `path` with `size`.
    fn collection_predicate(
        &self,
        path: &AttributePath<'_>,
        condition: ConditionType,
        size: i64,
    ) -> Predicate {
        default_collection_predicate(path, condition, size)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPredicateHooks;

impl PredicateHooks for DefaultPredicateHooks {}

/// `=`/`<`/... against the literal, `LIKE` for wildcard strings, `NOT` of the
/// equality for `!=`.
pub fn default_comparison_predicate(
    path: &AttributePath<'_>,
    condition: ConditionType,
    value: &TypedValue,
) -> Predicate {
    let expression = path.expression.clone();
    let positive = |operator: ComparisonOperator| match value.like_pattern() {
        Some(pattern) if operator == ComparisonOperator::Eq => Predicate::Like {
            expression: expression.clone(),
            pattern,
        },
        _ => Predicate::compare(
            expression.clone(),
            operator,
            Expression::Literal(value.clone()),
        ),
    };
    match condition {
        ConditionType::NotEquals => positive(ComparisonOperator::Eq).negate(),
        other => positive(operator_for(other)),
    }
}

pub fn default_collection_predicate(
    path: &AttributePath<'_>,
    condition: ConditionType,
    size: i64,
) -> Predicate {
    let compare = |operator: ComparisonOperator| {
        Predicate::compare(
            path.expression.clone(),
            operator,
            Expression::Literal(TypedValue::Integer(size)),
        )
    };
    match condition {
        ConditionType::NotEquals => compare(ComparisonOperator::Eq).negate(),
        other => compare(operator_for(other)),
    }
}

fn operator_for(condition: ConditionType) -> ComparisonOperator {
    match condition {
        ConditionType::Equals | ConditionType::NotEquals => ComparisonOperator::Eq,
        ConditionType::LessThan => ComparisonOperator::Lt,
        ConditionType::LessOrEquals => ComparisonOperator::Le,
        ConditionType::GreaterThan => ComparisonOperator::Gt,
        ConditionType::GreaterOrEquals => ComparisonOperator::Ge,
    }
}

/// Builds one criteria query from one condition tree.
///
/// The visitor accepts exactly one top-level `accept` call; afterwards only
/// ordering and one projection method may be applied.
pub struct CriteriaQueryVisitor<'m, H: PredicateHooks = DefaultPredicateHooks> {
    pub(super) builder: CriteriaBuilder<'m>,
    pub(super) aliases: HashMap<String, String>,
    pub(super) order_by: Vec<OrderByItem>,
    hooks: H,
    frames: Vec<Vec<Predicate>>,
    predicate: Option<Predicate>,
}

impl<'m> CriteriaQueryVisitor<'m, DefaultPredicateHooks> {
    pub fn new(metadata: &'m dyn MetadataProvider, root: &str) -> Result<Self, CriteriaBuildError> {
        Ok(CriteriaQueryVisitor {
            builder: CriteriaBuilder::new(metadata, root)?,
            aliases: HashMap::new(),
            order_by: Vec::new(),
            hooks: DefaultPredicateHooks,
            frames: Vec::new(),
            predicate: None,
        })
    }
}

impl<'m, H: PredicateHooks> CriteriaQueryVisitor<'m, H> {
    /// Alias map used for projection and ordering attributes
    pub fn with_aliases(mut self, aliases: HashMap<String, String>) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_hooks<K: PredicateHooks>(self, hooks: K) -> CriteriaQueryVisitor<'m, K> {
        CriteriaQueryVisitor {
            builder: self.builder,
            aliases: self.aliases,
            order_by: self.order_by,
            hooks,
            frames: self.frames,
            predicate: self.predicate,
        }
    }

    /// Eagerly joins each navigation path, e.g. `reviews` or `reviews.authors`.
    pub fn with_joins(mut self, paths: &[&str]) -> Result<Self, CriteriaBuildError> {
        let metadata = self.builder.metadata();
        let root = self.builder.root().entity.clone();
        {
            let resolver = PropertyResolver::new(metadata, &root)?.with_aliases(&self.aliases);
            for path in paths {
                let resolved = resolver.resolve_join_path(path)?;
                self.builder.join_path(&resolved)?;
            }
        }
        Ok(self)
    }

    pub fn builder(&self) -> &CriteriaBuilder<'m> {
        &self.builder
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Predicate built by the last completed visit
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    pub(super) fn take_predicate(&mut self) -> Option<Predicate> {
        self.predicate.take()
    }

    pub(super) fn resolver(&self) -> Result<PropertyResolver<'_>, CriteriaBuildError> {
        Ok(
            PropertyResolver::new(self.builder.metadata(), &self.builder.root().entity)?
                .with_aliases(&self.aliases),
        )
    }

    fn enter(&self) -> Result<(), CriteriaBuildError> {
        if self.frames.is_empty() && self.predicate.is_some() {
            return Err(CriteriaBuildError::VisitorReused);
        }
        Ok(())
    }

    fn emit(&mut self, predicate: Predicate) {
        match self.frames.last_mut() {
            Some(frame) => frame.push(predicate),
            None => {
                log::debug!("Built predicate: {:?}", predicate);
                self.predicate = Some(predicate);
            }
        }
    }

    fn check_root(&self, statement: &PrimitiveStatement) -> Result<(), CriteriaBuildError> {
        let expected = &self.builder.root().entity;
        match statement.path().segments.first() {
            Some(first) if &first.owner != expected => Err(CriteriaBuildError::RootMismatch {
                expected: expected.clone(),
                found: first.owner.clone(),
            }),
            _ => Ok(()),
        }
    }

    fn size_predicate(
        &mut self,
        statement: &PrimitiveStatement,
    ) -> Result<Predicate, CriteriaBuildError> {
        let path = statement.path();
        let size = statement
            .value()
            .as_i64()
            .ok_or_else(|| CriteriaBuildError::InvalidValue {
                path: path.original.clone(),
                value: statement.value().to_string(),
                reason: "collection sizes compare with integers".to_string(),
            })?;
        let expression = self.builder.collection_size(path, JoinPolicy::Create)?;
        let attribute = AttributePath {
            resolved: path,
            expression,
        };
        Ok(self
            .hooks
            .collection_predicate(&attribute, statement.condition(), size))
    }
}

impl<H: PredicateHooks> SearchConditionVisitor for CriteriaQueryVisitor<'_, H> {
    type Error = CriteriaBuildError;

    fn visit_comparison(&mut self, statement: &PrimitiveStatement) -> Result<(), Self::Error> {
        self.enter()?;
        self.check_root(statement)?;

        let path = statement.path();
        let predicate = if path.is_cardinality_check() {
            self.size_predicate(statement)?
        } else {
            let expression = self.builder.attribute_expression(path, JoinPolicy::Create)?;
            let attribute = AttributePath {
                resolved: path,
                expression,
            };
            self.hooks
                .comparison_predicate(&attribute, statement.condition(), statement.value())
        };
        self.emit(predicate);
        Ok(())
    }

    fn visit_aggregate(&mut self, aggregate: &AggregateComparison) -> Result<(), Self::Error> {
        self.enter()?;
        self.check_root(aggregate.statement())?;
        let predicate = self.size_predicate(aggregate.statement())?;
        self.emit(predicate);
        Ok(())
    }

    fn visit_composite(
        &mut self,
        kind: CompositeKind,
        conditions: &[SearchCondition],
    ) -> Result<(), Self::Error> {
        self.enter()?;
        self.frames.push(Vec::with_capacity(conditions.len()));
        for condition in conditions {
            if let Err(e) = condition.accept(self) {
                self.frames.clear();
                return Err(e);
            }
        }
        let children = self.frames.pop().unwrap_or_default();
        self.emit(match kind {
            CompositeKind::And => Predicate::And(children),
            CompositeKind::Or => Predicate::Or(children),
        });
        Ok(())
    }
}
