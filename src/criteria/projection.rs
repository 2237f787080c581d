//! Terminal query shapes for a visited [`CriteriaQueryVisitor`].
//!
//! Every projection consumes the visitor. Ordering set with
//! [`CriteriaQueryVisitor::order_by`] composes with all of them except count.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::builder::JoinPolicy;
use super::errors::CriteriaBuildError;
use super::visitor::{CriteriaQueryVisitor, PredicateHooks};
use super::{
    Expression, FilterItems, OrderByItem, OrderByItems, SelectItem, SelectItems, SelectionMode,
    SortOrder, TypedQuery,
};
use crate::executor::{ExecutionError, QueryExecutor, ResultRow};

/// Query whose rows are deserialized positionally into `T`.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructQuery<T> {
    query: TypedQuery,
    _target: PhantomData<T>,
}

impl<T: DeserializeOwned> ConstructQuery<T> {
    pub fn query(&self) -> &TypedQuery {
        &self.query
    }

    pub fn into_query(self) -> TypedQuery {
        self.query
    }

    /// Runs the query and builds one `T` per row from the selected values in order.
    pub fn execute(&self, executor: &dyn QueryExecutor) -> Result<Vec<T>, ExecutionError> {
        executor
            .execute(&self.query)?
            .into_iter()
            .map(|row| {
                let values = match row {
                    ResultRow::Array(values) => values,
                    ResultRow::Tuple(tuple) => tuple.into_values(),
                    other => {
                        return Err(ExecutionError::Construct {
                            type_name: std::any::type_name::<T>().to_string(),
                            message: format!("unexpected row {:?}", other),
                        })
                    }
                };
                serde_json::from_value(Value::Array(values)).map_err(|e| {
                    ExecutionError::Construct {
                        type_name: std::any::type_name::<T>().to_string(),
                        message: e.to_string(),
                    }
                })
            })
            .collect()
    }
}

impl<'m, H: PredicateHooks> CriteriaQueryVisitor<'m, H> {
    /// Root entity rows.
    pub fn query(self) -> Result<TypedQuery, CriteriaBuildError> {
        let entity = self.builder.root().entity.clone();
        let items = self.builder.entity_items();
        self.finish(SelectionMode::Entity { entity }, items)
    }

    /// Named fields, in request order.
    pub fn select_tuple(mut self, attributes: &[&str]) -> Result<TypedQuery, CriteriaBuildError> {
        let items = self.selection(attributes)?;
        self.finish(SelectionMode::Tuple, items)
    }

    /// Positional fields handed to `T`'s deserializer, in request order.
    pub fn select_construct<T: DeserializeOwned>(
        mut self,
        attributes: &[&str],
    ) -> Result<ConstructQuery<T>, CriteriaBuildError> {
        let items = self.selection(attributes)?;
        let type_name = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or_default()
            .to_string();
        let query = self.finish(SelectionMode::Construct { type_name }, items)?;
        Ok(ConstructQuery {
            query,
            _target: PhantomData,
        })
    }

    pub fn array_query(mut self, attributes: &[&str]) -> Result<TypedQuery, CriteriaBuildError> {
        let items = self.selection(attributes)?;
        self.finish(SelectionMode::Array, items)
    }

    /// Appends ORDER BY keys in list order.
    pub fn order_by(
        mut self,
        attributes: &[&str],
        ascending: bool,
    ) -> Result<Self, CriteriaBuildError> {
        let order = if ascending {
            SortOrder::Asc
        } else {
            SortOrder::Desc
        };
        for item in self.selection(attributes)? {
            self.order_by.push(OrderByItem {
                expression: item.expression,
                order,
            });
        }
        Ok(self)
    }

    /// Root entity rows ordered by `attributes`.
    pub fn ordered_query(
        self,
        attributes: &[&str],
        ascending: bool,
    ) -> Result<TypedQuery, CriteriaBuildError> {
        self.order_by(attributes, ascending)?.query()
    }

    pub fn count_query(mut self) -> Result<TypedQuery, CriteriaBuildError> {
        self.order_by.clear();
        self.finish(SelectionMode::Count, Vec::new())
    }

    /// Number of matching root rows.
    pub fn count(self, executor: &dyn QueryExecutor) -> Result<i64, ExecutionError> {
        let query = self.count_query()?;
        match executor.execute(&query)?.into_iter().next() {
            Some(ResultRow::Count(n)) => Ok(n),
            other => Err(ExecutionError::UnexpectedResult {
                message: format!("count query returned {:?}", other),
            }),
        }
    }

    fn selection(&mut self, attributes: &[&str]) -> Result<Vec<SelectItem>, CriteriaBuildError> {
        if attributes.is_empty() {
            return Err(CriteriaBuildError::EmptySelection);
        }
        let mut resolved = Vec::with_capacity(attributes.len());
        {
            let resolver = self.resolver()?;
            for attribute in attributes {
                let path = resolver.resolve(attribute)?;
                if path.is_cardinality_check() {
                    return Err(CriteriaBuildError::InvalidSelection {
                        attribute: attribute.to_string(),
                        reason: "collection sizes cannot be selected".to_string(),
                    });
                }
                resolved.push(path);
            }
        }

        let mut items = Vec::with_capacity(resolved.len());
        for (attribute, path) in attributes.iter().zip(&resolved) {
            let expression = self
                .builder
                .attribute_expression(path, JoinPolicy::Existing)?;
            items.push(SelectItem {
                name: attribute.to_string(),
                expression,
            });
        }
        Ok(items)
    }

    fn finish(
        mut self,
        mode: SelectionMode,
        items: Vec<SelectItem>,
    ) -> Result<TypedQuery, CriteriaBuildError> {
        let filters = FilterItems(self.take_predicate());
        let query = TypedQuery {
            root: self.builder.root().clone(),
            select: SelectItems {
                mode,
                items,
                distinct: self.builder.has_collection_joins(),
            },
            joins: self.builder.join_items(),
            filters,
            order_by: OrderByItems(self.order_by),
        };
        log::debug!(
            "Built {:?} query on `{}` with {} join(s)",
            query.select.mode,
            query.root.entity,
            query.joins.0.len()
        );
        Ok(query)
    }
}

impl TypedQuery {
    /// Expressions rows are sorted by, in priority order.
    pub fn order_expressions(&self) -> impl Iterator<Item = (&Expression, SortOrder)> {
        self.order_by.0.iter().map(|item| (&item.expression, item.order))
    }
}
