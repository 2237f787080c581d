//! Typed criteria queries built from search conditions.
//!
//! [`CriteriaQueryVisitor`] walks a [`SearchCondition`](crate::search_condition::SearchCondition)
//! and accumulates a [`Predicate`] through a [`CriteriaBuilder`] session, which
//! owns the join cache. The projection methods then turn the visitor into a
//! [`TypedQuery`] ready for a [`QueryExecutor`](crate::executor::QueryExecutor)
//! or for SQL rendering.

use serde::Serialize;

use crate::search_condition::TypedValue;

pub mod builder;
pub mod errors;
pub mod projection;
pub mod visitor;

pub use builder::{CriteriaBuilder, JoinPolicy};
pub use errors::CriteriaBuildError;
pub use projection::ConstructQuery;
pub use visitor::{
    default_collection_predicate, default_comparison_predicate, AttributePath,
    CriteriaQueryVisitor, DefaultPredicateHooks, PredicateHooks,
};

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct TypedQuery {
    pub root: Root,
    pub select: SelectItems,
    pub joins: JoinItems,
    pub filters: FilterItems,
    pub order_by: OrderByItems,
}

impl TypedQuery {
    pub fn is_count(&self) -> bool {
        self.select.mode == SelectionMode::Count
    }
}

/// The queried entity and the alias its table is bound to.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Root {
    pub entity: String,
    pub table: String,
    pub alias: String,
    pub id_column: String,
}

impl Root {
    pub fn id(&self) -> ColumnRef {
        ColumnRef::new(&self.alias, &self.id_column)
    }
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub enum SelectionMode {
    /// Root entity rows
    Entity { entity: String },
    /// A single row holding the number of matching root rows
    Count,
    /// Named fields in request order
    Tuple,
    /// Positional fields handed to a constructor
    Construct { type_name: String },
    /// Positional fields
    Array,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct SelectItems {
    pub mode: SelectionMode,
    pub items: Vec<SelectItem>,
    pub distinct: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct SelectItem {
    /// Attribute path the value is reported under, e.g. `address.street`
    pub name: String,
    pub expression: Expression,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct JoinItems(pub Vec<Join>);

/// A LEFT join; rows without a match survive with the joined alias unbound.
#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct Join {
    /// Navigation path this join was created for, e.g. `reviews.authors`
    pub path: String,
    pub table_name: String,
    pub table_alias: String,
    /// Column on an already bound alias
    pub source: ColumnRef,
    /// Column on `table_name` matched against `source`
    pub target_column: String,
    /// Whether the join crosses a to-many relationship and can multiply root rows
    pub collection: bool,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct FilterItems(pub Option<Predicate>);

#[derive(Debug, PartialEq, Clone, Serialize, Default)]
pub struct OrderByItems(pub Vec<OrderByItem>);

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct OrderByItem {
    pub expression: Expression,
    pub order: SortOrder,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub struct ColumnRef {
    pub table_alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(table_alias: &str, column: &str) -> Self {
        ColumnRef {
            table_alias: table_alias.to_string(),
            column: column.to_string(),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub enum Expression {
    Column(ColumnRef),
    Literal(TypedValue),
    /// Number of `table` rows whose `foreign_key` equals `owner`
    CollectionSize {
        table: String,
        foreign_key: String,
        owner: ColumnRef,
    },
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize)]
pub enum ComparisonOperator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, PartialEq, Clone, Serialize)]
pub enum Predicate {
    Comparison {
        left: Expression,
        operator: ComparisonOperator,
        right: Expression,
    },
    /// SQL `LIKE` with `%` and `_` wildcards
    Like {
        expression: Expression,
        pattern: String,
    },
    Not(Box<Predicate>),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Constant(bool),
}

impl Predicate {
    pub fn compare(left: Expression, operator: ComparisonOperator, right: Expression) -> Self {
        Predicate::Comparison {
            left,
            operator,
            right,
        }
    }

    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }
}
