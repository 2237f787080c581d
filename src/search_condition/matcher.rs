//! In-memory evaluation of a condition tree against a JSON object graph.
//!
//! The graph uses attribute names as keys: embedded and to-one values are
//! nested objects, collections are arrays. Comparisons through collections are
//! existential; a comparison is met when any reachable value satisfies it.

use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

use super::{ConditionType, CompositeKind, PrimitiveStatement, SearchCondition, TypedValue};

/// Compile a SQL LIKE pattern (`%` and `_` wildcards) into an anchored regex.
pub fn like_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push_str("(?s)^");
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '%' | '_' => {
                expr.push_str(&regex::escape(&literal));
                literal.clear();
                expr.push_str(if c == '%' { ".*" } else { "." });
            }
            other => literal.push(other),
        }
    }
    expr.push_str(&regex::escape(&literal));
    expr.push('$');
    Regex::new(&expr)
}

/// Applies `condition` to an ordering; `None` (null or incompatible) never matches.
pub fn ordering_satisfies(condition: ConditionType, ordering: Option<Ordering>) -> bool {
    let Some(ordering) = ordering else {
        return false;
    };
    match condition {
        ConditionType::Equals => ordering == Ordering::Equal,
        ConditionType::NotEquals => ordering != Ordering::Equal,
        ConditionType::LessThan => ordering == Ordering::Less,
        ConditionType::LessOrEquals => ordering != Ordering::Greater,
        ConditionType::GreaterThan => ordering == Ordering::Greater,
        ConditionType::GreaterOrEquals => ordering != Ordering::Less,
    }
}

impl SearchCondition {
    /// Whether `object` satisfies this condition.
    pub fn is_met(&self, object: &Value) -> bool {
        match self {
            SearchCondition::Comparison(statement) => statement_is_met(statement, object),
            SearchCondition::Aggregate(aggregate) => {
                statement_is_met(aggregate.statement(), object)
            }
            SearchCondition::Composite { kind, conditions } => match kind {
                CompositeKind::And => conditions.iter().all(|c| c.is_met(object)),
                CompositeKind::Or => conditions.iter().any(|c| c.is_met(object)),
            },
        }
    }
}

fn statement_is_met(statement: &PrimitiveStatement, object: &Value) -> bool {
    let path = statement.path();
    let names: Vec<&str> = path.segments.iter().map(|s| s.name.as_str()).collect();

    if path.is_cardinality_check() {
        let Some((last, prefix)) = names.split_last() else {
            return false;
        };
        let owners = reachable(object, prefix);
        let sizes: Vec<i64> = if owners.is_empty() {
            // an absent owner counts as an empty collection
            vec![0]
        } else {
            owners
                .iter()
                .map(|owner| match owner.get(*last) {
                    Some(Value::Array(items)) => items.len() as i64,
                    _ => 0,
                })
                .collect()
        };
        let expected = statement.value().as_i64().unwrap_or_default();
        return sizes
            .into_iter()
            .any(|size| ordering_satisfies(statement.condition(), Some(size.cmp(&expected))));
    }

    let values = reachable(object, &names);
    let value = statement.value();
    let pattern = value.like_pattern().and_then(|p| like_regex(&p).ok());
    values.iter().any(|stored| match (&pattern, stored) {
        (Some(regex), Value::String(s)) => match statement.condition() {
            ConditionType::NotEquals => !regex.is_match(s),
            _ => regex.is_match(s),
        },
        (Some(_), _) => false,
        (None, stored) => ordering_satisfies(statement.condition(), compare(value, stored)),
    })
}

fn compare(value: &TypedValue, stored: &Value) -> Option<Ordering> {
    value.compare_stored(stored)
}

/// Non-null values reached by following `names`, flattening arrays on the way.
fn reachable<'v>(object: &'v Value, names: &[&str]) -> Vec<&'v Value> {
    let mut current = vec![object];
    for name in names {
        let mut next = Vec::new();
        for value in current {
            match value.get(*name) {
                Some(Value::Array(items)) => next.extend(items.iter().filter(|v| !v.is_null())),
                Some(Value::Null) | None => {}
                Some(other) => next.push(other),
            }
        }
        current = next;
    }
    current
}
