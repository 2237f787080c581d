//! In-memory reference executor.
//!
//! Tables are lists of flat JSON objects keyed by column name. Queries are
//! evaluated the way a SQL engine would: LEFT joins keep unmatched rows with
//! NULL columns, predicates use three-valued logic, and DISTINCT applies to
//! the projected values.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};

use super::{ExecutionError, QueryExecutor, ResultRow, Tuple};
use crate::criteria::{
    ColumnRef, ComparisonOperator, Expression, Join, OrderByItem, Predicate, Root, SelectItem,
    SelectionMode, SortOrder, TypedQuery,
};
use crate::search_condition::matcher::like_regex;
use crate::search_condition::typed_value::compare_json;

pub type Row = Map<String, Value>;

/// Alias -> bound row; `None` for the NULL side of an unmatched LEFT join.
type Binding<'d> = HashMap<String, Option<&'d Row>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InMemoryDatabase {
    tables: HashMap<String, Vec<Row>>,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{"table": [{"column": value, ...}, ...], ...}`.
    pub fn from_json_str(json: &str) -> Result<Self, ExecutionError> {
        let tables: HashMap<String, Vec<Row>> =
            serde_json::from_str(json).map_err(|e| ExecutionError::DataParse {
                error: e.to_string(),
            })?;
        log::info!("Loaded {} table(s) into memory", tables.len());
        Ok(InMemoryDatabase { tables })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ExecutionError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| ExecutionError::DataRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }

    pub fn insert_table(&mut self, name: impl Into<String>, rows: Vec<Row>) {
        self.tables.insert(name.into(), rows);
    }

    pub fn table(&self, name: &str) -> Result<&[Row], ExecutionError> {
        self.tables
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ExecutionError::UnknownTable {
                table: name.to_string(),
            })
    }

    fn scan(&self, root: &Root) -> Result<Vec<Binding<'_>>, ExecutionError> {
        Ok(self
            .table(&root.table)?
            .iter()
            .map(|row| {
                let mut binding = HashMap::new();
                binding.insert(root.alias.clone(), Some(row));
                binding
            })
            .collect())
    }

    fn join<'d>(
        &'d self,
        bindings: Vec<Binding<'d>>,
        join: &Join,
    ) -> Result<Vec<Binding<'d>>, ExecutionError> {
        let rows = self.table(&join.table_name)?;
        let mut joined = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let key = column_value(&binding, &join.source);
            let matches: Vec<&Row> = if key.is_null() {
                Vec::new()
            } else {
                rows.iter()
                    .filter(|row| {
                        row.get(&join.target_column)
                            .and_then(|v| compare_json(v, &key))
                            == Some(Ordering::Equal)
                    })
                    .collect()
            };

            if matches.is_empty() {
                let mut unmatched = binding;
                unmatched.insert(join.table_alias.clone(), None);
                joined.push(unmatched);
                continue;
            }
            for row in matches {
                let mut extended = binding.clone();
                extended.insert(join.table_alias.clone(), Some(row));
                joined.push(extended);
            }
        }
        Ok(joined)
    }

    fn value_of(
        &self,
        expression: &Expression,
        binding: &Binding<'_>,
    ) -> Result<Value, ExecutionError> {
        match expression {
            Expression::Column(column) => Ok(column_value(binding, column)),
            Expression::Literal(value) => Ok(value.to_json()),
            Expression::CollectionSize {
                table,
                foreign_key,
                owner,
            } => {
                let owner = column_value(binding, owner);
                if owner.is_null() {
                    return Ok(Value::from(0));
                }
                let size = self
                    .table(table)?
                    .iter()
                    .filter(|row| {
                        row.get(foreign_key).and_then(|v| compare_json(v, &owner))
                            == Some(Ordering::Equal)
                    })
                    .count();
                Ok(Value::from(size as i64))
            }
        }
    }

    /// Three-valued: `None` is SQL UNKNOWN.
    fn evaluate(
        &self,
        predicate: &Predicate,
        binding: &Binding<'_>,
    ) -> Result<Option<bool>, ExecutionError> {
        match predicate {
            Predicate::Comparison {
                left,
                operator,
                right,
            } => {
                let left = self.value_of(left, binding)?;
                let ordering = match right {
                    Expression::Literal(literal) => literal.compare_stored(&left),
                    other => compare_json(&left, &self.value_of(other, binding)?),
                };
                Ok(ordering.map(|o| operator_holds(*operator, o)))
            }
            Predicate::Like {
                expression,
                pattern,
            } => {
                let text = match self.value_of(expression, binding)? {
                    Value::Null => return Ok(None),
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                let regex = like_regex(pattern).map_err(|e| ExecutionError::InvalidPattern {
                    pattern: pattern.clone(),
                    error: e.to_string(),
                })?;
                Ok(Some(regex.is_match(&text)))
            }
            Predicate::Not(inner) => Ok(self.evaluate(inner, binding)?.map(|b| !b)),
            Predicate::And(children) => {
                let mut result = Some(true);
                for child in children {
                    match self.evaluate(child, binding)? {
                        Some(false) => return Ok(Some(false)),
                        None => result = None,
                        Some(true) => {}
                    }
                }
                Ok(result)
            }
            Predicate::Or(children) => {
                let mut result = Some(false);
                for child in children {
                    match self.evaluate(child, binding)? {
                        Some(true) => return Ok(Some(true)),
                        None => result = None,
                        Some(false) => {}
                    }
                }
                Ok(result)
            }
            Predicate::Constant(value) => Ok(Some(*value)),
        }
    }

    fn count(&self, query: &TypedQuery, matched: &[Binding<'_>]) -> i64 {
        if !query.select.distinct {
            return matched.len() as i64;
        }
        let id = query.root.id();
        matched
            .iter()
            .map(|b| column_value(b, &id).to_string())
            .collect::<HashSet<_>>()
            .len() as i64
    }

    fn project(
        &self,
        query: &TypedQuery,
        matched: Vec<Binding<'_>>,
    ) -> Result<Vec<ResultRow>, ExecutionError> {
        let mut rows = matched
            .iter()
            .map(|binding| -> Result<(Vec<Value>, Vec<Value>), ExecutionError> {
                let values =
                    self.values_of(query.select.items.iter().map(|i| &i.expression), binding)?;
                let keys = self.values_of(query.order_by.0.iter().map(|o| &o.expression), binding)?;
                Ok((values, keys))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if !query.order_by.0.is_empty() {
            rows.sort_by(|a, b| compare_keys(&a.1, &b.1, &query.order_by.0));
        }
        if query.select.distinct {
            let mut seen = HashSet::new();
            rows.retain(|(values, _)| seen.insert(Value::Array(values.clone()).to_string()));
        }

        let items = &query.select.items;
        Ok(rows
            .into_iter()
            .map(|(values, _)| match &query.select.mode {
                SelectionMode::Entity { .. } => ResultRow::Entity(nest(items, values)),
                SelectionMode::Tuple => ResultRow::Tuple(Tuple::new(
                    items.iter().map(|i| i.name.clone()).collect(),
                    values,
                )),
                SelectionMode::Construct { .. } | SelectionMode::Array | SelectionMode::Count => {
                    ResultRow::Array(values)
                }
            })
            .collect())
    }

    fn values_of<'e>(
        &self,
        expressions: impl Iterator<Item = &'e Expression>,
        binding: &Binding<'_>,
    ) -> Result<Vec<Value>, ExecutionError> {
        expressions.map(|e| self.value_of(e, binding)).collect()
    }
}

impl QueryExecutor for InMemoryDatabase {
    fn execute(&self, query: &TypedQuery) -> Result<Vec<ResultRow>, ExecutionError> {
        let mut bindings = self.scan(&query.root)?;
        for join in &query.joins.0 {
            bindings = self.join(bindings, join)?;
        }

        let mut matched = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let keep = match &query.filters.0 {
                Some(predicate) => self.evaluate(predicate, &binding)? == Some(true),
                None => true,
            };
            if keep {
                matched.push(binding);
            }
        }
        log::debug!(
            "{} row(s) of `{}` matched after {} join(s)",
            matched.len(),
            query.root.table,
            query.joins.0.len()
        );

        if query.is_count() {
            return Ok(vec![ResultRow::Count(self.count(query, &matched))]);
        }
        self.project(query, matched)
    }
}

fn column_value(binding: &Binding<'_>, column: &ColumnRef) -> Value {
    binding
        .get(&column.table_alias)
        .copied()
        .flatten()
        .and_then(|row| row.get(&column.column))
        .cloned()
        .unwrap_or(Value::Null)
}

fn operator_holds(operator: ComparisonOperator, ordering: Ordering) -> bool {
    match operator {
        ComparisonOperator::Eq => ordering == Ordering::Equal,
        ComparisonOperator::Lt => ordering == Ordering::Less,
        ComparisonOperator::Le => ordering != Ordering::Greater,
        ComparisonOperator::Gt => ordering == Ordering::Greater,
        ComparisonOperator::Ge => ordering != Ordering::Less,
    }
}

/// NULLs sort last in either direction.
fn compare_keys(a: &[Value], b: &[Value], items: &[OrderByItem]) -> Ordering {
    for ((x, y), item) in a.iter().zip(b).zip(items) {
        let ordering = match (x.is_null(), y.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                let ordering = compare_json(x, y).unwrap_or(Ordering::Equal);
                match item.order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Builds a nested object from dotted item names (`address.street`).
fn nest(items: &[SelectItem], values: Vec<Value>) -> Value {
    let mut root = Map::new();
    for (item, value) in items.iter().zip(values) {
        let parts: Vec<&str> = item.name.split('.').collect();
        insert_path(&mut root, &parts, value);
    }
    Value::Object(root)
}

fn insert_path(map: &mut Map<String, Value>, parts: &[&str], value: Value) {
    match parts {
        [] => {}
        [last] => {
            map.insert(last.to_string(), value);
        }
        [first, rest @ ..] => {
            let child = map
                .entry(first.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = child {
                insert_path(inner, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::{CriteriaQueryVisitor, FilterItems, JoinItems, OrderByItems, SelectItems};
    use crate::entity_catalog::testing::library_metamodel;
    use crate::search_condition::TypedValue;
    use crate::search_parser::{FiqlParser, ParserContext, SearchConditionParser};
    use serde_json::json;

    const DATA: &str = r#"{
        "books": [
            {"id": 1, "book_title": "a", "owner_name": "Ann", "library_id": 7},
            {"id": 2, "book_title": "b", "owner_name": null, "library_id": null}
        ],
        "book_authors": [
            {"book_id": 1, "author": "X"},
            {"book_id": 1, "author": "Y"}
        ],
        "book_reviews": [],
        "review_authors": [],
        "libraries": [{"id": 7, "address": "town"}]
    }"#;

    fn root() -> Root {
        Root {
            entity: "Book".to_string(),
            table: "books".to_string(),
            alias: "b".to_string(),
            id_column: "id".to_string(),
        }
    }

    fn run(expression: &str) -> Vec<ResultRow> {
        let model = library_metamodel();
        let db = InMemoryDatabase::from_json_str(DATA).unwrap();
        let condition = FiqlParser::new(ParserContext::new(&model, "Book"))
            .parse(expression)
            .unwrap();
        let mut visitor = CriteriaQueryVisitor::new(&model, "Book").unwrap();
        condition.accept(&mut visitor).unwrap();
        db.execute(&visitor.select_tuple(&["id"]).unwrap()).unwrap()
    }

    fn ids(rows: &[ResultRow]) -> Vec<i64> {
        rows.iter()
            .filter_map(|r| r.as_tuple()?.get("id")?.as_i64())
            .collect()
    }

    #[test]
    fn test_left_join_keeps_unmatched_rows() {
        assert_eq!(ids(&run("authors==X,id==2")), vec![1, 2]);
        assert_eq!(ids(&run("authors!=X")), vec![1]);
    }

    #[test]
    fn test_null_is_unknown() {
        // NOT(UNKNOWN) stays UNKNOWN
        assert_eq!(ids(&run("ownerInfo.name!=Ann")), Vec::<i64>::new());
        assert_eq!(ids(&run("ownerInfo.name==Ann,id==2")), vec![1, 2]);
    }

    #[test]
    fn test_collection_size() {
        assert_eq!(ids(&run("count(authors)==2")), vec![1]);
        assert_eq!(ids(&run("count(authors)==0")), vec![2]);
    }

    #[test]
    fn test_count_is_distinct_per_root() {
        let model = library_metamodel();
        let db = InMemoryDatabase::from_json_str(DATA).unwrap();
        let visitor = CriteriaQueryVisitor::new(&model, "Book")
            .unwrap()
            .with_joins(&["authors"])
            .unwrap();
        assert_eq!(visitor.count(&db).unwrap(), 2);
    }

    #[test]
    fn test_entity_rows_are_nested() {
        let db = InMemoryDatabase::from_json_str(DATA).unwrap();
        let query = TypedQuery {
            root: root(),
            select: SelectItems {
                mode: SelectionMode::Entity {
                    entity: "Book".to_string(),
                },
                items: vec![
                    SelectItem {
                        name: "id".to_string(),
                        expression: Expression::Column(ColumnRef::new("b", "id")),
                    },
                    SelectItem {
                        name: "ownerInfo.name.name".to_string(),
                        expression: Expression::Column(ColumnRef::new("b", "owner_name")),
                    },
                ],
                distinct: false,
            },
            joins: JoinItems(Vec::new()),
            filters: FilterItems(Some(Predicate::compare(
                Expression::Column(ColumnRef::new("b", "id")),
                ComparisonOperator::Eq,
                Expression::Literal(TypedValue::Integer(1)),
            ))),
            order_by: OrderByItems::default(),
        };
        let rows = db.execute(&query).unwrap();
        assert_eq!(
            rows,
            vec![ResultRow::Entity(
                json!({"id": 1, "ownerInfo": {"name": {"name": "Ann"}}})
            )]
        );
    }

    #[test]
    fn test_unknown_table() {
        let db = InMemoryDatabase::new();
        let query = TypedQuery {
            root: root(),
            select: SelectItems {
                mode: SelectionMode::Count,
                items: Vec::new(),
                distinct: false,
            },
            joins: JoinItems(Vec::new()),
            filters: FilterItems(None),
            order_by: OrderByItems::default(),
        };
        assert_eq!(
            db.execute(&query),
            Err(ExecutionError::UnknownTable {
                table: "books".to_string()
            })
        );
    }

    #[test]
    fn test_nulls_sort_last() {
        let items = vec![OrderByItem {
            expression: Expression::Column(ColumnRef::new("b", "x")),
            order: SortOrder::Desc,
        }];
        assert_eq!(
            compare_keys(&[Value::Null], &[json!(1)], &items),
            Ordering::Greater
        );
        assert_eq!(compare_keys(&[json!(2)], &[json!(1)], &items), Ordering::Less);
    }
}
