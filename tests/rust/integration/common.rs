use std::collections::HashMap;

use searchcriteria::criteria::{CriteriaQueryVisitor, TypedQuery};
use searchcriteria::entity_catalog::{EntitySchemaConfig, Metamodel};
use searchcriteria::executor::{InMemoryDatabase, QueryExecutor, ResultRow};
use searchcriteria::search_condition::SearchCondition;
use searchcriteria::search_parser::{
    FiqlParser, ODataParser, ParserContext, SearchConditionParser, SearchParseError,
};

pub const SCHEMA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/library_schema.yaml");
pub const DATA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/library_data.json");

pub fn metamodel() -> Metamodel {
    EntitySchemaConfig::from_yaml_file(SCHEMA)
        .and_then(|schema| schema.to_metamodel())
        .expect("library schema fixture should load")
}

pub fn database() -> InMemoryDatabase {
    InMemoryDatabase::from_json_file(DATA).expect("library data fixture should load")
}

pub fn fiql(model: &Metamodel, expression: &str) -> Result<SearchCondition, SearchParseError> {
    FiqlParser::new(ParserContext::new(model, "Book")).parse(expression)
}

pub fn odata(model: &Metamodel, expression: &str) -> Result<SearchCondition, SearchParseError> {
    ODataParser::new(ParserContext::new(model, "Book")).parse(expression)
}

/// Visitor that has already seen the condition parsed from `expression`.
pub fn visited<'m>(model: &'m Metamodel, expression: &str) -> CriteriaQueryVisitor<'m> {
    let condition = fiql(model, expression).expect("expression should parse");
    let mut visitor = CriteriaQueryVisitor::new(model, "Book").unwrap();
    condition.accept(&mut visitor).unwrap();
    visitor
}

/// Ids of matching books, ascending.
pub fn book_ids(expression: &str) -> Vec<i64> {
    let model = metamodel();
    let query = visited(&model, expression)
        .order_by(&["id"], true)
        .unwrap()
        .select_tuple(&["id"])
        .unwrap();
    ids_of(&query)
}

pub fn ids_of(query: &TypedQuery) -> Vec<i64> {
    database()
        .execute(query)
        .unwrap()
        .iter()
        .map(|row| {
            row.as_tuple()
                .and_then(|t| t.get("id"))
                .and_then(|v| v.as_i64())
                .expect("row should carry an integer id")
        })
        .collect()
}

/// Number of root entity rows returned for `expression`.
pub fn entity_count(expression: &str) -> usize {
    let model = metamodel();
    let query = visited(&model, expression).query().unwrap();
    let rows = database().execute(&query).unwrap();
    assert!(rows.iter().all(|r| matches!(r, ResultRow::Entity(_))));
    rows.len()
}

pub fn mapping(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
