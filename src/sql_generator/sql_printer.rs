//! Flat SQL printer for search conditions.
//!
//! Property names are used as column names (optionally renamed through a
//! field map) and every value is printed as a quoted literal:
//!
//! ```text
//! name==ami*;level=gt=10  ->  SELECT * FROM table WHERE (name LIKE 'ami%') AND (level > '10')
//! ```

use std::collections::HashMap;
use std::convert::Infallible;

use crate::search_condition::{
    AggregateComparison, CompositeKind, ConditionType, PrimitiveStatement, SearchCondition,
    SearchConditionVisitor, TypedValue,
};

#[derive(Debug, Clone, Default)]
pub struct SqlPrinterVisitor {
    table: String,
    columns: Vec<String>,
    field_map: HashMap<String, String>,
    frames: Vec<Vec<String>>,
    condition: Option<String>,
}

impl SqlPrinterVisitor {
    pub fn new(table: impl Into<String>) -> Self {
        SqlPrinterVisitor {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Selected columns; `*` when empty
    pub fn with_columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Renames properties to column names
    pub fn with_field_map(mut self, field_map: HashMap<String, String>) -> Self {
        self.field_map = field_map;
        self
    }

    /// WHERE clause body of the last visited condition
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    pub fn query(&self) -> Option<String> {
        let condition = self.condition.as_ref()?;
        let columns = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns.join(", ")
        };
        Some(format!(
            "SELECT {} FROM {} WHERE {}",
            columns, self.table, condition
        ))
    }

    fn column(&self, property: &str) -> String {
        self.field_map
            .get(property)
            .cloned()
            .unwrap_or_else(|| property.to_string())
    }

    fn emit(&mut self, sql: String) {
        match self.frames.last_mut() {
            Some(frame) => frame.push(sql),
            None => self.condition = Some(sql),
        }
    }
}

fn operator(condition: ConditionType, value: &TypedValue) -> &'static str {
    let wildcard = value.has_wildcard();
    match condition {
        ConditionType::Equals if wildcard => "LIKE",
        ConditionType::NotEquals if wildcard => "NOT LIKE",
        ConditionType::Equals => "=",
        ConditionType::NotEquals => "<>",
        ConditionType::LessThan => "<",
        ConditionType::LessOrEquals => "<=",
        ConditionType::GreaterThan => ">",
        ConditionType::GreaterOrEquals => ">=",
    }
}

fn quoted(condition: ConditionType, value: &TypedValue) -> String {
    let text = match value.like_pattern() {
        Some(pattern)
            if matches!(condition, ConditionType::Equals | ConditionType::NotEquals) =>
        {
            pattern
        }
        _ => value.to_string(),
    };
    format!("'{}'", text.replace('\'', "''"))
}

impl SearchConditionVisitor for SqlPrinterVisitor {
    type Error = Infallible;

    fn visit_comparison(&mut self, statement: &PrimitiveStatement) -> Result<(), Infallible> {
        let sql = format!(
            "{} {} {}",
            self.column(statement.property()),
            operator(statement.condition(), statement.value()),
            quoted(statement.condition(), statement.value())
        );
        self.emit(sql);
        Ok(())
    }

    fn visit_aggregate(&mut self, aggregate: &AggregateComparison) -> Result<(), Infallible> {
        let statement = aggregate.statement();
        let sql = format!(
            "{}({}) {} {}",
            aggregate.function(),
            self.column(statement.property()),
            operator(statement.condition(), statement.value()),
            quoted(statement.condition(), statement.value())
        );
        self.emit(sql);
        Ok(())
    }

    fn visit_composite(
        &mut self,
        kind: CompositeKind,
        conditions: &[SearchCondition],
    ) -> Result<(), Infallible> {
        self.frames.push(Vec::with_capacity(conditions.len()));
        for condition in conditions {
            condition.accept(self)?;
        }
        let parts = self.frames.pop().unwrap_or_default();
        let sql = parts
            .iter()
            .map(|p| format!("({})", p))
            .collect::<Vec<_>>()
            .join(&format!(" {} ", kind));
        self.emit(sql);
        Ok(())
    }
}

/// `SELECT * FROM <table> WHERE ...` for `condition`.
pub fn to_sql(condition: &SearchCondition, table: &str) -> String {
    let mut visitor = SqlPrinterVisitor::new(table);
    match condition.accept(&mut visitor) {
        Ok(()) => {}
        Err(never) => match never {},
    }
    visitor.query().unwrap_or_default()
}
