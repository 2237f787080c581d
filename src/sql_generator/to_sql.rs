use super::ToSql;
use crate::criteria::{
    ComparisonOperator, Expression, FilterItems, Join, JoinItems, OrderByItems, Predicate,
    SelectItems, SelectionMode, SortOrder, TypedQuery,
};

impl ToSql for TypedQuery {
    fn to_sql(&self) -> String {
        let mut sql = String::new();

        if self.is_count() {
            if self.select.distinct {
                sql.push_str(&format!("SELECT COUNT(DISTINCT {})\n", self.root.id().to_sql()));
            } else {
                sql.push_str("SELECT COUNT(*)\n");
            }
        } else {
            sql.push_str(&self.select.to_sql());
        }

        sql.push_str(&format!("FROM {} AS {}\n", self.root.table, self.root.alias));
        sql.push_str(&self.joins.to_sql());
        sql.push_str(&self.filters.to_sql());
        sql.push_str(&self.order_by.to_sql());
        sql
    }
}

impl ToSql for SelectItems {
    fn to_sql(&self) -> String {
        let mut sql: String = String::new();

        if self.items.is_empty() || self.mode == SelectionMode::Count {
            return sql;
        }

        if self.distinct {
            sql.push_str("SELECT DISTINCT \n");
        } else {
            sql.push_str("SELECT \n");
        }

        for (i, item) in self.items.iter().enumerate() {
            sql.push_str("      ");
            sql.push_str(&item.expression.to_sql());
            sql.push_str(" AS \"");
            sql.push_str(&item.name);
            sql.push('"');
            if i + 1 < self.items.len() {
                sql.push_str(", ");
            }
            sql.push('\n');
        }
        sql
    }
}

impl ToSql for JoinItems {
    fn to_sql(&self) -> String {
        self.0.iter().map(|join| join.to_sql()).collect()
    }
}

impl ToSql for Join {
    fn to_sql(&self) -> String {
        format!(
            "LEFT JOIN {} AS {} ON {} = {}.{}\n",
            self.table_name,
            self.table_alias,
            self.source.to_sql(),
            self.table_alias,
            self.target_column
        )
    }
}

impl ToSql for FilterItems {
    fn to_sql(&self) -> String {
        if let Some(predicate) = &self.0 {
            format!("WHERE {}\n", predicate.to_sql())
        } else {
            "".into()
        }
    }
}

impl ToSql for OrderByItems {
    fn to_sql(&self) -> String {
        let mut sql: String = String::new();
        if self.0.is_empty() {
            return sql;
        }
        sql.push_str("ORDER BY ");
        for (i, item) in self.0.iter().enumerate() {
            sql.push_str(&item.expression.to_sql());
            sql.push(' ');
            sql.push_str(&item.order.to_sql());
            if i + 1 < self.0.len() {
                sql.push_str(", ");
            }
        }
        sql.push('\n');
        sql
    }
}

impl ToSql for SortOrder {
    fn to_sql(&self) -> String {
        match self {
            SortOrder::Asc => "ASC".into(),
            SortOrder::Desc => "DESC".into(),
        }
    }
}

impl ToSql for crate::criteria::ColumnRef {
    fn to_sql(&self) -> String {
        format!("{}.{}", self.table_alias, self.column)
    }
}

impl ToSql for Expression {
    fn to_sql(&self) -> String {
        match self {
            Expression::Column(column) => column.to_sql(),
            Expression::Literal(value) => value.to_sql_literal(),
            Expression::CollectionSize {
                table,
                foreign_key,
                owner,
            } => format!(
                "(SELECT COUNT(*) FROM {} WHERE {}.{} = {})",
                table,
                table,
                foreign_key,
                owner.to_sql()
            ),
        }
    }
}

impl ToSql for ComparisonOperator {
    fn to_sql(&self) -> String {
        match self {
            ComparisonOperator::Eq => "=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Le => "<=",
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Ge => ">=",
        }
        .to_string()
    }
}

impl ToSql for Predicate {
    fn to_sql(&self) -> String {
        match self {
            Predicate::Comparison {
                left,
                operator,
                right,
            } => format!("{} {} {}", left.to_sql(), operator.to_sql(), right.to_sql()),
            Predicate::Like {
                expression,
                pattern,
            } => format!(
                "{} LIKE '{}'",
                expression.to_sql(),
                pattern.replace('\'', "''")
            ),
            Predicate::Not(inner) => format!("NOT ({})", inner.to_sql()),
            Predicate::And(children) => join_children(children, " AND ", "TRUE"),
            Predicate::Or(children) => join_children(children, " OR ", "FALSE"),
            Predicate::Constant(true) => "TRUE".into(),
            Predicate::Constant(false) => "FALSE".into(),
        }
    }
}

fn join_children(children: &[Predicate], separator: &str, empty: &str) -> String {
    if children.is_empty() {
        return empty.to_string();
    }
    children
        .iter()
        .map(|child| match child {
            Predicate::And(_) | Predicate::Or(_) => format!("({})", child.to_sql()),
            other => other.to_sql(),
        })
        .collect::<Vec<_>>()
        .join(separator)
}
