//! SQL rendering.
//!
//! [`generate_sql`] renders a built [`TypedQuery`]. [`sql_printer`] is a
//! separate condition visitor that prints a flat `SELECT ... WHERE` straight
//! from a search condition, without the metamodel.

use crate::criteria::TypedQuery;

pub mod sql_printer;
mod to_sql;

pub use sql_printer::{to_sql, SqlPrinterVisitor};

pub trait ToSql {
    fn to_sql(&self) -> String;
}

pub fn generate_sql(query: &TypedQuery) -> String {
    query.to_sql()
}
