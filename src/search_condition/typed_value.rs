use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

pub const DATE_STORAGE_FORMAT: &str = "%Y-%m-%d";
pub const DATETIME_STORAGE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
pub const TIME_STORAGE_FORMAT: &str = "%H:%M:%S";

/// A literal already coerced to the type of the property it is compared with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TypedValue {
    String(String),
    Integer(i64),
    Double(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    /// Canonical enum constant
    Enum(String),
}

impl TypedValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) | TypedValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TypedValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// String values containing `*` are matched with LIKE semantics.
    pub fn has_wildcard(&self) -> bool {
        matches!(self, TypedValue::String(s) if s.contains('*'))
    }

    /// SQL LIKE pattern with `*` translated to `%`
    pub fn like_pattern(&self) -> Option<String> {
        match self {
            TypedValue::String(s) if s.contains('*') => Some(s.replace('*', "%")),
            _ => None,
        }
    }

    /// JSON representation used for row storage and result values.
    pub fn to_json(&self) -> Value {
        match self {
            TypedValue::String(s) | TypedValue::Enum(s) => Value::String(s.clone()),
            TypedValue::Integer(i) => Value::from(*i),
            TypedValue::Double(d) => Value::from(*d),
            TypedValue::Boolean(b) => Value::Bool(*b),
            TypedValue::Date(d) => Value::String(d.format(DATE_STORAGE_FORMAT).to_string()),
            TypedValue::DateTime(d) => {
                Value::String(d.format(DATETIME_STORAGE_FORMAT).to_string())
            }
            TypedValue::Time(t) => Value::String(t.format(TIME_STORAGE_FORMAT).to_string()),
        }
    }

    /// Quoted SQL literal
    pub fn to_sql_literal(&self) -> String {
        match self {
            TypedValue::Integer(i) => i.to_string(),
            TypedValue::Double(d) => d.to_string(),
            TypedValue::Boolean(b) => b.to_string(),
            other => format!("'{}'", other.to_string().replace('\'', "''")),
        }
    }

    /// Orders a stored JSON value relative to this literal (`stored` cmp `self`).
    ///
    /// Returns `None` for nulls and values of an incompatible shape.
    pub fn compare_stored(&self, stored: &Value) -> Option<Ordering> {
        compare_json(stored, &self.to_json_for(stored))
    }

    fn to_json_for(&self, stored: &Value) -> Value {
        // temporal literals compare textually against the storage format, but
        // also accept stored values with a space separator
        match (self, stored) {
            (TypedValue::DateTime(d), Value::String(s)) if s.contains(' ') => {
                Value::String(d.format("%Y-%m-%d %H:%M:%S").to_string())
            }
            _ => self.to_json(),
        }
    }
}

/// Ordering of two JSON scalars under SQL comparison rules; `None` when either is
/// null or the kinds differ.
pub fn compare_json(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::String(s) | TypedValue::Enum(s) => write!(f, "{}", s),
            TypedValue::Integer(i) => write!(f, "{}", i),
            TypedValue::Double(d) => write!(f, "{}", d),
            TypedValue::Boolean(b) => write!(f, "{}", b),
            TypedValue::Date(d) => write!(f, "{}", d.format(DATE_STORAGE_FORMAT)),
            TypedValue::DateTime(d) => write!(f, "{}", d.format(DATETIME_STORAGE_FORMAT)),
            TypedValue::Time(t) => write!(f, "{}", t.format(TIME_STORAGE_FORMAT)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compare_stored_numbers() {
        let ten = TypedValue::Integer(10);
        assert_eq!(ten.compare_stored(&json!(9)), Some(Ordering::Less));
        assert_eq!(ten.compare_stored(&json!(10)), Some(Ordering::Equal));
        assert_eq!(ten.compare_stored(&json!(10.5)), Some(Ordering::Greater));
        assert_eq!(ten.compare_stored(&Value::Null), None);
        assert_eq!(ten.compare_stored(&json!("10")), None);
    }

    #[test]
    fn test_compare_stored_dates() {
        let date = TypedValue::Date(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert_eq!(date.compare_stored(&json!("2000-01-01")), Some(Ordering::Equal));
        assert_eq!(date.compare_stored(&json!("2001-01-01")), Some(Ordering::Greater));

        let datetime = TypedValue::DateTime(
            NaiveDate::from_ymd_opt(2000, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
        );
        assert_eq!(
            datetime.compare_stored(&json!("2000-01-01 12:00:00")),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_sql_literals() {
        assert_eq!(TypedValue::String("O'Hara".into()).to_sql_literal(), "'O''Hara'");
        assert_eq!(TypedValue::Integer(5).to_sql_literal(), "5");
        assert_eq!(TypedValue::Boolean(true).to_sql_literal(), "true");
        assert_eq!(
            TypedValue::Date(NaiveDate::from_ymd_opt(2001, 2, 3).unwrap()).to_sql_literal(),
            "'2001-02-03'"
        );
    }

    #[test]
    fn test_like_pattern() {
        let v = TypedValue::String("num1*".into());
        assert!(v.has_wildcard());
        assert_eq!(v.like_pattern().as_deref(), Some("num1%"));
        assert!(!TypedValue::Enum("GOOD".into()).has_wildcard());
    }
}
