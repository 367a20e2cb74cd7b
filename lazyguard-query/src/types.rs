//! Common types used in query building.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::cmp::Ordering;
use std::fmt;

/// A stored value.
pub type Value = serde_json::Value;

/// One stored row, keyed by column name.
pub type Row = IndexMap<SmolStr, Value>;

/// Sort order for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// The opposite direction.
    pub fn flip(&self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// Order by specification for a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderByField {
    /// The column name to order by.
    pub column: SmolStr,
    /// The sort order.
    pub order: SortOrder,
}

impl OrderByField {
    /// Create a new order by field.
    pub fn new(column: impl Into<SmolStr>, order: SortOrder) -> Self {
        Self {
            column: column.into(),
            order,
        }
    }

    /// Create an ascending order.
    pub fn asc(column: impl Into<SmolStr>) -> Self {
        Self::new(column, SortOrder::Asc)
    }

    /// Create a descending order.
    pub fn desc(column: impl Into<SmolStr>) -> Self {
        Self::new(column, SortOrder::Desc)
    }

    /// Parse `"name"` (ascending) or `"-name"` (descending).
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(column) => Self::desc(column),
            None => Self::asc(spec),
        }
    }

    /// The same column in the opposite direction.
    pub fn flipped(&self) -> Self {
        Self::new(self.column.clone(), self.order.flip())
    }

    /// Generate the SQL for this order by field.
    pub fn to_sql(&self) -> String {
        format!("{} {}", self.column, self.order.as_sql())
    }

    /// Compare two rows on this column.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ord = compare_values(
            a.get(self.column.as_str()).unwrap_or(&Value::Null),
            b.get(self.column.as_str()).unwrap_or(&Value::Null),
        );
        match self.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

/// Total order over stored values: null first, then booleans, numbers, strings.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Render a value as a SQL literal for the query log.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => format!("'{}'", other),
    }
}
