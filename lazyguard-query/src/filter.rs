//! Filter conditions evaluated against stored rows.
//!
//! A [`Filter`] renders to a SQL `WHERE` fragment for the query log and is
//! evaluated directly against [`Row`]s by the in-memory store.

use std::cmp::Ordering;

use crate::types::{Row, Value, compare_values, sql_literal};

/// A filter condition over the columns of one model.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Filter {
    /// No filter (always true).
    #[default]
    None,

    /// Equals comparison.
    Equals(String, Value),
    /// Not equals comparison.
    NotEquals(String, Value),

    /// Less than comparison.
    Lt(String, Value),
    /// Less than or equal comparison.
    Lte(String, Value),
    /// Greater than comparison.
    Gt(String, Value),
    /// Greater than or equal comparison.
    Gte(String, Value),

    /// In a list of values.
    In(String, Vec<Value>),

    /// Substring match (LIKE %value%).
    Contains(String, String),

    /// Is null check.
    IsNull(String),

    /// Logical AND of multiple filters.
    And(Vec<Filter>),
    /// Logical OR of multiple filters.
    Or(Vec<Filter>),
    /// Logical NOT of a filter.
    Not(Box<Filter>),
}

impl Filter {
    /// Create an empty filter (matches everything).
    pub fn none() -> Self {
        Self::None
    }

    /// Check if this filter is empty.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// `column = value`
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equals(column.into(), value.into())
    }

    /// `column != value`
    pub fn not_equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::NotEquals(column.into(), value.into())
    }

    /// `column < value`
    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lt(column.into(), value.into())
    }

    /// `column <= value`
    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Lte(column.into(), value.into())
    }

    /// `column > value`
    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gt(column.into(), value.into())
    }

    /// `column >= value`
    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Gte(column.into(), value.into())
    }

    /// `column IN (values)`
    pub fn in_list<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In(column.into(), values.into_iter().map(Into::into).collect())
    }

    /// `column LIKE %needle%`
    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Contains(column.into(), needle.into())
    }

    /// `column IS NULL`
    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull(column.into())
    }

    /// Create an AND filter.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.pop().unwrap_or_default(),
            _ => Self::And(filters),
        }
    }

    /// Create an OR filter.
    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut filters: Vec<_> = filters.into_iter().filter(|f| !f.is_none()).collect();
        match filters.len() {
            0 => Self::None,
            1 => filters.pop().unwrap_or_default(),
            _ => Self::Or(filters),
        }
    }

    /// Create a NOT filter.
    pub fn not(filter: Filter) -> Self {
        if filter.is_none() {
            return Self::None;
        }
        Self::Not(Box::new(filter))
    }

    /// Combine with another filter using AND.
    pub fn and_then(self, other: Filter) -> Self {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            _ => Self::And(vec![self, other]),
        }
    }

    /// Every column this filter references.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::None => {}
            Self::Equals(c, _)
            | Self::NotEquals(c, _)
            | Self::Lt(c, _)
            | Self::Lte(c, _)
            | Self::Gt(c, _)
            | Self::Gte(c, _)
            | Self::In(c, _)
            | Self::Contains(c, _)
            | Self::IsNull(c) => out.push(c.as_str()),
            Self::And(filters) | Self::Or(filters) => {
                for f in filters {
                    f.collect_columns(out);
                }
            }
            Self::Not(f) => f.collect_columns(out),
        }
    }

    /// Evaluate against a row. Missing columns read as null.
    pub fn matches(&self, row: &Row) -> bool {
        let get = |c: &str| row.get(c).unwrap_or(&Value::Null);
        let cmp = |c: &str, v: &Value| -> Option<Ordering> {
            let actual = get(c);
            if actual.is_null() || v.is_null() {
                None
            } else {
                Some(compare_values(actual, v))
            }
        };

        match self {
            Self::None => true,
            Self::Equals(c, v) => {
                if v.is_null() {
                    get(c).is_null()
                } else {
                    cmp(c, v) == Some(Ordering::Equal)
                }
            }
            Self::NotEquals(c, v) => {
                if v.is_null() {
                    !get(c).is_null()
                } else {
                    matches!(cmp(c, v), Some(Ordering::Less | Ordering::Greater))
                }
            }
            Self::Lt(c, v) => cmp(c, v) == Some(Ordering::Less),
            Self::Lte(c, v) => matches!(cmp(c, v), Some(Ordering::Less | Ordering::Equal)),
            Self::Gt(c, v) => cmp(c, v) == Some(Ordering::Greater),
            Self::Gte(c, v) => matches!(cmp(c, v), Some(Ordering::Greater | Ordering::Equal)),
            Self::In(c, values) => values
                .iter()
                .any(|v| cmp(c, v) == Some(Ordering::Equal)),
            Self::Contains(c, needle) => get(c)
                .as_str()
                .is_some_and(|s| s.contains(needle.as_str())),
            Self::IsNull(c) => get(c).is_null(),
            Self::And(filters) => filters.iter().all(|f| f.matches(row)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(row)),
            Self::Not(f) => !f.matches(row),
        }
    }

    /// Render as a SQL condition with inline literals.
    pub fn to_sql(&self) -> String {
        match self {
            Self::None => "TRUE".to_string(),
            Self::Equals(col, val) if val.is_null() => format!("{} IS NULL", col),
            Self::Equals(col, val) => format!("{} = {}", col, sql_literal(val)),
            Self::NotEquals(col, val) if val.is_null() => format!("{} IS NOT NULL", col),
            Self::NotEquals(col, val) => format!("{} != {}", col, sql_literal(val)),
            Self::Lt(col, val) => format!("{} < {}", col, sql_literal(val)),
            Self::Lte(col, val) => format!("{} <= {}", col, sql_literal(val)),
            Self::Gt(col, val) => format!("{} > {}", col, sql_literal(val)),
            Self::Gte(col, val) => format!("{} >= {}", col, sql_literal(val)),
            Self::In(_, values) if values.is_empty() => "FALSE".to_string(),
            Self::In(col, values) => {
                let items: Vec<_> = values.iter().map(sql_literal).collect();
                format!("{} IN ({})", col, items.join(", "))
            }
            Self::Contains(col, needle) => {
                format!("{} LIKE '%{}%'", col, needle.replace('\'', "''"))
            }
            Self::IsNull(col) => format!("{} IS NULL", col),
            Self::And(filters) if filters.is_empty() => "TRUE".to_string(),
            Self::And(filters) => {
                let parts: Vec<_> = filters.iter().map(Filter::to_sql).collect();
                format!("({})", parts.join(" AND "))
            }
            Self::Or(filters) if filters.is_empty() => "FALSE".to_string(),
            Self::Or(filters) => {
                let parts: Vec<_> = filters.iter().map(Filter::to_sql).collect();
                format!("({})", parts.join(" OR "))
            }
            Self::Not(filter) => format!("NOT ({})", filter.to_sql()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row() -> Row {
        let mut row = Row::new();
        row.insert("id".into(), json!(1));
        row.insert("name".into(), json!("Alice"));
        row.insert("age".into(), json!(30));
        row.insert("deleted_at".into(), Value::Null);
        row
    }

    #[test]
    fn test_filter_equals() {
        let filter = Filter::equals("name", "Alice");
        assert!(filter.matches(&row()));
        assert_eq!(filter.to_sql(), "name = 'Alice'");
    }

    #[test]
    fn test_filter_and() {
        let combined = Filter::and([Filter::equals("name", "Alice"), Filter::gt("age", 18)]);
        assert!(combined.matches(&row()));
        assert_eq!(combined.to_sql(), "(name = 'Alice' AND age > 18)");
        assert_eq!(combined.columns(), vec!["name", "age"]);
    }

    #[test]
    fn test_filter_and_collapses() {
        assert_eq!(Filter::and([Filter::None]), Filter::None);
        assert_eq!(
            Filter::and([Filter::None, Filter::is_null("x")]),
            Filter::is_null("x")
        );
    }

    #[test]
    fn test_filter_or_and_not() {
        let f = Filter::or([Filter::equals("name", "Bob"), Filter::lte("age", 30)]);
        assert!(f.matches(&row()));
        assert!(!Filter::not(f).matches(&row()));
    }

    #[test]
    fn test_filter_null_semantics() {
        assert!(Filter::is_null("deleted_at").matches(&row()));
        assert!(Filter::is_null("missing").matches(&row()));
        assert!(!Filter::gt("deleted_at", 0).matches(&row()));
        assert!(!Filter::not_equals("deleted_at", 0).matches(&row()));
        assert_eq!(Filter::equals("deleted_at", Value::Null).to_sql(), "deleted_at IS NULL");
    }

    #[test]
    fn test_filter_in() {
        let filter = Filter::in_list("id", [1, 2, 3]);
        assert!(filter.matches(&row()));
        assert_eq!(filter.to_sql(), "id IN (1, 2, 3)");
        assert_eq!(Filter::in_list::<i64>("id", []).to_sql(), "FALSE");
    }

    #[test]
    fn test_filter_contains() {
        assert!(Filter::contains("name", "lic").matches(&row()));
        assert!(!Filter::contains("age", "3").matches(&row()));
    }
}
