//! Field selections: which concrete columns a fetch loads.

use indexmap::IndexSet;
use smol_str::SmolStr;

/// Field selection mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldSelection {
    /// Every concrete field.
    #[default]
    All,
    /// Only the named fields (the identity is added when the state is computed).
    Only(IndexSet<SmolStr>),
    /// Every field except the named ones.
    Except(IndexSet<SmolStr>),
}

impl FieldSelection {
    /// Select only the named fields.
    pub fn only<S: Into<SmolStr>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self::Only(fields.into_iter().map(Into::into).collect())
    }

    /// Select everything except the named fields.
    pub fn except<S: Into<SmolStr>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self::Except(fields.into_iter().map(Into::into).collect())
    }

    /// Apply an `only(...)`: replaces any previous selection.
    pub fn restrict_to<S: Into<SmolStr>>(&mut self, fields: impl IntoIterator<Item = S>) {
        *self = Self::only(fields);
    }

    /// Apply a `defer(...)`: merges with the previous selection.
    pub fn defer<S: Into<SmolStr>>(&mut self, fields: impl IntoIterator<Item = S>) {
        let fields: Vec<SmolStr> = fields.into_iter().map(Into::into).collect();
        match self {
            Self::All => *self = Self::Except(fields.into_iter().collect()),
            Self::Except(excluded) => excluded.extend(fields),
            Self::Only(selected) => {
                for f in &fields {
                    selected.shift_remove(f);
                }
            }
        }
    }

    /// Check if a field is selected.
    pub fn includes(&self, field: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(fields) => fields.contains(field),
            Self::Except(fields) => !fields.contains(field),
        }
    }

    /// Check if all fields are selected.
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Names mentioned by the selection.
    pub fn named(&self) -> impl Iterator<Item = &str> {
        let set = match self {
            Self::All => None,
            Self::Only(fields) | Self::Except(fields) => Some(fields),
        };
        set.into_iter().flatten().map(|s| s.as_str())
    }

    /// Generate the SQL column list for this selection.
    pub fn to_sql_columns(&self, all_columns: &[&str], table_alias: Option<&str>) -> String {
        let columns: Vec<_> = all_columns
            .iter()
            .filter(|c| self.includes(c))
            .map(|c| match table_alias {
                Some(alias) => format!("{}.{}", alias, c),
                None => c.to_string(),
            })
            .collect();
        columns.join(", ")
    }
}
