//! Field definitions for model metadata.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The role a concrete field plays on its model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// The identity (primary key) column.
    Id,
    /// A plain stored value.
    Scalar,
    /// The local column backing a forward relation.
    ForeignKey {
        /// Name of the relation this column belongs to.
        relation: SmolStr,
    },
}

/// A concrete, stored field on a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    /// Field (and column) name.
    pub name: SmolStr,
    /// What the field is.
    pub kind: FieldKind,
    /// Whether the column accepts null.
    pub nullable: bool,
}

impl Field {
    /// Create the identity field.
    pub fn id(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Id,
            nullable: false,
        }
    }

    /// Create a scalar field.
    pub fn scalar(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Scalar,
            nullable: false,
        }
    }

    /// Create the local column for a forward relation.
    pub fn foreign_key(name: impl Into<SmolStr>, relation: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::ForeignKey {
                relation: relation.into(),
            },
            nullable: false,
        }
    }

    /// Allow null values.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Get the field name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Check if this is the identity field.
    pub fn is_id(&self) -> bool {
        matches!(self.kind, FieldKind::Id)
    }

    /// Check if this column backs a forward relation.
    pub fn is_foreign_key(&self) -> bool {
        matches!(self.kind, FieldKind::ForeignKey { .. })
    }

    /// The relation this column backs, if any.
    pub fn relation(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::ForeignKey { relation } => Some(relation.as_str()),
            _ => None,
        }
    }
}
