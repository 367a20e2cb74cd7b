//! Guard categories and their switches.

use std::fmt;

use lazyguard_schema::RelationKind;

use crate::settings::Settings;

/// The three independently switchable kinds of guarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuardCategory {
    /// Concrete fields excluded by `only`/`defer`.
    LocalFields,
    /// Single-valued relations, either side.
    RelationFields,
    /// Collection managers: reverse foreign keys and many-to-many.
    RelationReverseFields,
}

impl GuardCategory {
    /// The category guarding a relation of this kind.
    pub fn for_relation(kind: RelationKind) -> Self {
        if kind.is_plural() {
            Self::RelationReverseFields
        } else {
            Self::RelationFields
        }
    }

    /// Read the switch for this category. Evaluated on every access.
    pub fn is_enabled(&self, settings: &Settings) -> bool {
        let guards = settings.guards();
        match self {
            Self::LocalFields => guards.local_fields,
            Self::RelationFields => guards.relation_fields,
            Self::RelationReverseFields => guards.relation_reverse_fields,
        }
    }

    /// Configuration key of the switch.
    pub fn key(&self) -> &'static str {
        match self {
            Self::LocalFields => "local_fields",
            Self::RelationFields => "relation_fields",
            Self::RelationReverseFields => "relation_reverse_fields",
        }
    }
}

impl fmt::Display for GuardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
