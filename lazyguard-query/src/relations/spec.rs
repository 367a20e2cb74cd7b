//! The fetch specification a record was produced by.

use super::{FieldSelection, Include, IncludeSpec};

/// What a single fetch loaded: its field selection and its includes.
///
/// Every fetched record keeps a shared reference to the spec of the
/// statement that produced it, so the load state can be computed from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchSpec {
    /// Concrete fields loaded.
    pub fields: FieldSelection,
    /// Relations loaded alongside.
    pub include: Include,
}

impl FetchSpec {
    /// A fetch that loaded every field and no relations.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Create a fetch spec.
    pub fn new(fields: FieldSelection, include: Include) -> Self {
        Self { fields, include }
    }

    /// The spec of records loaded through `include`.
    pub fn for_include(include: &IncludeSpec) -> Self {
        Self {
            fields: include.fields.clone(),
            include: include.nested.clone().into(),
        }
    }

    /// Check if the fetch restricted fields or included relations.
    pub fn is_unrestricted(&self) -> bool {
        self.fields.is_all() && self.include.is_empty()
    }
}
