//! Per-record load state.

use indexmap::{IndexMap, IndexSet};
use lazyguard_schema::Model;
use smol_str::SmolStr;

use crate::relations::{FetchSpec, FieldSelection, LoadStrategy};

/// What the fetch that produced a record actually loaded.
///
/// Computed once when the record is constructed and never changed
/// afterwards, except by `Record::refresh_from_db`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadState {
    loaded: IndexSet<SmolStr>,
    deferred: IndexSet<SmolStr>,
    identity: SmolStr,
    relations: IndexMap<SmolStr, LoadStrategy>,
}

impl LoadState {
    /// Compute the state of a record of `model` fetched with `spec`.
    ///
    /// An `only(...)` selection always loads the identity field; a
    /// `defer(...)` may exclude it.
    pub fn compute(model: &Model, spec: &FetchSpec) -> Self {
        let identity = SmolStr::new(model.pk_name());
        let (loaded, deferred): (Vec<_>, Vec<_>) = model
            .fields
            .values()
            .map(|f| (f.name.clone(), is_loaded(&spec.fields, f.name(), f.is_id())))
            .partition(|(_, loaded)| *loaded);

        let mut deferred: Vec<SmolStr> = deferred.into_iter().map(|(name, _)| name).collect();
        deferred.sort();

        Self {
            loaded: loaded.into_iter().map(|(name, _)| name).collect(),
            deferred: deferred.into_iter().collect(),
            identity,
            relations: spec
                .include
                .specs()
                .map(|s| (s.relation_name.clone(), s.strategy))
                .collect(),
        }
    }

    /// Check if the fetch excluded any concrete field.
    pub fn is_restricted(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// Check if a concrete field was loaded.
    pub fn is_field_loaded(&self, field: &str) -> bool {
        self.loaded.contains(field)
    }

    /// Name of the identity field.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Check if the identity field was loaded.
    pub fn is_identity_loaded(&self) -> bool {
        self.loaded.contains(self.identity.as_str())
    }

    /// How a relation was loaded, if it was.
    pub fn relation_strategy(&self, relation: &str) -> Option<LoadStrategy> {
        self.relations.get(relation).copied()
    }

    /// Check if a relation was eager-loaded by any directive.
    pub fn is_relation_loaded(&self, relation: &str) -> bool {
        self.relations.contains_key(relation)
    }

    /// Loaded field names, sorted.
    pub fn selected(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.loaded.iter().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Excluded field names, sorted.
    pub fn deferred(&self) -> Vec<&str> {
        self.deferred.iter().map(|s| s.as_str()).collect()
    }

    /// Relations loaded with `prefetch_related`, sorted.
    pub fn prefetched(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .relations
            .iter()
            .filter(|(_, strategy)| **strategy == LoadStrategy::Separate)
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

fn is_loaded(fields: &FieldSelection, name: &str, is_id: bool) -> bool {
    match fields {
        FieldSelection::Only(_) if is_id => true,
        _ => fields.includes(name),
    }
}
