//! Include specifications for eager loading relations.

use indexmap::IndexMap;
use smol_str::SmolStr;

use super::FieldSelection;
use crate::filter::Filter;
use crate::types::OrderByField;

/// Separator between relation names in an include path (`"role__users"`).
pub const PATH_SEPARATOR: &str = "__";

/// How an included relation is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadStrategy {
    /// Joined into the parent statement (`select_related`).
    Join,
    /// One extra statement per level (`prefetch_related`).
    Separate,
}

impl LoadStrategy {
    /// The queryset method that requests this strategy.
    pub fn directive(&self) -> &'static str {
        match self {
            Self::Join => "select_related",
            Self::Separate => "prefetch_related",
        }
    }
}

/// Specification for including a relation in a query.
#[derive(Debug, Clone, PartialEq)]
pub struct IncludeSpec {
    /// Name of the relation to include.
    pub relation_name: SmolStr,
    /// Loading strategy.
    pub strategy: LoadStrategy,
    /// Fields loaded on the related records.
    pub fields: FieldSelection,
    /// Filter applied to prefetched records.
    pub filter: Filter,
    /// Ordering of prefetched records.
    pub order_by: Vec<OrderByField>,
    /// Nested includes.
    pub nested: IndexMap<SmolStr, IncludeSpec>,
}

impl IncludeSpec {
    /// Create a new include spec for a relation.
    pub fn new(relation_name: impl Into<SmolStr>, strategy: LoadStrategy) -> Self {
        Self {
            relation_name: relation_name.into(),
            strategy,
            fields: FieldSelection::All,
            filter: Filter::None,
            order_by: Vec::new(),
            nested: IndexMap::new(),
        }
    }

    /// A joined include.
    pub fn join(relation_name: impl Into<SmolStr>) -> Self {
        Self::new(relation_name, LoadStrategy::Join)
    }

    /// A prefetched include.
    pub fn prefetch(relation_name: impl Into<SmolStr>) -> Self {
        Self::new(relation_name, LoadStrategy::Separate)
    }

    /// Load only the named fields on the related records.
    pub fn only<S: Into<SmolStr>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields.restrict_to(fields);
        self
    }

    /// Defer the named fields on the related records.
    pub fn defer<S: Into<SmolStr>>(mut self, fields: impl IntoIterator<Item = S>) -> Self {
        self.fields.defer(fields);
        self
    }

    /// Filter the related records.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and_then(filter);
        self
    }

    /// Order the related records.
    pub fn order_by(mut self, order: OrderByField) -> Self {
        self.order_by.push(order);
        self
    }

    /// Include a nested relation.
    pub fn include(mut self, nested: IncludeSpec) -> Self {
        merge_into(&mut self.nested, nested);
        self
    }

    /// Check if there are nested includes.
    pub fn has_nested(&self) -> bool {
        !self.nested.is_empty()
    }

    /// Build a chain of specs from a `"a__b__c"` path.
    pub fn from_path(path: &str, strategy: LoadStrategy) -> Option<Self> {
        let mut segments = path.rsplit(PATH_SEPARATOR).filter(|s| !s.is_empty());
        let mut spec = Self::new(segments.next()?, strategy);
        for segment in segments {
            spec = Self::new(segment, strategy).include(spec);
        }
        Some(spec)
    }
}

fn merge_into(specs: &mut IndexMap<SmolStr, IncludeSpec>, spec: IncludeSpec) {
    match specs.get_mut(&spec.relation_name) {
        Some(existing) => {
            // A join already loads the relation; keep it.
            if spec.strategy == LoadStrategy::Join {
                existing.strategy = LoadStrategy::Join;
            }
            if !spec.fields.is_all() {
                existing.fields = spec.fields;
            }
            if !spec.filter.is_none() {
                existing.filter = std::mem::take(&mut existing.filter).and_then(spec.filter);
            }
            existing.order_by.extend(spec.order_by);
            for nested in spec.nested.into_values() {
                merge_into(&mut existing.nested, nested);
            }
        }
        None => {
            specs.insert(spec.relation_name.clone(), spec);
        }
    }
}

/// The set of relations included by a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Include {
    specs: IndexMap<SmolStr, IncludeSpec>,
}

impl Include {
    /// Create a new empty include set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a relation to include, merging with an existing entry.
    pub fn add(mut self, spec: IncludeSpec) -> Self {
        self.push(spec);
        self
    }

    /// Add a relation to include in place.
    pub fn push(&mut self, spec: IncludeSpec) {
        merge_into(&mut self.specs, spec);
    }

    /// Get an include spec by relation name.
    pub fn get(&self, relation: &str) -> Option<&IncludeSpec> {
        self.specs.get(relation)
    }

    /// Check if a relation is included.
    pub fn contains(&self, relation: &str) -> bool {
        self.specs.contains_key(relation)
    }

    /// Get all include specs.
    pub fn specs(&self) -> impl Iterator<Item = &IncludeSpec> {
        self.specs.values()
    }

    /// Check if there are any includes.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Get the number of includes.
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Drop every include.
    pub fn clear(&mut self) {
        self.specs.clear();
    }
}

impl From<IncludeSpec> for Include {
    fn from(spec: IncludeSpec) -> Self {
        Self::new().add(spec)
    }
}

impl FromIterator<IncludeSpec> for Include {
    fn from_iter<T: IntoIterator<Item = IncludeSpec>>(iter: T) -> Self {
        let mut include = Self::new();
        for spec in iter {
            include.push(spec);
        }
        include
    }
}

impl From<IndexMap<SmolStr, IncludeSpec>> for Include {
    fn from(specs: IndexMap<SmolStr, IncludeSpec>) -> Self {
        Self { specs }
    }
}
