//! Managers for plural relations.
//!
//! `record.manager("users")` hands out a [`RelationManager`]. The host
//! implementation, [`RelatedManager`], answers `all`/`count`/`exists`
//! from the prefetched collection when there is one and builds a
//! [`QuerySet`] scoped to the owner for everything else.

use std::fmt;

use indexmap::IndexMap;
use lazyguard_schema::{Relation, RelationKind};

use crate::error::{ErrorCode, QueryError, QueryResult};
use crate::filter::Filter;
use crate::query::{Annotation, DateKind, QuerySet};
use crate::record::Record;
use crate::types::{Row, Value};

/// Operations available on the manager of a plural relation.
pub trait RelationManager: fmt::Debug {
    /// The record owning the relation.
    fn owner(&self) -> &Record;
    /// The relation being managed.
    fn relation(&self) -> &Relation;
    /// Whether the owner's fetch prefetched this relation.
    fn is_prefetched(&self) -> bool;

    /// Every related record.
    fn all(&self) -> QueryResult<Vec<Record>>;
    /// Number of related records.
    fn count(&self) -> QueryResult<usize>;
    /// Whether there is any related record.
    fn exists(&self) -> QueryResult<bool>;
    /// The first related record in identity order.
    fn first(&self) -> QueryResult<Option<Record>>;
    /// The last related record in identity order.
    fn last(&self) -> QueryResult<Option<Record>>;

    /// Related records matching `filter`.
    fn filter(&self, filter: Filter) -> QueryResult<QuerySet>;
    /// Related records not matching `filter`.
    fn exclude(&self, filter: Filter) -> QueryResult<QuerySet>;
    /// Related records with a computed column.
    fn annotate(&self, name: &str, annotation: Annotation) -> QueryResult<QuerySet>;
    /// Related records with a computed column usable in filters only.
    fn alias(&self, name: &str, annotation: Annotation) -> QueryResult<QuerySet>;
    /// Related records in the given order.
    fn order_by(&self, fields: &[&str]) -> QueryResult<QuerySet>;
    /// Related records in reversed order.
    fn reverse(&self) -> QueryResult<QuerySet>;
    /// Related records without duplicates.
    fn distinct(&self) -> QueryResult<QuerySet>;
    /// Related records loading just `fields` and the identity.
    fn only(&self, fields: &[&str]) -> QueryResult<QuerySet>;
    /// Related records loading everything except `fields`.
    fn defer(&self, fields: &[&str]) -> QueryResult<QuerySet>;
    /// Related records with singular relations joined.
    fn select_related(&self, paths: &[&str]) -> QueryResult<QuerySet>;
    /// Related records with relations prefetched.
    fn prefetch_related(&self, paths: &[&str]) -> QueryResult<QuerySet>;
    /// Related rows as column maps.
    fn values(&self, fields: &[&str]) -> QueryResult<Vec<Row>>;
    /// Related rows as value tuples.
    fn values_list(&self, fields: &[&str]) -> QueryResult<Vec<Vec<Value>>>;
    /// Related records keyed by identity.
    fn in_bulk(&self, ids: Option<&[i64]>) -> QueryResult<IndexMap<i64, Record>>;
    /// The related record with the smallest `field`.
    fn earliest(&self, field: &str) -> QueryResult<Record>;
    /// The related record with the largest `field`.
    fn latest(&self, field: &str) -> QueryResult<Record>;

    /// Related records plus those of `other`.
    fn union(&self, other: QuerySet) -> QueryResult<QuerySet>;
    /// Related records also in `other`.
    fn intersection(&self, other: QuerySet) -> QueryResult<QuerySet>;
    /// Related records not in `other`.
    fn difference(&self, other: QuerySet) -> QueryResult<QuerySet>;
    /// Distinct truncated dates of `field`.
    fn dates(&self, field: &str, kind: DateKind) -> QueryResult<Vec<String>>;
}

/// The mapping layer's own manager.
#[derive(Debug, Clone, Copy)]
pub struct RelatedManager<'a> {
    owner: &'a Record,
    relation: &'a Relation,
    prefetched: Option<&'a [Record]>,
}

impl<'a> RelatedManager<'a> {
    pub(crate) fn new(
        owner: &'a Record,
        relation: &'a Relation,
        prefetched: Option<&'a [Record]>,
    ) -> Self {
        Self {
            owner,
            relation,
            prefetched,
        }
    }

    /// The prefetched collection, if any.
    pub fn prefetched(&self) -> Option<&'a [Record]> {
        self.prefetched
    }

    /// A query over the owner's related records.
    pub fn queryset(&self) -> QueryResult<QuerySet> {
        let client = self.owner.client();
        let model = self.owner.model()?;
        let pk = self.owner.pk().ok_or_else(|| {
            QueryError::new(
                ErrorCode::RequiredFieldMissing,
                format!(
                    "`{}` was loaded without `{}`; cannot query `{}`",
                    model.name(),
                    model.pk_name(),
                    self.relation.name()
                ),
            )
            .with_model(model.name())
            .with_field(self.relation.name())
        })?;

        let query = client.query(&self.relation.related_model);
        match (&self.relation.kind, &self.relation.join_table) {
            (RelationKind::ManyToMany | RelationKind::ReverseManyToMany, Some(join)) => {
                Ok(query.linked_to(join.clone(), pk))
            }
            (RelationKind::ReverseManyToOne | RelationKind::ReverseOneToOne, _) => {
                let column = self.relation.column_name().unwrap_or_default();
                Ok(query.filter(Filter::equals(column, pk)))
            }
            _ => Err(QueryError::internal(format!(
                "`{}.{}` has no collection manager",
                model.name(),
                self.relation.name()
            ))),
        }
    }
}

impl RelationManager for RelatedManager<'_> {
    fn owner(&self) -> &Record {
        self.owner
    }

    fn relation(&self) -> &Relation {
        self.relation
    }

    fn is_prefetched(&self) -> bool {
        self.prefetched.is_some()
    }

    fn all(&self) -> QueryResult<Vec<Record>> {
        match self.prefetched {
            Some(records) => Ok(records.to_vec()),
            None => self.queryset()?.fetch(),
        }
    }

    fn count(&self) -> QueryResult<usize> {
        match self.prefetched {
            Some(records) => Ok(records.len()),
            None => self.queryset()?.count(),
        }
    }

    fn exists(&self) -> QueryResult<bool> {
        match self.prefetched {
            Some(records) => Ok(!records.is_empty()),
            None => self.queryset()?.exists(),
        }
    }

    fn first(&self) -> QueryResult<Option<Record>> {
        self.queryset()?.first()
    }

    fn last(&self) -> QueryResult<Option<Record>> {
        self.queryset()?.last()
    }

    fn filter(&self, filter: Filter) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.filter(filter))
    }

    fn exclude(&self, filter: Filter) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.exclude(filter))
    }

    fn annotate(&self, name: &str, annotation: Annotation) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.annotate(name, annotation))
    }

    fn alias(&self, name: &str, annotation: Annotation) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.alias(name, annotation))
    }

    fn order_by(&self, fields: &[&str]) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.order_by(fields))
    }

    fn reverse(&self) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.reverse())
    }

    fn distinct(&self) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.distinct())
    }

    fn only(&self, fields: &[&str]) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.only(fields))
    }

    fn defer(&self, fields: &[&str]) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.defer(fields))
    }

    fn select_related(&self, paths: &[&str]) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.select_related(paths))
    }

    fn prefetch_related(&self, paths: &[&str]) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.prefetch_related(paths))
    }

    fn values(&self, fields: &[&str]) -> QueryResult<Vec<Row>> {
        self.queryset()?.values(fields)
    }

    fn values_list(&self, fields: &[&str]) -> QueryResult<Vec<Vec<Value>>> {
        self.queryset()?.values_list(fields)
    }

    fn in_bulk(&self, ids: Option<&[i64]>) -> QueryResult<IndexMap<i64, Record>> {
        self.queryset()?.in_bulk(ids)
    }

    fn earliest(&self, field: &str) -> QueryResult<Record> {
        self.queryset()?.earliest(field)
    }

    fn latest(&self, field: &str) -> QueryResult<Record> {
        self.queryset()?.latest(field)
    }

    fn union(&self, other: QuerySet) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.union(other))
    }

    fn intersection(&self, other: QuerySet) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.intersection(other))
    }

    fn difference(&self, other: QuerySet) -> QueryResult<QuerySet> {
        Ok(self.queryset()?.difference(other))
    }

    fn dates(&self, field: &str, kind: DateKind) -> QueryResult<Vec<String>> {
        self.queryset()?.dates(field, kind)
    }
}
