//! The guarded manager proxy.
//!
//! [`GuardedManager`] forwards every [`RelationManager`] call to the host
//! manager. A fixed set of methods is intercepted first:
//!
//! - `all()` on a collection that was not prefetched is denied;
//! - refinements on a collection that was prefetched are blocked, since
//!   they would run a fresh query and ignore the prefetched objects.
//!
//! `first()` and `last()` are known gaps and always pass. Set algebra and
//! `dates()` are never guarded.

use indexmap::IndexMap;
use lazyguard_schema::Relation;
use tracing::{debug, trace};

use super::gate::GuardCategory;
use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::manager::{RelatedManager, RelationManager};
use crate::query::{Annotation, DateKind, QuerySet};
use crate::record::Record;
use crate::types::{Row, Value};

/// How a manager method is treated by the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodClass {
    /// Materializes the collection.
    Read,
    /// Answered from the prefetch cache when there is one.
    Aggregate,
    /// Positional reads; not guarded.
    Positional,
    /// Builds a fresh query; blocked on prefetched collections.
    Refinement,
    /// Never guarded.
    SetAlgebra,
    /// Never guarded.
    DateBucket,
}

/// Every method of [`RelationManager`] that reaches the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerMethod {
    /// `all()`.
    All,
    /// `count()`.
    Count,
    /// `exists()`.
    Exists,
    /// `first()`.
    First,
    /// `last()`.
    Last,
    /// `filter(...)`.
    Filter,
    /// `exclude(...)`.
    Exclude,
    /// `annotate(...)`.
    Annotate,
    /// `alias(...)`.
    Alias,
    /// `order_by(...)`.
    OrderBy,
    /// `reverse()`.
    Reverse,
    /// `distinct()`.
    Distinct,
    /// `only(...)`.
    Only,
    /// `defer(...)`.
    Defer,
    /// `select_related(...)`.
    SelectRelated,
    /// `prefetch_related(...)`.
    PrefetchRelated,
    /// `values(...)`.
    Values,
    /// `values_list(...)`.
    ValuesList,
    /// `in_bulk(...)`.
    InBulk,
    /// `earliest(...)`.
    Earliest,
    /// `latest(...)`.
    Latest,
    /// `union(...)`.
    Union,
    /// `intersection(...)`.
    Intersection,
    /// `difference(...)`.
    Difference,
    /// `dates(...)`.
    Dates,
}

impl ManagerMethod {
    /// How the proxy treats this method.
    pub fn class(&self) -> MethodClass {
        match self {
            Self::All => MethodClass::Read,
            Self::Count | Self::Exists => MethodClass::Aggregate,
            Self::First | Self::Last => MethodClass::Positional,
            Self::Union | Self::Intersection | Self::Difference => MethodClass::SetAlgebra,
            Self::Dates => MethodClass::DateBucket,
            _ => MethodClass::Refinement,
        }
    }

    /// Method name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Count => "count",
            Self::Exists => "exists",
            Self::First => "first",
            Self::Last => "last",
            Self::Filter => "filter",
            Self::Exclude => "exclude",
            Self::Annotate => "annotate",
            Self::Alias => "alias",
            Self::OrderBy => "order_by",
            Self::Reverse => "reverse",
            Self::Distinct => "distinct",
            Self::Only => "only",
            Self::Defer => "defer",
            Self::SelectRelated => "select_related",
            Self::PrefetchRelated => "prefetch_related",
            Self::Values => "values",
            Self::ValuesList => "values_list",
            Self::InBulk => "in_bulk",
            Self::Earliest => "earliest",
            Self::Latest => "latest",
            Self::Union => "union",
            Self::Intersection => "intersection",
            Self::Difference => "difference",
            Self::Dates => "dates",
        }
    }

    /// The call as shown in messages.
    pub fn call(&self) -> String {
        match self {
            Self::All | Self::Count | Self::Exists | Self::First | Self::Last | Self::Reverse => {
                format!("{}()", self.name())
            }
            _ => format!("{}(...)", self.name()),
        }
    }

    /// `(label, code)` hints offered when this method is blocked.
    pub fn alternatives(&self, owner: &str, relation: &str, remote: &str) -> Vec<(String, String)> {
        let o = owner.to_lowercase();
        let r = remote.to_lowercase();
        let cached = format!("{o}.manager(\"{relation}\")?.all()?");
        let fresh = format!("{o}.unguarded().manager(\"{relation}\")?");

        match self {
            Self::Filter => vec![
                (
                    "Filter existing objects in memory with:".into(),
                    format!("{cached}.into_iter().filter(|{r}| ...)"),
                ),
                (
                    "Filter new objects from the database with:".into(),
                    format!("{fresh}.filter(...)"),
                ),
            ],
            Self::Exclude => vec![
                (
                    "Exclude existing objects in memory with:".into(),
                    format!("{cached}.into_iter().filter(|{r}| !...)"),
                ),
                (
                    "Exclude new objects from the database with:".into(),
                    format!("{fresh}.exclude(...)"),
                ),
            ],
            Self::Annotate => vec![
                (
                    "Annotate existing objects in memory with:".into(),
                    format!("for {r} in {cached} {{ ... }}"),
                ),
                (
                    "Annotate new objects from the database with:".into(),
                    format!("{fresh}.annotate(...)"),
                ),
            ],
            Self::Earliest => vec![
                (
                    format!("Fetch the earliest existing `{remote}` in memory with:"),
                    format!("{cached}.into_iter().min_by_key(|{r}| ...)"),
                ),
                (
                    format!("Fetch the earliest `{remote}` from the database with:"),
                    format!("{fresh}.earliest(...)"),
                ),
            ],
            Self::Latest => vec![
                (
                    format!("Fetch the latest existing `{remote}` in memory with:"),
                    format!("{cached}.into_iter().max_by_key(|{r}| ...)"),
                ),
                (
                    format!("Fetch the latest `{remote}` from the database with:"),
                    format!("{fresh}.latest(...)"),
                ),
            ],
            Self::InBulk => vec![
                (
                    format!("Convert the existing in memory `{remote}` records with:"),
                    format!(
                        "{cached}.into_iter().filter_map(|{r}| Some(({r}.pk()?, {r}))).collect::<IndexMap<_, _>>()"
                    ),
                ),
                (
                    format!("Fetch `{remote}` records from the database with:"),
                    format!("{fresh}.in_bulk(None)"),
                ),
            ],
            Self::Only | Self::Defer => vec![(
                format!("You already have `{remote}` records in memory."),
                String::new(),
            )],
            Self::Reverse => vec![
                (
                    format!("Convert the existing in memory `{remote}` records with:"),
                    format!("{cached}.into_iter().rev()"),
                ),
                (
                    format!("Fetch `{remote}` records from the database with:"),
                    format!("{fresh}.reverse()"),
                ),
            ],
            Self::Values => vec![
                (
                    format!("Convert the existing in memory `{remote}` records with:"),
                    format!("{cached}.iter().map(|{r}| {r}.values().clone())"),
                ),
                (
                    format!("Fetch `{remote}` rows from the database with:"),
                    format!("{fresh}.values(&[...])"),
                ),
            ],
            Self::ValuesList => vec![
                (
                    format!("Convert the existing in memory `{remote}` records with:"),
                    format!("{cached}.iter().map(|{r}| ({r}.get(...)?, ...))"),
                ),
                (
                    format!("Fetch `{remote}` rows from the database with:"),
                    format!("{fresh}.values_list(&[...])"),
                ),
            ],
            Self::OrderBy => vec![
                (
                    format!("Sort the existing in memory `{remote}` records with:"),
                    format!("let mut {r}s = {cached};\n{r}s.sort_by_key(|{r}| ...);"),
                ),
                (
                    format!("Fetch ordered `{remote}` records from the database with:"),
                    format!("{fresh}.order_by(&[...])"),
                ),
            ],
            Self::SelectRelated => vec![(
                "Update your `prefetch_related` to use:".into(),
                format!("prefetch(IncludeSpec::prefetch(\"{relation}\").include(IncludeSpec::join(...)))"),
            )],
            Self::PrefetchRelated => vec![(
                "Update your `prefetch_related` to use:".into(),
                format!("prefetch_related(&[\"{relation}\", \"{relation}__...\"])"),
            )],
            _ => Vec::new(),
        }
    }
}

/// A [`RelatedManager`] behind the collection guard.
#[derive(Debug)]
pub struct GuardedManager<'a> {
    inner: RelatedManager<'a>,
}

impl<'a> GuardedManager<'a> {
    /// Wrap a host manager.
    pub fn new(inner: RelatedManager<'a>) -> Self {
        Self { inner }
    }

    /// The wrapped manager.
    pub fn into_inner(self) -> RelatedManager<'a> {
        self.inner
    }

    fn guard(&self, method: ManagerMethod) -> QueryResult<()> {
        let owner = self.inner.owner();
        let Some(state) = owner.load_state() else {
            return Ok(());
        };
        let settings = owner.client().settings();
        if !GuardCategory::RelationReverseFields.is_enabled(settings) {
            return Ok(());
        }

        let relation = self.inner.relation();
        let err = match (method.class(), self.inner.is_prefetched()) {
            (MethodClass::Read, false) => QueryError::missing_reverse_relation_field(
                owner.model_name(),
                relation.name(),
                relation.related_model.as_str(),
                &state.prefetched(),
            ),
            (MethodClass::Refinement, true) => QueryError::blocked_method(
                owner.model_name(),
                relation.name(),
                &method.call(),
                &method.alternatives(owner.model_name(), relation.name(), &relation.related_model),
            ),
            _ => {
                trace!(
                    model = owner.model_name(),
                    relation = relation.name(),
                    method = method.name(),
                    "manager call allowed"
                );
                return Ok(());
            }
        };

        if settings.log_denials() {
            debug!(
                model = owner.model_name(),
                relation = relation.name(),
                method = method.name(),
                code = %err.code.code(),
                "manager call denied"
            );
        }
        Err(err)
    }
}

impl RelationManager for GuardedManager<'_> {
    fn owner(&self) -> &Record {
        self.inner.owner()
    }

    fn relation(&self) -> &Relation {
        self.inner.relation()
    }

    fn is_prefetched(&self) -> bool {
        self.inner.is_prefetched()
    }

    fn all(&self) -> QueryResult<Vec<Record>> {
        self.guard(ManagerMethod::All)?;
        self.inner.all()
    }

    fn count(&self) -> QueryResult<usize> {
        self.guard(ManagerMethod::Count)?;
        self.inner.count()
    }

    fn exists(&self) -> QueryResult<bool> {
        self.guard(ManagerMethod::Exists)?;
        self.inner.exists()
    }

    fn first(&self) -> QueryResult<Option<Record>> {
        self.guard(ManagerMethod::First)?;
        self.inner.first()
    }

    fn last(&self) -> QueryResult<Option<Record>> {
        self.guard(ManagerMethod::Last)?;
        self.inner.last()
    }

    fn filter(&self, filter: Filter) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::Filter)?;
        self.inner.filter(filter)
    }

    fn exclude(&self, filter: Filter) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::Exclude)?;
        self.inner.exclude(filter)
    }

    fn annotate(&self, name: &str, annotation: Annotation) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::Annotate)?;
        self.inner.annotate(name, annotation)
    }

    fn alias(&self, name: &str, annotation: Annotation) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::Alias)?;
        self.inner.alias(name, annotation)
    }

    fn order_by(&self, fields: &[&str]) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::OrderBy)?;
        self.inner.order_by(fields)
    }

    fn reverse(&self) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::Reverse)?;
        self.inner.reverse()
    }

    fn distinct(&self) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::Distinct)?;
        self.inner.distinct()
    }

    fn only(&self, fields: &[&str]) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::Only)?;
        self.inner.only(fields)
    }

    fn defer(&self, fields: &[&str]) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::Defer)?;
        self.inner.defer(fields)
    }

    fn select_related(&self, paths: &[&str]) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::SelectRelated)?;
        self.inner.select_related(paths)
    }

    fn prefetch_related(&self, paths: &[&str]) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::PrefetchRelated)?;
        self.inner.prefetch_related(paths)
    }

    fn values(&self, fields: &[&str]) -> QueryResult<Vec<Row>> {
        self.guard(ManagerMethod::Values)?;
        self.inner.values(fields)
    }

    fn values_list(&self, fields: &[&str]) -> QueryResult<Vec<Vec<Value>>> {
        self.guard(ManagerMethod::ValuesList)?;
        self.inner.values_list(fields)
    }

    fn in_bulk(&self, ids: Option<&[i64]>) -> QueryResult<IndexMap<i64, Record>> {
        self.guard(ManagerMethod::InBulk)?;
        self.inner.in_bulk(ids)
    }

    fn earliest(&self, field: &str) -> QueryResult<Record> {
        self.guard(ManagerMethod::Earliest)?;
        self.inner.earliest(field)
    }

    fn latest(&self, field: &str) -> QueryResult<Record> {
        self.guard(ManagerMethod::Latest)?;
        self.inner.latest(field)
    }

    fn union(&self, other: QuerySet) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::Union)?;
        self.inner.union(other)
    }

    fn intersection(&self, other: QuerySet) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::Intersection)?;
        self.inner.intersection(other)
    }

    fn difference(&self, other: QuerySet) -> QueryResult<QuerySet> {
        self.guard(ManagerMethod::Difference)?;
        self.inner.difference(other)
    }

    fn dates(&self, field: &str, kind: DateKind) -> QueryResult<Vec<String>> {
        self.guard(ManagerMethod::Dates)?;
        self.inner.dates(field, kind)
    }
}
