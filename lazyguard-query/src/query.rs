//! Lazy query sets over one model.
//!
//! A [`QuerySet`] only describes a query; nothing runs until one of the
//! executing methods (`fetch`, `get`, `first`, `count`, ...) is called.
//! Every execution appends exactly one statement to the client's query
//! log, plus one statement per `prefetch_related` level.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;
use lazyguard_schema::{JoinTable, Model, Relation, RelationKind};
use smol_str::SmolStr;
use tracing::debug;

use crate::client::Client;
use crate::error::{QueryError, QueryResult};
use crate::filter::Filter;
use crate::record::{Record, Related};
use crate::relations::{FetchSpec, FieldSelection, Include, IncludeSpec, LoadStrategy};
use crate::store::Store;
use crate::types::{OrderByField, Row, Value, sql_literal};

/// A computed column added by `annotate`/`alias`.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// A constant value.
    Value(Value),
    /// A copy of another column.
    Field(SmolStr),
}

impl Annotation {
    /// A constant annotation.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// An annotation copying `column`.
    pub fn field(column: impl Into<SmolStr>) -> Self {
        Self::Field(column.into())
    }

    fn evaluate(&self, row: &Row) -> Value {
        match self {
            Self::Value(v) => v.clone(),
            Self::Field(c) => row.get(c.as_str()).cloned().unwrap_or(Value::Null),
        }
    }

    fn to_sql(&self) -> String {
        match self {
            Self::Value(v) => sql_literal(v),
            Self::Field(c) => c.to_string(),
        }
    }
}

/// Truncation used by [`QuerySet::dates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    /// First day of the year.
    Year,
    /// First day of the month.
    Month,
    /// The day itself.
    Day,
}

impl DateKind {
    fn truncate(&self, date: &str) -> Option<String> {
        let year = date.get(..4)?;
        match self {
            Self::Year => Some(format!("{}-01-01", year)),
            Self::Month => Some(format!("{}-01", date.get(..7)?)),
            Self::Day => date.get(..10).map(str::to_string),
        }
    }

    fn as_sql(&self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetOp {
    Union,
    Intersection,
    Difference,
}

impl SetOp {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::Intersection => "INTERSECT",
            Self::Difference => "EXCEPT",
        }
    }
}

/// Restriction to the records linked to one owner through a join table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinkScope {
    join: JoinTable,
    owner: i64,
}

#[derive(Debug, Clone)]
struct Computed {
    annotation: Annotation,
    visible: bool,
}

/// A lazily evaluated query over one model.
#[derive(Debug, Clone)]
pub struct QuerySet {
    client: Client,
    model: SmolStr,
    filter: Filter,
    order_by: Vec<OrderByField>,
    reversed: bool,
    distinct: bool,
    fields: FieldSelection,
    include: Include,
    annotations: IndexMap<SmolStr, Computed>,
    scope: Option<LinkScope>,
    combined: Vec<(SetOp, QuerySet)>,
}

impl QuerySet {
    pub(crate) fn new(client: Client, model: &str) -> Self {
        Self {
            client,
            model: SmolStr::new(model),
            filter: Filter::None,
            order_by: Vec::new(),
            reversed: false,
            distinct: false,
            fields: FieldSelection::All,
            include: Include::new(),
            annotations: IndexMap::new(),
            scope: None,
            combined: Vec::new(),
        }
    }

    /// Name of the queried model.
    pub fn model_name(&self) -> &str {
        self.model.as_str()
    }

    /// The client this query runs against.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The fetch spec records produced by this query will carry.
    pub fn fetch_spec(&self) -> FetchSpec {
        FetchSpec::new(self.fields.clone(), self.include.clone())
    }

    // ============== Refinements ==============

    /// Keep rows matching `filter`.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and_then(filter);
        self
    }

    /// Drop rows matching `filter`.
    pub fn exclude(mut self, filter: Filter) -> Self {
        self.filter = self.filter.and_then(Filter::not(filter));
        self
    }

    /// Replace the ordering. `"-name"` sorts descending.
    pub fn order_by(mut self, fields: &[&str]) -> Self {
        self.order_by = fields.iter().map(|f| OrderByField::parse(f)).collect();
        self
    }

    /// Reverse the ordering.
    pub fn reverse(mut self) -> Self {
        self.reversed = !self.reversed;
        self
    }

    /// Drop duplicate rows.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Load only the named fields (plus the identity).
    pub fn only(mut self, fields: &[&str]) -> Self {
        let columns = self.columns_for(fields);
        self.fields.restrict_to(columns);
        self
    }

    /// Load every field except the named ones.
    pub fn defer(mut self, fields: &[&str]) -> Self {
        let columns = self.columns_for(fields);
        self.fields.defer(columns);
        self
    }

    /// Forward relation names stand for their foreign key column.
    fn columns_for(&self, names: &[&str]) -> Vec<SmolStr> {
        let model = self.client.schema().get_model(&self.model);
        names
            .iter()
            .map(|name| {
                model
                    .and_then(|m| m.get_relation(name))
                    .filter(|r| r.kind.is_forward() && !r.kind.is_many_to_many())
                    .and_then(|r| r.column.clone())
                    .unwrap_or_else(|| SmolStr::new(name))
            })
            .collect()
    }

    /// Join singular relations into the statement. Paths use `__`.
    pub fn select_related(mut self, paths: &[&str]) -> Self {
        for path in paths {
            if let Some(spec) = IncludeSpec::from_path(path, LoadStrategy::Join) {
                self.include.push(spec);
            }
        }
        self
    }

    /// Load relations with one extra statement per level. Paths use `__`.
    pub fn prefetch_related(mut self, paths: &[&str]) -> Self {
        for path in paths {
            if let Some(spec) = IncludeSpec::from_path(path, LoadStrategy::Separate) {
                self.include.push(spec);
            }
        }
        self
    }

    /// Include a relation with a customised spec.
    pub fn prefetch(mut self, spec: IncludeSpec) -> Self {
        self.include.push(spec);
        self
    }

    /// Add a computed column to every returned record.
    pub fn annotate(mut self, name: &str, annotation: Annotation) -> Self {
        self.annotations.insert(
            SmolStr::new(name),
            Computed {
                annotation,
                visible: true,
            },
        );
        self
    }

    /// Add a computed column usable in filters and ordering only.
    pub fn alias(mut self, name: &str, annotation: Annotation) -> Self {
        self.annotations.insert(
            SmolStr::new(name),
            Computed {
                annotation,
                visible: false,
            },
        );
        self
    }

    /// Rows in either query.
    pub fn union(mut self, other: QuerySet) -> Self {
        self.combined.push((SetOp::Union, other));
        self
    }

    /// Rows in both queries.
    pub fn intersection(mut self, other: QuerySet) -> Self {
        self.combined.push((SetOp::Intersection, other));
        self
    }

    /// Rows in this query but not in `other`.
    pub fn difference(mut self, other: QuerySet) -> Self {
        self.combined.push((SetOp::Difference, other));
        self
    }

    pub(crate) fn linked_to(mut self, join: JoinTable, owner: i64) -> Self {
        self.scope = Some(LinkScope { join, owner });
        self
    }

    // ============== Execution ==============

    /// Run the query and build records.
    pub fn fetch(&self) -> QueryResult<Vec<Record>> {
        self.fetch_limited(None)
    }

    /// Exactly one matching record.
    pub fn get(&self) -> QueryResult<Record> {
        let mut records = self.fetch()?;
        match records.len() {
            1 => Ok(records.remove(0)),
            0 => Err(QueryError::not_found(self.model.as_str())),
            _ => Err(QueryError::not_unique(self.model.as_str())),
        }
    }

    /// The first record in the current ordering (identity order by default).
    pub fn first(&self) -> QueryResult<Option<Record>> {
        Ok(self.fetch_limited(Some(1))?.into_iter().next())
    }

    /// The last record in the current ordering.
    pub fn last(&self) -> QueryResult<Option<Record>> {
        self.clone().reverse().first()
    }

    /// Number of matching rows.
    pub fn count(&self) -> QueryResult<usize> {
        let model = self.client.model(&self.model)?;
        let store = self.client.store();
        let rows = self.matching_rows(&store, model)?;
        self.client
            .log(model.name(), self.render_select(model, "COUNT(*)", None, false));
        Ok(self.dedupe(model, rows).len())
    }

    /// Whether any row matches.
    pub fn exists(&self) -> QueryResult<bool> {
        let model = self.client.model(&self.model)?;
        let store = self.client.store();
        let rows = self.matching_rows(&store, model)?;
        self.client
            .log(model.name(), self.render_select(model, "1", Some(1), false));
        Ok(!rows.is_empty())
    }

    /// Matching rows as maps of the named columns (all fields if empty).
    pub fn values(&self, fields: &[&str]) -> QueryResult<Vec<Row>> {
        let model = self.client.model(&self.model)?;
        let columns = self.value_columns(model, fields)?;
        let store = self.client.store();
        let rows = self.matching_rows(&store, model)?;
        self.client.log(
            model.name(),
            self.render_select(model, &columns.join(", "), None, true),
        );

        let mut out: Vec<Row> = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| (c.clone(), row.get(c.as_str()).cloned().unwrap_or(Value::Null)))
                    .collect()
            })
            .collect();
        if self.distinct {
            let mut unique: Vec<Row> = Vec::with_capacity(out.len());
            for row in out {
                if !unique.contains(&row) {
                    unique.push(row);
                }
            }
            out = unique;
        }
        Ok(out)
    }

    /// Matching rows as tuples of the named columns (all fields if empty).
    pub fn values_list(&self, fields: &[&str]) -> QueryResult<Vec<Vec<Value>>> {
        Ok(self
            .values(fields)?
            .into_iter()
            .map(|row| row.into_values().collect())
            .collect())
    }

    /// Records keyed by identity, optionally restricted to `ids`.
    pub fn in_bulk(&self, ids: Option<&[i64]>) -> QueryResult<IndexMap<i64, Record>> {
        let model = self.client.model(&self.model)?;
        let query = match ids {
            Some(ids) => self
                .clone()
                .filter(Filter::in_list(model.pk_name(), ids.iter().copied())),
            None => self.clone(),
        };
        Ok(query
            .fetch()?
            .into_iter()
            .filter_map(|record| record.pk().map(|pk| (pk, record)))
            .collect())
    }

    /// The record with the smallest `field`.
    pub fn earliest(&self, field: &str) -> QueryResult<Record> {
        self.clone()
            .order_by(&[field])
            .first()?
            .ok_or_else(|| QueryError::not_found(self.model.as_str()))
    }

    /// The record with the largest `field`.
    pub fn latest(&self, field: &str) -> QueryResult<Record> {
        let descending = format!("-{}", field);
        self.clone()
            .order_by(&[descending.as_str()])
            .first()?
            .ok_or_else(|| QueryError::not_found(self.model.as_str()))
    }

    /// Distinct truncated dates found in `field` (ISO-8601 strings), ascending.
    pub fn dates(&self, field: &str, kind: DateKind) -> QueryResult<Vec<String>> {
        let model = self.client.model(&self.model)?;
        self.check_column(model, field)?;
        let store = self.client.store();
        let rows = self.matching_rows(&store, model)?;
        self.client.log(
            model.name(),
            self.render_select(
                model,
                &format!("DISTINCT DATE_TRUNC('{}', {})", kind.as_sql(), field),
                None,
                true,
            ),
        );

        let dates: BTreeSet<String> = rows
            .iter()
            .filter_map(|row| row.get(field).and_then(Value::as_str))
            .filter_map(|date| kind.truncate(date))
            .collect();
        Ok(dates.into_iter().collect())
    }

    /// Render the statement `fetch` would run.
    pub fn to_sql(&self) -> QueryResult<String> {
        let model = self.client.model(&self.model)?;
        self.validate(model)?;
        let columns = self.loaded_columns(model).join(", ");
        Ok(self.render_select(model, &columns, None, true))
    }

    fn fetch_limited(&self, limit: Option<usize>) -> QueryResult<Vec<Record>> {
        let model = self.client.model(&self.model)?;
        let store = self.client.store();
        let mut rows = self.matching_rows(&store, model)?;
        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        let columns = self.loaded_columns(model).join(", ");
        self.client
            .log(model.name(), self.render_select(model, &columns, limit, true));

        let pairs: Vec<(Row, Row)> = self
            .dedupe(model, rows)
            .into_iter()
            .map(|row| {
                let mut values = project(model, &self.fields, &row);
                for (name, computed) in &self.annotations {
                    if computed.visible {
                        values.insert(name.clone(), row.get(name.as_str()).cloned().unwrap_or(Value::Null));
                    }
                }
                (row, values)
            })
            .collect();

        debug!(model = model.name(), rows = pairs.len(), "fetched");
        materialize(&self.client, &store, model, pairs, Arc::new(self.fetch_spec()))
    }

    // ============== Internals ==============

    fn check_column(&self, model: &Model, name: &str) -> QueryResult<()> {
        if model.get_field(name).is_some() || self.annotations.contains_key(name) {
            Ok(())
        } else {
            Err(QueryError::unknown_field(model.name(), name))
        }
    }

    fn validate(&self, model: &Model) -> QueryResult<()> {
        for column in self.filter.columns() {
            self.check_column(model, column)?;
        }
        for order in &self.order_by {
            self.check_column(model, &order.column)?;
        }
        for name in self.fields.named() {
            if model.get_field(name).is_none() {
                return Err(QueryError::unknown_field(model.name(), name));
            }
        }
        for computed in self.annotations.values() {
            if let Annotation::Field(column) = &computed.annotation {
                if model.get_field(column).is_none() {
                    return Err(QueryError::unknown_field(model.name(), column.as_str()));
                }
            }
        }
        check_includes(&self.client, model, self.include.specs())
    }

    fn loaded_columns<'m>(&self, model: &'m Model) -> Vec<&'m str> {
        model
            .fields
            .values()
            .filter(|f| is_projected(&self.fields, f.name(), f.is_id()))
            .map(|f| f.name())
            .collect()
    }

    fn value_columns(&self, model: &Model, fields: &[&str]) -> QueryResult<Vec<SmolStr>> {
        if fields.is_empty() {
            let mut columns: Vec<SmolStr> = model.fields.keys().cloned().collect();
            columns.extend(
                self.annotations
                    .iter()
                    .filter(|(_, c)| c.visible)
                    .map(|(name, _)| name.clone()),
            );
            return Ok(columns);
        }
        fields
            .iter()
            .map(|f| self.check_column(model, f).map(|_| SmolStr::new(f)))
            .collect()
    }

    /// Full stored rows (plus computed columns) matching this query, ordered.
    fn matching_rows(&self, store: &Store, model: &Model) -> QueryResult<Vec<Row>> {
        self.validate(model)?;
        let pk = model.pk_name();

        let linked: Option<HashSet<i64>> = self
            .scope
            .as_ref()
            .map(|s| store.linked(&s.join, s.owner).into_iter().collect());

        let mut rows: Vec<Row> = store
            .rows(model.name())
            .filter(|row| {
                linked
                    .as_ref()
                    .is_none_or(|ids| row_pk(row, pk).is_some_and(|id| ids.contains(&id)))
            })
            .map(|row| self.with_annotations(row))
            .filter(|row| self.filter.matches(row))
            .collect();

        for (op, other) in &self.combined {
            if other.model != self.model {
                return Err(QueryError::invalid_input(
                    other.model.as_str(),
                    format!("cannot combine `{}` with `{}`", self.model, other.model),
                ));
            }
            let other_rows = other.matching_rows(store, model)?;
            let ids: HashSet<i64> = other_rows.iter().filter_map(|r| row_pk(r, pk)).collect();
            match op {
                SetOp::Union => {
                    let mine: HashSet<i64> = rows.iter().filter_map(|r| row_pk(r, pk)).collect();
                    rows.extend(
                        other_rows
                            .into_iter()
                            .filter(|r| row_pk(r, pk).is_some_and(|id| !mine.contains(&id))),
                    );
                }
                SetOp::Intersection => {
                    rows.retain(|r| row_pk(r, pk).is_some_and(|id| ids.contains(&id)))
                }
                SetOp::Difference => {
                    rows.retain(|r| row_pk(r, pk).is_none_or(|id| !ids.contains(&id)))
                }
            }
        }

        let mut orders = if self.order_by.is_empty() {
            vec![OrderByField::asc(pk)]
        } else {
            self.order_by.clone()
        };
        if self.reversed {
            orders = orders.iter().map(OrderByField::flipped).collect();
        }
        sort_rows(&mut rows, &orders);

        Ok(rows)
    }

    fn with_annotations(&self, row: &Row) -> Row {
        let mut row = row.clone();
        for (name, computed) in &self.annotations {
            let value = computed.annotation.evaluate(&row);
            row.insert(name.clone(), value);
        }
        row
    }

    fn dedupe(&self, model: &Model, rows: Vec<Row>) -> Vec<Row> {
        if !self.distinct {
            return rows;
        }
        let mut seen: Vec<Row> = Vec::new();
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let key = project(model, &self.fields, &row);
            if !seen.contains(&key) {
                seen.push(key);
                out.push(row);
            }
        }
        out
    }

    fn render_select(
        &self,
        model: &Model,
        columns: &str,
        limit: Option<usize>,
        with_order: bool,
    ) -> String {
        let table = model.table_name();
        let mut sql = format!(
            "SELECT {}{} FROM {}",
            if self.distinct { "DISTINCT " } else { "" },
            columns,
            table
        );

        for spec in self.include.specs().filter(|s| s.strategy == LoadStrategy::Join) {
            if let Some(relation) = model.get_relation(&spec.relation_name) {
                if let Some(remote) = self.client.schema().related_model(relation) {
                    sql.push_str(&join_clause(model, relation, remote));
                }
            }
        }

        let mut conditions = Vec::new();
        if let Some(scope) = &self.scope {
            sql.push_str(&format!(
                " INNER JOIN {jt} ON {jt}.{target} = {table}.{pk}",
                jt = scope.join.table_name,
                target = scope.join.target_column,
                pk = model.pk_name(),
            ));
            conditions.push(format!(
                "{}.{} = {}",
                scope.join.table_name, scope.join.source_column, scope.owner
            ));
        }
        if !self.annotations.is_empty() {
            let computed: Vec<_> = self
                .annotations
                .iter()
                .map(|(name, c)| format!("{} AS {}", c.annotation.to_sql(), name))
                .collect();
            sql = sql.replacen(" FROM ", &format!(", {} FROM ", computed.join(", ")), 1);
        }
        if !self.filter.is_none() {
            conditions.push(self.filter.to_sql());
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }

        for (op, other) in &self.combined {
            let other_columns = other.loaded_columns(model).join(", ");
            sql.push_str(&format!(
                " {} ({})",
                op.as_sql(),
                other.render_select(model, &other_columns, None, false)
            ));
        }

        if with_order {
            let mut orders = if self.order_by.is_empty() {
                vec![OrderByField::asc(model.pk_name())]
            } else {
                self.order_by.clone()
            };
            if self.reversed {
                orders = orders.iter().map(OrderByField::flipped).collect();
            }
            let rendered: Vec<_> = orders.iter().map(OrderByField::to_sql).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&rendered.join(", "));
        }
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        sql
    }
}

fn row_pk(row: &Row, pk: &str) -> Option<i64> {
    row.get(pk).and_then(Value::as_i64)
}

fn sort_rows(rows: &mut [Row], orders: &[OrderByField]) {
    rows.sort_by(|a, b| {
        orders
            .iter()
            .map(|o| o.compare(a, b))
            .find(|o| o.is_ne())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn is_projected(fields: &FieldSelection, name: &str, is_id: bool) -> bool {
    match fields {
        FieldSelection::Only(_) if is_id => true,
        _ => fields.includes(name),
    }
}

/// The values a record keeps from a full stored row.
fn project(model: &Model, fields: &FieldSelection, row: &Row) -> Row {
    model
        .fields
        .values()
        .filter(|f| is_projected(fields, f.name(), f.is_id()))
        .map(|f| {
            (
                f.name.clone(),
                row.get(f.name()).cloned().unwrap_or(Value::Null),
            )
        })
        .collect()
}

fn join_clause(model: &Model, relation: &Relation, remote: &Model) -> String {
    let column = relation.column_name().unwrap_or_default();
    if relation.kind.is_forward() {
        format!(
            " LEFT JOIN {rt} ON {rt}.{rpk} = {t}.{col}",
            rt = remote.table_name(),
            rpk = remote.pk_name(),
            t = model.table_name(),
            col = column,
        )
    } else {
        format!(
            " LEFT JOIN {rt} ON {rt}.{col} = {t}.{pk}",
            rt = remote.table_name(),
            col = column,
            t = model.table_name(),
            pk = model.pk_name(),
        )
    }
}

/// Full rows of `remote` related to one owner row, in link/identity order.
pub(crate) fn related_rows(
    store: &Store,
    model: &Model,
    relation: &Relation,
    remote: &Model,
    owner: &Row,
) -> Vec<Row> {
    let owner_pk = row_pk(owner, model.pk_name());
    let column = relation.column_name().unwrap_or_default();

    match relation.kind {
        RelationKind::ForwardManyToOne | RelationKind::ForwardOneToOne => owner
            .get(column)
            .and_then(Value::as_i64)
            .and_then(|fk| store.get(remote.name(), fk))
            .cloned()
            .into_iter()
            .collect(),
        RelationKind::ReverseOneToOne | RelationKind::ReverseManyToOne => match owner_pk {
            Some(pk) => store
                .rows(remote.name())
                .filter(|row| row.get(column).and_then(Value::as_i64) == Some(pk))
                .cloned()
                .collect(),
            None => Vec::new(),
        },
        RelationKind::ManyToMany | RelationKind::ReverseManyToMany => {
            match (owner_pk, relation.join_table.as_ref()) {
                (Some(pk), Some(join)) => store
                    .linked(join, pk)
                    .into_iter()
                    .filter_map(|id| store.get(remote.name(), id).cloned())
                    .collect(),
                _ => Vec::new(),
            }
        }
    }
}

fn validate_include(model: &Model, relation: &Relation, include: &IncludeSpec, remote: &Model) -> QueryResult<()> {
    match include.strategy {
        LoadStrategy::Join if relation.kind.is_plural() => {
            return Err(QueryError::invalid_select(
                model.name(),
                relation.name(),
                "`select_related` follows singular relations only; use `prefetch_related`",
            ));
        }
        LoadStrategy::Separate if relation.kind.is_one_to_one() => {
            return Err(QueryError::invalid_select(
                model.name(),
                relation.name(),
                "one-to-one relations are loaded with `select_related`",
            ));
        }
        _ => {}
    }

    for name in include.fields.named() {
        if remote.get_field(name).is_none() {
            return Err(QueryError::unknown_field(remote.name(), name));
        }
    }
    for column in include.filter.columns() {
        if remote.get_field(column).is_none() {
            return Err(QueryError::unknown_field(remote.name(), column));
        }
    }
    Ok(())
}

fn check_includes<'a>(
    client: &Client,
    model: &Model,
    includes: impl Iterator<Item = &'a IncludeSpec>,
) -> QueryResult<()> {
    for include in includes {
        let relation = model
            .get_relation(&include.relation_name)
            .ok_or_else(|| QueryError::unknown_field(model.name(), include.relation_name.as_str()))?;
        let remote = client.model(&relation.related_model)?;
        validate_include(model, relation, include, remote)?;
        check_includes(client, remote, include.nested.values())?;
    }
    Ok(())
}

fn render_prefetch(
    model: &Model,
    relation: &Relation,
    remote: &Model,
    include: &IncludeSpec,
    owners: &[Row],
) -> String {
    let columns: Vec<_> = remote
        .fields
        .values()
        .filter(|f| is_projected(&include.fields, f.name(), f.is_id()))
        .map(|f| format!("{}.{}", remote.table_name(), f.name()))
        .collect();
    let column = relation.column_name().unwrap_or_default();
    let pk = model.pk_name();

    let keys = |key: &str| -> String {
        let mut seen = Vec::new();
        for row in owners {
            if let Some(v) = row.get(key) {
                if !v.is_null() && !seen.contains(v) {
                    seen.push(v.clone());
                }
            }
        }
        seen.iter().map(sql_literal).collect::<Vec<_>>().join(", ")
    };

    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), remote.table_name());
    let condition = match (&relation.kind, relation.join_table.as_ref()) {
        (RelationKind::ForwardManyToOne | RelationKind::ForwardOneToOne, _) => {
            format!("{}.{} IN ({})", remote.table_name(), remote.pk_name(), keys(column))
        }
        (RelationKind::ManyToMany | RelationKind::ReverseManyToMany, Some(join)) => {
            sql.push_str(&format!(
                " INNER JOIN {jt} ON {jt}.{target} = {rt}.{rpk}",
                jt = join.table_name,
                target = join.target_column,
                rt = remote.table_name(),
                rpk = remote.pk_name(),
            ));
            format!("{}.{} IN ({})", join.table_name, join.source_column, keys(pk))
        }
        _ => format!("{}.{} IN ({})", remote.table_name(), column, keys(pk)),
    };
    sql.push_str(" WHERE ");
    sql.push_str(&condition);
    if !include.filter.is_none() {
        sql.push_str(" AND ");
        sql.push_str(&include.filter.to_sql());
    }
    sql
}

/// Build records from `(full row, loaded values)` pairs, resolving includes.
///
/// Joined relations are read from the same statement; each prefetched
/// relation costs one statement for the whole batch.
pub(crate) fn materialize(
    client: &Client,
    store: &Store,
    model: &Model,
    rows: Vec<(Row, Row)>,
    spec: Arc<FetchSpec>,
) -> QueryResult<Vec<Record>> {
    let mut related: Vec<IndexMap<SmolStr, Related>> =
        std::iter::repeat_with(IndexMap::new).take(rows.len()).collect();

    for include in spec.include.specs() {
        let relation = model
            .get_relation(&include.relation_name)
            .ok_or_else(|| QueryError::unknown_field(model.name(), include.relation_name.as_str()))?;
        let remote = client.model(&relation.related_model)?;

        if include.strategy == LoadStrategy::Separate && !rows.is_empty() {
            let owners: Vec<Row> = rows.iter().map(|(full, _)| full.clone()).collect();
            client.log(
                remote.name(),
                render_prefetch(model, relation, remote, include, &owners),
            );
        }

        let mut batch: Vec<(Row, Row)> = Vec::new();
        let mut owner_of: Vec<usize> = Vec::new();
        for (i, (full, _)) in rows.iter().enumerate() {
            let mut children = related_rows(store, model, relation, remote, full);
            if include.strategy == LoadStrategy::Separate {
                children.retain(|r| include.filter.matches(r));
                if !include.order_by.is_empty() {
                    sort_rows(&mut children, &include.order_by);
                }
            }
            for child in children {
                owner_of.push(i);
                let values = project(remote, &include.fields, &child);
                batch.push((child, values));
            }
        }

        let children = materialize(
            client,
            store,
            remote,
            batch,
            Arc::new(FetchSpec::for_include(include)),
        )?;

        if relation.kind.is_plural() {
            let mut groups: Vec<Vec<Record>> =
                std::iter::repeat_with(Vec::new).take(rows.len()).collect();
            for (owner, child) in owner_of.into_iter().zip(children) {
                groups[owner].push(child);
            }
            for (slot, group) in related.iter_mut().zip(groups) {
                slot.insert(relation.name.clone(), Related::Many(group));
            }
        } else {
            let mut singles: Vec<Option<Box<Record>>> =
                std::iter::repeat_with(|| None).take(rows.len()).collect();
            for (owner, child) in owner_of.into_iter().zip(children) {
                singles[owner] = Some(Box::new(child));
            }
            for (slot, single) in related.iter_mut().zip(singles) {
                slot.insert(relation.name.clone(), Related::One(single));
            }
        }
    }

    Ok(rows
        .into_iter()
        .zip(related)
        .map(|((_, values), related)| {
            Record::fetched(client.clone(), model.name.clone(), values, spec.clone(), related)
        })
        .collect())
}
