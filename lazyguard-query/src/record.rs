//! Records produced by the mapping layer.
//!
//! A [`Record`] remembers how it was produced ([`Origin`]) and carries the
//! objects its fetch loaded eagerly. Field and relation reads go through
//! the installed [`AccessGuard`](crate::hook::AccessGuard) first; without a
//! guard, anything not loaded is fetched lazily with one statement per
//! access.

use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use lazyguard_schema::{Model, Relation, RelationKind};
use smol_str::SmolStr;
use tracing::trace;

use crate::client::Client;
use crate::error::{ErrorCode, QueryError, QueryResult};
use crate::filter::Filter;
use crate::guard::LoadState;
use crate::hook;
use crate::manager::{RelatedManager, RelationManager};
use crate::relations::{FetchSpec, FieldSelection};
use crate::types::{Row, Value};

/// How a record came to exist.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    /// Built by `Client::insert`; every column is known.
    Created,
    /// Produced by a fetch with this spec.
    Fetched(Arc<FetchSpec>),
}

/// An eagerly loaded relation.
#[derive(Debug, Clone)]
pub enum Related {
    /// A singular relation; `None` when there is no related row.
    One(Option<Box<Record>>),
    /// A prefetched collection.
    Many(Vec<Record>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Guarded,
    Escaped,
}

impl Access {
    fn guard(self) -> Option<&'static dyn hook::AccessGuard> {
        match self {
            Self::Guarded => hook::installed(),
            Self::Escaped => None,
        }
    }
}

/// A row of one model.
#[derive(Clone)]
pub struct Record {
    client: Client,
    model: SmolStr,
    values: Row,
    origin: Origin,
    related: IndexMap<SmolStr, Related>,
    load_state: Option<LoadState>,
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.model)
            .field("values", &self.values)
            .field("origin", &self.origin)
            .field("related", &self.related.keys().collect::<Vec<_>>())
            .field("load_state", &self.load_state)
            .finish()
    }
}

impl Record {
    pub(crate) fn created(client: Client, model: SmolStr, values: Row) -> Self {
        Self::construct(client, model, values, Origin::Created, IndexMap::new())
    }

    pub(crate) fn fetched(
        client: Client,
        model: SmolStr,
        values: Row,
        spec: Arc<FetchSpec>,
        related: IndexMap<SmolStr, Related>,
    ) -> Self {
        Self::construct(client, model, values, Origin::Fetched(spec), related)
    }

    fn construct(
        client: Client,
        model: SmolStr,
        values: Row,
        origin: Origin,
        related: IndexMap<SmolStr, Related>,
    ) -> Self {
        let mut record = Self {
            client,
            model,
            values,
            origin,
            related,
            load_state: None,
        };
        record.load_state = hook::installed().and_then(|guard| guard.on_construct(&record));
        record
    }

    /// Name of the record's model.
    pub fn model_name(&self) -> &str {
        self.model.as_str()
    }

    /// The model metadata.
    pub fn model(&self) -> QueryResult<&Model> {
        self.client.model(&self.model)
    }

    /// The client the record was produced by.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Loaded column values (plus visible annotations).
    pub fn values(&self) -> &Row {
        &self.values
    }

    /// The identity value, if it was loaded.
    pub fn pk(&self) -> Option<i64> {
        let model = self.model().ok()?;
        self.values.get(model.pk_name()).and_then(Value::as_i64)
    }

    /// How the record was produced.
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// The fetch spec, for fetched records.
    pub fn fetch_spec(&self) -> Option<&FetchSpec> {
        match &self.origin {
            Origin::Fetched(spec) => Some(spec),
            Origin::Created => None,
        }
    }

    /// Check if the record was created rather than fetched.
    pub fn is_created(&self) -> bool {
        matches!(self.origin, Origin::Created)
    }

    /// The load state attached at construction, if a guard is installed.
    pub fn load_state(&self) -> Option<&LoadState> {
        self.load_state.as_ref()
    }

    /// The eagerly loaded relation `name`, if any.
    pub fn cached(&self, name: &str) -> Option<&Related> {
        self.related.get(name)
    }

    /// Names of eagerly loaded relations.
    pub fn cached_relations(&self) -> impl Iterator<Item = &str> {
        self.related.keys().map(|k| k.as_str())
    }

    /// Read a field (or an annotation).
    pub fn get(&self, name: &str) -> QueryResult<Value> {
        self.read_field(name, Access::Guarded)
    }

    /// Follow a singular relation.
    pub fn related(&self, name: &str) -> QueryResult<Option<Record>> {
        self.read_related(name, Access::Guarded)
    }

    /// The manager of a plural relation.
    pub fn manager(&self, name: &str) -> QueryResult<Box<dyn RelationManager + '_>> {
        self.open_manager(name, Access::Guarded)
    }

    /// Bypass the guard for the next access.
    ///
    /// ```ignore
    /// let bio = profile.unguarded().get("bio")?;
    /// let role = user.unguarded().related("role")?;
    /// ```
    pub fn unguarded(&self) -> Unguarded<'_> {
        Unguarded { record: self }
    }

    /// Reload fields from the store.
    ///
    /// `None` reloads every field and drops eagerly loaded relations; the
    /// record then counts as unrestricted. `Some(fields)` loads just those
    /// fields, which stay loaded afterwards.
    pub fn refresh_from_db(&mut self, fields: Option<&[&str]>) -> QueryResult<()> {
        let client = self.client.clone();
        let model = client.model(&self.model)?;
        let pk = self.require_pk(model)?;

        let columns: Vec<SmolStr> = match fields {
            None => model.fields.keys().cloned().collect(),
            Some(names) => names
                .iter()
                .map(|name| column_for(model, name))
                .collect::<QueryResult<_>>()?,
        };

        let row = {
            let store = client.store();
            store.get(model.name(), pk).cloned()
        };
        client.log(
            model.name(),
            format!(
                "SELECT {} FROM {} WHERE {} = {}",
                columns.join(", "),
                model.table_name(),
                model.pk_name(),
                pk
            ),
        );
        let row = row.ok_or_else(|| QueryError::not_found(model.name()))?;

        for column in &columns {
            let value = row.get(column.as_str()).cloned().unwrap_or(Value::Null);
            self.values.insert(column.clone(), value);
        }

        match fields {
            None => {
                self.related.clear();
                if let Origin::Fetched(_) = self.origin {
                    self.origin = Origin::Fetched(Arc::new(FetchSpec::unrestricted()));
                }
            }
            Some(_) => {
                for column in &columns {
                    if let Some(relation) = model.get_field(column).and_then(|f| f.relation()) {
                        self.related.shift_remove(relation);
                    }
                }
                if let Origin::Fetched(spec) = &self.origin {
                    let spec = FetchSpec::new(
                        widened(&spec.fields, &columns),
                        spec.include.clone(),
                    );
                    self.origin = Origin::Fetched(Arc::new(spec));
                }
            }
        }

        self.load_state = hook::installed().and_then(|guard| guard.on_construct(self));
        trace!(model = model.name(), pk, "refreshed");
        Ok(())
    }

    fn require_pk(&self, model: &Model) -> QueryResult<i64> {
        self.values
            .get(model.pk_name())
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                QueryError::new(
                    ErrorCode::RequiredFieldMissing,
                    format!(
                        "`{}` was loaded without `{}`; cannot query for it",
                        model.name(),
                        model.pk_name()
                    ),
                )
                .with_model(model.name())
                .with_field(model.pk_name())
            })
    }

    fn read_field(&self, name: &str, access: Access) -> QueryResult<Value> {
        let model = self.model()?;
        if model.get_field(name).is_none() {
            return self
                .values
                .get(name)
                .cloned()
                .ok_or_else(|| QueryError::unknown_field(model.name(), name));
        }

        if let Some(guard) = access.guard() {
            guard.check_field(self, name)?;
        }
        if let Some(value) = self.values.get(name) {
            return Ok(value.clone());
        }

        // Deferred: one statement, result not kept.
        let pk = self.require_pk(model)?;
        let row = {
            let store = self.client.store();
            store.get(model.name(), pk).cloned()
        };
        self.client.log(
            model.name(),
            format!(
                "SELECT {} FROM {} WHERE {} = {}",
                name,
                model.table_name(),
                model.pk_name(),
                pk
            ),
        );
        let row = row.ok_or_else(|| QueryError::not_found(model.name()))?;
        Ok(row.get(name).cloned().unwrap_or(Value::Null))
    }

    fn read_related(&self, name: &str, access: Access) -> QueryResult<Option<Record>> {
        let model = self.model()?;
        let relation = model
            .get_relation(name)
            .ok_or_else(|| QueryError::unknown_field(model.name(), name))?;
        if relation.kind.is_plural() {
            return Err(QueryError::invalid_select(
                model.name(),
                name,
                format!("`{}` is a collection; use `manager(\"{}\")`", name, name),
            ));
        }

        if let Some(guard) = access.guard() {
            guard.check_relation(self, relation)?;
        }
        if let Some(Related::One(cached)) = self.related.get(name) {
            return Ok(cached.as_deref().cloned());
        }

        let remote = self.client.model(&relation.related_model)?;
        let column = relation.column_name().unwrap_or_default();
        let filter = match relation.kind {
            RelationKind::ForwardManyToOne | RelationKind::ForwardOneToOne => {
                let fk = self.read_field(column, Access::Escaped)?;
                if fk.is_null() {
                    return Ok(None);
                }
                Filter::equals(remote.pk_name(), fk)
            }
            _ => Filter::equals(column, self.require_pk(model)?),
        };
        self.client.query(remote.name()).filter(filter).first()
    }

    fn open_manager(
        &self,
        name: &str,
        access: Access,
    ) -> QueryResult<Box<dyn RelationManager + '_>> {
        let model = self.model()?;
        let relation = model
            .get_relation(name)
            .ok_or_else(|| QueryError::unknown_field(model.name(), name))?;
        if relation.kind.is_singular() {
            return Err(QueryError::invalid_select(
                model.name(),
                name,
                format!("`{}` is a single object; use `related(\"{}\")`", name, name),
            ));
        }

        let guard = access.guard();
        if let Some(guard) = guard {
            guard.check_relation(self, relation)?;
        }

        let prefetched = match self.related.get(name) {
            Some(Related::Many(records)) => Some(records.as_slice()),
            _ => None,
        };
        let manager = RelatedManager::new(self, relation, prefetched);
        Ok(match guard {
            Some(guard) => guard.wrap_manager(manager),
            None => Box::new(manager),
        })
    }
}

/// One access that skips the guard and performs the real fetch.
#[derive(Debug, Clone, Copy)]
pub struct Unguarded<'a> {
    record: &'a Record,
}

impl<'a> Unguarded<'a> {
    /// Read a field, fetching it if it was not loaded.
    pub fn get(self, name: &str) -> QueryResult<Value> {
        self.record.read_field(name, Access::Escaped)
    }

    /// Follow a singular relation, fetching it if it was not loaded.
    pub fn related(self, name: &str) -> QueryResult<Option<Record>> {
        self.record.read_related(name, Access::Escaped)
    }

    /// The unwrapped manager of a plural relation.
    pub fn manager(self, name: &str) -> QueryResult<Box<dyn RelationManager + 'a>> {
        self.record.open_manager(name, Access::Escaped)
    }
}

/// The column a refresh of `name` loads; forward relations map to their column.
fn column_for(model: &Model, name: &str) -> QueryResult<SmolStr> {
    if model.get_field(name).is_some() {
        return Ok(SmolStr::new(name));
    }
    model
        .get_relation(name)
        .and_then(Relation::column_name)
        .filter(|column| model.get_field(column).is_some())
        .map(SmolStr::new)
        .ok_or_else(|| QueryError::unknown_field(model.name(), name))
}

/// The selection after `columns` were loaded on top of `fields`.
fn widened(fields: &FieldSelection, columns: &[SmolStr]) -> FieldSelection {
    match fields {
        FieldSelection::All => FieldSelection::All,
        FieldSelection::Only(selected) => {
            let mut selected = selected.clone();
            selected.extend(columns.iter().cloned());
            FieldSelection::Only(selected)
        }
        FieldSelection::Except(excluded) => {
            let remaining: IndexSet<SmolStr> = excluded
                .iter()
                .filter(|name| !columns.contains(name))
                .cloned()
                .collect();
            if remaining.is_empty() {
                FieldSelection::All
            } else {
                FieldSelection::Except(remaining)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazyguard_schema::{Field, Schema};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn client() -> Client {
        let schema = Schema::builder()
            .model(Model::new("Role").field(Field::id("id")).field(Field::scalar("name")))
            .model(
                Model::new("User")
                    .field(Field::id("id"))
                    .field(Field::scalar("name"))
                    .field(Field::scalar("email"))
                    .relation(Relation::foreign_key("role", "Role").related_name("users").nullable()),
            )
            .build()
            .unwrap();
        let client = Client::new(schema);
        client.insert("Role", json!({"name": "admin"})).unwrap();
        client
            .insert("User", json!({"name": "ann", "email": "a@x", "role_id": 1}))
            .unwrap();
        client.insert("User", json!({"name": "bob", "email": "b@x"})).unwrap();
        client.reset_queries();
        client
    }

    #[test]
    fn test_created_record() {
        let client = client();
        let role = client.insert("Role", json!({"name": "staff"})).unwrap();
        assert!(role.is_created());
        assert!(role.load_state().is_none());
        assert_eq!(role.pk(), Some(2));
        assert_eq!(role.fetch_spec(), None);
    }

    #[test]
    fn test_unguarded_deferred_field_queries() {
        let client = client();
        let user = client.query("User").only(&["name"]).first().unwrap().unwrap();
        client.reset_queries();

        assert_eq!(user.unguarded().get("email").unwrap(), json!("a@x"));
        assert_eq!(client.query_count(), 1);
        assert_eq!(client.queries()[0].sql, "SELECT email FROM user WHERE id = 1");

        // not kept
        user.unguarded().get("email").unwrap();
        assert_eq!(client.query_count(), 2);
    }

    #[test]
    fn test_unknown_attribute() {
        let client = client();
        let user = client.query("User").first().unwrap().unwrap();
        assert_eq!(user.get("nope").unwrap_err().code, ErrorCode::InvalidFilter);
        assert_eq!(user.related("nope").unwrap_err().code, ErrorCode::InvalidFilter);
    }

    #[test]
    fn test_unguarded_related_queries() {
        let client = client();
        let user = client.query("User").first().unwrap().unwrap();
        client.reset_queries();

        let role = user.unguarded().related("role").unwrap().unwrap();
        assert_eq!(role.values()["name"], json!("admin"));
        assert_eq!(client.query_count(), 1);
    }

    #[test]
    fn test_selected_related_needs_no_query() {
        let client = client();
        let user = client
            .query("User")
            .select_related(&["role"])
            .first()
            .unwrap()
            .unwrap();
        client.reset_queries();

        let role = user.related("role").unwrap().unwrap();
        assert_eq!(role.pk(), Some(1));
        assert_eq!(client.query_count(), 0);
    }

    #[test]
    fn test_null_foreign_key_is_none_without_query() {
        let client = client();
        let bob = client.query("User").last().unwrap().unwrap();
        client.reset_queries();

        assert!(bob.unguarded().related("role").unwrap().is_none());
        assert_eq!(client.query_count(), 0);
    }

    #[test]
    fn test_related_rejects_collections() {
        let client = client();
        let role = client.query("Role").first().unwrap().unwrap();
        let err = role.related("users").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSelect);

        let user = client.query("User").first().unwrap().unwrap();
        assert_eq!(user.manager("role").unwrap_err().code, ErrorCode::InvalidSelect);
    }

    #[test]
    fn test_refresh_some_fields() {
        let client = client();
        let mut user = client.query("User").only(&["name"]).first().unwrap().unwrap();
        client.reset_queries();

        user.refresh_from_db(Some(&["email"])).unwrap();
        assert_eq!(client.query_count(), 1);
        assert_eq!(user.values()["email"], json!("a@x"));
        assert_eq!(
            user.fetch_spec().map(|s| s.fields.clone()),
            Some(FieldSelection::only(["name", "email"]))
        );
    }

    #[test]
    fn test_refresh_all_fields() {
        let client = client();
        let mut user = client
            .query("User")
            .defer(&["email"])
            .select_related(&["role"])
            .first()
            .unwrap()
            .unwrap();
        user.refresh_from_db(None).unwrap();
        assert!(user.fetch_spec().is_some_and(FetchSpec::is_unrestricted));
        assert!(user.cached("role").is_none());
        assert_eq!(user.values()["email"], json!("a@x"));
    }

    #[test]
    fn test_refresh_foreign_key_drops_cached_relation() {
        let client = client();
        let mut user = client
            .query("User")
            .select_related(&["role"])
            .first()
            .unwrap()
            .unwrap();
        user.refresh_from_db(Some(&["role"])).unwrap();
        assert!(user.cached("role").is_none());
    }

    #[test]
    fn test_widened() {
        let except = FieldSelection::except(["a", "b"]);
        assert_eq!(
            widened(&except, &[SmolStr::new("a")]),
            FieldSelection::except(["b"])
        );
        assert_eq!(widened(&except, &[SmolStr::new("a"), SmolStr::new("b")]), FieldSelection::All);
    }
}
