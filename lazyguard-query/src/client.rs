//! The client: schema, in-memory store, settings and query log.

use std::fmt;
use std::sync::Arc;

use lazyguard_schema::{LazyGuardConfig, Model, Schema};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use smol_str::SmolStr;
use tracing::trace;

use crate::error::{QueryError, QueryResult};
use crate::query::QuerySet;
use crate::record::Record;
use crate::settings::Settings;
use crate::store::Store;
use crate::types::{Row, Value, sql_literal};

/// One executed statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLogEntry {
    /// Model the statement read from or wrote to.
    pub model: SmolStr,
    /// Rendered SQL text.
    pub sql: String,
}

impl fmt::Display for QueryLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

struct Inner {
    schema: Schema,
    store: RwLock<Store>,
    settings: Settings,
    log: Mutex<Vec<QueryLogEntry>>,
}

/// Entry point of the mapping layer.
///
/// Cheap to clone; clones share the store, settings and query log.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("models", &self.inner.schema.models.len())
            .field("queries", &self.query_count())
            .finish()
    }
}

impl Client {
    /// Create a client with default settings (every guard category on).
    pub fn new(schema: Schema) -> Self {
        Self::with_settings(schema, Settings::default())
    }

    /// Create a client with explicit settings.
    pub fn with_settings(schema: Schema, settings: Settings) -> Self {
        Self {
            inner: Arc::new(Inner {
                schema,
                store: RwLock::new(Store::default()),
                settings,
                log: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a client configured from `lazyguard.toml` contents.
    pub fn from_config(schema: Schema, config: &LazyGuardConfig) -> Self {
        Self::with_settings(schema, Settings::from_config(config))
    }

    /// The schema.
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    /// The guard settings.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Look up a model.
    pub fn model(&self, name: &str) -> QueryResult<&Model> {
        Ok(self.inner.schema.model(name)?)
    }

    /// Start a query over a model.
    pub fn query(&self, model: &str) -> QuerySet {
        QuerySet::new(self.clone(), model)
    }

    /// Insert a record from a JSON object of column values.
    ///
    /// The returned record was not fetched, so no guard applies to it.
    pub fn insert(&self, model: &str, data: Value) -> QueryResult<Record> {
        let model = self.model(model)?;
        let values: Row = match data {
            Value::Object(map) => map.into_iter().map(|(k, v)| (SmolStr::new(k), v)).collect(),
            Value::Null => Row::new(),
            _ => {
                return Err(QueryError::invalid_input(
                    model.name(),
                    "insert expects a JSON object",
                ));
            }
        };

        let row = self.inner.store.write().insert(model, values)?;

        let columns: Vec<_> = row.keys().map(|k| k.as_str()).collect();
        let literals: Vec<_> = row.values().map(sql_literal).collect();
        self.log(
            model.name(),
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                model.table_name(),
                columns.join(", "),
                literals.join(", ")
            ),
        );

        Ok(Record::created(self.clone(), model.name.clone(), row))
    }

    /// Link two records through a many-to-many relation (either side).
    pub fn link(&self, model: &str, relation: &str, owner: i64, target: i64) -> QueryResult<()> {
        let model = self.model(model)?;
        let rel = model
            .get_relation(relation)
            .ok_or_else(|| QueryError::unknown_field(model.name(), relation))?;
        let join = rel.join_table.as_ref().ok_or_else(|| {
            QueryError::invalid_input(relation, "only many-to-many relations can be linked")
        })?;

        {
            let mut store = self.inner.store.write();
            if store.get(model.name(), owner).is_none() {
                return Err(QueryError::not_found(model.name()));
            }
            if store.get(&rel.related_model, target).is_none() {
                return Err(QueryError::not_found(rel.related_model.as_str()));
            }
            store.link(join, owner, target);
        }

        self.log(
            model.name(),
            format!(
                "INSERT INTO {} ({}, {}) VALUES ({}, {})",
                join.table_name, join.source_column, join.target_column, owner, target
            ),
        );
        Ok(())
    }

    /// Number of statements executed so far.
    pub fn query_count(&self) -> usize {
        self.inner.log.lock().len()
    }

    /// Every statement executed so far.
    pub fn queries(&self) -> Vec<QueryLogEntry> {
        self.inner.log.lock().clone()
    }

    /// Clear the query log.
    pub fn reset_queries(&self) {
        self.inner.log.lock().clear();
    }

    /// Run `f` and return the statements it executed.
    pub fn capture<R>(&self, f: impl FnOnce() -> R) -> (R, Vec<QueryLogEntry>) {
        let start = self.query_count();
        let result = f();
        let log = self.inner.log.lock();
        let captured = log.get(start..).map(<[_]>::to_vec).unwrap_or_default();
        (result, captured)
    }

    pub(crate) fn store(&self) -> RwLockReadGuard<'_, Store> {
        self.inner.store.read()
    }

    pub(crate) fn log(&self, model: &str, sql: String) {
        trace!(model, %sql, "statement");
        self.inner.log.lock().push(QueryLogEntry {
            model: SmolStr::new(model),
            sql,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazyguard_schema::{Field, Relation};
    use serde_json::json;

    fn client() -> Client {
        let schema = Schema::builder()
            .model(Model::new("Post").field(Field::id("id")).field(Field::scalar("title")))
            .model(
                Model::new("Tag")
                    .field(Field::id("id"))
                    .field(Field::scalar("name"))
                    .relation(Relation::many_to_many("posts", "Post").related_name("tags")),
            )
            .build()
            .unwrap();
        Client::new(schema)
    }

    #[test]
    fn test_insert_logs_statement() {
        let client = client();
        let post = client.insert("Post", json!({"title": "hello"})).unwrap();
        assert_eq!(post.pk(), Some(1));
        assert_eq!(client.query_count(), 1);
        assert_eq!(
            client.queries()[0].sql,
            "INSERT INTO post (id, title) VALUES (1, 'hello')"
        );
    }

    #[test]
    fn test_insert_rejects_non_object() {
        let client = client();
        assert!(client.insert("Post", json!([1, 2])).is_err());
        assert!(client.insert("Nope", json!({})).is_err());
    }

    #[test]
    fn test_link_from_either_side() {
        let client = client();
        client.insert("Post", json!({"title": "a"})).unwrap();
        client.insert("Tag", json!({"name": "rust"})).unwrap();
        client.link("Tag", "posts", 1, 1).unwrap();
        client.link("Post", "tags", 1, 1).unwrap();
        assert!(client.link("Post", "title", 1, 1).is_err());
        assert!(client.link("Post", "tags", 1, 99).is_err());
    }

    #[test]
    fn test_capture() {
        let client = client();
        client.insert("Post", json!({"title": "a"})).unwrap();
        let (_, captured) = client.capture(|| {
            client.insert("Post", json!({"title": "b"})).unwrap();
        });
        assert_eq!(captured.len(), 1);
        assert!(captured[0].sql.contains("'b'"));

        client.reset_queries();
        assert_eq!(client.query_count(), 0);
    }
}
