//! In-memory tables backing a [`Client`](crate::Client).

use std::collections::{BTreeMap, HashMap};

use lazyguard_schema::{FieldKind, JoinTable, Model};
use smol_str::SmolStr;

use crate::error::{QueryError, QueryResult};
use crate::types::{Row, Value};

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<i64, Row>,
    next_id: i64,
}

/// Rows of every model plus many-to-many link rows.
#[derive(Debug, Default)]
pub(crate) struct Store {
    tables: HashMap<SmolStr, Table>,
    links: HashMap<SmolStr, Vec<Row>>,
}

impl Store {
    /// All rows of a model in identity order.
    pub(crate) fn rows<'a>(&'a self, model: &str) -> impl Iterator<Item = &'a Row> + 'a {
        self.tables
            .get(model)
            .into_iter()
            .flat_map(|t| t.rows.values())
    }

    /// One row by identity.
    pub(crate) fn get(&self, model: &str, pk: i64) -> Option<&Row> {
        self.tables.get(model).and_then(|t| t.rows.get(&pk))
    }

    /// Insert a row, assigning the identity if absent. Returns the stored row.
    pub(crate) fn insert(&mut self, model: &Model, mut values: Row) -> QueryResult<Row> {
        let pk_name = model.pk_name();

        for key in values.keys() {
            if model.get_field(key).is_none() {
                return Err(QueryError::unknown_field(model.name(), key.as_str()));
            }
        }

        let mut row = Row::new();
        for field in model.fields.values() {
            let value = values.shift_remove(field.name()).unwrap_or(Value::Null);
            if let FieldKind::ForeignKey { .. } = field.kind {
                if value.is_null() && !field.nullable {
                    return Err(QueryError::new(
                        crate::error::ErrorCode::RequiredFieldMissing,
                        format!("`{}.{}` cannot be null", model.name(), field.name()),
                    )
                    .with_model(model.name())
                    .with_field(field.name()));
                }
            }
            row.insert(field.name.clone(), value);
        }

        let table = self.tables.entry(model.name.clone()).or_default();
        let pk = match row.get(pk_name) {
            Some(Value::Null) | None => {
                table.next_id += 1;
                while table.rows.contains_key(&table.next_id) {
                    table.next_id += 1;
                }
                table.next_id
            }
            Some(value) => value
                .as_i64()
                .ok_or_else(|| QueryError::invalid_input(pk_name, "identity must be an integer"))?,
        };
        if table.rows.contains_key(&pk) {
            return Err(QueryError::invalid_input(
                pk_name,
                format!("`{}` with identity {} already exists", model.name(), pk),
            ));
        }
        row.insert(SmolStr::new(pk_name), Value::from(pk));
        table.next_id = table.next_id.max(pk);
        table.rows.insert(pk, row.clone());
        Ok(row)
    }

    /// Add a link row to a join table.
    pub(crate) fn link(&mut self, join: &JoinTable, source: i64, target: i64) {
        let mut row = Row::new();
        row.insert(join.source_column.clone(), Value::from(source));
        row.insert(join.target_column.clone(), Value::from(target));
        let rows = self.links.entry(join.table_name.clone()).or_default();
        if !rows.contains(&row) {
            rows.push(row);
        }
    }

    /// Identities linked to `source` through a join table, in link order.
    pub(crate) fn linked(&self, join: &JoinTable, source: i64) -> Vec<i64> {
        self.links
            .get(&join.table_name)
            .into_iter()
            .flatten()
            .filter(|row| {
                row.get(join.source_column.as_str()).and_then(Value::as_i64) == Some(source)
            })
            .filter_map(|row| row.get(join.target_column.as_str()).and_then(Value::as_i64))
            .collect()
    }
}
