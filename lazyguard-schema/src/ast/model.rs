//! Model definitions: concrete fields plus relation accessors.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Field, JoinTable, Relation, RelationKind};

/// A model definition (maps to a table).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model name.
    pub name: SmolStr,
    /// Table name override.
    pub table: Option<SmolStr>,
    /// Concrete fields, in declaration order.
    pub fields: IndexMap<SmolStr, Field>,
    /// Relation accessors, forward and derived.
    pub relations: IndexMap<SmolStr, Relation>,
    /// Names declared more than once, reported during validation.
    #[serde(skip)]
    pub(crate) redeclared: Vec<SmolStr>,
}

impl Model {
    /// Create a new model.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            table: None,
            fields: IndexMap::new(),
            relations: IndexMap::new(),
            redeclared: Vec::new(),
        }
    }

    /// Set the table name.
    pub fn table(mut self, table: impl Into<SmolStr>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Add a field (builder form).
    pub fn field(mut self, field: Field) -> Self {
        self.add_field(field);
        self
    }

    /// Add a relation (builder form).
    pub fn relation(mut self, relation: Relation) -> Self {
        self.add_relation(relation);
        self
    }

    /// Add a field to the model.
    pub fn add_field(&mut self, field: Field) {
        let name = field.name.clone();
        if self.fields.insert(name.clone(), field).is_some() {
            self.redeclared.push(name);
        }
    }

    /// Add a forward relation to the model.
    ///
    /// Foreign keys and one-to-ones get a `<name>_id` column field unless a
    /// column was given; many-to-manys get a join table.
    pub fn add_relation(&mut self, mut relation: Relation) {
        relation.model = self.name.clone();

        match relation.kind {
            RelationKind::ForwardManyToOne | RelationKind::ForwardOneToOne => {
                let column = relation
                    .column
                    .clone()
                    .unwrap_or_else(|| SmolStr::new(format!("{}_id", relation.name)));
                let mut field = Field::foreign_key(column.clone(), relation.name.clone());
                field.nullable = relation.nullable;
                relation.column = Some(column);
                self.add_field(field);
            }
            RelationKind::ManyToMany => {
                if let Some(table_name) = relation.join_table_name() {
                    let source = self.name.to_lowercase();
                    let target = relation.related_model.to_lowercase();
                    relation.join_table = Some(if source == target {
                        JoinTable::new(
                            table_name,
                            format!("from_{}_id", source),
                            format!("to_{}_id", target),
                        )
                    } else {
                        JoinTable::new(
                            table_name,
                            format!("{}_id", source),
                            format!("{}_id", target),
                        )
                    });
                }
            }
            _ => {}
        }

        self.insert_relation(relation);
    }

    pub(crate) fn insert_relation(&mut self, relation: Relation) {
        let name = relation.name.clone();
        if self.relations.insert(name.clone(), relation).is_some() {
            self.redeclared.push(name);
        }
    }

    /// Get the model name as a string.
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Get the table name (override or lowercased model name).
    pub fn table_name(&self) -> String {
        match &self.table {
            Some(t) => t.to_string(),
            None => self.name.to_lowercase(),
        }
    }

    /// Get a field by name.
    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Get a relation accessor by name.
    pub fn get_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.get(name)
    }

    /// Get the identity field.
    pub fn id_field(&self) -> Option<&Field> {
        self.fields.values().find(|f| f.is_id())
    }

    /// Name of the identity field, `"id"` if none is declared.
    pub fn pk_name(&self) -> &str {
        self.id_field().map(|f| f.name()).unwrap_or("id")
    }

    /// Iterate over concrete field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    /// Check if `name` is a field or a relation accessor.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.relations.contains_key(name)
    }
}
