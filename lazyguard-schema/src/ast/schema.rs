//! Top-level schema definition and builder.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use super::{Model, Relation};
use crate::error::{SchemaError, SchemaResult};
use crate::validator::Validator;

/// A complete, validated set of models.
///
/// Reverse accessors are derived when the schema is built, so every
/// relation is reachable from both of its models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// All models in the schema.
    pub models: IndexMap<SmolStr, Model>,
}

impl Schema {
    /// Start building a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Get a model by name.
    pub fn get_model(&self, name: &str) -> Option<&Model> {
        self.models.get(name)
    }

    /// Get a model by name, failing with [`SchemaError::UnknownModel`].
    pub fn model(&self, name: &str) -> SchemaResult<&Model> {
        self.get_model(name)
            .ok_or_else(|| SchemaError::unknown_model(name))
    }

    /// Get a relation accessor on a model.
    pub fn get_relation(&self, model: &str, name: &str) -> Option<&Relation> {
        self.get_model(model).and_then(|m| m.get_relation(name))
    }

    /// Get the model on the other side of a relation.
    pub fn related_model(&self, relation: &Relation) -> Option<&Model> {
        self.get_model(&relation.related_model)
    }

    /// Get all model names.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(|k| k.as_str())
    }
}

/// Collects models and produces a validated [`Schema`].
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    models: Vec<Model>,
}

impl SchemaBuilder {
    /// Add a model.
    pub fn model(mut self, model: Model) -> Self {
        self.models.push(model);
        self
    }

    /// Validate the models and derive reverse accessors.
    pub fn build(self) -> SchemaResult<Schema> {
        Validator::new().validate(self.models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Field, RelationKind};

    fn blog() -> Schema {
        Schema::builder()
            .model(Model::new("Role").field(Field::id("id")).field(Field::scalar("name")))
            .model(
                Model::new("User")
                    .field(Field::id("id"))
                    .field(Field::scalar("name"))
                    .relation(Relation::foreign_key("role", "Role").related_name("users")),
            )
            .model(
                Model::new("Profile")
                    .field(Field::id("id"))
                    .relation(Relation::one_to_one("user", "User")),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_reverse_accessors_are_derived() {
        let schema = blog();

        let users = schema.get_relation("Role", "users").unwrap();
        assert_eq!(users.kind, RelationKind::ReverseManyToOne);
        assert_eq!(users.related_model, "User");
        assert_eq!(users.column_name(), Some("role_id"));

        let profile = schema.get_relation("User", "profile").unwrap();
        assert_eq!(profile.kind, RelationKind::ReverseOneToOne);
    }

    #[test]
    fn test_model_lookup() {
        let schema = blog();
        assert!(schema.model("User").is_ok());
        assert!(matches!(
            schema.model("Team"),
            Err(SchemaError::UnknownModel { .. })
        ));
        assert_eq!(schema.model_names().count(), 3);
    }
}
