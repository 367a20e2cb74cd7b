//! Schema validation and reverse relation derivation.
//!
//! Checks performed before a [`Schema`] is handed out:
//! - No duplicate models, fields or accessors
//! - Every model has an identity field
//! - Every relation points at a registered model
//! - Derived reverse accessors do not collide with existing names

use std::collections::HashSet;

use indexmap::IndexMap;
use smol_str::SmolStr;
use tracing::debug;

use crate::ast::*;
use crate::error::{SchemaError, SchemaResult};

/// Schema validator.
#[derive(Debug)]
pub struct Validator {
    /// Collected validation errors.
    errors: Vec<SchemaError>,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator {
    /// Create a new validator.
    pub fn new() -> Self {
        Self { errors: vec![] }
    }

    /// Validate the models and return the finished schema or all errors found.
    pub fn validate(&mut self, models: Vec<Model>) -> SchemaResult<Schema> {
        self.errors.clear();

        let mut schema = Schema::default();
        for model in models {
            if schema.models.contains_key(model.name()) {
                self.errors.push(SchemaError::duplicate("model", model.name()));
                continue;
            }
            schema.models.insert(model.name.clone(), model);
        }

        for model in schema.models.values() {
            self.validate_model(model, &schema);
        }

        if self.errors.is_empty() {
            self.derive_reverse_relations(&mut schema);
        }

        if self.errors.is_empty() {
            debug!(models = schema.models.len(), "schema built");
            Ok(schema)
        } else {
            Err(SchemaError::ValidationFailed {
                count: self.errors.len(),
                errors: std::mem::take(&mut self.errors),
            })
        }
    }

    fn validate_model(&mut self, model: &Model, schema: &Schema) {
        for name in &model.redeclared {
            self.errors.push(SchemaError::duplicate(
                "field",
                format!("{}.{}", model.name(), name),
            ));
        }

        let ids = model.fields.values().filter(|f| f.is_id()).count();
        if ids == 0 {
            self.errors.push(SchemaError::MissingId {
                model: model.name().to_string(),
            });
        } else if ids > 1 {
            self.errors.push(SchemaError::invalid_model(
                model.name(),
                "only one identity field is supported",
            ));
        }

        for relation in model.relations.values() {
            if model.fields.contains_key(relation.name()) {
                self.errors.push(SchemaError::invalid_relation(
                    model.name(),
                    relation.name(),
                    "accessor name collides with a field",
                ));
            }
            if schema.get_model(&relation.related_model).is_none() {
                self.errors
                    .push(SchemaError::unknown_model(relation.related_model.as_str()));
            }
            if !relation.kind.is_forward() {
                self.errors.push(SchemaError::invalid_relation(
                    model.name(),
                    relation.name(),
                    "reverse accessors are derived and cannot be declared",
                ));
            }
        }
    }

    /// Add the other side of every forward relation to its related model.
    fn derive_reverse_relations(&mut self, schema: &mut Schema) {
        let mut derived: Vec<Relation> = Vec::new();
        let mut resolved: IndexMap<(SmolStr, SmolStr), SmolStr> = IndexMap::new();

        for model in schema.models.values() {
            for relation in model.relations.values() {
                let accessor = relation
                    .related_name
                    .clone()
                    .unwrap_or_else(|| relation.default_related_name());
                resolved.insert(
                    (model.name.clone(), relation.name.clone()),
                    accessor.clone(),
                );
                derived.push(relation.reversed(accessor));
            }
        }

        let mut taken: HashSet<(SmolStr, SmolStr)> = HashSet::new();
        for reverse in derived {
            let Some(target) = schema.models.get_mut(&reverse.model) else {
                continue;
            };
            let key = (reverse.model.clone(), reverse.name.clone());
            if target.has_attribute(reverse.name()) || !taken.insert(key) {
                self.errors.push(SchemaError::invalid_relation(
                    reverse.model.as_str(),
                    reverse.name(),
                    format!(
                        "reverse accessor for `{}.{}` collides with an existing name; set `related_name`",
                        reverse.related_model,
                        reverse.related_name.as_deref().unwrap_or_default(),
                    ),
                ));
                continue;
            }
            target.insert_relation(reverse);
        }

        for ((model, name), accessor) in resolved {
            if let Some(relation) = schema
                .models
                .get_mut(&model)
                .and_then(|m| m.relations.get_mut(&name))
            {
                relation.related_name = Some(accessor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role() -> Model {
        Model::new("Role").field(Field::id("id")).field(Field::scalar("name"))
    }

    #[test]
    fn test_validate_model_missing_id() {
        let err = Validator::new()
            .validate(vec![Model::new("User").field(Field::scalar("name"))])
            .unwrap_err();
        assert!(matches!(err.errors()[0], SchemaError::MissingId { .. }));
    }

    #[test]
    fn test_validate_duplicate_model_names() {
        let err = Validator::new().validate(vec![role(), role()]).unwrap_err();
        assert!(matches!(err.errors()[0], SchemaError::Duplicate { .. }));
    }

    #[test]
    fn test_validate_unknown_related_model() {
        let user = Model::new("User")
            .field(Field::id("id"))
            .relation(Relation::foreign_key("team", "Team"));
        let err = Validator::new().validate(vec![user]).unwrap_err();
        assert!(matches!(err.errors()[0], SchemaError::UnknownModel { .. }));
    }

    #[test]
    fn test_validate_reverse_accessor_collision() {
        let user = Model::new("User")
            .field(Field::id("id"))
            .relation(Relation::foreign_key("role", "Role").related_name("name"));
        let err = Validator::new().validate(vec![role(), user]).unwrap_err();
        assert!(matches!(err.errors()[0], SchemaError::InvalidRelation { .. }));
    }

    #[test]
    fn test_two_foreign_keys_need_related_names() {
        let message = Model::new("Message")
            .field(Field::id("id"))
            .relation(Relation::foreign_key("sender", "Role"))
            .relation(Relation::foreign_key("receiver", "Role"));
        let err = Validator::new()
            .validate(vec![role(), message.clone()])
            .unwrap_err();
        assert_eq!(err.errors().len(), 1);

        let message = Model::new("Message")
            .field(Field::id("id"))
            .relation(Relation::foreign_key("sender", "Role").related_name("sent"))
            .relation(Relation::foreign_key("receiver", "Role").related_name("received"));
        let schema = Validator::new().validate(vec![role(), message]).unwrap();
        assert!(schema.get_relation("Role", "sent").is_some());
        assert!(schema.get_relation("Role", "received").is_some());
    }

    #[test]
    fn test_default_related_name_is_recorded() {
        let user = Model::new("User")
            .field(Field::id("id"))
            .relation(Relation::foreign_key("role", "Role"));
        let schema = Validator::new().validate(vec![role(), user]).unwrap();
        assert_eq!(
            schema.get_relation("User", "role").unwrap().related_name.as_deref(),
            Some("user_set")
        );
        assert!(schema.get_relation("Role", "user_set").is_some());
    }

    #[test]
    fn test_self_referencing_many_to_many() {
        let person = Model::new("Person")
            .field(Field::id("id"))
            .relation(Relation::many_to_many("friends", "Person").related_name("friend_of"));
        let schema = Validator::new().validate(vec![person]).unwrap();
        let reverse = schema.get_relation("Person", "friend_of").unwrap();
        assert_eq!(reverse.kind, RelationKind::ReverseManyToMany);
        let join = reverse.join_table.as_ref().unwrap();
        assert_eq!(join.source_column, "to_person_id");
    }
}
