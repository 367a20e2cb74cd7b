//! Relation guard for single-valued relations.
//!
//! Decision order:
//!
//! 1. records without a load state are never guarded
//! 2. a record fetched without its identity cannot resolve any relation
//! 3. collections are checked by the manager proxy, per call
//! 4. the category switch
//! 5. the load state: one-to-one needs `select_related`, a forward
//!    foreign key accepts either directive
//! 6. a forward relation whose loaded column is null has nothing to load

use lazyguard_schema::{Relation, RelationKind};
use tracing::{debug, trace};

use super::gate::GuardCategory;
use crate::error::{QueryError, QueryResult};
use crate::record::Record;
use crate::relations::LoadStrategy;
use crate::types::Value;

pub(super) fn check(record: &Record, relation: &Relation) -> QueryResult<()> {
    let Some(state) = record.load_state() else {
        return Ok(());
    };
    let settings = record.client().settings();

    if !state.is_identity_loaded() {
        let err = QueryError::ambiguous_identity(
            record.model_name(),
            relation.name(),
            state.identity(),
        );
        if settings.log_denials() {
            debug!(
                model = record.model_name(),
                relation = relation.name(),
                code = %err.code.code(),
                "relation access denied"
            );
        }
        return Err(err);
    }

    if relation.kind.is_plural() || !GuardCategory::for_relation(relation.kind).is_enabled(settings) {
        return Ok(());
    }

    let loaded = match (relation.kind, state.relation_strategy(relation.name())) {
        (_, None) => false,
        (RelationKind::ForwardManyToOne, Some(_)) => true,
        (_, Some(strategy)) => strategy == LoadStrategy::Join,
    };
    let column = relation
        .column_name()
        .filter(|_| relation.kind.is_forward());
    let null_key = column.is_some_and(|c| matches!(record.values().get(c), Some(Value::Null)));

    if loaded || null_key {
        trace!(model = record.model_name(), relation = relation.name(), "relation access allowed");
        return Ok(());
    }

    let err = QueryError::missing_relation_field(
        record.model_name(),
        relation.name(),
        relation.related_model.as_str(),
        relation.kind,
        column,
    );
    if settings.log_denials() {
        debug!(
            model = record.model_name(),
            relation = relation.name(),
            code = %err.code.code(),
            "relation access denied"
        );
    }
    Err(err)
}
