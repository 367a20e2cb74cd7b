//! Field guard.

use tracing::{debug, trace};

use super::gate::GuardCategory;
use crate::error::{QueryError, QueryResult};
use crate::record::Record;

/// Deny reads of concrete fields the record's fetch excluded.
///
/// The decision depends only on the load state, never on the value.
pub(super) fn check(record: &Record, field: &str) -> QueryResult<()> {
    let Some(state) = record.load_state() else {
        return Ok(());
    };
    let settings = record.client().settings();
    if !GuardCategory::LocalFields.is_enabled(settings)
        || !state.is_restricted()
        || state.is_field_loaded(field)
    {
        trace!(model = record.model_name(), field, "field access allowed");
        return Ok(());
    }

    let err = QueryError::missing_local_field(
        record.model_name(),
        field,
        &state.selected(),
        &state.deferred(),
    );
    if settings.log_denials() {
        debug!(model = record.model_name(), field, code = %err.code.code(), "field access denied");
    }
    Err(err)
}
