//! Construction and access hooks exposed by the mapping layer.
//!
//! The mapping layer has a single, process-wide [`AccessGuard`] slot. When
//! it is empty records behave like a plain lazy ORM: unloaded fields and
//! relations are fetched on access, one statement each. When it is filled
//! the guard sees every record construction and every field, relation and
//! manager access before the mapping layer resolves it.

use std::sync::OnceLock;

use lazyguard_schema::Relation;

use crate::error::QueryResult;
use crate::guard::LoadState;
use crate::manager::{RelatedManager, RelationManager};
use crate::record::Record;

/// Interposition points on records and relation managers.
pub trait AccessGuard: Send + Sync + 'static {
    /// Called once per fetched record; the result is attached to the record.
    fn on_construct(&self, record: &Record) -> Option<LoadState>;

    /// Called before a concrete field is read.
    fn check_field(&self, record: &Record, field: &str) -> QueryResult<()>;

    /// Called before a relation accessor is resolved.
    fn check_relation(&self, record: &Record, relation: &Relation) -> QueryResult<()>;

    /// Called whenever a collection manager is handed out.
    fn wrap_manager<'a>(&self, manager: RelatedManager<'a>) -> Box<dyn RelationManager + 'a>;
}

static GUARD: OnceLock<Box<dyn AccessGuard>> = OnceLock::new();

/// Fill the guard slot. Returns `false` if it was already filled.
pub fn register(guard: Box<dyn AccessGuard>) -> bool {
    GUARD.set(guard).is_ok()
}

/// The registered guard, if any.
pub fn installed() -> Option<&'static dyn AccessGuard> {
    GUARD.get().map(|g| g.as_ref())
}
