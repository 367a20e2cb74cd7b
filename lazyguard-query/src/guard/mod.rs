//! The access guard.
//!
//! [`install`] fills the mapping layer's [`AccessGuard`] slot with
//! [`LoadGuard`]. From then on every fetched record carries a
//! [`LoadState`], and reading anything that state does not cover fails
//! with a guard error instead of running another query:
//!
//! | Access | Switch | Error |
//! |---|---|---|
//! | field excluded by `only`/`defer` | `local_fields` | `MissingLocalField` |
//! | forward or reverse single relation not eager-loaded | `relation_fields` | `MissingRelationField` |
//! | `all()` on a collection not prefetched | `relation_reverse_fields` | `MissingReverseRelationField` |
//! | refinement on a prefetched collection | `relation_reverse_fields` | `BlockedMethod` |
//! | any relation on a record fetched without its identity | always | `AmbiguousIdentity` |
//!
//! Records created with `Client::insert` carry no load state and are
//! never guarded. `Record::unguarded()` lets a single access through.

mod field;
mod gate;
mod load_state;
mod proxy;
mod relation;

use std::sync::atomic::{AtomicBool, Ordering};

use lazyguard_schema::Relation;
use tracing::{info, warn};

pub use gate::GuardCategory;
pub use load_state::LoadState;
pub use proxy::{GuardedManager, ManagerMethod, MethodClass};

use crate::error::QueryResult;
use crate::hook::{self, AccessGuard};
use crate::manager::{RelatedManager, RelationManager};
use crate::record::{Origin, Record};

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// The guard installed by [`install`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadGuard;

impl AccessGuard for LoadGuard {
    fn on_construct(&self, record: &Record) -> Option<LoadState> {
        match record.origin() {
            Origin::Created => None,
            Origin::Fetched(spec) => record.model().ok().map(|m| LoadState::compute(m, spec)),
        }
    }

    fn check_field(&self, record: &Record, field: &str) -> QueryResult<()> {
        field::check(record, field)
    }

    fn check_relation(&self, record: &Record, relation: &Relation) -> QueryResult<()> {
        relation::check(record, relation)
    }

    fn wrap_manager<'a>(&self, manager: RelatedManager<'a>) -> Box<dyn RelationManager + 'a> {
        Box::new(GuardedManager::new(manager))
    }
}

/// Install the guard for the whole process.
///
/// Call once from application start-up. Returns `true` on the call that
/// installed it; later calls change nothing and return `false`.
pub fn install() -> bool {
    if hook::register(Box::new(LoadGuard)) {
        INSTALLED.store(true, Ordering::SeqCst);
        info!("lazy access guard installed");
        true
    } else {
        warn!("lazy access guard already installed; ignoring");
        false
    }
}

/// Check if [`install`] has run.
pub fn is_installed() -> bool {
    INSTALLED.load(Ordering::SeqCst)
}
