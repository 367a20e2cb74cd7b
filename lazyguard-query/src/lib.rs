//! # lazyguard-query
//!
//! Access guards for a lazy ORM mapping layer.
//!
//! The crate ships a small synchronous mapping layer (an in-memory
//! [`Client`], lazily evaluated [`QuerySet`]s, [`Record`]s and collection
//! managers) and a guard that turns every implicit extra query into an
//! immediate error. Call [`install`] once at start-up.
//!
//! ## Fetching
//!
//! ```rust
//! use lazyguard_query::{Client, Filter};
//! use lazyguard_schema::{Field, Model, Relation, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::builder()
//!     .model(Model::new("Role").field(Field::id("id")).field(Field::scalar("name")))
//!     .model(
//!         Model::new("User")
//!             .field(Field::id("id"))
//!             .field(Field::scalar("name"))
//!             .relation(Relation::foreign_key("role", "Role").related_name("users")),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let client = Client::new(schema);
//! client.insert("Role", json!({"name": "admin"})).unwrap();
//! client.insert("User", json!({"name": "ann", "role_id": 1})).unwrap();
//!
//! let users = client
//!     .query("User")
//!     .filter(Filter::equals("name", "ann"))
//!     .select_related(&["role"])
//!     .fetch()
//!     .unwrap();
//! assert_eq!(users.len(), 1);
//! ```
//!
//! ## Guarding
//!
//! ```rust,no_run
//! # use lazyguard_query::{Client, ErrorCode};
//! # fn run(client: &Client) -> lazyguard_query::QueryResult<()> {
//! lazyguard_query::install();
//!
//! let user = client.query("User").only(&["name"]).get()?;
//! let err = user.get("email").unwrap_err();
//! assert_eq!(err.code, ErrorCode::MissingLocalField);
//!
//! // one access, explicitly allowed to query
//! let email = user.unguarded().get("email")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use lazyguard_query::{QueryError, ErrorCode};
//! use lazyguard_schema::RelationKind;
//!
//! let err = QueryError::missing_relation_field(
//!     "User",
//!     "role",
//!     "Role",
//!     RelationKind::ForwardManyToOne,
//!     Some("role_id"),
//! );
//! assert_eq!(err.code, ErrorCode::MissingRelationField);
//! assert!(err.is_missing_relation());
//! ```

pub mod client;
pub mod error;
pub mod filter;
pub mod guard;
pub mod hook;
pub mod logging;
pub mod manager;
pub mod query;
pub mod record;
pub mod relations;
pub mod settings;
mod store;
pub mod types;

pub use client::{Client, QueryLogEntry};
pub use error::{ErrorCode, ErrorContext, QueryError, QueryResult, Suggestion};
pub use filter::Filter;
pub use guard::{GuardCategory, LoadGuard, LoadState, install, is_installed};
pub use manager::{RelatedManager, RelationManager};
pub use query::{Annotation, DateKind, QuerySet};
pub use record::{Origin, Record, Related, Unguarded};
pub use relations::{FetchSpec, FieldSelection, Include, IncludeSpec, LoadStrategy};
pub use settings::Settings;
pub use types::{OrderByField, Row, SortOrder, Value};

// Re-export logging utilities
pub use logging::{get_log_format, get_log_level, init as init_logging, is_debug_enabled};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::Client;
    pub use crate::error::{ErrorCode, QueryError, QueryResult};
    pub use crate::filter::Filter;
    pub use crate::guard::install;
    pub use crate::manager::RelationManager;
    pub use crate::query::{Annotation, QuerySet};
    pub use crate::record::Record;
    pub use crate::relations::IncludeSpec;
}
