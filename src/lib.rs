//! # Lazyguard
//!
//! Turn silent lazy ORM queries into immediate, actionable errors.
//!
//! A record fetched with `only(...)`, `defer(...)` or without an eager
//! load of some relation will, in a plain lazy mapping layer, quietly run
//! one more statement the first time the missing piece is read. In a loop
//! that becomes the classic N+1. With the guard installed the same read
//! fails on the spot, naming the model, the field and the directive that
//! would have loaded it.
//!
//! ## Quick Start
//!
//! ```rust
//! use lazyguard::prelude::*;
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
//! lazyguard::install();
//!
//! let client = Client::new(schema);
//! client.insert("Role", json!({"name": "admin"})).unwrap();
//! client.insert("User", json!({"name": "ann", "role_id": 1})).unwrap();
//!
//! let user = client.query("User").first().unwrap().unwrap();
//! let err = user.related("role").unwrap_err();
//! assert_eq!(err.code, ErrorCode::MissingRelationField);
//!
//! let user = client.query("User").select_related(&["role"]).first().unwrap().unwrap();
//! assert!(user.related("role").unwrap().is_some());
//! ```
//!
//! ## Configuration
//!
//! Guard switches are read from `lazyguard.toml` and can be flipped at
//! runtime through [`Settings`]:
//!
//! ```toml
//! [guards]
//! local_fields = true
//! relation_fields = true
//! relation_reverse_fields = true
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Model metadata, schema validation and configuration.
pub mod schema {
    pub use lazyguard_schema::*;
}

/// The mapping layer and its guards.
pub mod query {
    pub use lazyguard_query::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::query::prelude::*;
    pub use crate::schema::{Field, GuardConfig, LazyGuardConfig, Model, Relation, Schema};
}

// Re-export key types at the crate root
pub use lazyguard_query::{
    Client, ErrorCode, QueryError, QueryResult, Record, Settings, install, is_installed,
};
pub use schema::{LazyGuardConfig, Schema, SchemaError};
