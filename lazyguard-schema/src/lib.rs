//! # lazyguard-schema
//!
//! Model metadata and configuration for the lazyguard access guards.
//!
//! This crate provides:
//! - Model, field and relation metadata with derived reverse accessors
//! - Validation of model sets
//! - Configuration parser for `lazyguard.toml` files
//!
//! ## Example
//!
//! ```rust
//! use lazyguard_schema::{Field, Model, Relation, Schema};
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
//! assert!(schema.get_relation("Role", "users").is_some());
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod validator;

pub use ast::*;
pub use config::{GuardConfig, LazyGuardConfig};
pub use error::{SchemaError, SchemaResult};
pub use validator::Validator;
