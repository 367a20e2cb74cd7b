//! Field selections and relation includes.
//!
//! A query's `only`/`defer` calls build a [`FieldSelection`];
//! `select_related`/`prefetch_related` build an [`Include`]. Together
//! they form the [`FetchSpec`] every fetched record remembers.
//!
//! ```rust
//! use lazyguard_query::relations::{IncludeSpec, LoadStrategy};
//!
//! let spec = IncludeSpec::from_path("role__users", LoadStrategy::Separate).unwrap();
//! assert!(spec.nested.contains_key("users"));
//! ```

mod include;
mod select;
mod spec;

pub use include::{Include, IncludeSpec, LoadStrategy, PATH_SEPARATOR};
pub use select::FieldSelection;
pub use spec::FetchSpec;
