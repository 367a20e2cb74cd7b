//! Model metadata types.
//!
//! A [`Schema`] is a set of [`Model`]s, each carrying concrete [`Field`]s
//! and [`Relation`] accessors.

mod field;
mod model;
mod relation;
mod schema;

pub use field::*;
pub use model::*;
pub use relation::*;
pub use schema::*;
