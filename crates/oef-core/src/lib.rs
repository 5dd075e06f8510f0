//! # oef-core
//!
//! Core engine of an Open Economic Framework node: the typed schema and
//! query language agents use to describe themselves and the services they
//! offer, and the searchable service directory built on top of them.
//!
//! This crate is I/O free. The node (`oef-node`) layers the TCP protocol,
//! the agent session machinery and the server loop on top of it.
//!
//! ## Overview
//!
//! - [`schema`]: typed values, attributes, data models and instances, with
//!   every construction invariant enforced at the API boundary.
//! - [`query`]: the recursive constraint-expression language (`And` / `Or`
//!   / `Not` / leaf constraints) and [`query::QueryModel`].
//! - [`directory`]: the concurrent, query-searchable service directory.
//! - [`registry`]: a versioned store of named data models.
//! - [`wire`]: the canonical protobuf encodings of all schema and query
//!   types, with validating decoders.
//!
//! ## Example
//!
//! ```rust
//! use oef_core::schema::{Attribute, AttributeType, DataModel, Instance, Value};
//! use oef_core::query::{Constraint, ConstraintExpr, QueryModel, Range};
//!
//! let book = DataModel::new(
//!     "book",
//!     vec![
//!         Attribute::new("title", AttributeType::Str, true),
//!         Attribute::new("year", AttributeType::Int, false),
//!     ],
//! )?;
//! let dune = Instance::new(
//!     book.clone(),
//!     [
//!         ("title".to_owned(), Value::Str("Dune".to_owned())),
//!         ("year".to_owned(), Value::Int(1965)),
//!     ],
//! )?;
//!
//! let sixties = ConstraintExpr::from(Constraint::new("year", Range::Int(1960, 1969)));
//! let query = QueryModel::with_model(vec![sixties], book)?;
//! assert!(query.check(&dune));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod directory;
pub mod query;
pub mod registry;
pub mod schema;
pub mod wire;

pub use directory::ServiceDirectory;
pub use query::{
    Constraint, ConstraintExpr, Distance, LeafConstraint, QueryError, QueryModel, Range, Relation,
    RelationOp, Set, SetOp, SetValues,
};
pub use registry::SchemaRegistry;
pub use schema::{
    Attribute, AttributeType, DataModel, Instance, Location, SchemaError, Value, EARTH_RADIUS_KM,
};
pub use wire::WireError;
