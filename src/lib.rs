//! aerotype - polymorphic structured-value resolution
//!
//! Declare a hierarchy of nodes, then resolve loosely shaped values into
//! validated instances of the first variant that accepts them.

pub mod cli;
pub mod observability;
pub mod schema;

pub use schema::{
    Attribute, Datum, Hierarchy, Instance, NodeId, NodeKind, ResolveError, ResolveResult, Type,
};
