//! Polymorphic structured-value resolution
//!
//! A [`Hierarchy`] is a tree of nodes. Abstract nodes only dispatch to their
//! variants; concrete, unit and value nodes validate their own attributes.
//! Resolving an input against a node yields an [`Instance`] of the first
//! variant (in dispatch order) that accepts it.
//!
//! # Design Principles
//!
//! - Hierarchies are declared once and are read-only afterwards
//! - Strict input: undeclared keys are rejected
//! - Every field violation is reported, not just the first
//! - Failed dispatch reports every attempt, in attempt order
//! - Mis-declared schemas fail with a declaration error, whatever the input
//! - Deterministic resolution

mod attribute;
mod builder;
mod errors;
mod instance;
mod loader;
mod node;
mod resolver;
mod types;
mod validator;

pub use attribute::{Attribute, DefaultSpec, FieldType, Producer};
pub use builder::NodeBuilder;
pub use errors::{
    Attempt, DeclarationError, DeclarationResult, ErrorCode, ResolveError, ResolveResult,
    Severity, Violation, ViolationKind,
};
pub use instance::{Datum, Instance};
pub use loader::{
    AttributeDef, CompositeDef, ConstraintsDef, HierarchyLoader, LoadedHierarchy, LoaderError,
    LoaderResult, NodeDef, TypeDef,
};
pub use node::{Hierarchy, NodeId, NodeKind, Shape};
pub use resolver::Resolver;
pub use types::{json_type_name, Coercion, Constraint, LeafAdapter, Type, TypeError};
pub use validator::Validator;
