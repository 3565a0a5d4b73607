//! Attribute definitions
//!
//! An attribute is one field of a concrete, unit or value node: a canonical
//! name, accessor aliases, a field type, an optional default and constraints
//! that are folded into the leaf type when the node is built.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::errors::{DeclarationError, DeclarationResult};
use super::node::NodeId;
use super::types::{Constraint, Type};

/// Zero-argument default producer.
///
/// May run once per dispatch attempt that reaches the attribute.
pub type Producer = Arc<dyn Fn() -> Value + Send + Sync>;

/// Default applied when the key is absent from input
#[derive(Clone)]
pub enum DefaultSpec {
    Fixed(Value),
    Producer(Producer),
}

impl DefaultSpec {
    /// Computes or fetches the default. The result still has to be validated.
    pub fn produce(&self) -> Value {
        match self {
            DefaultSpec::Fixed(value) => value.clone(),
            DefaultSpec::Producer(producer) => producer(),
        }
    }
}

impl fmt::Debug for DefaultSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultSpec::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            DefaultSpec::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// What an attribute holds
#[derive(Debug, Clone)]
pub enum FieldType {
    /// A leaf value
    Leaf(Type),
    /// A nested node, resolved dispatch-aware
    Node(NodeId),
    /// An array of nested nodes
    List(NodeId),
}

impl FieldType {
    pub fn list_of(node: NodeId) -> Self {
        FieldType::List(node)
    }

    /// Short description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            FieldType::Leaf(ty) => ty.name(),
            FieldType::Node(id) => format!("node {}", id),
            FieldType::List(id) => format!("list of node {}", id),
        }
    }
}

impl From<Type> for FieldType {
    fn from(ty: Type) -> Self {
        FieldType::Leaf(ty)
    }
}

impl From<NodeId> for FieldType {
    fn from(node: NodeId) -> Self {
        FieldType::Node(node)
    }
}

/// One field of a node
#[derive(Debug, Clone)]
pub struct Attribute {
    name: String,
    aliases: Vec<String>,
    field_type: FieldType,
    default: Option<DefaultSpec>,
    optional: bool,
    constraints: Vec<Constraint>,
}

impl Attribute {
    /// Creates a required attribute.
    pub fn new(name: impl Into<String>, field_type: impl Into<FieldType>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
            field_type: field_type.into(),
            default: None,
            optional: false,
            constraints: Vec::new(),
        }
    }

    /// Creates an attribute accepting anything.
    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, Type::Any)
    }

    /// Adds an accessor alias. Aliases are never accepted as input keys.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Fixed default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultSpec::Fixed(value.into()));
        self
    }

    /// Default computed on demand.
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultSpec::Producer(Arc::new(producer)));
        self
    }

    /// Lets the key be omitted; an absent optional field is left out of the instance.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn constrain(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn default(&self) -> Option<&DefaultSpec> {
        self.default.as_ref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Pending constraints; empty once the owning node is built.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Folds pending constraints into the leaf type.
    ///
    /// Constraints only narrow leaves; on a node field they are a declaration error.
    pub(crate) fn fold_constraints(mut self) -> DeclarationResult<Self> {
        if self.constraints.is_empty() {
            return Ok(self);
        }
        let constraints = std::mem::take(&mut self.constraints);
        self.field_type = match self.field_type {
            FieldType::Leaf(ty) => FieldType::Leaf(ty.constrain(constraints)),
            other => {
                return Err(DeclarationError::InvalidConstraint {
                    constraint: constraints
                        .iter()
                        .map(Constraint::to_string)
                        .collect::<Vec<_>>()
                        .join(", "),
                    reason: format!(
                        "attribute [{}] holds {}, constraints only apply to leaf types",
                        self.name,
                        other.describe()
                    ),
                })
            }
        };
        Ok(self)
    }
}
