//! Construction pipeline
//!
//! Direct construction of one node, never descending into its variants:
//! 1. Pass-through: an instance of the node (or a descendant) is returned as is
//! 2. Normalization: unit/value nodes promote scalars to `{ attribute: scalar }`
//! 3. Own-field validation: defaults, nested nodes, strict key checking
//!
//! Validation semantics:
//! - Every declared attribute is present, defaulted, optional or reported missing
//! - Defaults are validated like any other value
//! - Undeclared keys (aliases included) are rejected
//! - All field violations are collected into one error
//!
//! Validation does not mutate input and is deterministic.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::attribute::{Attribute, FieldType};
use super::errors::{DeclarationError, ResolveError, ResolveResult, Violation, ViolationKind};
use super::instance::{Datum, Instance};
use super::node::{Hierarchy, NodeId, NodeKind, Shape};
use super::resolver::Resolver;
use super::types::TypeError;

/// Field path of the input as a whole
const ROOT: &str = "$root";

/// Direct constructor over a declared hierarchy.
pub struct Validator<'a> {
    hierarchy: &'a Hierarchy,
}

impl<'a> Validator<'a> {
    pub fn new(hierarchy: &'a Hierarchy) -> Self {
        Self { hierarchy }
    }

    /// Constructs `node` from `input` using its own fields only.
    ///
    /// # Errors
    ///
    /// - `Declaration` if the node is abstract, or is a unit/value node with
    ///   other than one attribute, whatever the input
    /// - `Invalid` listing every field violation
    pub fn construct(&self, node: NodeId, input: impl Into<Datum>) -> ResolveResult<Instance> {
        let input = input.into();
        let shape = self.hierarchy.shape(node)?;

        if let Some(instance) = self.pass_through(node, &input) {
            return Ok(instance);
        }

        match shape.kind {
            NodeKind::Abstract => {
                let error = if self.hierarchy.variants(node)?.is_empty() {
                    DeclarationError::NoVariants {
                        node: shape.name.clone(),
                    }
                } else {
                    DeclarationError::AbstractConstruction {
                        node: shape.name.clone(),
                    }
                };
                Err(error.into())
            }
            NodeKind::Unit | NodeKind::Value => {
                sole_attribute(shape)?;
                self.validate_fields(shape, input)
            }
            NodeKind::Concrete => self.validate_fields(shape, input),
        }
    }

    /// Like [`Validator::construct`], handing validation failures to `interceptor`.
    ///
    /// Declaration errors are returned without calling the interceptor.
    pub fn construct_or_else<F>(
        &self,
        node: NodeId,
        input: impl Into<Datum>,
        interceptor: F,
    ) -> ResolveResult<Instance>
    where
        F: FnOnce(ResolveError) -> ResolveResult<Instance>,
    {
        match self.construct(node, input) {
            Err(error) if !error.is_declaration() => interceptor(error),
            other => other,
        }
    }

    /// Step 1: existing instances of `node` or a descendant are returned unchanged.
    pub(crate) fn pass_through(&self, node: NodeId, input: &Datum) -> Option<Instance> {
        match input {
            Datum::Instance(instance) if instance.is_a(self.hierarchy.id(), node) => {
                Some(instance.clone())
            }
            _ => None,
        }
    }

    /// Steps 2 and 3.
    fn validate_fields(&self, shape: &Arc<Shape>, input: Datum) -> ResolveResult<Instance> {
        let mut entries = match self.normalize(shape, input)? {
            Ok(entries) => entries,
            Err(violation) => {
                return Err(ResolveError::Invalid {
                    node: shape.name.clone(),
                    violations: vec![violation],
                })
            }
        };

        let mut violations = Vec::new();
        let mut fields = Vec::with_capacity(shape.attributes.len());

        for attribute in &shape.attributes {
            let outcome = match entries.remove(attribute.name()) {
                Some(datum) => self.validate_field(attribute, datum),
                None => match attribute.default() {
                    Some(default) => {
                        self.validate_field(attribute, Datum::Value(default.produce()))
                    }
                    None if attribute.is_optional() => continue,
                    None => Err(Violation::missing(attribute.name())),
                },
            };

            match outcome {
                Ok(datum) => fields.push((attribute.name().to_string(), datum)),
                Err(violation) => {
                    if let Some(fatal) = violation.declaration() {
                        return Err(fatal.clone().into());
                    }
                    violations.push(violation);
                }
            }
        }

        violations.extend(entries.into_keys().map(Violation::unexpected));

        if !violations.is_empty() {
            return Err(ResolveError::Invalid {
                node: shape.name.clone(),
                violations,
            });
        }

        Ok(Instance::new(self.hierarchy.id(), Arc::clone(shape), fields))
    }

    /// Turns input into a key/value table, promoting scalars where the kind allows.
    ///
    /// The outer result carries declaration errors, the inner one a root violation.
    fn normalize(
        &self,
        shape: &Shape,
        input: Datum,
    ) -> ResolveResult<Result<BTreeMap<String, Datum>, Violation>> {
        let mapping = match input {
            Datum::Value(Value::Object(map)) => map,
            Datum::Instance(foreign) => foreign.to_map(),
            other => {
                if !shape.kind.promotes_scalars() {
                    return Ok(Err(Violation::new(
                        ROOT,
                        ViolationKind::NotAMapping {
                            actual: other.type_name().to_string(),
                        },
                    )));
                }
                let attribute = sole_attribute(shape)?;
                let mut table = BTreeMap::new();
                table.insert(attribute.name().to_string(), other);
                return Ok(Ok(table));
            }
        };

        Ok(Ok(mapping
            .into_iter()
            .map(|(key, value)| (key, Datum::Value(value)))
            .collect()))
    }

    fn validate_field(&self, attribute: &Attribute, datum: Datum) -> Result<Datum, Violation> {
        let field = attribute.name();
        match attribute.field_type() {
            FieldType::Leaf(ty) => ty
                .validate(&datum.to_value())
                .map(Datum::Value)
                .map_err(|e| Violation::new(field, ViolationKind::Type(e))),
            FieldType::Node(node) => self.resolve_nested(*node, datum, field.to_string()),
            FieldType::List(node) => {
                let items = match datum {
                    Datum::List(items) => items,
                    Datum::Value(Value::Array(items)) => {
                        items.into_iter().map(Datum::Value).collect()
                    }
                    other => {
                        return Err(Violation::new(
                            field,
                            ViolationKind::Type(TypeError::Coercion {
                                expected: "array".into(),
                                actual: other.type_name().to_string(),
                            }),
                        ))
                    }
                };
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| self.resolve_nested(*node, item, format!("{}[{}]", field, i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Datum::List)
            }
        }
    }

    fn resolve_nested(&self, node: NodeId, datum: Datum, path: String) -> Result<Datum, Violation> {
        Resolver::new(self.hierarchy)
            .resolve(node, datum)
            .map(Datum::Instance)
            .map_err(|e| Violation::new(path, ViolationKind::Nested(Box::new(e))))
    }
}

/// The only attribute of a unit/value node.
fn sole_attribute(shape: &Shape) -> Result<&Attribute, DeclarationError> {
    match shape.attributes.as_slice() {
        [only] => Ok(only),
        _ => Err(DeclarationError::Arity {
            node: shape.name.clone(),
            attributes: shape.attribute_names(),
        }),
    }
}

impl Hierarchy {
    /// Direct construction: validates `node`'s own shape only.
    pub fn construct(&self, node: NodeId, input: impl Into<Datum>) -> ResolveResult<Instance> {
        Validator::new(self).construct(node, input)
    }

    /// Direct construction with an error interceptor.
    pub fn construct_or_else<F>(
        &self,
        node: NodeId,
        input: impl Into<Datum>,
        interceptor: F,
    ) -> ResolveResult<Instance>
    where
        F: FnOnce(ResolveError) -> ResolveResult<Instance>,
    {
        Validator::new(self).construct_or_else(node, input, interceptor)
    }
}
