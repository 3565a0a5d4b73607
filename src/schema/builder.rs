//! Schema builder
//!
//! Nodes are declared through a [`NodeBuilder`] obtained from the hierarchy,
//! one constructor per kind. `build()` validates the declaration, folds
//! constraints into leaf types, merges inherited attributes and freezes the
//! node. Nothing can be added to a node afterwards.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use super::attribute::Attribute;
use super::errors::{DeclarationError, DeclarationResult};
use super::node::{Hierarchy, Node, NodeId, NodeKind, Shape};

/// Pending node declaration
#[must_use = "a node is only declared once `build` is called"]
pub struct NodeBuilder<'h> {
    hierarchy: &'h mut Hierarchy,
    parent: Option<NodeId>,
    name: String,
    kind: NodeKind,
    attributes: Vec<Attribute>,
}

impl Hierarchy {
    /// Starts declaring a root node of the given kind.
    pub fn root(&mut self, kind: NodeKind, name: impl Into<String>) -> NodeBuilder<'_> {
        NodeBuilder::new(self, None, kind, name.into())
    }

    /// Starts declaring a variant of an abstract node.
    pub fn variant(
        &mut self,
        parent: NodeId,
        kind: NodeKind,
        name: impl Into<String>,
    ) -> NodeBuilder<'_> {
        NodeBuilder::new(self, Some(parent), kind, name.into())
    }

    pub fn abstract_root(&mut self, name: impl Into<String>) -> NodeBuilder<'_> {
        self.root(NodeKind::Abstract, name)
    }

    pub fn concrete_root(&mut self, name: impl Into<String>) -> NodeBuilder<'_> {
        self.root(NodeKind::Concrete, name)
    }

    pub fn unit_root(&mut self, name: impl Into<String>) -> NodeBuilder<'_> {
        self.root(NodeKind::Unit, name)
    }

    pub fn value_root(&mut self, name: impl Into<String>) -> NodeBuilder<'_> {
        self.root(NodeKind::Value, name)
    }

    pub fn abstract_variant(&mut self, parent: NodeId, name: impl Into<String>) -> NodeBuilder<'_> {
        self.variant(parent, NodeKind::Abstract, name)
    }

    pub fn concrete_variant(&mut self, parent: NodeId, name: impl Into<String>) -> NodeBuilder<'_> {
        self.variant(parent, NodeKind::Concrete, name)
    }

    pub fn unit_variant(&mut self, parent: NodeId, name: impl Into<String>) -> NodeBuilder<'_> {
        self.variant(parent, NodeKind::Unit, name)
    }

    pub fn value_variant(&mut self, parent: NodeId, name: impl Into<String>) -> NodeBuilder<'_> {
        self.variant(parent, NodeKind::Value, name)
    }
}

impl<'h> NodeBuilder<'h> {
    fn new(hierarchy: &'h mut Hierarchy, parent: Option<NodeId>, kind: NodeKind, name: String) -> Self {
        Self {
            hierarchy,
            parent,
            name,
            kind,
            attributes: Vec::new(),
        }
    }

    /// Id the node will have once built; usable for self-referencing fields.
    pub fn id(&self) -> NodeId {
        self.hierarchy.next_id()
    }

    /// Declares an attribute.
    ///
    /// On an abstract node the attribute is shared: every descendant inherits it.
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attributes(mut self, attributes: impl IntoIterator<Item = Attribute>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Freezes the node and attaches it to its parent.
    pub fn build(self) -> DeclarationResult<NodeId> {
        let id = self.hierarchy.next_id();

        let (inherited, mut lineage) = match self.parent {
            Some(parent) => {
                let node = self.hierarchy.node(parent)?;
                let shape = &node.shape;
                if !shape.kind.dispatches() {
                    return Err(DeclarationError::NotDispatchable {
                        node: shape.name.clone(),
                        kind: shape.kind,
                    });
                }
                if self.hierarchy.child(parent, &self.name)?.is_some() {
                    return Err(DeclarationError::DuplicateVariant {
                        node: shape.name.clone(),
                        variant: self.name,
                    });
                }
                (shape.attributes.clone(), shape.lineage.clone())
            }
            None => (Vec::new(), Vec::new()),
        };
        lineage.push(id);

        let attributes = merge_attributes(&self.name, inherited, self.attributes)?;
        let aliases = alias_table(&self.name, &attributes)?;

        let shape = Shape {
            id,
            name: self.name,
            kind: self.kind,
            lineage,
            attributes,
            aliases,
        };

        self.hierarchy.nodes.push(Node {
            shape: Arc::new(shape),
            parent: self.parent,
            children: Vec::new(),
            order: HashMap::new(),
        });
        if let Some(parent) = self.parent {
            self.hierarchy.node_mut(parent)?.children.push(id);
        }

        Ok(id)
    }
}

/// Inherited attributes keep their position; a redeclaration replaces the
/// inherited one in place. New attributes follow in declaration order.
fn merge_attributes(
    node: &str,
    inherited: Vec<Attribute>,
    own: Vec<Attribute>,
) -> DeclarationResult<Vec<Attribute>> {
    let inherited_count = inherited.len();
    let mut merged = inherited;
    let mut declared: Vec<String> = Vec::with_capacity(own.len());

    for attribute in own {
        let attribute = attribute.fold_constraints()?;
        if declared.iter().any(|d| d == attribute.name()) {
            return Err(DeclarationError::DuplicateAttribute {
                node: node.to_string(),
                attribute: attribute.name().to_string(),
            });
        }
        declared.push(attribute.name().to_string());

        match merged[..inherited_count]
            .iter()
            .position(|a| a.name() == attribute.name())
        {
            Some(index) => merged[index] = attribute,
            None => merged.push(attribute),
        }
    }

    Ok(merged)
}

fn alias_table(node: &str, attributes: &[Attribute]) -> DeclarationResult<BTreeMap<String, String>> {
    let mut table = BTreeMap::new();
    for attribute in attributes {
        for alias in attribute.aliases() {
            let clashes = attributes.iter().any(|a| a.name() == alias) || table.contains_key(alias);
            if clashes {
                return Err(DeclarationError::DuplicateAttribute {
                    node: node.to_string(),
                    attribute: alias.clone(),
                });
            }
            table.insert(alias.clone(), attribute.name().to_string());
        }
    }
    Ok(table)
}
