//! Node model and the hierarchy arena
//!
//! A hierarchy is a tree of nodes owned by a single [`Hierarchy`]. Each node
//! has a kind, a frozen [`Shape`] (name, lineage, effective attributes) and,
//! for abstract nodes, an ordered list of children.
//!
//! Invariants:
//! - A shape never changes once its node is built
//! - Only abstract nodes have children
//! - Children sort by rank, unranked first, declaration order breaking ties

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attribute::Attribute;
use super::errors::{DeclarationError, DeclarationResult};

/// Rank of children not named by [`Hierarchy::order`]
const UNRANKED: i64 = -1;

/// Handle to a node of one hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Construction strategy of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Pure dispatcher
    Abstract,
    /// Structured input only, strict
    Concrete,
    /// Promotes scalars when it has exactly one attribute
    Unit,
    /// Unit that must always have exactly one attribute
    Value,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Abstract => "abstract",
            NodeKind::Concrete => "concrete",
            NodeKind::Unit => "unit",
            NodeKind::Value => "value",
        }
    }

    /// Whether nodes of this kind dispatch to children.
    pub fn dispatches(&self) -> bool {
        matches!(self, NodeKind::Abstract)
    }

    /// Whether scalar input is promoted to `{ sole_attribute: scalar }`.
    pub fn promotes_scalars(&self) -> bool {
        matches!(self, NodeKind::Unit | NodeKind::Value)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Frozen description of one node, shared with the instances built from it
#[derive(Debug)]
pub struct Shape {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) kind: NodeKind,
    /// Root first, self last
    pub(crate) lineage: Vec<NodeId>,
    /// Effective attributes: inherited first, then own
    pub(crate) attributes: Vec<Attribute>,
    /// alias -> canonical name
    pub(crate) aliases: BTreeMap<String, String>,
}

impl Shape {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name().to_string()).collect()
    }

    /// Canonical name for a canonical name or alias.
    pub fn canonical<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.attributes.iter().any(|a| a.name() == name) {
            return Some(name);
        }
        self.aliases.get(name).map(String::as_str)
    }

    /// Whether this node is `ancestor` or one of its descendants.
    pub fn descends_from(&self, ancestor: NodeId) -> bool {
        self.lineage.contains(&ancestor)
    }
}

#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) shape: Arc<Shape>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) order: HashMap<String, i64>,
}

/// Owner of every node of one variant tree (or forest).
///
/// Declaration takes `&mut self`, resolution `&self`: once declared, a
/// hierarchy can be shared across threads and resolved without locking.
#[derive(Debug)]
pub struct Hierarchy {
    id: Uuid,
    pub(crate) nodes: Vec<Node>,
}

impl Default for Hierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl Hierarchy {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            nodes: Vec::new(),
        }
    }

    /// Unique identity, recorded by every instance built from this hierarchy.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of declared nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Id the next built node will receive.
    pub(crate) fn next_id(&self) -> NodeId {
        NodeId(self.nodes.len())
    }

    pub(crate) fn node(&self, id: NodeId) -> DeclarationResult<&Node> {
        self.nodes.get(id.0).ok_or(DeclarationError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> DeclarationResult<&mut Node> {
        self.nodes.get_mut(id.0).ok_or(DeclarationError::UnknownNode(id))
    }

    pub fn shape(&self, id: NodeId) -> DeclarationResult<&Arc<Shape>> {
        self.node(id).map(|n| &n.shape)
    }

    pub fn name(&self, id: NodeId) -> DeclarationResult<&str> {
        self.node(id).map(|n| n.shape.name.as_str())
    }

    pub fn kind(&self, id: NodeId) -> DeclarationResult<NodeKind> {
        self.node(id).map(|n| n.shape.kind)
    }

    pub fn parent(&self, id: NodeId) -> DeclarationResult<Option<NodeId>> {
        self.node(id).map(|n| n.parent)
    }

    /// Effective attributes of a node.
    pub fn attributes(&self, id: NodeId) -> DeclarationResult<&[Attribute]> {
        self.node(id).map(|n| n.shape.attributes.as_slice())
    }

    /// Nodes without a parent, in declaration order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.parent.is_none())
            .map(|n| n.shape.id)
            .collect()
    }

    /// First node with the given local name, in declaration order.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|n| n.shape.name == name)
            .map(|n| n.shape.id)
    }

    /// Direct child of `parent` with the given local name.
    pub fn child(&self, parent: NodeId, name: &str) -> DeclarationResult<Option<NodeId>> {
        let node = self.node(parent)?;
        Ok(node
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].shape.name == name))
    }

    /// Whether `candidate` is `ancestor` or one of its descendants.
    pub fn is_descendant(&self, candidate: NodeId, ancestor: NodeId) -> bool {
        self.node(candidate)
            .map(|n| n.shape.descends_from(ancestor))
            .unwrap_or(false)
    }

    /// Ranks the children of `node` by position in `names`.
    ///
    /// Replaces any previous ordering. Names need not cover every child and
    /// may name children that are declared later.
    pub fn order<I, S>(&mut self, node: NodeId, names: I) -> DeclarationResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let target = self.node_mut(node)?;
        if !target.shape.kind.dispatches() {
            return Err(DeclarationError::NotDispatchable {
                node: target.shape.name.clone(),
                kind: target.shape.kind,
            });
        }
        target.order = names
            .into_iter()
            .enumerate()
            .map(|(rank, name)| (name.into(), rank as i64))
            .collect();
        Ok(())
    }

    /// Children of `node` in dispatch order.
    pub fn variants(&self, node: NodeId) -> DeclarationResult<Vec<NodeId>> {
        let target = self.node(node)?;
        let mut children = target.children.clone();
        // sort_by_key is stable: equal ranks keep declaration order
        children.sort_by_key(|c| {
            target
                .order
                .get(&self.nodes[c.0].shape.name)
                .copied()
                .unwrap_or(UNRANKED)
        });
        Ok(children)
    }

    /// Recursive descriptor: `Name` for leaves, `Name<[A | B<[C]>]>` for
    /// abstract nodes, listing variants in dispatch order.
    pub fn describe(&self, node: NodeId) -> DeclarationResult<String> {
        let shape = self.shape(node)?;
        if !shape.kind.dispatches() {
            return Ok(shape.name.clone());
        }
        let variants = self
            .variants(node)?
            .into_iter()
            .map(|v| self.describe(v))
            .collect::<DeclarationResult<Vec<_>>>()?;
        Ok(format!("{}<[{}]>", shape.name, variants.join(" | ")))
    }
}
