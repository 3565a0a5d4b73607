//! Hierarchy loader for declarative definitions on disk
//!
//! - Definitions stored at `<schema_dir>/<root>.json`
//! - One root (and its whole variant tree) per file
//! - Root names are unique; a second registration is rejected
//! - Malformed files cause load failure (FATAL)
//!
//! `ref` and `list` types name another node of the same file. Names are
//! resolved before any node is declared, so a node may reference itself or
//! a node declared after it.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::attribute::{Attribute, FieldType};
use super::errors::{DeclarationError, ErrorCode};
use super::node::{Hierarchy, NodeId, NodeKind};
use super::types::{Constraint, Type};
use crate::observability::{log_event_with_fields, Event};

/// Origin recorded for definitions registered without a file
const IN_MEMORY: &str = "<in-memory>";

/// One node of a definition file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub name: String,
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeDef>,
    /// Dispatch ranking of `variants` by name
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<NodeDef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDef {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_def: TypeDef,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    /// `null` reads as "no default"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// The key may be omitted from input
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
    #[serde(default, skip_serializing_if = "ConstraintsDef::is_empty")]
    pub constraints: ConstraintsDef,
}

/// Attribute type: a type name or a tagged composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeDef {
    Named(String),
    Composite(CompositeDef),
}

impl Default for TypeDef {
    fn default() -> Self {
        TypeDef::Named("any".into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CompositeDef {
    Literal { value: Value },
    Array { of: Box<TypeDef> },
    Map { key: Box<TypeDef>, value: Box<TypeDef> },
    Union { of: Vec<TypeDef> },
    /// Nested node, resolved dispatch-aware
    Ref { node: String },
    /// Array of nested nodes
    List { node: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConstraintsDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<usize>,
    /// Inclusive `[min, max]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<(usize, usize)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gteq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lteq: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included_in: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_from: Option<Vec<Value>>,
}

impl ConstraintsDef {
    pub fn is_empty(&self) -> bool {
        *self == ConstraintsDef::default()
    }

    fn to_constraints(&self) -> Result<Vec<Constraint>, DeclarationError> {
        let mut constraints = Vec::new();
        if let Some(min) = self.min_size {
            constraints.push(Constraint::MinSize(min));
        }
        if let Some(max) = self.max_size {
            constraints.push(Constraint::MaxSize(max));
        }
        if let Some((min, max)) = self.size {
            constraints.push(Constraint::size(min, max)?);
        }
        if let Some(n) = self.gt {
            constraints.push(Constraint::Gt(n));
        }
        if let Some(n) = self.gteq {
            constraints.push(Constraint::Gteq(n));
        }
        if let Some(n) = self.lt {
            constraints.push(Constraint::Lt(n));
        }
        if let Some(n) = self.lteq {
            constraints.push(Constraint::Lteq(n));
        }
        if let Some(pattern) = &self.format {
            constraints.push(Constraint::format(pattern)?);
        }
        if let Some(values) = &self.included_in {
            constraints.push(Constraint::IncludedIn(values.clone()));
        }
        if let Some(values) = &self.excluded_from {
            constraints.push(Constraint::ExcludedFrom(values.clone()));
        }
        Ok(constraints)
    }
}

/// Loader errors
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("hierarchy [{0}] is already registered")]
    HierarchyExists(String),

    #[error("malformed definition {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("definition {path} does not declare: {source}")]
    Declaration {
        path: String,
        #[source]
        source: DeclarationError,
    },
}

impl LoaderError {
    fn malformed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        LoaderError::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            LoaderError::HierarchyExists(_) => ErrorCode::AeroTypeHierarchyExists,
            _ => ErrorCode::AeroTypeMalformedDefinition,
        }
    }
}

/// Result type for loader operations
pub type LoaderResult<T> = Result<T, LoaderError>;

/// A declared hierarchy together with the definition it came from
#[derive(Debug)]
pub struct LoadedHierarchy {
    hierarchy: Hierarchy,
    root: NodeId,
    definition: NodeDef,
    origin: String,
}

impl LoadedHierarchy {
    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn definition(&self) -> &NodeDef {
        &self.definition
    }

    /// File path, or `<in-memory>` for registered definitions.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Descriptor of the root node.
    pub fn describe(&self) -> String {
        self.hierarchy
            .describe(self.root)
            .unwrap_or_else(|_| self.definition.name.clone())
    }
}

/// Hierarchy loader that reads definition files from disk and keeps the
/// declared hierarchies by root name.
pub struct HierarchyLoader {
    schema_dir: PathBuf,
    hierarchies: BTreeMap<String, LoadedHierarchy>,
}

impl HierarchyLoader {
    pub fn new(schema_dir: impl Into<PathBuf>) -> Self {
        Self {
            schema_dir: schema_dir.into(),
            hierarchies: BTreeMap::new(),
        }
    }

    pub fn schema_dir(&self) -> &Path {
        &self.schema_dir
    }

    /// Loads every `*.json` file of the schema directory, in file name order.
    ///
    /// A missing directory is created and yields no hierarchies.
    pub fn load_all(&mut self) -> LoaderResult<()> {
        let dir = self.schema_dir.display().to_string();

        if !self.schema_dir.exists() {
            fs::create_dir_all(&self.schema_dir).map_err(|e| {
                LoaderError::malformed(&dir, format!("Failed to create schema directory: {}", e))
            })?;
            return Ok(());
        }

        let entries = fs::read_dir(&self.schema_dir).map_err(|e| {
            LoaderError::malformed(&dir, format!("Failed to read schema directory: {}", e))
        })?;

        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                LoaderError::malformed(&dir, format!("Failed to read directory entry: {}", e))
            })?;
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            paths.push(path);
        }
        paths.sort();

        for path in paths {
            self.load_file(&path)?;
        }

        Ok(())
    }

    /// Loads a single definition file and returns its root name.
    pub fn load_file(&mut self, path: &Path) -> LoaderResult<String> {
        let origin = path.display().to_string();
        let content = fs::read_to_string(path)
            .map_err(|e| LoaderError::malformed(&origin, format!("Failed to read file: {}", e)))?;

        let definition: NodeDef = serde_json::from_str(&content)
            .map_err(|e| LoaderError::malformed(&origin, format!("Invalid JSON: {}", e)))?;

        self.insert(definition, origin)
    }

    /// Registers a definition directly (for tests or programmatic creation).
    pub fn register(&mut self, definition: NodeDef) -> LoaderResult<String> {
        self.insert(definition, IN_MEMORY.to_string())
    }

    fn insert(&mut self, definition: NodeDef, origin: String) -> LoaderResult<String> {
        let name = definition.name.clone();
        if self.hierarchies.contains_key(&name) {
            return Err(LoaderError::HierarchyExists(name));
        }

        let (hierarchy, root) = declare(&definition, &origin)?;

        log_event_with_fields(
            Event::HierarchyLoaded,
            &[
                ("root", &name),
                ("nodes", &hierarchy.len().to_string()),
                ("path", &origin),
            ],
        );

        self.hierarchies.insert(
            name.clone(),
            LoadedHierarchy {
                hierarchy,
                root,
                definition,
                origin,
            },
        );
        Ok(name)
    }

    pub fn get(&self, root: &str) -> Option<&LoadedHierarchy> {
        self.hierarchies.get(root)
    }

    pub fn exists(&self, root: &str) -> bool {
        self.hierarchies.contains_key(root)
    }

    pub fn count(&self) -> usize {
        self.hierarchies.len()
    }

    /// Root names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.hierarchies.keys().map(String::as_str)
    }

    pub fn all(&self) -> impl Iterator<Item = &LoadedHierarchy> {
        self.hierarchies.values()
    }

    /// Writes a definition to `<schema_dir>/<root>.json`.
    ///
    /// An existing file for the same root is never overwritten.
    pub fn save_definition(&self, definition: &NodeDef) -> LoaderResult<PathBuf> {
        let path = self.schema_dir.join(format!("{}.json", definition.name));
        let origin = path.display().to_string();

        if path.exists() {
            return Err(LoaderError::HierarchyExists(definition.name.clone()));
        }

        if !self.schema_dir.exists() {
            fs::create_dir_all(&self.schema_dir).map_err(|e| {
                LoaderError::malformed(
                    self.schema_dir.display().to_string(),
                    format!("Failed to create schema directory: {}", e),
                )
            })?;
        }

        let content = serde_json::to_string_pretty(definition).map_err(|e| {
            LoaderError::malformed(&origin, format!("Failed to serialize definition: {}", e))
        })?;

        fs::write(&path, content)
            .map_err(|e| LoaderError::malformed(&origin, format!("Failed to write file: {}", e)))?;

        Ok(path)
    }
}

/// Node names of one file mapped to the ids they will receive.
///
/// Nodes are declared in preorder, so ids are known up front.
struct RefTable {
    ids: HashMap<String, Option<NodeId>>,
}

impl RefTable {
    fn new(definition: &NodeDef, base: usize) -> Self {
        let mut ids = HashMap::new();
        let mut index = base;
        collect_preorder(definition, &mut index, &mut ids);
        Self { ids }
    }

    fn lookup(&self, name: &str) -> Result<NodeId, String> {
        match self.ids.get(name) {
            Some(Some(id)) => Ok(*id),
            Some(None) => Err(format!(
                "reference [{}] is ambiguous, the name is declared more than once",
                name
            )),
            None => Err(format!("reference [{}] names no node of this file", name)),
        }
    }
}

fn collect_preorder(def: &NodeDef, index: &mut usize, ids: &mut HashMap<String, Option<NodeId>>) {
    let id = NodeId(*index);
    *index += 1;
    ids.entry(def.name.clone())
        .and_modify(|slot| *slot = None)
        .or_insert(Some(id));
    for variant in &def.variants {
        collect_preorder(variant, index, ids);
    }
}

/// Declares a whole definition tree into a fresh hierarchy.
fn declare(definition: &NodeDef, origin: &str) -> LoaderResult<(Hierarchy, NodeId)> {
    let mut hierarchy = Hierarchy::new();
    let refs = RefTable::new(definition, hierarchy.next_id().index());
    let root = declare_node(&mut hierarchy, None, definition, &refs, origin)?;
    Ok((hierarchy, root))
}

fn declare_node(
    hierarchy: &mut Hierarchy,
    parent: Option<NodeId>,
    def: &NodeDef,
    refs: &RefTable,
    origin: &str,
) -> LoaderResult<NodeId> {
    let declaration = |source| LoaderError::Declaration {
        path: origin.to_string(),
        source,
    };

    let attributes = def
        .attributes
        .iter()
        .map(|attr| attribute(attr, refs, origin))
        .collect::<LoaderResult<Vec<_>>>()?;

    let builder = match parent {
        Some(parent) => hierarchy.variant(parent, def.kind, def.name.as_str()),
        None => hierarchy.root(def.kind, def.name.as_str()),
    };
    let id = builder.attributes(attributes).build().map_err(declaration)?;

    if !def.order.is_empty() {
        hierarchy
            .order(id, def.order.iter().cloned())
            .map_err(declaration)?;
    }

    for variant in &def.variants {
        declare_node(hierarchy, Some(id), variant, refs, origin)?;
    }

    Ok(id)
}

fn attribute(def: &AttributeDef, refs: &RefTable, origin: &str) -> LoaderResult<Attribute> {
    let context = |reason: String| {
        LoaderError::malformed(origin, format!("attribute [{}]: {}", def.name, reason))
    };

    let field_type = match &def.type_def {
        TypeDef::Composite(CompositeDef::Ref { node }) => {
            FieldType::Node(refs.lookup(node).map_err(context)?)
        }
        TypeDef::Composite(CompositeDef::List { node }) => {
            FieldType::List(refs.lookup(node).map_err(context)?)
        }
        other => FieldType::Leaf(leaf_type(other).map_err(|e| context(e.to_string()))?),
    };

    let mut attribute = Attribute::new(def.name.as_str(), field_type);
    for alias in &def.aliases {
        attribute = attribute.alias(alias.as_str());
    }
    if let Some(default) = &def.default {
        attribute = attribute.default_value(default.clone());
    }
    if def.optional {
        attribute = attribute.optional();
    }
    for constraint in def
        .constraints
        .to_constraints()
        .map_err(|e| context(e.to_string()))?
    {
        attribute = attribute.constrain(constraint);
    }
    Ok(attribute)
}

fn leaf_type(def: &TypeDef) -> Result<Type, DeclarationError> {
    match def {
        TypeDef::Named(name) => Type::named(name),
        TypeDef::Composite(composite) => match composite {
            CompositeDef::Literal { value } => Ok(Type::literal(value.clone())),
            CompositeDef::Array { of } => Ok(Type::array(leaf_type(of)?)),
            CompositeDef::Map { key, value } => Ok(Type::map(leaf_type(key)?, leaf_type(value)?)),
            CompositeDef::Union { of } => Ok(Type::union_of(
                of.iter().map(leaf_type).collect::<Result<Vec<_>, _>>()?,
            )),
            CompositeDef::Ref { node } | CompositeDef::List { node } => {
                Err(DeclarationError::UnknownTypeReference(format!(
                    "{} (node references are only allowed as attribute types)",
                    node
                )))
            }
        },
    }
}
