//! Validated instances
//!
//! An [`Instance`] is the output of a successful construction: the node it
//! was built as and its field values, keyed by canonical attribute name.
//! Aliases are read-only accessors over the same stored values.

use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::node::{NodeId, NodeKind, Shape};

/// A construction input or a validated field value
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// Raw or leaf-validated value
    Value(Value),
    /// Instance of a node
    Instance(Instance),
    /// Elements of a list-of-nodes field
    List(Vec<Datum>),
}

impl Datum {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Datum::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_instance(&self) -> Option<&Instance> {
        match self {
            Datum::Instance(i) => Some(i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Datum]> {
        match self {
            Datum::List(items) => Some(items),
            _ => None,
        }
    }

    /// Plain JSON rendering; instances become objects.
    pub fn to_value(&self) -> Value {
        match self {
            Datum::Value(v) => v.clone(),
            Datum::Instance(i) => i.to_value(),
            Datum::List(items) => Value::Array(items.iter().map(Datum::to_value).collect()),
        }
    }

    /// JSON type name, instances counting as objects.
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Datum::Value(v) => super::types::json_type_name(v),
            Datum::Instance(_) => "object",
            Datum::List(_) => "array",
        }
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Value(value)
    }
}

impl From<Instance> for Datum {
    fn from(instance: Instance) -> Self {
        Datum::Instance(instance)
    }
}

impl From<&Instance> for Datum {
    fn from(instance: &Instance) -> Self {
        Datum::Instance(instance.clone())
    }
}

impl Serialize for Datum {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// A validated instance of one node
#[derive(Debug, Clone)]
pub struct Instance {
    hierarchy: Uuid,
    shape: Arc<Shape>,
    /// In attribute declaration order
    fields: Vec<(String, Datum)>,
}

impl Instance {
    pub(crate) fn new(hierarchy: Uuid, shape: Arc<Shape>, fields: Vec<(String, Datum)>) -> Self {
        Self {
            hierarchy,
            shape,
            fields,
        }
    }

    /// Id of the hierarchy this instance was built in.
    pub fn hierarchy_id(&self) -> Uuid {
        self.hierarchy
    }

    /// Node this instance was built as.
    pub fn node(&self) -> NodeId {
        self.shape.id
    }

    pub fn name(&self) -> &str {
        &self.shape.name
    }

    pub fn kind(&self) -> NodeKind {
        self.shape.kind
    }

    /// Whether this is an instance of `node` or of one of its descendants.
    pub fn is_a(&self, hierarchy: Uuid, node: NodeId) -> bool {
        self.hierarchy == hierarchy && self.shape.descends_from(node)
    }

    /// Reads a field by canonical name or alias.
    pub fn get(&self, name: &str) -> Option<&Datum> {
        let canonical = self.shape.canonical(name)?;
        self.fields
            .iter()
            .find(|(field, _)| field == canonical)
            .map(|(_, datum)| datum)
    }

    /// Reads a leaf field by canonical name or alias.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Datum::as_value)
    }

    /// Fields in declaration order, canonical names only.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Datum)> {
        self.fields.iter().map(|(name, datum)| (name.as_str(), datum))
    }

    /// JSON object of canonical field names.
    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::with_capacity(self.fields.len());
        for (name, datum) in &self.fields {
            map.insert(name.clone(), datum.to_value());
        }
        map
    }
}

/// Same hierarchy, same node, same field contents.
impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.hierarchy == other.hierarchy
            && self.shape.id == other.shape.id
            && self.fields == other.fields
    }
}

impl Serialize for Instance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Hierarchy, Type};
    use serde_json::json;

    fn person() -> Instance {
        let mut h = Hierarchy::new();
        let id = h
            .concrete_root("Person")
            .attribute(Attribute::new("name", Type::string()).alias("first_name"))
            .attribute(Attribute::new("age", Type::int()))
            .build()
            .unwrap();
        let shape = Arc::clone(h.shape(id).unwrap());
        Instance::new(
            h.id(),
            shape,
            vec![
                ("name".into(), Datum::Value(json!("John"))),
                ("age".into(), Datum::Value(json!(42))),
            ],
        )
    }

    #[test]
    fn test_alias_reads_same_value() {
        let john = person();
        assert_eq!(john.value("name"), Some(&json!("John")));
        assert_eq!(john.value("first_name"), Some(&json!("John")));
        assert_eq!(john.value("nickname"), None);
    }

    #[test]
    fn test_to_value_uses_canonical_names() {
        let john = person();
        assert_eq!(john.to_value(), json!({"name": "John", "age": 42}));
        assert_eq!(serde_json::to_value(&john).unwrap(), john.to_value());
    }

    #[test]
    fn test_fields_keep_declaration_order() {
        let john = person();
        let names: Vec<&str> = john.fields().map(|(name, _)| name).collect();
        assert_eq!(names, ["name", "age"]);
    }

    #[test]
    fn test_datum_rendering() {
        let list = Datum::List(vec![Datum::Instance(person()), Datum::Value(json!(1))]);
        assert_eq!(list.to_value(), json!([{"name": "John", "age": 42}, 1]));
        assert_eq!(list.type_name(), "array");
        assert!(list.as_list().is_some());
    }
}
