//! Leaf type system
//!
//! Leaves are the primitive validate-or-fail units an attribute is checked
//! against. Supported leaves:
//! - any, null, bool, int, float, number, string
//! - fixed values (literal)
//! - array, object, map
//! - union and constrained composition
//! - coercible scalars
//! - custom adapters plugged in through [`LeafAdapter`]
//!
//! Validation is strict unless a coercible leaf is requested: an `int` leaf
//! rejects `10.0` and `"10"`, a `coercible.int` leaf accepts both.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::{Number, Value};
use thiserror::Error;

use super::errors::{DeclarationError, DeclarationResult};

/// Failure of a single leaf check.
///
/// The engine never inspects these beyond collecting and re-wrapping them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
    /// The value could not be converted to the expected type
    #[error("expected {expected}, got {actual}")]
    Coercion { expected: String, actual: String },
    /// The value converted but fails a refinement
    #[error("{value} violates {constraint}")]
    Constraint { constraint: String, value: Value },
}

impl TypeError {
    pub fn coercion(expected: impl Into<String>, actual: &Value) -> Self {
        Self::Coercion {
            expected: expected.into(),
            actual: json_type_name(actual).to_string(),
        }
    }

    pub fn constraint(constraint: &Constraint, value: &Value) -> Self {
        Self::Constraint {
            constraint: constraint.to_string(),
            value: value.clone(),
        }
    }

    /// Returns true for refinement failures.
    pub fn is_constraint(&self) -> bool {
        matches!(self, TypeError::Constraint { .. })
    }
}

/// Extension point for leaf checks the built-in types cannot express.
pub trait LeafAdapter: fmt::Debug + Send + Sync {
    /// Validates and possibly coerces a value.
    fn validate(&self, value: &Value) -> Result<Value, TypeError>;

    /// Name used in descriptors and error messages.
    fn name(&self) -> String;
}

/// Lossless conversions applied by coercible leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    Int,
    Float,
    String,
    Bool,
}

impl Coercion {
    fn apply(self, value: &Value) -> Result<Value, TypeError> {
        let expected = format!("coercible.{}", self.as_str());
        let converted = match (self, value) {
            (Coercion::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
            (Coercion::Int, Value::Number(n)) => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| Value::from(f as i64)),
            (Coercion::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
            (Coercion::Float, Value::Number(n)) => {
                n.as_f64().and_then(Number::from_f64).map(Value::Number)
            }
            (Coercion::Float, Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            (Coercion::String, Value::String(_)) => Some(value.clone()),
            (Coercion::String, Value::Number(n)) => Some(Value::String(n.to_string())),
            (Coercion::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
            (Coercion::Bool, Value::Bool(_)) => Some(value.clone()),
            (Coercion::Bool, Value::String(s)) => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        };

        converted.ok_or_else(|| TypeError::coercion(expected, value))
    }

    fn as_str(self) -> &'static str {
        match self {
            Coercion::Int => "int",
            Coercion::Float => "float",
            Coercion::String => "string",
            Coercion::Bool => "bool",
        }
    }
}

/// Refinement folded into a leaf at declaration time
#[derive(Debug, Clone)]
pub enum Constraint {
    MinSize(usize),
    MaxSize(usize),
    /// Inclusive bounds
    Size { min: usize, max: usize },
    Gt(f64),
    Gteq(f64),
    Lt(f64),
    Lteq(f64),
    Format(Regex),
    IncludedIn(Vec<Value>),
    ExcludedFrom(Vec<Value>),
}

impl Constraint {
    /// Compiles a `format` constraint.
    pub fn format(pattern: &str) -> DeclarationResult<Self> {
        Regex::new(pattern)
            .map(Constraint::Format)
            .map_err(|e| DeclarationError::InvalidConstraint {
                constraint: format!("format(/{}/)", pattern),
                reason: e.to_string(),
            })
    }

    /// Builds a `size` constraint, rejecting an empty range.
    pub fn size(min: usize, max: usize) -> DeclarationResult<Self> {
        if min > max {
            return Err(DeclarationError::InvalidConstraint {
                constraint: format!("size({}..={})", min, max),
                reason: "lower bound exceeds upper bound".into(),
            });
        }
        Ok(Constraint::Size { min, max })
    }

    fn check(&self, value: &Value) -> Result<(), TypeError> {
        let ok = match self {
            Constraint::MinSize(min) => size_of(value).is_some_and(|n| n >= *min),
            Constraint::MaxSize(max) => size_of(value).is_some_and(|n| n <= *max),
            Constraint::Size { min, max } => {
                size_of(value).is_some_and(|n| (*min..=*max).contains(&n))
            }
            Constraint::Gt(bound) => value.as_f64().is_some_and(|n| n > *bound),
            Constraint::Gteq(bound) => value.as_f64().is_some_and(|n| n >= *bound),
            Constraint::Lt(bound) => value.as_f64().is_some_and(|n| n < *bound),
            Constraint::Lteq(bound) => value.as_f64().is_some_and(|n| n <= *bound),
            Constraint::Format(re) => value.as_str().is_some_and(|s| re.is_match(s)),
            Constraint::IncludedIn(allowed) => allowed.contains(value),
            Constraint::ExcludedFrom(denied) => !denied.contains(value),
        };

        if ok {
            Ok(())
        } else {
            Err(TypeError::constraint(self, value))
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::MinSize(n) => write!(f, "min_size({})", n),
            Constraint::MaxSize(n) => write!(f, "max_size({})", n),
            Constraint::Size { min, max } => write!(f, "size({}..={})", min, max),
            Constraint::Gt(n) => write!(f, "gt({})", n),
            Constraint::Gteq(n) => write!(f, "gteq({})", n),
            Constraint::Lt(n) => write!(f, "lt({})", n),
            Constraint::Lteq(n) => write!(f, "lteq({})", n),
            Constraint::Format(re) => write!(f, "format(/{}/)", re.as_str()),
            Constraint::IncludedIn(values) => write!(f, "included_in({})", Value::from(values.clone())),
            Constraint::ExcludedFrom(values) => {
                write!(f, "excluded_from({})", Value::from(values.clone()))
            }
        }
    }
}

/// A leaf type
#[derive(Debug, Clone)]
pub enum Type {
    Any,
    Null,
    Bool,
    /// JSON integers only
    Int,
    /// Any JSON number
    Float,
    Number,
    String,
    /// Accepts exactly one value
    Literal(Value),
    /// Elementwise array
    Array(Box<Type>),
    /// Any mapping
    Object,
    /// Mapping with typed keys and values
    Map { key: Box<Type>, value: Box<Type> },
    /// First member that accepts wins
    Union(Vec<Type>),
    Constrained {
        inner: Box<Type>,
        constraints: Vec<Constraint>,
    },
    Coercible(Coercion),
    Custom(Arc<dyn LeafAdapter>),
}

impl Type {
    pub fn any() -> Self {
        Type::Any
    }

    pub fn string() -> Self {
        Type::String
    }

    pub fn int() -> Self {
        Type::Int
    }

    pub fn float() -> Self {
        Type::Float
    }

    pub fn bool() -> Self {
        Type::Bool
    }

    /// Fixed-value leaf.
    pub fn literal(value: impl Into<Value>) -> Self {
        Type::Literal(value.into())
    }

    pub fn array(of: Type) -> Self {
        Type::Array(Box::new(of))
    }

    /// Array whose elements match any of `members`; untyped when empty.
    pub fn array_of(members: impl IntoIterator<Item = Type>) -> Self {
        Type::array(Type::union_of(members))
    }

    pub fn map(key: Type, value: Type) -> Self {
        Type::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn custom(adapter: impl LeafAdapter + 'static) -> Self {
        Type::Custom(Arc::new(adapter))
    }

    /// Folds `members` with [`Type::union`]; `any` when empty.
    pub fn union_of(members: impl IntoIterator<Item = Type>) -> Self {
        members
            .into_iter()
            .reduce(Type::union)
            .unwrap_or(Type::Any)
    }

    /// A type accepting either `self` or `other`, tried in that order.
    pub fn union(self, other: Type) -> Self {
        let mut members = match self {
            Type::Union(members) => members,
            single => vec![single],
        };
        match other {
            Type::Union(more) => members.extend(more),
            single => members.push(single),
        }
        Type::Union(members)
    }

    /// Narrows acceptance; constraints accumulate on an already constrained type.
    pub fn constrain(self, constraints: impl IntoIterator<Item = Constraint>) -> Self {
        let mut extra: Vec<Constraint> = constraints.into_iter().collect();
        if extra.is_empty() {
            return self;
        }
        match self {
            Type::Constrained {
                inner,
                mut constraints,
            } => {
                constraints.append(&mut extra);
                Type::Constrained { inner, constraints }
            }
            inner => Type::Constrained {
                inner: Box::new(inner),
                constraints: extra,
            },
        }
    }

    /// Resolves a type reference such as `"string"`, `"strict.integer"` or
    /// `"coercible.float"`.
    pub fn named(reference: &str) -> DeclarationResult<Self> {
        let not_found = || DeclarationError::UnknownTypeReference(reference.to_string());

        if let Some(name) = reference.strip_prefix("coercible.") {
            let coercion = match name {
                "int" | "integer" => Coercion::Int,
                "float" => Coercion::Float,
                "string" => Coercion::String,
                "bool" | "boolean" => Coercion::Bool,
                _ => return Err(not_found()),
            };
            return Ok(Type::Coercible(coercion));
        }

        let name = reference.strip_prefix("strict.").unwrap_or(reference);
        let ty = match name {
            "any" => Type::Any,
            "null" => Type::Null,
            "bool" | "boolean" => Type::Bool,
            "int" | "integer" => Type::Int,
            "float" => Type::Float,
            "number" => Type::Number,
            "string" => Type::String,
            "array" => Type::array(Type::Any),
            "object" => Type::Object,
            _ => return Err(not_found()),
        };
        Ok(ty)
    }

    /// Validates a value, returning the (possibly coerced) accepted value.
    pub fn validate(&self, value: &Value) -> Result<Value, TypeError> {
        match self {
            Type::Any => Ok(value.clone()),
            Type::Null => accept(value.is_null(), self, value),
            Type::Bool => accept(value.is_boolean(), self, value),
            Type::Int => accept(value.is_i64() || value.is_u64(), self, value),
            Type::Float | Type::Number => accept(value.is_number(), self, value),
            Type::String => accept(value.is_string(), self, value),
            Type::Literal(expected) => {
                if value == expected {
                    Ok(value.clone())
                } else {
                    Err(TypeError::Coercion {
                        expected: self.name(),
                        actual: value.to_string(),
                    })
                }
            }
            Type::Array(of) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| TypeError::coercion(self.name(), value))?;
                items
                    .iter()
                    .map(|item| of.validate(item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Type::Object => accept(value.is_object(), self, value),
            Type::Map { key, value: of } => {
                let entries = value
                    .as_object()
                    .ok_or_else(|| TypeError::coercion(self.name(), value))?;
                let mut out = serde_json::Map::with_capacity(entries.len());
                for (k, v) in entries {
                    let coerced_key = match key.validate(&Value::String(k.clone()))? {
                        Value::String(s) => s,
                        other => return Err(TypeError::coercion("string key", &other)),
                    };
                    out.insert(coerced_key, of.validate(v)?);
                }
                Ok(Value::Object(out))
            }
            Type::Union(members) => {
                let mut last = None;
                for member in members {
                    match member.validate(value) {
                        Ok(accepted) => return Ok(accepted),
                        Err(e) => last = Some(e),
                    }
                }
                match (members.len(), last) {
                    (1, Some(only)) => Err(only),
                    _ => Err(TypeError::coercion(self.name(), value)),
                }
            }
            Type::Constrained { inner, constraints } => {
                let accepted = inner.validate(value)?;
                for constraint in constraints {
                    constraint.check(&accepted)?;
                }
                Ok(accepted)
            }
            Type::Coercible(coercion) => coercion.apply(value),
            Type::Custom(adapter) => adapter.validate(value),
        }
    }

    /// Returns true if `value` is accepted.
    pub fn is_valid(&self, value: &Value) -> bool {
        self.validate(value).is_ok()
    }

    /// Returns the type name for descriptors and error messages
    pub fn name(&self) -> String {
        match self {
            Type::Any => "any".into(),
            Type::Null => "null".into(),
            Type::Bool => "bool".into(),
            Type::Int => "int".into(),
            Type::Float => "float".into(),
            Type::Number => "number".into(),
            Type::String => "string".into(),
            Type::Literal(v) => format!("literal({})", v),
            Type::Array(of) => format!("array<{}>", of.name()),
            Type::Object => "object".into(),
            Type::Map { key, value } => format!("map<{}, {}>", key.name(), value.name()),
            Type::Union(members) => members
                .iter()
                .map(Type::name)
                .collect::<Vec<_>>()
                .join(" | "),
            Type::Constrained { inner, constraints } => format!(
                "{} where {}",
                inner.name(),
                constraints
                    .iter()
                    .map(Constraint::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Type::Coercible(c) => format!("coercible.{}", c.as_str()),
            Type::Custom(adapter) => adapter.name(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

fn accept(ok: bool, ty: &Type, value: &Value) -> Result<Value, TypeError> {
    if ok {
        Ok(value.clone())
    } else {
        Err(TypeError::coercion(ty.name(), value))
    }
}

fn size_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(entries) => Some(entries.len()),
        _ => None,
    }
}

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                "int"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Even;

    impl LeafAdapter for Even {
        fn validate(&self, value: &Value) -> Result<Value, TypeError> {
            match value.as_i64() {
                Some(n) if n % 2 == 0 => Ok(value.clone()),
                _ => Err(TypeError::coercion(self.name(), value)),
            }
        }

        fn name(&self) -> String {
            "even".into()
        }
    }

    #[test]
    fn test_strict_scalars() {
        assert!(Type::string().is_valid(&json!("John")));
        assert!(!Type::string().is_valid(&json!(1)));
        assert!(Type::int().is_valid(&json!(10)));
        assert!(!Type::int().is_valid(&json!(10.0)));
        assert!(!Type::int().is_valid(&json!("10")));
        assert!(Type::float().is_valid(&json!(10)));
        assert!(Type::float().is_valid(&json!(10.5)));
        assert!(Type::bool().is_valid(&json!(false)));
        assert!(Type::Null.is_valid(&Value::Null));
        assert!(Type::any().is_valid(&json!({"a": [1]})));
    }

    #[test]
    fn test_literal() {
        let ty = Type::literal("mammal");
        assert!(ty.is_valid(&json!("mammal")));

        let err = ty.validate(&json!("bird")).unwrap_err();
        assert_eq!(
            err,
            TypeError::Coercion {
                expected: "literal(\"mammal\")".into(),
                actual: "\"bird\"".into(),
            }
        );
    }

    #[test]
    fn test_array_elements() {
        let ty = Type::array_of([Type::int(), Type::float()]);
        assert!(ty.is_valid(&json!([10.0, 10])));
        assert!(!ty.is_valid(&json!(["10.0"])));
        assert!(!ty.is_valid(&json!(10)));

        let untyped = Type::array_of([]);
        assert!(untyped.is_valid(&json!([])));
        assert!(untyped.is_valid(&json!(["anything", 1])));
        assert!(!untyped.is_valid(&json!("not-an-array")));

        let nested = Type::array(Type::array(Type::string()));
        assert!(nested.is_valid(&json!([["string"]])));
        assert!(!nested.is_valid(&json!(["string"])));
    }

    #[test]
    fn test_map_keys_and_values() {
        let ty = Type::map(Type::literal("key"), Type::int());
        assert!(ty.is_valid(&json!({"key": 100})));
        assert!(!ty.is_valid(&json!({"other": 100})));
        assert!(!ty.is_valid(&json!({"key": "string"})));
        assert!(!ty.is_valid(&json!([])));
    }

    #[test]
    fn test_union_flattens_and_keeps_order() {
        let ty = Type::int().union(Type::float()).union(Type::string());
        match &ty {
            Type::Union(members) => assert_eq!(members.len(), 3),
            other => panic!("expected union, got {:?}", other),
        }
        assert_eq!(ty.name(), "int | float | string");
        assert!(!ty.is_valid(&json!(null)));
    }

    #[test]
    fn test_constraints() {
        let ty = Type::array(Type::string()).constrain([Constraint::MinSize(1)]);
        assert!(ty.is_valid(&json!(["string"])));

        let err = ty.validate(&json!([])).unwrap_err();
        assert!(err.is_constraint());

        let bounded = Type::int().constrain([Constraint::Gt(0.0), Constraint::Lteq(10.0)]);
        assert!(bounded.is_valid(&json!(10)));
        assert!(!bounded.is_valid(&json!(0)));
        assert!(!bounded.is_valid(&json!(11)));

        let sized = Type::string().constrain([Constraint::size(3, 5).unwrap()]);
        assert!(sized.is_valid(&json!("abcd")));
        assert!(!sized.is_valid(&json!("ab")));
    }

    #[test]
    fn test_constraints_accumulate() {
        let ty = Type::string()
            .constrain([Constraint::MinSize(1)])
            .constrain([Constraint::format("^[a-z]+$").unwrap()]);
        match &ty {
            Type::Constrained { constraints, .. } => assert_eq!(constraints.len(), 2),
            other => panic!("expected constrained, got {:?}", other),
        }
        assert!(ty.is_valid(&json!("abc")));
        assert!(!ty.is_valid(&json!("ABC")));
        assert!(!ty.is_valid(&json!("")));
    }

    #[test]
    fn test_invalid_constraint_declarations() {
        assert!(Constraint::format("(unclosed").is_err());
        assert!(Constraint::size(5, 1).is_err());
    }

    #[test]
    fn test_inclusion() {
        let ty = Type::string().constrain([Constraint::IncludedIn(vec![json!("a"), json!("b")])]);
        assert!(ty.is_valid(&json!("a")));
        assert!(!ty.is_valid(&json!("c")));
    }

    #[test]
    fn test_coercible() {
        let int = Type::named("coercible.integer").unwrap();
        assert_eq!(int.validate(&json!("10")).unwrap(), json!(10));
        assert_eq!(int.validate(&json!(10.0)).unwrap(), json!(10));
        assert!(int.validate(&json!("10.5")).is_err());

        let string = Type::named("coercible.string").unwrap();
        assert_eq!(string.validate(&json!(42)).unwrap(), json!("42"));

        let boolean = Type::named("coercible.bool").unwrap();
        assert_eq!(boolean.validate(&json!("true")).unwrap(), json!(true));
        assert!(boolean.validate(&json!("yes")).is_err());
    }

    #[test]
    fn test_named_references() {
        assert!(Type::named("strict.string").unwrap().is_valid(&json!("s")));
        assert!(Type::named("integer").unwrap().is_valid(&json!(1)));
        assert!(Type::named("object").unwrap().is_valid(&json!({})));
        assert_eq!(
            Type::named("widget").unwrap_err(),
            DeclarationError::UnknownTypeReference("widget".into())
        );
    }

    #[test]
    fn test_custom_adapter() {
        let ty = Type::custom(Even);
        assert!(ty.is_valid(&json!(4)));
        assert!(!ty.is_valid(&json!(3)));
        assert_eq!(ty.name(), "even");
    }

    #[test]
    fn test_json_type_names() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!(1)), "int");
        assert_eq!(json_type_name(&json!(1.5)), "float");
        assert_eq!(json_type_name(&json!("s")), "string");
        assert_eq!(json_type_name(&json!([])), "array");
        assert_eq!(json_type_name(&json!({})), "object");
    }
}
