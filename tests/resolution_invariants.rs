//! Resolution Invariant Tests
//!
//! Tests for construction and dispatch invariants:
//! - Concrete nodes only accept mappings
//! - Unit/value nodes promote scalars
//! - Mis-declared nodes fail whatever the input
//! - Dispatch follows the declared order
//! - Existing instances pass through unchanged
//! - Failed dispatch reports every attempt
//! - Defaults are applied and validated
//! - Aliases are accessors, not input keys

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aerotype::schema::{
    Attribute, Constraint, DeclarationError, FieldType, Hierarchy, NodeId, NodeKind, ResolveError,
    Severity, Type, ViolationKind,
};
use serde_json::json;

// =============================================================================
// Helper Functions
// =============================================================================

fn single(kind: NodeKind, attributes: &[&str]) -> (Hierarchy, NodeId) {
    let mut h = Hierarchy::new();
    let id = h
        .root(kind, "Node")
        .attributes(attributes.iter().map(|name| Attribute::new(*name, Type::any())))
        .build()
        .unwrap();
    (h, id)
}

fn three_children() -> (Hierarchy, NodeId) {
    let mut h = Hierarchy::new();
    let root = h.abstract_root("Letter").build().unwrap();
    for name in ["A", "B", "C"] {
        h.unit_variant(root, name)
            .attribute(Attribute::untyped("value"))
            .build()
            .unwrap();
    }
    (h, root)
}

fn variant_names(h: &Hierarchy, node: NodeId) -> Vec<String> {
    h.variants(node)
        .unwrap()
        .into_iter()
        .map(|id| h.name(id).unwrap().to_string())
        .collect()
}

// =============================================================================
// Strictness
// =============================================================================

/// Concrete nodes accept a mapping and never wrap scalars.
#[test]
fn test_concrete_strictness() {
    let mut h = Hierarchy::new();
    let person = h
        .concrete_root("Person")
        .attribute(Attribute::new("name", Type::string()))
        .build()
        .unwrap();

    let john = h.resolve(person, json!({"name": "John"})).unwrap();
    assert_eq!(john.value("name"), Some(&json!("John")));

    let err = h.resolve(person, json!("John")).unwrap_err();
    assert_eq!(err.code().code(), "AERO_TYPE_VALIDATION_FAILED");
    assert!(matches!(
        err.violations()[0].kind,
        ViolationKind::NotAMapping { .. }
    ));
}

/// Undeclared keys are rejected.
#[test]
fn test_unknown_keys_rejected() {
    let (h, node) = single(NodeKind::Concrete, &["name"]);
    let err = h.construct(node, json!({"name": "x", "extra": 1})).unwrap_err();
    assert_eq!(err.violations().len(), 1);
    assert_eq!(err.violations()[0].field, "extra");
}

// =============================================================================
// Unit Scalar Promotion
// =============================================================================

/// A bare value is equivalent to `{ id: value }`.
#[test]
fn test_unit_scalar_promotion() {
    let (h, node) = single(NodeKind::Unit, &["id"]);

    let from_scalar = h.construct(node, json!("dog")).unwrap();
    let from_mapping = h.construct(node, json!({"id": "dog"})).unwrap();
    assert_eq!(from_scalar, from_mapping);
    assert_eq!(from_scalar.value("id"), Some(&json!("dog")));
}

/// Value nodes promote scalars the same way.
#[test]
fn test_value_scalar_promotion() {
    let (h, node) = single(NodeKind::Value, &["amount"]);
    let instance = h.resolve(node, json!(12)).unwrap();
    assert_eq!(instance.to_value(), json!({"amount": 12}));
}

// =============================================================================
// Declaration Errors Are Independent of Input
// =============================================================================

/// A value node with two attributes fails for every input.
#[test]
fn test_value_arity_fails_for_every_input() {
    let (h, node) = single(NodeKind::Value, &["a", "b"]);

    for input in [json!({"a": 1, "b": 2}), json!(1), json!({}), json!(null)] {
        let err = h.construct(node, input).unwrap_err();
        assert!(err.is_declaration());
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(matches!(
            err,
            ResolveError::Declaration(DeclarationError::Arity { .. })
        ));
    }
}

/// A value node with no attributes is mis-declared too.
#[test]
fn test_value_without_attributes() {
    let (h, node) = single(NodeKind::Value, &[]);
    let err = h.construct(node, json!({})).unwrap_err();
    assert_eq!(err.to_string(), "[Node] has no attributes, one is required");
}

/// A unit node with two attributes fails for every input, mappings included.
#[test]
fn test_unit_arity_fails_for_every_input() {
    let (h, node) = single(NodeKind::Unit, &["a", "b"]);

    for input in [json!({"a": 1, "b": 2}), json!(1), json!({}), json!(null)] {
        let err = h.resolve(node, input).unwrap_err();
        assert_eq!(err.severity(), Severity::Fatal);
        assert!(matches!(
            err,
            ResolveError::Declaration(DeclarationError::Arity { .. })
        ));
    }
}

/// A mis-declared unit variant aborts dispatch even for well-formed mappings.
#[test]
fn test_unit_arity_aborts_dispatch() {
    let mut h = Hierarchy::new();
    let shape = h.abstract_root("Shape").build().unwrap();
    h.unit_variant(shape, "Rect")
        .attribute(Attribute::new("w", Type::int()))
        .attribute(Attribute::new("h", Type::int()))
        .build()
        .unwrap();
    h.concrete_variant(shape, "Square")
        .attribute(Attribute::new("side", Type::int()))
        .build()
        .unwrap();

    let err = h.resolve(shape, json!({"side": 2})).unwrap_err();
    assert!(err.is_declaration());
    assert!(err.attempts().is_empty());
}

/// An abstract node without variants cannot resolve anything.
#[test]
fn test_abstract_without_variants() {
    let mut h = Hierarchy::new();
    let root = h.abstract_root("Empty").build().unwrap();
    for input in [json!({}), json!(1), json!("x")] {
        let err = h.resolve(root, input).unwrap_err();
        assert_eq!(
            err,
            ResolveError::Declaration(DeclarationError::NoVariants {
                node: "Empty".into()
            })
        );
    }
}

// =============================================================================
// Ordering
// =============================================================================

/// Explicit ranks decide dispatch and display order.
#[test]
fn test_ordering() {
    let (mut h, root) = three_children();
    assert_eq!(variant_names(&h, root), ["A", "B", "C"]);

    h.order(root, ["C", "B", "A"]).unwrap();
    assert_eq!(variant_names(&h, root), ["C", "B", "A"]);
    assert_eq!(h.describe(root).unwrap(), "Letter<[C | B | A]>");
    assert_eq!(h.resolve(root, json!(1)).unwrap().name(), "C");

    h.order(root, ["A", "B", "C"]).unwrap();
    assert_eq!(variant_names(&h, root), ["A", "B", "C"]);
    assert_eq!(h.resolve(root, json!(1)).unwrap().name(), "A");
}

/// Unlisted children come first, in declaration order.
#[test]
fn test_unlisted_children_first() {
    let (mut h, root) = three_children();
    h.order(root, ["B"]).unwrap();
    assert_eq!(variant_names(&h, root), ["A", "C", "B"]);
}

// =============================================================================
// Idempotent Pass-Through
// =============================================================================

/// Constructing from an instance returns it without re-validation.
#[test]
fn test_pass_through() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut h = Hierarchy::new();
    let root = h.abstract_root("Event").build().unwrap();
    let click = h
        .concrete_variant(root, "Click")
        .attribute(Attribute::new("x", Type::int()))
        .attribute(Attribute::new("at", Type::int()).default_with(move || {
            json!(counter.fetch_add(1, Ordering::SeqCst))
        }))
        .build()
        .unwrap();

    let original = h.construct(click, json!({"x": 3})).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(h.construct(click, &original).unwrap(), original);
    assert_eq!(h.resolve(root, &original).unwrap(), original);
    assert_eq!(h.resolve(click, original.clone()).unwrap(), original);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// =============================================================================
// Aggregate Error Shape
// =============================================================================

/// Two failing children give exactly two attempts, in attempt order.
#[test]
fn test_aggregate_error_shape() {
    let mut h = Hierarchy::new();
    let root = h.abstract_root("Shape").build().unwrap();
    h.concrete_variant(root, "Square")
        .attribute(Attribute::new("side", Type::float()))
        .build()
        .unwrap();
    h.concrete_variant(root, "Circle")
        .attribute(Attribute::new("radius", Type::float()))
        .build()
        .unwrap();

    let err = h.resolve(root, json!({"width": 2})).unwrap_err();
    assert_eq!(err.code().code(), "AERO_TYPE_NO_VARIANT_MATCHED");

    let attempts = err.attempts();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].variant, "Square");
    assert_eq!(attempts[1].variant, "Circle");
    for attempt in attempts {
        assert_eq!(attempt.error.violations().len(), 2);
    }

    h.order(root, ["Circle", "Square"]).unwrap();
    let err = h.resolve(root, json!({"width": 2})).unwrap_err();
    assert_eq!(err.attempts()[0].variant, "Circle");
}

// =============================================================================
// Default Application and Validation
// =============================================================================

/// A fixed default fills an omitted key.
#[test]
fn test_fixed_default() {
    let mut h = Hierarchy::new();
    let counter = h
        .concrete_root("Counter")
        .attribute(Attribute::new("count", Type::int()).default_value(0))
        .build()
        .unwrap();

    let instance = h.resolve(counter, json!({})).unwrap();
    assert_eq!(instance.value("count"), Some(&json!(0)));
}

/// A producer yielding the wrong type is a field violation.
#[test]
fn test_bad_producer_default() {
    let mut h = Hierarchy::new();
    let counter = h
        .concrete_root("Counter")
        .attribute(Attribute::new("count", Type::int()).default_with(|| json!("zero")))
        .build()
        .unwrap();

    let err = h.resolve(counter, json!({})).unwrap_err();
    assert_eq!(err.code().code(), "AERO_TYPE_VALIDATION_FAILED");
    let violation = &err.violations()[0];
    assert_eq!(violation.field, "count");
    assert!(matches!(violation.kind, ViolationKind::Type(_)));
}

/// An optional attribute without a default is simply absent.
#[test]
fn test_optional_attribute_left_out() {
    let mut h = Hierarchy::new();
    let reply = h.abstract_root("Reply").build().unwrap();
    h.concrete_variant(reply, "Answer")
        .attribute(Attribute::new("text", Type::string()))
        .attribute(Attribute::new("quote", Type::string()).optional())
        .build()
        .unwrap();

    let answer = h.resolve(reply, json!({"text": "yes"})).unwrap();
    assert_eq!(answer.get("quote"), None);
    assert_eq!(answer.fields().count(), 1);

    let quoted = h
        .resolve(reply, json!({"text": "yes", "quote": "did you?"}))
        .unwrap();
    assert_eq!(quoted.value("quote"), Some(&json!("did you?")));

    let err = h.resolve(reply, json!({"quote": "did you?"})).unwrap_err();
    assert_eq!(err.attempts().len(), 1);
}

// =============================================================================
// Alias Transparency
// =============================================================================

/// Both names read the value; only the canonical one is an input key.
#[test]
fn test_alias_transparency() {
    let mut h = Hierarchy::new();
    let person = h
        .concrete_root("Person")
        .attribute(Attribute::new("name", Type::string()).alias("first_name"))
        .build()
        .unwrap();

    let john = h.resolve(person, json!({"name": "John"})).unwrap();
    assert_eq!(john.value("name"), Some(&json!("John")));
    assert_eq!(john.value("first_name"), Some(&json!("John")));
    assert_eq!(john.to_value(), json!({"name": "John"}));

    let err = h.resolve(person, json!({"first_name": "John"})).unwrap_err();
    let fields: Vec<&str> = err.violations().iter().map(|v| v.field.as_str()).collect();
    assert_eq!(fields, ["name", "first_name"]);
}

// =============================================================================
// Composition
// =============================================================================

/// Shared attributes of an abstract node flow into every variant.
#[test]
fn test_inherited_attributes_validate_in_variants() {
    let mut h = Hierarchy::new();
    let message = h
        .abstract_root("Message")
        .attribute(Attribute::new("id", Type::int()))
        .build()
        .unwrap();
    let text = h
        .concrete_variant(message, "Text")
        .attribute(Attribute::new("body", Type::string()))
        .build()
        .unwrap();
    h.concrete_variant(message, "Ping").build().unwrap();

    let resolved = h.resolve(message, json!({"id": 1, "body": "hi"})).unwrap();
    assert_eq!(resolved.node(), text);

    let ping = h.resolve(message, json!({"id": 2})).unwrap();
    assert_eq!(ping.name(), "Ping");
    assert_eq!(ping.to_value(), json!({"id": 2}));
}

/// Nested abstract fields are resolved dispatch-aware, lists element-wise.
#[test]
fn test_nested_and_list_fields() {
    let mut h = Hierarchy::new();
    let pet = h.abstract_root("Pet").build().unwrap();
    h.unit_variant(pet, "Dog")
        .attribute(Attribute::new("sound", Type::literal("woof")))
        .build()
        .unwrap();
    h.unit_variant(pet, "Cat")
        .attribute(Attribute::new("sound", Type::literal("meow")))
        .build()
        .unwrap();
    let owner = h
        .concrete_root("Owner")
        .attribute(Attribute::new("pets", FieldType::list_of(pet)))
        .build()
        .unwrap();

    let ok = h.resolve(owner, json!({"pets": ["meow", "woof"]})).unwrap();
    let names: Vec<&str> = ok
        .get("pets")
        .and_then(|d| d.as_list())
        .unwrap()
        .iter()
        .map(|d| d.as_instance().unwrap().name())
        .collect();
    assert_eq!(names, ["Cat", "Dog"]);

    let err = h.resolve(owner, json!({"pets": ["woof", "moo"]})).unwrap_err();
    assert_eq!(err.violations()[0].field, "pets[1]");
}

/// Constraints narrow leaf types and surface as constraint failures.
#[test]
fn test_constraints_reported_as_constraint_failures() {
    let mut h = Hierarchy::new();
    let user = h
        .concrete_root("User")
        .attribute(Attribute::new("email", Type::string()).constrain(Constraint::format(r"^\S+@\S+$").unwrap()))
        .attribute(Attribute::new("age", Type::int()).constrain(Constraint::Gteq(0.0)))
        .build()
        .unwrap();

    let err = h.resolve(user, json!({"email": "nope", "age": -1})).unwrap_err();
    for violation in err.violations() {
        match &violation.kind {
            ViolationKind::Type(e) => assert!(e.is_constraint()),
            other => panic!("expected constraint failure, got {:?}", other),
        }
    }
    assert_eq!(err.violations().len(), 2);
}

/// Interceptors turn non-fatal failures into fallbacks.
#[test]
fn test_interceptor_fallback() {
    let (h, root) = three_children();
    let mut h2 = Hierarchy::new();
    let strict = h2
        .concrete_root("Strict")
        .attribute(Attribute::new("n", Type::int()))
        .build()
        .unwrap();
    let fallback = h2.construct(strict, json!({"n": 0})).unwrap();

    let value = h2
        .resolve_or_else(strict, json!({"n": "x"}), |_| Ok(fallback.clone()))
        .unwrap();
    assert_eq!(value, fallback);

    // successful resolution never calls the interceptor
    let a = h
        .resolve_or_else(root, json!(1), |_| panic!("interceptor called"))
        .unwrap();
    assert_eq!(a.name(), "A");
}

/// Resolution is deterministic across repeated calls.
#[test]
fn test_resolution_is_deterministic() {
    let (h, root) = three_children();
    let first = h.resolve(root, json!({"value": [1, 2]})).unwrap();
    for _ in 0..100 {
        assert_eq!(h.resolve(root, json!({"value": [1, 2]})).unwrap(), first);
    }
}
