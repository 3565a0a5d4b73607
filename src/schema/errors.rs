//! Error types for declaration and resolution
//!
//! Error codes:
//! - AERO_TYPE_DECLARATION (FATAL)
//! - AERO_TYPE_VALIDATION_FAILED (REJECT)
//! - AERO_TYPE_NO_VARIANT_MATCHED (REJECT)
//! - AERO_TYPE_HIERARCHY_EXISTS (FATAL)
//! - AERO_TYPE_MALFORMED_DEFINITION (FATAL)
//!
//! A declaration error is a fault in the hierarchy itself and aborts the
//! current call regardless of input. The other two describe bad input.

use std::fmt;

use thiserror::Error;

use super::node::{NodeId, NodeKind};
use super::types::TypeError;

/// Severity levels for resolution errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Input rejected
    Reject,
    /// The hierarchy is mis-declared
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Stable error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Hierarchy is malformed for the attempted operation
    AeroTypeDeclaration,
    /// Own-field validation failed
    AeroTypeValidationFailed,
    /// Every variant of a dispatcher rejected the input
    AeroTypeNoVariantMatched,
    /// A hierarchy with the same root name is already registered
    AeroTypeHierarchyExists,
    /// A definition file could not be read, parsed or declared
    AeroTypeMalformedDefinition,
}

impl ErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::AeroTypeDeclaration => "AERO_TYPE_DECLARATION",
            ErrorCode::AeroTypeValidationFailed => "AERO_TYPE_VALIDATION_FAILED",
            ErrorCode::AeroTypeNoVariantMatched => "AERO_TYPE_NO_VARIANT_MATCHED",
            ErrorCode::AeroTypeHierarchyExists => "AERO_TYPE_HIERARCHY_EXISTS",
            ErrorCode::AeroTypeMalformedDefinition => "AERO_TYPE_MALFORMED_DEFINITION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            ErrorCode::AeroTypeValidationFailed | ErrorCode::AeroTypeNoVariantMatched => {
                Severity::Reject
            }
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Faults in the hierarchy itself, independent of any input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeclarationError {
    /// An abstract node has nothing to dispatch to
    #[error("no variants defined for [{node}]")]
    NoVariants { node: String },

    /// Abstract nodes only dispatch; they are never built from their own fields
    #[error("[{node}] is abstract and cannot be constructed directly")]
    AbstractConstruction { node: String },

    /// A unit/value node needs exactly one attribute
    #[error("{}", arity_message(.node, .attributes))]
    Arity {
        node: String,
        attributes: Vec<String>,
    },

    #[error("attribute [{attribute}] is already defined on [{node}]")]
    DuplicateAttribute { node: String, attribute: String },

    #[error("variant [{variant}] is already defined under [{node}]")]
    DuplicateVariant { node: String, variant: String },

    /// Only abstract nodes carry variants
    #[error("[{node}] is {kind} and cannot have variants")]
    NotDispatchable { node: String, kind: NodeKind },

    #[error("node {0} does not belong to this hierarchy")]
    UnknownNode(NodeId),

    #[error("type reference [{0}] not found")]
    UnknownTypeReference(String),

    #[error("invalid constraint {constraint}: {reason}")]
    InvalidConstraint { constraint: String, reason: String },
}

fn arity_message(node: &str, attributes: &[String]) -> String {
    match attributes {
        [] => format!("[{}] has no attributes, one is required", node),
        _ => format!(
            "[{}] must have exactly one attribute, got [{}] ({})",
            node,
            attributes.join(", "),
            attributes.len()
        ),
    }
}

/// What went wrong with one field
#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    /// Required key absent and no default declared
    Missing,
    /// Key not declared on the node (strict mode)
    Unexpected,
    /// Structured input required, got a scalar
    NotAMapping { actual: String },
    /// Leaf validation failed
    Type(TypeError),
    /// A nested node rejected the field value
    Nested(Box<ResolveError>),
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Missing => write!(f, "is missing"),
            ViolationKind::Unexpected => write!(f, "is not a declared attribute"),
            ViolationKind::NotAMapping { actual } => write!(f, "expected a mapping, got {}", actual),
            ViolationKind::Type(e) => write!(f, "{}", e),
            ViolationKind::Nested(e) => write!(f, "{}", e),
        }
    }
}

/// Field-scoped validation failure
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Field path (e.g. "name", "pets[1]", "$root")
    pub field: String,
    pub kind: ViolationKind,
}

impl Violation {
    pub fn new(field: impl Into<String>, kind: ViolationKind) -> Self {
        Self {
            field: field.into(),
            kind,
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::new(field, ViolationKind::Missing)
    }

    pub fn unexpected(field: impl Into<String>) -> Self {
        Self::new(field, ViolationKind::Unexpected)
    }

    /// The declaration error carried by a nested failure, if any.
    pub(crate) fn declaration(&self) -> Option<&DeclarationError> {
        match &self.kind {
            ViolationKind::Nested(inner) => match inner.as_ref() {
                ResolveError::Declaration(e) => Some(e),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}' {}", self.field, self.kind)
    }
}

/// One failed variant attempt of a dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub variant: String,
    pub error: ResolveError,
}

impl fmt::Display for Attempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.variant, self.error)
    }
}

/// Resolution failure
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    /// Own-field validation failed; every field problem is listed
    #[error("[{node}] rejected input: {}", join(.violations))]
    Invalid {
        node: String,
        violations: Vec<Violation>,
    },

    /// No variant accepted the input; one entry per attempt, in attempt order
    #[error("no variant of [{node}] accepted input ({}): {}", .attempts.len(), join(.attempts))]
    Aggregate { node: String, attempts: Vec<Attempt> },
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ResolveError {
    /// Returns the error code
    pub fn code(&self) -> ErrorCode {
        match self {
            ResolveError::Declaration(_) => ErrorCode::AeroTypeDeclaration,
            ResolveError::Invalid { .. } => ErrorCode::AeroTypeValidationFailed,
            ResolveError::Aggregate { .. } => ErrorCode::AeroTypeNoVariantMatched,
        }
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code().severity()
    }

    pub fn is_declaration(&self) -> bool {
        matches!(self, ResolveError::Declaration(_))
    }

    /// Field violations of a validation failure.
    pub fn violations(&self) -> &[Violation] {
        match self {
            ResolveError::Invalid { violations, .. } => violations,
            _ => &[],
        }
    }

    /// Attempts of an aggregate failure.
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            ResolveError::Aggregate { attempts, .. } => attempts,
            _ => &[],
        }
    }
}

/// Result type for declaration operations
pub type DeclarationResult<T> = Result<T, DeclarationError>;

/// Result type for resolution operations
pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::AeroTypeDeclaration.code(), "AERO_TYPE_DECLARATION");
        assert_eq!(ErrorCode::AeroTypeValidationFailed.code(), "AERO_TYPE_VALIDATION_FAILED");
        assert_eq!(ErrorCode::AeroTypeNoVariantMatched.code(), "AERO_TYPE_NO_VARIANT_MATCHED");
        assert_eq!(ErrorCode::AeroTypeHierarchyExists.severity(), Severity::Fatal);
    }

    #[test]
    fn test_severity_levels() {
        let declaration: ResolveError = DeclarationError::NoVariants {
            node: "Animal".into(),
        }
        .into();
        assert_eq!(declaration.severity(), Severity::Fatal);
        assert!(declaration.is_declaration());

        let invalid = ResolveError::Invalid {
            node: "Person".into(),
            violations: vec![Violation::missing("name")],
        };
        assert_eq!(invalid.severity(), Severity::Reject);
        assert_eq!(invalid.violations().len(), 1);
    }

    #[test]
    fn test_arity_messages() {
        let none = DeclarationError::Arity {
            node: "Id".into(),
            attributes: vec![],
        };
        assert_eq!(none.to_string(), "[Id] has no attributes, one is required");

        let many = DeclarationError::Arity {
            node: "Id".into(),
            attributes: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            many.to_string(),
            "[Id] must have exactly one attribute, got [a, b] (2)"
        );
    }

    #[test]
    fn test_aggregate_display_lists_attempts_in_order() {
        let err = ResolveError::Aggregate {
            node: "Animal".into(),
            attempts: vec![
                Attempt {
                    variant: "Mammal".into(),
                    error: ResolveError::Invalid {
                        node: "Mammal".into(),
                        violations: vec![Violation::missing("id")],
                    },
                },
                Attempt {
                    variant: "Bird".into(),
                    error: ResolveError::Invalid {
                        node: "Bird".into(),
                        violations: vec![Violation::unexpected("wings")],
                    },
                },
            ],
        };

        let display = err.to_string();
        let mammal = display.find("Mammal:").unwrap();
        let bird = display.find("Bird:").unwrap();
        assert!(mammal < bird);
        assert!(display.contains("(2)"));
        assert_eq!(err.attempts().len(), 2);
    }
}
