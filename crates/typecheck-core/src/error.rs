//! # Error Types — Validation Failure Taxonomy
//!
//! Every failed check surfaces as one error type, [`TypeCheckError`], whose
//! `Display` output is a single human-readable line:
//!
//! ```text
//! average_all: parameter `values`, index 3: expected int, got str
//! ```
//!
//! The message is assembled from three parts: the call [`Site`] (which
//! parameter, the return value, or a lazily consumed element), a
//! [`FieldPath`] into the offending value, and the [`Violation`] itself.
//! Callers that need to branch use [`TypeCheckError::kind`]; there is no
//! richer wire format.
//!
//! The matcher reports failures as [`CheckFailure`] (path + violation, no
//! call site); the wrapper attaches the site when it converts a failure into
//! a [`TypeCheckError`].

use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Violation
// ---------------------------------------------------------------------------

/// What went wrong, independent of where.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// The value's structural type does not match its descriptor.
    #[error("expected {expected}, got {actual}")]
    Mismatch {
        /// Rendered descriptor.
        expected: String,
        /// Runtime type name (or literal value) observed.
        actual: String,
    },

    /// A typed mapping lacks a required key.
    #[error("missing required field '{field}' of {mapping}")]
    MissingField {
        /// Name of the typed mapping.
        mapping: String,
        /// The absent key.
        field: String,
    },

    /// A typed mapping carries an undeclared key while strict mode is active.
    #[error("unexpected field '{field}' for {mapping} (strict mode)")]
    ExtraField {
        /// Name of the typed mapping.
        mapping: String,
        /// The undeclared key.
        field: String,
    },

    /// A constrained type variable saw a type outside its constraint list.
    #[error("type variable {name}: {actual} is not one of ({})", .allowed.join(", "))]
    TypeVarConstraint {
        /// Type variable name.
        name: String,
        /// Runtime type observed.
        actual: String,
        /// Rendered constraints.
        allowed: Vec<String>,
    },

    /// A bounded type variable saw a type that does not satisfy its bound.
    #[error("type variable {name}: {actual} does not satisfy bound {bound}")]
    TypeVarBound {
        /// Type variable name.
        name: String,
        /// Rendered bound.
        bound: String,
        /// Runtime type observed.
        actual: String,
    },

    /// Two occurrences of one type variable within a call disagree.
    #[error("type variable {name} is bound to {bound} in this call, got {actual}")]
    TypeVarInconsistent {
        /// Type variable name.
        name: String,
        /// Type bound at the first occurrence.
        bound: String,
        /// Runtime type observed at this occurrence.
        actual: String,
    },

    /// A required protocol member is absent.
    #[error("{actual} does not satisfy protocol {protocol}: missing member '{member}'")]
    ProtocolMember {
        /// Protocol name.
        protocol: String,
        /// The absent member.
        member: String,
        /// Runtime type observed.
        actual: String,
    },

    /// A protocol method exists but cannot be called with the declared arity.
    #[error(
        "{actual} does not satisfy protocol {protocol}: '{member}' takes {found} argument(s), \
         protocol calls it with {required}"
    )]
    ProtocolArity {
        /// Protocol name.
        protocol: String,
        /// The member whose call shape differs.
        member: String,
        /// Runtime type observed.
        actual: String,
        /// Argument count the protocol declares.
        required: usize,
        /// Rendered call shape of the value's method.
        found: String,
    },

    /// A forward reference could not be resolved under the strict policy.
    #[error("unresolved forward reference '{name}'")]
    UnresolvedForwardRef {
        /// The textual reference.
        name: String,
    },

    /// A construct the matcher does not understand, under the `error` policy.
    #[error("unsupported type construct '{construct}'")]
    UnsupportedConstruct {
        /// The construct's name.
        construct: String,
    },

    /// Strict return mode is active and the callable declares no return type.
    #[error("missing return annotation (strict return mode)")]
    MissingReturnAnnotation,

    /// Arguments could not be bound to the declared parameters.
    #[error("{0}")]
    Binding(String),
}

// ---------------------------------------------------------------------------
// ErrorKind
// ---------------------------------------------------------------------------

/// Discriminant for callers that branch on the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ParameterMismatch,
    ReturnMismatch,
    MissingReturnAnnotation,
    MissingField,
    ExtraField,
    TypeVarConstraint,
    TypeVarInconsistent,
    ProtocolNonConformance,
    UnresolvedForwardRef,
    UnsupportedConstruct,
    Binding,
}

impl ErrorKind {
    /// Stable snake_case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParameterMismatch => "parameter_mismatch",
            Self::ReturnMismatch => "return_mismatch",
            Self::MissingReturnAnnotation => "missing_return_annotation",
            Self::MissingField => "missing_field",
            Self::ExtraField => "extra_field",
            Self::TypeVarConstraint => "typevar_constraint",
            Self::TypeVarInconsistent => "typevar_inconsistent",
            Self::ProtocolNonConformance => "protocol_non_conformance",
            Self::UnresolvedForwardRef => "unresolved_forward_ref",
            Self::UnsupportedConstruct => "unsupported_construct",
            Self::Binding => "binding",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Site and FieldPath
// ---------------------------------------------------------------------------

/// Where in a call a failure was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Site {
    /// A bound parameter, before the callable runs.
    Parameter(String),
    /// The result, after the callable completes.
    Return,
    /// An element of a lazily validated parameter, at consumption time.
    LazyElement {
        /// The parameter the producer was passed as.
        parameter: String,
        /// Zero-based position of the element in the produced sequence.
        index: usize,
    },
    /// The argument list as a whole (arity and keyword binding).
    Call,
    /// A free-standing value check outside any call.
    Value,
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Site::Parameter(name) => write!(f, "parameter `{name}`"),
            Site::Return => f.write_str("return value"),
            Site::LazyElement { parameter, index } => {
                write!(f, "parameter `{parameter}`, element {index}")
            }
            Site::Call => f.write_str("arguments"),
            Site::Value => f.write_str("value"),
        }
    }
}

/// One step into a nested value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Position in a list, tuple, or set.
    Index(usize),
    /// Key of a plain mapping.
    Key(String),
    /// Value under a mapping key.
    Value(String),
    /// Declared field of a typed mapping.
    Field(String),
    /// Element of a variadic parameter.
    Variadic(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Index(i) => write!(f, "index {i}"),
            PathSegment::Key(k) => write!(f, "key {k}"),
            PathSegment::Value(k) => write!(f, "value at key {k}"),
            PathSegment::Field(name) => write!(f, "field '{name}'"),
            PathSegment::Variadic(i) => write!(f, "argument {i}"),
        }
    }
}

/// Path from the checked value down to the offending element, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Prefix the path with an enclosing segment.
    pub fn push_front(&mut self, segment: PathSegment) {
        self.0.insert(0, segment);
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, ", {segment}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CheckFailure
// ---------------------------------------------------------------------------

/// A failure detected by the matcher, before a call site is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    /// Path from the checked value to the offending element.
    pub path: FieldPath,
    /// What went wrong.
    pub violation: Violation,
}

impl CheckFailure {
    pub fn new(violation: Violation) -> Self {
        Self {
            path: FieldPath::new(),
            violation,
        }
    }

    /// Shorthand for a [`Violation::Mismatch`].
    pub fn mismatch(expected: impl fmt::Display, actual: impl Into<String>) -> Self {
        Self::new(Violation::Mismatch {
            expected: expected.to_string(),
            actual: actual.into(),
        })
    }

    /// Record that the failure happened inside `segment`.
    pub fn within(mut self, segment: PathSegment) -> Self {
        self.path.push_front(segment);
        self
    }

    /// Whether this is a shape mismatch, as opposed to a policy violation
    /// (strict forward reference, unsupported construct) that must abort
    /// matching even inside a union.
    pub fn is_mismatch(&self) -> bool {
        matches!(
            self.violation,
            Violation::Mismatch { .. }
                | Violation::MissingField { .. }
                | Violation::ExtraField { .. }
                | Violation::ProtocolMember { .. }
                | Violation::ProtocolArity { .. }
                | Violation::TypeVarConstraint { .. }
                | Violation::TypeVarBound { .. }
                | Violation::TypeVarInconsistent { .. }
        )
    }

    /// Attach the call site.
    pub fn at(self, function: impl Into<String>, site: Site) -> TypeCheckError {
        TypeCheckError {
            function: function.into(),
            site,
            path: self.path,
            violation: self.violation,
        }
    }
}

// ---------------------------------------------------------------------------
// TypeCheckError
// ---------------------------------------------------------------------------

/// The single error surfaced to callers of checked functions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{function}: {site}{path}: {violation}")]
pub struct TypeCheckError {
    /// Name of the checked callable.
    pub function: String,
    /// Where in the call the failure occurred.
    pub site: Site,
    /// Path into the offending value.
    pub path: FieldPath,
    /// What went wrong.
    pub violation: Violation,
}

impl TypeCheckError {
    /// Build an error with an empty path.
    pub fn new(function: impl Into<String>, site: Site, violation: Violation) -> Self {
        CheckFailure::new(violation).at(function, site)
    }

    /// A binding failure (arity, unknown keyword, missing argument).
    pub fn binding(function: impl Into<String>, site: Site, message: impl Into<String>) -> Self {
        Self::new(function, site, Violation::Binding(message.into()))
    }

    /// Failure category.
    pub fn kind(&self) -> ErrorKind {
        match &self.violation {
            Violation::Mismatch { .. } => match self.site {
                Site::Return => ErrorKind::ReturnMismatch,
                _ => ErrorKind::ParameterMismatch,
            },
            Violation::MissingField { .. } => ErrorKind::MissingField,
            Violation::ExtraField { .. } => ErrorKind::ExtraField,
            Violation::TypeVarConstraint { .. } | Violation::TypeVarBound { .. } => {
                ErrorKind::TypeVarConstraint
            }
            Violation::TypeVarInconsistent { .. } => ErrorKind::TypeVarInconsistent,
            Violation::ProtocolMember { .. } | Violation::ProtocolArity { .. } => {
                ErrorKind::ProtocolNonConformance
            }
            Violation::UnresolvedForwardRef { .. } => ErrorKind::UnresolvedForwardRef,
            Violation::UnsupportedConstruct { .. } => ErrorKind::UnsupportedConstruct,
            Violation::MissingReturnAnnotation => ErrorKind::MissingReturnAnnotation,
            Violation::Binding(_) => ErrorKind::Binding,
        }
    }
}

// ---------------------------------------------------------------------------
// ParseError
// ---------------------------------------------------------------------------

/// Malformed type-expression text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The expression is empty.
    #[error("empty type expression")]
    Empty,

    /// A character that cannot start or continue a token.
    #[error("unexpected character '{ch}' at offset {offset} in '{input}'")]
    UnexpectedChar {
        ch: char,
        offset: usize,
        input: String,
    },

    /// A token that is valid but not here.
    #[error("unexpected '{found}' in '{input}', expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: &'static str,
        input: String,
    },

    /// Input ended in the middle of an expression.
    #[error("unexpected end of type expression '{input}'")]
    UnexpectedEnd { input: String },

    /// A generic construct received the wrong number of arguments.
    #[error("{construct} takes {expected} argument(s) in '{input}'")]
    Arity {
        construct: String,
        expected: &'static str,
        input: String,
    },

    /// A `Literal[...]` member that is not a literal.
    #[error("invalid literal '{literal}' in '{input}'")]
    InvalidLiteral { literal: String, input: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_renders_site_path_and_violation() {
        let err = CheckFailure::mismatch("int", "str")
            .within(PathSegment::Index(3))
            .at("average_all", Site::Parameter("values".into()));
        assert_eq!(
            err.to_string(),
            "average_all: parameter `values`, index 3: expected int, got str"
        );
        assert_eq!(err.kind(), ErrorKind::ParameterMismatch);
    }

    #[test]
    fn nested_paths_are_outermost_first() {
        let err = CheckFailure::mismatch("int", "str")
            .within(PathSegment::Field("age".into()))
            .within(PathSegment::Index(0))
            .at("load", Site::Return);
        assert_eq!(
            err.to_string(),
            "load: return value, index 0, field 'age': expected int, got str"
        );
        assert_eq!(err.kind(), ErrorKind::ReturnMismatch);
    }

    #[test]
    fn constraint_message_lists_allowed_types() {
        let err = TypeCheckError::new(
            "echo",
            Site::Parameter("x".into()),
            Violation::TypeVarConstraint {
                name: "T".into(),
                actual: "float".into(),
                allowed: vec!["int".into(), "str".into()],
            },
        );
        assert!(err.to_string().contains("float is not one of (int, str)"));
        assert_eq!(err.kind(), ErrorKind::TypeVarConstraint);
    }

    #[test]
    fn policy_violations_are_not_plain_mismatches() {
        let fwd = CheckFailure::new(Violation::UnresolvedForwardRef { name: "X".into() });
        assert!(!fwd.is_mismatch());
        assert!(CheckFailure::mismatch("int", "str").is_mismatch());
    }

    #[test]
    fn error_kind_identifiers_are_stable() {
        assert_eq!(ErrorKind::TypeVarInconsistent.as_str(), "typevar_inconsistent");
        assert_eq!(ErrorKind::MissingReturnAnnotation.to_string(), "missing_return_annotation");
    }
}
