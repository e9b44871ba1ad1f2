//! # Type Descriptors
//!
//! A [`TypeDescriptor`] is the canonical, immutable representation of a
//! declared type expression. Descriptors are built once per signature
//! (either through the constructor helpers below or by parsing annotation
//! text, see [`crate::parse`]) and never mutated afterwards.
//!
//! Equality and hashing are structural, so two callables declaring
//! `dict[str, int]` produce equal descriptors and can share one interned
//! allocation (see [`crate::intern`]).
//!
//! ## Kinds
//!
//! | kind | matched by |
//! |------|------------|
//! | `Any` | always |
//! | `Primitive` | registry predicate for the name, else instance check |
//! | `Container` | element-wise, subject to sampling |
//! | `Union` / `Optional` | first matching alternative |
//! | `Literal` | value equality |
//! | `TypedMapping` | required/optional field schema |
//! | `Protocol` | member presence and arity |
//! | `TypeVar` | call-scoped binding |
//! | `Annotated` | inner descriptor; metadata ignored |
//! | `ForwardRef` | namespace lookup at validation time |
//! | `NewType` | registry predicate for the name, else the underlying type |
//! | `Unsupported` | fallback policy |

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// The shape of a parameterized collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// `list[T]`
    List,
    /// `set[T]` / `frozenset[T]`
    Set,
    /// `dict[K, V]` / `Mapping[K, V]`
    Mapping,
    /// `tuple[A, B, C]`, one descriptor per position.
    Tuple,
    /// `tuple[T, ...]`
    VarTuple,
    /// `Sequence[T]`: list or tuple.
    Sequence,
    /// `Iterable[T]`: any materialized collection or a producer.
    Iterable,
}

impl ContainerKind {
    /// Annotation spelling used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Set => "set",
            Self::Mapping => "dict",
            Self::Tuple | Self::VarTuple => "tuple",
            Self::Sequence => "Sequence",
            Self::Iterable => "Iterable",
        }
    }
}

/// A value allowed by a `Literal[...]` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    None,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl LiteralValue {
    /// Exact equality with a runtime value. `True` is not `1`.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (LiteralValue::None, Value::None) => true,
            (LiteralValue::Bool(a), Value::Bool(b)) => a == b,
            (LiteralValue::Int(a), Value::Int(b)) => a == b,
            (LiteralValue::Str(a), Value::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::None => f.write_str("None"),
            LiteralValue::Bool(true) => f.write_str("True"),
            LiteralValue::Bool(false) => f.write_str("False"),
            LiteralValue::Int(n) => write!(f, "{n}"),
            LiteralValue::Str(s) => write!(f, "'{s}'"),
        }
    }
}

/// One declared field of a typed mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedField {
    pub name: String,
    pub descriptor: TypeDescriptor,
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl TypedField {
    pub fn required(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, descriptor: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            descriptor,
            required: false,
        }
    }
}

/// One member a protocol requires.
///
/// `arity` is the number of arguments the protocol calls the member with
/// (receiver excluded); `None` means a plain attribute, or a method whose
/// call shape is not checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolMember {
    pub name: String,
    #[serde(default)]
    pub arity: Option<usize>,
}

impl ProtocolMember {
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arity: None,
        }
    }

    pub fn method(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity: Some(arity),
        }
    }
}

// ---------------------------------------------------------------------------
// TypeDescriptor
// ---------------------------------------------------------------------------

/// Structural representation of a declared type expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescriptor {
    /// Matches every value.
    Any,
    /// A named runtime type: `int`, `str`, `NoneType`, or a class name.
    Primitive { name: String },
    /// A parameterized collection. Empty `elements` leaves elements unchecked.
    Container {
        container: ContainerKind,
        #[serde(default)]
        elements: Vec<TypeDescriptor>,
    },
    /// Matches if any alternative does, tried in declaration order.
    Union { alternatives: Vec<TypeDescriptor> },
    /// `Optional[T]`, sugar for `T | None`.
    Optional { inner: Box<TypeDescriptor> },
    /// One of a fixed set of values.
    Literal { values: Vec<LiteralValue> },
    /// A mapping with a per-key schema, in declaration order.
    TypedMapping { name: String, fields: Vec<TypedField> },
    /// Structural conformance to a member set.
    Protocol {
        name: String,
        members: Vec<ProtocolMember>,
    },
    /// A type variable bound per call.
    TypeVar {
        name: String,
        #[serde(default)]
        constraints: Vec<TypeDescriptor>,
        #[serde(default)]
        bound: Option<Box<TypeDescriptor>>,
    },
    /// An inner descriptor plus metadata that validation ignores.
    Annotated {
        inner: Box<TypeDescriptor>,
        #[serde(default)]
        metadata: Vec<String>,
    },
    /// A textual reference resolved at validation time.
    ForwardRef { name: String },
    /// A distinct name over an underlying type.
    NewType {
        name: String,
        underlying: Box<TypeDescriptor>,
    },
    /// A construct the matcher does not structurally understand.
    Unsupported { construct: String },
}

impl TypeDescriptor {
    pub fn any() -> Self {
        Self::Any
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::Primitive { name: name.into() }
    }

    pub fn int() -> Self {
        Self::primitive("int")
    }

    pub fn float() -> Self {
        Self::primitive("float")
    }

    pub fn str() -> Self {
        Self::primitive("str")
    }

    pub fn bool() -> Self {
        Self::primitive("bool")
    }

    pub fn bytes() -> Self {
        Self::primitive("bytes")
    }

    pub fn none() -> Self {
        Self::primitive("NoneType")
    }

    pub fn container(container: ContainerKind, elements: Vec<TypeDescriptor>) -> Self {
        Self::Container {
            container,
            elements,
        }
    }

    pub fn list(element: TypeDescriptor) -> Self {
        Self::container(ContainerKind::List, vec![element])
    }

    pub fn set(element: TypeDescriptor) -> Self {
        Self::container(ContainerKind::Set, vec![element])
    }

    pub fn mapping(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        Self::container(ContainerKind::Mapping, vec![key, value])
    }

    pub fn tuple(elements: Vec<TypeDescriptor>) -> Self {
        Self::container(ContainerKind::Tuple, elements)
    }

    pub fn var_tuple(element: TypeDescriptor) -> Self {
        Self::container(ContainerKind::VarTuple, vec![element])
    }

    pub fn sequence(element: TypeDescriptor) -> Self {
        Self::container(ContainerKind::Sequence, vec![element])
    }

    pub fn iterable(element: TypeDescriptor) -> Self {
        Self::container(ContainerKind::Iterable, vec![element])
    }

    pub fn union(alternatives: Vec<TypeDescriptor>) -> Self {
        Self::Union { alternatives }
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional {
            inner: Box::new(inner),
        }
    }

    pub fn literal(values: Vec<LiteralValue>) -> Self {
        Self::Literal { values }
    }

    pub fn typed_mapping(name: impl Into<String>, fields: Vec<TypedField>) -> Self {
        Self::TypedMapping {
            name: name.into(),
            fields,
        }
    }

    pub fn protocol(name: impl Into<String>, members: Vec<ProtocolMember>) -> Self {
        Self::Protocol {
            name: name.into(),
            members,
        }
    }

    /// An unconstrained, unbounded type variable.
    pub fn type_var(name: impl Into<String>) -> Self {
        Self::TypeVar {
            name: name.into(),
            constraints: Vec::new(),
            bound: None,
        }
    }

    /// A type variable restricted to one of `constraints`.
    pub fn constrained(name: impl Into<String>, constraints: Vec<TypeDescriptor>) -> Self {
        Self::TypeVar {
            name: name.into(),
            constraints,
            bound: None,
        }
    }

    /// A type variable whose binding must satisfy `bound`.
    pub fn bounded(name: impl Into<String>, bound: TypeDescriptor) -> Self {
        Self::TypeVar {
            name: name.into(),
            constraints: Vec::new(),
            bound: Some(Box::new(bound)),
        }
    }

    pub fn annotated(inner: TypeDescriptor, metadata: Vec<String>) -> Self {
        Self::Annotated {
            inner: Box::new(inner),
            metadata,
        }
    }

    pub fn forward_ref(name: impl Into<String>) -> Self {
        Self::ForwardRef { name: name.into() }
    }

    pub fn new_type(name: impl Into<String>, underlying: TypeDescriptor) -> Self {
        Self::NewType {
            name: name.into(),
            underlying: Box::new(underlying),
        }
    }

    pub fn unsupported(construct: impl Into<String>) -> Self {
        Self::Unsupported {
            construct: construct.into(),
        }
    }

    /// Leaf kinds are the ones that consult the validator registry.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Primitive { .. } | Self::NewType { .. })
    }

    /// Registry key for leaf kinds.
    pub fn type_key(&self) -> Option<&str> {
        match self {
            Self::Primitive { name } | Self::NewType { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Whether the descriptor mentions a type variable anywhere.
    pub fn has_type_vars(&self) -> bool {
        match self {
            Self::TypeVar { .. } => true,
            Self::Container { elements, .. } => elements.iter().any(Self::has_type_vars),
            Self::Union { alternatives } => alternatives.iter().any(Self::has_type_vars),
            Self::Optional { inner } | Self::Annotated { inner, .. } => inner.has_type_vars(),
            Self::TypedMapping { fields, .. } => {
                fields.iter().any(|f| f.descriptor.has_type_vars())
            }
            Self::NewType { underlying, .. } => underlying.has_type_vars(),
            _ => false,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeDescriptor]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Renders annotation-style text, e.g. `dict[str, list[int]]`, `int | None`.
impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Primitive { name } => {
                f.write_str(if name == "NoneType" { "None" } else { name })
            }
            Self::Container {
                container,
                elements,
            } => {
                f.write_str(container.as_str())?;
                if elements.is_empty() {
                    return Ok(());
                }
                f.write_str("[")?;
                write_list(f, elements)?;
                if *container == ContainerKind::VarTuple {
                    f.write_str(", ...")?;
                }
                f.write_str("]")
            }
            Self::Union { alternatives } => {
                for (i, alt) in alternatives.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{alt}")?;
                }
                Ok(())
            }
            Self::Optional { inner } => write!(f, "{inner} | None"),
            Self::Literal { values } => {
                f.write_str("Literal[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str("]")
            }
            Self::TypedMapping { name, .. }
            | Self::Protocol { name, .. }
            | Self::TypeVar { name, .. }
            | Self::ForwardRef { name }
            | Self::NewType { name, .. } => f.write_str(name),
            Self::Annotated { inner, .. } => write!(f, "{inner}"),
            Self::Unsupported { construct } => f.write_str(construct),
        }
    }
}
