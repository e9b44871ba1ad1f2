//! # Matcher Engine
//!
//! Recursively evaluates a [`Value`] against a [`TypeDescriptor`].
//!
//! The core entry point, [`check`], never panics on its own account and
//! returns a [`CheckFailure`] (path + violation) on mismatch; the wrapper
//! attaches the call site. [`matches`] is the boolean form.
//!
//! ## Rules by kind
//!
//! - **Leaf** (`Primitive`, `NewType`): registry predicate if one is
//!   registered for the name; otherwise an instance check by runtime type
//!   name (and declared bases for objects). A `NewType` without its own
//!   predicate checks its underlying type.
//! - **Container**: shape first, then elements. Only the first N elements
//!   are checked, where N comes from [`ValidationContext::element_limit`].
//!   Fixed-length tuples are always checked position by position.
//!   Producers are never consumed here; the wrapper substitutes a
//!   validating producer when lazy validation is on.
//! - **Union**: alternatives in declaration order, first success wins. Type
//!   variable bindings made by a failed alternative are rolled back. Policy
//!   failures (strict forward reference, unsupported construct under
//!   `error`) abort the union instead of falling through.
//! - **TypedMapping**: required fields present and matching, optional
//!   fields matching when present, undeclared keys rejected in strict mode.
//! - **Protocol**: every member present, method arity compatible when the
//!   protocol declares one. Builtin values answer from a capability table.
//! - **TypeVar**: the first occurrence binds, later occurrences must be
//!   compatible with the binding.
//! - **ForwardRef**: looked up in the context namespace at check time.
//! - **Unsupported**: handled by the fallback policy.

use std::fmt;

use typecheck_core::{
    CheckFailure, ContainerKind, PathSegment, Site, TypeCheckError, TypedField, TypeDescriptor,
    Value, Violation,
};

use crate::config::{FallbackPolicy, ForwardRefPolicy};
use crate::context::{ValidationContext, ANONYMOUS};

/// Check `value` against `descriptor`.
pub fn check(
    value: &Value,
    descriptor: &TypeDescriptor,
    ctx: &mut ValidationContext,
) -> Result<(), CheckFailure> {
    match descriptor {
        TypeDescriptor::Any => Ok(()),
        TypeDescriptor::Primitive { name } => check_leaf(value, descriptor, name, ctx),
        TypeDescriptor::NewType { name, underlying } => {
            if let Some(predicate) = ctx.registry().get(name) {
                return verdict(predicate(value, descriptor), descriptor, value);
            }
            check(value, underlying, ctx).map_err(|f| restate(f, name, value))
        }
        TypeDescriptor::Container {
            container,
            elements,
        } => check_container(value, descriptor, *container, elements, ctx),
        TypeDescriptor::Union { alternatives } => {
            for alternative in alternatives {
                let mark = ctx.checkpoint();
                match check(value, alternative, ctx) {
                    Ok(()) => return Ok(()),
                    Err(f) if f.is_mismatch() => ctx.rollback(mark),
                    Err(f) => return Err(f),
                }
            }
            Err(CheckFailure::mismatch(descriptor, value.type_name()))
        }
        TypeDescriptor::Optional { inner } => {
            if value.is_none() {
                return Ok(());
            }
            check(value, inner, ctx).map_err(|f| restate(f, descriptor, value))
        }
        TypeDescriptor::Literal { values } => {
            if values.iter().any(|lit| lit.matches(value)) {
                Ok(())
            } else {
                Err(CheckFailure::mismatch(descriptor, value.to_string()))
            }
        }
        TypeDescriptor::TypedMapping { name, fields } => {
            check_typed_mapping(value, descriptor, name, fields, ctx)
        }
        TypeDescriptor::Protocol { name, members } => check_protocol(value, name, members),
        TypeDescriptor::TypeVar {
            name,
            constraints,
            bound,
        } => check_type_var(value, name, constraints, bound.as_deref(), ctx),
        TypeDescriptor::Annotated { inner, .. } => check(value, inner, ctx),
        TypeDescriptor::ForwardRef { name } => match ctx.namespace().resolve(name) {
            Some(resolved) => check_nested(value, &resolved, ctx),
            None => match ctx.config().forward_ref_policy {
                ForwardRefPolicy::Permissive => Ok(()),
                ForwardRefPolicy::Strict => Err(CheckFailure::new(
                    Violation::UnresolvedForwardRef { name: name.clone() },
                )),
            },
        },
        TypeDescriptor::Unsupported { construct } => match ctx.config().fallback_policy {
            FallbackPolicy::Silent => Ok(()),
            FallbackPolicy::Warn => {
                tracing::warn!(
                    construct = %construct,
                    function = %ctx.function(),
                    "unsupported type construct accepted without checking"
                );
                Ok(())
            }
            FallbackPolicy::Error => Err(CheckFailure::new(Violation::UnsupportedConstruct {
                construct: construct.clone(),
            })),
        },
    }
}

/// Boolean form of [`check`].
pub fn matches(value: &Value, descriptor: &TypeDescriptor, ctx: &mut ValidationContext) -> bool {
    check(value, descriptor, ctx).is_ok()
}

/// Check a free-standing value against the process-wide configuration,
/// registry, and namespace.
pub fn validate(value: &Value, descriptor: &TypeDescriptor) -> Result<(), TypeCheckError> {
    let mut ctx = ValidationContext::global();
    validate_with(value, descriptor, &mut ctx)
}

/// Check a free-standing value in an explicit context.
pub fn validate_with(
    value: &Value,
    descriptor: &TypeDescriptor,
    ctx: &mut ValidationContext,
) -> Result<(), TypeCheckError> {
    check(value, descriptor, ctx).map_err(|f| f.at(ANONYMOUS, Site::Value))
}

/// The concrete descriptor a type variable binds to for `value`.
pub fn descriptor_of(value: &Value) -> TypeDescriptor {
    TypeDescriptor::primitive(value.type_name())
}

// ---------------------------------------------------------------------------
// Kind-specific rules
// ---------------------------------------------------------------------------

/// Report a top-level type mismatch against the outer declaration. Every
/// other violation, and anything found deeper in the value, is kept as is.
fn restate(failure: CheckFailure, expected: impl fmt::Display, value: &Value) -> CheckFailure {
    match failure.violation {
        Violation::Mismatch { .. } if failure.path.is_empty() => {
            CheckFailure::mismatch(expected, value.type_name())
        }
        _ => failure,
    }
}

fn verdict(ok: bool, descriptor: &TypeDescriptor, value: &Value) -> Result<(), CheckFailure> {
    if ok {
        Ok(())
    } else {
        Err(CheckFailure::mismatch(descriptor, value.type_name()))
    }
}

fn check_nested(
    value: &Value,
    descriptor: &TypeDescriptor,
    ctx: &mut ValidationContext,
) -> Result<(), CheckFailure> {
    // Past the depth limit the value is left unchecked.
    ctx.nested(|ctx| check(value, descriptor, ctx))
        .unwrap_or(Ok(()))
}

fn check_leaf(
    value: &Value,
    descriptor: &TypeDescriptor,
    name: &str,
    ctx: &ValidationContext,
) -> Result<(), CheckFailure> {
    let ok = match ctx.registry().resolve(descriptor) {
        Some(predicate) => predicate(value, descriptor),
        None => match value {
            Value::Object(obj) => obj.is_instance_of(name),
            other => other.type_name() == name,
        },
    };
    verdict(ok, descriptor, value)
}

fn shape_matches(kind: ContainerKind, value: &Value) -> bool {
    match kind {
        ContainerKind::List => matches!(value, Value::List(_)),
        ContainerKind::Set => matches!(value, Value::Set(_)),
        ContainerKind::Tuple | ContainerKind::VarTuple => matches!(value, Value::Tuple(_)),
        ContainerKind::Sequence => matches!(value, Value::List(_) | Value::Tuple(_)),
        ContainerKind::Mapping => matches!(value, Value::Map(_)),
        ContainerKind::Iterable => matches!(
            value,
            Value::List(_) | Value::Tuple(_) | Value::Set(_) | Value::Map(_) | Value::Iter(_)
        ),
    }
}

fn check_container(
    value: &Value,
    descriptor: &TypeDescriptor,
    kind: ContainerKind,
    elements: &[TypeDescriptor],
    ctx: &mut ValidationContext,
) -> Result<(), CheckFailure> {
    if !shape_matches(kind, value) {
        return Err(CheckFailure::mismatch(descriptor, value.type_name()));
    }
    let Some(first) = elements.first() else {
        return Ok(());
    };
    let limit = ctx.element_limit().unwrap_or(usize::MAX);

    match (kind, value) {
        (ContainerKind::Tuple, Value::Tuple(items)) => {
            if items.len() != elements.len() {
                return Err(CheckFailure::mismatch(
                    descriptor,
                    format!("tuple of length {}", items.len()),
                ));
            }
            for (i, (item, expected)) in items.iter().zip(elements).enumerate() {
                check_nested(item, expected, ctx).map_err(|f| f.within(PathSegment::Index(i)))?;
            }
            Ok(())
        }
        (_, Value::Map(pairs)) => {
            let value_descriptor = if kind == ContainerKind::Mapping {
                elements.get(1)
            } else {
                None
            };
            for (key, item) in pairs.iter().take(limit) {
                check_nested(key, first, ctx)
                    .map_err(|f| f.within(PathSegment::Key(key.to_string())))?;
                if let Some(expected) = value_descriptor {
                    check_nested(item, expected, ctx)
                        .map_err(|f| f.within(PathSegment::Value(key.to_string())))?;
                }
            }
            Ok(())
        }
        // Producers are validated as they are consumed, never here.
        (_, Value::Iter(_)) => Ok(()),
        (_, other) => {
            let items = other.elements().unwrap_or(&[]);
            for (i, item) in items.iter().take(limit).enumerate() {
                check_nested(item, first, ctx).map_err(|f| f.within(PathSegment::Index(i)))?;
            }
            Ok(())
        }
    }
}

fn check_typed_mapping(
    value: &Value,
    descriptor: &TypeDescriptor,
    name: &str,
    fields: &[TypedField],
    ctx: &mut ValidationContext,
) -> Result<(), CheckFailure> {
    let Value::Map(pairs) = value else {
        return Err(CheckFailure::mismatch(descriptor, value.type_name()));
    };

    for field in fields {
        match value.get(&field.name) {
            Some(item) => check_nested(item, &field.descriptor, ctx)
                .map_err(|f| f.within(PathSegment::Field(field.name.clone())))?,
            None if field.required => {
                return Err(CheckFailure::new(Violation::MissingField {
                    mapping: name.to_string(),
                    field: field.name.clone(),
                }))
            }
            None => {}
        }
    }

    if ctx.config().strict_mode {
        for (key, _) in pairs {
            let declared = key
                .as_str()
                .is_some_and(|k| fields.iter().any(|f| f.name == k));
            if !declared {
                return Err(CheckFailure::new(Violation::ExtraField {
                    mapping: name.to_string(),
                    field: key.as_str().map_or_else(|| key.to_string(), str::to_string),
                }));
            }
        }
    }
    Ok(())
}

const NUMERIC: &[&str] = &[
    "__add__", "__sub__", "__mul__", "__truediv__", "__floordiv__", "__mod__", "__pow__",
    "__neg__", "__abs__", "__lt__", "__le__", "__gt__", "__ge__", "__eq__", "__hash__",
    "__int__", "__float__", "__index__", "__round__",
];

/// Members a builtin value is known to expose.
fn builtin_capabilities(value: &Value) -> &'static [&'static str] {
    match value {
        Value::List(_) => &[
            "__len__", "__iter__", "__getitem__", "__setitem__", "__contains__", "__eq__",
            "append", "extend", "insert", "pop", "remove", "clear", "sort", "reverse", "index",
            "count", "copy",
        ],
        Value::Tuple(_) => &[
            "__len__", "__iter__", "__getitem__", "__contains__", "__eq__", "__hash__", "index",
            "count",
        ],
        Value::Set(_) => &[
            "__len__", "__iter__", "__contains__", "__eq__", "add", "discard", "remove", "pop",
            "clear", "union", "intersection", "difference", "copy",
        ],
        Value::Map(_) => &[
            "__len__", "__iter__", "__getitem__", "__setitem__", "__contains__", "__eq__", "keys",
            "values", "items", "get", "pop", "update", "setdefault", "clear", "copy",
        ],
        Value::Str(_) => &[
            "__len__", "__iter__", "__getitem__", "__contains__", "__eq__", "__hash__", "__lt__",
            "upper", "lower", "strip", "split", "join", "replace", "startswith", "endswith",
            "encode", "format",
        ],
        Value::Bytes(_) => &[
            "__len__", "__iter__", "__getitem__", "__contains__", "__eq__", "__hash__", "decode",
            "split", "strip", "startswith", "endswith",
        ],
        Value::Int(_) | Value::Bool(_) | Value::Float(_) => NUMERIC,
        Value::Iter(_) => &["__iter__", "__next__", "send", "throw", "close"],
        Value::Type(_) => &["__call__", "__name__", "__eq__", "__hash__"],
        Value::None => &["__eq__", "__hash__"],
        Value::Object(_) => &[],
    }
}

fn check_protocol(
    value: &Value,
    protocol: &str,
    members: &[typecheck_core::ProtocolMember],
) -> Result<(), CheckFailure> {
    let missing = |member: &str| {
        CheckFailure::new(Violation::ProtocolMember {
            protocol: protocol.to_string(),
            member: member.to_string(),
            actual: value.type_name().to_string(),
        })
    };

    match value {
        Value::Object(obj) => {
            for member in members {
                match (obj.method(&member.name), member.arity) {
                    (Some(sig), Some(arity)) if !sig.accepts(arity) => {
                        return Err(CheckFailure::new(Violation::ProtocolArity {
                            protocol: protocol.to_string(),
                            member: member.name.clone(),
                            actual: obj.class_name().to_string(),
                            required: arity,
                            found: sig.to_string(),
                        }))
                    }
                    (Some(_), _) => {}
                    (None, _) if obj.has_member(&member.name) => {}
                    (None, _) => return Err(missing(&member.name)),
                }
            }
            Ok(())
        }
        other => {
            let capabilities = builtin_capabilities(other);
            match members
                .iter()
                .find(|m| !capabilities.contains(&m.name.as_str()))
            {
                Some(member) => Err(missing(&member.name)),
                None => Ok(()),
            }
        }
    }
}

fn check_type_var(
    value: &Value,
    name: &str,
    constraints: &[TypeDescriptor],
    bound: Option<&TypeDescriptor>,
    ctx: &mut ValidationContext,
) -> Result<(), CheckFailure> {
    if let Some(bound_to) = ctx.binding(name).cloned() {
        return match check_nested(value, &bound_to, ctx) {
            Ok(()) => Ok(()),
            Err(f) if f.is_mismatch() => Err(CheckFailure::new(Violation::TypeVarInconsistent {
                name: name.to_string(),
                bound: bound_to.to_string(),
                actual: value.type_name().to_string(),
            })),
            Err(f) => Err(f),
        };
    }

    let concrete = if constraints.is_empty() {
        if let Some(bound) = bound {
            match check_nested(value, bound, ctx) {
                Ok(()) => {}
                Err(f) if f.is_mismatch() => {
                    return Err(CheckFailure::new(Violation::TypeVarBound {
                        name: name.to_string(),
                        bound: bound.to_string(),
                        actual: value.type_name().to_string(),
                    }))
                }
                Err(f) => return Err(f),
            }
        }
        descriptor_of(value)
    } else {
        let mut chosen = None;
        for constraint in constraints {
            let mark = ctx.checkpoint();
            match check_nested(value, constraint, ctx) {
                Ok(()) => {
                    chosen = Some(constraint.clone());
                    break;
                }
                Err(f) if f.is_mismatch() => ctx.rollback(mark),
                Err(f) => return Err(f),
            }
        }
        match chosen {
            Some(constraint) => constraint,
            None => {
                return Err(CheckFailure::new(Violation::TypeVarConstraint {
                    name: name.to_string(),
                    actual: value.type_name().to_string(),
                    allowed: constraints.iter().map(ToString::to_string).collect(),
                }))
            }
        }
    };
    ctx.bind(name, concrete);
    Ok(())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::config::Config;
    use crate::namespace::Namespace;
    use crate::registry::ValidatorRegistry;
    use proptest::prelude::*;

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::None),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e6f64..1.0e6).prop_map(Value::Float),
            "[a-z]{0,6}".prop_map(Value::Str),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::List),
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Tuple),
                prop::collection::vec(("[a-z]{1,4}", inner), 0..4)
                    .prop_map(|pairs| Value::map(pairs)),
            ]
        })
    }

    fn arb_descriptor() -> impl Strategy<Value = TypeDescriptor> {
        prop::sample::select(vec![
            "int",
            "float",
            "str | None",
            "list[int]",
            "list[int | str]",
            "dict[str, float]",
            "tuple[int, ...]",
            "Iterable[Any]",
            "Literal[1, 'a']",
            "Missing",
        ])
        .prop_map(|text| text.parse::<TypeDescriptor>().unwrap())
    }

    proptest! {
        /// Re-validating the same value never changes the verdict and never
        /// touches shared state.
        #[test]
        fn validation_is_idempotent(value in arb_value(), descriptor in arb_descriptor()) {
            let registry = ValidatorRegistry::new();
            let namespace = Namespace::new();
            let config = Config::default();
            let before = registry.len();

            let mut first = ValidationContext::new(config.clone(), registry.clone(), namespace.clone());
            let mut second = ValidationContext::new(config.clone(), registry.clone(), namespace.clone());
            let a = check(&value, &descriptor, &mut first);
            let b = check(&value, &descriptor, &mut second);

            prop_assert_eq!(a, b);
            prop_assert_eq!(registry.len(), before);
            prop_assert!(!namespace.contains("Missing"));
            prop_assert_eq!(config, Config::default());
        }

        /// `Any` accepts everything.
        #[test]
        fn any_matches_every_value(value in arb_value()) {
            let mut c = ValidationContext::new(Config::default(), ValidatorRegistry::new(), Namespace::new());
            prop_assert!(matches(&value, &TypeDescriptor::Any, &mut c));
        }
    }
}
