//! Integration test: end-to-end behavior of checked callables.
//!
//! Every wrapper here is built against its own config store, registry, and
//! namespace so the tests can run in parallel without sharing policy.

use std::sync::Arc;

use typecheck_core::{LiteralValue, MethodSig, ProtocolMember, TypedField};
use typecheck_engine::{
    Args, Body, CallError, CheckOptions, Config, ConfigStore, ErrorKind, Namespace, Object,
    Signature, TypeChecked, TypeDescriptor, ValidatorRegistry, Value,
};

struct Harness {
    config: ConfigStore,
    registry: ValidatorRegistry,
    namespace: Namespace,
}

impl Harness {
    fn new() -> Self {
        Self {
            config: ConfigStore::new(Config::default()),
            registry: ValidatorRegistry::new(),
            namespace: Namespace::new(),
        }
    }

    fn wrap(&self, signature: Signature, body: Body) -> TypeChecked {
        self.wrap_with(signature, body, CheckOptions::default())
    }

    fn wrap_with(&self, signature: Signature, body: Body, options: CheckOptions) -> TypeChecked {
        TypeChecked::with_options(signature, body, options)
            .with_config(self.config.clone())
            .with_registry(self.registry.clone())
            .with_namespace(self.namespace.clone())
    }
}

fn parse(text: &str) -> TypeDescriptor {
    text.parse().expect("annotation parses")
}

/// Returns the named argument unchanged.
fn echo_arg(name: &'static str) -> Body {
    Body::immediate(move |args| Ok(args.require(name)?.clone()))
}

fn kind(result: Result<Value, CallError>) -> Option<ErrorKind> {
    result.err().and_then(|e| e.kind())
}

// ---------------------------------------------------------------------------
// Primitives and collections
// ---------------------------------------------------------------------------

#[test]
fn test_primitive_parameters_accept_declared_types_only() {
    let h = Harness::new();
    for (annotation, good, bad) in [
        ("int", Value::Int(3), Value::from("3")),
        ("float", Value::Float(1.5), Value::from("1.5")),
        ("str", Value::from("x"), Value::Int(1)),
        ("bool", Value::Bool(true), Value::Int(1)),
        ("None", Value::None, Value::Int(0)),
    ] {
        let f = h.wrap(
            Signature::from_annotations("f", &[("x", annotation)], None).unwrap(),
            echo_arg("x"),
        );
        assert!(f.call(Args::new().arg(good)).is_ok(), "{annotation}");
        assert_eq!(
            kind(f.call(Args::new().arg(bad))),
            Some(ErrorKind::ParameterMismatch),
            "{annotation}"
        );
    }
}

#[test]
fn test_error_message_names_parameter_and_index() {
    let h = Harness::new();
    let average_all = h.wrap_with(
        Signature::from_annotations("average_all", &[("values", "list[int]")], Some("float")).unwrap(),
        Body::immediate(|args| {
            let values = args.require("values")?.elements().unwrap_or(&[]);
            let total: f64 = values.iter().filter_map(Value::as_float).sum();
            Ok(Value::Float(total / values.len().max(1) as f64))
        }),
        CheckOptions::new().deep(true),
    );
    let err = average_all
        .call(Args::new().arg(Value::list([
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::from("x"),
        ])))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "average_all: parameter `values`, index 3: expected int, got str"
    );
}

#[test]
fn test_sample_checks_prefix_and_deep_checks_everything() {
    let h = Harness::new();
    let signature = || Signature::new("total").param("values", parse("list[int]"));
    let values = || Value::list([Value::Int(1), Value::Int(2), Value::Int(3), Value::from("x"), Value::Int(5)]);

    let sampled = h.wrap_with(signature(), echo_arg("values"), CheckOptions::new().sample(3));
    assert!(sampled.call(Args::new().arg(values())).is_ok());

    let deep = h.wrap_with(signature(), echo_arg("values"), CheckOptions::new().deep(true));
    let err = deep.call(Args::new().arg(values())).unwrap_err();
    assert!(err.to_string().contains("index 3"), "{err}");
}

#[test]
fn test_global_deep_override_applies_to_every_wrapper() {
    let h = Harness::new();
    let f = h.wrap(Signature::new("f").param("values", parse("list[int]")), echo_arg("values"));
    let mut long: Vec<Value> = (0..20).map(Value::Int).collect();
    long[15] = Value::from("late");

    assert!(f.call(Args::new().arg(Value::List(long.clone()))).is_ok());
    h.config.set_deep(Some(true));
    assert!(f.call(Args::new().arg(Value::List(long))).is_err());
}

#[test]
fn test_nested_mappings_report_full_path() {
    let h = Harness::new();
    let f = h.wrap_with(
        Signature::new("index").param("rows", parse("dict[str, list[int]]")),
        echo_arg("rows"),
        CheckOptions::new().deep(true),
    );
    let rows = Value::map([
        ("a", Value::list([1, 2])),
        ("b", Value::list([Value::Int(3), Value::from("four")])),
    ]);
    let err = f.call(Args::new().arg(rows)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "index: parameter `rows`, value at key 'b', index 1: expected int, got str"
    );
}

#[test]
fn test_literals_and_optionals() {
    let h = Harness::new();
    let open = h.wrap(
        Signature::new("open_file")
            .param("path", TypeDescriptor::str())
            .param(
                "mode",
                TypeDescriptor::literal(vec![LiteralValue::Str("r".into()), LiteralValue::Str("w".into())]),
            )
            .param_with_default("encoding", parse("Optional[str]"), serde_json::Value::Null),
        Body::immediate(|_| Ok(Value::None)),
    );
    assert!(open.call(Args::new().arg("a.txt").arg("r")).is_ok());
    assert!(open.call(Args::new().arg("a.txt").arg("w").kwarg("encoding", "utf-8")).is_ok());
    let err = open.call(Args::new().arg("a.txt").arg("x")).unwrap_err();
    assert!(err.to_string().contains("expected Literal['r', 'w'], got 'x'"), "{err}");
    assert!(open.call(Args::new().arg("a.txt").arg("r").kwarg("encoding", 8)).is_err());
}

// ---------------------------------------------------------------------------
// Type variables
// ---------------------------------------------------------------------------

#[test]
fn test_type_variable_consistency_within_a_call() {
    let h = Harness::new();
    let t = TypeDescriptor::type_var("T");
    let echo_first = h.wrap(
        Signature::new("echo_first")
            .param("a", t.clone())
            .param("b", t.clone())
            .returns(t),
        echo_arg("a"),
    );
    assert_eq!(echo_first.call(Args::new().arg(1).arg(2)).unwrap(), Value::Int(1));
    assert_eq!(
        kind(echo_first.call(Args::new().arg(1).arg("mixed"))),
        Some(ErrorKind::TypeVarInconsistent)
    );
    // Bindings never leak into the next call.
    assert!(echo_first.call(Args::new().arg("x").arg("y")).is_ok());
}

#[test]
fn test_constrained_type_variable() {
    let h = Harness::new();
    let s = TypeDescriptor::constrained("S", vec![TypeDescriptor::int(), TypeDescriptor::str()]);
    let echo = h.wrap(Signature::new("echo").param("x", s.clone()).returns(s), echo_arg("x"));
    assert_eq!(echo.call(Args::new().arg("hi")).unwrap(), Value::from("hi"));
    assert_eq!(
        kind(echo.call(Args::new().arg(1.5))),
        Some(ErrorKind::TypeVarConstraint)
    );
}

#[test]
fn test_return_must_agree_with_parameter_binding() {
    let h = Harness::new();
    let t = TypeDescriptor::type_var("T");
    let stringify = h.wrap(
        Signature::new("stringify").param("x", t.clone()).returns(t),
        Body::immediate(|args| Ok(Value::Str(args.require("x")?.to_string()))),
    );
    let err = stringify.call(Args::new().arg(5)).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TypeVarInconsistent));
    assert!(err.to_string().starts_with("stringify: return value"));
}

// ---------------------------------------------------------------------------
// Typed mappings and protocols
// ---------------------------------------------------------------------------

fn person() -> TypeDescriptor {
    TypeDescriptor::typed_mapping(
        "Person",
        vec![
            TypedField::required("name", TypeDescriptor::str()),
            TypedField::required("age", TypeDescriptor::int()),
            TypedField::optional("email", TypeDescriptor::str()),
        ],
    )
}

#[test]
fn test_typed_mapping_required_and_extra_fields() {
    let h = Harness::new();
    let greet = h.wrap(
        Signature::new("greet").param("p", person()).returns(TypeDescriptor::str()),
        Body::immediate(|args| {
            let name = args.require("p")?.get("name").and_then(Value::as_str).unwrap_or("?");
            Ok(Value::Str(format!("Hello {name}")))
        }),
    );
    let alice = Value::from(serde_json::json!({"name": "Alice", "age": 30, "nickname": "Al"}));
    assert_eq!(greet.call(Args::new().arg(alice.clone())).unwrap(), Value::from("Hello Alice"));

    let bob = Value::from(serde_json::json!({"name": "Bob"}));
    let err = greet.call(Args::new().arg(bob)).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::MissingField));
    assert!(err.to_string().contains("missing required field 'age' of Person"));

    h.config.set_strict_mode(true);
    assert_eq!(kind(greet.call(Args::new().arg(alice))), Some(ErrorKind::ExtraField));
}

#[test]
fn test_protocol_conformance_is_structural() {
    let h = Harness::new();
    let supports_close = TypeDescriptor::protocol("SupportsClose", vec![ProtocolMember::method("close", 0)]);
    let shutdown = h.wrap(
        Signature::new("shutdown").param("resource", supports_close),
        Body::immediate(|_| Ok(Value::Bool(true))),
    );
    let resource = Object::new("Resource").with_method("close", MethodSig::new(0));
    assert!(shutdown.call(Args::new().arg(resource)).is_ok());

    let err = shutdown.call(Args::new().arg(Object::new("Plain"))).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::ProtocolNonConformance));
    assert!(err.to_string().contains("missing member 'close'"));
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

#[test]
fn test_strict_return_mode_requires_annotation() {
    let h = Harness::new();
    let bad_label = h.wrap(
        Signature::new("bad_label").param("x", TypeDescriptor::int()),
        Body::immediate(|args| Ok(Value::Str(format!("Bad:{}", args.require("x")?)))),
    );
    assert!(bad_label.call(Args::new().arg(5)).is_ok());

    h.config.set_strict_return_mode(true);
    let err = bad_label.call(Args::new().arg(5)).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::MissingReturnAnnotation));

    let make_label = h.wrap(
        Signature::from_annotations("make_label", &[("x", "int")], Some("str")).unwrap(),
        Body::immediate(|args| Ok(Value::Str(format!("Label:{}", args.require("x")?)))),
    );
    assert_eq!(make_label.call(Args::new().arg(5)).unwrap(), Value::from("Label:5"));
}

#[test]
fn test_forward_reference_policy() {
    let h = Harness::new();
    let process = h.wrap(
        Signature::from_annotations("process", &[("x", "'UnknownType'")], None).unwrap(),
        echo_arg("x"),
    );
    assert!(process.call(Args::new().arg(42)).is_ok());

    h.config.set_forward_ref_policy("strict").unwrap();
    assert_eq!(
        kind(process.call(Args::new().arg(42))),
        Some(ErrorKind::UnresolvedForwardRef)
    );

    // Defined after wrapping, resolved at call time.
    h.namespace.define("UnknownType", TypeDescriptor::int());
    assert!(process.call(Args::new().arg(42)).is_ok());
    assert_eq!(kind(process.call(Args::new().arg("x"))), Some(ErrorKind::ParameterMismatch));
}

#[test]
fn test_fallback_policy_for_unsupported_constructs() {
    let h = Harness::new();
    let apply = h.wrap(
        Signature::from_annotations("apply", &[("f", "Callable[[int], int]")], None).unwrap(),
        Body::immediate(|_| Ok(Value::None)),
    );
    assert!(apply.call(Args::new().arg(1)).is_ok());
    h.config.set_fallback_policy("warn").unwrap();
    assert!(apply.call(Args::new().arg(1)).is_ok());
    h.config.set_fallback_policy("error").unwrap();
    assert_eq!(kind(apply.call(Args::new().arg(1))), Some(ErrorKind::UnsupportedConstruct));
}

// ---------------------------------------------------------------------------
// Custom validators
// ---------------------------------------------------------------------------

#[test]
fn test_custom_validator_for_new_type() {
    let h = Harness::new();
    h.registry
        .register("PositiveInt", |v, _| matches!(v, Value::Int(n) if *n > 0));
    let positive = TypeDescriptor::new_type("PositiveInt", TypeDescriptor::int());
    let double = h.wrap(
        Signature::new("double").param("x", positive.clone()).returns(positive),
        Body::immediate(|args| Ok(Value::Int(args.require("x")?.as_int().unwrap_or(0) * 2))),
    );
    assert_eq!(double.call(Args::new().arg(4)).unwrap(), Value::Int(8));
    let err = double.call(Args::new().arg(-1)).unwrap_err();
    assert_eq!(err.to_string(), "double: parameter `x`: expected PositiveInt, got int");
}

#[test]
fn test_registration_after_wrapping_takes_effect() {
    let h = Harness::new();
    let f = h.wrap(Signature::new("f").param("x", TypeDescriptor::int()), echo_arg("x"));
    assert!(f.call(Args::new().arg(-3)).is_ok());
    h.registry.register("int", |v, _| matches!(v, Value::Int(n) if *n >= 0));
    assert!(f.call(Args::new().arg(-3)).is_err());
}

// ---------------------------------------------------------------------------
// Lazy producers
// ---------------------------------------------------------------------------

fn consume(h: &Harness, seen: Arc<parking_lot::Mutex<Vec<i64>>>) -> TypeChecked {
    h.wrap(
        Signature::from_annotations("consume", &[("seq", "Iterable[int]")], Some("int")).unwrap(),
        Body::immediate(move |mut args| {
            let Some(Value::Iter(seq)) = args.take("seq") else {
                anyhow::bail!("seq is not a producer");
            };
            let mut total = 0;
            for item in seq {
                if let Value::Int(n) = item? {
                    seen.lock().push(n);
                    total += n;
                }
            }
            Ok(Value::Int(total))
        }),
    )
}

fn numbers() -> Value {
    Value::producer(vec![
        Value::Int(1),
        Value::Int(2),
        Value::Int(3),
        Value::from("bad"),
        Value::Int(5),
    ])
}

#[test]
fn test_lazy_producer_fails_when_bad_element_is_consumed() {
    let h = Harness::new();
    h.config.set_lazy_iterable_validation(true);
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let f = consume(&h, Arc::clone(&seen));

    let err = f.call(Args::new().arg(numbers())).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::ParameterMismatch));
    assert_eq!(
        err.to_string(),
        "consume: parameter `seq`, element 3: expected int, got str"
    );
    // The body ran and consumed the valid prefix before the failure.
    assert_eq!(*seen.lock(), vec![1, 2, 3]);
}

#[test]
fn test_producers_pass_unchecked_without_lazy_validation() {
    let h = Harness::new();
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let f = consume(&h, Arc::clone(&seen));
    assert_eq!(f.call(Args::new().arg(numbers())).unwrap(), Value::Int(11));
    assert_eq!(*seen.lock(), vec![1, 2, 3, 5]);
}

#[test]
fn test_lazy_producer_sees_bindings_from_later_parameters() {
    let h = Harness::new();
    h.config.set_lazy_iterable_validation(true);
    let first = h.wrap(
        Signature::from_annotations("first", &[("xs", "Iterable[T]"), ("y", "T")], Some("T")).unwrap(),
        Body::immediate(|mut args| {
            let Some(Value::Iter(mut xs)) = args.take("xs") else {
                anyhow::bail!("xs is not a producer");
            };
            match xs.next() {
                Some(item) => Ok(item?),
                None => Ok(args.require("y")?.clone()),
            }
        }),
    );

    let err = first
        .call(Args::new().arg(Value::producer(vec![Value::from("a"), Value::from("b")])).arg(1))
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TypeVarInconsistent));
    assert_eq!(
        err.to_string(),
        "first: parameter `xs`, element 0: type variable T is bound to int in this call, got str"
    );

    let ok = first.call(Args::new().arg(Value::producer(vec![Value::Int(4)])).arg(1));
    assert_eq!(ok.unwrap(), Value::Int(4));
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

#[test]
fn test_keyword_and_variadic_arguments_are_checked() {
    let h = Harness::new();
    let total = h.wrap(
        Signature::new("total")
            .var_positional("values", TypeDescriptor::float())
            .keyword_only("scale", TypeDescriptor::float()),
        Body::immediate(|args| {
            let scale = args.require("scale")?.as_float().unwrap_or(1.0);
            let sum: f64 = args
                .require("values")?
                .elements()
                .unwrap_or(&[])
                .iter()
                .filter_map(Value::as_float)
                .sum();
            Ok(Value::Float(sum * scale))
        }),
    );
    assert_eq!(
        total.call(Args::new().arg(1).arg(2.5).kwarg("scale", 2.0)).unwrap(),
        Value::Float(7.0)
    );
    let err = total.call(Args::new().arg(1).arg("2").kwarg("scale", 1.0)).unwrap_err();
    assert_eq!(err.to_string(), "total: parameter `values`, argument 1: expected float, got str");
    assert_eq!(kind(total.call(Args::new().arg(1))), Some(ErrorKind::Binding));
}
