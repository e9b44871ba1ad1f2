//! Integration test: the process-wide stores.
//!
//! Kept to a single test so nothing else in this binary observes the
//! global configuration while it is modified.

use typecheck_engine::{
    register, typecheck, validate, Args, Body, ConfigStore, ErrorKind, Namespace,
    Signature, TypeDescriptor, Value,
};

#[test]
fn test_global_stores_are_shared_by_default_wrappers() {
    let config = ConfigStore::global();
    config.reset();

    let even = TypeDescriptor::new_type("EvenInt", TypeDescriptor::int());
    let half = typecheck(
        Signature::new("half").param("n", even.clone()).returns(TypeDescriptor::int()),
        Body::immediate(|args| Ok(Value::Int(args.require("n")?.as_int().unwrap_or(0) / 2))),
    );

    // Without a predicate the underlying type decides.
    assert_eq!(half.call(Args::new().arg(3)).unwrap(), Value::Int(1));

    register("EvenInt", |v, _| matches!(v, Value::Int(n) if n % 2 == 0));
    assert_eq!(half.call(Args::new().arg(4)).unwrap(), Value::Int(2));
    assert_eq!(
        half.call(Args::new().arg(3)).unwrap_err().kind(),
        Some(ErrorKind::ParameterMismatch)
    );
    assert!(validate(&Value::Int(8), &even).is_ok());

    let pending = TypeDescriptor::forward_ref("Ledger");
    assert!(validate(&Value::Int(1), &pending).is_ok());
    config.set_forward_ref_policy("strict").unwrap();
    assert!(validate(&Value::Int(1), &pending).is_err());
    Namespace::global().define("Ledger", TypeDescriptor::int());
    assert!(validate(&Value::Int(1), &pending).is_ok());
    Namespace::global().remove("Ledger");

    config.set_strict_return_mode(true);
    let untyped = typecheck(Signature::new("noop"), Body::immediate(|_| Ok(Value::None)));
    assert_eq!(
        untyped.call(Args::new()).unwrap_err().kind(),
        Some(ErrorKind::MissingReturnAnnotation)
    );

    config.reset();
    assert!(untyped.call(Args::new()).is_ok());
}
