//! # typecheck-engine — Runtime Contract Enforcement
//!
//! Validates the arguments and results of wrapped callables against their
//! declared signatures.
//!
//! ## Architecture
//!
//! ```text
//! TypeChecked / CheckedClass      wrapper.rs, class.rs
//!        │ bind + validate
//!        ▼
//! binder ──► matcher ──► registry      (leaf predicates)
//!              │   └───► namespace     (forward references)
//!              └───────► lazy          (producer elements on consumption)
//!        ▲
//!   ValidationContext ◄── ConfigStore::snapshot()
//! ```
//!
//! ## Shared State
//!
//! [`ConfigStore`], [`ValidatorRegistry`], and [`Namespace`] each have a
//! process-wide instance (`global()`) and can also be created per wrapper.
//! Clones are handles onto the same state. Mutations take effect on the
//! next call; a call in flight keeps the configuration it started with.
//!
//! ## Crate Policy
//!
//! - Validation performs no I/O and never suspends.
//! - Panics inside user predicates or bodies are not caught.
//! - No `.unwrap()` outside tests.

pub mod binder;
pub mod class;
pub mod config;
pub mod context;
pub mod lazy;
pub mod matcher;
pub mod namespace;
pub mod registry;
pub mod signature;
pub mod wrapper;

pub use binder::{bind, validate_arguments, Args, BoundArguments};
pub use class::{CheckedClass, ClassDef, Member, MethodKind};
pub use config::{Config, ConfigError, ConfigStore, FallbackPolicy, ForwardRefPolicy};
pub use context::ValidationContext;
pub use matcher::{check, matches, validate, validate_with};
pub use namespace::Namespace;
pub use registry::{register, Predicate, ValidatorRegistry};
pub use signature::{CallableSpec, ParamKind, Parameter, Signature};
pub use wrapper::{Body, BodyFuture, CallError, CheckOptions, TypeChecked};

pub use typecheck_core::{
    ErrorKind, Object, Producer, Site, TypeCheckError, TypeDescriptor, Value, Violation,
};

/// Wrap `body` with default options and the process-wide stores.
pub fn typecheck(signature: Signature, body: Body) -> TypeChecked {
    TypeChecked::new(signature, body)
}
