//! # typecheck-core — Foundational Types for Runtime Contract Checking
//!
//! This crate defines the vocabulary every other crate in the workspace
//! speaks: the dynamic [`Value`] model that checked callables receive and
//! return, the canonical [`TypeDescriptor`] that declared types are reduced
//! to, the annotation parser, and the structured error taxonomy.
//!
//! ## Key Design Principles
//!
//! 1. **Descriptors are data.** A declared type is parsed or built once into
//!    an immutable, hashable tree. Matching never re-parses text.
//!
//! 2. **Errors carry location.** A [`TypeCheckError`] names the function, the
//!    site (parameter, return, lazy element), the nested path, and the
//!    violated rule. Callers branch on [`ErrorKind`], never on message text.
//!
//! 3. **Producers are values.** Lazy sequences travel as [`Value::Iter`] so
//!    element checks can be deferred until the callee consumes them.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `typecheck-*` crates (this is the leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod descriptor;
pub mod error;
pub mod intern;
pub mod parse;
pub mod value;

// Re-export primary types for ergonomic imports.
pub use descriptor::{ContainerKind, LiteralValue, ProtocolMember, TypeDescriptor, TypedField};
pub use error::{
    CheckFailure, ErrorKind, FieldPath, ParseError, PathSegment, Site, TypeCheckError, Violation,
};
pub use intern::DescriptorInterner;
pub use parse::parse;
pub use value::{MethodSig, Object, Producer, ProducerItem, Value};
