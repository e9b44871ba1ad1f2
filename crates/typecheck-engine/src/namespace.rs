//! # Forward-Reference Namespaces
//!
//! A [`Namespace`] is the declaring scope a `ForwardRef` is resolved in. It
//! is attached to a wrapper when the wrapper is built but consulted only
//! when a value is checked, so names defined after wrapping (a class that
//! refers to itself, mutually recursive types) resolve normally.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use typecheck_core::TypeDescriptor;

/// Shared, mutable `name -> descriptor` table.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: Arc<RwLock<HashMap<String, TypeDescriptor>>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide namespace used when none is supplied.
    pub fn global() -> Namespace {
        static GLOBAL: OnceLock<Namespace> = OnceLock::new();
        GLOBAL.get_or_init(Namespace::new).clone()
    }

    /// Bind `name` to a descriptor, replacing any earlier definition.
    pub fn define(&self, name: impl Into<String>, descriptor: TypeDescriptor) {
        self.entries.write().insert(name.into(), descriptor);
    }

    /// Bind `name` to the class of the same name.
    pub fn define_class(&self, name: impl Into<String>) {
        let name = name.into();
        let descriptor = TypeDescriptor::primitive(name.clone());
        self.define(name, descriptor);
    }

    pub fn resolve(&self, name: &str) -> Option<TypeDescriptor> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn remove(&self, name: &str) -> Option<TypeDescriptor> {
        self.entries.write().remove(name)
    }
}
