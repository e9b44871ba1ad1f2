//! # Validator Registry
//!
//! Pluggable mapping from a type name to a predicate
//! `(value, descriptor) -> bool`. Only leaf descriptors (`Primitive`,
//! `NewType`) consult the registry; composite kinds are always matched by
//! the engine's own recursive rules.
//!
//! Registration is last-write-wins so callers can override the built-ins.
//! Predicates run outside the registry lock, and a panicking predicate is
//! not caught: a bug in a custom validator surfaces as-is.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use typecheck_core::{TypeDescriptor, Value};

/// A validation predicate for one type name.
pub type Predicate = Arc<dyn Fn(&Value, &TypeDescriptor) -> bool + Send + Sync>;

/// Shared, mutable table of predicates keyed by type name.
#[derive(Clone)]
pub struct ValidatorRegistry {
    entries: Arc<RwLock<HashMap<String, Predicate>>>,
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read();
        let mut keys: Vec<&String> = entries.keys().collect();
        keys.sort();
        f.debug_struct("ValidatorRegistry").field("keys", &keys).finish()
    }
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorRegistry {
    /// A registry pre-populated with the built-in predicates.
    pub fn new() -> Self {
        let registry = Self::empty();
        install_builtins(&registry);
        registry
    }

    /// A registry with no predicates at all.
    pub fn empty() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// The process-wide registry.
    pub fn global() -> ValidatorRegistry {
        static GLOBAL: OnceLock<ValidatorRegistry> = OnceLock::new();
        GLOBAL.get_or_init(ValidatorRegistry::new).clone()
    }

    /// Insert or replace the predicate for `type_key`.
    pub fn register<F>(&self, type_key: impl Into<String>, predicate: F)
    where
        F: Fn(&Value, &TypeDescriptor) -> bool + Send + Sync + 'static,
    {
        let key = type_key.into();
        tracing::debug!(type_key = %key, "validator registered");
        self.entries.write().insert(key, Arc::new(predicate));
    }

    /// Predicate registered under an exact key.
    pub fn get(&self, type_key: &str) -> Option<Predicate> {
        self.entries.read().get(type_key).cloned()
    }

    /// Predicate applicable to `descriptor`, if it is a leaf kind with one.
    pub fn resolve(&self, descriptor: &TypeDescriptor) -> Option<Predicate> {
        descriptor.type_key().and_then(|key| self.get(key))
    }

    pub fn contains(&self, type_key: &str) -> bool {
        self.entries.read().contains_key(type_key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Register a predicate in the process-wide registry.
pub fn register<F>(type_key: impl Into<String>, predicate: F)
where
    F: Fn(&Value, &TypeDescriptor) -> bool + Send + Sync + 'static,
{
    ValidatorRegistry::global().register(type_key, predicate);
}

fn install_builtins(registry: &ValidatorRegistry) {
    registry.register("int", |v, _| matches!(v, Value::Int(_)));
    // The numeric tower: an int is acceptable where a float is declared.
    registry.register("float", |v, _| matches!(v, Value::Float(_) | Value::Int(_)));
    registry.register("bool", |v, _| matches!(v, Value::Bool(_)));
    registry.register("str", |v, _| matches!(v, Value::Str(_)));
    registry.register("bytes", |v, _| matches!(v, Value::Bytes(_)));
    registry.register("NoneType", |v, _| v.is_none());
    registry.register("list", |v, _| matches!(v, Value::List(_)));
    registry.register("tuple", |v, _| matches!(v, Value::Tuple(_)));
    registry.register("set", |v, _| matches!(v, Value::Set(_)));
    registry.register("dict", |v, _| matches!(v, Value::Map(_)));
    registry.register("type", |v, _| matches!(v, Value::Type(_)));
    registry.register("object", |_, _| true);
}
