//! # Validation Context
//!
//! Per-call state threaded through the matcher: the configuration snapshot
//! taken at call entry, the registry and namespace to consult, per-wrapper
//! sampling overrides, type variable bindings, and the nesting depth.
//!
//! Bindings are call-scoped. A context is created for each call and dropped
//! with it; nothing learned during one call leaks into the next.

use typecheck_core::TypeDescriptor;

use crate::config::Config;
use crate::namespace::Namespace;
use crate::registry::ValidatorRegistry;

/// Name used in diagnostics when a value is checked outside any call.
pub const ANONYMOUS: &str = "<value>";

#[derive(Debug, Clone)]
pub struct ValidationContext {
    config: Config,
    registry: ValidatorRegistry,
    namespace: Namespace,
    function: String,
    sample: Option<usize>,
    deep: Option<bool>,
    // Insertion-ordered so a union alternative can be rolled back by truncation.
    bindings: Vec<(String, TypeDescriptor)>,
    depth: usize,
}

impl ValidationContext {
    pub fn new(config: Config, registry: ValidatorRegistry, namespace: Namespace) -> Self {
        Self {
            config,
            registry,
            namespace,
            function: ANONYMOUS.to_string(),
            sample: None,
            deep: None,
            bindings: Vec::new(),
            depth: 0,
        }
    }

    /// A context over the process-wide config, registry, and namespace.
    pub fn global() -> Self {
        Self::new(
            crate::config::ConfigStore::global().snapshot(),
            ValidatorRegistry::global(),
            Namespace::global(),
        )
    }

    /// Name the callable being checked (used in warnings).
    pub fn for_function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    /// Per-wrapper sampling overrides. These take precedence over the config.
    pub fn with_overrides(mut self, sample: Option<usize>, deep: Option<bool>) -> Self {
        self.sample = sample;
        self.deep = deep;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// How many leading elements of a container to check; `None` means all.
    ///
    /// Precedence: wrapper `deep`, config `deep`, wrapper `sample`, config
    /// `sample_size`.
    pub fn element_limit(&self) -> Option<usize> {
        let deep = self.deep.or(self.config.deep).unwrap_or(false);
        if deep {
            None
        } else {
            Some(self.sample.unwrap_or(self.config.sample_size))
        }
    }

    /// Type currently bound to a type variable in this call.
    pub fn binding(&self, name: &str) -> Option<&TypeDescriptor> {
        self.bindings
            .iter()
            .find(|(bound, _)| bound == name)
            .map(|(_, d)| d)
    }

    pub fn bind(&mut self, name: impl Into<String>, descriptor: TypeDescriptor) {
        self.bindings.push((name.into(), descriptor));
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&str, &TypeDescriptor)> {
        self.bindings.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub(crate) fn checkpoint(&self) -> usize {
        self.bindings.len()
    }

    pub(crate) fn rollback(&mut self, checkpoint: usize) {
        self.bindings.truncate(checkpoint);
    }

    /// Run `f` one nesting level deeper, or return `None` past `max_depth`.
    pub(crate) fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Option<R> {
        if self.depth >= self.config.max_depth {
            return None;
        }
        self.depth += 1;
        let out = f(self);
        self.depth -= 1;
        Some(out)
    }
}
