//! # Descriptor Interning
//!
//! Structurally equal descriptors share one allocation. Signatures that
//! declare the same parameter types (`list[int]` on fifty functions) hold
//! clones of the same `Arc` instead of fifty trees.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use crate::descriptor::TypeDescriptor;

/// Thread-safe set of canonical descriptor allocations.
#[derive(Debug, Default)]
pub struct DescriptorInterner {
    entries: Mutex<HashSet<Arc<TypeDescriptor>>>,
}

impl DescriptorInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide interner used by signature construction.
    pub fn global() -> &'static DescriptorInterner {
        static GLOBAL: OnceLock<DescriptorInterner> = OnceLock::new();
        GLOBAL.get_or_init(DescriptorInterner::new)
    }

    /// Return the canonical allocation for `descriptor`, inserting it if new.
    pub fn intern(&self, descriptor: TypeDescriptor) -> Arc<TypeDescriptor> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&descriptor) {
            return Arc::clone(existing);
        }
        let shared = Arc::new(descriptor);
        entries.insert(Arc::clone(&shared));
        shared
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
