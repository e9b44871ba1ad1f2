//! # Cache Errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// An argument has no stable identity to key on.
    #[error("argument {index} of type {type_name} cannot be used as a cache key")]
    Unhashable {
        /// Zero-based position in the argument list.
        index: usize,
        /// Runtime type name of the argument.
        type_name: String,
    },
}
