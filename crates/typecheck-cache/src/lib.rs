//! # typecheck-cache — Weak-Referencing Memoization
//!
//! A strict-LRU memo table for pure functions of dynamic [`Value`]s.
//!
//! ## Key Design Principles
//!
//! 1. **Caching never extends lifetimes.** Object arguments are keyed by
//!    identity and held through `Weak`. Once the caller drops an object,
//!    entries keyed on it stop answering and are evicted on next lookup.
//!
//! 2. **Counters are exact.** Every lookup is either a hit or a miss,
//!    `currsize` never exceeds `maxsize`, and [`WeakLruCache::cache_clear`]
//!    zeroes everything.
//!
//! 3. **Failures are not remembered.** A computation that returns `Err`
//!    leaves the table unchanged.
//!
//! ## Crate Policy
//!
//! - Independent of the validation engine; depends only on `typecheck-core`.
//! - No `.unwrap()` outside tests.
//!
//! [`Value`]: typecheck_core::Value

pub mod error;
pub mod key;
pub mod memo;
pub mod weak_lru;

pub use error::CacheError;
pub use key::CacheKey;
pub use memo::Memoized;
pub use weak_lru::{CacheInfo, WeakLruCache};
