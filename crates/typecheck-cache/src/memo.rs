//! # Memoized Functions
//!
//! [`Memoized`] pairs a function of `&[Value]` with its own
//! [`WeakLruCache`]. The function receives the memoized handle as its first
//! argument, so recursive definitions go through the cache:
//!
//! ```
//! use typecheck_cache::{CacheError, Memoized};
//! use typecheck_core::Value;
//!
//! fn fib(memo: &Memoized<i64, CacheError>, args: &[Value]) -> Result<i64, CacheError> {
//!     let n = args[0].as_int().unwrap_or(0);
//!     if n < 2 {
//!         return Ok(n);
//!     }
//!     Ok(memo.call(&[Value::Int(n - 1)])? + memo.call(&[Value::Int(n - 2)])?)
//! }
//!
//! let fib = Memoized::new(Some(256), fib);
//! assert_eq!(fib.call(&[Value::Int(30)]).unwrap(), 832_040);
//! ```

use std::fmt;
use std::sync::Arc;

use typecheck_core::Value;

use crate::error::CacheError;
use crate::key::CacheKey;
use crate::weak_lru::{CacheInfo, WeakLruCache};

type MemoFn<V, E> = dyn Fn(&Memoized<V, E>, &[Value]) -> Result<V, E> + Send + Sync;

/// A function whose results are cached per argument list.
pub struct Memoized<V, E> {
    func: Arc<MemoFn<V, E>>,
    cache: WeakLruCache<V>,
}

impl<V, E> Memoized<V, E>
where
    V: Clone,
    E: From<CacheError>,
{
    pub fn new<F>(maxsize: Option<usize>, func: F) -> Self
    where
        F: Fn(&Memoized<V, E>, &[Value]) -> Result<V, E> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            cache: WeakLruCache::new(maxsize),
        }
    }

    /// Call through the cache. Arguments that cannot be keyed fail with
    /// [`CacheError::Unhashable`] before the function runs.
    pub fn call(&self, args: &[Value]) -> Result<V, E> {
        let key = CacheKey::from_args(args)?;
        self.cache.get_or_try_compute(key, || (self.func)(self, args))
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.cache.cache_info()
    }

    pub fn cache_clear(&self) {
        self.cache.cache_clear();
    }

    pub fn cache(&self) -> &WeakLruCache<V> {
        &self.cache
    }
}

impl<V, E> fmt::Debug for Memoized<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized").field("cache", &self.cache).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn body_runs_once_per_distinct_arguments() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let square = Memoized::<i64, CacheError>::new(Some(8), move |_, args| {
            seen.fetch_add(1, Ordering::SeqCst);
            let n = args.first().and_then(Value::as_int).unwrap_or(0);
            Ok(n * n)
        });
        for _ in 0..3 {
            assert_eq!(square.call(&[Value::Int(4)]).unwrap(), 16);
        }
        assert_eq!(square.call(&[Value::Int(5)]).unwrap(), 25);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(square.cache_info().hits, 2);
    }

    #[test]
    fn unhashable_arguments_are_rejected() {
        let id = Memoized::<Value, CacheError>::new(None, |_, args| Ok(args[0].clone()));
        let err = id.call(&[Value::producer(Vec::new())]).unwrap_err();
        assert!(matches!(err, CacheError::Unhashable { index: 0, .. }));
        assert_eq!(id.cache_info().misses, 0);
    }
}
