//! Integration test: memoized functions and the weak-reference contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use typecheck_cache::{CacheError, CacheInfo, CacheKey, Memoized, WeakLruCache};
use typecheck_core::{Object, Value};

fn fib(memo: &Memoized<i64, CacheError>, args: &[Value]) -> Result<i64, CacheError> {
    let n = args.first().and_then(Value::as_int).unwrap_or(0);
    if n < 2 {
        return Ok(n);
    }
    Ok(memo.call(&[Value::Int(n - 1)])? + memo.call(&[Value::Int(n - 2)])?)
}

#[test]
fn test_recursive_fibonacci_cold_then_hot() {
    let memo = Memoized::new(Some(256), fib);
    assert_eq!(memo.call(&[Value::Int(30)]).unwrap(), 832_040);

    // Cold: each n in 0..=30 misses once; every other lookup hits.
    let cold = memo.cache_info();
    assert_eq!(cold.misses, 31);
    assert_eq!(cold.currsize, 31);

    assert_eq!(memo.call(&[Value::Int(30)]).unwrap(), 832_040);
    let hot = memo.cache_info();
    assert_eq!(hot.hits, cold.hits + 1);
    assert_eq!(hot.misses, cold.misses);
}

#[test]
fn test_clear_resets_counters() {
    let memo = Memoized::new(Some(256), fib);
    memo.call(&[Value::Int(10)]).unwrap();
    memo.cache_clear();
    assert_eq!(
        memo.cache_info(),
        CacheInfo { hits: 0, misses: 0, maxsize: Some(256), currsize: 0 }
    );
    memo.call(&[Value::Int(1)]).unwrap();
    assert_eq!(memo.cache_info().misses, 1);
}

#[test]
fn test_small_capacity_evicts_oldest() {
    let memo = Memoized::new(Some(3), fib);
    memo.call(&[Value::Int(10)]).unwrap();
    let info = memo.cache_info();
    assert_eq!(info.currsize, 3);
    assert!(memo.cache().get(&CacheKey::from_args(&[Value::Int(10)]).unwrap()).is_some());
    assert!(memo.cache().get(&CacheKey::from_args(&[Value::Int(0)]).unwrap()).is_none());
}

#[test]
fn test_entries_do_not_keep_arguments_alive() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let area = Memoized::<f64, CacheError>::new(Some(16), move |_, args| {
        seen.fetch_add(1, Ordering::SeqCst);
        let side = args
            .first()
            .and_then(Value::as_object)
            .and_then(|o| o.attr("side"))
            .and_then(Value::as_float)
            .unwrap_or(0.0);
        Ok(side * side)
    });

    let square = Arc::new(Object::new("Square").with_attr("side", 3.0));
    let weak = Arc::downgrade(&square);
    assert_eq!(area.call(&[Value::Object(Arc::clone(&square))]).unwrap(), 9.0);
    assert_eq!(area.call(&[Value::Object(Arc::clone(&square))]).unwrap(), 9.0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    drop(square);
    assert!(weak.upgrade().is_none(), "cache must not hold a strong reference");
    assert_eq!(area.cache_info().currsize, 1);

    // A new object reuses nothing from the dead entry.
    let other = Arc::new(Object::new("Square").with_attr("side", 2.0));
    assert_eq!(area.call(&[Value::Object(other)]).unwrap(), 4.0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_shared_cache_counts_every_lookup_across_threads() {
    let cache = Arc::new(WeakLruCache::new(Some(8)));
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..100i64 {
                    let n = (i + t) % 4;
                    let key = CacheKey::from_args(&[Value::Int(n)]).unwrap();
                    assert_eq!(cache.get_or_compute(key, || n * 10), n * 10);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let info = cache.cache_info();
    assert_eq!(info.hits + info.misses, 400);
    assert_eq!(info.currsize, 4);
}
