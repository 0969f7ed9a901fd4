//! Caching wrapper around a `SchemaProvider`.
//!
//! Keyed by `(class, expected.to_string())`, so `Box<int>` and `Box<string>`
//! are cached separately. Failures are not cached.
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::OnceCell;
use tracing::debug;

use super::{ParameterDescriptor, SchemaProvider};
use crate::descriptor::TypeDescriptor;
use crate::error::Result;

type Slot = Arc<OnceCell<Arc<[ParameterDescriptor]>>>;

pub struct MemoizingProvider<P> {
    inner: P,
    cache: RwLock<HashMap<(String, String), Slot>>,
}

impl<P: SchemaProvider> MemoizingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self { inner, cache: RwLock::new(HashMap::new()) }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    /// Number of populated entries.
    pub fn len(&self) -> usize {
        let cache = self.cache.read().unwrap_or_else(|p| p.into_inner());
        cache.values().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.cache.write().unwrap_or_else(|p| p.into_inner()).clear();
    }

    fn slot(&self, key: &(String, String)) -> Slot {
        // every mutation is a single insert or remove, so a poisoned lock
        // still holds a consistent map
        if let Some(slot) = self.cache.read().unwrap_or_else(|p| p.into_inner()).get(key) {
            return slot.clone();
        }
        let mut cache = self.cache.write().unwrap_or_else(|p| p.into_inner());
        cache.entry(key.clone()).or_default().clone()
    }

    /// Drop `key` if it still maps to the unpopulated `slot`.
    fn evict(&self, key: &(String, String), slot: &Slot) {
        let mut cache = self.cache.write().unwrap_or_else(|p| p.into_inner());
        if cache.get(key).is_some_and(|current| Arc::ptr_eq(current, slot) && current.get().is_none()) {
            cache.remove(key);
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.cache.read().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl<P: SchemaProvider> SchemaProvider for MemoizingProvider<P> {
    fn parameters(&self, class: &str, expected: &TypeDescriptor) -> Result<Arc<[ParameterDescriptor]>> {
        let key = (class.to_owned(), expected.to_string());
        let slot = self.slot(&key);
        let found = slot
            .get_or_try_init(|| {
                debug!(%class, %expected, "parameter cache miss");
                self.inner.parameters(class, expected)
            })
            .cloned();
        if found.is_err() {
            self.evict(&key, &slot);
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::MapperError;

    struct Counting {
        calls: AtomicUsize,
    }

    impl SchemaProvider for Counting {
        fn parameters(&self, class: &str, expected: &TypeDescriptor) -> Result<Arc<[ParameterDescriptor]>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if class == "Missing" {
                return Err(MapperError::ClassNotFound(class.into()));
            }
            Ok(Arc::from(vec![ParameterDescriptor::new("value", expected.clone())]))
        }
    }

    fn provider() -> MemoizingProvider<Counting> {
        MemoizingProvider::new(Counting { calls: AtomicUsize::new(0) })
    }

    #[test]
    fn repeated_lookups_hit_the_cache() {
        let memo = provider();
        let a = memo.parameters("Pair", &TypeDescriptor::class("Pair")).unwrap();
        let b = memo.parameters("Pair", &TypeDescriptor::class("Pair")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(memo.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn generic_arguments_are_part_of_the_key() {
        let memo = provider();
        let ints = TypeDescriptor::generic("Box", vec![TypeDescriptor::int()]);
        let strings = TypeDescriptor::generic("Box", vec![TypeDescriptor::string()]);
        assert_eq!(memo.parameters("Box", &ints).unwrap()[0].ty, ints);
        assert_eq!(memo.parameters("Box", &strings).unwrap()[0].ty, strings);
        assert_eq!(memo.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failures_are_retried() {
        let memo = provider();
        assert!(memo.parameters("Missing", &TypeDescriptor::class("Missing")).is_err());
        assert!(memo.parameters("Missing", &TypeDescriptor::class("Missing")).is_err());
        assert_eq!(memo.inner().calls.load(Ordering::SeqCst), 2);
        assert!(memo.is_empty());
    }

    #[test]
    fn failures_leave_no_slot_behind() {
        let memo = provider();
        for i in 0..10 {
            let expected = TypeDescriptor::generic("Missing", vec![TypeDescriptor::literal(i)]);
            assert!(memo.parameters("Missing", &expected).is_err());
        }
        assert_eq!(memo.slot_count(), 0);

        memo.parameters("Pair", &TypeDescriptor::class("Pair")).unwrap();
        assert_eq!(memo.slot_count(), 1);
    }

    #[test]
    fn concurrent_lookups_compute_once() {
        let memo = provider();
        let expected = TypeDescriptor::class("Pair");
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        memo.parameters("Pair", &expected).unwrap();
                    }
                });
            }
        });
        assert_eq!(memo.inner().calls.load(Ordering::SeqCst), 1);

        memo.clear();
        memo.parameters("Pair", &expected).unwrap();
        assert_eq!(memo.inner().calls.load(Ordering::SeqCst), 2);
    }
}
