//! Keyed memoization with a pluggable eviction policy.
//!
//! Each cache instance owns its entries, so tests can build isolated caches
//! instead of sharing process-wide state. Values are handed out as `Arc`s;
//! two callers missing on the same key at the same time may both compute the
//! value; the later insert wins and neither result is corrupted.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Arc;

/// Decides which key, if any, leaves the cache after an insert.
pub trait EvictionPolicy<K>: Send {
    /// Records a freshly inserted key and returns the keys to drop.
    fn inserted(&mut self, key: &K) -> Vec<K>;
}

/// Keeps every entry for the lifetime of the cache.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unbounded;

impl<K> EvictionPolicy<K> for Unbounded {
    fn inserted(&mut self, _key: &K) -> Vec<K> {
        Vec::new()
    }
}

/// Drops the oldest inserted keys once `capacity` is exceeded.
#[derive(Debug)]
pub struct Fifo<K> {
    capacity: usize,
    order: VecDeque<K>,
}

impl<K> Fifo<K> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
        }
    }
}

impl<K: Clone + PartialEq + Send> EvictionPolicy<K> for Fifo<K> {
    fn inserted(&mut self, key: &K) -> Vec<K> {
        if !self.order.contains(key) {
            self.order.push_back(key.clone());
        }
        let mut evicted = Vec::new();
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                evicted.push(old);
            }
        }
        evicted
    }
}

struct Inner<K, V> {
    entries: HashMap<K, Arc<V>>,
    policy: Box<dyn EvictionPolicy<K>>,
}

pub struct Cache<K, V> {
    inner: Mutex<Inner<K, V>>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    /// Cache that never evicts.
    pub fn unbounded() -> Self {
        Self::with_policy(Unbounded)
    }

    pub fn with_policy(policy: impl EvictionPolicy<K> + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                policy: Box::new(policy),
            }),
        }
    }

    /// Bounded FIFO when `capacity` is set, unbounded otherwise.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(capacity) => Self::with_policy(Fifo::new(capacity)),
            None => Self::unbounded(),
        }
    }

    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.lock().entries.get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let value = Arc::new(value);
        let mut inner = self.inner.lock();
        let evicted = inner.policy.inserted(&key);
        inner.entries.insert(key, Arc::clone(&value));
        for old in evicted {
            inner.entries.remove(&old);
        }
        value
    }

    /// Returns the cached value or computes, stores and returns it.
    ///
    /// The lock is not held while `compute` runs, so slow producers (network
    /// fetches, recognition) never block readers of other keys.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = compute()?;
        Ok(self.insert(key.clone(), value))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
