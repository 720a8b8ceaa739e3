//! Bounded buffer for items waiting on a missing dependency.
//!
//! Items park under the hash they are waiting for and re-enter validation
//! when it resolves. The buffer is capacity-bounded with oldest-first
//! eviction, so a flood of unconnectable blocks cannot grow memory.

use flow_types::Hash;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// A parked item and the dependency that blocks it.
struct Parked<T> {
    item: T,
    waiting_for: Hash,
}

/// The orphan buffer; `T` is a block or header.
pub struct OrphanPool<T> {
    capacity: usize,
    by_hash: HashMap<Hash, Parked<T>>,
    /// Missing dependency -> hashes of items waiting on it.
    waiters: HashMap<Hash, Vec<Hash>>,
    /// Arrival order, for eviction.
    order: VecDeque<Hash>,
}

impl<T> OrphanPool<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            by_hash: HashMap::new(),
            waiters: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// Park `item` (identified by `hash`) behind its first missing
    /// dependency. Returns the evicted item when the buffer was full.
    pub fn park(&mut self, hash: Hash, item: T, waiting_for: Hash) -> Option<T> {
        if self.by_hash.contains_key(&hash) {
            return None;
        }

        let evicted = if self.by_hash.len() >= self.capacity {
            self.evict_oldest()
        } else {
            None
        };

        debug!(block = %hash, missing = %waiting_for, "Parking orphan");
        self.waiters.entry(waiting_for).or_default().push(hash);
        self.by_hash.insert(hash, Parked { item, waiting_for });
        self.order.push_back(hash);
        evicted
    }

    /// Take every item that was waiting on `resolved`; callers re-run
    /// validation on each.
    pub fn resolve(&mut self, resolved: &Hash) -> Vec<T> {
        let Some(hashes) = self.waiters.remove(resolved) else {
            return Vec::new();
        };
        hashes
            .into_iter()
            .filter_map(|hash| {
                self.order.retain(|h| *h != hash);
                self.by_hash.remove(&hash).map(|parked| parked.item)
            })
            .collect()
    }

    fn evict_oldest(&mut self) -> Option<T> {
        let hash = self.order.pop_front()?;
        let parked = self.by_hash.remove(&hash)?;
        if let Some(list) = self.waiters.get_mut(&parked.waiting_for) {
            list.retain(|h| *h != hash);
            if list.is_empty() {
                self.waiters.remove(&parked.waiting_for);
            }
        }
        debug!(block = %hash, "Evicting oldest orphan");
        Some(parked.item)
    }
}
