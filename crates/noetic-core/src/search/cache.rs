//! O(1) LRU + TTL cache (C6 cached search, C9 constitutional cache)
//!
//! The teacher crate uses the `lru` crate for its query-embedding cache, but
//! `lru` has no per-entry TTL. The search cache (15-minute TTL, 500-entry
//! capacity) and the constitutional cache (5-minute TTL, small per-key
//! capacity) both need expiry, so this hand-rolled doubly-linked list over a
//! slab of nodes plus a key→index hashmap gives O(1) get/insert/evict while
//! carrying an expiry timestamp per entry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

const NONE: usize = usize::MAX;

struct Node<V> {
    key: String,
    value: V,
    expires_at: Instant,
    prev: usize,
    next: usize,
}

/// An LRU cache with a uniform per-entry TTL. Eviction (by capacity or by
/// expiry) and promotion-on-access are both O(1): the hashmap gives index
/// lookup, the intrusive doubly-linked list gives O(1) unlink/relink.
pub struct TtlLruCache<V> {
    capacity: usize,
    ttl: Duration,
    nodes: Vec<Node<V>>,
    index: HashMap<String, usize>,
    free_list: Vec<usize>,
    head: usize,
    tail: usize,
}

impl<V> TtlLruCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            nodes: Vec::new(),
            index: HashMap::new(),
            free_list: Vec::new(),
            head: NONE,
            tail: NONE,
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        if prev != NONE {
            self.nodes[prev].next = next;
        } else {
            self.head = next;
        }
        if next != NONE {
            self.nodes[next].prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = NONE;
        self.nodes[idx].next = self.head;
        if self.head != NONE {
            self.nodes[self.head].prev = idx;
        }
        self.head = idx;
        if self.tail == NONE {
            self.tail = idx;
        }
    }

    fn evict_tail(&mut self) {
        if self.tail == NONE {
            return;
        }
        let idx = self.tail;
        self.detach(idx);
        self.index.remove(&self.nodes[idx].key);
        self.free_list.push(idx);
    }

    /// Fetch `key`, promoting it to most-recently-used. Returns `None` if
    /// absent or expired (an expired hit is evicted on the way out).
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let idx = *self.index.get(key)?;
        if self.nodes[idx].expires_at <= Instant::now() {
            self.detach(idx);
            self.index.remove(key);
            self.free_list.push(idx);
            return None;
        }
        self.detach(idx);
        self.push_front(idx);
        Some(&self.nodes[idx].value)
    }

    /// Insert or overwrite `key`, resetting its TTL and promoting it to
    /// most-recently-used. Evicts the least-recently-used entry if this
    /// insert would exceed capacity.
    pub fn put(&mut self, key: String, value: V) {
        let expires_at = Instant::now() + self.ttl;

        if let Some(&idx) = self.index.get(&key) {
            self.detach(idx);
            self.nodes[idx].value = value;
            self.nodes[idx].expires_at = expires_at;
            self.push_front(idx);
            return;
        }

        if self.index.len() >= self.capacity {
            self.evict_tail();
        }

        let idx = if let Some(reused) = self.free_list.pop() {
            self.nodes[reused] = Node {
                key: key.clone(),
                value,
                expires_at,
                prev: NONE,
                next: NONE,
            };
            reused
        } else {
            self.nodes.push(Node {
                key: key.clone(),
                value,
                expires_at,
                prev: NONE,
                next: NONE,
            });
            self.nodes.len() - 1
        };

        self.index.insert(key, idx);
        self.push_front(idx);
    }

    /// Remove every entry whose key contains `needle` (used to invalidate
    /// all cache entries touching a given `spec_folder` on mutation).
    pub fn invalidate_matching(&mut self, needle: &str) {
        let keys: Vec<String> = self
            .index
            .keys()
            .filter(|k| k.contains(needle))
            .cloned()
            .collect();
        for key in keys {
            if let Some(idx) = self.index.remove(&key) {
                self.detach(idx);
                self.free_list.push(idx);
            }
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.free_list.clear();
        self.head = NONE;
        self.tail = NONE;
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
