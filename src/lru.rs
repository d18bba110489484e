//! Bijective, bounded LRU: `Put`/`Get` keep a key-index and a value-index in
//! sync, both backed by the same recency list, so every live entry can be
//! looked up from either side in O(1).
//!
//! Grounded on the key↔value map pair in the original LRU, reimplemented here
//! as a slab of nodes addressed by index (no unsafe, no raw pointers).

use std::collections::HashMap;
use std::hash::Hash;

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// A fixed-capacity, bijective LRU cache.
pub struct Lru<K, V> {
    capacity: usize,
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    key_index: HashMap<K, usize>,
    value_index: HashMap<V, usize>,
    head: Option<usize>, // most recently used
    tail: Option<usize>, // least recently used
}

impl<K, V> Lru<K, V>
where
    K: Eq + Hash + Clone,
    V: Eq + Hash + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            nodes: Vec::new(),
            free: Vec::new(),
            key_index: HashMap::new(),
            value_index: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    pub fn len(&self) -> usize {
        self.key_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_index.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        let idx = *self.key_index.get(key)?;
        self.touch(idx);
        self.nodes[idx].as_ref().map(|n| n.value.clone())
    }

    pub fn get_key_from_value(&mut self, value: &V) -> Option<K> {
        let idx = *self.value_index.get(value)?;
        self.touch(idx);
        self.nodes[idx].as_ref().map(|n| n.key.clone())
    }

    /// The value currently held by the least-recently-used entry.
    pub fn get_last_value(&self) -> Option<V> {
        let idx = self.tail?;
        self.nodes[idx].as_ref().map(|n| n.value.clone())
    }

    /// Inserts `(key, value)`. If the key already exists its value is
    /// replaced; if the cache is over capacity the LRU tail is evicted.
    pub fn put(&mut self, key: K, value: V) {
        if let Some(&idx) = self.key_index.get(&key) {
            let old_value = self.nodes[idx].as_ref().map(|n| n.value.clone());
            if let Some(old_value) = old_value {
                self.value_index.remove(&old_value);
            }
            self.value_index.insert(value.clone(), idx);
            if let Some(node) = self.nodes[idx].as_mut() {
                node.value = value;
            }
            self.touch(idx);
            return;
        }

        let idx = self.alloc(key.clone(), value.clone());
        self.key_index.insert(key, idx);
        self.value_index.insert(value, idx);
        self.push_front(idx);

        if self.len() > self.capacity {
            self.evict_tail();
        }
    }

    /// Reassigns the key of the current LRU tail to `key`, keeping its value
    /// unchanged, and promotes it to most-recently-used. Used by the fake-IP
    /// pool's full-pool reuse path: the IP (value) is kept, the domain (key)
    /// bound to it changes.
    pub fn replace_last_key(&mut self, key: K) -> Option<(K, V)> {
        let idx = self.tail?;
        let (old_key, value) = {
            let node = self.nodes[idx].as_ref()?;
            (node.key.clone(), node.value.clone())
        };
        self.key_index.remove(&old_key);
        self.key_index.insert(key.clone(), idx);
        if let Some(node) = self.nodes[idx].as_mut() {
            node.key = key;
        }
        self.touch(idx);
        Some((old_key, value))
    }

    fn alloc(&mut self, key: K, value: V) -> usize {
        let node = Node {
            key,
            value,
            prev: None,
            next: None,
        };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = Some(node);
            idx
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    fn push_front(&mut self, idx: usize) {
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = self.head;
        }
        if let Some(head) = self.head {
            if let Some(node) = self.nodes[head].as_mut() {
                node.prev = Some(idx);
            }
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.nodes[idx].as_ref().expect("unlink of freed node");
            (node.prev, node.next)
        };
        match prev {
            Some(p) => {
                if let Some(n) = self.nodes[p].as_mut() {
                    n.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(p) = self.nodes[n].as_mut() {
                    p.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn touch(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn evict_tail(&mut self) {
        let Some(idx) = self.tail else { return };
        self.unlink(idx);
        if let Some(node) = self.nodes[idx].take() {
            self.key_index.remove(&node.key);
            self.value_index.remove(&node.value);
        }
        self.free.push(idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bijection_holds_after_puts() {
        let mut lru: Lru<String, u32> = Lru::new(4);
        lru.put("a".into(), 1);
        lru.put("b".into(), 2);
        assert_eq!(lru.get(&"a".to_string()), Some(1));
        assert_eq!(lru.get_key_from_value(&2), Some("b".to_string()));
    }

    #[test]
    fn eviction_on_overflow_drops_lru_tail() {
        let mut lru: Lru<String, u32> = Lru::new(2);
        lru.put("a".into(), 1);
        lru.put("b".into(), 2);
        lru.get(&"a".to_string()); // touch a, b becomes LRU
        lru.put("c".into(), 3); // evicts b
        assert_eq!(lru.get(&"b".to_string()), None);
        assert_eq!(lru.get(&"a".to_string()), Some(1));
        assert_eq!(lru.get(&"c".to_string()), Some(3));
    }

    #[test]
    fn replace_last_key_keeps_value_rebinds_key() {
        let mut lru: Lru<String, u32> = Lru::new(1);
        lru.put("a".into(), 100);
        let (evicted, value) = lru.replace_last_key("b".into()).unwrap();
        assert_eq!(evicted, "a");
        assert_eq!(value, 100);
        assert_eq!(lru.get(&"b".to_string()), Some(100));
        assert_eq!(lru.get(&"a".to_string()), None);
    }
}
