// src/collections/ordered_map.rs
//! Insertion-ordered map.
//!
//! Lookups go through a hash index, iteration walks a flat `Vec` in insertion
//! order. Removal is O(n) since it shifts the tail; the map is meant for tables
//! that are filled once and then iterated every frame.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct OrderedMap<K, V> {
    entries: Vec<(K, V)>,
    index: HashMap<K, usize>,
}

impl<K, V> Default for OrderedMap<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> OrderedMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or replaces. A replaced value keeps its original position.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.index.get(&key) {
            Some(&i) => Some(std::mem::replace(&mut self.entries[i].1, value)),
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Returns the value for `key`, inserting `make()` at the end first if absent.
    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: K, make: F) -> &mut V {
        let i = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.entries.len();
                self.index.insert(key.clone(), i);
                self.entries.push((key, make()));
                i
            }
        };
        &mut self.entries[i].1
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let i = self.index.remove(key)?;
        let (_, value) = self.entries.remove(i);
        for (k, _) in &self.entries[i..] {
            if let Some(slot) = self.index.get_mut::<K>(k) {
                *slot -= 1;
            }
        }
        Some(value)
    }

    /// Entry at insertion position `i`.
    #[inline]
    pub fn get_index(&self, i: usize) -> Option<(&K, &V)> {
        self.entries.get(i).map(|(k, v)| (k, v))
    }

    #[inline]
    pub fn value_at_mut(&mut self, i: usize) -> Option<&mut V> {
        self.entries.get_mut(i).map(|(_, v)| v)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.entries.iter_mut().map(|(_, v)| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_insertion_order() {
        let mut map = OrderedMap::new();
        map.insert("g_WorldMatrix", 1);
        map.insert("m_Color", 2);
        map.insert("g_Time", 3);
        let keys: Vec<_> = map.keys().copied().collect();
        assert_eq!(keys, ["g_WorldMatrix", "m_Color", "g_Time"]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut map = OrderedMap::new();
        map.insert("a".to_string(), 1);
        map.insert("b".to_string(), 2);
        assert_eq!(map.insert("a".to_string(), 10), Some(1));
        assert_eq!(map.get_index(0), Some((&"a".to_string(), &10)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn remove_reindexes_tail() {
        let mut map = OrderedMap::new();
        for (i, k) in ["a", "b", "c", "d"].iter().enumerate() {
            map.insert(k.to_string(), i);
        }
        assert_eq!(map.remove("b"), Some(1));
        assert_eq!(map.get("c"), Some(&2));
        assert_eq!(map.get("d"), Some(&3));
        assert_eq!(map.get_index(1).map(|(k, _)| k.as_str()), Some("c"));
        assert!(map.remove("b").is_none());
    }

    #[test]
    fn remove_by_str_then_reinsert_appends() {
        let mut map: OrderedMap<String, u32> = OrderedMap::new();
        map.insert("m_A".into(), 1);
        map.insert("m_B".into(), 2);
        map.insert("m_C".into(), 3);
        let key: &str = "m_A";
        assert_eq!(map.remove(key), Some(1));
        *map.get_or_insert_with("m_A".into(), || 0) += 10;
        let order: Vec<_> = map.keys().map(String::as_str).collect();
        assert_eq!(order, ["m_B", "m_C", "m_A"]);
        assert_eq!(map.get("m_C"), Some(&3));
        assert_eq!(map.get("m_A"), Some(&10));
    }

    #[test]
    fn get_or_insert_with_only_builds_once() {
        let mut map: OrderedMap<String, Vec<u8>> = OrderedMap::new();
        map.get_or_insert_with("x".into(), Vec::new).push(1);
        map.get_or_insert_with("x".into(), || unreachable!()).push(2);
        assert_eq!(map.get("x"), Some(&vec![1, 2]));
    }
}
