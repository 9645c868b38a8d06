// src/collections/sparse_int_map.rs
//! Hash map keyed by small non-negative integers, with open chaining.
//!
//! Attribute slots are a handful of small indices spread over a wider range,
//! so buckets are addressed by `key & mask` with no hashing at all.

const DEFAULT_CAPACITY: usize = 16;
const LOAD_FACTOR: f32 = 0.75;

#[derive(Debug, Clone)]
pub struct SparseIntMap<V> {
    buckets: Vec<Vec<(u32, V)>>,
    len: usize,
    threshold: usize,
}

impl<V> Default for SparseIntMap<V> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl<V> SparseIntMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity is rounded up to a power of two.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            buckets: (0..capacity).map(|_| Vec::new()).collect(),
            len: 0,
            threshold: (capacity as f32 * LOAD_FACTOR) as usize,
        }
    }

    #[inline]
    fn bucket(&self, key: u32) -> usize {
        key as usize & (self.buckets.len() - 1)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, key: u32) -> Option<&V> {
        self.buckets[self.bucket(key)]
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, key: u32) -> Option<&mut V> {
        let b = self.bucket(key);
        self.buckets[b]
            .iter_mut()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }

    #[inline]
    pub fn contains_key(&self, key: u32) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: u32, value: V) -> Option<V> {
        if let Some(slot) = self.get_mut(key) {
            return Some(std::mem::replace(slot, value));
        }
        self.push_new(key, value);
        None
    }

    pub fn get_or_insert_with<F: FnOnce() -> V>(&mut self, key: u32, make: F) -> &mut V {
        if !self.contains_key(key) {
            self.push_new(key, make());
        }
        let b = self.bucket(key);
        let bucket = &mut self.buckets[b];
        let pos = bucket
            .iter()
            .position(|(k, _)| *k == key)
            .unwrap_or(bucket.len() - 1);
        &mut bucket[pos].1
    }

    pub fn remove(&mut self, key: u32) -> Option<V> {
        let b = self.bucket(key);
        let bucket = &mut self.buckets[b];
        let pos = bucket.iter().position(|(k, _)| *k == key)?;
        self.len -= 1;
        Some(bucket.swap_remove(pos).1)
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.len = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &V)> + '_ {
        self.buckets
            .iter()
            .flat_map(|bucket| bucket.iter().map(|(k, v)| (*k, v)))
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.buckets
            .iter_mut()
            .flat_map(|bucket| bucket.iter_mut().map(|(_, v)| v))
    }

    fn push_new(&mut self, key: u32, value: V) {
        if self.len >= self.threshold {
            self.grow();
        }
        let b = self.bucket(key);
        self.buckets[b].push((key, value));
        self.len += 1;
    }

    fn grow(&mut self) {
        let new_capacity = self.buckets.len() * 2;
        let old = std::mem::replace(
            &mut self.buckets,
            (0..new_capacity).map(|_| Vec::new()).collect(),
        );
        self.threshold = (new_capacity as f32 * LOAD_FACTOR) as usize;
        for (key, value) in old.into_iter().flatten() {
            let b = self.bucket(key);
            self.buckets[b].push((key, value));
        }
    }
}
