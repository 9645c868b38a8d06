// src/shader/variants.rs
//! Per-technique cache of compiled program variants, keyed by define set.

use std::num::NonZeroUsize;

use lru::LruCache;

use super::defines::DefineSet;
use super::program::ShaderProgram;
use crate::config::VariantCacheConfig;
use crate::native::{NativeObject, SharedProgram};
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Least-recently-used programs are disposed on eviction, so the tracker deletes
/// them on its next pass once no material holds them any more.
pub struct VariantCache {
    programs: LruCache<DefineSet, SharedProgram>,
    stats: VariantStats,
}

impl VariantCache {
    pub fn new(config: VariantCacheConfig) -> Self {
        let cap = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            programs: LruCache::new(cap),
            stats: VariantStats::default(),
        }
    }

    /// Program for `defines`, building it with `build` on a miss. The key is a
    /// deep copy so later edits to the caller's set do not alias the cache.
    pub fn get_or_create<F>(&mut self, defines: &DefineSet, build: F) -> Result<SharedProgram>
    where
        F: FnOnce(&DefineSet) -> Result<ShaderProgram>,
    {
        if let Some(p) = self.programs.get(defines) {
            self.stats.hits += 1;
            return Ok(p.clone());
        }
        self.stats.misses += 1;
        let program = build(defines)?.into_shared();
        if let Some((key, evicted)) = self.programs.push(defines.clone(), program.clone()) {
            self.stats.evictions += 1;
            let disposed = evicted.lock().dispose();
            log::debug!(
                "Evicted shader variant {:016x} (disposed: {})",
                key.fingerprint(),
                disposed
            );
        }
        Ok(program)
    }

    pub fn get(&mut self, defines: &DefineSet) -> Option<SharedProgram> {
        self.programs.get(defines).cloned()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    #[inline]
    pub fn stats(&self) -> VariantStats {
        self.stats
    }

    /// Disposes and forgets every cached variant.
    pub fn clear(&mut self) {
        while let Some((_, program)) = self.programs.pop_lru() {
            program.lock().dispose();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::defines::DefineValue;
    use crate::shader::stage::StageKind;
    use std::sync::Arc;

    fn build(d: &DefineSet) -> Result<ShaderProgram> {
        let mut p = ShaderProgram::new("GLSL330");
        p.add_source(StageKind::Vertex, "v.vert", "void main(){}", d.compiled());
        Ok(p)
    }

    fn defines(n: i64) -> DefineSet {
        let mut d = DefineSet::new();
        d.set("NUM_LIGHTS", Some(DefineValue::Int(n)));
        d
    }

    #[test]
    fn hit_returns_same_program() {
        let mut cache = VariantCache::new(VariantCacheConfig { capacity: 4 });
        let a = cache.get_or_create(&defines(1), build).unwrap();
        let b = cache.get_or_create(&defines(1), build).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.stats(), VariantStats { hits: 1, misses: 1, evictions: 0 });
        assert_eq!(a.lock().stages()[0].defines(), "#define NUM_LIGHTS 1\n");
    }

    #[test]
    fn key_is_independent_of_caller_set() {
        let mut cache = VariantCache::new(VariantCacheConfig { capacity: 4 });
        let mut d = defines(1);
        cache.get_or_create(&d, build).unwrap();
        d.set("NUM_LIGHTS", Some(DefineValue::Int(2)));
        assert!(cache.get(&d).is_none());
        assert!(cache.get(&defines(1)).is_some());
    }

    #[test]
    fn lru_evicts_oldest() {
        let mut cache = VariantCache::new(VariantCacheConfig { capacity: 2 });
        cache.get_or_create(&defines(1), build).unwrap();
        cache.get_or_create(&defines(2), build).unwrap();
        cache.get_or_create(&defines(1), build).unwrap();
        cache.get_or_create(&defines(3), build).unwrap();
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&defines(2)).is_none());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn build_errors_are_not_cached() {
        let mut cache = VariantCache::new(VariantCacheConfig::default());
        let err = cache.get_or_create(&defines(1), |_| Err(crate::Error::custom("no source")));
        assert!(err.is_err());
        assert!(cache.is_empty());
    }
}
