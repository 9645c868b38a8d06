// src/config.rs
//! Engine-tunable constants for the native resource layer.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Default cap on device deletions issued by a single reconciliation pass.
pub const MAX_REMOVES_PER_FRAME: usize = 100;

// ---------- Tracker ----------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Upper bound on deletions per `delete_unused` call.
    pub max_removes_per_frame: usize,
    /// Also free CPU-side uniform scratch buffers when a disposed object is
    /// deleted. Any code still reading those values afterwards sees them zeroed.
    pub unsafe_buffer_reclaim: bool,
}

impl TrackerConfig {
    /// A zero budget would leave every queued deletion waiting forever.
    pub fn validate(&self) -> Result<()> {
        if self.max_removes_per_frame == 0 {
            return Err(Error::invalid_state(
                "tracker.max_removes_per_frame must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_removes_per_frame: MAX_REMOVES_PER_FRAME,
            unsafe_buffer_reclaim: false,
        }
    }
}

// ---------- Variant cache ----------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantCacheConfig {
    /// Programs kept per technique before the least recently used is disposed.
    pub capacity: usize,
}

impl Default for VariantCacheConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

// ---------- Aggregate ----------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tracker: TrackerConfig,
    pub variants: VariantCacheConfig,
}

impl EngineConfig {
    /// Missing fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.tracker.validate()?;
        Ok(cfg)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let cfg = Self::from_json_str(&text)?;
        log::debug!("Loaded engine config from {:?}: {:?}", path, cfg);
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.tracker.max_removes_per_frame, 100);
        assert!(!cfg.tracker.unsafe_buffer_reclaim);
        assert_eq!(cfg.variants.capacity, 64);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json_str(r#"{ "tracker": { "max_removes_per_frame": 8 } }"#).unwrap();
        assert_eq!(cfg.tracker.max_removes_per_frame, 8);
        assert!(!cfg.tracker.unsafe_buffer_reclaim);
        assert_eq!(cfg.variants.capacity, 64);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{ "tracker": { "max_removes_per_frame": 0 } }"#)
            .unwrap_err();
        assert!(err.is_lifecycle_fault());
        assert!(TrackerConfig::default().validate().is_ok());
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = EngineConfig::from_json_str("{ tracker: ").unwrap_err();
        assert!(matches!(err, crate::Error::Json(_)));
    }
}
