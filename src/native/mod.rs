// src/native/mod.rs
//! Lifecycle of device resources: proxies, shadow clones and the tracker that
//! reconciles them with the device once per frame.

pub mod object;
pub mod tracker;

pub use object::{
    DestructableClone, DeviceId, NativeKind, NativeObject, NativeState, NativeUid, SharedProgram,
    SharedStage, Tracked,
};
pub use tracker::{ResourceTracker, TrackerStats};
