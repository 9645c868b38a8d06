// src/device/mod.rs
//! Device-facing side: the executor seam and the per-context shader binder.

pub mod binder;
pub mod executor;

pub use binder::{RenderStats, ShaderBinder};
pub use executor::{DeviceCall, DeviceExecutor, LinkedProgram, RecordingExecutor};
