// src/lib.rs
//! CPU-side shader state and the lifecycle tracker that keeps it in sync with
//! device resources.
//!
//! Per frame, on the thread that owns the device context:
//!  - [`device::ShaderBinder::set_shader`] compiles dirty programs, registers
//!    them with the [`native::ResourceTracker`] and uploads changed uniforms;
//!  - [`native::ResourceTracker::delete_unused`] deletes a bounded number of
//!    resources whose proxies were disposed or dropped, from any thread.

pub mod collections;
pub mod config;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod native;
pub mod shader;

pub use error::{Error, Result, ResultExt};
