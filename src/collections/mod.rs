// src/collections/mod.rs
//! Small containers tuned for the shader cache: an insertion-ordered map for
//! uniform tables and a sparse integer-keyed map for attribute slots.

pub mod ordered_map;
pub mod sparse_int_map;

pub use ordered_map::OrderedMap;
pub use sparse_int_map::SparseIntMap;
