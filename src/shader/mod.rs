// src/shader/mod.rs
//! CPU-side shader state: defines, variables, stages, programs and the
//! variant cache.

pub mod binding;
pub mod defines;
pub mod program;
pub mod stage;
pub mod uniform;
pub mod var_type;
pub mod variable;
pub mod variants;

pub use binding::{FrameParams, UniformBinding};
pub use defines::{DefineSet, DefineValue};
pub use program::{ProgramState, ShaderProgram};
pub use stage::{version_header, ShaderStage, StageKind};
pub use uniform::{SnapshotValue, Uniform, UniformData, UniformSnapshot, UniformValue};
pub use var_type::VarType;
pub use variable::{Attribute, Location, ShaderVariable};
pub use variants::{VariantCache, VariantStats};
