// src/shader/var_type.rs

use serde::{Deserialize, Serialize};

/// Value types a shader variable can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VarType {
    Float,
    Int,
    Boolean,
    Vector2,
    Vector3,
    Vector4,
    Matrix3,
    Matrix4,
    FloatArray,
    IntArray,
    Vector2Array,
    Vector3Array,
    Vector4Array,
    Matrix3Array,
    Matrix4Array,
}

impl VarType {
    /// Types stored in a uniform's reusable scratch buffer.
    #[inline]
    pub fn uses_buffer(self) -> bool {
        matches!(
            self,
            VarType::Matrix3
                | VarType::Matrix4
                | VarType::FloatArray
                | VarType::IntArray
                | VarType::Vector2Array
                | VarType::Vector3Array
                | VarType::Vector4Array
                | VarType::Matrix3Array
                | VarType::Matrix4Array
        )
    }
}
