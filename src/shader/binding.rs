// src/shader/binding.rs
//! Engine-computed uniforms (`g_WorldMatrix`, `g_Time`, ...).

use glam::{Mat3, Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use super::uniform::UniformValue;
use super::VarType;

/// Quantity the engine computes per frame or per geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UniformBinding {
    WorldMatrix,
    ViewMatrix,
    ProjectionMatrix,
    WorldViewMatrix,
    ViewProjectionMatrix,
    WorldViewProjectionMatrix,
    WorldMatrixInverse,
    NormalMatrix,
    CameraPosition,
    Resolution,
    Time,
    Tpf,
}

impl UniformBinding {
    pub fn var_type(self) -> VarType {
        match self {
            UniformBinding::WorldMatrix
            | UniformBinding::ViewMatrix
            | UniformBinding::ProjectionMatrix
            | UniformBinding::WorldViewMatrix
            | UniformBinding::ViewProjectionMatrix
            | UniformBinding::WorldViewProjectionMatrix
            | UniformBinding::WorldMatrixInverse => VarType::Matrix4,
            UniformBinding::NormalMatrix => VarType::Matrix3,
            UniformBinding::CameraPosition => VarType::Vector3,
            UniformBinding::Resolution => VarType::Vector2,
            UniformBinding::Time | UniformBinding::Tpf => VarType::Float,
        }
    }

    /// Name the uniform carries in shader source, e.g. `g_WorldMatrix`.
    pub fn uniform_name(self) -> String {
        format!("g_{:?}", self)
    }
}

/// Per-frame inputs the bound uniforms are derived from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub world: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    pub camera_position: Vec3,
    pub resolution: Vec2,
    /// Seconds since start.
    pub time: f32,
    /// Seconds per frame.
    pub tpf: f32,
}

impl Default for FrameParams {
    fn default() -> Self {
        Self {
            world: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            resolution: Vec2::ONE,
            time: 0.0,
            tpf: 0.0,
        }
    }
}

impl FrameParams {
    pub fn value_of(&self, binding: UniformBinding) -> UniformValue<'static> {
        match binding {
            UniformBinding::WorldMatrix => UniformValue::Matrix4(self.world),
            UniformBinding::ViewMatrix => UniformValue::Matrix4(self.view),
            UniformBinding::ProjectionMatrix => UniformValue::Matrix4(self.projection),
            UniformBinding::WorldViewMatrix => UniformValue::Matrix4(self.view * self.world),
            UniformBinding::ViewProjectionMatrix => UniformValue::Matrix4(self.projection * self.view),
            UniformBinding::WorldViewProjectionMatrix => {
                UniformValue::Matrix4(self.projection * self.view * self.world)
            }
            UniformBinding::WorldMatrixInverse => UniformValue::Matrix4(self.world.inverse()),
            UniformBinding::NormalMatrix => {
                let wv = Mat3::from_mat4(self.view * self.world);
                UniformValue::Matrix3(wv.inverse().transpose())
            }
            UniformBinding::CameraPosition => UniformValue::Vector3(self.camera_position),
            UniformBinding::Resolution => UniformValue::Vector2(self.resolution),
            UniformBinding::Time => UniformValue::Float(self.time),
            UniformBinding::Tpf => UniformValue::Float(self.tpf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_types() {
        assert_eq!(UniformBinding::WorldViewProjectionMatrix.uniform_name(), "g_WorldViewProjectionMatrix");
        assert_eq!(UniformBinding::NormalMatrix.var_type(), VarType::Matrix3);
        assert_eq!(UniformBinding::Time.var_type(), VarType::Float);
    }

    #[test]
    fn values_match_declared_types() {
        let params = FrameParams {
            world: Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0)),
            time: 1.5,
            ..Default::default()
        };
        let all = [
            UniformBinding::WorldMatrix,
            UniformBinding::ViewMatrix,
            UniformBinding::ProjectionMatrix,
            UniformBinding::WorldViewMatrix,
            UniformBinding::ViewProjectionMatrix,
            UniformBinding::WorldViewProjectionMatrix,
            UniformBinding::WorldMatrixInverse,
            UniformBinding::NormalMatrix,
            UniformBinding::CameraPosition,
            UniformBinding::Resolution,
            UniformBinding::Time,
            UniformBinding::Tpf,
        ];
        for b in all {
            assert_eq!(params.value_of(b).var_type(), b.var_type(), "{:?}", b);
        }
        match params.value_of(UniformBinding::WorldViewProjectionMatrix) {
            UniformValue::Matrix4(m) => assert_eq!(m.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0)),
            other => panic!("unexpected {:?}", other),
        }
    }
}
