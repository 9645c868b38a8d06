// src/shader/uniform.rs
//! Uniform variables.
//!
//! A uniform locks in the type of the first value written to it. Matrix and
//! array values live in a scratch buffer that is reused across writes and only
//! ever grows. Scalar writes that do not change the bits are skipped so the
//! uniform is not re-uploaded; vectors, matrices and arrays are always treated
//! as changed.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::binding::UniformBinding;
use super::variable::{Location, ShaderVariable};
use super::VarType;
use crate::{Error, Result};

/// A value written into a uniform. Array variants borrow the caller's data,
/// which is copied into the uniform's own buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue<'a> {
    Float(f32),
    Int(i32),
    Boolean(bool),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    Matrix3(Mat3),
    Matrix4(Mat4),
    FloatArray(&'a [f32]),
    IntArray(&'a [i32]),
    Vector2Array(&'a [Vec2]),
    Vector3Array(&'a [Vec3]),
    Vector4Array(&'a [Vec4]),
    Matrix3Array(&'a [Mat3]),
    Matrix4Array(&'a [Mat4]),
}

impl UniformValue<'_> {
    pub fn var_type(&self) -> VarType {
        match self {
            UniformValue::Float(_) => VarType::Float,
            UniformValue::Int(_) => VarType::Int,
            UniformValue::Boolean(_) => VarType::Boolean,
            UniformValue::Vector2(_) => VarType::Vector2,
            UniformValue::Vector3(_) => VarType::Vector3,
            UniformValue::Vector4(_) => VarType::Vector4,
            UniformValue::Matrix3(_) => VarType::Matrix3,
            UniformValue::Matrix4(_) => VarType::Matrix4,
            UniformValue::FloatArray(_) => VarType::FloatArray,
            UniformValue::IntArray(_) => VarType::IntArray,
            UniformValue::Vector2Array(_) => VarType::Vector2Array,
            UniformValue::Vector3Array(_) => VarType::Vector3Array,
            UniformValue::Vector4Array(_) => VarType::Vector4Array,
            UniformValue::Matrix3Array(_) => VarType::Matrix3Array,
            UniformValue::Matrix4Array(_) => VarType::Matrix4Array,
        }
    }
}

/// Read view of a uniform's current value, as handed to the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformData<'a> {
    Float(f32),
    Int(i32),
    Boolean(bool),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    /// Column-major matrices and flattened float/vector arrays.
    Floats(&'a [f32]),
    Ints(&'a [i32]),
}

impl UniformData<'_> {
    /// Appends the native-endian bytes of the value to `out`.
    pub fn append_bytes(&self, out: &mut Vec<u8>) {
        match self {
            UniformData::Float(f) => out.extend_from_slice(bytemuck::bytes_of(f)),
            UniformData::Int(i) => out.extend_from_slice(bytemuck::bytes_of(i)),
            UniformData::Boolean(b) => out.extend_from_slice(&(*b as u32).to_ne_bytes()),
            UniformData::Vector2(v) => out.extend_from_slice(bytemuck::bytes_of(v)),
            UniformData::Vector3(v) => out.extend_from_slice(bytemuck::bytes_of(v)),
            UniformData::Vector4(v) => out.extend_from_slice(bytemuck::bytes_of(v)),
            UniformData::Floats(f) => out.extend_from_slice(bytemuck::cast_slice(*f)),
            UniformData::Ints(i) => out.extend_from_slice(bytemuck::cast_slice(*i)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stored {
    Empty,
    Float(f32),
    Int(i32),
    Boolean(bool),
    Vector2(Vec2),
    Vector3(Vec3),
    Vector4(Vec4),
    Floats,
    Ints,
}

#[derive(Debug, Clone)]
pub struct Uniform {
    var: ShaderVariable,
    binding: Option<UniformBinding>,
    var_type: Option<VarType>,
    value: Stored,
    float_buf: Vec<f32>,
    int_buf: Vec<i32>,
    set_by_client: bool,
}

impl Uniform {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            var: ShaderVariable::new(name),
            binding: None,
            var_type: None,
            value: Stored::Empty,
            float_buf: Vec::new(),
            int_buf: Vec::new(),
            set_by_client: false,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.var.name()
    }

    #[inline]
    pub fn location(&self) -> Location {
        self.var.location()
    }

    #[inline]
    pub fn set_location(&mut self, location: Location) {
        self.var.set_location(location);
    }

    #[inline]
    pub fn variable(&self) -> &ShaderVariable {
        &self.var
    }

    #[inline]
    pub fn is_update_needed(&self) -> bool {
        self.var.is_update_needed()
    }

    #[inline]
    pub fn clear_update_needed(&mut self) {
        self.var.clear_update_needed();
    }

    #[inline]
    pub fn var_type(&self) -> Option<VarType> {
        self.var_type
    }

    #[inline]
    pub fn binding(&self) -> Option<UniformBinding> {
        self.binding
    }

    pub(crate) fn set_binding(&mut self, binding: UniformBinding) {
        self.binding = Some(binding);
    }

    #[inline]
    pub fn is_set_by_client(&self) -> bool {
        self.set_by_client
    }

    /// Called when a new material pass starts and no longer vouches for the value.
    #[inline]
    pub fn clear_set_by_client(&mut self) {
        self.set_by_client = false;
    }

    /// Writes a value.
    ///
    /// A uniform the linked program does not declare swallows the write. Fails
    /// with `TypeMismatch` when `value` does not match the established type.
    pub fn set_value(&mut self, value: UniformValue<'_>) -> Result<()> {
        if self.var.location() == Location::Absent {
            return Ok(());
        }

        let ty = value.var_type();
        if let Some(expected) = self.var_type {
            if expected != ty {
                return Err(Error::TypeMismatch {
                    name: self.name().to_owned(),
                    expected,
                    found: ty,
                });
            }
        }

        self.set_by_client = true;
        let changed = match value {
            UniformValue::Float(f) => self.store_scalar(Stored::Float(f)),
            UniformValue::Int(i) => self.store_scalar(Stored::Int(i)),
            UniformValue::Boolean(b) => self.store_scalar(Stored::Boolean(b)),
            UniformValue::Vector2(v) => {
                self.value = Stored::Vector2(v);
                true
            }
            UniformValue::Vector3(v) => {
                self.value = Stored::Vector3(v);
                true
            }
            UniformValue::Vector4(v) => {
                self.value = Stored::Vector4(v);
                true
            }
            UniformValue::Matrix3(m) => self.fill_floats(&m.to_cols_array()),
            UniformValue::Matrix4(m) => self.fill_floats(&m.to_cols_array()),
            UniformValue::FloatArray(a) => self.fill_floats(a),
            UniformValue::IntArray(a) => {
                self.int_buf.clear();
                self.int_buf.extend_from_slice(a);
                self.value = Stored::Ints;
                true
            }
            UniformValue::Vector2Array(a) => self.fill_floats(bytemuck::cast_slice(a)),
            UniformValue::Vector3Array(a) => self.fill_floats(bytemuck::cast_slice(a)),
            UniformValue::Vector4Array(a) => self.fill_floats(bytemuck::cast_slice(a)),
            UniformValue::Matrix3Array(a) => self.fill_floats(bytemuck::cast_slice(a)),
            UniformValue::Matrix4Array(a) => self.fill_floats(bytemuck::cast_slice(a)),
        };

        self.var_type = Some(ty);
        if changed {
            self.var.set_update_needed();
        }
        Ok(())
    }

    /// Nullable entry point for parameter plumbing. `None` is a `NullValue` error.
    pub fn set_nullable(&mut self, value: Option<UniformValue<'_>>) -> Result<()> {
        match value {
            Some(v) => self.set_value(v),
            None => Err(Error::NullValue(self.name().to_owned())),
        }
    }

    // Bit-level comparison: 0.0 vs -0.0 and NaN payloads count as changes.
    fn store_scalar(&mut self, new: Stored) -> bool {
        let same = match (self.value, new) {
            (Stored::Float(a), Stored::Float(b)) => a.to_bits() == b.to_bits(),
            (Stored::Int(a), Stored::Int(b)) => a == b,
            (Stored::Boolean(a), Stored::Boolean(b)) => a == b,
            _ => false,
        };
        if !same {
            self.value = new;
        }
        !same
    }

    fn fill_floats(&mut self, src: &[f32]) -> bool {
        self.float_buf.clear();
        self.float_buf.extend_from_slice(src);
        self.value = Stored::Floats;
        true
    }

    /// Zeroes the value but keeps its type. Buffer-backed values are zero-filled
    /// in place.
    pub fn clear_value(&mut self) {
        let Some(ty) = self.var_type else {
            return;
        };
        self.var.set_update_needed();
        self.value = match self.value {
            Stored::Floats => {
                self.float_buf.fill(0.0);
                Stored::Floats
            }
            Stored::Ints => {
                self.int_buf.fill(0);
                Stored::Ints
            }
            Stored::Empty => Stored::Empty,
            _ => match ty {
                VarType::Float => Stored::Float(0.0),
                VarType::Int => Stored::Int(0),
                VarType::Boolean => Stored::Boolean(false),
                VarType::Vector2 => Stored::Vector2(Vec2::ZERO),
                VarType::Vector3 => Stored::Vector3(Vec3::ZERO),
                VarType::Vector4 => Stored::Vector4(Vec4::ZERO),
                _ => Stored::Empty,
            },
        };
    }

    /// Drops the value and its type so the uniform can take a value of any type.
    pub fn forget_value(&mut self) {
        self.var_type = None;
        self.value = Stored::Empty;
        self.float_buf.clear();
        self.int_buf.clear();
        self.set_by_client = false;
        self.var.set_update_needed();
    }

    /// The owning program's device id was invalidated.
    pub fn reset(&mut self) {
        self.var.set_location(Location::Unknown);
        self.set_by_client = false;
        self.var.set_update_needed();
    }

    /// Frees the scratch buffers. A buffer-backed value is lost, the type stays.
    pub fn release_buffers(&mut self) {
        if self.var_type.is_some_and(VarType::uses_buffer) {
            self.value = Stored::Empty;
        }
        self.float_buf = Vec::new();
        self.int_buf = Vec::new();
    }

    pub fn data(&self) -> Option<UniformData<'_>> {
        Some(match self.value {
            Stored::Empty => return None,
            Stored::Float(f) => UniformData::Float(f),
            Stored::Int(i) => UniformData::Int(i),
            Stored::Boolean(b) => UniformData::Boolean(b),
            Stored::Vector2(v) => UniformData::Vector2(v),
            Stored::Vector3(v) => UniformData::Vector3(v),
            Stored::Vector4(v) => UniformData::Vector4(v),
            Stored::Floats => UniformData::Floats(&self.float_buf),
            Stored::Ints => UniformData::Ints(&self.int_buf),
        })
    }

    #[cfg(test)]
    fn buffer_capacity(&self) -> usize {
        self.float_buf.capacity()
    }

    /// Serializable copy of the value.
    pub fn snapshot(&self) -> Result<UniformSnapshot> {
        let value = match self.var_type {
            None => None,
            Some(ty @ (VarType::Matrix3Array | VarType::Matrix4Array)) => {
                return Err(Error::UnsupportedConversion(ty));
            }
            Some(ty) => self.snapshot_value(ty),
        };
        Ok(UniformSnapshot {
            name: self.name().to_owned(),
            value,
        })
    }

    fn snapshot_value(&self, ty: VarType) -> Option<SnapshotValue> {
        let f = &self.float_buf;
        Some(match (self.value, ty) {
            (Stored::Empty, _) => return None,
            (Stored::Float(v), _) => SnapshotValue::Float(v),
            (Stored::Int(v), _) => SnapshotValue::Int(v),
            (Stored::Boolean(v), _) => SnapshotValue::Boolean(v),
            (Stored::Vector2(v), _) => SnapshotValue::Vector2(v.to_array()),
            (Stored::Vector3(v), _) => SnapshotValue::Vector3(v.to_array()),
            (Stored::Vector4(v), _) => SnapshotValue::Vector4(v.to_array()),
            (Stored::Ints, _) => SnapshotValue::IntArray(self.int_buf.clone()),
            (Stored::Floats, VarType::Matrix3) => SnapshotValue::Matrix3(Mat3::from_cols_slice(f).to_cols_array()),
            (Stored::Floats, VarType::Matrix4) => SnapshotValue::Matrix4(Mat4::from_cols_slice(f).to_cols_array()),
            (Stored::Floats, VarType::Vector2Array) => {
                SnapshotValue::Vector2Array(f.chunks_exact(2).map(|c| [c[0], c[1]]).collect())
            }
            (Stored::Floats, VarType::Vector3Array) => {
                SnapshotValue::Vector3Array(f.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect())
            }
            (Stored::Floats, VarType::Vector4Array) => {
                SnapshotValue::Vector4Array(f.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]).collect())
            }
            (Stored::Floats, _) => SnapshotValue::FloatArray(f.clone()),
        })
    }

    /// Writes a snapshot's value back through `set_value`.
    pub fn restore(&mut self, snapshot: &UniformSnapshot) -> Result<()> {
        let Some(value) = &snapshot.value else {
            return Ok(());
        };
        match value {
            SnapshotValue::Float(v) => self.set_value(UniformValue::Float(*v)),
            SnapshotValue::Int(v) => self.set_value(UniformValue::Int(*v)),
            SnapshotValue::Boolean(v) => self.set_value(UniformValue::Boolean(*v)),
            SnapshotValue::Vector2(v) => self.set_value(UniformValue::Vector2(Vec2::from_array(*v))),
            SnapshotValue::Vector3(v) => self.set_value(UniformValue::Vector3(Vec3::from_array(*v))),
            SnapshotValue::Vector4(v) => self.set_value(UniformValue::Vector4(Vec4::from_array(*v))),
            SnapshotValue::Matrix3(m) => self.set_value(UniformValue::Matrix3(Mat3::from_cols_array(m))),
            SnapshotValue::Matrix4(m) => self.set_value(UniformValue::Matrix4(Mat4::from_cols_array(m))),
            SnapshotValue::FloatArray(a) => self.set_value(UniformValue::FloatArray(a)),
            SnapshotValue::IntArray(a) => self.set_value(UniformValue::IntArray(a)),
            SnapshotValue::Vector2Array(a) => {
                let tmp: Vec<Vec2> = a.iter().copied().map(Vec2::from_array).collect();
                self.set_value(UniformValue::Vector2Array(&tmp))
            }
            SnapshotValue::Vector3Array(a) => {
                let tmp: Vec<Vec3> = a.iter().copied().map(Vec3::from_array).collect();
                self.set_value(UniformValue::Vector3Array(&tmp))
            }
            SnapshotValue::Vector4Array(a) => {
                let tmp: Vec<Vec4> = a.iter().copied().map(Vec4::from_array).collect();
                self.set_value(UniformValue::Vector4Array(&tmp))
            }
        }
    }
}

// ---------- Snapshots ----------

/// Wire form of a uniform value. Arrays of matrices have no encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum SnapshotValue {
    Float(f32),
    Int(i32),
    Boolean(bool),
    Vector2([f32; 2]),
    Vector3([f32; 3]),
    Vector4([f32; 4]),
    Matrix3([f32; 9]),
    Matrix4([f32; 16]),
    FloatArray(Vec<f32>),
    IntArray(Vec<i32>),
    Vector2Array(Vec<[f32; 2]>),
    Vector3Array(Vec<[f32; 3]>),
    Vector4Array(Vec<[f32; 4]>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformSnapshot {
    pub name: String,
    pub value: Option<SnapshotValue>,
}
