// src/shader/variable.rs
//! CPU-side mirrors of named variables inside a linked program.

use std::fmt;

/// Device-side binding location of a shader variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Location {
    /// Not queried since the program was last (re)linked.
    #[default]
    Unknown,
    /// The linked program does not declare this variable.
    Absent,
    Bound(u32),
}

impl Location {
    pub const UNKNOWN_RAW: i32 = -2;
    pub const ABSENT_RAW: i32 = -1;

    /// Maps a raw device answer: negative means not declared.
    #[inline]
    pub fn from_query(raw: i32) -> Self {
        if raw < 0 {
            Location::Absent
        } else {
            Location::Bound(raw as u32)
        }
    }

    #[inline]
    pub fn as_raw(self) -> i32 {
        match self {
            Location::Unknown => Self::UNKNOWN_RAW,
            Location::Absent => Self::ABSENT_RAW,
            Location::Bound(n) => n as i32,
        }
    }

    #[inline]
    pub fn is_known(self) -> bool {
        !matches!(self, Location::Unknown)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Unknown => f.write_str("unknown"),
            Location::Absent => f.write_str("absent"),
            Location::Bound(n) => write!(f, "{}", n),
        }
    }
}

/// State shared by uniforms and attributes.
#[derive(Debug, Clone)]
pub struct ShaderVariable {
    name: String,
    location: Location,
    update_needed: bool,
}

impl ShaderVariable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: Location::Unknown,
            update_needed: true,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn location(&self) -> Location {
        self.location
    }

    #[inline]
    pub fn set_location(&mut self, location: Location) {
        self.location = location;
    }

    #[inline]
    pub fn is_update_needed(&self) -> bool {
        self.update_needed
    }

    #[inline]
    pub fn set_update_needed(&mut self) {
        self.update_needed = true;
    }

    #[inline]
    pub fn clear_update_needed(&mut self) {
        self.update_needed = false;
    }
}

/// A vertex input slot of a program.
#[derive(Debug, Clone)]
pub struct Attribute {
    var: ShaderVariable,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            var: ShaderVariable::new(name),
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

    /// Forget the location after the owning program lost its device id.
    pub fn reset(&mut self) {
        self.var.set_location(Location::Unknown);
        self.var.set_update_needed();
    }
}
