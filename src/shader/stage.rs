// src/shader/stage.rs
//! One compilable source unit of a program.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::native::{DestructableClone, NativeKind, NativeObject, NativeState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageKind {
    Vertex,
    Fragment,
    Geometry,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
            StageKind::Geometry => "geometry",
        })
    }
}

/// `#version` line for a language tag such as `GLSL330`.
///
/// `GLSL100` maps to 110, versions from 150 on request the core profile, and
/// tags that are not GLSL produce no header.
pub fn version_header(language: &str) -> Option<String> {
    let version: u32 = language.strip_prefix("GLSL")?.parse().ok()?;
    Some(match version {
        0..=100 => "#version 110\n".to_owned(),
        v if v >= 150 => format!("#version {} core\n", v),
        v => format!("#version {}\n", v),
    })
}

#[derive(Debug)]
pub struct ShaderStage {
    native: NativeState,
    kind: StageKind,
    name: String,
    language: String,
    source: String,
    defines: String,
    usable: bool,
}

impl ShaderStage {
    pub fn new(kind: StageKind, name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            native: NativeState::new(),
            kind,
            name: name.into(),
            language: language.into(),
            source: String::new(),
            defines: String::new(),
            usable: false,
        }
    }

    #[inline]
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn defines(&self) -> &str {
        &self.defines
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.set_update_needed();
    }

    /// Replaces the resolved `#define` block.
    pub fn set_defines(&mut self, defines: impl Into<String>) {
        self.defines = defines.into();
        self.set_update_needed();
    }

    pub fn set_update_needed(&mut self) {
        self.native.set_update_needed();
        self.usable = false;
    }

    #[inline]
    pub fn is_update_needed(&self) -> bool {
        self.native.is_update_needed()
    }

    #[inline]
    pub fn is_usable(&self) -> bool {
        self.usable
    }

    /// Called once the device accepted the stage.
    pub(crate) fn mark_compiled(&mut self) {
        self.native.clear_update_needed();
        self.usable = true;
    }

    /// Full text handed to the compiler: version header, defines, body.
    pub fn compose(&self) -> String {
        let header = version_header(&self.language);
        let mut out = String::with_capacity(
            header.as_ref().map_or(0, String::len) + self.defines.len() + self.source.len(),
        );
        if let Some(h) = header {
            out.push_str(&h);
        }
        out.push_str(&self.defines);
        out.push_str(&self.source);
        out
    }
}

impl NativeObject for ShaderStage {
    #[inline]
    fn native(&self) -> &NativeState {
        &self.native
    }

    #[inline]
    fn native_mut(&mut self) -> &mut NativeState {
        &mut self.native
    }

    #[inline]
    fn kind(&self) -> NativeKind {
        NativeKind::ShaderStage
    }

    fn reset_object(&mut self) {
        self.native.reset();
        self.usable = false;
    }

    fn create_destructable_clone(&self) -> DestructableClone {
        DestructableClone {
            kind: NativeKind::ShaderStage,
            uid: self.native.uid(),
            id: self.native.id(),
            children: Vec::new(),
        }
    }
}
