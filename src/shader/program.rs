// src/shader/program.rs
//! Shader programs: stages, uniform table, attribute slots.
//!
//! A program moves `Unlinked -> PendingLink -> Usable`. Any structural change
//! (new stage, new source, new defines) sends it back to `PendingLink` and
//! forgets every cached location. A context reset moves it to `Invalidated`,
//! which behaves like `PendingLink` on the next bind.

use std::sync::Arc;

use parking_lot::Mutex;

use super::binding::{FrameParams, UniformBinding};
use super::defines::DefineSet;
use super::stage::{ShaderStage, StageKind};
use super::uniform::{Uniform, UniformSnapshot};
use super::variable::Attribute;
use crate::collections::{OrderedMap, SparseIntMap};
use crate::device::LinkedProgram;
use crate::native::{DestructableClone, NativeKind, NativeObject, NativeState, SharedProgram};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramState {
    /// No stages yet.
    Unlinked,
    /// Has stages, needs a compile/link before use.
    PendingLink,
    Usable,
    /// Device id dropped by a context reset.
    Invalidated,
}

#[derive(Debug)]
pub struct ShaderProgram {
    native: NativeState,
    language: String,
    usable: bool,
    state: ProgramState,
    stages: Vec<ShaderStage>,
    /// Stages replaced after compiling; their device objects still need deleting.
    retired: Vec<DestructableClone>,
    uniforms: OrderedMap<String, Uniform>,
    attributes: SparseIntMap<Attribute>,
    bound: Vec<UniformBinding>,
}

impl ShaderProgram {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            native: NativeState::new(),
            language: language.into(),
            usable: false,
            state: ProgramState::Unlinked,
            stages: Vec::new(),
            retired: Vec::new(),
            uniforms: OrderedMap::new(),
            attributes: SparseIntMap::new(),
            bound: Vec::new(),
        }
    }

    pub fn into_shared(self) -> SharedProgram {
        Arc::new(Mutex::new(self))
    }

    #[inline]
    pub fn language(&self) -> &str {
        &self.language
    }

    #[inline]
    pub fn state(&self) -> ProgramState {
        self.state
    }

    #[inline]
    pub fn is_usable(&self) -> bool {
        self.usable
    }

    #[inline]
    pub fn is_update_needed(&self) -> bool {
        self.native.is_update_needed()
    }

    // ---------- Stages ----------

    pub fn add_source(
        &mut self,
        kind: StageKind,
        name: impl Into<String>,
        source: impl Into<String>,
        defines: impl Into<String>,
    ) {
        let mut stage = ShaderStage::new(kind, name, self.language.clone());
        stage.set_source(source);
        stage.set_defines(defines);
        self.stages.push(stage);
        self.set_update_needed();
    }

    #[inline]
    pub fn stages(&self) -> &[ShaderStage] {
        &self.stages
    }

    pub fn stage(&self, kind: StageKind) -> Option<&ShaderStage> {
        self.stages.iter().find(|s| s.kind() == kind)
    }

    /// Replaces the body of the first stage of `kind`. Returns false if the
    /// program has no such stage.
    pub fn set_stage_source(&mut self, kind: StageKind, source: impl Into<String>) -> bool {
        let Some(i) = self.stages.iter().position(|s| s.kind() == kind) else {
            return false;
        };
        self.retire_stage(i);
        self.stages[i].set_source(source);
        self.set_update_needed();
        true
    }

    /// Pushes a resolved define set into every stage. Only stages whose text
    /// differs are touched; returns whether anything changed.
    pub fn apply_defines(&mut self, defines: &DefineSet) -> bool {
        let compiled = defines.compiled();
        let mut changed = false;
        for i in 0..self.stages.len() {
            if self.stages[i].defines() != compiled {
                self.retire_stage(i);
                self.stages[i].set_defines(compiled);
                changed = true;
            }
        }
        if changed {
            self.set_update_needed();
        }
        changed
    }

    fn retire_stage(&mut self, i: usize) {
        let stage = &mut self.stages[i];
        if stage.id().is_valid() {
            self.retired.push(stage.create_destructable_clone());
            stage.reset_object();
        }
    }

    /// Hands out compiled stages that were replaced since the last link.
    pub fn take_retired_stages(&mut self) -> Vec<DestructableClone> {
        std::mem::take(&mut self.retired)
    }

    /// Marks the program for a compile/link and forgets every location.
    pub fn set_update_needed(&mut self) {
        self.native.set_update_needed();
        self.usable = false;
        self.reset_locations();
        self.state = if self.stages.is_empty() {
            ProgramState::Unlinked
        } else {
            ProgramState::PendingLink
        };
    }

    fn reset_locations(&mut self) {
        for u in self.uniforms.values_mut() {
            u.reset();
        }
        for a in self.attributes.values_mut() {
            a.reset();
        }
    }

    // ---------- Link results ----------

    /// Records a successful compile/link. Stage ids line up with `stages()`.
    pub fn apply_link(&mut self, linked: LinkedProgram) -> Result<()> {
        if linked.stages.len() != self.stages.len() {
            return Err(Error::invalid_state(format!(
                "link returned {} stage ids for {} stages",
                linked.stages.len(),
                self.stages.len()
            )));
        }
        let relink = self.native.id().is_valid();
        if relink {
            if self.native.id() != linked.program {
                return Err(Error::invalid_state(format!(
                    "program {} relinked under a different id {}",
                    self.native.id(),
                    linked.program
                )));
            }
        } else {
            self.native.set_id(linked.program)?;
        }
        for (stage, id) in self.stages.iter_mut().zip(linked.stages) {
            if stage.id().is_valid() {
                if stage.id() != id {
                    return Err(Error::invalid_state(format!(
                        "stage {} already owns id {}, refusing {}",
                        stage.name(),
                        stage.id(),
                        id
                    )));
                }
            } else {
                stage.native_mut().set_id(id)?;
            }
            stage.mark_compiled();
        }
        self.native.clear_update_needed();
        self.usable = true;
        self.state = ProgramState::Usable;
        if relink {
            self.reset_locations();
        }
        Ok(())
    }

    /// Compile or link failed: stays dirty, not usable.
    pub fn mark_link_failed(&mut self) {
        self.usable = false;
        self.state = ProgramState::PendingLink;
    }

    // ---------- Uniforms ----------

    /// Uniform `name`, created on first access.
    pub fn get_uniform(&mut self, name: &str) -> &mut Uniform {
        self.uniforms
            .get_or_insert_with(name.to_owned(), || Uniform::new(name))
    }

    pub fn uniform(&self, name: &str) -> Option<&Uniform> {
        self.uniforms.get(name)
    }

    pub fn remove_uniform(&mut self, name: &str) -> Option<Uniform> {
        self.bound.retain(|b| b.uniform_name() != name);
        self.uniforms.remove(name)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = &Uniform> + '_ {
        self.uniforms.values()
    }

    pub fn uniforms_mut(&mut self) -> impl Iterator<Item = &mut Uniform> + '_ {
        self.uniforms.values_mut()
    }

    #[inline]
    pub fn uniform_count(&self) -> usize {
        self.uniforms.len()
    }

    /// Declares an engine-computed uniform (`g_*`).
    pub fn add_uniform_binding(&mut self, binding: UniformBinding) {
        self.get_uniform(&binding.uniform_name()).set_binding(binding);
        if !self.bound.contains(&binding) {
            self.bound.push(binding);
        }
    }

    #[inline]
    pub fn uniform_bindings(&self) -> &[UniformBinding] {
        &self.bound
    }

    /// Refreshes every bound uniform from this frame's parameters.
    pub fn update_uniform_bindings(&mut self, params: &FrameParams) -> Result<()> {
        for i in 0..self.bound.len() {
            let binding = self.bound[i];
            let name = binding.uniform_name();
            if let Some(u) = self.uniforms.get_mut(name.as_str()) {
                u.set_value(params.value_of(binding))?;
            }
        }
        Ok(())
    }

    /// Start of a material apply: nothing has been written by the client yet.
    pub fn clear_uniforms_set_by_client(&mut self) {
        for u in self.uniforms.values_mut() {
            u.clear_set_by_client();
        }
    }

    /// End of a material apply: zero every non-bound uniform the client left
    /// untouched so no stale value leaks in from the previous material.
    pub fn reset_uniforms_not_set_by_client(&mut self) {
        for u in self.uniforms.values_mut() {
            if !u.is_set_by_client() && u.binding().is_none() {
                u.clear_value();
            }
        }
    }

    pub fn snapshot_uniforms(&self) -> Result<Vec<UniformSnapshot>> {
        self.uniforms
            .values()
            .filter(|u| u.binding().is_none())
            .map(Uniform::snapshot)
            .collect()
    }

    pub fn restore_uniforms(&mut self, snapshots: &[UniformSnapshot]) -> Result<()> {
        for s in snapshots {
            self.get_uniform(&s.name).restore(s)?;
        }
        Ok(())
    }

    // ---------- Attributes ----------

    /// Attribute for vertex slot `slot`; `name` is only used on creation.
    pub fn get_attribute(&mut self, slot: u32, name: &str) -> &mut Attribute {
        self.attributes.get_or_insert_with(slot, || Attribute::new(name))
    }

    pub fn attribute(&self, slot: u32) -> Option<&Attribute> {
        self.attributes.get(slot)
    }

    pub fn attributes_mut(&mut self) -> impl Iterator<Item = &mut Attribute> + '_ {
        self.attributes.values_mut()
    }
}

impl NativeObject for ShaderProgram {
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
        NativeKind::ShaderProgram
    }

    fn reset_object(&mut self) {
        self.native.reset();
        self.usable = false;
        for stage in &mut self.stages {
            stage.reset_object();
        }
        self.retired.clear();
        self.reset_locations();
        self.state = ProgramState::Invalidated;
    }

    fn create_destructable_clone(&self) -> DestructableClone {
        let mut children: Vec<DestructableClone> = self
            .stages
            .iter()
            .map(ShaderStage::create_destructable_clone)
            .collect();
        children.extend(self.retired.iter().cloned());
        DestructableClone {
            kind: NativeKind::ShaderProgram,
            uid: self.native.uid(),
            id: self.native.id(),
            children,
        }
    }

    fn release_native_buffers(&mut self) {
        for u in self.uniforms.values_mut() {
            u.release_buffers();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::DeviceId;
    use crate::shader::defines::DefineValue;
    use crate::shader::uniform::{UniformData, UniformValue};
    use crate::shader::variable::Location;
    use glam::Vec4;

    fn linked(program: u32, stages: &[u32]) -> LinkedProgram {
        LinkedProgram {
            program: DeviceId::new(program),
            stages: stages.iter().copied().map(DeviceId::new).collect(),
        }
    }

    fn basic() -> ShaderProgram {
        let mut p = ShaderProgram::new("GLSL330");
        p.add_source(StageKind::Vertex, "a.vert", "void main(){}", "");
        p.add_source(StageKind::Fragment, "a.frag", "void main(){}", "");
        p
    }

    #[test]
    fn state_machine() {
        let mut p = ShaderProgram::new("GLSL330");
        assert_eq!(p.state(), ProgramState::Unlinked);
        p.add_source(StageKind::Vertex, "a.vert", "void main(){}", "");
        assert_eq!(p.state(), ProgramState::PendingLink);
        p.apply_link(linked(1, &[2])).unwrap();
        assert_eq!(p.state(), ProgramState::Usable);
        assert!(p.is_usable() && !p.is_update_needed());
        assert!(p.stages()[0].is_usable());

        p.reset_object();
        assert_eq!(p.state(), ProgramState::Invalidated);
        assert!(!p.id().is_valid());
        assert!(!p.stages()[0].id().is_valid());
        assert!(p.is_update_needed());

        p.apply_link(linked(7, &[8])).unwrap();
        assert_eq!(p.id(), DeviceId::new(7));
    }

    #[test]
    fn structural_change_forgets_locations() {
        let mut p = basic();
        p.apply_link(linked(1, &[2, 3])).unwrap();
        p.get_uniform("m_Color").set_location(Location::Bound(0));
        p.get_attribute(0, "inPosition").set_location(Location::Bound(0));

        p.add_source(StageKind::Geometry, "a.geom", "void main(){}", "");
        assert!(!p.is_usable());
        assert_eq!(p.state(), ProgramState::PendingLink);
        assert_eq!(p.uniform("m_Color").unwrap().location(), Location::Unknown);
        assert_eq!(p.attribute(0).unwrap().location(), Location::Unknown);
    }

    #[test]
    fn relink_keeps_id_and_resets_locations() {
        let mut p = basic();
        p.apply_link(linked(1, &[2, 3])).unwrap();
        p.get_uniform("m_Color").set_location(Location::Bound(4));
        p.add_source(StageKind::Geometry, "a.geom", "void main(){}", "");
        p.apply_link(linked(1, &[2, 3, 4])).unwrap();
        assert_eq!(p.uniform("m_Color").unwrap().location(), Location::Unknown);
        assert!(p.apply_link(linked(9, &[2, 3, 4])).unwrap_err().is_lifecycle_fault());
    }

    #[test]
    fn link_with_wrong_stage_count_fails() {
        let mut p = basic();
        assert!(p.apply_link(linked(1, &[2])).is_err());
        assert!(!p.id().is_valid());
    }

    #[test]
    fn replaced_stage_is_retired_and_cloned() {
        let mut d = DefineSet::new();
        d.set("FOG", Some(DefineValue::Present));

        let mut p = basic();
        p.apply_link(linked(1, &[2, 3])).unwrap();
        assert!(p.apply_defines(&d));
        assert!(!p.apply_defines(&d));

        let clone = p.create_destructable_clone();
        let ids: Vec<_> = clone.children.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![DeviceId::INVALID, DeviceId::INVALID, DeviceId::new(2), DeviceId::new(3)]);

        assert_eq!(p.take_retired_stages().len(), 2);
        p.apply_link(linked(1, &[5, 6])).unwrap();
        assert_eq!(p.stages()[0].defines(), "#define FOG 1\n");
        assert!(p.take_retired_stages().is_empty());
    }

    #[test]
    fn set_stage_source_on_missing_kind() {
        let mut p = basic();
        assert!(!p.set_stage_source(StageKind::Geometry, "x"));
        assert!(p.set_stage_source(StageKind::Fragment, "void main(){ }"));
        assert_eq!(p.stage(StageKind::Fragment).unwrap().source(), "void main(){ }");
    }

    #[test]
    fn client_tracking_across_apply() {
        let mut p = basic();
        p.get_uniform("m_A").set_value(UniformValue::Float(1.0)).unwrap();
        p.get_uniform("m_B").set_value(UniformValue::Vector4(Vec4::ONE)).unwrap();
        p.add_uniform_binding(UniformBinding::Time);
        p.update_uniform_bindings(&FrameParams { time: 2.0, ..Default::default() })
            .unwrap();

        p.clear_uniforms_set_by_client();
        p.get_uniform("m_A").set_value(UniformValue::Float(3.0)).unwrap();
        p.reset_uniforms_not_set_by_client();

        assert_eq!(p.uniform("m_A").unwrap().data(), Some(UniformData::Float(3.0)));
        assert_eq!(p.uniform("m_B").unwrap().data(), Some(UniformData::Vector4(Vec4::ZERO)));
        assert_eq!(p.uniform("g_Time").unwrap().data(), Some(UniformData::Float(2.0)));
    }

    #[test]
    fn uniform_order_and_snapshot_skip_bindings() {
        let mut p = basic();
        p.get_uniform("m_Z").set_value(UniformValue::Int(1)).unwrap();
        p.add_uniform_binding(UniformBinding::WorldMatrix);
        p.add_uniform_binding(UniformBinding::WorldMatrix);
        p.get_uniform("m_A").set_value(UniformValue::Int(2)).unwrap();
        let names: Vec<_> = p.uniforms().map(|u| u.name().to_owned()).collect();
        assert_eq!(names, ["m_Z", "g_WorldMatrix", "m_A"]);
        assert_eq!(p.uniform_bindings().len(), 1);

        let snap = p.snapshot_uniforms().unwrap();
        assert_eq!(snap.len(), 2);
        let mut q = basic();
        q.restore_uniforms(&snap).unwrap();
        assert_eq!(q.uniform("m_A").unwrap().data(), Some(UniformData::Int(2)));
    }

    #[test]
    fn remove_uniform_keeps_order_of_the_rest() {
        let mut p = basic();
        p.get_uniform("m_A").set_value(UniformValue::Int(1)).unwrap();
        p.add_uniform_binding(UniformBinding::Time);
        p.get_uniform("m_B").set_value(UniformValue::Int(2)).unwrap();

        assert!(p.remove_uniform("g_Time").is_some());
        assert!(p.uniform_bindings().is_empty());
        assert!(p.remove_uniform("g_Time").is_none());
        let names: Vec<_> = p.uniforms().map(|u| u.name().to_owned()).collect();
        assert_eq!(names, ["m_A", "m_B"]);
        assert_eq!(p.uniform("m_B").unwrap().data(), Some(UniformData::Int(2)));
    }

    #[test]
    fn attribute_name_fixed_on_creation() {
        let mut p = basic();
        p.get_attribute(3, "inNormal");
        assert_eq!(p.get_attribute(3, "other").name(), "inNormal");
    }
}
