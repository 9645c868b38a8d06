// src/device/binder.rs
//! Binds programs for drawing: compile/link on demand, register with the
//! tracker, then upload whatever uniforms changed.

use crate::native::{DeviceId, NativeObject, ResourceTracker, SharedProgram, Tracked};
use crate::shader::{Location, ShaderProgram};
use crate::Result;

use super::executor::DeviceExecutor;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderStats {
    pub shaders_created: u64,
    pub shaders_relinked: u64,
    pub shader_failures: u64,
    pub program_switches: u64,
    pub shaders_deleted: u64,
    pub uniforms_set: u64,
    pub location_queries: u64,
}

/// Per-context binding state. Remembers the bound program so redundant
/// switches are skipped.
#[derive(Debug, Default)]
pub struct ShaderBinder {
    bound: DeviceId,
    stats: RenderStats,
}

impl ShaderBinder {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    #[inline]
    pub fn bound_program(&self) -> DeviceId {
        self.bound
    }

    /// Makes `program` current: uploads it if needed, binds it and pushes dirty
    /// uniforms. A program that fails to build is left unusable and the error
    /// returned; nothing is bound.
    pub fn set_shader(
        &mut self,
        executor: &mut dyn DeviceExecutor,
        tracker: &mut ResourceTracker,
        program: &SharedProgram,
    ) -> Result<()> {
        self.update_program(executor, tracker, program)?;

        let mut p = program.lock();
        let id = p.id();
        if self.bound != id {
            executor.use_program(id);
            self.bound = id;
            self.stats.program_switches += 1;
        }

        self.update_uniforms(executor, &mut p);
        self.update_attributes(executor, &mut p);
        Ok(())
    }

    /// Uploads every dirty uniform, resolving unknown locations first. A
    /// uniform the program does not declare is marked absent and never
    /// queried again until the next link.
    pub fn update_uniforms(&mut self, executor: &mut dyn DeviceExecutor, program: &mut ShaderProgram) {
        let id = program.id();
        for u in program.uniforms_mut() {
            if !u.is_update_needed() {
                continue;
            }
            let location = match u.location() {
                Location::Unknown => {
                    self.stats.location_queries += 1;
                    let loc = Location::from_query(executor.query_uniform_location(id, u.name()));
                    if loc == Location::Absent {
                        log::debug!("Uniform {} is not declared in program {}", u.name(), id);
                    }
                    u.set_location(loc);
                    loc
                }
                known => known,
            };
            let Location::Bound(slot) = location else {
                u.clear_update_needed();
                continue;
            };
            // Declared but never written: keep it dirty until a value arrives.
            let Some(data) = u.data() else {
                continue;
            };
            executor.bind_uniform(slot, data);
            u.clear_update_needed();
            self.stats.uniforms_set += 1;
        }
    }

    pub fn update_attributes(&mut self, executor: &mut dyn DeviceExecutor, program: &mut ShaderProgram) {
        let id = program.id();
        for a in program.attributes_mut() {
            if a.location() == Location::Unknown {
                self.stats.location_queries += 1;
                a.set_location(Location::from_query(
                    executor.query_attribute_location(id, a.name()),
                ));
            }
        }
    }

    /// Compiles and links `program` if it is dirty. The first successful link
    /// registers it with the tracker; later relinks refresh the tracker's
    /// shadow. A relink failure deletes the stale device program.
    #[tracing::instrument(skip_all)]
    pub fn update_program(
        &mut self,
        executor: &mut dyn DeviceExecutor,
        tracker: &mut ResourceTracker,
        program: &SharedProgram,
    ) -> Result<()> {
        let tracked = Tracked::from(program);
        let mut p = program.lock();
        if !p.is_update_needed() {
            return Ok(());
        }

        for stage in p.take_retired_stages() {
            stage.delete(executor);
        }

        let old_id = p.id();
        let relink = old_id.is_valid();
        match executor.compile_and_link(&p) {
            Ok(linked) => {
                p.apply_link(linked)?;
                drop(p);
                if relink {
                    tracker.refresh_shadow(&tracked)?;
                    self.stats.shaders_relinked += 1;
                } else {
                    tracker.register_object(&tracked)?;
                    self.stats.shaders_created += 1;
                }
                Ok(())
            }
            Err(e) => {
                p.mark_link_failed();
                drop(p);
                self.stats.shader_failures += 1;
                log::warn!("Shader program failed to build: {}", e);
                if relink {
                    tracker.delete_object(executor, &tracked)?;
                    self.stats.shaders_deleted += 1;
                    if self.bound == old_id {
                        self.bound = DeviceId::INVALID;
                    }
                }
                Err(e)
            }
        }
    }

    /// Forgets the bound program, e.g. after a context reset.
    pub fn reset(&mut self) {
        self.bound = DeviceId::INVALID;
    }
}
