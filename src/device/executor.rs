// src/device/executor.rs
//! The seam between CPU-side state and the graphics device.
//!
//! Everything that touches the device goes through [`DeviceExecutor`] and runs
//! on the thread that owns the context. [`RecordingExecutor`] is a headless
//! implementation that logs every call; the demo binary and the tests run on it.

use std::collections::{HashMap, HashSet};

use crate::native::{DeviceId, NativeObject};
use crate::shader::{ShaderProgram, StageKind, UniformData};
use crate::{Error, Result};

/// Ids handed back by a successful compile/link, stage ids in `stages()` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedProgram {
    pub program: DeviceId,
    pub stages: Vec<DeviceId>,
}

pub trait DeviceExecutor {
    /// Compiles every stage and links the program. Stages and programs that
    /// already have an id keep it.
    fn compile_and_link(&mut self, program: &ShaderProgram) -> Result<LinkedProgram>;

    fn delete_shader_stage(&mut self, id: DeviceId);
    fn delete_shader_program(&mut self, id: DeviceId);

    fn use_program(&mut self, id: DeviceId);
    fn bind_uniform(&mut self, location: u32, data: UniformData<'_>);

    /// Negative when the linked program does not declare `name`.
    fn query_uniform_location(&mut self, program: DeviceId, name: &str) -> i32;
    fn query_attribute_location(&mut self, program: DeviceId, name: &str) -> i32;
}

// ---------- Recording executor ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    CompileAndLink { program: DeviceId, stages: Vec<DeviceId> },
    DeleteShaderStage(DeviceId),
    DeleteShaderProgram(DeviceId),
    UseProgram(DeviceId),
    BindUniform { location: u32, bytes: Vec<u8> },
    QueryUniform { program: DeviceId, name: String },
    QueryAttribute { program: DeviceId, name: String },
}

#[derive(Debug, Default)]
struct LinkedInfo {
    uniforms: HashMap<String, i32>,
    attributes: HashMap<String, i32>,
}

/// Headless device. Ids count up from 1 and are never reused. Locations come
/// from the `uniform` and vertex `in`/`attribute` declarations in the composed
/// source; a stage containing `#error` fails to compile.
#[derive(Debug)]
pub struct RecordingExecutor {
    next_id: u32,
    calls: Vec<DeviceCall>,
    linked: HashMap<DeviceId, LinkedInfo>,
    live: HashSet<DeviceId>,
    fail_next_link: Option<String>,
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            calls: Vec::new(),
            linked: HashMap::new(),
            live: HashSet::new(),
            fail_next_link: None,
        }
    }

    #[inline]
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn take_calls(&mut self) -> Vec<DeviceCall> {
        std::mem::take(&mut self.calls)
    }

    /// Device objects created and not yet deleted.
    #[inline]
    pub fn live_objects(&self) -> usize {
        self.live.len()
    }

    /// Makes the next `compile_and_link` fail at link time with `log`.
    pub fn fail_next_link(&mut self, log: impl Into<String>) {
        self.fail_next_link = Some(log.into());
    }

    fn alloc(&mut self) -> DeviceId {
        let id = DeviceId::new(self.next_id);
        self.next_id += 1;
        self.live.insert(id);
        id
    }

    fn reuse_or_alloc(&mut self, id: DeviceId) -> DeviceId {
        if id.is_valid() {
            id
        } else {
            self.alloc()
        }
    }
}

/// Name declared by a `<qualifier> <type> <name>[N];` line.
fn declared_name(line: &str, qualifiers: &[&str]) -> Option<String> {
    let mut tokens = line.split_whitespace();
    let first = tokens.next()?;
    if !qualifiers.contains(&first) {
        return None;
    }
    let last = tokens.last()?;
    let name = last.trim_end_matches(';');
    let name = name.split('[').next().unwrap_or(name);
    (!name.is_empty()).then(|| name.to_owned())
}

impl DeviceExecutor for RecordingExecutor {
    fn compile_and_link(&mut self, program: &ShaderProgram) -> Result<LinkedProgram> {
        if program.stages().is_empty() {
            return Err(Error::Link {
                log: "program has no stages".into(),
            });
        }

        let mut info = LinkedInfo::default();
        for stage in program.stages() {
            let text = stage.compose();
            if text.contains("#error") {
                return Err(Error::Compile {
                    name: stage.name().to_owned(),
                    log: "0(1) : error C0000: #error directive".into(),
                });
            }
            for line in text.lines() {
                if let Some(name) = declared_name(line, &["uniform"]) {
                    let next = info.uniforms.len() as i32;
                    info.uniforms.entry(name).or_insert(next);
                } else if stage.kind() == StageKind::Vertex {
                    if let Some(name) = declared_name(line, &["in", "attribute"]) {
                        let next = info.attributes.len() as i32;
                        info.attributes.entry(name).or_insert(next);
                    }
                }
            }
        }
        if let Some(log) = self.fail_next_link.take() {
            return Err(Error::Link { log });
        }

        let program_id = self.reuse_or_alloc(program.id());
        let stages: Vec<DeviceId> = program
            .stages()
            .iter()
            .map(|s| self.reuse_or_alloc(s.id()))
            .collect();

        self.linked.insert(program_id, info);
        self.calls.push(DeviceCall::CompileAndLink {
            program: program_id,
            stages: stages.clone(),
        });
        Ok(LinkedProgram {
            program: program_id,
            stages,
        })
    }

    fn delete_shader_stage(&mut self, id: DeviceId) {
        self.live.remove(&id);
        self.calls.push(DeviceCall::DeleteShaderStage(id));
    }

    fn delete_shader_program(&mut self, id: DeviceId) {
        self.live.remove(&id);
        self.linked.remove(&id);
        self.calls.push(DeviceCall::DeleteShaderProgram(id));
    }

    fn use_program(&mut self, id: DeviceId) {
        self.calls.push(DeviceCall::UseProgram(id));
    }

    fn bind_uniform(&mut self, location: u32, data: UniformData<'_>) {
        let mut bytes = Vec::new();
        data.append_bytes(&mut bytes);
        self.calls.push(DeviceCall::BindUniform { location, bytes });
    }

    fn query_uniform_location(&mut self, program: DeviceId, name: &str) -> i32 {
        self.calls.push(DeviceCall::QueryUniform {
            program,
            name: name.to_owned(),
        });
        self.linked
            .get(&program)
            .and_then(|info| info.uniforms.get(name).copied())
            .unwrap_or(-1)
    }

    fn query_attribute_location(&mut self, program: DeviceId, name: &str) -> i32 {
        self.calls.push(DeviceCall::QueryAttribute {
            program,
            name: name.to_owned(),
        });
        self.linked
            .get(&program)
            .and_then(|info| info.attributes.get(name).copied())
            .unwrap_or(-1)
    }
}
