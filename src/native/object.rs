// src/native/object.rs
//! CPU-side proxies for device resources.
//!
//! Every proxy embeds a [`NativeState`]: its device id, dirty flag and, once
//! registered, a link back to the [`ResourceTracker`](super::ResourceTracker).
//! Dropping a linked state posts a notice on the tracker's reachability queue;
//! `dispose()` posts on the user-deletion queue. Both queues accept messages
//! from any thread.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crossbeam::channel::Sender;
use parking_lot::Mutex;

use crate::device::DeviceExecutor;
use crate::shader::{ShaderProgram, ShaderStage};
use crate::{Error, Result};

// ---------- Ids ----------

/// Device-side identity of a resource. `0` is never handed out by a device.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct DeviceId(u32);

impl DeviceId {
    pub const INVALID: DeviceId = DeviceId(0);

    #[inline]
    pub const fn new(raw: u32) -> Self {
        DeviceId(raw)
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}", self.0)
        } else {
            f.write_str("INVALID")
        }
    }
}

/// Process-unique identity of a proxy. Unlike device ids these are never reused,
/// not even across context resets.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NativeUid(pub u64);

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

impl NativeUid {
    fn next() -> Self {
        NativeUid(NEXT_UID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for NativeUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ---------- Kinds ----------

/// Closed set of resource kinds the tracker knows how to delete.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[repr(u8)]
pub enum NativeKind {
    ShaderProgram = 0,
    ShaderStage = 1,
}

/// Per-kind operations on shadow clones.
pub(crate) struct KindOps {
    pub label: &'static str,
    pub delete: fn(&mut dyn DeviceExecutor, &DestructableClone),
}

static KIND_OPS: [KindOps; 2] = [
    KindOps {
        label: "shader program",
        delete: delete_program,
    },
    KindOps {
        label: "shader stage",
        delete: delete_stage,
    },
];

impl NativeKind {
    #[inline]
    pub(crate) fn ops(self) -> &'static KindOps {
        &KIND_OPS[self as usize]
    }

    #[inline]
    pub fn label(self) -> &'static str {
        self.ops().label
    }
}

fn delete_program(executor: &mut dyn DeviceExecutor, clone: &DestructableClone) {
    if !clone.id.is_valid() {
        log::warn!("Shader program {} is not uploaded to the device, cannot delete", clone.uid);
        return;
    }
    for stage in &clone.children {
        if stage.id.is_valid() {
            executor.delete_shader_stage(stage.id);
        }
    }
    executor.delete_shader_program(clone.id);
}

fn delete_stage(executor: &mut dyn DeviceExecutor, clone: &DestructableClone) {
    if !clone.id.is_valid() {
        log::warn!("Shader stage {} is not uploaded to the device, cannot delete", clone.uid);
        return;
    }
    executor.delete_shader_stage(clone.id);
}

// ---------- Shadow clones ----------

/// Minimal stand-in for a proxy: just enough identity to delete its device
/// objects after the proxy itself is gone. Sources, defines and uniform values
/// are never carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestructableClone {
    pub kind: NativeKind,
    pub uid: NativeUid,
    pub id: DeviceId,
    /// Owned sub-resources deleted together with this one (a program's stages).
    pub children: Vec<DestructableClone>,
}

impl DestructableClone {
    #[inline]
    pub fn delete(&self, executor: &mut dyn DeviceExecutor) {
        (self.kind.ops().delete)(executor, self)
    }
}

// ---------- Tracker link ----------

/// Posted when a linked proxy is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeadNotice {
    pub uid: NativeUid,
    pub id: DeviceId,
}

#[derive(Debug, Clone)]
pub(crate) struct TrackerLink {
    pub user_tx: Sender<NativeUid>,
    pub dead_tx: Sender<DeadNotice>,
}

// ---------- Native state ----------

/// Identity and dirty flag of one device resource.
#[derive(Debug)]
pub struct NativeState {
    uid: NativeUid,
    id: DeviceId,
    update_needed: bool,
    link: Option<TrackerLink>,
}

impl Default for NativeState {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeState {
    pub fn new() -> Self {
        Self {
            uid: NativeUid::next(),
            id: DeviceId::INVALID,
            update_needed: true,
            link: None,
        }
    }

    #[inline]
    pub fn uid(&self) -> NativeUid {
        self.uid
    }

    #[inline]
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// Assigns the device id. Overwriting a live id is an error.
    pub fn set_id(&mut self, id: DeviceId) -> Result<()> {
        if !id.is_valid() {
            return Err(Error::invalid_state(format!(
                "object {} cannot be given the INVALID device id",
                self.uid
            )));
        }
        if self.id.is_valid() {
            return Err(Error::invalid_state(format!(
                "object {} already owns device id {}, refusing {}",
                self.uid, self.id, id
            )));
        }
        self.id = id;
        Ok(())
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

    /// Forgets the device id and marks the state dirty. The tracker link is kept
    /// so a later drop or dispose still reaches the tracker.
    pub fn reset(&mut self) {
        self.id = DeviceId::INVALID;
        self.update_needed = true;
    }

    #[inline]
    pub fn is_tracked(&self) -> bool {
        self.link.is_some()
    }

    /// Asks the tracker to delete this resource on its next pass. Returns false
    /// when the object was never registered.
    pub fn dispose(&self) -> bool {
        match &self.link {
            Some(link) => link.user_tx.send(self.uid).is_ok(),
            None => {
                log::debug!("dispose() on untracked object {}", self.uid);
                false
            }
        }
    }

    pub(crate) fn attach(&mut self, link: TrackerLink) {
        self.link = Some(link);
    }

    pub(crate) fn detach(&mut self) {
        self.link = None;
    }
}

impl Drop for NativeState {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            // The tracker may already be gone; nothing left to notify then.
            let _ = link.dead_tx.send(DeadNotice {
                uid: self.uid,
                id: self.id,
            });
        }
    }
}

// ---------- Proxy trait ----------

/// Behaviour shared by every CPU-side proxy of a device resource.
pub trait NativeObject: Send {
    fn native(&self) -> &NativeState;
    fn native_mut(&mut self) -> &mut NativeState;
    fn kind(&self) -> NativeKind;

    /// Drops all device-side state: id cleared, marked dirty and unusable.
    fn reset_object(&mut self);

    fn create_destructable_clone(&self) -> DestructableClone;

    /// Frees CPU-side buffers that only mirror device data.
    fn release_native_buffers(&mut self) {}

    #[inline]
    fn id(&self) -> DeviceId {
        self.native().id()
    }

    #[inline]
    fn dispose(&self) -> bool {
        self.native().dispose()
    }
}

// ---------- Tracked handles ----------

pub type SharedProgram = Arc<Mutex<ShaderProgram>>;
pub type SharedStage = Arc<Mutex<ShaderStage>>;

/// A strong handle to anything the tracker can register.
#[derive(Clone)]
pub enum Tracked {
    Program(SharedProgram),
    Stage(SharedStage),
}

impl Tracked {
    pub fn kind(&self) -> NativeKind {
        match self {
            Tracked::Program(_) => NativeKind::ShaderProgram,
            Tracked::Stage(_) => NativeKind::ShaderStage,
        }
    }

    /// Runs `f` with the proxy locked.
    pub fn with_native<R>(&self, f: impl FnOnce(&mut dyn NativeObject) -> R) -> R {
        match self {
            Tracked::Program(p) => f(&mut *p.lock()),
            Tracked::Stage(s) => f(&mut *s.lock()),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakTracked {
        match self {
            Tracked::Program(p) => WeakTracked::Program(Arc::downgrade(p)),
            Tracked::Stage(s) => WeakTracked::Stage(Arc::downgrade(s)),
        }
    }
}

impl From<&SharedProgram> for Tracked {
    fn from(p: &SharedProgram) -> Self {
        Tracked::Program(p.clone())
    }
}

impl From<&SharedStage> for Tracked {
    fn from(s: &SharedStage) -> Self {
        Tracked::Stage(s.clone())
    }
}

impl fmt::Debug for Tracked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (uid, id) = self.with_native(|o| (o.native().uid(), o.id()));
        write!(f, "Tracked({} {} id={})", self.kind().label(), uid, id)
    }
}

/// Non-owning counterpart held in the tracker's registry.
#[derive(Debug, Clone)]
pub(crate) enum WeakTracked {
    Program(Weak<Mutex<ShaderProgram>>),
    Stage(Weak<Mutex<ShaderStage>>),
}

impl WeakTracked {
    pub fn upgrade(&self) -> Option<Tracked> {
        match self {
            WeakTracked::Program(p) => p.upgrade().map(Tracked::Program),
            WeakTracked::Stage(s) => s.upgrade().map(Tracked::Stage),
        }
    }
}
