// src/native/tracker.rs
//! Native object tracker.
//!
//! Keeps one entry per registered device resource: a weak handle to the live
//! proxy plus a shadow clone able to delete the device objects once the proxy
//! is gone. Deletion requests arrive on two queues, explicit `dispose()` calls
//! and drop notices, and are drained on the rendering thread by
//! [`ResourceTracker::delete_unused`] under a per-frame budget.

use std::collections::HashMap;

use crossbeam::channel::{unbounded, Receiver, Sender};

use super::object::{
    DeadNotice, DestructableClone, NativeKind, NativeUid, Tracked, TrackerLink, WeakTracked,
};
use crate::config::TrackerConfig;
use crate::device::DeviceExecutor;
use crate::{Error, Result};

// -----------------------------------------------------------------------------
// Statistics
// -----------------------------------------------------------------------------

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackerStats {
    pub registered: u64,
    /// Deleted after an explicit `dispose()`.
    pub deleted_disposed: u64,
    /// Deleted after the proxy was dropped.
    pub deleted_unreachable: u64,
    /// Deleted through `delete_object` or at shutdown.
    pub deleted_immediate: u64,
    /// Entries dropped without a device call because their identity did not match.
    pub quarantined: u64,
    pub reset_sweeps: u64,
}

// -----------------------------------------------------------------------------
// Tracker
// -----------------------------------------------------------------------------

struct TrackingEntry {
    real: WeakTracked,
    shadow: DestructableClone,
}

pub struct ResourceTracker {
    config: TrackerConfig,
    registry: HashMap<NativeUid, TrackingEntry>,
    /// Shadows whose registry slot was taken over by a re-registration.
    orphans: Vec<DestructableClone>,
    user_tx: Sender<NativeUid>,
    user_rx: Receiver<NativeUid>,
    dead_tx: Sender<DeadNotice>,
    dead_rx: Receiver<DeadNotice>,
    stats: TrackerStats,
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

impl ResourceTracker {
    /// A zero `max_removes_per_frame` is raised to 1.
    pub fn new(mut config: TrackerConfig) -> Self {
        if config.max_removes_per_frame == 0 {
            log::warn!("max_removes_per_frame is 0; using 1");
            config.max_removes_per_frame = 1;
        }
        let (user_tx, user_rx) = unbounded();
        let (dead_tx, dead_rx) = unbounded();
        Self {
            config,
            registry: HashMap::new(),
            orphans: Vec::new(),
            user_tx,
            user_rx,
            dead_tx,
            dead_rx,
            stats: TrackerStats::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[inline]
    pub fn stats(&self) -> TrackerStats {
        self.stats
    }

    /// Number of registered resources not yet deleted.
    #[inline]
    pub fn live_count(&self) -> usize {
        self.registry.len()
    }

    #[inline]
    pub fn is_tracked(&self, uid: NativeUid) -> bool {
        self.registry.contains_key(&uid)
    }

    /// Queued dispose requests, drop notices and replaced shadows. Stale
    /// notices for entries already gone are counted too, though draining them
    /// deletes nothing.
    pub fn pending(&self) -> usize {
        self.user_rx.len() + self.dead_rx.len() + self.orphans.len()
    }

    // ---------- Registration ----------

    /// Starts tracking an object that just received its device id.
    pub fn register_object(&mut self, obj: &Tracked) -> Result<()> {
        let link = TrackerLink {
            user_tx: self.user_tx.clone(),
            dead_tx: self.dead_tx.clone(),
        };
        let (uid, shadow) = obj.with_native(|o| {
            let uid = o.native().uid();
            let id = o.id();
            if !id.is_valid() {
                return Err(Error::invalid_state(format!(
                    "cannot register {} {} before it has a device id",
                    o.kind().label(),
                    uid
                )));
            }
            if let Some(entry) = self.registry.get(&uid) {
                if entry.shadow.id == id {
                    return Err(Error::invalid_state(format!(
                        "{} {} is already registered with id {}",
                        o.kind().label(),
                        uid,
                        id
                    )));
                }
            }
            o.native_mut().attach(link);
            Ok((uid, o.create_destructable_clone()))
        })?;

        let entry = TrackingEntry {
            real: obj.downgrade(),
            shadow,
        };
        if let Some(stale) = self.registry.insert(uid, entry) {
            log::warn!(
                "{} {} re-registered; device id {} was never deleted and is queued for removal",
                stale.shadow.kind.label(),
                uid,
                stale.shadow.id
            );
            self.orphans.push(stale.shadow);
        }
        self.stats.registered += 1;
        log::trace!("Registered {:?}", obj);
        Ok(())
    }

    /// Re-captures the shadow after a relink changed the set of stage ids.
    pub fn refresh_shadow(&mut self, obj: &Tracked) -> Result<()> {
        let (uid, id, shadow) =
            obj.with_native(|o| (o.native().uid(), o.id(), o.create_destructable_clone()));
        let entry = self.registry.get_mut(&uid).ok_or(Error::NotRegistered(uid))?;
        if entry.shadow.id != id {
            return Err(Error::IdentityMismatch {
                uid,
                expected: entry.shadow.id,
                found: id,
            });
        }
        entry.shadow = shadow;
        Ok(())
    }

    /// Same path as `dispose()` on the object itself.
    pub fn enqueue_unused_object(&self, obj: &Tracked) -> bool {
        let uid = obj.with_native(|o| o.native().uid());
        self.user_tx.send(uid).is_ok()
    }

    // ---------- Reconciliation ----------

    /// Deletes at most `max_removes_per_frame` resources: replaced shadows
    /// first, then disposed objects, then dropped objects. Requests past the
    /// budget stay queued.
    ///
    /// A faulty entry is dropped without touching the device and the pass keeps
    /// going; all faults are returned together as `Error::Reconciliation`.
    #[tracing::instrument(skip_all, fields(budget = self.config.max_removes_per_frame))]
    pub fn delete_unused(&mut self, executor: &mut dyn DeviceExecutor) -> Result<usize> {
        let budget = self.config.max_removes_per_frame;
        let mut removed = 0usize;
        let mut faults = Vec::new();

        while removed < budget {
            let Some(shadow) = self.orphans.pop() else {
                break;
            };
            shadow.delete(executor);
            self.stats.deleted_immediate += 1;
            removed += 1;
        }

        while removed < budget {
            let Ok(uid) = self.user_rx.try_recv() else {
                break;
            };
            match self.delete_disposed(executor, uid) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    removed += 1;
                    faults.push(e);
                }
            }
        }

        while removed < budget {
            let Ok(notice) = self.dead_rx.try_recv() else {
                break;
            };
            match self.delete_unreachable(executor, notice) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => {
                    removed += 1;
                    faults.push(e);
                }
            }
        }

        if removed > 0 {
            log::debug!("{} native objects were removed from the device", removed);
        }
        if faults.is_empty() {
            Ok(removed)
        } else {
            log::error!("{} tracker entries failed reconciliation", faults.len());
            Err(Error::Reconciliation(faults))
        }
    }

    /// Returns false when nothing was deleted because the entry is already gone.
    fn delete_disposed(&mut self, executor: &mut dyn DeviceExecutor, uid: NativeUid) -> Result<bool> {
        let Some(entry) = self.registry.remove(&uid) else {
            log::warn!("Object {} disposed more than once or already deleted", uid);
            return Ok(false);
        };
        match entry.real.upgrade() {
            Some(real) => self.delete_live(executor, &real, entry.shadow)?,
            None => entry.shadow.delete(executor),
        }
        self.stats.deleted_disposed += 1;
        Ok(true)
    }

    fn delete_unreachable(
        &mut self,
        executor: &mut dyn DeviceExecutor,
        notice: DeadNotice,
    ) -> Result<bool> {
        let Some(entry) = self.registry.remove(&notice.uid) else {
            log::debug!("Skipping stale drop notice for {}", notice.uid);
            return Ok(false);
        };
        // An invalid id means the proxy was reset without deleting its device
        // objects, which the shadow still names.
        if notice.id.is_valid() && notice.id != entry.shadow.id {
            self.stats.quarantined += 1;
            return Err(Error::IdentityMismatch {
                uid: notice.uid,
                expected: entry.shadow.id,
                found: notice.id,
            });
        }
        entry.shadow.delete(executor);
        self.stats.deleted_unreachable += 1;
        Ok(true)
    }

    /// Deletes through the live proxy, then resets and unlinks it.
    fn delete_live(
        &mut self,
        executor: &mut dyn DeviceExecutor,
        real: &Tracked,
        shadow: DestructableClone,
    ) -> Result<()> {
        let reclaim = self.config.unsafe_buffer_reclaim;
        let outcome = real.with_native(|o| {
            let found = o.id();
            if found.is_valid() && found != shadow.id {
                return Err(Error::IdentityMismatch {
                    uid: shadow.uid,
                    expected: shadow.id,
                    found,
                });
            }
            if found.is_valid() {
                o.create_destructable_clone().delete(executor);
            } else {
                shadow.delete(executor);
            }
            if reclaim {
                o.release_native_buffers();
            }
            o.reset_object();
            o.native_mut().detach();
            Ok(())
        });
        if outcome.is_err() {
            self.stats.quarantined += 1;
        }
        outcome
    }

    /// Deletes `obj` right away instead of waiting for a pass.
    pub fn delete_object(&mut self, executor: &mut dyn DeviceExecutor, obj: &Tracked) -> Result<()> {
        let uid = obj.with_native(|o| o.native().uid());
        let entry = self.registry.remove(&uid).ok_or(Error::NotRegistered(uid))?;
        self.delete_live(executor, obj, entry.shadow)?;
        self.stats.deleted_immediate += 1;
        Ok(())
    }

    /// Shutdown: drains both queues without a budget and deletes everything
    /// still registered.
    #[tracing::instrument(skip_all)]
    pub fn delete_all_objects(&mut self, executor: &mut dyn DeviceExecutor) -> Result<usize> {
        let mut removed = 0usize;
        let mut faults = Vec::new();

        for shadow in std::mem::take(&mut self.orphans) {
            shadow.delete(executor);
            removed += 1;
        }
        while let Ok(uid) = self.user_rx.try_recv() {
            match self.delete_disposed(executor, uid) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => faults.push(e),
            }
        }

        let uids: Vec<NativeUid> = self.registry.keys().copied().collect();
        for uid in uids {
            let Some(entry) = self.registry.remove(&uid) else {
                continue;
            };
            let result = match entry.real.upgrade() {
                Some(real) => self.delete_live(executor, &real, entry.shadow),
                None => {
                    entry.shadow.delete(executor);
                    Ok(())
                }
            };
            match result {
                Ok(()) => {
                    self.stats.deleted_immediate += 1;
                    removed += 1;
                }
                Err(e) => faults.push(e),
            }
        }

        // Everything is gone; remaining drop notices are stale.
        while self.dead_rx.try_recv().is_ok() {}

        log::info!("Deleted {} native objects", removed);
        if faults.is_empty() {
            Ok(removed)
        } else {
            Err(Error::Reconciliation(faults))
        }
    }

    /// The device context was lost: every id is meaningless now. Resets each
    /// live proxy and forgets all entries without any device call.
    #[tracing::instrument(skip_all)]
    pub fn reset_objects(&mut self) {
        let count = self.registry.len();
        for (_, entry) in self.registry.drain() {
            if let Some(real) = entry.real.upgrade() {
                real.with_native(|o| {
                    o.reset_object();
                    o.native_mut().detach();
                });
            }
        }
        self.orphans.clear();
        while self.user_rx.try_recv().is_ok() {}
        while self.dead_rx.try_recv().is_ok() {}
        self.stats.reset_sweeps += 1;
        log::info!("Reset {} native objects after context loss", count);
    }

    /// Kinds currently registered, for diagnostics.
    pub fn live_by_kind(&self) -> HashMap<NativeKind, usize> {
        let mut out = HashMap::new();
        for entry in self.registry.values() {
            *out.entry(entry.shadow.kind).or_insert(0) += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceCall, DeviceExecutor, RecordingExecutor};
    use crate::native::{DeviceId, NativeObject, SharedProgram};
    use crate::shader::{ShaderProgram, ShaderStage, StageKind, UniformData, UniformValue};
    use std::sync::Arc;

    fn linked_program(ex: &mut RecordingExecutor) -> SharedProgram {
        let mut p = ShaderProgram::new("GLSL330");
        p.add_source(StageKind::Vertex, "a.vert", "uniform float m_A;\nvoid main(){}", "");
        p.add_source(StageKind::Fragment, "a.frag", "void main(){}", "");
        let linked = ex.compile_and_link(&p).unwrap();
        p.apply_link(linked).unwrap();
        p.into_shared()
    }

    fn tracker(budget: usize) -> ResourceTracker {
        ResourceTracker::new(TrackerConfig {
            max_removes_per_frame: budget,
            ..Default::default()
        })
    }

    fn deleted_programs(ex: &RecordingExecutor) -> Vec<DeviceId> {
        ex.calls()
            .iter()
            .filter_map(|c| match c {
                DeviceCall::DeleteShaderProgram(id) => Some(*id),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn dispose_deletes_once_and_resets() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let p = linked_program(&mut ex);
        let id = p.lock().id();
        t.register_object(&Tracked::from(&p)).unwrap();
        ex.clear_calls();

        assert!(p.lock().dispose());
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 1);
        assert_eq!(deleted_programs(&ex), vec![id]);
        assert_eq!(ex.calls().len(), 3);
        assert!(!p.lock().id().is_valid());
        assert!(!p.lock().is_usable());

        assert_eq!(t.delete_unused(&mut ex).unwrap(), 0);
        assert_eq!(ex.calls().len(), 3);
        assert_eq!(t.stats().deleted_disposed, 1);

        drop(p);
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 0);
        assert_eq!(ex.calls().len(), 3);
    }

    #[test]
    fn dropped_program_is_deleted_through_shadow() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let p = linked_program(&mut ex);
        let (id, stages) = {
            let g = p.lock();
            (g.id(), g.stages().iter().map(|s| s.id()).collect::<Vec<_>>())
        };
        t.register_object(&Tracked::from(&p)).unwrap();
        ex.clear_calls();

        drop(p);
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 1);
        assert_eq!(
            ex.calls(),
            &[
                DeviceCall::DeleteShaderStage(stages[0]),
                DeviceCall::DeleteShaderStage(stages[1]),
                DeviceCall::DeleteShaderProgram(id),
            ]
        );
        assert_eq!(t.live_count(), 0);
        assert_eq!(t.stats().deleted_unreachable, 1);
    }

    #[test]
    fn dispose_then_drop_deletes_once() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let p = linked_program(&mut ex);
        t.register_object(&Tracked::from(&p)).unwrap();
        p.lock().dispose();
        drop(p);
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 1);
        assert_eq!(deleted_programs(&ex).len(), 1);
    }

    #[test]
    fn budget_caps_each_pass() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(3);
        let programs: Vec<_> = (0..5).map(|_| linked_program(&mut ex)).collect();
        for p in &programs {
            t.register_object(&Tracked::from(p)).unwrap();
        }
        for p in &programs {
            p.lock().dispose();
        }
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 3);
        assert_eq!(t.live_count(), 2);
        assert_eq!(t.pending(), 2);
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 2);
        assert_eq!(t.live_count(), 0);
        assert_eq!(deleted_programs(&ex).len(), 5);
    }

    #[test]
    fn dispose_with_known_id() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let mut p = ShaderProgram::new("GLSL330");
        p.native_mut().set_id(DeviceId::new(7)).unwrap();
        let p = p.into_shared();
        t.register_object(&Tracked::from(&p)).unwrap();
        p.lock().dispose();
        t.delete_unused(&mut ex).unwrap();
        assert_eq!(ex.calls(), &[DeviceCall::DeleteShaderProgram(DeviceId::new(7))]);
        t.delete_unused(&mut ex).unwrap();
        assert_eq!(ex.calls().len(), 1);
    }

    #[test]
    fn budget_spans_both_queues() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(3);
        let disposed: Vec<_> = (0..2).map(|_| linked_program(&mut ex)).collect();
        let dropped: Vec<_> = (0..3).map(|_| linked_program(&mut ex)).collect();
        for p in disposed.iter().chain(&dropped) {
            t.register_object(&Tracked::from(p)).unwrap();
        }
        for p in &disposed {
            p.lock().dispose();
        }
        drop(dropped);

        assert_eq!(t.delete_unused(&mut ex).unwrap(), 3);
        assert_eq!(t.stats().deleted_disposed, 2);
        assert_eq!(t.stats().deleted_unreachable, 1);
        assert_eq!(t.pending(), 2);
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 2);
        assert_eq!(t.live_count(), 0);
    }

    #[test]
    fn drop_from_another_thread_is_seen() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let p = linked_program(&mut ex);
        t.register_object(&Tracked::from(&p)).unwrap();
        std::thread::spawn(move || drop(p)).join().unwrap();
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 1);
    }

    #[test]
    fn registration_requires_id_and_rejects_duplicates() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let fresh = ShaderProgram::new("GLSL330").into_shared();
        assert!(t.register_object(&Tracked::from(&fresh)).unwrap_err().is_lifecycle_fault());

        let p = linked_program(&mut ex);
        t.register_object(&Tracked::from(&p)).unwrap();
        assert!(t.register_object(&Tracked::from(&p)).unwrap_err().is_lifecycle_fault());
        assert_eq!(t.live_count(), 1);
    }

    #[test]
    fn reset_objects_forgets_everything_without_device_calls() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let a = linked_program(&mut ex);
        let b = linked_program(&mut ex);
        t.register_object(&Tracked::from(&a)).unwrap();
        t.register_object(&Tracked::from(&b)).unwrap();
        a.lock().get_uniform("m_A").set_value(UniformValue::Float(1.0)).unwrap();
        b.lock().dispose();
        ex.clear_calls();

        t.reset_objects();
        assert!(ex.calls().is_empty());
        assert_eq!(t.live_count(), 0);
        assert!(!a.lock().id().is_valid());
        assert!(a.lock().is_update_needed());

        drop(b);
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 0);
        assert!(ex.calls().is_empty());

        // Re-upload after the context comes back.
        let linked = ex.compile_and_link(&a.lock()).unwrap();
        a.lock().apply_link(linked).unwrap();
        t.register_object(&Tracked::from(&a)).unwrap();
        assert_eq!(t.live_count(), 1);
        assert_eq!(t.stats().reset_sweeps, 1);
    }

    #[test]
    fn identity_mismatch_is_isolated() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let bad = linked_program(&mut ex);
        let good = linked_program(&mut ex);
        t.register_object(&Tracked::from(&bad)).unwrap();
        t.register_object(&Tracked::from(&good)).unwrap();
        let good_id = good.lock().id();

        // Swap the id behind the tracker's back.
        {
            let mut g = bad.lock();
            g.native_mut().reset();
            g.native_mut().set_id(DeviceId::new(999)).unwrap();
        }
        bad.lock().dispose();
        good.lock().dispose();
        ex.clear_calls();

        let err = t.delete_unused(&mut ex).unwrap_err();
        assert_eq!(err.faults().len(), 1);
        assert!(matches!(err.faults()[0], Error::IdentityMismatch { .. }));
        assert_eq!(deleted_programs(&ex), vec![good_id]);
        assert!(!deleted_programs(&ex).contains(&DeviceId::new(999)));
        assert_eq!(t.live_count(), 0);
        assert_eq!(t.stats().quarantined, 1);
    }

    #[test]
    fn delete_all_objects_ignores_budget() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(1);
        let kept: Vec<_> = (0..3).map(|_| linked_program(&mut ex)).collect();
        for p in &kept {
            t.register_object(&Tracked::from(p)).unwrap();
        }
        let dropped = linked_program(&mut ex);
        t.register_object(&Tracked::from(&dropped)).unwrap();
        drop(dropped);

        assert_eq!(t.delete_all_objects(&mut ex).unwrap(), 4);
        assert_eq!(t.live_count(), 0);
        assert_eq!(deleted_programs(&ex).len(), 4);
        assert!(kept.iter().all(|p| !p.lock().id().is_valid()));
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 0);
    }

    #[test]
    fn delete_object_is_immediate() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let p = linked_program(&mut ex);
        let tracked = Tracked::from(&p);
        t.register_object(&tracked).unwrap();
        t.delete_object(&mut ex, &tracked).unwrap();
        assert_eq!(deleted_programs(&ex).len(), 1);
        assert!(matches!(
            t.delete_object(&mut ex, &tracked),
            Err(Error::NotRegistered(_))
        ));
    }

    #[test]
    fn standalone_stage_tracking() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let mut stage = ShaderStage::new(StageKind::Vertex, "s.vert", "GLSL330");
        stage.native_mut().set_id(DeviceId::new(77)).unwrap();
        let shared = Arc::new(parking_lot::Mutex::new(stage));
        t.register_object(&Tracked::from(&shared)).unwrap();
        assert_eq!(t.live_by_kind().get(&NativeKind::ShaderStage), Some(&1));
        drop(shared);
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 1);
        assert_eq!(ex.calls(), &[DeviceCall::DeleteShaderStage(DeviceId::new(77))]);
    }

    #[test]
    fn reset_then_reregister_queues_old_id() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let p = linked_program(&mut ex);
        let old = p.lock().id();
        t.register_object(&Tracked::from(&p)).unwrap();
        p.lock().reset_object();
        let linked = ex.compile_and_link(&p.lock()).unwrap();
        p.lock().apply_link(linked).unwrap();
        t.register_object(&Tracked::from(&p)).unwrap();
        ex.clear_calls();

        assert_eq!(t.delete_unused(&mut ex).unwrap(), 1);
        assert_eq!(deleted_programs(&ex), vec![old]);
        assert_eq!(t.live_count(), 1);
    }

    fn dispose_with_array_uniform(reclaim: bool) -> Option<Vec<f32>> {
        let mut ex = RecordingExecutor::new();
        let mut t = ResourceTracker::new(TrackerConfig {
            unsafe_buffer_reclaim: reclaim,
            ..Default::default()
        });
        let p = linked_program(&mut ex);
        p.lock()
            .get_uniform("m_W")
            .set_value(UniformValue::FloatArray(&[1.0, 2.0]))
            .unwrap();
        t.register_object(&Tracked::from(&p)).unwrap();
        p.lock().dispose();
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 1);
        let g = p.lock();
        let values = match g.uniform("m_W").unwrap().data() {
            Some(UniformData::Floats(f)) => Some(f.to_vec()),
            _ => None,
        };
        drop(g);
        values
    }

    #[test]
    fn buffer_reclaim_is_opt_in() {
        assert_eq!(dispose_with_array_uniform(false), Some(vec![1.0, 2.0]));
        assert_eq!(dispose_with_array_uniform(true), None);
    }

    #[test]
    fn zero_budget_still_reclaims() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(0);
        assert_eq!(t.config().max_removes_per_frame, 1);
        let programs: Vec<_> = (0..2).map(|_| linked_program(&mut ex)).collect();
        for p in &programs {
            t.register_object(&Tracked::from(p)).unwrap();
        }
        drop(programs);
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 1);
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 1);
        assert_eq!(t.live_count(), 0);
        assert_eq!(ex.live_objects(), 0);
    }

    #[test]
    fn reset_skips_dropped_but_unswept_handles() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let kept = linked_program(&mut ex);
        let dropped = linked_program(&mut ex);
        t.register_object(&Tracked::from(&kept)).unwrap();
        t.register_object(&Tracked::from(&dropped)).unwrap();
        drop(dropped);
        ex.clear_calls();

        t.reset_objects();
        assert!(ex.calls().is_empty());
        assert_eq!(t.live_count(), 0);
        assert!(!kept.lock().id().is_valid());
        assert_eq!(t.delete_unused(&mut ex).unwrap(), 0);
        assert!(ex.calls().is_empty());
    }

    #[test]
    fn identity_mismatch_on_drop_is_isolated() {
        let mut ex = RecordingExecutor::new();
        let mut t = tracker(100);
        let bad = linked_program(&mut ex);
        let good = linked_program(&mut ex);
        t.register_object(&Tracked::from(&bad)).unwrap();
        t.register_object(&Tracked::from(&good)).unwrap();
        let good_id = good.lock().id();
        {
            let mut g = bad.lock();
            g.native_mut().reset();
            g.native_mut().set_id(DeviceId::new(999)).unwrap();
        }
        ex.clear_calls();

        drop(bad);
        drop(good);
        let err = t.delete_unused(&mut ex).unwrap_err();
        assert_eq!(err.faults().len(), 1);
        assert!(matches!(
            err.faults()[0],
            Error::IdentityMismatch { found, .. } if found == DeviceId::new(999)
        ));
        assert_eq!(deleted_programs(&ex), vec![good_id]);
        assert_eq!(t.live_count(), 0);
        assert_eq!(t.stats().quarantined, 1);
        assert_eq!(t.stats().deleted_unreachable, 1);
    }
}
