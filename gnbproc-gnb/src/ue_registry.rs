//! UE Registry
//!
//! Fixed-capacity table of UE entries indexed by a small integer UE index, with an
//! RNTI reverse index. Every entry owns the UE's [`ControlLoop`].
//!
//! The registry is an internal structural index. Out-of-range indexes, the
//! reserved RNTI and erasing a UE whose loop still has work are caller bugs and
//! trigger a panic; user-facing identifiers must be validated before they get
//! here.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gnbproc_common::{CuCpUeIndex, DuUeIndex, Rnti};
use tracing::{debug, error, info, warn};

use crate::ctrl_loop::{ControlLoop, LoopState};

/// Integer UE index usable as a registry key.
pub trait UeIndexType: Copy + Eq + fmt::Display + fmt::Debug + Send + 'static {
    /// Table position of this index.
    fn as_usize(self) -> usize;
}

impl UeIndexType for DuUeIndex {
    fn as_usize(self) -> usize {
        DuUeIndex::as_usize(self)
    }
}

impl UeIndexType for CuCpUeIndex {
    fn as_usize(self) -> usize {
        CuCpUeIndex::as_usize(self)
    }
}

/// A registered UE: its context and its private control loop.
#[derive(Debug)]
pub struct UeElement<C> {
    /// C-RNTI the UE was registered with
    pub rnti: Rnti,
    /// Component-specific UE state
    pub ctx: C,
    /// Sequential procedure queue of this UE
    pub ctrl_loop: ControlLoop,
}

/// Sparse UE table with RNTI reverse lookup.
pub struct UeRegistry<I, C> {
    name: &'static str,
    ues: Vec<Option<UeElement<C>>>,
    rnti_to_ue_index: HashMap<Rnti, I>,
    nof_ues: usize,
    loop_capacity: usize,
}

impl<I: UeIndexType, C> UeRegistry<I, C> {
    /// Creates an empty registry for `capacity` UEs whose loops accept
    /// `loop_capacity` pending tasks each.
    pub fn new(name: &'static str, capacity: usize, loop_capacity: usize) -> Self {
        assert!(capacity > 0, "{name}: UE registry capacity must be non-zero");
        Self {
            name,
            ues: (0..capacity).map(|_| None).collect(),
            rnti_to_ue_index: HashMap::with_capacity(capacity),
            nof_ues: 0,
            loop_capacity,
        }
    }

    /// Registry name used in logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Maximum number of UEs.
    pub fn capacity(&self) -> usize {
        self.ues.len()
    }

    /// Number of registered UEs.
    pub fn len(&self) -> usize {
        self.nof_ues
    }

    /// Returns true if no UE is registered.
    pub fn is_empty(&self) -> bool {
        self.nof_ues == 0
    }

    /// Registers a UE and spawns its control loop.
    ///
    /// Returns `None` without touching the table if `rnti` already maps to a
    /// live UE or if `ue_index` is occupied.
    pub fn add(&mut self, ue_index: I, rnti: Rnti, ctx: C) -> Option<&mut UeElement<C>> {
        assert!(rnti.is_valid(), "{}: invalid RNTI", self.name);
        self.check_index(ue_index);

        if self.rnti_to_ue_index.contains_key(&rnti) || self.ues[ue_index.as_usize()].is_some() {
            return None;
        }

        let ctrl_loop = ControlLoop::new(format!("{} {}", self.name, ue_index), self.loop_capacity);
        self.rnti_to_ue_index.insert(rnti, ue_index);
        self.nof_ues += 1;
        Some(self.ues[ue_index.as_usize()].insert(UeElement { rnti, ctx, ctrl_loop }))
    }

    /// Returns true if `ue_index` is registered.
    pub fn contains(&self, ue_index: I) -> bool {
        self.find(ue_index).is_some()
    }

    /// Looks up a UE by index.
    pub fn find(&self, ue_index: I) -> Option<&UeElement<C>> {
        self.check_index(ue_index);
        self.ues[ue_index.as_usize()].as_ref()
    }

    /// Looks up a UE by index for mutation.
    pub fn find_mut(&mut self, ue_index: I) -> Option<&mut UeElement<C>> {
        self.check_index(ue_index);
        self.ues[ue_index.as_usize()].as_mut()
    }

    /// Resolves a C-RNTI to the index of the live UE holding it.
    pub fn ue_index_of(&self, rnti: Rnti) -> Option<I> {
        assert!(rnti.is_valid(), "{}: invalid RNTI", self.name);
        self.rnti_to_ue_index
            .get(&rnti)
            .copied()
            .filter(|&ue_index| self.contains(ue_index))
    }

    /// Looks up a UE by C-RNTI.
    pub fn find_by_rnti(&self, rnti: Rnti) -> Option<&UeElement<C>> {
        self.ue_index_of(rnti).and_then(|ue_index| self.find(ue_index))
    }

    /// Returns true if `ue_index` is live and `rnti` is free or already its own.
    pub fn can_update_rnti(&self, ue_index: I, rnti: Rnti) -> bool {
        assert!(rnti.is_valid(), "{}: invalid RNTI", self.name);
        self.contains(ue_index)
            && self
                .rnti_to_ue_index
                .get(&rnti)
                .map_or(true, |&owner| owner == ue_index)
    }

    /// Moves a live UE to a new C-RNTI.
    ///
    /// Returns false, leaving the table untouched, if the UE does not exist or
    /// the new RNTI belongs to another UE.
    pub fn update_rnti(&mut self, ue_index: I, new_rnti: Rnti) -> bool {
        if !self.can_update_rnti(ue_index, new_rnti) {
            return false;
        }
        let Some(old_rnti) = self.find(ue_index).map(|ue| ue.rnti) else {
            return false;
        };
        if old_rnti == new_rnti {
            return true;
        }

        self.rnti_to_ue_index.remove(&old_rnti);
        self.rnti_to_ue_index.insert(new_rnti, ue_index);
        if let Some(ue) = self.ues[ue_index.as_usize()].as_mut() {
            ue.rnti = new_rnti;
        }
        true
    }

    /// Removes a UE, returning its context.
    ///
    /// # Panics
    ///
    /// Panics if the UE's control loop still has queued or executing tasks.
    pub fn erase(&mut self, ue_index: I) -> Option<C> {
        self.check_index(ue_index);
        let ue = self.ues[ue_index.as_usize()].as_ref()?;
        assert!(
            ue.ctrl_loop.is_drained(),
            "{}: {} erased with {} pending tasks",
            self.name,
            ue_index,
            ue.ctrl_loop.nof_pending_tasks()
        );

        let ue = self.ues[ue_index.as_usize()].take()?;
        if self.rnti_to_ue_index.get(&ue.rnti) == Some(&ue_index) {
            self.rnti_to_ue_index.remove(&ue.rnti);
        }
        self.nof_ues -= 1;
        Some(ue.ctx)
    }

    fn check_index(&self, ue_index: I) {
        assert!(
            ue_index.as_usize() < self.ues.len(),
            "{}: invalid {} (capacity {})",
            self.name,
            ue_index,
            self.ues.len()
        );
    }
}

impl<I: UeIndexType, C> fmt::Debug for UeRegistry<I, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UeRegistry")
            .field("name", &self.name)
            .field("capacity", &self.capacity())
            .field("nof_ues", &self.nof_ues)
            .finish()
    }
}

/// A [`UeRegistry`] shared between a component and the tasks it schedules.
///
/// The lock is only taken for short synchronous sections and never held
/// across an await point.
pub struct SharedUeRegistry<I, C> {
    inner: Arc<Mutex<UeRegistry<I, C>>>,
}

impl<I, C> Clone for SharedUeRegistry<I, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<I: UeIndexType, C: Send + 'static> SharedUeRegistry<I, C> {
    /// Creates an empty shared registry.
    pub fn new(name: &'static str, capacity: usize, loop_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(UeRegistry::new(name, capacity, loop_capacity))),
        }
    }

    /// Locks the registry.
    pub fn lock(&self) -> MutexGuard<'_, UeRegistry<I, C>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Schedules the structural removal of a UE on `main_loop`.
    ///
    /// The UE's loop stops accepting work right away. A task on `main_loop`
    /// waits until every procedure already queued for the UE finished and only
    /// then erases it. Returns false if the UE is unknown or its removal is
    /// already under way.
    pub fn remove_deferred(&self, main_loop: &ControlLoop, ue_index: I) -> bool {
        let (name, drained) = {
            let ue_db = self.lock();
            match ue_db.find(ue_index) {
                None => {
                    warn!("{}: cannot remove {}, UE not found", ue_db.name(), ue_index);
                    return false;
                }
                Some(ue) if ue.ctrl_loop.state() != LoopState::Running => {
                    debug!("{}: removal of {} already under way", ue_db.name(), ue_index);
                    return false;
                }
                Some(ue) => (ue_db.name(), ue.ctrl_loop.request_stop()),
            }
        };

        let registry = self.clone();
        let res = main_loop.schedule(async move {
            drained.await;

            debug!("{}: removing {}", name, ue_index);
            let mut ue_db = registry.lock();
            ue_db.erase(ue_index);
            info!("{}: {} removed ({} UEs left)", name, ue_index, ue_db.len());
        });

        match res {
            Ok(()) => true,
            Err(e) => {
                error!("{}: failed to schedule removal of {}: {}", name, ue_index, e);
                false
            }
        }
    }
}

impl<I: UeIndexType, C> fmt::Debug for SharedUeRegistry<I, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Ok(ue_db) => fmt::Debug::fmt(&*ue_db, f),
            Err(_) => f.write_str("SharedUeRegistry(<locked>)"),
        }
    }
}
