//! Native reference bridge
//!
//! The bridge owns the bidirectional mapping between native addresses and
//! managed handles, the side-table reference counts native callers see,
//! and the cooperation machinery the two collectors need: strong-to-weak
//! handle demotion, reference-graph replication, and the reconciliation
//! queue for collected wrappers.
//!
//! Design:
//! - `by_pointer` and `by_managed` are sharded maps keyed on opposite ends
//!   of the same association; entries are inserted and removed together
//! - A wrapper never holds a map guard while calling back into the host
//!   or resolving another address (same-shard reentry deadlocks)
//! - Disabled mode (no native collector attached) turns every operation
//!   into a neutral no-op so pure-managed embeddings pay nothing

mod queue;
mod replicate;

#[cfg(test)]
mod tests;

use crossbeam::queue::SegQueue;
use dashmap::{DashMap, DashSet};

use crate::cstruct::{self, StructKind, STUB_TAG};
use crate::exc::{PyException, PyResult};
use crate::host::{HostObjectModel, ManagedRef};
use crate::logging::{log_bridge_resolve, log_ensure_weak, log_stub_alloc, warn};
use crate::mem;

/// Whether a wrapper keeps its managed object strongly reachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStrength {
    Strong,
    Weak,
}

/// Which side allocated the object behind a wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// A real native struct; the managed side holds a proxy.
    Native,
    /// A managed object; the native side holds a boundary-allocated stub.
    Managed,
}

/// Observable lifecycle state of an association (diagnostics and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Unregistered,
    NativeResidentStrong,
    NativeResidentWeak,
    ManagedResidentNoStub,
    ManagedResidentWithStub,
}

struct Wrapper {
    managed: ManagedRef,
    residency: Residency,
    strength: HandleStrength,
    /// Side-table count of native-held references.
    refcnt: u32,
    /// Managed images of this object's native referents. Each slot holds
    /// one host pin so the managed collector sees the native edges even
    /// after the referents' own handles go weak.
    replicated: Vec<ManagedRef>,
    /// Previous replication, pins still held, kept across one update so
    /// referents stay reachable while the new set is being resolved.
    fence: Vec<ManagedRef>,
}

/// Bridge operating mode, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeMode {
    Enabled,
    /// Pure-managed embedding: no native structs exist and every bridge
    /// operation is a neutral no-op.
    Disabled,
}

pub struct ReferenceBridge {
    mode: BridgeMode,
    by_pointer: DashMap<usize, Wrapper>,
    by_managed: DashMap<ManagedRef, usize>,
    /// Addresses registered as collection candidates by the tracking
    /// entry points; the argument-less ensure-weak pass covers these.
    candidates: DashSet<usize>,
    /// Managed wrappers reported collected by the host, awaiting
    /// reconciliation on the next drain.
    collected: SegQueue<ManagedRef>,
}

impl ReferenceBridge {
    pub fn new(mode: BridgeMode) -> Self {
        Self {
            mode,
            by_pointer: DashMap::new(),
            by_managed: DashMap::new(),
            candidates: DashSet::new(),
            collected: SegQueue::new(),
        }
    }

    pub fn mode(&self) -> BridgeMode {
        self.mode
    }

    /// Managed handle for a native address, creating the association on
    /// first sight. Does not change reference counts.
    pub fn resolve_native(
        &self,
        host: &dyn HostObjectModel,
        addr: usize,
    ) -> PyResult<ManagedRef> {
        if self.mode == BridgeMode::Disabled {
            return Ok(host.none());
        }
        if addr == 0 {
            return Err(PyException::system("null pointer resolved as object"));
        }
        if let Some(w) = self.by_pointer.get(&addr) {
            return Ok(w.managed);
        }

        // First sight. A boundary-allocated stub names its managed object
        // directly; anything else is a native-resident struct to adopt.
        let (managed, residency) = match self.stub_managed_id(addr) {
            Some(id) => (ManagedRef::from_raw(id), Residency::Managed),
            None => (host.adopt_native(addr), Residency::Native),
        };

        host.retain(managed);
        self.by_pointer.insert(
            addr,
            Wrapper {
                managed,
                residency,
                strength: HandleStrength::Strong,
                refcnt: if residency == Residency::Native { 1 } else { 0 },
                replicated: Vec::new(),
                fence: Vec::new(),
            },
        );
        self.by_managed.insert(managed, addr);
        log_bridge_resolve(addr);
        Ok(managed)
    }

    /// Native address for a managed handle, allocating an object stub the
    /// first time a managed-resident object escapes. Does not change
    /// reference counts.
    pub fn native_pointer_for(
        &self,
        host: &dyn HostObjectModel,
        obj: ManagedRef,
    ) -> PyResult<usize> {
        if self.mode == BridgeMode::Disabled {
            return Ok(0);
        }
        if let Some(addr) = self.by_managed.get(&obj) {
            return Ok(*addr);
        }

        // A proxy for a native struct round-trips to its original address.
        // No native holder exists yet at this point; the count stays zero
        // until a reference is actually handed out.
        if let Some(addr) = host.native_address(obj) {
            host.retain(obj);
            self.by_pointer.insert(
                addr,
                Wrapper {
                    managed: obj,
                    residency: Residency::Native,
                    strength: HandleStrength::Strong,
                    refcnt: 0,
                    replicated: Vec::new(),
                    fence: Vec::new(),
                },
            );
            self.by_managed.insert(obj, addr);
            return Ok(addr);
        }

        let addr = mem::allocate(StructKind::ObjectStub.size())?;
        cstruct::write_scalar(
            addr,
            cstruct::field_or_fatal(StructKind::ObjectStub, "tag"),
            STUB_TAG as i64,
        );
        cstruct::write_scalar(
            addr,
            cstruct::field_or_fatal(StructKind::ObjectStub, "managed_id"),
            obj.raw() as i64,
        );

        host.retain(obj);
        self.by_pointer.insert(
            addr,
            Wrapper {
                managed: obj,
                residency: Residency::Managed,
                strength: HandleStrength::Strong,
                refcnt: 0,
                replicated: Vec::new(),
                fence: Vec::new(),
            },
        );
        self.by_managed.insert(obj, addr);
        log_stub_alloc(addr);
        Ok(addr)
    }

    /// Add one native-held reference (new-ref results, explicit incref).
    pub fn produce_reference(&self, host: &dyn HostObjectModel, addr: usize) -> PyResult<()> {
        if self.mode == BridgeMode::Disabled {
            return Ok(());
        }
        if self.by_pointer.get(&addr).is_none() {
            // Incref on a never-seen pointer registers it first.
            self.resolve_native(host, addr)?;
        }
        let mut w = self
            .by_pointer
            .get_mut(&addr)
            .ok_or_else(|| PyException::system("reference produced for unknown pointer"))?;
        w.refcnt += 1;
        let count = w.refcnt as i64;
        drop(w);
        self.write_header_count(addr, count);
        Ok(())
    }

    /// Drop one native-held reference; the association dissolves when the
    /// side-table count reaches zero.
    pub fn consume_reference(&self, host: &dyn HostObjectModel, addr: usize) -> PyResult<()> {
        if self.mode == BridgeMode::Disabled {
            return Ok(());
        }
        let (managed, strength, residency, remaining) = {
            let mut w = self.by_pointer.get_mut(&addr).ok_or_else(|| {
                PyException::system("reference consumed for unknown pointer")
            })?;
            if w.refcnt == 0 {
                return Err(PyException::system("native reference count underflow"));
            }
            w.refcnt -= 1;
            (w.managed, w.strength, w.residency, w.refcnt)
        };

        if remaining > 0 {
            self.write_header_count(addr, remaining as i64);
            return Ok(());
        }

        let removed = self.by_pointer.remove(&addr);
        self.by_managed.remove(&managed);
        self.candidates.remove(&addr);
        if strength == HandleStrength::Strong {
            host.release(managed);
        }
        if let Some((_, w)) = removed {
            self.release_replicated(host, w);
        }
        if residency == Residency::Managed {
            mem::free(addr);
        }
        Ok(())
    }

    /// Drop the pins a dissolving wrapper holds on its replicated referent
    /// images.
    fn release_replicated(&self, host: &dyn HostObjectModel, w: Wrapper) {
        for img in w.replicated.into_iter().chain(w.fence) {
            host.release(img);
        }
    }

    /// Side-table reference count for an address (0 when unregistered).
    pub fn refcount(&self, addr: usize) -> i64 {
        self.by_pointer.get(&addr).map_or(0, |w| w.refcnt as i64)
    }

    /// Demote the named wrappers from strong to weak so the managed
    /// collector can reclaim proxies kept alive only by the bridge.
    pub fn ensure_weak(&self, host: &dyn HostObjectModel, addrs: &[usize]) -> usize {
        if self.mode == BridgeMode::Disabled {
            return 0;
        }
        let mut downgraded = 0usize;
        for addr in addrs {
            match self.by_pointer.get_mut(addr) {
                Some(mut w) if w.strength == HandleStrength::Strong => {
                    w.strength = HandleStrength::Weak;
                    let managed = w.managed;
                    drop(w);
                    host.release(managed);
                    downgraded += 1;
                }
                Some(_) => {}
                None => warn!(
                    event = "ensure_weak_miss",
                    address = *addr,
                    "Ensure-weak on unregistered pointer"
                ),
            }
        }
        log_ensure_weak(addrs.len(), downgraded);
        downgraded
    }

    /// Ensure-weak pass over the tracked candidate set.
    pub fn ensure_weak_candidates(&self, host: &dyn HostObjectModel) -> usize {
        let addrs: Vec<usize> = self.candidates.iter().map(|a| *a).collect();
        self.ensure_weak(host, &addrs)
    }

    /// Register an address as a collection candidate.
    pub fn track(&self, addr: usize) {
        if self.mode == BridgeMode::Enabled && addr != 0 {
            self.candidates.insert(addr);
        }
    }

    /// Remove an address from the candidate set.
    pub fn untrack(&self, addr: usize) {
        self.candidates.remove(&addr);
    }

    pub fn tracked_candidates(&self) -> usize {
        self.candidates.len()
    }

    /// Lifecycle state of a native address.
    pub fn state_of(&self, addr: usize) -> BridgeState {
        match self.by_pointer.get(&addr) {
            None => BridgeState::Unregistered,
            Some(w) => match (w.residency, w.strength) {
                (Residency::Native, HandleStrength::Strong) => BridgeState::NativeResidentStrong,
                (Residency::Native, HandleStrength::Weak) => BridgeState::NativeResidentWeak,
                (Residency::Managed, _) => BridgeState::ManagedResidentWithStub,
            },
        }
    }

    /// Lifecycle state of a managed handle.
    pub fn state_of_managed(&self, obj: ManagedRef) -> BridgeState {
        match self.by_managed.get(&obj) {
            None => BridgeState::ManagedResidentNoStub,
            Some(addr) => self.state_of(*addr),
        }
    }

    /// Number of live associations.
    pub fn live_wrappers(&self) -> usize {
        self.by_pointer.len()
    }

    /// Managed id stored in a boundary-allocated stub, if this address is
    /// one. Only ledger-owned memory is ever inspected.
    fn stub_managed_id(&self, addr: usize) -> Option<u64> {
        let size = mem::allocation_size(addr)?;
        if size < StructKind::ObjectStub.size() {
            return None;
        }
        let tag = cstruct::read_scalar(
            addr,
            cstruct::field_or_fatal(StructKind::ObjectStub, "tag"),
        ) as u64;
        if tag != STUB_TAG {
            return None;
        }
        Some(cstruct::read_scalar(
            addr,
            cstruct::field_or_fatal(StructKind::ObjectStub, "managed_id"),
        ) as u64)
    }

    /// Mirror the side-table count into the object header when the memory
    /// is boundary-owned (foreign native headers are left alone).
    fn write_header_count(&self, addr: usize, count: i64) {
        if mem::allocation_size(addr).is_some() {
            cstruct::write_scalar(
                addr,
                cstruct::field_or_fatal(StructKind::ObjectBase, "ob_refcnt"),
                count,
            );
        }
    }
}
