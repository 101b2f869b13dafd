//! Reference-queue reconciliation
//!
//! When the managed collector reclaims a weak wrapper, it reports the dead
//! handle here. Enqueueing is lock-free and safe from any collector
//! thread; the actual table surgery happens later, on a boundary thread,
//! during an explicit drain.

use super::{HandleStrength, ReferenceBridge, Residency};
use crate::host::{HostObjectModel, ManagedRef};
use crate::logging::log_queue_drain;
use crate::mem;

impl ReferenceBridge {
    /// Report a managed wrapper as collected. Lock-free; callable from the
    /// collector's own threads.
    pub fn enqueue_collected(&self, obj: ManagedRef) {
        self.collected.push(obj);
    }

    /// Reconcile all queued collections: dissolve their associations and
    /// free any boundary-owned stubs. Returns the number reconciled.
    pub fn drain_reference_queue(&self, host: &dyn HostObjectModel) -> usize {
        let mut removed = 0usize;
        while let Some(obj) = self.collected.pop() {
            let Some((_, addr)) = self.by_managed.remove(&obj) else {
                // Already dissolved by a refcount drop to zero.
                continue;
            };
            let Some((_, w)) = self.by_pointer.remove(&addr) else {
                continue;
            };
            self.candidates.remove(&addr);
            if w.strength == HandleStrength::Strong {
                host.release(w.managed);
            }
            let residency = w.residency;
            self.release_replicated(host, w);
            if residency == Residency::Managed {
                mem::free(addr);
            }
            removed += 1;
        }
        if removed > 0 {
            log_queue_drain(removed);
        }
        removed
    }

    /// Queued collections awaiting reconciliation.
    pub fn pending_collections(&self) -> usize {
        self.collected.len()
    }
}
