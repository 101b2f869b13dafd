//! Reference-graph replication
//!
//! A native object's outgoing references are invisible to the managed
//! collector. The native collector reports them as a linked list of
//! referent nodes; replication resolves each referent to its managed image
//! and parks those images on the owner's wrapper, making the native edges
//! visible as managed edges.

use super::ReferenceBridge;
use crate::cstruct::{self, StructKind};
use crate::exc::{PyException, PyResult};
use crate::host::{HostObjectModel, ManagedRef};
use crate::logging::log_replicate;

/// Upper bound on a referent list; a longer list is a corrupt or cyclic
/// chain from broken native glue.
const MAX_REFERENTS: usize = 1 << 20;

impl ReferenceBridge {
    /// Replace the replicated referent set of `owner_addr` with the
    /// referents in the native list at `list_head`.
    ///
    /// The update is idempotent: replaying the same list leaves the same
    /// set. The previous set stays reachable (on the fence) until the new
    /// set is fully resolved, so a collection during the update cannot
    /// reclaim a referent that is still reachable natively.
    pub fn replicate_references(
        &self,
        host: &dyn HostObjectModel,
        owner_addr: usize,
        list_head: usize,
    ) -> PyResult<usize> {
        if self.mode == super::BridgeMode::Disabled {
            return Ok(0);
        }

        // The owner must have an association before its edges can.
        self.resolve_native(host, owner_addr)?;
        let referents = walk_referents(list_head)?;

        // Phase 1: move the old set onto the fence. No guard is held past
        // this block; resolving referents below may touch the same shard.
        {
            let mut w = self
                .by_pointer
                .get_mut(&owner_addr)
                .ok_or_else(|| PyException::system("replication owner vanished"))?;
            let old = std::mem::take(&mut w.replicated);
            w.fence = old;
        }

        // Phase 2: resolve every referent to its managed image and pin it.
        // Each replicated slot holds its own host pin; that pin, not the
        // referent's own wrapper, is what keeps the edge visible to the
        // managed collector.
        let mut images: Vec<ManagedRef> = Vec::with_capacity(referents.len());
        let mut failure = None;
        for addr in &referents {
            match self.resolve_native(host, *addr) {
                Ok(img) => {
                    host.retain(img);
                    images.push(img);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failure {
            // Unwind: drop the partial set and put the old one back.
            for img in images {
                host.release(img);
            }
            if let Some(mut w) = self.by_pointer.get_mut(&owner_addr) {
                let old = std::mem::take(&mut w.fence);
                w.replicated = old;
            }
            return Err(e);
        }

        // Phase 3: install the new set, then release the displaced pins.
        // The old set stays pinned until the new one is in place, so a
        // collection during the swap cannot reclaim a still-referenced
        // object. Pins are released only after the guard is gone.
        let displaced = {
            let mut w = self
                .by_pointer
                .get_mut(&owner_addr)
                .ok_or_else(|| PyException::system("replication owner vanished"))?;
            w.replicated = images;
            std::mem::take(&mut w.fence)
        };
        for img in displaced {
            host.release(img);
        }

        log_replicate(owner_addr, referents.len());
        Ok(referents.len())
    }

    /// Ensure-weak over a native referent list, falling back to the
    /// tracked candidate set when the list head is null.
    pub fn ensure_weak_list(
        &self,
        host: &dyn HostObjectModel,
        list_head: usize,
    ) -> PyResult<usize> {
        if self.mode == super::BridgeMode::Disabled {
            return Ok(0);
        }
        if list_head == 0 {
            return Ok(self.ensure_weak_candidates(host));
        }
        let addrs = walk_referents(list_head)?;
        Ok(self.ensure_weak(host, &addrs))
    }

    /// Replicated referent images of an owner (tests and diagnostics).
    pub fn replicated_of(&self, owner_addr: usize) -> Vec<ManagedRef> {
        self.by_pointer
            .get(&owner_addr)
            .map(|w| w.replicated.clone())
            .unwrap_or_default()
    }
}

/// Collect referent addresses from a native `ReferentNode` list.
///
/// An empty list (null head) is valid. A null referent inside a node is
/// not: the native collector never emits one, so it signals corruption.
fn walk_referents(list_head: usize) -> PyResult<Vec<usize>> {
    let next_fd = cstruct::field_or_fatal(StructKind::ReferentNode, "next");
    let referent_fd = cstruct::field_or_fatal(StructKind::ReferentNode, "referent");

    let mut out = Vec::new();
    let mut node = list_head;
    while node != 0 {
        if out.len() >= MAX_REFERENTS {
            return Err(PyException::system("referent list exceeds sane bounds"));
        }
        let referent = cstruct::read_pointer(node, referent_fd);
        if referent == 0 {
            return Err(PyException::system("null referent in replication list"));
        }
        out.push(referent);
        node = cstruct::read_pointer(node, next_fd);
    }
    Ok(out)
}
