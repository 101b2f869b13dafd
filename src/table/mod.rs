//! Dense builtin call table
//!
//! Every C-API entry point the boundary supports occupies one slot in a
//! dense, id-indexed table. Native call stubs carry only the id; the entry
//! holds everything dispatch needs: the argument and return descriptors,
//! the call path, lock requirements, and the managed implementation.
//!
//! Design:
//! - Ids are assigned positionally at table construction and never change
//!   within a process
//! - Construction validates the table once: duplicate names, over-long
//!   signatures, or a non-void return on a void descriptor are build bugs
//!   and fatal
//! - Unimplemented entries are real slots whose implementation raises
//!   `NotImplementedError`; native code linking them still resolves

mod defs;

#[cfg(test)]
mod tests;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::bridge::ReferenceBridge;
use crate::descriptor::ArgDescriptor;
use crate::exc::{self, PyResult};
use crate::gil::Gil;
use crate::host::{HostObjectModel, ManagedValue};
use crate::logging::info;
use crate::mem::ClosureFactory;

/// Table index carried by native call stubs.
pub type FunId = u32;

/// Widest signature any entry may declare.
pub const MAX_ARITY: usize = 18;

/// How an entry reaches its implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPath {
    /// Routed straight to a managed builtin.
    Direct,
    /// Reached through a generated native shim (struct accessors, GC
    /// cooperation entry points).
    NativeShim,
    /// Boundary-internal entry, never exposed to extension headers.
    Internal,
    /// Present for link resolution only; calling it raises.
    Unimplemented,
}

/// Execution context handed to every builtin implementation.
pub struct CallContext<'a> {
    pub host: &'a dyn HostObjectModel,
    pub bridge: &'a ReferenceBridge,
    pub gil: &'a Gil,
    pub entry: &'static TableEntry,
}

/// Managed implementation of one entry.
pub type BuiltinFn = fn(&CallContext<'_>, &[ManagedValue]) -> PyResult<ManagedValue>;

/// One slot of the call table.
pub struct TableEntry {
    pub id: FunId,
    pub name: &'static str,
    pub path: CallPath,
    pub returns: ArgDescriptor,
    pub args: &'static [ArgDescriptor],
    /// Cleared only for the lock-bookkeeping entries themselves.
    pub needs_gil: bool,
    pub imp: BuiltinFn,
}

struct CallTable {
    entries: Vec<TableEntry>,
    by_name: HashMap<&'static str, FunId>,
}

static TABLE: Lazy<CallTable> = Lazy::new(|| {
    let defs = defs::definitions();
    let mut entries = Vec::with_capacity(defs.len());
    let mut by_name = HashMap::with_capacity(defs.len());

    for (i, d) in defs.into_iter().enumerate() {
        if d.args.len() > MAX_ARITY {
            exc::fatal("table entry exceeds maximum arity");
        }
        let id = i as FunId;
        if by_name.insert(d.name, id).is_some() {
            exc::fatal("duplicate name in call table");
        }
        entries.push(TableEntry {
            id,
            name: d.name,
            path: d.path,
            returns: d.returns,
            args: d.args,
            needs_gil: d.needs_gil,
            imp: d.imp,
        });
    }

    info!(event = "table_init", entries = entries.len(), "Call table built");
    CallTable { entries, by_name }
});

/// Entry definition before id assignment.
pub(crate) struct Def {
    pub name: &'static str,
    pub path: CallPath,
    pub returns: ArgDescriptor,
    pub args: &'static [ArgDescriptor],
    pub needs_gil: bool,
    pub imp: BuiltinFn,
}

/// Build and validate the table (idempotent).
pub fn init() {
    Lazy::force(&TABLE);
}

/// Entry for a dispatch id. An out-of-range id means a stale or corrupt
/// native stub; there is no way to answer it safely.
pub fn entry(id: FunId) -> &'static TableEntry {
    Lazy::force(&TABLE)
        .entries
        .get(id as usize)
        .unwrap_or_else(|| exc::fatal("dispatch id outside the call table"))
}

/// Id for an entry name (stub generation and tests).
pub fn fun_id(name: &str) -> Option<FunId> {
    Lazy::force(&TABLE).by_name.get(name).copied()
}

/// All entries, in id order.
pub fn entries() -> &'static [TableEntry] {
    &Lazy::force(&TABLE).entries
}

static THUNKS: Lazy<DashMap<FunId, usize>> = Lazy::new(DashMap::new);

/// Native-callable address for an entry, produced lazily through the
/// closure factory and cached for the life of the process.
pub fn native_thunk(id: FunId, factory: &dyn ClosureFactory) -> Option<usize> {
    if let Some(cached) = THUNKS.get(&id) {
        return Some(*cached);
    }
    let thunk = factory.thunk_for(id)?;
    THUNKS.insert(id, thunk);
    Some(thunk)
}
