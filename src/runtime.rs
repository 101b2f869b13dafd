//! Runtime assembly: host, bridge, lock, and pending-exception state.

use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::bridge::{BridgeMode, ReferenceBridge};
use crate::exc::PendingSlot;
use crate::gil::Gil;
use crate::host::{EmbeddedHeap, HostObjectModel};

/// One fully-wired boundary instance.
pub struct BridgeRuntime {
    host: Arc<dyn HostObjectModel>,
    bridge: ReferenceBridge,
    gil: Gil,
    pending: PendingSlot,
}

impl BridgeRuntime {
    pub fn new(host: Arc<dyn HostObjectModel>, mode: BridgeMode) -> Self {
        Self {
            host,
            bridge: ReferenceBridge::new(mode),
            gil: Gil::new(),
            pending: PendingSlot::new(),
        }
    }

    /// Runtime over the embedded heap with the bridge enabled (tests and
    /// the standalone embedding).
    pub fn embedded() -> Self {
        Self::new(Arc::new(EmbeddedHeap::new()), BridgeMode::Enabled)
    }

    pub fn host(&self) -> &dyn HostObjectModel {
        self.host.as_ref()
    }

    pub fn bridge(&self) -> &ReferenceBridge {
        &self.bridge
    }

    pub fn gil(&self) -> &Gil {
        &self.gil
    }

    pub fn pending(&self) -> &PendingSlot {
        &self.pending
    }
}

static GLOBAL: OnceCell<BridgeRuntime> = OnceCell::new();

/// Install the process-global runtime backed by the embedded host.
/// Idempotent; the first initialization wins.
pub fn init_global_embedded() -> &'static BridgeRuntime {
    GLOBAL.get_or_init(BridgeRuntime::embedded)
}

/// The process-global runtime, if initialized.
pub fn global() -> Option<&'static BridgeRuntime> {
    GLOBAL.get()
}
