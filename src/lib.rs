//! capi-bridge - CPython C-API compatibility boundary for a managed host
//!
//! This crate lets native extension modules compiled against the C-API run
//! on a managed runtime. Every supported entry point is routed through a
//! single dispatch choke point that marshals native arguments into managed
//! values, executes against the host object model, and maps results and
//! exceptions back onto the native calling convention.

#![allow(dead_code)]

pub mod logging;
pub mod exc;
pub mod gil;
pub mod host;
pub mod mem;
pub mod descriptor;
pub mod cstruct;
pub mod bridge;
pub mod table;
pub mod builtins;
pub mod adapter;
pub mod runtime;

// Re-export core types
pub use descriptor::{ArgDescriptor, NativeValue, ReturnCategory};
pub use host::{HostObjectModel, ManagedRef, ManagedValue};
pub use bridge::{BridgeMode, BridgeState, ReferenceBridge};
pub use table::{CallPath, FunId, TableEntry};
pub use exc::{PyErrorKind, PyException, PyResult};
pub use runtime::BridgeRuntime;

/// Runtime initialization: logging, registries, and the global runtime
/// backed by the embedded host.
#[no_mangle]
pub extern "C" fn capi_bridge_init() {
    logging::init();
    cstruct::init();
    table::init();
    runtime::init_global_embedded();
}

/// Runtime cleanup
#[no_mangle]
pub extern "C" fn capi_bridge_cleanup() {
    if let Some(rt) = runtime::global() {
        rt.bridge().drain_reference_queue(rt.host());
    }
}

/// Universal native dispatch stub.
///
/// Generated native call-stubs forward here with the table id and a fixed
/// argument array. Calling before `capi_bridge_init` is a documented
/// degraded state: a diagnostic goes to the error stream and the null
/// sentinel is returned.
///
/// # Safety
/// - `argv` must point to `argc` valid `NativeValue`s (null only if argc is 0)
#[no_mangle]
pub extern "C" fn capi_dispatch(id: u32, argv: *const NativeValue, argc: usize) -> NativeValue {
    let Some(rt) = runtime::global() else {
        exc::report_uncaught("capi_dispatch called before runtime initialization");
        return NativeValue::null();
    };

    let args: &[NativeValue] = if argv.is_null() || argc == 0 {
        &[]
    } else {
        unsafe { core::slice::from_raw_parts(argv, argc) }
    };

    adapter::execute(rt, id, args)
}
