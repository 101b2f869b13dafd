//! Call adapter - the dispatch choke point
//!
//! `execute` is the only road from a native value array to a builtin and
//! back. It owns the whole per-call discipline: lock acquisition, arity
//! checking, descriptor-driven conversion in both directions, panic
//! containment, and the exception-to-sentinel translation native callers
//! rely on.


use std::panic::{self, AssertUnwindSafe};

use crate::descriptor::{managed_to_native, native_to_managed, ConvertCx, NativeValue};
use crate::exc::{PyException, PyResult};
use crate::host::ManagedValue;
use crate::logging::{log_dispatch, log_sentinel};
use crate::runtime::BridgeRuntime;
use crate::table::{self, CallContext, CallPath, FunId, TableEntry};

/// Dispatch one call through the table.
///
/// Never unwinds and never returns garbage: every failure path ends in
/// the entry's category sentinel with the cause parked in the pending
/// slot.
pub fn execute(rt: &BridgeRuntime, id: FunId, argv: &[NativeValue]) -> NativeValue {
    let entry = table::entry(id);
    log_dispatch(entry.name, argv.len());

    let _guard = if entry.needs_gil {
        Some(rt.gil().lock())
    } else {
        None
    };

    match run(rt, entry, argv) {
        Ok(value) => value,
        Err(exc) => {
            log_sentinel(entry.name, &exc.to_string());
            rt.pending().set(exc);
            entry.returns.return_category().error_sentinel()
        }
    }
}

fn run(rt: &BridgeRuntime, entry: &'static TableEntry, argv: &[NativeValue]) -> PyResult<NativeValue> {
    if argv.len() != entry.args.len() {
        return Err(PyException::system(format!(
            "{} dispatched with {} arguments, expected {}",
            entry.name,
            argv.len(),
            entry.args.len()
        )));
    }

    let cx = ConvertCx {
        host: rt.host(),
        bridge: rt.bridge(),
    };
    let ctx = CallContext {
        host: rt.host(),
        bridge: rt.bridge(),
        gil: rt.gil(),
        entry,
    };

    // Unimplemented slots raise before conversion so transfer arguments
    // keep their references.
    if entry.path == CallPath::Unimplemented {
        let result = (entry.imp)(&ctx, &[])?;
        return managed_to_native(&cx, entry.returns, &result);
    }

    let mut args: Vec<ManagedValue> = Vec::with_capacity(argv.len());
    for (desc, value) in entry.args.iter().zip(argv) {
        args.push(native_to_managed(&cx, *desc, *value)?);
    }

    // A panicking builtin must not unwind into native frames.
    let result = panic::catch_unwind(AssertUnwindSafe(|| (entry.imp)(&ctx, &args)))
        .map_err(|_| PyException::system(format!("panic in implementation of {}", entry.name)))??;

    managed_to_native(&cx, entry.returns, &result)
}
