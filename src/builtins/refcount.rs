//! Reference-counting entry points.

use crate::exc::PyResult;
use crate::host::ManagedValue;
use crate::table::CallContext;

/// `Py_IncRef`; null is a documented no-op.
pub fn incref(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let addr = args[0].as_ptr()?;
    if addr != 0 {
        ctx.bridge.produce_reference(ctx.host, addr)?;
    }
    Ok(ManagedValue::Void)
}

/// `Py_DecRef`; null is a documented no-op.
pub fn decref(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let addr = args[0].as_ptr()?;
    if addr != 0 {
        ctx.bridge.consume_reference(ctx.host, addr)?;
    }
    Ok(ManagedValue::Void)
}

/// Side-table count for an address (diagnostics).
pub fn refcnt(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    Ok(ManagedValue::Int(ctx.bridge.refcount(args[0].as_ptr()?)))
}
