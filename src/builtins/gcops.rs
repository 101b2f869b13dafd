//! Collector-cooperation entry points.

use crate::exc::PyResult;
use crate::host::ManagedValue;
use crate::table::CallContext;

/// `PyObject_GC_Track`: register an address as a collection candidate.
pub fn track(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    ctx.bridge.track(args[0].as_ptr()?);
    Ok(ManagedValue::Void)
}

/// `PyObject_GC_UnTrack`.
pub fn untrack(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    ctx.bridge.untrack(args[0].as_ptr()?);
    Ok(ManagedValue::Void)
}

/// Replicate a native object's referent list into the managed heap.
/// Returns the number of referents made reachable.
pub fn replicate(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let owner = args[0].as_ptr()?;
    let list_head = args[1].as_ptr()?;
    let n = ctx.bridge.replicate_references(ctx.host, owner, list_head)?;
    Ok(ManagedValue::Int(n as i64))
}

/// Demote strong wrappers to weak. A null list means the tracked
/// candidate set. Returns the number of handles downgraded.
pub fn ensure_weak(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let n = ctx.bridge.ensure_weak_list(ctx.host, args[0].as_ptr()?)?;
    Ok(ManagedValue::Int(n as i64))
}

/// Reconcile queued collections. Returns the number dissolved.
pub fn drain(ctx: &CallContext<'_>, _args: &[ManagedValue]) -> PyResult<ManagedValue> {
    Ok(ManagedValue::Int(
        ctx.bridge.drain_reference_queue(ctx.host) as i64
    ))
}
