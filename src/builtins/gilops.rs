//! Execution-lock bookkeeping entry points.
//!
//! These two are the only entries dispatched without the lock already
//! held; they manipulate it themselves through the raw pair.

use crate::exc::PyResult;
use crate::host::ManagedValue;
use crate::table::CallContext;

/// `PyGILState_Ensure`: acquire (reentrantly) and return the state token.
pub fn ensure(ctx: &CallContext<'_>, _args: &[ManagedValue]) -> PyResult<ManagedValue> {
    ctx.gil.acquire();
    Ok(ManagedValue::Int(0))
}

/// `PyGILState_Release`. Releasing from a non-owner thread is fatal
/// inside the lock itself.
pub fn release(ctx: &CallContext<'_>, _args: &[ManagedValue]) -> PyResult<ManagedValue> {
    ctx.gil.release();
    Ok(ManagedValue::Void)
}
