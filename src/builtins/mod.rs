//! Managed implementations of the supported C-API entry points
//!
//! Every function here has the uniform builtin signature: a call context
//! and the already-converted managed arguments. Implementations speak only
//! the host object model and the bridge; native representations never
//! reach this layer.

pub mod gcops;
pub mod gilops;
pub mod number;
pub mod object;
pub mod refcount;
pub mod sequence;
pub mod typeslots;

#[cfg(test)]
mod tests;

use crate::exc::{PyException, PyResult};
use crate::host::ManagedValue;
use crate::table::CallContext;

/// Implementation behind every linkable-but-unsupported entry. Failing
/// loudly beats returning a plausible wrong answer.
pub fn unimplemented_stub(
    ctx: &CallContext<'_>,
    _args: &[ManagedValue],
) -> PyResult<ManagedValue> {
    Err(PyException::not_implemented(format!(
        "the '{}' entry point is not supported by this boundary",
        ctx.entry.name
    )))
}
