//! Number protocol entry points.

use crate::exc::PyResult;
use crate::host::{BinaryOp, ManagedValue};
use crate::table::CallContext;

fn binary(ctx: &CallContext<'_>, args: &[ManagedValue], op: BinaryOp) -> PyResult<ManagedValue> {
    let a = args[0].as_object()?;
    let b = args[1].as_object()?;
    Ok(ManagedValue::Object(ctx.host.number_binary(op, a, b)?))
}

pub fn add(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    binary(ctx, args, BinaryOp::Add)
}

pub fn subtract(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    binary(ctx, args, BinaryOp::Sub)
}

pub fn multiply(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    binary(ctx, args, BinaryOp::Mul)
}

pub fn true_divide(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    binary(ctx, args, BinaryOp::TrueDiv)
}

pub fn floor_divide(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    binary(ctx, args, BinaryOp::FloorDiv)
}

pub fn remainder(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    binary(ctx, args, BinaryOp::Rem)
}

pub fn index(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    let v = ctx.host.index_of(obj)?;
    Ok(ManagedValue::Object(ctx.host.box_int(v)))
}

/// Shared by `PyLong_AsLong` and `PyLong_AsInt`; the return descriptor
/// decides the width and therefore where overflow is detected.
pub fn long_as_long(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    Ok(ManagedValue::Int(ctx.host.int_value(obj)?))
}

pub fn long_from_long(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    Ok(ManagedValue::Object(ctx.host.box_int(args[0].as_int()?)))
}

pub fn float_as_double(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    Ok(ManagedValue::Float(ctx.host.float_value(obj)?))
}

pub fn float_from_double(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    Ok(ManagedValue::Object(ctx.host.box_float(args[0].as_float()?)))
}
