//! Object protocol and string entry points.

use crate::exc::{PyException, PyResult};
use crate::host::ManagedValue;
use crate::table::CallContext;

pub fn get_item(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    Ok(ManagedValue::Object(ctx.host.get_item(obj, &args[1])?))
}

pub fn set_item(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    ctx.host.set_item(obj, &args[1], args[2].as_object()?)?;
    Ok(ManagedValue::Int(0))
}

pub fn get_attr_string(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    let name = args[1].as_str()?;
    Ok(ManagedValue::Object(ctx.host.get_attr(obj, name)?))
}

pub fn set_attr_string(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    let name = args[1].as_str()?;
    ctx.host.set_attr(obj, name, args[2].as_object()?)?;
    Ok(ManagedValue::Int(0))
}

/// Call with an argument tuple; a null tuple means no arguments.
pub fn call_object(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let callable = args[0].as_object()?;
    let call_args = match args[1].opt_object()? {
        Some(tuple) => ctx.host.sequence_items(tuple)?,
        None => Vec::new(),
    };
    Ok(ManagedValue::Object(ctx.host.call(callable, &call_args)?))
}

pub fn length(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    Ok(ManagedValue::Int(ctx.host.length(obj)? as i64))
}

pub fn is_true(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    Ok(ManagedValue::Int(ctx.host.truth(obj)? as i64))
}

pub fn str_of(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    let text = ctx.host.str_of(obj)?;
    Ok(ManagedValue::Object(ctx.host.box_str(&text)))
}

pub fn repr_of(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    let text = ctx.host.repr_of(obj)?;
    Ok(ManagedValue::Object(ctx.host.box_str(&text)))
}

pub fn hash_of(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    Ok(ManagedValue::Int(ctx.host.hash_of(obj)? as i64))
}

pub fn get_iter(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    Ok(ManagedValue::Object(ctx.host.iterate(obj)?))
}

/// Exhaustion is a null result without a pending exception, per the
/// iterator protocol's native convention.
pub fn iter_next(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let iterator = args[0].as_object()?;
    match ctx.host.iterate_next(iterator)? {
        Some(item) => Ok(ManagedValue::Object(item)),
        None => Ok(ManagedValue::NoValue),
    }
}

pub fn is_instance(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    let ty = args[1].as_object()?;
    Ok(ManagedValue::Int(ctx.host.is_instance(obj, ty)? as i64))
}

pub fn type_of(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    Ok(ManagedValue::Object(ctx.host.type_of(obj)?))
}

fn str_new(ctx: &CallContext<'_>, value: &ManagedValue) -> PyResult<ManagedValue> {
    match value {
        ManagedValue::Str(s) => Ok(ManagedValue::Object(ctx.host.box_str(s))),
        ManagedValue::NoValue => Err(PyException::system(format!(
            "null string passed to {}",
            ctx.entry.name
        ))),
        other => Err(PyException::type_error(format!(
            "expected string argument, got {other:?}"
        ))),
    }
}

pub fn unicode_from_string(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    str_new(ctx, &args[0])
}

pub fn unicode_as_utf8(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    Ok(ManagedValue::Str(ctx.host.str_of(obj)?))
}

/// The size argument is advisory here: the wide buffer crosses the
/// boundary NUL-terminated.
pub fn unicode_from_wide(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    str_new(ctx, &args[0])
}
