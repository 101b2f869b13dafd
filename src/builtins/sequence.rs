//! Sequence, list, and tuple entry points.

use crate::exc::{PyException, PyResult};
use crate::host::ManagedValue;
use crate::table::CallContext;

pub fn size(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    Ok(ManagedValue::Int(ctx.host.length(obj)? as i64))
}

pub fn get_item(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    let index = ManagedValue::Int(args[1].as_int()?);
    Ok(ManagedValue::Object(ctx.host.get_item(obj, &index)?))
}

pub fn set_item(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    let index = ManagedValue::Int(args[1].as_int()?);
    ctx.host.set_item(obj, &index, args[2].as_object()?)?;
    Ok(ManagedValue::Int(0))
}

pub fn contains(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let obj = args[0].as_object()?;
    Ok(ManagedValue::Int(ctx.host.contains(obj, &args[1])? as i64))
}

pub fn concat(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let a = args[0].as_object()?;
    let b = args[1].as_object()?;
    Ok(ManagedValue::Object(ctx.host.concat(a, b)?))
}

pub fn list_new(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let len = args[0].as_int()?;
    if len < 0 {
        return Err(PyException::system("negative list size passed to PyList_New"));
    }
    let none = ctx.host.none();
    let items = vec![none; len as usize];
    Ok(ManagedValue::Object(ctx.host.new_list(&items)))
}

/// The item slot is a transfer argument: the caller's reference was
/// already consumed by conversion, matching the stealing convention.
pub fn list_set_item(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let list = args[0].as_object()?;
    let index = ManagedValue::Int(args[1].as_int()?);
    ctx.host.set_item(list, &index, args[2].as_object()?)?;
    Ok(ManagedValue::Int(0))
}

/// Borrowed return: the conversion layer hands out the address without
/// producing a reference.
pub fn tuple_get_item(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let tuple = args[0].as_object()?;
    let index = ManagedValue::Int(args[1].as_int()?);
    Ok(ManagedValue::Object(ctx.host.get_item(tuple, &index)?))
}
