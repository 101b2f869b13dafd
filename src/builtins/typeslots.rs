//! Struct field accessor entry points.
//!
//! Native headers compile field reads and writes of boundary structs into
//! calls to paired `get_`/`set_` entries. Both route through the field
//! registry; the entry name itself carries the struct and field.

use crate::cstruct::{self, FieldAccess, FieldDescriptor, StructKind};
use crate::exc::{self, PyResult};
use crate::host::ManagedValue;
use crate::table::CallContext;

/// Field named by a slot-accessor entry. A name outside this list in the
/// table is a build bug.
fn field_for(entry_name: &str) -> Option<&'static FieldDescriptor> {
    let rest = entry_name
        .strip_prefix("get_")
        .or_else(|| entry_name.strip_prefix("set_"))?;
    let (kind, field) = match rest {
        "PyObject_ob_refcnt" => (StructKind::ObjectBase, "ob_refcnt"),
        "PyObject_ob_type" => (StructKind::ObjectBase, "ob_type"),
        "PyVarObject_ob_size" => (StructKind::VarObject, "ob_size"),
        "PyTypeObject_tp_name" => (StructKind::TypeObject, "tp_name"),
        "PyTypeObject_tp_basicsize" => (StructKind::TypeObject, "tp_basicsize"),
        "PyTypeObject_tp_itemsize" => (StructKind::TypeObject, "tp_itemsize"),
        "PyTypeObject_tp_flags" => (StructKind::TypeObject, "tp_flags"),
        "PyTypeObject_tp_dictoffset" => (StructKind::TypeObject, "tp_dictoffset"),
        _ => return None,
    };
    cstruct::field(kind, field)
}

pub fn get_slot(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let fd = field_for(ctx.entry.name)
        .unwrap_or_else(|| exc::fatal("slot accessor with unregistered field"));
    let addr = args[0].as_ptr()?;
    Ok(match fd.access {
        FieldAccess::Scalar { .. } => ManagedValue::Int(cstruct::read_scalar(addr, fd)),
        FieldAccess::Pointer | FieldAccess::ObjectPointer => {
            ManagedValue::Ptr(cstruct::read_pointer(addr, fd))
        }
    })
}

pub fn set_slot(ctx: &CallContext<'_>, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let fd = field_for(ctx.entry.name)
        .unwrap_or_else(|| exc::fatal("slot accessor with unregistered field"));
    let addr = args[0].as_ptr()?;
    match fd.access {
        FieldAccess::Scalar { .. } => cstruct::write_scalar(addr, fd, args[1].as_int()?),
        FieldAccess::Pointer | FieldAccess::ObjectPointer => {
            cstruct::write_pointer(addr, fd, args[1].as_ptr()?)
        }
    }
    Ok(ManagedValue::Void)
}
