//! Native struct layouts and the field accessor registry
//!
//! Native extensions address object headers by field, not by raw offset.
//! Every struct the boundary exposes is declared here as a `#[repr(C)]`
//! layout, and each addressable field gets a descriptor recording its
//! offset, width, and access class. Offsets come from the layouts
//! themselves, so the registry can never drift from the structs.
//!
//! Design:
//! - Layout validation runs once at registry construction; an overlapping
//!   or out-of-bounds field means the build is wrong and is fatal
//! - Accessors take a descriptor, never a bare offset
//! - A null struct pointer in an accessor is native-glue corruption, fatal

#[cfg(test)]
mod tests;

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::mem::{offset_of, size_of};
use std::os::raw::c_void;

use crate::exc;
use crate::logging::debug;

/// Magic word in `ObjectStub::tag` marking a boundary-allocated stub.
pub const STUB_TAG: u64 = 0x4342_5354_5542_3031;

/// Object header shared by every native-visible object.
#[repr(C)]
pub struct ObjectBase {
    pub ob_refcnt: i64,
    pub ob_type: *mut c_void,
}

/// Header of variable-size objects.
#[repr(C)]
pub struct VarObjectRepr {
    pub ob_refcnt: i64,
    pub ob_type: *mut c_void,
    pub ob_size: i64,
}

/// The slots of a type object that native extensions address directly.
#[repr(C)]
pub struct TypeObjectRepr {
    pub ob_refcnt: i64,
    pub ob_type: *mut c_void,
    pub ob_size: i64,
    pub tp_name: *mut c_void,
    pub tp_basicsize: i64,
    pub tp_itemsize: i64,
    pub tp_flags: u64,
    pub tp_dictoffset: i64,
}

/// One link of a native-built referent list handed to the replication
/// entry points.
#[repr(C)]
pub struct ReferentNode {
    pub next: *mut c_void,
    pub referent: *mut c_void,
}

/// Native stand-in allocated for a managed-resident object the first time
/// its address escapes to native code.
#[repr(C)]
pub struct ObjectStub {
    pub ob_refcnt: i64,
    pub ob_type: *mut c_void,
    pub tag: u64,
    pub managed_id: u64,
}

/// Struct layouts known to the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructKind {
    ObjectBase,
    VarObject,
    TypeObject,
    ReferentNode,
    ObjectStub,
}

impl StructKind {
    pub const fn size(self) -> usize {
        match self {
            Self::ObjectBase => size_of::<ObjectBase>(),
            Self::VarObject => size_of::<VarObjectRepr>(),
            Self::TypeObject => size_of::<TypeObjectRepr>(),
            Self::ReferentNode => size_of::<ReferentNode>(),
            Self::ObjectStub => size_of::<ObjectStub>(),
        }
    }
}

/// How a field is read and written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccess {
    /// Sign-extended integer of the given byte width.
    Scalar { width: usize },
    /// Opaque pointer-sized value.
    Pointer,
    /// Pointer that names another boundary object (type slots). Accessed
    /// like `Pointer`; the distinction matters to reference replication.
    ObjectPointer,
}

/// One addressable field of a registered struct.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub kind: StructKind,
    pub name: &'static str,
    pub offset: usize,
    pub access: FieldAccess,
}

impl FieldDescriptor {
    const fn width(&self) -> usize {
        match self.access {
            FieldAccess::Scalar { width } => width,
            FieldAccess::Pointer | FieldAccess::ObjectPointer => size_of::<usize>(),
        }
    }
}

macro_rules! scalar {
    ($kind:ident, $repr:ty, $field:ident) => {
        FieldDescriptor {
            kind: StructKind::$kind,
            name: stringify!($field),
            offset: offset_of!($repr, $field),
            access: FieldAccess::Scalar {
                width: size_of::<i64>(),
            },
        }
    };
}

macro_rules! pointer {
    ($kind:ident, $repr:ty, $field:ident) => {
        FieldDescriptor {
            kind: StructKind::$kind,
            name: stringify!($field),
            offset: offset_of!($repr, $field),
            access: FieldAccess::Pointer,
        }
    };
}

macro_rules! objptr {
    ($kind:ident, $repr:ty, $field:ident) => {
        FieldDescriptor {
            kind: StructKind::$kind,
            name: stringify!($field),
            offset: offset_of!($repr, $field),
            access: FieldAccess::ObjectPointer,
        }
    };
}

static REGISTRY: Lazy<HashMap<(StructKind, &'static str), FieldDescriptor>> = Lazy::new(|| {
    let fields = [
        scalar!(ObjectBase, ObjectBase, ob_refcnt),
        objptr!(ObjectBase, ObjectBase, ob_type),
        scalar!(VarObject, VarObjectRepr, ob_refcnt),
        objptr!(VarObject, VarObjectRepr, ob_type),
        scalar!(VarObject, VarObjectRepr, ob_size),
        scalar!(TypeObject, TypeObjectRepr, ob_refcnt),
        objptr!(TypeObject, TypeObjectRepr, ob_type),
        scalar!(TypeObject, TypeObjectRepr, ob_size),
        pointer!(TypeObject, TypeObjectRepr, tp_name),
        scalar!(TypeObject, TypeObjectRepr, tp_basicsize),
        scalar!(TypeObject, TypeObjectRepr, tp_itemsize),
        scalar!(TypeObject, TypeObjectRepr, tp_flags),
        scalar!(TypeObject, TypeObjectRepr, tp_dictoffset),
        pointer!(ReferentNode, ReferentNode, next),
        pointer!(ReferentNode, ReferentNode, referent),
        scalar!(ObjectStub, ObjectStub, ob_refcnt),
        objptr!(ObjectStub, ObjectStub, ob_type),
        scalar!(ObjectStub, ObjectStub, tag),
        scalar!(ObjectStub, ObjectStub, managed_id),
    ];

    let mut map = HashMap::with_capacity(fields.len());
    for fd in fields {
        validate(&fd, &map);
        map.insert((fd.kind, fd.name), fd);
    }
    debug!(event = "registry_init", fields = map.len(), "Field registry built");
    map
});

fn validate(fd: &FieldDescriptor, existing: &HashMap<(StructKind, &'static str), FieldDescriptor>) {
    if fd.offset + fd.width() > fd.kind.size() {
        exc::fatal("field descriptor extends past its struct");
    }
    for other in existing.values().filter(|o| o.kind == fd.kind) {
        let disjoint =
            fd.offset + fd.width() <= other.offset || other.offset + other.width() <= fd.offset;
        if !disjoint {
            exc::fatal("overlapping field descriptors in struct registry");
        }
    }
}

/// Build and validate the registry (idempotent).
pub fn init() {
    Lazy::force(&REGISTRY);
}

/// Descriptor for a registered field. Names are the static literals the
/// registry was built from; the map key borrows them.
pub fn field(kind: StructKind, name: &'static str) -> Option<&'static FieldDescriptor> {
    REGISTRY.get(&(kind, name))
}

/// Descriptor lookup that treats a miss as a build error.
pub fn field_or_fatal(kind: StructKind, name: &'static str) -> &'static FieldDescriptor {
    field(kind, name).unwrap_or_else(|| exc::fatal("unknown struct field requested"))
}

fn checked(addr: usize) -> usize {
    if addr == 0 {
        exc::fatal("struct field access through null pointer");
    }
    addr
}

/// Read a sign-extended scalar field.
pub fn read_scalar(addr: usize, fd: &FieldDescriptor) -> i64 {
    let p = checked(addr) + fd.offset;
    // Safety: addr points at a live struct of fd.kind; offset is validated.
    unsafe {
        match fd.access {
            FieldAccess::Scalar { width: 1 } => *(p as *const i8) as i64,
            FieldAccess::Scalar { width: 2 } => *(p as *const i16) as i64,
            FieldAccess::Scalar { width: 4 } => *(p as *const i32) as i64,
            FieldAccess::Scalar { width: 8 } => *(p as *const i64),
            _ => exc::fatal("scalar read of non-scalar field"),
        }
    }
}

/// Write a scalar field, truncating to its width.
pub fn write_scalar(addr: usize, fd: &FieldDescriptor, value: i64) {
    let p = checked(addr) + fd.offset;
    // Safety: as read_scalar.
    unsafe {
        match fd.access {
            FieldAccess::Scalar { width: 1 } => *(p as *mut i8) = value as i8,
            FieldAccess::Scalar { width: 2 } => *(p as *mut i16) = value as i16,
            FieldAccess::Scalar { width: 4 } => *(p as *mut i32) = value as i32,
            FieldAccess::Scalar { width: 8 } => *(p as *mut i64) = value,
            _ => exc::fatal("scalar write of non-scalar field"),
        }
    }
}

/// Read a pointer or object-pointer field.
pub fn read_pointer(addr: usize, fd: &FieldDescriptor) -> usize {
    if !matches!(fd.access, FieldAccess::Pointer | FieldAccess::ObjectPointer) {
        exc::fatal("pointer read of non-pointer field");
    }
    let p = checked(addr) + fd.offset;
    // Safety: as read_scalar.
    unsafe { *(p as *const usize) }
}

/// Write a pointer or object-pointer field.
pub fn write_pointer(addr: usize, fd: &FieldDescriptor, value: usize) {
    if !matches!(fd.access, FieldAccess::Pointer | FieldAccess::ObjectPointer) {
        exc::fatal("pointer write of non-pointer field");
    }
    let p = checked(addr) + fd.offset;
    // Safety: as read_scalar.
    unsafe { *(p as *mut usize) = value }
}

/// Address of element `index` in a contiguous array of this struct.
pub fn element_address(kind: StructKind, base: usize, index: usize) -> usize {
    checked(base) + index * kind.size()
}
