//! Host object model seam - the managed side of the boundary
//!
//! The host runtime's object model is an external collaborator: this module
//! defines the opaque handle type, the tagged value that crosses the
//! conversion layer, and the trait naming exactly the abstract operations
//! the per-domain builtins are expressed in. `EmbeddedHeap` is the crate's
//! reference implementation, used by the pure-managed embedding mode and
//! the test suite.

mod heap;

#[cfg(test)]
mod tests;

pub use heap::EmbeddedHeap;

use crate::exc::{PyException, PyResult};

/// Opaque handle to a managed object (8 bytes, host-defined meaning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ManagedRef(u64);

impl ManagedRef {
    /// Reconstruct a handle from its raw representation (bridge stubs).
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw representation, stored in native stub structs.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// A managed value produced or consumed by argument/result conversion.
///
/// `NoValue` is the managed image of a native null pointer. It is distinct
/// from Python-level `None`, which is an ordinary `Object` handle.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagedValue {
    Void,
    NoValue,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Ptr(usize),
    Str(String),
    Object(ManagedRef),
}

impl ManagedValue {
    /// Object handle, rejecting everything else.
    pub fn as_object(&self) -> PyResult<ManagedRef> {
        match self {
            Self::Object(r) => Ok(*r),
            Self::NoValue => Err(PyException::system("null object passed to C-API call")),
            other => Err(PyException::type_error(format!(
                "expected object argument, got {other:?}"
            ))),
        }
    }

    /// Object handle or `None` for native null.
    pub fn opt_object(&self) -> PyResult<Option<ManagedRef>> {
        match self {
            Self::NoValue => Ok(None),
            other => other.as_object().map(Some),
        }
    }

    pub fn as_int(&self) -> PyResult<i64> {
        match self {
            Self::Int(v) => Ok(*v),
            Self::Bool(b) => Ok(*b as i64),
            Self::UInt(v) => i64::try_from(*v)
                .map_err(|_| PyException::overflow("unsigned value out of i64 range")),
            other => Err(PyException::type_error(format!(
                "expected integer argument, got {other:?}"
            ))),
        }
    }

    pub fn as_float(&self) -> PyResult<f64> {
        match self {
            Self::Float(v) => Ok(*v),
            Self::Int(v) => Ok(*v as f64),
            other => Err(PyException::type_error(format!(
                "expected float argument, got {other:?}"
            ))),
        }
    }

    pub fn as_str(&self) -> PyResult<&str> {
        match self {
            Self::Str(s) => Ok(s),
            other => Err(PyException::type_error(format!(
                "expected string argument, got {other:?}"
            ))),
        }
    }

    pub fn as_ptr(&self) -> PyResult<usize> {
        match self {
            Self::Ptr(p) => Ok(*p),
            Self::NoValue => Ok(0),
            other => Err(PyException::type_error(format!(
                "expected pointer argument, got {other:?}"
            ))),
        }
    }
}

/// Binary operations of the number protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    TrueDiv,
    FloorDiv,
    Rem,
}

impl BinaryOp {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::TrueDiv => "/",
            Self::FloorDiv => "//",
            Self::Rem => "%",
        }
    }
}

/// Abstract operations of the host object model.
///
/// Every per-domain builtin is expressed purely in these terms; nothing in
/// the crate reaches into host internals. Implementations must be safe to
/// share across threads (dispatch is serialized by the execution lock, but
/// diagnostic reads may come from anywhere).
pub trait HostObjectModel: Send + Sync {
    // ---- singletons and identity ----

    /// The host's `None` singleton.
    fn none(&self) -> ManagedRef;

    /// Type of an object, as a managed type object.
    fn type_of(&self, obj: ManagedRef) -> PyResult<ManagedRef>;

    // ---- object protocol ----

    fn get_item(&self, obj: ManagedRef, key: &ManagedValue) -> PyResult<ManagedRef>;
    fn set_item(&self, obj: ManagedRef, key: &ManagedValue, value: ManagedRef) -> PyResult<()>;
    fn get_attr(&self, obj: ManagedRef, name: &str) -> PyResult<ManagedRef>;
    fn set_attr(&self, obj: ManagedRef, name: &str, value: ManagedRef) -> PyResult<()>;
    fn call(&self, callable: ManagedRef, args: &[ManagedRef]) -> PyResult<ManagedRef>;
    fn length(&self, obj: ManagedRef) -> PyResult<usize>;
    fn truth(&self, obj: ManagedRef) -> PyResult<bool>;
    fn str_of(&self, obj: ManagedRef) -> PyResult<String>;
    fn repr_of(&self, obj: ManagedRef) -> PyResult<String>;
    fn hash_of(&self, obj: ManagedRef) -> PyResult<u64>;
    fn iterate(&self, obj: ManagedRef) -> PyResult<ManagedRef>;
    fn iterate_next(&self, iterator: ManagedRef) -> PyResult<Option<ManagedRef>>;
    fn is_instance(&self, obj: ManagedRef, ty: ManagedRef) -> PyResult<bool>;

    // ---- sequence protocol ----

    fn contains(&self, obj: ManagedRef, item: &ManagedValue) -> PyResult<bool>;
    fn concat(&self, a: ManagedRef, b: ManagedRef) -> PyResult<ManagedRef>;
    fn sequence_items(&self, obj: ManagedRef) -> PyResult<Vec<ManagedRef>>;

    // ---- number protocol ----

    fn number_binary(&self, op: BinaryOp, a: ManagedRef, b: ManagedRef) -> PyResult<ManagedRef>;
    fn index_of(&self, obj: ManagedRef) -> PyResult<i64>;
    fn int_value(&self, obj: ManagedRef) -> PyResult<i64>;
    fn float_value(&self, obj: ManagedRef) -> PyResult<f64>;

    // ---- boxing ----

    fn box_int(&self, v: i64) -> ManagedRef;
    fn box_float(&self, v: f64) -> ManagedRef;
    fn box_bool(&self, v: bool) -> ManagedRef;
    fn box_str(&self, s: &str) -> ManagedRef;
    fn new_list(&self, items: &[ManagedRef]) -> ManagedRef;
    fn new_tuple(&self, items: &[ManagedRef]) -> ManagedRef;
    fn new_dict(&self) -> ManagedRef;

    // ---- bridge cooperation ----

    /// Wrap a native-resident struct as a managed proxy object.
    fn adopt_native(&self, address: usize) -> ManagedRef;

    /// Native address of a native-resident proxy, if this object is one.
    fn native_address(&self, obj: ManagedRef) -> Option<usize>;

    /// Pin an object as strongly reachable on behalf of the native side.
    fn retain(&self, obj: ManagedRef);

    /// Drop one native-side pin.
    fn release(&self, obj: ManagedRef);

    /// True while any native-side pin keeps the object alive (test hook for
    /// collectibility).
    fn is_pinned(&self, obj: ManagedRef) -> bool;
}
