//! Argument and result descriptors
//!
//! Every slot in a table entry's signature carries a descriptor naming the
//! native representation, the managed representation, and the ownership
//! discipline of object references crossing in that slot. The conversion
//! layer is driven entirely by these descriptors; builtin implementations
//! never see native values.
//!
//! Design:
//! - `NativeValue` is an untagged union sized for the widest scalar; which
//!   field is live is always known from the descriptor in hand
//! - Object descriptors differ only in ownership: borrowed slots touch no
//!   counts, transfer slots consume one, new-ref slots produce one
//! - Error sentinels are a property of the return category, not of the
//!   individual entry

mod convert;

#[cfg(test)]
mod tests;

pub use convert::{managed_to_native, native_to_managed, ConvertCx};

use std::os::raw::c_void;

use crate::cstruct::StructKind;

/// Native wide character, matching the platform's `wchar_t`.
#[cfg(unix)]
pub type WChar = libc::wchar_t;
#[cfg(not(unix))]
pub type WChar = u32;

/// One untyped native machine value crossing the boundary.
///
/// The live field is determined by the `ArgDescriptor` governing the slot;
/// reading any other field is a descriptor bug.
#[repr(C)]
#[derive(Clone, Copy)]
pub union NativeValue {
    pub i8: i8,
    pub i16: i16,
    pub i32: i32,
    pub i64: i64,
    pub u8: u8,
    pub u16: u16,
    pub u32: u32,
    pub u64: u64,
    pub f32: f32,
    pub f64: f64,
    pub ssize: isize,
    pub ptr: *mut c_void,
}

// Plain value; the pointer field is data, never dereferenced without the
// ledger or bridge validating it first.
unsafe impl Send for NativeValue {}
unsafe impl Sync for NativeValue {}

impl NativeValue {
    /// All-zero value: null pointer, zero scalar, or void.
    #[inline]
    pub const fn null() -> Self {
        Self { u64: 0 }
    }

    /// Placeholder for void-returning entries.
    #[inline]
    pub const fn void() -> Self {
        Self::null()
    }

    #[inline]
    pub const fn from_i64(v: i64) -> Self {
        Self { i64: v }
    }

    #[inline]
    pub const fn from_u64(v: u64) -> Self {
        Self { u64: v }
    }

    #[inline]
    pub const fn from_f64(v: f64) -> Self {
        Self { f64: v }
    }

    #[inline]
    pub fn from_ptr(addr: usize) -> Self {
        Self {
            ptr: addr as *mut c_void,
        }
    }

    /// Raw bit pattern (diagnostics and tests).
    #[inline]
    pub fn bits(self) -> u64 {
        // Safety: every field aliases the same 8 bytes; smaller fields were
        // written through a zeroed value.
        unsafe { self.u64 }
    }
}

impl core::fmt::Debug for NativeValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "NativeValue({:#x})", self.bits())
    }
}

impl Default for NativeValue {
    fn default() -> Self {
        Self::null()
    }
}

/// Representation and ownership of one signature slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgDescriptor {
    Void,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// Signed size type (`Py_ssize_t`).
    SSize,
    Float32,
    Float64,
    /// Opaque data pointer, passed through unchanged.
    Pointer,
    /// Function pointer, passed through unchanged.
    FuncPtr,
    /// Pointer to a registered struct layout.
    StructPtr(StructKind),
    /// NUL-terminated UTF-8 string.
    CharPtr,
    /// NUL-terminated ASCII string.
    AsciiCharPtr,
    /// NUL-terminated wide string in the platform `wchar_t` encoding.
    WCharPtr,
    /// Object reference; the caller keeps its reference.
    ObjectBorrowed,
    /// Object reference; the callee consumes one reference (steal).
    ObjectTransfer,
    /// Object reference; a new reference is produced for the receiver.
    ObjectNewRef,
}

impl ArgDescriptor {
    /// True for the three object-reference disciplines.
    #[inline]
    pub const fn is_object(self) -> bool {
        matches!(
            self,
            Self::ObjectBorrowed | Self::ObjectTransfer | Self::ObjectNewRef
        )
    }

    /// Category deciding the error sentinel when this descriptor governs a
    /// return slot.
    pub const fn return_category(self) -> ReturnCategory {
        match self {
            Self::Void => ReturnCategory::Void,
            Self::Float32 | Self::Float64 => ReturnCategory::Float,
            Self::Bool
            | Self::Int8
            | Self::Int16
            | Self::Int32
            | Self::Int64
            | Self::UInt8
            | Self::UInt16
            | Self::UInt32
            | Self::UInt64
            | Self::SSize => ReturnCategory::Int,
            Self::Pointer
            | Self::FuncPtr
            | Self::StructPtr(_)
            | Self::CharPtr
            | Self::AsciiCharPtr
            | Self::WCharPtr
            | Self::ObjectBorrowed
            | Self::ObjectTransfer
            | Self::ObjectNewRef => ReturnCategory::Object,
        }
    }
}

/// Sentinel families for error returns.
///
/// A native caller detects failure from the sentinel alone and then reads
/// the pending-exception state for the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCategory {
    Int,
    Float,
    Object,
    Void,
}

impl ReturnCategory {
    /// The value a failed call returns in this category.
    #[inline]
    pub fn error_sentinel(self) -> NativeValue {
        match self {
            Self::Int => NativeValue::from_i64(-1),
            Self::Float => NativeValue::from_f64(-1.0),
            Self::Object => NativeValue::null(),
            Self::Void => NativeValue::void(),
        }
    }
}
