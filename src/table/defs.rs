//! The entry definitions behind the call table.
//!
//! Order is load-bearing: an entry's position is its dispatch id.

use super::{CallPath, Def};
use crate::builtins::{gcops, gilops, number, object, refcount, sequence, typeslots};
use crate::builtins::unimplemented_stub;
use crate::cstruct::StructKind;
use crate::descriptor::ArgDescriptor::*;

macro_rules! def {
    ($name:literal, $path:ident, $ret:expr, [$($arg:expr),* $(,)?], $imp:expr) => {
        Def {
            name: $name,
            path: CallPath::$path,
            returns: $ret,
            args: &[$($arg),*],
            needs_gil: true,
            imp: $imp,
        }
    };
    ($name:literal, $path:ident, $ret:expr, [$($arg:expr),* $(,)?], $imp:expr, nogil) => {
        Def {
            name: $name,
            path: CallPath::$path,
            returns: $ret,
            args: &[$($arg),*],
            needs_gil: false,
            imp: $imp,
        }
    };
}

pub(crate) fn definitions() -> Vec<Def> {
    vec![
        // ---- object protocol ----
        def!("PyObject_GetItem", Direct, ObjectNewRef, [ObjectBorrowed, ObjectBorrowed], object::get_item),
        def!("PyObject_SetItem", Direct, Int32, [ObjectBorrowed, ObjectBorrowed, ObjectBorrowed], object::set_item),
        def!("PyObject_GetAttrString", Direct, ObjectNewRef, [ObjectBorrowed, CharPtr], object::get_attr_string),
        def!("PyObject_SetAttrString", Direct, Int32, [ObjectBorrowed, CharPtr, ObjectBorrowed], object::set_attr_string),
        def!("PyObject_CallObject", Direct, ObjectNewRef, [ObjectBorrowed, ObjectBorrowed], object::call_object),
        def!("PyObject_Length", Direct, SSize, [ObjectBorrowed], object::length),
        def!("PyObject_IsTrue", Direct, Int32, [ObjectBorrowed], object::is_true),
        def!("PyObject_Str", Direct, ObjectNewRef, [ObjectBorrowed], object::str_of),
        def!("PyObject_Repr", Direct, ObjectNewRef, [ObjectBorrowed], object::repr_of),
        def!("PyObject_Hash", Direct, Int64, [ObjectBorrowed], object::hash_of),
        def!("PyObject_GetIter", Direct, ObjectNewRef, [ObjectBorrowed], object::get_iter),
        def!("PyObject_IsInstance", Direct, Int32, [ObjectBorrowed, ObjectBorrowed], object::is_instance),
        def!("PyObject_Type", Direct, ObjectNewRef, [ObjectBorrowed], object::type_of),
        def!("PyIter_Next", Direct, ObjectNewRef, [ObjectBorrowed], object::iter_next),
        // ---- strings ----
        def!("PyUnicode_FromString", Direct, ObjectNewRef, [CharPtr], object::unicode_from_string),
        def!("PyUnicode_AsUTF8", Direct, CharPtr, [ObjectBorrowed], object::unicode_as_utf8),
        def!("PyUnicode_FromWideChar", Direct, ObjectNewRef, [WCharPtr, SSize], object::unicode_from_wide),
        // ---- number protocol ----
        def!("PyNumber_Add", Direct, ObjectNewRef, [ObjectBorrowed, ObjectBorrowed], number::add),
        def!("PyNumber_Subtract", Direct, ObjectNewRef, [ObjectBorrowed, ObjectBorrowed], number::subtract),
        def!("PyNumber_Multiply", Direct, ObjectNewRef, [ObjectBorrowed, ObjectBorrowed], number::multiply),
        def!("PyNumber_TrueDivide", Direct, ObjectNewRef, [ObjectBorrowed, ObjectBorrowed], number::true_divide),
        def!("PyNumber_FloorDivide", Direct, ObjectNewRef, [ObjectBorrowed, ObjectBorrowed], number::floor_divide),
        def!("PyNumber_Remainder", Direct, ObjectNewRef, [ObjectBorrowed, ObjectBorrowed], number::remainder),
        def!("PyNumber_Index", Direct, ObjectNewRef, [ObjectBorrowed], number::index),
        def!("PyLong_AsLong", Direct, Int64, [ObjectBorrowed], number::long_as_long),
        def!("PyLong_AsInt", Direct, Int32, [ObjectBorrowed], number::long_as_long),
        def!("PyLong_FromLong", Direct, ObjectNewRef, [Int64], number::long_from_long),
        def!("PyFloat_AsDouble", Direct, Float64, [ObjectBorrowed], number::float_as_double),
        def!("PyFloat_FromDouble", Direct, ObjectNewRef, [Float64], number::float_from_double),
        // ---- sequence protocol ----
        def!("PySequence_Size", Direct, SSize, [ObjectBorrowed], sequence::size),
        def!("PySequence_GetItem", Direct, ObjectNewRef, [ObjectBorrowed, SSize], sequence::get_item),
        def!("PySequence_SetItem", Direct, Int32, [ObjectBorrowed, SSize, ObjectBorrowed], sequence::set_item),
        def!("PySequence_Contains", Direct, Int32, [ObjectBorrowed, ObjectBorrowed], sequence::contains),
        def!("PySequence_Concat", Direct, ObjectNewRef, [ObjectBorrowed, ObjectBorrowed], sequence::concat),
        def!("PyList_New", Direct, ObjectNewRef, [SSize], sequence::list_new),
        def!("PyList_SetItem", Direct, Int32, [ObjectBorrowed, SSize, ObjectTransfer], sequence::list_set_item),
        def!("PyTuple_GetItem", Direct, ObjectBorrowed, [ObjectBorrowed, SSize], sequence::tuple_get_item),
        // ---- reference counting ----
        def!("Py_IncRef", Direct, Void, [Pointer], refcount::incref),
        def!("Py_DecRef", Direct, Void, [Pointer], refcount::decref),
        def!("_Py_RefCnt", Internal, Int64, [Pointer], refcount::refcnt),
        // ---- struct field accessors ----
        def!("get_PyObject_ob_refcnt", NativeShim, Int64, [StructPtr(StructKind::ObjectBase)], typeslots::get_slot),
        def!("set_PyObject_ob_refcnt", NativeShim, Void, [StructPtr(StructKind::ObjectBase), Int64], typeslots::set_slot),
        def!("get_PyObject_ob_type", NativeShim, Pointer, [StructPtr(StructKind::ObjectBase)], typeslots::get_slot),
        def!("set_PyObject_ob_type", NativeShim, Void, [StructPtr(StructKind::ObjectBase), Pointer], typeslots::set_slot),
        def!("get_PyVarObject_ob_size", NativeShim, Int64, [StructPtr(StructKind::VarObject)], typeslots::get_slot),
        def!("set_PyVarObject_ob_size", NativeShim, Void, [StructPtr(StructKind::VarObject), Int64], typeslots::set_slot),
        def!("get_PyTypeObject_tp_name", NativeShim, Pointer, [StructPtr(StructKind::TypeObject)], typeslots::get_slot),
        def!("set_PyTypeObject_tp_name", NativeShim, Void, [StructPtr(StructKind::TypeObject), Pointer], typeslots::set_slot),
        def!("get_PyTypeObject_tp_basicsize", NativeShim, Int64, [StructPtr(StructKind::TypeObject)], typeslots::get_slot),
        def!("set_PyTypeObject_tp_basicsize", NativeShim, Void, [StructPtr(StructKind::TypeObject), Int64], typeslots::set_slot),
        def!("get_PyTypeObject_tp_itemsize", NativeShim, Int64, [StructPtr(StructKind::TypeObject)], typeslots::get_slot),
        def!("set_PyTypeObject_tp_itemsize", NativeShim, Void, [StructPtr(StructKind::TypeObject), Int64], typeslots::set_slot),
        def!("get_PyTypeObject_tp_flags", NativeShim, Int64, [StructPtr(StructKind::TypeObject)], typeslots::get_slot),
        def!("set_PyTypeObject_tp_flags", NativeShim, Void, [StructPtr(StructKind::TypeObject), Int64], typeslots::set_slot),
        def!("get_PyTypeObject_tp_dictoffset", NativeShim, Int64, [StructPtr(StructKind::TypeObject)], typeslots::get_slot),
        def!("set_PyTypeObject_tp_dictoffset", NativeShim, Void, [StructPtr(StructKind::TypeObject), Int64], typeslots::set_slot),
        // ---- collector cooperation ----
        def!("PyObject_GC_Track", NativeShim, Void, [Pointer], gcops::track),
        def!("PyObject_GC_UnTrack", NativeShim, Void, [Pointer], gcops::untrack),
        def!("_PyGC_ReplicateReferences", NativeShim, SSize, [Pointer, Pointer], gcops::replicate),
        def!("_PyGC_EnsureWeak", NativeShim, SSize, [Pointer], gcops::ensure_weak),
        def!("_PyGC_DrainReferenceQueue", Internal, SSize, [], gcops::drain),
        // ---- execution lock ----
        def!("PyGILState_Ensure", Direct, Int32, [], gilops::ensure, nogil),
        def!("PyGILState_Release", Direct, Void, [Int32], gilops::release, nogil),
        // ---- linkable but unsupported ----
        def!("PyObject_GetBuffer", Unimplemented, Int32, [ObjectBorrowed, Pointer, Int32], unimplemented_stub),
        def!("PyBuffer_Release", Unimplemented, Void, [Pointer], unimplemented_stub),
        def!("PyCapsule_New", Unimplemented, ObjectNewRef, [Pointer, CharPtr, FuncPtr], unimplemented_stub),
        def!("PyErr_Fetch", Unimplemented, Void, [Pointer, Pointer, Pointer], unimplemented_stub),
        def!("PyModule_AddObject", Unimplemented, Int32, [ObjectBorrowed, CharPtr, ObjectTransfer], unimplemented_stub),
    ]
}
