//! Conversion-layer tests: representations, ownership, sentinels.

use super::*;
use crate::bridge::{BridgeMode, ReferenceBridge};
use crate::exc::PyErrorKind;
use crate::host::{EmbeddedHeap, HostObjectModel, ManagedValue};
use crate::mem;

struct Fixture {
    host: EmbeddedHeap,
    bridge: ReferenceBridge,
}

impl Fixture {
    fn new() -> Self {
        crate::cstruct::init();
        Self {
            host: EmbeddedHeap::new(),
            bridge: ReferenceBridge::new(BridgeMode::Enabled),
        }
    }

    fn cx(&self) -> ConvertCx<'_> {
        ConvertCx {
            host: &self.host,
            bridge: &self.bridge,
        }
    }
}

#[test]
fn test_signed_width_decoding() {
    let f = Fixture::new();
    let v = NativeValue { i8: -5 };
    assert_eq!(
        native_to_managed(&f.cx(), ArgDescriptor::Int8, v).unwrap(),
        ManagedValue::Int(-5)
    );

    let v = NativeValue::from_i64(i64::MIN);
    assert_eq!(
        native_to_managed(&f.cx(), ArgDescriptor::Int64, v).unwrap(),
        ManagedValue::Int(i64::MIN)
    );
}

#[test]
fn test_int32_overflow_at_boundary() {
    let f = Fixture::new();
    let cx = f.cx();

    let ok = managed_to_native(&cx, ArgDescriptor::Int32, &ManagedValue::Int(i32::MAX as i64));
    assert_eq!(ok.unwrap().bits() as i64, i32::MAX as i64);

    let err = managed_to_native(
        &cx,
        ArgDescriptor::Int32,
        &ManagedValue::Int(i32::MAX as i64 + 1),
    )
    .unwrap_err();
    assert_eq!(err.kind, PyErrorKind::Overflow);
}

#[test]
fn test_negative_to_unsigned_is_overflow() {
    let f = Fixture::new();
    let err = managed_to_native(&f.cx(), ArgDescriptor::UInt64, &ManagedValue::Int(-1)).unwrap_err();
    assert_eq!(err.kind, PyErrorKind::Overflow);
}

#[test]
fn test_float_conversions() {
    let f = Fixture::new();
    let cx = f.cx();

    let v = NativeValue { f32: 1.5 };
    assert_eq!(
        native_to_managed(&cx, ArgDescriptor::Float32, v).unwrap(),
        ManagedValue::Float(1.5)
    );

    let out = managed_to_native(&cx, ArgDescriptor::Float64, &ManagedValue::Float(-2.25)).unwrap();
    assert_eq!(unsafe { out.f64 }, -2.25);
}

#[test]
fn test_char_ptr_null_is_no_value() {
    let f = Fixture::new();
    assert_eq!(
        native_to_managed(&f.cx(), ArgDescriptor::CharPtr, NativeValue::null()).unwrap(),
        ManagedValue::NoValue
    );
    let out = managed_to_native(&f.cx(), ArgDescriptor::CharPtr, &ManagedValue::NoValue).unwrap();
    assert_eq!(out.bits(), 0);
}

#[test]
fn test_utf8_string_round_trip() {
    let f = Fixture::new();
    let cx = f.cx();

    let out = managed_to_native(&cx, ArgDescriptor::CharPtr, &ManagedValue::Str("héllo".into()))
        .unwrap();
    let addr = out.bits() as usize;
    assert_ne!(addr, 0);

    let back = native_to_managed(&cx, ArgDescriptor::CharPtr, out).unwrap();
    assert_eq!(back, ManagedValue::Str("héllo".into()));
    mem::free(addr);
}

#[test]
fn test_ascii_descriptor_rejects_non_ascii() {
    let f = Fixture::new();
    let cx = f.cx();

    let err = managed_to_native(
        &cx,
        ArgDescriptor::AsciiCharPtr,
        &ManagedValue::Str("héllo".into()),
    )
    .unwrap_err();
    assert_eq!(err.kind, PyErrorKind::Value);

    let native = mem::alloc_cstring("héllo").unwrap();
    let err = native_to_managed(&cx, ArgDescriptor::AsciiCharPtr, NativeValue::from_ptr(native))
        .unwrap_err();
    assert_eq!(err.kind, PyErrorKind::UnicodeDecode);
    mem::free(native);
}

#[test]
fn test_wide_string_round_trip() {
    let f = Fixture::new();
    let cx = f.cx();

    let out = managed_to_native(&cx, ArgDescriptor::WCharPtr, &ManagedValue::Str("π≈3".into()))
        .unwrap();
    let addr = out.bits() as usize;
    let back = native_to_managed(&cx, ArgDescriptor::WCharPtr, out).unwrap();
    assert_eq!(back, ManagedValue::Str("π≈3".into()));
    mem::free(addr);
}

#[test]
fn test_borrowed_object_touches_no_counts() {
    let f = Fixture::new();
    let cx = f.cx();
    let obj = f.host.box_int(11);
    let addr = f.bridge.native_pointer_for(&f.host, obj).unwrap();
    f.bridge.produce_reference(&f.host, addr).unwrap();

    let v = native_to_managed(&cx, ArgDescriptor::ObjectBorrowed, NativeValue::from_ptr(addr))
        .unwrap();
    assert_eq!(v, ManagedValue::Object(obj));
    assert_eq!(f.bridge.refcount(addr), 1);

    let out = managed_to_native(&cx, ArgDescriptor::ObjectBorrowed, &v).unwrap();
    assert_eq!(out.bits() as usize, addr);
    assert_eq!(f.bridge.refcount(addr), 1);
}

#[test]
fn test_transfer_argument_consumes_one() {
    let f = Fixture::new();
    let cx = f.cx();
    let obj = f.host.box_int(12);
    let addr = f.bridge.native_pointer_for(&f.host, obj).unwrap();
    f.bridge.produce_reference(&f.host, addr).unwrap();
    f.bridge.produce_reference(&f.host, addr).unwrap();

    native_to_managed(&cx, ArgDescriptor::ObjectTransfer, NativeValue::from_ptr(addr)).unwrap();
    assert_eq!(f.bridge.refcount(addr), 1);
}

#[test]
fn test_new_ref_result_produces_one() {
    let f = Fixture::new();
    let cx = f.cx();
    let obj = f.host.box_int(13);

    let out = managed_to_native(&cx, ArgDescriptor::ObjectNewRef, &ManagedValue::Object(obj))
        .unwrap();
    let addr = out.bits() as usize;
    assert_eq!(f.bridge.refcount(addr), 1);
}

#[test]
fn test_null_object_argument_is_no_value() {
    let f = Fixture::new();
    let v = native_to_managed(&f.cx(), ArgDescriptor::ObjectBorrowed, NativeValue::null()).unwrap();
    assert_eq!(v, ManagedValue::NoValue);
    // And a builtin that requires an object rejects it loudly.
    assert_eq!(v.as_object().unwrap_err().kind, PyErrorKind::System);
}

#[test]
fn test_return_categories_and_sentinels() {
    assert_eq!(ArgDescriptor::Int32.return_category(), ReturnCategory::Int);
    assert_eq!(ArgDescriptor::Float64.return_category(), ReturnCategory::Float);
    assert_eq!(
        ArgDescriptor::ObjectNewRef.return_category(),
        ReturnCategory::Object
    );
    assert_eq!(ArgDescriptor::Void.return_category(), ReturnCategory::Void);

    assert_eq!(ReturnCategory::Int.error_sentinel().bits() as i64, -1);
    assert_eq!(
        unsafe { ReturnCategory::Float.error_sentinel().f64 },
        -1.0
    );
    assert_eq!(ReturnCategory::Object.error_sentinel().bits(), 0);
    assert_eq!(ReturnCategory::Void.error_sentinel().bits(), 0);
}
