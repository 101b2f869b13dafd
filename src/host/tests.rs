//! Embedded heap behavior tests.

use super::*;
use crate::exc::PyErrorKind;

fn heap() -> EmbeddedHeap {
    EmbeddedHeap::new()
}

#[test]
fn test_none_singleton() {
    let h = heap();
    assert_eq!(h.none(), h.none());
    assert!(!h.truth(h.none()).unwrap());
}

#[test]
fn test_bool_interning() {
    let h = heap();
    assert_eq!(h.box_bool(true), h.box_bool(true));
    assert_ne!(h.box_bool(true), h.box_bool(false));
}

#[test]
fn test_list_item_access() {
    let h = heap();
    let a = h.box_int(10);
    let b = h.box_int(20);
    let list = h.new_list(&[a, b]);

    assert_eq!(h.get_item(list, &ManagedValue::Int(0)).unwrap(), a);
    assert_eq!(h.get_item(list, &ManagedValue::Int(-1)).unwrap(), b);

    let err = h.get_item(list, &ManagedValue::Int(2)).unwrap_err();
    assert_eq!(err.kind, PyErrorKind::Index);
}

#[test]
fn test_tuple_rejects_assignment() {
    let h = heap();
    let t = h.new_tuple(&[h.box_int(1)]);
    let err = h
        .set_item(t, &ManagedValue::Int(0), h.box_int(2))
        .unwrap_err();
    assert_eq!(err.kind, PyErrorKind::Type);
}

#[test]
fn test_dict_primitive_key_identity() {
    let h = heap();
    let d = h.new_dict();
    h.set_item(d, &ManagedValue::Int(7), h.box_str("seven")).unwrap();

    // A boxed key with the same primitive value must hit the same slot.
    let boxed = ManagedValue::Object(h.box_int(7));
    let hit = h.get_item(d, &boxed).unwrap();
    assert_eq!(h.str_of(hit).unwrap(), "seven");

    let err = h.get_item(d, &ManagedValue::Int(8)).unwrap_err();
    assert_eq!(err.kind, PyErrorKind::Key);
}

#[test]
fn test_namespace_attrs() {
    let h = heap();
    let ns = h.new_namespace("config");
    h.set_attr(ns, "limit", h.box_int(512)).unwrap();
    let v = h.get_attr(ns, "limit").unwrap();
    assert_eq!(h.int_value(v).unwrap(), 512);

    let err = h.get_attr(ns, "missing").unwrap_err();
    assert_eq!(err.kind, PyErrorKind::Attribute);
}

#[test]
fn test_number_binary_int_float_coercion() {
    let h = heap();
    let r = h
        .number_binary(BinaryOp::Add, h.box_int(2), h.box_float(0.5))
        .unwrap();
    assert_eq!(h.float_value(r).unwrap(), 2.5);
}

#[test]
fn test_floor_div_and_mod_follow_divisor_sign() {
    let h = heap();
    let q = h
        .number_binary(BinaryOp::FloorDiv, h.box_int(-7), h.box_int(3))
        .unwrap();
    assert_eq!(h.int_value(q).unwrap(), -3);

    let r = h
        .number_binary(BinaryOp::Rem, h.box_int(-7), h.box_int(3))
        .unwrap();
    assert_eq!(h.int_value(r).unwrap(), 2);
}

#[test]
fn test_zero_division() {
    let h = heap();
    let err = h
        .number_binary(BinaryOp::TrueDiv, h.box_int(1), h.box_int(0))
        .unwrap_err();
    assert_eq!(err.kind, PyErrorKind::ZeroDivision);
}

#[test]
fn test_int_overflow_detected() {
    let h = heap();
    let err = h
        .number_binary(BinaryOp::Add, h.box_int(i64::MAX), h.box_int(1))
        .unwrap_err();
    assert_eq!(err.kind, PyErrorKind::Overflow);
}

#[test]
fn test_str_concat_via_add() {
    let h = heap();
    let r = h
        .number_binary(BinaryOp::Add, h.box_str("ab"), h.box_str("cd"))
        .unwrap();
    assert_eq!(h.str_of(r).unwrap(), "abcd");
}

#[test]
fn test_iteration_protocol() {
    let h = heap();
    let list = h.new_list(&[h.box_int(1), h.box_int(2)]);
    let it = h.iterate(list).unwrap();

    assert!(h.iterate_next(it).unwrap().is_some());
    assert!(h.iterate_next(it).unwrap().is_some());
    assert!(h.iterate_next(it).unwrap().is_none());
    // Exhaustion is sticky.
    assert!(h.iterate_next(it).unwrap().is_none());
}

#[test]
fn test_is_instance_by_kind() {
    let h = heap();
    let v = h.box_int(3);
    let int_ty = h.type_object("int");
    let str_ty = h.type_object("str");
    assert!(h.is_instance(v, int_ty).unwrap());
    assert!(!h.is_instance(v, str_ty).unwrap());
}

#[test]
fn test_contains() {
    let h = heap();
    let list = h.new_list(&[h.box_int(1), h.box_str("x")]);
    assert!(h.contains(list, &ManagedValue::Int(1)).unwrap());
    assert!(h.contains(list, &ManagedValue::Str("x".into())).unwrap());
    assert!(!h.contains(list, &ManagedValue::Int(9)).unwrap());
}

#[test]
fn test_callable_dispatch() {
    let h = heap();
    let f = h.new_callable(|h, args| {
        let total: i64 = args.iter().map(|r| h.int_value(*r).unwrap_or(0)).sum();
        Ok(h.box_int(total))
    });
    let r = h.call(f, &[h.box_int(3), h.box_int(4)]).unwrap();
    assert_eq!(h.int_value(r).unwrap(), 7);

    let err = h.call(h.box_int(1), &[]).unwrap_err();
    assert_eq!(err.kind, PyErrorKind::Type);
}

#[test]
fn test_native_adoption() {
    let h = heap();
    let proxy = h.adopt_native(0xdead_0000);
    assert_eq!(h.native_address(proxy), Some(0xdead_0000));
    assert_eq!(h.native_address(h.box_int(1)), None);
}

#[test]
fn test_pin_counting() {
    let h = heap();
    let obj = h.box_int(42);
    assert!(!h.is_pinned(obj));
    h.retain(obj);
    h.retain(obj);
    h.release(obj);
    assert!(h.is_pinned(obj));
    h.release(obj);
    assert!(!h.is_pinned(obj));
}

#[test]
fn test_repr_nesting() {
    let h = heap();
    let inner = h.new_tuple(&[h.box_int(1), h.box_str("a")]);
    let list = h.new_list(&[inner, h.none()]);
    assert_eq!(h.repr_of(list).unwrap(), "[(1, 'a'), None]");
}
