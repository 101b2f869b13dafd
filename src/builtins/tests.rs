//! Builtin implementations exercised directly, below the conversion layer.

use crate::cstruct::{self, StructKind};
use crate::exc::{PyErrorKind, PyResult};
use crate::host::{HostObjectModel, ManagedValue};
use crate::mem;
use crate::runtime::BridgeRuntime;
use crate::table::{self, CallContext};

fn call(rt: &BridgeRuntime, name: &str, args: &[ManagedValue]) -> PyResult<ManagedValue> {
    let entry = table::entry(table::fun_id(name).expect("entry exists"));
    let ctx = CallContext {
        host: rt.host(),
        bridge: rt.bridge(),
        gil: rt.gil(),
        entry,
    };
    (entry.imp)(&ctx, args)
}

#[test]
fn test_dict_item_protocol() {
    let rt = BridgeRuntime::embedded();
    let d = rt.host().new_dict();
    let v = rt.host().box_int(3);

    let r = call(
        &rt,
        "PyObject_SetItem",
        &[
            ManagedValue::Object(d),
            ManagedValue::Str("k".into()),
            ManagedValue::Object(v),
        ],
    )
    .unwrap();
    assert_eq!(r, ManagedValue::Int(0));

    let got = call(
        &rt,
        "PyObject_GetItem",
        &[ManagedValue::Object(d), ManagedValue::Str("k".into())],
    )
    .unwrap();
    assert_eq!(got, ManagedValue::Object(v));
}

#[test]
fn test_call_object_with_null_args_tuple() {
    let heap = std::sync::Arc::new(crate::host::EmbeddedHeap::new());
    let f = heap.new_callable(|h, args| Ok(h.box_int(args.len() as i64)));
    let rt = BridgeRuntime::new(heap, crate::bridge::BridgeMode::Enabled);

    let r = call(
        &rt,
        "PyObject_CallObject",
        &[ManagedValue::Object(f), ManagedValue::NoValue],
    )
    .unwrap();
    let n = r.as_object().unwrap();
    assert_eq!(rt.host().int_value(n).unwrap(), 0);
}

#[test]
fn test_iter_next_exhaustion_is_no_value() {
    let rt = BridgeRuntime::embedded();
    let list = rt.host().new_list(&[rt.host().box_int(1)]);
    let it = call(&rt, "PyObject_GetIter", &[ManagedValue::Object(list)])
        .unwrap()
        .as_object()
        .unwrap();

    assert!(matches!(
        call(&rt, "PyIter_Next", &[ManagedValue::Object(it)]).unwrap(),
        ManagedValue::Object(_)
    ));
    assert_eq!(
        call(&rt, "PyIter_Next", &[ManagedValue::Object(it)]).unwrap(),
        ManagedValue::NoValue
    );
}

#[test]
fn test_number_entries() {
    let rt = BridgeRuntime::embedded();
    let a = rt.host().box_int(6);
    let b = rt.host().box_int(7);
    let r = call(
        &rt,
        "PyNumber_Multiply",
        &[ManagedValue::Object(a), ManagedValue::Object(b)],
    )
    .unwrap()
    .as_object()
    .unwrap();
    assert_eq!(rt.host().int_value(r).unwrap(), 42);

    let boxed = call(&rt, "PyLong_FromLong", &[ManagedValue::Int(-9)])
        .unwrap()
        .as_object()
        .unwrap();
    assert_eq!(
        call(&rt, "PyLong_AsLong", &[ManagedValue::Object(boxed)]).unwrap(),
        ManagedValue::Int(-9)
    );
}

#[test]
fn test_list_new_rejects_negative_size() {
    let rt = BridgeRuntime::embedded();
    let err = call(&rt, "PyList_New", &[ManagedValue::Int(-1)]).unwrap_err();
    assert_eq!(err.kind, PyErrorKind::System);
}

#[test]
fn test_list_new_fills_with_none() {
    let rt = BridgeRuntime::embedded();
    let list = call(&rt, "PyList_New", &[ManagedValue::Int(2)])
        .unwrap()
        .as_object()
        .unwrap();
    assert_eq!(rt.host().length(list).unwrap(), 2);
    let first = rt.host().get_item(list, &ManagedValue::Int(0)).unwrap();
    assert_eq!(first, rt.host().none());
}

#[test]
fn test_slot_accessor_round_trip() {
    let rt = BridgeRuntime::embedded();
    cstruct::init();
    let addr = mem::allocate(StructKind::TypeObject.size()).unwrap();

    call(
        &rt,
        "set_PyTypeObject_tp_basicsize",
        &[ManagedValue::Ptr(addr), ManagedValue::Int(48)],
    )
    .unwrap();
    assert_eq!(
        call(&rt, "get_PyTypeObject_tp_basicsize", &[ManagedValue::Ptr(addr)]).unwrap(),
        ManagedValue::Int(48)
    );

    call(
        &rt,
        "set_PyTypeObject_tp_name",
        &[ManagedValue::Ptr(addr), ManagedValue::Ptr(0x7000)],
    )
    .unwrap();
    assert_eq!(
        call(&rt, "get_PyTypeObject_tp_name", &[ManagedValue::Ptr(addr)]).unwrap(),
        ManagedValue::Ptr(0x7000)
    );

    mem::free(addr);
}

#[test]
fn test_unimplemented_stub_names_the_entry() {
    let rt = BridgeRuntime::embedded();
    let err = call(&rt, "PyCapsule_New", &[]).unwrap_err();
    assert_eq!(err.kind, PyErrorKind::NotImplemented);
    assert!(err.message.contains("PyCapsule_New"));
}
