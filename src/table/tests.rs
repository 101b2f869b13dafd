//! Call-table construction and completeness tests.

use super::*;
use crate::descriptor::ReturnCategory;

#[test]
fn test_ids_are_dense_and_stable() {
    init();
    for (i, e) in entries().iter().enumerate() {
        assert_eq!(e.id as usize, i, "entry {} has a non-positional id", e.name);
    }
}

#[test]
fn test_name_lookup_round_trips() {
    for e in entries() {
        assert_eq!(fun_id(e.name), Some(e.id));
        assert_eq!(entry(e.id).name, e.name);
    }
    assert_eq!(fun_id("PyNot_AThing"), None);
}

#[test]
fn test_arity_bound_holds() {
    for e in entries() {
        assert!(e.args.len() <= MAX_ARITY, "{} exceeds arity bound", e.name);
    }
}

#[test]
fn test_core_protocol_entries_present() {
    for name in [
        "PyObject_GetItem",
        "PyObject_CallObject",
        "PyIter_Next",
        "PyNumber_Add",
        "PyLong_AsLong",
        "PyUnicode_FromString",
        "PySequence_GetItem",
        "PyList_SetItem",
        "Py_IncRef",
        "Py_DecRef",
        "PyObject_GC_Track",
        "_PyGC_ReplicateReferences",
        "_PyGC_EnsureWeak",
        "PyGILState_Ensure",
    ] {
        assert!(fun_id(name).is_some(), "missing table entry: {name}");
    }
}

#[test]
fn test_slot_accessors_come_in_pairs() {
    for e in entries() {
        if let Some(rest) = e.name.strip_prefix("get_") {
            let setter = fun_id(&format!("set_{rest}"))
                .map(entry)
                .unwrap_or_else(|| panic!("{} has no set_ twin", e.name));
            assert_eq!(e.path, CallPath::NativeShim);
            assert_eq!(setter.args[0], e.args[0], "struct argument mismatch for {rest}");
            assert_eq!(setter.returns.return_category(), ReturnCategory::Void);
        }
    }
}

#[test]
fn test_lock_exemptions_are_only_lock_entries() {
    for e in entries() {
        let exempt = !e.needs_gil;
        let is_lock_entry = e.name.starts_with("PyGILState_");
        assert_eq!(exempt, is_lock_entry, "unexpected lock exemption on {}", e.name);
    }
}

#[test]
fn test_thunk_cache_asks_the_factory_once() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    static CALLS: AtomicUsize = AtomicUsize::new(0);
    struct Counting;
    impl crate::mem::ClosureFactory for Counting {
        fn thunk_for(&self, id: u32) -> Option<usize> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Some(0x9000 + id as usize)
        }
    }

    let id = fun_id("PyObject_Str").unwrap();
    let a = native_thunk(id, &Counting).unwrap();
    let b = native_thunk(id, &Counting).unwrap();
    assert_eq!(a, b);
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);

    assert_eq!(native_thunk(id + 1, &crate::mem::NoClosures), None);
}

#[test]
fn test_unimplemented_entries_resolve() {
    let e = entry(fun_id("PyObject_GetBuffer").unwrap());
    assert_eq!(e.path, CallPath::Unimplemented);
    assert_eq!(e.returns.return_category(), ReturnCategory::Int);
}
