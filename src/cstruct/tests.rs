//! Field registry and accessor tests.

use super::*;
use crate::mem;

#[test]
fn test_registry_covers_declared_fields() {
    init();
    assert!(field(StructKind::ObjectBase, "ob_refcnt").is_some());
    assert!(field(StructKind::ObjectBase, "ob_type").is_some());
    assert!(field(StructKind::TypeObject, "tp_flags").is_some());
    assert!(field(StructKind::ReferentNode, "referent").is_some());
    assert!(field(StructKind::ObjectStub, "managed_id").is_some());
    assert!(field(StructKind::ObjectBase, "tp_flags").is_none());
}

#[test]
fn test_offsets_match_layouts() {
    assert_eq!(field_or_fatal(StructKind::ObjectBase, "ob_refcnt").offset, 0);
    assert_eq!(
        field_or_fatal(StructKind::ObjectBase, "ob_type").offset,
        offset_of!(ObjectBase, ob_type)
    );
    assert_eq!(
        field_or_fatal(StructKind::TypeObject, "tp_dictoffset").offset,
        offset_of!(TypeObjectRepr, tp_dictoffset)
    );
}

#[test]
fn test_scalar_roundtrip() {
    let addr = mem::allocate(StructKind::VarObject.size()).unwrap();
    let fd = field_or_fatal(StructKind::VarObject, "ob_size");

    assert_eq!(read_scalar(addr, fd), 0);
    write_scalar(addr, fd, -42);
    assert_eq!(read_scalar(addr, fd), -42);

    mem::free(addr);
}

#[test]
fn test_pointer_roundtrip() {
    let addr = mem::allocate(StructKind::ReferentNode.size()).unwrap();
    let fd = field_or_fatal(StructKind::ReferentNode, "next");

    write_pointer(addr, fd, 0x1000);
    assert_eq!(read_pointer(addr, fd), 0x1000);

    mem::free(addr);
}

#[test]
fn test_sibling_fields_do_not_clobber() {
    let addr = mem::allocate(StructKind::TypeObject.size()).unwrap();
    let basicsize = field_or_fatal(StructKind::TypeObject, "tp_basicsize");
    let itemsize = field_or_fatal(StructKind::TypeObject, "tp_itemsize");

    write_scalar(addr, basicsize, 64);
    write_scalar(addr, itemsize, 16);
    assert_eq!(read_scalar(addr, basicsize), 64);
    assert_eq!(read_scalar(addr, itemsize), 16);

    mem::free(addr);
}

#[test]
fn test_element_addressing() {
    let base = 0x4000;
    assert_eq!(element_address(StructKind::ReferentNode, base, 0), base);
    assert_eq!(
        element_address(StructKind::ReferentNode, base, 3),
        base + 3 * StructKind::ReferentNode.size()
    );
}

#[test]
fn test_stub_tag_fits_scalar() {
    assert!(STUB_TAG <= i64::MAX as u64);
}
