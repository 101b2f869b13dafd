//! Bridge lifecycle, ownership, and collector-cooperation tests.

use super::*;
use crate::exc::PyErrorKind;
use crate::host::EmbeddedHeap;

fn setup() -> (EmbeddedHeap, ReferenceBridge) {
    crate::cstruct::init();
    (EmbeddedHeap::new(), ReferenceBridge::new(BridgeMode::Enabled))
}

fn native_object() -> usize {
    mem::allocate(StructKind::ObjectBase.size()).unwrap()
}

#[test]
fn test_resolve_is_idempotent() {
    let (host, bridge) = setup();
    let addr = native_object();

    let a = bridge.resolve_native(&host, addr).unwrap();
    let b = bridge.resolve_native(&host, addr).unwrap();
    assert_eq!(a, b);
    assert_eq!(bridge.state_of(addr), BridgeState::NativeResidentStrong);
    assert_eq!(bridge.refcount(addr), 1);

    bridge.consume_reference(&host, addr).unwrap();
    mem::free(addr);
}

#[test]
fn test_resolve_null_is_error() {
    let (host, bridge) = setup();
    let err = bridge.resolve_native(&host, 0).unwrap_err();
    assert_eq!(err.kind, PyErrorKind::System);
}

#[test]
fn test_stub_allocated_lazily_and_stable() {
    let (host, bridge) = setup();
    let obj = host.box_int(99);
    assert_eq!(bridge.state_of_managed(obj), BridgeState::ManagedResidentNoStub);

    let addr = bridge.native_pointer_for(&host, obj).unwrap();
    assert_ne!(addr, 0);
    assert_eq!(bridge.state_of(addr), BridgeState::ManagedResidentWithStub);
    assert!(host.is_pinned(obj));

    // The address is stable across repeated escapes.
    assert_eq!(bridge.native_pointer_for(&host, obj).unwrap(), addr);

    // And resolving the stub address comes back to the same object.
    assert_eq!(bridge.resolve_native(&host, addr).unwrap(), obj);
}

#[test]
fn test_reference_round_trip_is_net_zero() {
    let (host, bridge) = setup();
    let obj = host.box_int(7);

    let addr = bridge.native_pointer_for(&host, obj).unwrap();
    bridge.produce_reference(&host, addr).unwrap();
    assert_eq!(bridge.refcount(addr), 1);

    bridge.consume_reference(&host, addr).unwrap();
    assert_eq!(bridge.refcount(addr), 0);
    assert_eq!(bridge.state_of(addr), BridgeState::Unregistered);
    assert_eq!(mem::allocation_size(addr), None);
    assert!(!host.is_pinned(obj));
}

#[test]
fn test_owned_round_trip_of_native_struct_is_net_zero() {
    let (host, bridge) = setup();
    let addr = native_object();

    // An owned reference comes in and is consumed; the association
    // dissolves at zero.
    let proxy = bridge.resolve_native(&host, addr).unwrap();
    assert_eq!(bridge.refcount(addr), 1);
    bridge.consume_reference(&host, addr).unwrap();
    assert_eq!(bridge.state_of(addr), BridgeState::Unregistered);

    // The same object then goes back out as a new reference. The caller
    // owns exactly the one reference handed to it, nothing more.
    let back = bridge.native_pointer_for(&host, proxy).unwrap();
    assert_eq!(back, addr);
    bridge.produce_reference(&host, back).unwrap();
    assert_eq!(bridge.refcount(back), 1);

    bridge.consume_reference(&host, back).unwrap();
    assert_eq!(bridge.state_of(back), BridgeState::Unregistered);
    assert!(!host.is_pinned(proxy));

    mem::free(addr);
}

#[test]
fn test_consume_unknown_pointer_is_error() {
    let (host, bridge) = setup();
    let err = bridge.consume_reference(&host, 0xdead_beef).unwrap_err();
    assert_eq!(err.kind, PyErrorKind::System);
}

#[test]
fn test_header_mirrors_side_table() {
    let (host, bridge) = setup();
    let obj = host.box_int(1);
    let addr = bridge.native_pointer_for(&host, obj).unwrap();

    bridge.produce_reference(&host, addr).unwrap();
    bridge.produce_reference(&host, addr).unwrap();

    let fd = cstruct::field_or_fatal(StructKind::ObjectBase, "ob_refcnt");
    assert_eq!(cstruct::read_scalar(addr, fd), 2);

    bridge.consume_reference(&host, addr).unwrap();
    assert_eq!(cstruct::read_scalar(addr, fd), 1);
    bridge.consume_reference(&host, addr).unwrap();
}

#[test]
fn test_ensure_weak_unpins() {
    let (host, bridge) = setup();
    let addr = native_object();
    let proxy = bridge.resolve_native(&host, addr).unwrap();
    assert!(host.is_pinned(proxy));

    bridge.ensure_weak(&host, &[addr]);
    assert_eq!(bridge.state_of(addr), BridgeState::NativeResidentWeak);
    assert!(!host.is_pinned(proxy));

    // Idempotent: a second pass changes nothing.
    bridge.ensure_weak(&host, &[addr]);
    assert!(!host.is_pinned(proxy));

    bridge.consume_reference(&host, addr).unwrap();
    mem::free(addr);
}

#[test]
fn test_ensure_weak_over_candidates() {
    let (host, bridge) = setup();
    let a = native_object();
    let b = native_object();
    let pa = bridge.resolve_native(&host, a).unwrap();
    let pb = bridge.resolve_native(&host, b).unwrap();

    bridge.track(a);
    bridge.track(b);
    assert_eq!(bridge.tracked_candidates(), 2);

    bridge.ensure_weak_candidates(&host);
    assert!(!host.is_pinned(pa));
    assert!(!host.is_pinned(pb));

    bridge.untrack(a);
    assert_eq!(bridge.tracked_candidates(), 1);

    bridge.consume_reference(&host, a).unwrap();
    bridge.consume_reference(&host, b).unwrap();
    mem::free(a);
    mem::free(b);
}

#[test]
fn test_replication_is_idempotent() {
    let (host, bridge) = setup();
    let owner = native_object();
    let b = native_object();
    let c = native_object();

    // Two-node list: owner -> {b, c}.
    let node2 = mem::allocate(StructKind::ReferentNode.size()).unwrap();
    let node1 = mem::allocate(StructKind::ReferentNode.size()).unwrap();
    let next = cstruct::field_or_fatal(StructKind::ReferentNode, "next");
    let referent = cstruct::field_or_fatal(StructKind::ReferentNode, "referent");
    cstruct::write_pointer(node1, referent, b);
    cstruct::write_pointer(node1, next, node2);
    cstruct::write_pointer(node2, referent, c);

    let n = bridge.replicate_references(&host, owner, node1).unwrap();
    assert_eq!(n, 2);
    let first = bridge.replicated_of(owner);
    assert_eq!(first.len(), 2);

    // Replaying the same list leaves the same image set.
    bridge.replicate_references(&host, owner, node1).unwrap();
    assert_eq!(bridge.replicated_of(owner), first);

    mem::free(node1);
    mem::free(node2);
}

#[test]
fn test_replicated_referents_survive_ensure_weak() {
    let (host, bridge) = setup();
    let owner = native_object();
    let b = native_object();

    let node = mem::allocate(StructKind::ReferentNode.size()).unwrap();
    let referent = cstruct::field_or_fatal(StructKind::ReferentNode, "referent");
    cstruct::write_pointer(node, referent, b);

    bridge.replicate_references(&host, owner, node).unwrap();
    let image = bridge.replicated_of(owner)[0];
    assert!(host.is_pinned(image));

    // Downgrading b's own handle must not make it collectible while a
    // strong owner's replicated set still names it.
    bridge.ensure_weak(&host, &[b]);
    assert_eq!(bridge.state_of(b), BridgeState::NativeResidentWeak);
    assert!(host.is_pinned(image));

    // Dissolving the owner drops the replicated pins, and only then does
    // the referent become collectible.
    bridge.consume_reference(&host, owner).unwrap();
    assert!(!host.is_pinned(image));

    bridge.consume_reference(&host, b).unwrap();
    mem::free(node);
    mem::free(owner);
    mem::free(b);
}

#[test]
fn test_replication_update_releases_displaced_pins() {
    let (host, bridge) = setup();
    let owner = native_object();
    let b = native_object();

    let node = mem::allocate(StructKind::ReferentNode.size()).unwrap();
    let referent = cstruct::field_or_fatal(StructKind::ReferentNode, "referent");
    cstruct::write_pointer(node, referent, b);

    bridge.replicate_references(&host, owner, node).unwrap();
    let image = bridge.replicated_of(owner)[0];
    bridge.ensure_weak(&host, &[b]);
    assert!(host.is_pinned(image));

    // Replicating an empty list removes the edge; the old pin goes with it.
    bridge.replicate_references(&host, owner, 0).unwrap();
    assert!(bridge.replicated_of(owner).is_empty());
    assert!(!host.is_pinned(image));

    bridge.consume_reference(&host, owner).unwrap();
    bridge.consume_reference(&host, b).unwrap();
    mem::free(node);
    mem::free(owner);
    mem::free(b);
}

#[test]
fn test_replication_rejects_null_referent() {
    let (host, bridge) = setup();
    let owner = native_object();
    let node = mem::allocate(StructKind::ReferentNode.size()).unwrap();
    // referent left null

    let err = bridge.replicate_references(&host, owner, node).unwrap_err();
    assert_eq!(err.kind, PyErrorKind::System);

    mem::free(node);
}

#[test]
fn test_empty_replication_list() {
    let (host, bridge) = setup();
    let owner = native_object();
    assert_eq!(bridge.replicate_references(&host, owner, 0).unwrap(), 0);
    assert!(bridge.replicated_of(owner).is_empty());
}

#[test]
fn test_queue_drain_dissolves_collected_wrappers() {
    let (host, bridge) = setup();
    let obj = host.box_int(5);
    let addr = bridge.native_pointer_for(&host, obj).unwrap();
    bridge.ensure_weak(&host, &[addr]);

    bridge.enqueue_collected(obj);
    assert_eq!(bridge.pending_collections(), 1);

    let removed = bridge.drain_reference_queue(&host);
    assert_eq!(removed, 1);
    assert_eq!(bridge.state_of(addr), BridgeState::Unregistered);
    assert_eq!(mem::allocation_size(addr), None);
}

#[test]
fn test_queue_drain_skips_already_dissolved() {
    let (host, bridge) = setup();
    let obj = host.box_int(5);
    let addr = bridge.native_pointer_for(&host, obj).unwrap();
    bridge.produce_reference(&host, addr).unwrap();
    bridge.consume_reference(&host, addr).unwrap();

    bridge.enqueue_collected(obj);
    assert_eq!(bridge.drain_reference_queue(&host), 0);
}

#[test]
fn test_disabled_mode_is_neutral() {
    let host = EmbeddedHeap::new();
    let bridge = ReferenceBridge::new(BridgeMode::Disabled);

    assert_eq!(bridge.resolve_native(&host, 0x1234).unwrap(), host.none());
    assert_eq!(bridge.native_pointer_for(&host, host.box_int(1)).unwrap(), 0);
    bridge.produce_reference(&host, 0x1234).unwrap();
    bridge.consume_reference(&host, 0x1234).unwrap();
    assert_eq!(bridge.refcount(0x1234), 0);
    assert_eq!(bridge.live_wrappers(), 0);
}
