//! Integration tests for link gating, in-port eviction and snapshot loading.

use blockgraph::authority::RecordingAuthority;
use blockgraph::model::{BlockId, LinkEnd, LinkId, PortRef};
use blockgraph::protocol::{BlockKindTag, BlockRecord, LinkRecord, Request, Snapshot};
use blockgraph::store::GraphStore;

/// Helper: blocks A (out y), B (in x), C (in x), D (out y).
fn abcd() -> Snapshot {
    Snapshot {
        blocks: vec![
            BlockRecord::code("A", "y = 1", &[], &["y"]),
            BlockRecord::code("B", "z = x", &["x"], &["z"]),
            BlockRecord::code("C", "w = x", &["x"], &["w"]),
            BlockRecord::code("D", "y = 2", &[], &["y"]),
        ],
        ..Snapshot::default()
    }
}

fn loaded(snapshot: &Snapshot) -> GraphStore {
    let mut store = GraphStore::default();
    store.load_snapshot(snapshot);
    store
}

#[test]
fn test_attach_then_reattach_same_port() {
    let mut store = loaded(&abcd());
    let mut client = RecordingAuthority::new();

    let link = store.new_link();
    store
        .set_source_port(&mut client, &link, PortRef::new("A", "y"))
        .unwrap();
    store
        .set_target_port(&mut client, &link, PortRef::new("B", "x"))
        .unwrap();
    assert_eq!(client.count("link_create"), 1);

    // re-render re-asserts the same endpoint
    store
        .set_target_port(&mut client, &link, PortRef::new("B", "x"))
        .unwrap();
    assert_eq!(client.count("link_create"), 1);
    let attached = store.links_at(&PortRef::new("B", "x"));
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].id, link);
    assert_eq!(store.links_at(&PortRef::new("A", "y")).len(), 1);
}

#[test]
fn test_reattaching_confirmed_link_does_not_recreate() {
    let mut store = loaded(&abcd());
    let mut client = RecordingAuthority::new();

    let link = store
        .connect(&mut client, PortRef::new("A", "y"), PortRef::new("B", "x"))
        .unwrap();
    let confirmed = store
        .apply_link_create(&mut client, &LinkRecord::new("srv-1", ("A", "y"), ("B", "x")))
        .unwrap()
        .unwrap();
    assert_ne!(link, confirmed);

    store
        .set_link_end(&mut client, &confirmed, LinkEnd::Target, PortRef::new("C", "x"))
        .unwrap();
    assert_eq!(client.count("link_create"), 1);
    assert!(store.links_at(&PortRef::new("B", "x")).is_empty());
    assert_eq!(store.links_at(&PortRef::new("C", "x")).len(), 1);
}

#[test]
fn test_in_port_eviction() {
    let mut snapshot = abcd();
    snapshot.links = vec![LinkRecord::new("l-ac", ("A", "y"), ("C", "x"))];
    let mut store = loaded(&snapshot);
    let mut client = RecordingAuthority::new();

    let new_link = store
        .connect(&mut client, PortRef::new("D", "y"), PortRef::new("C", "x"))
        .unwrap();

    assert_eq!(
        client.requests(),
        [
            Request::LinkDelete {
                id: "l-ac".to_string()
            },
            Request::LinkCreate {
                from: PortRef::new("D", "y"),
                to: PortRef::new("C", "x"),
            },
        ]
    );
    let attached = store.links_at(&PortRef::new("C", "x"));
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].id, new_link);
    assert!(store.link(&LinkId::confirmed("l-ac")).is_none());
    assert!(store.links_at(&PortRef::new("A", "y")).is_empty());
}

#[test]
fn test_rejected_connect_leaves_graph_untouched() {
    let mut snapshot = abcd();
    snapshot.links = vec![LinkRecord::new("l-ac", ("A", "y"), ("C", "x"))];
    let mut store = loaded(&snapshot);
    let mut client = RecordingAuthority::new();

    // both ends are inputs
    let err = store
        .connect(&mut client, PortRef::new("C", "x"), PortRef::new("B", "x"))
        .unwrap_err();
    assert!(matches!(err, blockgraph::GraphError::SameDirection(_)));
    assert!(client.requests().is_empty());
    assert_eq!(store.link_count(), 1);
    let attached = store.links_at(&PortRef::new("C", "x"));
    assert_eq!(attached.len(), 1);
    assert_eq!(attached[0].id, LinkId::confirmed("l-ac"));
    assert_eq!(store.links_at(&PortRef::new("A", "y")).len(), 1);
}

#[test]
fn test_connect_into_implicit_occupant_from_either_side() {
    let mut snapshot = abcd();
    snapshot.links = vec![LinkRecord::new("l1", ("A", "y"), ("B", "x")).implicit()];
    let mut store = loaded(&snapshot);
    let mut client = RecordingAuthority::new();

    for (from, to) in [
        (PortRef::new("D", "y"), PortRef::new("B", "x")),
        (PortRef::new("B", "x"), PortRef::new("D", "y")),
    ] {
        let err = store.connect(&mut client, from, to).unwrap_err();
        assert!(matches!(err, blockgraph::GraphError::ImplicitLinkOccupied { .. }));
    }
    assert!(client.requests().is_empty());
    assert_eq!(store.link_count(), 1);
    assert!(store.links_at(&PortRef::new("D", "y")).is_empty());
}

#[test]
fn test_implicit_link_is_undeletable() {
    let mut snapshot = abcd();
    snapshot.links = vec![LinkRecord::new("l1", ("A", "y"), ("B", "x")).implicit()];
    let mut store = loaded(&snapshot);
    let mut client = RecordingAuthority::new();
    let id = LinkId::confirmed("l1");

    let removed = store.remove_link(&mut client, &id).unwrap();
    assert!(!removed);
    assert!(client.requests().is_empty());
    let link = store.link(&id).unwrap();
    assert_eq!(link.source(), Some(&PortRef::new("A", "y")));
    assert_eq!(link.target(), Some(&PortRef::new("B", "x")));
    assert_eq!(store.links_at(&PortRef::new("B", "x")).len(), 1);
}

#[test]
fn test_explicit_link_removal_notifies() {
    let mut snapshot = abcd();
    snapshot.links = vec![LinkRecord::new("l1", ("A", "y"), ("B", "x"))];
    let mut store = loaded(&snapshot);
    let mut client = RecordingAuthority::new();

    assert!(store.remove_link(&mut client, &LinkId::confirmed("l1")).unwrap());
    assert_eq!(client.count("link_delete"), 1);
    assert_eq!(store.link_count(), 0);

    // the echo finds nothing left to do
    assert!(!store.apply_link_delete("l1"));
}

#[test]
fn test_provisional_link_removal_sends_nothing() {
    let mut store = loaded(&abcd());
    let mut client = RecordingAuthority::new();
    let link = store.new_link();
    store
        .set_source_port(&mut client, &link, PortRef::new("A", "y"))
        .unwrap();
    assert!(store.remove_link(&mut client, &link).unwrap());
    assert!(client.requests().is_empty());
    assert!(store.links_at(&PortRef::new("A", "y")).is_empty());
}

#[test]
fn test_snapshot_skips_unresolved_links() {
    let mut snapshot = abcd();
    snapshot.links = vec![
        LinkRecord::new("ok", ("A", "y"), ("B", "x")),
        LinkRecord::new("missing-block", ("Z", "y"), ("B", "x")),
        LinkRecord::new("missing-port", ("A", "nope"), ("C", "x")),
        // reversed on the wire
        LinkRecord::new("reversed", ("C", "x"), ("D", "y")),
        LinkRecord::new("same-dir", ("A", "y"), ("D", "y")),
    ];
    let mut store = GraphStore::default();
    let report = store.load_snapshot(&snapshot);

    assert_eq!(report.blocks, 4);
    assert_eq!(report.links, 2);
    assert_eq!(report.skipped_links, 3);
    let reversed = store.link(&LinkId::confirmed("reversed")).unwrap();
    assert_eq!(reversed.source(), Some(&PortRef::new("D", "y")));
    assert_eq!(reversed.target(), Some(&PortRef::new("C", "x")));
}

#[test]
fn test_snapshot_replaces_previous_graph() {
    let mut snapshot = abcd();
    snapshot.links = vec![LinkRecord::new("l1", ("A", "y"), ("B", "x"))];
    let mut store = loaded(&snapshot);

    let mut next = Snapshot::default();
    next.blocks.push(BlockRecord::new("v", BlockKindTag::Variable));
    store.load_snapshot(&next);

    assert_eq!(store.block_count(), 1);
    assert_eq!(store.link_count(), 0);
    let v = store.block(&BlockId::from("v")).unwrap();
    assert_eq!(v.out_ports().count(), 1);
    assert_eq!(v.ports()[0].name(), "value");
}

#[test]
fn test_layer_chain_from_snapshot() {
    let json = r#"{
        "blocks": [
            {"id": "dense_1", "type": "layer", "layer_type": "Dense", "shape": [null, 32]},
            {"id": "dense_2", "type": "layer", "layer_type": "Dense", "shape": [null, 10]}
        ],
        "links": [
            {
                "id": "c1",
                "fromId": "dense_1", "fromPort": "output",
                "toId": "dense_2", "toPort": "input",
                "implicit": true
            }
        ]
    }"#;
    let snapshot = Snapshot::from_json(json).unwrap();
    let store = loaded(&snapshot);
    let link = store.link(&LinkId::confirmed("c1")).unwrap();
    assert!(link.is_implicit());
    assert_eq!(store.links_at(&PortRef::new("dense_2", "input")).len(), 1);
}
