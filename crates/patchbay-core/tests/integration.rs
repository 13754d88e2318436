//! Integration tests for patchbay-core: graph editing through patch text.

use std::sync::Arc;

use patchbay_core::{
    ConnectionFault, Element, GraphError, IoletRef, PatchGraph, Point, Rect, decode_state,
    encode_state,
};
use patchbay_registry::{Arity, ObjectRegistry};

fn registry() -> Arc<ObjectRegistry> {
    Arc::new(ObjectRegistry::new())
}

#[test]
fn osc_to_dac_survives_clear_and_reload() {
    let mut graph = PatchGraph::new(registry());
    let osc = graph.add_node("osc~ 440", Point::new(30, 30));
    let dac = graph.add_node("dac~", Point::new(30, 90));
    graph.connect(IoletRef::outlet(osc, 0), IoletRef::inlet(dac, 0)).unwrap();

    let text = graph.serialize();
    graph.clear();
    assert!(graph.is_empty());

    graph.deserialize(&text).unwrap();
    assert_eq!(graph.node_count(), 2);
    assert_eq!(graph.connection_count(), 1);

    let types: Vec<_> = graph.nodes().map(|n| n.text().to_string()).collect();
    assert_eq!(types, vec!["osc~ 440", "dac~"]);
    let (_, conn) = graph.connections().next().unwrap();
    assert_eq!(graph.index_of(conn.source.node), Some(0));
    assert_eq!(conn.source.index, 0);
    assert_eq!(graph.index_of(conn.dest.node), Some(1));
    assert_eq!(conn.dest.index, 0);
}

#[test]
fn state_encoding_carries_a_patch() {
    let mut graph = PatchGraph::new(registry());
    let a = graph.add_node("metro 500", Point::new(0, 0));
    let b = graph.add_message("bang", Point::new(0, 40));
    graph.connect(IoletRef::outlet(a, 0), IoletRef::inlet(b, 0)).unwrap();

    let state = encode_state(&graph.serialize());
    let mut restored = PatchGraph::new(registry());
    restored.deserialize(&decode_state(&state).unwrap()).unwrap();
    assert_eq!(restored.serialize(), graph.serialize());
}

#[test]
fn unknown_object_does_not_block_rest_of_patch() {
    let mut graph = PatchGraph::new(registry());
    let report = graph
        .deserialize(
            "#N canvas 63 88 450 300 12;\n\
             #X obj 10 10 osc~ 220;\n\
             #X obj 10 50 frobnicate~;\n\
             #X obj 10 90 dac~;\n\
             #X connect 0 0 1 0;\n\
             #X connect 0 0 2 0;\n\
             #X connect 0 0 2 1;\n",
        )
        .unwrap();
    assert_eq!(report.nodes, 3);
    assert_eq!(report.connections, 2);
    assert_eq!(report.skipped_connections.len(), 1);
    let unknown = graph.node_at(1).unwrap();
    assert!(!graph.node(unknown).unwrap().is_valid());
}

#[test]
fn retyping_then_reconnecting() {
    let mut graph = PatchGraph::new(registry());
    let sel = graph.add_node("sel 1 2 3", Point::new(0, 0));
    let sinks: Vec<_> = (0..4)
        .map(|i| graph.add_node("print", Point::new(i * 60, 80)))
        .collect();
    for (i, sink) in sinks.iter().enumerate() {
        graph.connect(IoletRef::outlet(sel, i), IoletRef::inlet(*sink, 0)).unwrap();
    }
    assert_eq!(graph.connection_count(), 4);

    graph.retype_node(sel, "sel 1").unwrap();
    assert_eq!(graph.node(sel).unwrap().arity(), Arity::new(1, 2));
    assert_eq!(graph.connection_count(), 2);

    let err = graph
        .connect(IoletRef::outlet(sel, 3), IoletRef::inlet(sinks[3], 0))
        .unwrap_err();
    assert_eq!(err, GraphError::InvalidConnection(ConnectionFault::StaleEndpoint));
}

#[test]
fn rubber_band_then_delete() {
    let mut graph = PatchGraph::new(registry());
    let keep = graph.add_node("loadbang", Point::new(0, 0));
    let gone = graph.add_node("print", Point::new(300, 300));
    graph.connect(IoletRef::outlet(keep, 0), IoletRef::inlet(gone, 0)).unwrap();

    let hit = graph.find_in_area(Rect::from_corners(Point::new(400, 400), Point::new(290, 290)), false);
    assert!(hit.contains(&Element::Node(gone)));
    graph.remove_selected();

    assert_eq!(graph.node_ids(), &[keep]);
    assert_eq!(graph.connection_count(), 0);
}
