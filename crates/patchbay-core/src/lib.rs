//! Patch graph model for patchbay.
//!
//! A patch is a set of placed objects and message boxes wired outlet to
//! inlet. This crate owns that model and its text form:
//!
//! - [`graph`] - the [`PatchGraph`] arena: nodes, iolets, connections,
//!   selection, spatial queries and change events.
//! - [`patch_text`] - the line-oriented `#N canvas` / `#X obj` /
//!   `#X connect` format, parsed into a [`PatchDocument`] and applied to a
//!   graph in a separate step.
//! - [`state`] - base64 wrapping of patch text for embedding in
//!   string-oriented transports and host configuration.
//!
//! Arity comes from a shared [`ObjectRegistry`](patchbay_registry::ObjectRegistry)
//! injected at construction.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use patchbay_core::{IoletRef, PatchGraph, Point};
//! use patchbay_registry::ObjectRegistry;
//!
//! let registry = Arc::new(ObjectRegistry::new());
//! let mut graph = PatchGraph::new(Arc::clone(&registry));
//! let osc = graph.add_node("osc~ 440", Point::new(20, 20));
//! let dac = graph.add_node("dac~", Point::new(20, 80));
//! graph.connect(IoletRef::outlet(osc, 0), IoletRef::inlet(dac, 0)).unwrap();
//!
//! let text = graph.serialize();
//! let mut restored = PatchGraph::new(registry);
//! restored.deserialize(&text).unwrap();
//! assert_eq!(restored.node_count(), 2);
//! assert_eq!(restored.connection_count(), 1);
//! ```

pub mod graph;
pub mod patch_text;
pub mod state;

pub use graph::{
    Connection, ConnectionFault, ConnectionId, Direction, Element, GraphError, GraphEvent,
    IoletRef, Node, NodeId, NodeKind, PatchGraph, Point, Rect, SubscriptionId,
};
pub use patch_text::{
    Canvas, LoadReport, PatchDocument, PatchTextError, SkippedConnection, Statement,
};
pub use state::{decode_state, encode_state};
