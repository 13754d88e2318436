//! Patch graph: placed nodes wired outlet to inlet.
//!
//! # Ownership
//!
//! The [`PatchGraph`] owns every node and connection in slot arenas keyed by
//! [`NodeId`] and [`ConnectionId`]. Iolets are not stored objects: an
//! [`IoletRef`] is `(node, direction, index)` resolved against the node's
//! current arity on every access, so removing a node or shrinking its arity
//! can never leave a dangling reference. Connections anchored to an iolet
//! that disappears are removed in the same operation.
//!
//! # Threading
//!
//! The graph is single-owner. All mutation happens serially on whichever
//! thread owns it (the editor's main loop); nothing here is shared with the
//! audio path.
//!
//! # Change notification
//!
//! Presentation layers subscribe with
//! [`on_graph_changed`](PatchGraph::on_graph_changed) and receive a
//! [`GraphEvent`] after each mutation.

pub mod connection;
pub mod events;
pub mod geometry;
pub mod node;
mod patch;

pub use connection::{Connection, ConnectionId};
pub use events::{GraphEvent, SubscriptionId};
pub use geometry::{Point, Rect};
pub use node::{Direction, IoletRef, Node, NodeId, NodeKind};
pub use patch::{ConnectionFault, Element, GraphError, PatchGraph};
