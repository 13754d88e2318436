//! Change notifications emitted by [`PatchGraph`](super::PatchGraph).

use patchbay_registry::Arity;

use super::connection::ConnectionId;
use super::node::NodeId;

/// Handle returned by [`PatchGraph::on_graph_changed`](super::PatchGraph::on_graph_changed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u32);

/// A single mutation of the graph.
///
/// Cascading removals are reported individually: removing a node emits a
/// [`Disconnected`](GraphEvent::Disconnected) for each incident connection
/// before the [`NodeRemoved`](GraphEvent::NodeRemoved).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphEvent {
    /// A node was placed.
    NodeAdded(NodeId),
    /// A node was deleted.
    NodeRemoved(NodeId),
    /// A node's text changed and its arity was re-resolved.
    NodeRetyped {
        /// The retyped node.
        id: NodeId,
        /// Arity after the change.
        arity: Arity,
        /// Whether the new text resolved.
        valid: bool,
    },
    /// One or more nodes moved.
    NodesMoved(Vec<NodeId>),
    /// A connection was created.
    Connected(ConnectionId),
    /// A connection was removed.
    Disconnected(ConnectionId),
    /// The selection set changed.
    SelectionChanged,
    /// The whole graph was replaced from patch text.
    Loaded,
    /// Every node and connection was removed.
    Cleared,
}

impl GraphEvent {
    /// Whether the event changes what the patch would serialize to.
    pub fn is_structural(&self) -> bool {
        !matches!(self, GraphEvent::SelectionChanged)
    }
}

pub(crate) type Listener = Box<dyn FnMut(&GraphEvent) + Send>;
