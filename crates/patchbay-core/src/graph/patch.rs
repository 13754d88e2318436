//! The [`PatchGraph`] arena and its mutation operations.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use patchbay_registry::{Arity, ObjectRegistry};
use thiserror::Error;

use crate::patch_text::{Canvas, LoadReport, PatchDocument, PatchTextError, SkippedConnection, Statement};

use super::connection::{Connection, ConnectionId};
use super::events::{GraphEvent, Listener, SubscriptionId};
use super::geometry::{Point, Rect};
use super::node::{Direction, IoletRef, Node, NodeId, NodeKind};

/// Why a connection request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionFault {
    /// Both endpoints belong to the same node.
    SelfLoop,
    /// The source is not an outlet or the destination is not an inlet.
    WrongDirection,
    /// An endpoint names a node or iolet that no longer exists.
    StaleEndpoint,
    /// The same outlet is already wired to the same inlet.
    Duplicate,
}

impl fmt::Display for ConnectionFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConnectionFault::SelfLoop => "endpoints belong to the same node",
            ConnectionFault::WrongDirection => "expected outlet then inlet",
            ConnectionFault::StaleEndpoint => "endpoint no longer exists",
            ConnectionFault::Duplicate => "connection already exists",
        };
        f.write_str(msg)
    }
}

/// Errors that can occur during graph operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The specified node was not found in the graph.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),
    /// The specified connection was not found in the graph.
    #[error("connection {0} not found")]
    ConnectionNotFound(ConnectionId),
    /// The connection request was refused; the graph is unchanged.
    #[error("invalid connection: {0}")]
    InvalidConnection(ConnectionFault),
}

/// A selectable graph element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Element {
    /// A node.
    Node(NodeId),
    /// A connection.
    Connection(ConnectionId),
}

/// Editable patch: ordered nodes, connections, and a selection.
///
/// Node order is the serialization order and is preserved across a
/// [`serialize`](Self::serialize) / [`deserialize`](Self::deserialize) round
/// trip. Connections iterate in creation order.
///
/// # Usage
///
/// 1. Create with [`new()`](Self::new), passing the shared registry
/// 2. Place nodes: [`add_node()`](Self::add_node), [`add_message()`](Self::add_message)
/// 3. Wire them: [`connect()`](Self::connect)
/// 4. Edit: [`retype_node()`](Self::retype_node), [`move_node()`](Self::move_node),
///    [`remove_node()`](Self::remove_node), [`find_in_area()`](Self::find_in_area)
/// 5. Persist: [`serialize()`](Self::serialize)
pub struct PatchGraph {
    registry: Arc<ObjectRegistry>,
    nodes: Vec<Option<Node>>,
    order: Vec<NodeId>,
    connections: Vec<Option<Connection>>,
    selection: BTreeSet<Element>,
    canvas: Canvas,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u32,
    muted: bool,
}

impl fmt::Debug for PatchGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchGraph")
            .field("nodes", &self.node_count())
            .field("connections", &self.connection_count())
            .field("selection", &self.selection.len())
            .field("canvas", &self.canvas)
            .finish_non_exhaustive()
    }
}

impl PatchGraph {
    /// Creates an empty graph resolving arity through `registry`.
    pub fn new(registry: Arc<ObjectRegistry>) -> Self {
        Self {
            registry,
            nodes: Vec::new(),
            order: Vec::new(),
            connections: Vec::new(),
            selection: BTreeSet::new(),
            canvas: Canvas::default(),
            listeners: Vec::new(),
            next_subscription: 0,
            muted: false,
        }
    }

    /// The registry this graph resolves arity through.
    pub fn registry(&self) -> &Arc<ObjectRegistry> {
        &self.registry
    }

    /// Canvas window geometry carried through patch text.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Replaces the canvas window geometry.
    pub fn set_canvas(&mut self, canvas: Canvas) {
        self.canvas = canvas;
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Places an object box and resolves its arity.
    ///
    /// Runs of whitespace in `text` are stored as single spaces, the form
    /// patch text writes back. Never fails: text that resolves to no known object yields a node
    /// with no iolets and [`is_valid()`](Node::is_valid) false.
    pub fn add_node(&mut self, text: &str, position: Point) -> NodeId {
        let id = self.insert_node(NodeKind::Object, text, position);
        tracing::debug!("graph_add: object {id} '{text}'");
        self.emit(GraphEvent::NodeAdded(id));
        id
    }

    /// Places a message box (always one inlet and one outlet).
    pub fn add_message(&mut self, text: &str, position: Point) -> NodeId {
        let id = self.insert_node(NodeKind::Message, text, position);
        tracing::debug!("graph_add: message {id} '{text}'");
        self.emit(GraphEvent::NodeAdded(id));
        id
    }

    fn insert_node(&mut self, kind: NodeKind, text: &str, position: Point) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let text = canonical_text(text);
        let (arity, valid) = self.resolve(kind, &text);
        let mut node = Node::new(id, kind, text, position);
        node.arity = arity;
        node.valid = valid;
        self.nodes.push(Some(node));
        self.order.push(id);
        id
    }

    fn resolve(&self, kind: NodeKind, text: &str) -> (Arity, bool) {
        match kind {
            NodeKind::Message => (Arity::new(1, 1), true),
            NodeKind::Object => match self.registry.resolve(text) {
                Ok(arity) => (arity, true),
                Err(e) => {
                    tracing::debug!("graph_resolve: {e}");
                    (Arity::default(), false)
                }
            },
        }
    }

    /// Changes a node's text and re-resolves its arity.
    ///
    /// Inlets and outlets grow or shrink from the tail; surviving iolets keep
    /// their indices and their connections. Connections anchored to a removed
    /// iolet are deleted. Does nothing if `text` equals the current text
    /// once whitespace runs are collapsed.
    pub fn retype_node(&mut self, id: NodeId, text: &str) -> Result<(), GraphError> {
        let text = canonical_text(text);
        let node = self.get_node(id)?;
        if node.text == text {
            return Ok(());
        }
        let (arity, valid) = self.resolve(node.kind, &text);

        let stale: Vec<ConnectionId> = node
            .incoming
            .iter()
            .filter(|c| {
                self.connection(**c)
                    .is_some_and(|conn| conn.dest.index >= arity.inlets)
            })
            .chain(node.outgoing.iter().filter(|c| {
                self.connection(**c)
                    .is_some_and(|conn| conn.source.index >= arity.outlets)
            }))
            .copied()
            .collect();

        for conn in stale {
            self.remove_connection(conn);
            self.emit(GraphEvent::Disconnected(conn));
        }

        tracing::debug!("graph_retype: {id} '{text}' ({arity})");
        if let Some(node) = self.nodes[id.0 as usize].as_mut() {
            node.text = text;
            node.arity = arity;
            node.valid = valid;
        }
        self.emit(GraphEvent::NodeRetyped { id, arity, valid });
        Ok(())
    }

    /// Removes a node and every connection where it is source or destination.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let node = self.get_node(id)?;
        let incident: Vec<ConnectionId> = node
            .incoming
            .iter()
            .chain(node.outgoing.iter())
            .copied()
            .collect();

        for conn in incident {
            self.remove_connection(conn);
            self.emit(GraphEvent::Disconnected(conn));
        }

        self.nodes[id.0 as usize] = None;
        self.order.retain(|n| *n != id);
        self.selection.remove(&Element::Node(id));
        tracing::debug!("graph_remove: {id}");
        self.emit(GraphEvent::NodeRemoved(id));
        Ok(())
    }

    /// Moves a node's top-left corner.
    pub fn move_node(&mut self, id: NodeId, position: Point) -> Result<(), GraphError> {
        let node = self
            .nodes
            .get_mut(id.0 as usize)
            .and_then(|n| n.as_mut())
            .ok_or(GraphError::NodeNotFound(id))?;
        node.position = position;
        self.emit(GraphEvent::NodesMoved(vec![id]));
        Ok(())
    }

    /// Shifts every selected node by `(dx, dy)`. Returns how many moved.
    pub fn translate_selection(&mut self, dx: i32, dy: i32) -> usize {
        let ids: Vec<NodeId> = self
            .selection
            .iter()
            .filter_map(|e| match e {
                Element::Node(id) => Some(*id),
                Element::Connection(_) => None,
            })
            .collect();
        for id in &ids {
            if let Some(node) = self.nodes[id.0 as usize].as_mut() {
                node.position = node.position.offset(dx, dy);
            }
        }
        if !ids.is_empty() {
            self.emit(GraphEvent::NodesMoved(ids.clone()));
        }
        ids.len()
    }

    /// Shifts all nodes so no coordinate is negative.
    ///
    /// Returns true if anything moved.
    pub fn normalize_origin(&mut self) -> bool {
        let min_x = self.nodes().map(|n| n.position.x).min().unwrap_or(0);
        let min_y = self.nodes().map(|n| n.position.y).min().unwrap_or(0);
        let dx = (-min_x).max(0);
        let dy = (-min_y).max(0);
        if dx == 0 && dy == 0 {
            return false;
        }
        for node in self.nodes.iter_mut().flatten() {
            node.position = node.position.offset(dx, dy);
        }
        let ids = self.order.clone();
        self.emit(GraphEvent::NodesMoved(ids));
        true
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Wires an outlet to an inlet.
    ///
    /// Fails with [`GraphError::InvalidConnection`] and leaves the graph
    /// untouched if the directions are swapped, an endpoint no longer
    /// exists, both endpoints are on the same node, or the wire already
    /// exists.
    pub fn connect(&mut self, source: IoletRef, dest: IoletRef) -> Result<ConnectionId, GraphError> {
        if source.direction != Direction::Outlet || dest.direction != Direction::Inlet {
            return Err(GraphError::InvalidConnection(ConnectionFault::WrongDirection));
        }
        let live = |r: IoletRef| self.node(r.node).is_some_and(|n| n.has_iolet(r));
        if !live(source) || !live(dest) {
            return Err(GraphError::InvalidConnection(ConnectionFault::StaleEndpoint));
        }
        if source.node == dest.node {
            return Err(GraphError::InvalidConnection(ConnectionFault::SelfLoop));
        }
        if self.find_connection(source, dest).is_some() {
            return Err(GraphError::InvalidConnection(ConnectionFault::Duplicate));
        }

        let id = ConnectionId(self.connections.len() as u32);
        self.connections.push(Some(Connection { source, dest }));
        if let Some(node) = self.nodes[source.node.0 as usize].as_mut() {
            node.outgoing.push(id);
        }
        if let Some(node) = self.nodes[dest.node.0 as usize].as_mut() {
            node.incoming.push(id);
        }

        tracing::debug!("graph_connect: {source} → {dest}");
        self.emit(GraphEvent::Connected(id));
        Ok(id)
    }

    /// Removes a connection.
    pub fn disconnect(&mut self, id: ConnectionId) -> Result<(), GraphError> {
        if self.remove_connection(id).is_none() {
            return Err(GraphError::ConnectionNotFound(id));
        }
        tracing::debug!("graph_disconnect: {id}");
        self.emit(GraphEvent::Disconnected(id));
        Ok(())
    }

    fn remove_connection(&mut self, id: ConnectionId) -> Option<Connection> {
        let conn = self.connections.get_mut(id.0 as usize)?.take()?;
        if let Some(node) = self.nodes[conn.source.node.0 as usize].as_mut() {
            node.outgoing.retain(|c| *c != id);
        }
        if let Some(node) = self.nodes[conn.dest.node.0 as usize].as_mut() {
            node.incoming.retain(|c| *c != id);
        }
        self.selection.remove(&Element::Connection(id));
        Some(conn)
    }

    /// Finds the connection from `source` to `dest`, if wired.
    pub fn find_connection(&self, source: IoletRef, dest: IoletRef) -> Option<ConnectionId> {
        let node = self.node(source.node)?;
        node.outgoing.iter().copied().find(|c| {
            self.connection(*c)
                .is_some_and(|conn| conn.source == source && conn.dest == dest)
        })
    }

    /// Line segment between a connection's iolet centres.
    pub fn connection_segment(&self, id: ConnectionId) -> Option<(Point, Point)> {
        let conn = self.connection(id)?;
        let from = self.node(conn.source.node)?.iolet_center(conn.source)?;
        let to = self.node(conn.dest.node)?.iolet_center(conn.dest)?;
        Some((from, to))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Returns a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize).and_then(|n| n.as_ref())
    }

    fn get_node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.node(id).ok_or(GraphError::NodeNotFound(id))
    }

    /// Iterates nodes in serialization order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.order.iter().filter_map(|id| self.node(*id))
    }

    /// Node ids in serialization order.
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    /// Position of a node in the serialization order.
    pub fn index_of(&self, id: NodeId) -> Option<usize> {
        self.order.iter().position(|n| *n == id)
    }

    /// Node at a serialization index.
    pub fn node_at(&self, index: usize) -> Option<NodeId> {
        self.order.get(index).copied()
    }

    /// Returns a connection by id.
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id.0 as usize).and_then(|c| c.as_ref())
    }

    /// Iterates connections in creation order.
    pub fn connections(&self) -> impl Iterator<Item = (ConnectionId, &Connection)> + '_ {
        self.connections
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (ConnectionId(i as u32), c)))
    }

    /// Connections where `id` is source or destination.
    pub fn connections_of(&self, id: NodeId) -> Vec<ConnectionId> {
        self.node(id)
            .map(|n| n.incoming.iter().chain(n.outgoing.iter()).copied().collect())
            .unwrap_or_default()
    }

    /// Returns the number of nodes.
    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Returns the number of connections.
    pub fn connection_count(&self) -> usize {
        self.connections.iter().flatten().count()
    }

    /// Returns true if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Elements touching `area`: nodes whose bounds intersect it and
    /// connections whose segment crosses it.
    ///
    /// Also updates the selection: matches are selected and, unless
    /// `additive`, everything else is deselected.
    pub fn find_in_area(&mut self, area: Rect, additive: bool) -> Vec<Element> {
        let mut found: Vec<Element> = self
            .nodes()
            .filter(|n| n.bounds().intersects(&area))
            .map(|n| Element::Node(n.id))
            .collect();
        found.extend(
            self.connections()
                .map(|(id, _)| id)
                .filter(|id| {
                    self.connection_segment(*id)
                        .is_some_and(|(a, b)| area.intersects_segment(a, b))
                })
                .map(Element::Connection),
        );

        let before = self.selection.clone();
        if !additive {
            self.selection.clear();
        }
        self.selection.extend(found.iter().copied());
        if self.selection != before {
            self.emit(GraphEvent::SelectionChanged);
        }
        found
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    fn exists(&self, element: Element) -> bool {
        match element {
            Element::Node(id) => self.node(id).is_some(),
            Element::Connection(id) => self.connection(id).is_some(),
        }
    }

    /// Adds an element to the selection. Returns false if it does not exist.
    pub fn select(&mut self, element: Element) -> bool {
        if !self.exists(element) {
            return false;
        }
        if self.selection.insert(element) {
            self.emit(GraphEvent::SelectionChanged);
        }
        true
    }

    /// Removes an element from the selection.
    pub fn deselect(&mut self, element: Element) {
        if self.selection.remove(&element) {
            self.emit(GraphEvent::SelectionChanged);
        }
    }

    /// Clears the selection.
    pub fn deselect_all(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.emit(GraphEvent::SelectionChanged);
        }
    }

    /// Whether an element is selected.
    pub fn is_selected(&self, element: Element) -> bool {
        self.selection.contains(&element)
    }

    /// Iterates selected elements.
    pub fn selection(&self) -> impl Iterator<Item = Element> + '_ {
        self.selection.iter().copied()
    }

    /// Deletes selected connections, then selected nodes (with their
    /// remaining connections). Returns how many elements were selected.
    pub fn remove_selected(&mut self) -> usize {
        let selected: Vec<Element> = self.selection.iter().copied().collect();
        for element in &selected {
            if let Element::Connection(id) = element {
                let _ = self.disconnect(*id);
            }
        }
        for element in &selected {
            if let Element::Node(id) = element {
                let _ = self.remove_node(*id);
            }
        }
        self.selection.clear();
        selected.len()
    }

    /// Removes every node and connection. Ids restart from zero.
    pub fn clear(&mut self) {
        self.reset();
        tracing::debug!("graph_clear");
        self.emit(GraphEvent::Cleared);
    }

    fn reset(&mut self) {
        self.nodes.clear();
        self.order.clear();
        self.connections.clear();
        self.selection.clear();
    }

    // ------------------------------------------------------------------
    // Patch text
    // ------------------------------------------------------------------

    /// Renders the graph as patch text.
    pub fn serialize(&self) -> String {
        PatchDocument::from_graph(self).to_string()
    }

    /// Replaces the whole graph with the patch described by `text`.
    ///
    /// On a parse error the graph is left unchanged.
    pub fn deserialize(&mut self, text: &str) -> Result<LoadReport, PatchTextError> {
        let document = PatchDocument::parse(text)?;
        Ok(self.load_document(&document))
    }

    /// Replaces the whole graph with a parsed document.
    ///
    /// Nodes are created in file order so connection indices line up.
    /// Connections that do not resolve are skipped and listed in the report.
    pub fn load_document(&mut self, document: &PatchDocument) -> LoadReport {
        self.reset();
        self.canvas = document.canvas;
        self.muted = true;

        let mut report = LoadReport {
            skipped_statements: document.skipped.clone(),
            ..LoadReport::default()
        };
        let mut by_index: Vec<Option<NodeId>> = Vec::new();

        for statement in &document.statements {
            match statement {
                Statement::Node {
                    kind,
                    position,
                    text,
                } => {
                    by_index.push(Some(self.insert_node(*kind, text, *position)));
                    report.nodes += 1;
                }
                Statement::Placeholder { .. } => by_index.push(None),
                Statement::Connect {
                    source,
                    outlet,
                    dest,
                    inlet,
                } => {
                    let lookup = |i: usize| by_index.get(i).copied().flatten();
                    let result = match (lookup(*source), lookup(*dest)) {
                        (Some(from), Some(to)) => self
                            .connect(IoletRef::outlet(from, *outlet), IoletRef::inlet(to, *inlet))
                            .map_err(|e| match e {
                                GraphError::InvalidConnection(fault) => fault,
                                _ => ConnectionFault::StaleEndpoint,
                            }),
                        _ => Err(ConnectionFault::StaleEndpoint),
                    };
                    match result {
                        Ok(_) => report.connections += 1,
                        Err(fault) => {
                            tracing::warn!(
                                "patch_load: skipping connect {source} {outlet} {dest} {inlet}: {fault}"
                            );
                            report.skipped_connections.push(SkippedConnection {
                                source: *source,
                                outlet: *outlet,
                                dest: *dest,
                                inlet: *inlet,
                                fault,
                            });
                        }
                    }
                }
            }
        }

        self.muted = false;
        tracing::debug!(
            "patch_load: {} nodes, {} connections, {} skipped",
            report.nodes,
            report.connections,
            report.skipped_connections.len()
        );
        self.emit(GraphEvent::Loaded);
        report
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Registers a listener called after every mutation.
    pub fn on_graph_changed<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&GraphEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: GraphEvent) {
        if self.muted {
            return;
        }
        for (_, listener) in &mut self.listeners {
            listener(&event);
        }
    }
}

/// `text` with whitespace runs collapsed to single spaces and trimmed.
fn canonical_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn graph() -> PatchGraph {
        PatchGraph::new(Arc::new(ObjectRegistry::new()))
    }

    fn at(x: i32, y: i32) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_add_nodes() {
        let mut g = graph();
        let osc = g.add_node("osc~ 440", at(0, 0));
        let bad = g.add_node("nonsense", at(0, 50));
        let msg = g.add_message("; pd dsp 1", at(0, 100));

        assert_eq!(g.node_count(), 3);
        assert_eq!(g.node(osc).unwrap().arity(), Arity::new(2, 1));
        assert!(!g.node(bad).unwrap().is_valid());
        assert_eq!(g.node(bad).unwrap().arity(), Arity::new(0, 0));
        assert_eq!(g.node(msg).unwrap().arity(), Arity::new(1, 1));
        assert_eq!(g.index_of(msg), Some(2));
    }

    #[test]
    fn test_connect_and_count() {
        let mut g = graph();
        let osc = g.add_node("osc~ 440", at(0, 0));
        let dac = g.add_node("dac~", at(0, 50));
        g.connect(IoletRef::outlet(osc, 0), IoletRef::inlet(dac, 0)).unwrap();
        g.connect(IoletRef::outlet(osc, 0), IoletRef::inlet(dac, 1)).unwrap();
        assert_eq!(g.connection_count(), 2);
    }

    #[test]
    fn test_self_loop_rejected_even_between_distinct_iolets() {
        let mut g = graph();
        let add = g.add_node("+", at(0, 0));
        let result = g.connect(IoletRef::outlet(add, 0), IoletRef::inlet(add, 1));
        assert_eq!(result, Err(GraphError::InvalidConnection(ConnectionFault::SelfLoop)));
        assert_eq!(g.connection_count(), 0);
    }

    #[test]
    fn test_swapped_direction_rejected() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        let b = g.add_node("+", at(0, 50));
        let result = g.connect(IoletRef::inlet(b, 0), IoletRef::outlet(a, 0));
        assert_eq!(
            result,
            Err(GraphError::InvalidConnection(ConnectionFault::WrongDirection))
        );
    }

    #[test]
    fn test_stale_endpoint_rejected() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        let b = g.add_node("dac~", at(0, 50));
        let out_of_range = g.connect(IoletRef::outlet(a, 3), IoletRef::inlet(b, 0));
        assert_eq!(
            out_of_range,
            Err(GraphError::InvalidConnection(ConnectionFault::StaleEndpoint))
        );
        g.remove_node(b).unwrap();
        let removed = g.connect(IoletRef::outlet(a, 0), IoletRef::inlet(b, 0));
        assert_eq!(
            removed,
            Err(GraphError::InvalidConnection(ConnectionFault::StaleEndpoint))
        );
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        let b = g.add_node("+", at(0, 50));
        g.connect(IoletRef::outlet(a, 0), IoletRef::inlet(b, 0)).unwrap();
        let again = g.connect(IoletRef::outlet(a, 0), IoletRef::inlet(b, 0));
        assert_eq!(again, Err(GraphError::InvalidConnection(ConnectionFault::Duplicate)));
    }

    #[test]
    fn test_retype_drops_only_removed_inlets() {
        let mut g = graph();
        let src = g.add_node("+", at(0, 0));
        let node = g.add_node("+", at(0, 50));
        let sink = g.add_node("print", at(0, 100));
        let keep_in = g.connect(IoletRef::outlet(src, 0), IoletRef::inlet(node, 0)).unwrap();
        let drop_in = g.connect(IoletRef::outlet(src, 0), IoletRef::inlet(node, 1)).unwrap();
        let keep_out = g.connect(IoletRef::outlet(node, 0), IoletRef::inlet(sink, 0)).unwrap();

        // 2 in / 1 out -> 0 in / 1 out
        g.retype_node(node, "loadbang").unwrap();

        assert!(g.connection(keep_out).is_some());
        assert!(g.connection(keep_in).is_none());
        assert!(g.connection(drop_in).is_none());
        assert_eq!(g.connection_count(), 1);
        assert_eq!(g.node(node).unwrap().arity(), Arity::new(0, 1));
    }

    #[test]
    fn test_retype_grow_keeps_connections() {
        let mut g = graph();
        let a = g.add_node("pack f f", at(0, 0));
        let b = g.add_node("unpack f f", at(0, 50));
        let c = g.connect(IoletRef::outlet(b, 1), IoletRef::inlet(a, 1)).unwrap();
        g.retype_node(a, "pack f f f f").unwrap();
        g.retype_node(b, "unpack f f f").unwrap();
        assert!(g.connection(c).is_some());
        assert_eq!(g.node(a).unwrap().inlet_count(), 4);
    }

    #[test]
    fn test_retype_same_text_is_noop() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        g.on_graph_changed(move |e| sink.lock().unwrap().push(e.clone()));
        g.retype_node(a, "+").unwrap();
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_text_whitespace_collapsed_and_survives_reload() {
        let mut g = graph();
        let osc = g.add_node("  osc~ \t 440 ", at(0, 0));
        let msg = g.add_message("1   2", at(0, 50));
        assert_eq!(g.node(osc).unwrap().text(), "osc~ 440");
        assert_eq!(g.node(msg).unwrap().text(), "1 2");

        let mut back = graph();
        back.deserialize(&g.serialize()).unwrap();
        let texts: Vec<&str> = back.nodes().map(Node::text).collect();
        assert_eq!(texts, ["osc~ 440", "1 2"]);
    }

    #[test]
    fn test_retype_whitespace_only_change_is_noop() {
        let mut g = graph();
        let a = g.add_node("osc~ 440", at(0, 0));
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        g.on_graph_changed(move |e| sink.lock().unwrap().push(e.clone()));
        g.retype_node(a, "osc~   440\n").unwrap();
        assert!(events.lock().unwrap().is_empty());
        assert_eq!(g.node(a).unwrap().text(), "osc~ 440");
    }

    #[test]
    fn test_retype_message_keeps_single_iolets() {
        let mut g = graph();
        let m = g.add_message("bang", at(0, 0));
        g.retype_node(m, "1 2 3").unwrap();
        assert_eq!(g.node(m).unwrap().arity(), Arity::new(1, 1));
        assert_eq!(g.node(m).unwrap().text(), "1 2 3");
    }

    #[test]
    fn test_remove_node_removes_both_directions_only() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        let b = g.add_node("+", at(0, 50));
        let c = g.add_node("+", at(0, 100));
        let d = g.add_node("+", at(100, 0));
        g.connect(IoletRef::outlet(a, 0), IoletRef::inlet(b, 0)).unwrap();
        g.connect(IoletRef::outlet(b, 0), IoletRef::inlet(c, 0)).unwrap();
        let unrelated = g.connect(IoletRef::outlet(a, 0), IoletRef::inlet(d, 0)).unwrap();

        g.remove_node(b).unwrap();

        assert_eq!(g.connection_count(), 1);
        assert!(g.connection(unrelated).is_some());
        assert!(g.connections_of(a).contains(&unrelated));
        assert_eq!(g.node_ids(), &[a, c, d]);
    }

    #[test]
    fn test_remove_nonexistent_node() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        g.remove_node(a).unwrap();
        assert_eq!(g.remove_node(a), Err(GraphError::NodeNotFound(a)));
    }

    #[test]
    fn test_disconnect() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        let b = g.add_node("+", at(0, 50));
        let c = g.connect(IoletRef::outlet(a, 0), IoletRef::inlet(b, 0)).unwrap();
        g.disconnect(c).unwrap();
        assert_eq!(g.disconnect(c), Err(GraphError::ConnectionNotFound(c)));
        assert!(g.connections_of(a).is_empty());
        assert!(g.connections_of(b).is_empty());
    }

    #[test]
    fn test_find_in_area_replaces_selection() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        let b = g.add_node("+", at(200, 200));
        g.select(Element::Node(b));

        let found = g.find_in_area(Rect::new(-5, -5, 20, 20), false);
        assert_eq!(found, vec![Element::Node(a)]);
        assert!(g.is_selected(Element::Node(a)));
        assert!(!g.is_selected(Element::Node(b)));
    }

    #[test]
    fn test_find_in_area_additive() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        let b = g.add_node("+", at(200, 200));
        g.select(Element::Node(b));
        g.find_in_area(Rect::new(-5, -5, 20, 20), true);
        assert!(g.is_selected(Element::Node(a)));
        assert!(g.is_selected(Element::Node(b)));
    }

    #[test]
    fn test_find_in_area_hits_connection_segment() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        let b = g.add_node("+", at(0, 200));
        let c = g.connect(IoletRef::outlet(a, 0), IoletRef::inlet(b, 0)).unwrap();
        // Between the nodes, crossing the vertical wire only.
        let found = g.find_in_area(Rect::new(-10, 90, 30, 10), false);
        assert_eq!(found, vec![Element::Connection(c)]);
    }

    #[test]
    fn test_remove_selected() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        let b = g.add_node("+", at(0, 50));
        let c = g.add_node("+", at(0, 100));
        let ab = g.connect(IoletRef::outlet(a, 0), IoletRef::inlet(b, 0)).unwrap();
        g.connect(IoletRef::outlet(b, 0), IoletRef::inlet(c, 0)).unwrap();
        g.select(Element::Connection(ab));
        g.select(Element::Node(c));

        assert_eq!(g.remove_selected(), 2);
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.connection_count(), 0);
        assert_eq!(g.selection().count(), 0);
    }

    #[test]
    fn test_translate_and_normalize() {
        let mut g = graph();
        let a = g.add_node("+", at(10, 10));
        let b = g.add_node("+", at(50, 50));
        g.select(Element::Node(a));
        assert_eq!(g.translate_selection(-30, -20), 1);
        assert_eq!(g.node(a).unwrap().position(), at(-20, -10));

        assert!(g.normalize_origin());
        assert_eq!(g.node(a).unwrap().position(), at(0, 0));
        assert_eq!(g.node(b).unwrap().position(), at(70, 60));
        assert!(!g.normalize_origin());
    }

    #[test]
    fn test_events_and_unsubscribe() {
        let mut g = graph();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let sub = g.on_graph_changed(move |e| sink.lock().unwrap().push(e.clone()));

        let a = g.add_node("+", at(0, 0));
        let b = g.add_node("+", at(0, 50));
        let c = g.connect(IoletRef::outlet(a, 0), IoletRef::inlet(b, 0)).unwrap();
        g.remove_node(a).unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                GraphEvent::NodeAdded(a),
                GraphEvent::NodeAdded(b),
                GraphEvent::Connected(c),
                GraphEvent::Disconnected(c),
                GraphEvent::NodeRemoved(a),
            ]
        );

        assert!(g.unsubscribe(sub));
        g.add_node("+", at(0, 0));
        assert_eq!(events.lock().unwrap().len(), 5);
        assert!(!g.unsubscribe(sub));
    }

    #[test]
    fn test_load_emits_single_event() {
        let mut g = graph();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        g.on_graph_changed(move |e| sink.lock().unwrap().push(e.clone()));
        g.deserialize("#N canvas 0 0 450 300 12;\n#X obj 0 0 +;\n#X obj 0 50 +;\n#X connect 0 0 1 0;\n")
            .unwrap();
        assert_eq!(*events.lock().unwrap(), vec![GraphEvent::Loaded]);
    }

    #[test]
    fn test_clear() {
        let mut g = graph();
        let a = g.add_node("+", at(0, 0));
        let b = g.add_node("+", at(0, 50));
        g.connect(IoletRef::outlet(a, 0), IoletRef::inlet(b, 0)).unwrap();
        g.clear();
        assert!(g.is_empty());
        assert_eq!(g.connection_count(), 0);
    }
}
