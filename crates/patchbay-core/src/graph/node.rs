//! Node and iolet types.
//!
//! A [`Node`] is either an object box, whose iolets come from the registry,
//! or a message box, which always has one inlet and one outlet. The
//! [`NodeKind`] tag selects the behavior; there is no per-kind type.

use std::fmt;

use patchbay_registry::Arity;

use super::connection::ConnectionId;
use super::geometry::{Point, Rect};

/// Unique identifier for a node in a patch graph.
///
/// Node IDs are assigned sequentially and never reused within a graph
/// instance. A node's position in the serialization order is separate; see
/// [`PatchGraph::index_of`](super::PatchGraph::index_of).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// What a node is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// An object box; arity is resolved from the type text.
    Object,
    /// A message box; fixed at one inlet and one outlet.
    Message,
}

impl NodeKind {
    /// Keyword used for this kind in patch text (`obj` / `msg`).
    pub const fn keyword(self) -> &'static str {
        match self {
            NodeKind::Object => "obj",
            NodeKind::Message => "msg",
        }
    }
}

/// Which side of a node an iolet sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Receives connections. Drawn on the top edge.
    Inlet,
    /// Sends connections. Drawn on the bottom edge.
    Outlet,
}

/// Reference to one iolet of one node.
///
/// `index` is the ordinal among iolets of the same direction, so outlet 0
/// and inlet 0 of a node are distinct iolets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IoletRef {
    /// Owning node.
    pub node: NodeId,
    /// Inlet or outlet.
    pub direction: Direction,
    /// Ordinal within `direction`.
    pub index: usize,
}

impl IoletRef {
    /// Inlet `index` of `node`.
    pub const fn inlet(node: NodeId, index: usize) -> Self {
        Self {
            node,
            direction: Direction::Inlet,
            index,
        }
    }

    /// Outlet `index` of `node`.
    pub const fn outlet(node: NodeId, index: usize) -> Self {
        Self {
            node,
            direction: Direction::Outlet,
            index,
        }
    }
}

impl fmt::Display for IoletRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.direction {
            Direction::Inlet => "in",
            Direction::Outlet => "out",
        };
        write!(f, "{}:{side}{}", self.node.0, self.index)
    }
}

/// Node height in canvas units.
pub const NODE_HEIGHT: i32 = 20;
/// Minimum node width in canvas units.
pub const MIN_NODE_WIDTH: i32 = 35;
/// Iolet width.
pub const IOLET_WIDTH: i32 = 8;
/// Iolet height.
pub const IOLET_HEIGHT: i32 = 3;

/// A placed node.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) text: String,
    pub(crate) position: Point,
    pub(crate) arity: Arity,
    pub(crate) valid: bool,
    /// Connections arriving at this node's inlets.
    pub(crate) incoming: Vec<ConnectionId>,
    /// Connections leaving this node's outlets.
    pub(crate) outgoing: Vec<ConnectionId>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind, text: String, position: Point) -> Self {
        Self {
            id,
            kind,
            text,
            position,
            arity: Arity::default(),
            valid: false,
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    /// Node identifier.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Object or message.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Raw type text (object) or message content (message).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Top-left corner on the canvas.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Current inlet/outlet counts.
    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Number of inlets.
    pub fn inlet_count(&self) -> usize {
        self.arity.inlets
    }

    /// Number of outlets.
    pub fn outlet_count(&self) -> usize {
        self.arity.outlets
    }

    /// False when the type text resolved to no known object.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Iterates this node's inlets in order.
    pub fn inlets(&self) -> impl Iterator<Item = IoletRef> + '_ {
        (0..self.arity.inlets).map(|i| IoletRef::inlet(self.id, i))
    }

    /// Iterates this node's outlets in order.
    pub fn outlets(&self) -> impl Iterator<Item = IoletRef> + '_ {
        (0..self.arity.outlets).map(|i| IoletRef::outlet(self.id, i))
    }

    /// Whether `iolet` currently exists on this node.
    pub fn has_iolet(&self, iolet: IoletRef) -> bool {
        iolet.node == self.id
            && match iolet.direction {
                Direction::Inlet => iolet.index < self.arity.inlets,
                Direction::Outlet => iolet.index < self.arity.outlets,
            }
    }

    /// Width grows with the text: seven units per character plus padding.
    pub fn width(&self) -> i32 {
        let chars = self.text.chars().count() as i32;
        (chars * 7 + 6).max(MIN_NODE_WIDTH)
    }

    /// Bounding box on the canvas.
    pub fn bounds(&self) -> Rect {
        Rect::new(self.position.x, self.position.y, self.width(), NODE_HEIGHT)
    }

    /// Bounding box of one iolet, or `None` if it does not exist.
    ///
    /// Iolets are spread evenly across the edge with the first flush left and
    /// the last flush right. A lone iolet sits at the left edge.
    pub fn iolet_bounds(&self, iolet: IoletRef) -> Option<Rect> {
        if !self.has_iolet(iolet) {
            return None;
        }
        let (count, y) = match iolet.direction {
            Direction::Inlet => (self.arity.inlets, self.position.y),
            Direction::Outlet => (
                self.arity.outlets,
                self.position.y + NODE_HEIGHT - IOLET_HEIGHT,
            ),
        };
        let span = self.width() - IOLET_WIDTH;
        let x = if count > 1 {
            self.position.x + span * iolet.index as i32 / (count as i32 - 1)
        } else {
            self.position.x
        };
        Some(Rect::new(x, y, IOLET_WIDTH, IOLET_HEIGHT))
    }

    /// Centre of an iolet; connection segments run between these.
    pub fn iolet_center(&self, iolet: IoletRef) -> Option<Point> {
        self.iolet_bounds(iolet).map(|r| r.center())
    }
}
