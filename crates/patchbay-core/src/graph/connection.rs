//! Connection types.

use std::fmt;

use super::node::IoletRef;

/// Unique identifier for a connection in a patch graph.
///
/// Assigned sequentially and never reused within a graph instance, so
/// ascending id order is creation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub(crate) u32);

impl ConnectionId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

/// A wire from one node's outlet to another node's inlet.
///
/// Holds references only; it never keeps either node alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Connection {
    /// Source iolet, always an outlet.
    pub source: IoletRef,
    /// Destination iolet, always an inlet.
    pub dest: IoletRef,
}
