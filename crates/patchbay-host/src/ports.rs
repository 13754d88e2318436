//! Channel-facing ports of the host-side processing node.
//!
//! Each input channel of the loaded module is an inlet port and each output
//! channel an outlet port. Wires attach ports to other nodes in the host's
//! own graph. When a new module reports different channel counts,
//! [`ProcessingNode::reconcile`] keeps ports both modules share, drops ports
//! only the old module had (along with their wires), and creates fresh,
//! unwired ports for the rest.

use std::fmt;
use std::ops::Range;

use crate::error::HostError;

/// Which side of the processing node a port is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortSide {
    /// Audio input.
    Inlet,
    /// Audio output.
    Outlet,
}

/// A connection from one of our ports to a port on another host node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Wire {
    /// Host node on the other end.
    pub peer: String,
    /// Port index on that node.
    pub peer_port: usize,
}

impl Wire {
    /// Creates a wire to `peer`'s port `peer_port`.
    pub fn new(peer: impl Into<String>, peer_port: usize) -> Self {
        Self {
            peer: peer.into(),
            peer_port,
        }
    }
}

impl fmt::Display for Wire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.peer, self.peer_port)
    }
}

/// One port and its wires.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Port {
    wires: Vec<Wire>,
}

impl Port {
    /// Wires attached to this port.
    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    /// Whether anything is attached.
    pub fn is_connected(&self) -> bool {
        !self.wires.is_empty()
    }
}

/// What a reconcile did to one side of the node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortDelta {
    /// Ports that survived untouched, `0..kept`.
    pub kept: usize,
    /// Indices of newly created ports.
    pub added: Range<usize>,
    /// Indices of released ports.
    pub removed: Range<usize>,
    /// Wires that were attached to released ports.
    pub dropped_wires: Vec<(usize, Wire)>,
}

impl PortDelta {
    /// Whether the port count changed.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Result of [`ProcessingNode::reconcile`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortChanges {
    /// Inlet side.
    pub inlets: PortDelta,
    /// Outlet side.
    pub outlets: PortDelta,
}

impl PortChanges {
    /// Whether neither side changed.
    pub fn is_unchanged(&self) -> bool {
        self.inlets.is_unchanged() && self.outlets.is_unchanged()
    }
}

/// The host-side node a target's module runs in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingNode {
    inlets: Vec<Port>,
    outlets: Vec<Port>,
}

impl ProcessingNode {
    /// A node with no ports, as before the first module loads.
    pub fn new() -> Self {
        Self::default()
    }

    /// A node with the given port counts.
    pub fn with_ports(inlets: usize, outlets: usize) -> Self {
        Self {
            inlets: vec![Port::default(); inlets],
            outlets: vec![Port::default(); outlets],
        }
    }

    /// Inlet ports in index order.
    pub fn inlets(&self) -> &[Port] {
        &self.inlets
    }

    /// Outlet ports in index order.
    pub fn outlets(&self) -> &[Port] {
        &self.outlets
    }

    /// Port by side and index.
    pub fn port(&self, side: PortSide, index: usize) -> Option<&Port> {
        self.side(side).get(index)
    }

    /// Attaches a wire to a port. Attaching the same wire twice is a no-op.
    pub fn connect(&mut self, side: PortSide, index: usize, wire: Wire) -> Result<(), HostError> {
        let count = self.side(side).len();
        let port = self
            .side_mut(side)
            .get_mut(index)
            .ok_or(HostError::PortOutOfRange { index, count })?;
        if !port.wires.contains(&wire) {
            tracing::debug!("ports: {side:?} {index} → {wire}");
            port.wires.push(wire);
        }
        Ok(())
    }

    /// Detaches a wire. Returns whether it was attached.
    pub fn disconnect(&mut self, side: PortSide, index: usize, wire: &Wire) -> bool {
        let Some(port) = self.side_mut(side).get_mut(index) else {
            return false;
        };
        let before = port.wires.len();
        port.wires.retain(|w| w != wire);
        port.wires.len() != before
    }

    /// Resizes both sides to a new module's channel counts.
    pub fn reconcile(&mut self, inputs: usize, outputs: usize) -> PortChanges {
        let changes = PortChanges {
            inlets: resize(&mut self.inlets, inputs),
            outlets: resize(&mut self.outlets, outputs),
        };
        if !changes.is_unchanged() {
            tracing::debug!(
                "ports: reconciled to {inputs} in / {outputs} out, dropped {} wire(s)",
                changes.inlets.dropped_wires.len() + changes.outlets.dropped_wires.len()
            );
        }
        changes
    }

    /// Removes every port, as when the target is torn down.
    pub fn clear(&mut self) -> PortChanges {
        self.reconcile(0, 0)
    }

    fn side(&self, side: PortSide) -> &Vec<Port> {
        match side {
            PortSide::Inlet => &self.inlets,
            PortSide::Outlet => &self.outlets,
        }
    }

    fn side_mut(&mut self, side: PortSide) -> &mut Vec<Port> {
        match side {
            PortSide::Inlet => &mut self.inlets,
            PortSide::Outlet => &mut self.outlets,
        }
    }
}

fn resize(ports: &mut Vec<Port>, count: usize) -> PortDelta {
    let old = ports.len();
    let kept = old.min(count);
    let dropped_wires = ports
        .drain(kept..)
        .enumerate()
        .flat_map(|(offset, port)| port.wires.into_iter().map(move |w| (kept + offset, w)))
        .collect();
    ports.resize_with(count, Port::default);
    PortDelta {
        kept,
        added: kept..count.max(kept),
        removed: kept..old.max(kept),
        dropped_wires,
    }
}
