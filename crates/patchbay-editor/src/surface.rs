//! One target's editing surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use patchbay_core::{LoadReport, PatchGraph, PatchTextError};
use patchbay_registry::ObjectRegistry;

/// A patch graph being edited for one target, and whether it is shown.
///
/// Any structural change to the graph marks the surface dirty. Loading a
/// state from the host does not.
pub struct Surface {
    graph: PatchGraph,
    visible: bool,
    dirty: Arc<AtomicBool>,
    last_load: Option<LoadReport>,
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("nodes", &self.graph.node_count())
            .field("connections", &self.graph.connection_count())
            .field("visible", &self.visible)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

impl Surface {
    /// An empty, hidden surface.
    pub fn new(registry: Arc<ObjectRegistry>) -> Self {
        let mut graph = PatchGraph::new(registry);
        let dirty = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&dirty);
        graph.on_graph_changed(move |event| {
            if event.is_structural() {
                flag.store(true, Ordering::Release);
            }
        });
        Self {
            graph,
            visible: false,
            dirty,
            last_load: None,
        }
    }

    /// The graph.
    pub fn graph(&self) -> &PatchGraph {
        &self.graph
    }

    /// The graph, for editing.
    pub fn graph_mut(&mut self) -> &mut PatchGraph {
        &mut self.graph
    }

    /// Whether the surface is shown.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Whether the graph changed since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Marks the surface saved.
    pub fn mark_clean(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Replaces the graph with `patch_text` without marking it dirty.
    ///
    /// On a parse error the graph and dirty flag are left as they were.
    pub fn load(&mut self, patch_text: &str) -> Result<&LoadReport, PatchTextError> {
        let was_dirty = self.is_dirty();
        let report = self.graph.deserialize(patch_text)?;
        if !was_dirty {
            self.mark_clean();
        }
        if !report.is_complete() {
            tracing::warn!(
                "editor: loaded with {} skipped connection(s), {} skipped statement(s)",
                report.skipped_connections.len(),
                report.skipped_statements.len()
            );
        }
        Ok(self.last_load.insert(report))
    }

    /// Report of the last [`load`](Self::load).
    pub fn last_load(&self) -> Option<&LoadReport> {
        self.last_load.as_ref()
    }

    /// Current patch text.
    pub fn patch_text(&self) -> String {
        self.graph.serialize()
    }
}
