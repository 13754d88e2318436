//! Atomic publication of module instances to the audio thread.
//!
//! Each target owns one [`HotSwap`]. The control thread loads a module,
//! reconciles the processing node's ports, then replaces the published
//! instance with a single `ArcSwapOption::swap`. The audio thread holds an
//! [`AudioPath`] and only ever sees a fully constructed instance or none.
//!
//! Replaced instances go to a retired list instead of being dropped on the
//! spot, so library unloading never happens on the audio thread. The list is
//! flushed by [`HotSwap::collect_retired`] once the audio thread has let go.

use std::path::Path;
use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::HostError;
use crate::module::{LoadedModule, ModuleLoader};
use crate::ports::{PortChanges, ProcessingNode};

/// The audio thread's handle to a target's published instance.
#[derive(Debug, Clone)]
pub struct AudioPath {
    slot: Arc<ArcSwapOption<LoadedModule>>,
}

impl AudioPath {
    /// Renders one block through the published module.
    ///
    /// Writes silence when nothing is published or the processor is
    /// momentarily locked. Output channels past the module's count are
    /// zeroed. Never blocks.
    pub fn process(&self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) -> bool {
        let guard = self.slot.load();
        match guard.as_ref() {
            Some(module) => {
                let n_out = module.output_channels().min(outputs.len());
                let ran = module.try_process(inputs, &mut outputs[..n_out], frames);
                let silent_from = if ran { n_out } else { 0 };
                silence(&mut outputs[silent_from..], frames);
                ran
            }
            None => {
                silence(outputs, frames);
                false
            }
        }
    }

    /// Channel counts of the published module, if any.
    pub fn channels(&self) -> Option<(usize, usize)> {
        self.slot
            .load()
            .as_ref()
            .map(|m| (m.input_channels(), m.output_channels()))
    }

    /// Whether a module is published.
    pub fn is_loaded(&self) -> bool {
        self.slot.load().is_some()
    }
}

fn silence(outputs: &mut [&mut [f32]], frames: usize) {
    for out in outputs {
        let n = frames.min(out.len());
        out[..n].fill(0.0);
    }
}

/// Load, reconcile and publish for one target.
#[derive(Debug, Default)]
pub struct HotSwap {
    slot: Arc<ArcSwapOption<LoadedModule>>,
    node: ProcessingNode,
    retired: Vec<Arc<LoadedModule>>,
}

impl HotSwap {
    /// Nothing published, no ports.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle for the audio thread.
    pub fn audio_path(&self) -> AudioPath {
        AudioPath {
            slot: Arc::clone(&self.slot),
        }
    }

    /// The processing node and its port wiring.
    pub fn node(&self) -> &ProcessingNode {
        &self.node
    }

    /// Mutable access for wiring ports.
    pub fn node_mut(&mut self) -> &mut ProcessingNode {
        &mut self.node
    }

    /// The published module, if any.
    pub fn current(&self) -> Option<Arc<LoadedModule>> {
        self.slot.load_full()
    }

    /// Loads `path` and publishes it in place of the current instance.
    ///
    /// On failure nothing changes: the old instance stays published and the
    /// ports keep their wiring.
    pub fn swap_in(
        &mut self,
        loader: &dyn ModuleLoader,
        path: &Path,
        entry_symbol: &str,
        sample_rate: f64,
    ) -> Result<PortChanges, HostError> {
        let processor = loader.load(path, entry_symbol, sample_rate)?;
        Ok(self.publish(LoadedModule::new(path, processor)))
    }

    /// Publishes an already constructed module.
    pub fn publish(&mut self, module: LoadedModule) -> PortChanges {
        let changes = self
            .node
            .reconcile(module.input_channels(), module.output_channels());
        tracing::info!(
            "hot-swap: publishing {} ({} in / {} out)",
            module.name(),
            module.input_channels(),
            module.output_channels()
        );
        if let Some(old) = self.slot.swap(Some(Arc::new(module))) {
            self.retired.push(old);
        }
        self.collect_retired();
        changes
    }

    /// Unpublishes the current instance and releases all ports.
    pub fn unload(&mut self) -> PortChanges {
        if let Some(old) = self.slot.swap(None) {
            tracing::info!("hot-swap: unloading {}", old.name());
            self.retired.push(old);
        }
        self.collect_retired();
        self.node.clear()
    }

    /// Drops retired instances the audio thread no longer holds. Returns how
    /// many are still pending.
    pub fn collect_retired(&mut self) -> usize {
        self.retired.retain(|m| {
            let held = Arc::strong_count(m) > 1;
            if !held {
                tracing::debug!("hot-swap: releasing {}", m.name());
            }
            held
        });
        self.retired.len()
    }

    /// Instances waiting to be released.
    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }
}
