//! Processing instances and the loaders that construct them.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::HostError;

/// A constructed processing instance.
///
/// `process` receives up to [`input_channels`](Self::input_channels) input
/// slices and up to [`output_channels`](Self::output_channels) output slices,
/// each at least `frames` long. Missing inputs read as silence; missing
/// outputs are discarded.
pub trait Processor: Send {
    /// Number of input channels the instance consumes.
    fn input_channels(&self) -> usize;

    /// Number of output channels the instance produces.
    fn output_channels(&self) -> usize;

    /// Renders one block.
    fn process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize);
}

/// Opens a compiled module and constructs an instance from it.
pub trait ModuleLoader: Send + Sync {
    /// Loads `path`, resolves `entry_symbol` and constructs an instance at
    /// `sample_rate`.
    fn load(
        &self,
        path: &Path,
        entry_symbol: &str,
        sample_rate: f64,
    ) -> Result<Box<dyn Processor>, HostError>;
}

/// A module instance ready for publication to the audio path.
///
/// Channel counts are read once at construction and never change, so the
/// audio thread can size its buffers without touching the processor lock.
pub struct LoadedModule {
    path: PathBuf,
    name: String,
    input_channels: usize,
    output_channels: usize,
    processor: Mutex<Box<dyn Processor>>,
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("path", &self.path)
            .field("name", &self.name)
            .field("input_channels", &self.input_channels)
            .field("output_channels", &self.output_channels)
            .finish_non_exhaustive()
    }
}

impl LoadedModule {
    /// Wraps a constructed processor.
    pub fn new(path: impl Into<PathBuf>, processor: Box<dyn Processor>) -> Self {
        let path = path.into();
        let name = module_stem(&path);
        Self {
            input_channels: processor.input_channels(),
            output_channels: processor.output_channels(),
            path,
            name,
            processor: Mutex::new(processor),
        }
    }

    /// Library path the module was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Module name (the library file stem).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input channel count.
    pub fn input_channels(&self) -> usize {
        self.input_channels
    }

    /// Output channel count.
    pub fn output_channels(&self) -> usize {
        self.output_channels
    }

    /// Renders one block unless another thread holds the processor.
    ///
    /// Returns `false` without blocking when the lock is contended.
    pub fn try_process(&self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) -> bool {
        match self.processor.try_lock() {
            Some(mut processor) => {
                processor.process(inputs, outputs, frames);
                true
            }
            None => false,
        }
    }
}

/// File stem of a module path, which is also its module name.
pub fn module_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
