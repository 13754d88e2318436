//! The external code generation contract.

use std::path::PathBuf;

/// Turns patch text into a loadable native module.
///
/// Implementations run on a pipeline worker thread and may block for as long
/// as the toolchain takes. The error side is a human-readable diagnostic.
pub trait Generator: Send + Sync {
    /// Generates and builds `patch_text` as a module called `name`.
    ///
    /// Returns the path of the built module.
    fn compile(&self, patch_text: &str, name: &str) -> Result<PathBuf, String>;
}

impl<F> Generator for F
where
    F: Fn(&str, &str) -> Result<PathBuf, String> + Send + Sync,
{
    fn compile(&self, patch_text: &str, name: &str) -> Result<PathBuf, String> {
        self(patch_text, name)
    }
}
