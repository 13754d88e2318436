//! Error types for compilation.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors reported by the [`CompilePipeline`](crate::CompilePipeline).
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A job for this target is still in flight; retry after its outcome.
    #[error("compile already running for target '{0}'")]
    AlreadyRunning(String),

    /// The generator reported a diagnostic.
    #[error("compile failed for target '{target}': {diagnostic}")]
    CompileFailed {
        /// Target the job was submitted for.
        target: String,
        /// Diagnostic text from the generator.
        diagnostic: String,
    },

    /// The worker thread could not be started.
    #[error("failed to start compile worker: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Failures inside [`HeavyToolchain`](crate::HeavyToolchain).
///
/// Rendered to a diagnostic string at the [`Generator`](crate::Generator)
/// boundary.
#[derive(Debug, Error)]
pub enum ToolchainError {
    /// Reading or writing a scratch file failed.
    #[error("{action} '{path}': {source}")]
    Io {
        /// What was being attempted.
        action: &'static str,
        /// File or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A toolchain program could not be started.
    #[error("failed to run '{program}': {source}")]
    Spawn {
        /// Program name.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A toolchain step exited unsuccessfully.
    #[error("{step} failed ({status}):\n{stderr}")]
    StepFailed {
        /// Which step: `generate`, `compile` or `link`.
        step: &'static str,
        /// Exit status.
        status: ExitStatus,
        /// Captured standard error.
        stderr: String,
    },

    /// The generator ran but produced no sources.
    #[error("generator produced no sources in '{0}'")]
    NoSources(PathBuf),
}

impl ToolchainError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ToolchainError::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
