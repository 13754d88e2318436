//! Compile pipeline: patch text in, loadable native module out.
//!
//! The [`CompilePipeline`] runs at most one job per target. A job hands the
//! serialized patch to a [`Generator`] on a worker thread and reports a
//! [`CompileOutcome`] on a channel the owner drains at its own pace. A second
//! [`submit`](CompilePipeline::submit) for a target whose job is still in
//! flight is refused with [`PipelineError::AlreadyRunning`]; it is never
//! queued.
//!
//! [`HeavyToolchain`] is the production generator: the Heavy code generator
//! followed by the system C/C++ compiler and linker.
//!
//! # Example
//!
//! ```rust
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use patchbay_compiler::CompilePipeline;
//!
//! let pipeline = CompilePipeline::new(Arc::new(|_text: &str, name: &str| {
//!     Ok::<_, String>(PathBuf::from(format!("/tmp/{name}.so")))
//! }));
//! let ticket = pipeline.submit("#N canvas 63 88 450 300 12;\n", "0").unwrap();
//! let outcome = pipeline.wait_outcome(Duration::from_secs(5)).unwrap();
//! assert_eq!(outcome.module_name, ticket.module_name);
//! assert!(outcome.result.is_ok());
//! ```

mod error;
mod generator;
mod pipeline;
mod toolchain;

pub use error::{PipelineError, ToolchainError};
pub use generator::Generator;
pub use pipeline::{CompileOutcome, CompilePipeline, JobState, JobTicket, c_identifier, module_name};
pub use toolchain::HeavyToolchain;
