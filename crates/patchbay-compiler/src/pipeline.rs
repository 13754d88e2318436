//! Single-flight compile jobs, one in flight per target.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;

use crate::error::PipelineError;
use crate::generator::Generator;

/// Observable state of a target's compile job.
///
/// Success and failure are not states a caller can observe here: the job
/// returns to [`Idle`](JobState::Idle) before its [`CompileOutcome`] is
/// published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// No job in flight; [`submit`](CompilePipeline::submit) will start one.
    Idle,
    /// A job is in flight; submit is refused.
    Running,
}

/// Returned by a successful [`submit`](CompilePipeline::submit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    /// Target the job belongs to.
    pub target: String,
    /// Per-target job counter, starting at 1.
    pub generation: u64,
    /// Module name handed to the generator.
    pub module_name: String,
}

/// Result of a finished job.
#[derive(Debug)]
pub struct CompileOutcome {
    /// Target the job belongs to.
    pub target: String,
    /// Per-target job counter.
    pub generation: u64,
    /// Module name handed to the generator.
    pub module_name: String,
    /// Built module path, or [`PipelineError::CompileFailed`].
    pub result: Result<PathBuf, PipelineError>,
    /// Wall time spent in the generator.
    pub elapsed: Duration,
}

/// Module name for a target's n-th compile in the pipeline tagged `tag`.
///
/// Every compile gets a fresh name so a reloaded module never aliases a
/// library a process already has open, and two processes compiling the same
/// target never share a scratch directory or output file.
pub fn module_name(target: &str, tag: &str, generation: u64) -> String {
    format!("{}_{tag}_{generation}", c_identifier(target))
}

/// Rewrites `s` as a C identifier: other characters become `_`, and a
/// leading non-letter gets a `t` prefix.
pub fn c_identifier(s: &str) -> String {
    let mut name: String = s
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        name.insert(0, 't');
    }
    name
}

/// Process id, pipeline instance and clock bits, in lowercase hex.
fn pipeline_tag() -> String {
    static INSTANCES: AtomicU32 = AtomicU32::new(0);
    let instance = INSTANCES.fetch_add(1, Ordering::Relaxed);
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    format!("{:x}{instance:x}{:05x}", std::process::id(), stamp & 0xf_ffff)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[derive(Default)]
struct Jobs {
    running: HashMap<String, u64>,
    generations: HashMap<String, u64>,
}

/// Runs compile jobs on worker threads, at most one per target.
pub struct CompilePipeline {
    generator: Arc<dyn Generator>,
    tag: String,
    jobs: Arc<Mutex<Jobs>>,
    outcome_tx: Sender<CompileOutcome>,
    outcome_rx: Receiver<CompileOutcome>,
}

impl std::fmt::Debug for CompilePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilePipeline")
            .field("tag", &self.tag)
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl CompilePipeline {
    /// Creates a pipeline around a generator.
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        let (outcome_tx, outcome_rx) = unbounded();
        Self {
            generator,
            tag: pipeline_tag(),
            jobs: Arc::new(Mutex::new(Jobs::default())),
            outcome_tx,
            outcome_rx,
        }
    }

    /// Starts compiling `patch_text` for `target`.
    ///
    /// Returns immediately. Fails with [`PipelineError::AlreadyRunning`] if a
    /// job for `target` is in flight; that job is not affected.
    pub fn submit(&self, patch_text: impl Into<String>, target: &str) -> Result<JobTicket, PipelineError> {
        let ticket = {
            let mut jobs = self.jobs.lock();
            if jobs.running.contains_key(target) {
                tracing::warn!("compile: target '{target}' already running");
                return Err(PipelineError::AlreadyRunning(target.to_string()));
            }
            let generation = jobs.generations.entry(target.to_string()).or_insert(0);
            *generation += 1;
            let generation = *generation;
            jobs.running.insert(target.to_string(), generation);
            JobTicket {
                target: target.to_string(),
                generation,
                module_name: module_name(target, &self.tag, generation),
            }
        };

        let patch_text = patch_text.into();
        let generator = Arc::clone(&self.generator);
        let jobs = Arc::clone(&self.jobs);
        let tx = self.outcome_tx.clone();
        let job = ticket.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("compile-{}", ticket.module_name))
            .spawn(move || {
                tracing::info!("compile: {} started", job.module_name);
                let start = Instant::now();
                let result = catch_unwind(AssertUnwindSafe(|| {
                    generator.compile(&patch_text, &job.module_name)
                }))
                .unwrap_or_else(|payload| {
                    Err(format!("generator panicked: {}", panic_message(payload.as_ref())))
                });
                let elapsed = start.elapsed();

                jobs.lock().running.remove(&job.target);

                let result = match result {
                    Ok(path) => {
                        tracing::info!(
                            "compile: {} built {} in {:.2}s",
                            job.module_name,
                            path.display(),
                            elapsed.as_secs_f64()
                        );
                        Ok(path)
                    }
                    Err(diagnostic) => {
                        tracing::error!("compile: {} failed: {diagnostic}", job.module_name);
                        Err(PipelineError::CompileFailed {
                            target: job.target.clone(),
                            diagnostic,
                        })
                    }
                };
                let _ = tx.send(CompileOutcome {
                    target: job.target,
                    generation: job.generation,
                    module_name: job.module_name,
                    result,
                    elapsed,
                });
            });

        if let Err(e) = spawned {
            self.jobs.lock().running.remove(target);
            return Err(PipelineError::Spawn(e));
        }
        Ok(ticket)
    }

    /// Tag that makes this pipeline's module names unique.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Current state for a target.
    pub fn state(&self, target: &str) -> JobState {
        if self.jobs.lock().running.contains_key(target) {
            JobState::Running
        } else {
            JobState::Idle
        }
    }

    /// Number of jobs in flight across all targets.
    pub fn in_flight(&self) -> usize {
        self.jobs.lock().running.len()
    }

    /// Takes the next finished outcome without blocking.
    pub fn try_outcome(&self) -> Option<CompileOutcome> {
        self.outcome_rx.try_recv().ok()
    }

    /// Waits up to `timeout` for the next finished outcome.
    pub fn wait_outcome(&self, timeout: Duration) -> Option<CompileOutcome> {
        self.outcome_rx.recv_timeout(timeout).ok()
    }

    /// Receiver for use in `select!` loops.
    pub fn outcomes(&self) -> &Receiver<CompileOutcome> {
        &self.outcome_rx
    }
}
