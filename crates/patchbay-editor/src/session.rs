//! The editor process's side of the conversation with the host.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::select;
use patchbay_compiler::{CompileOutcome, CompilePipeline, Generator, JobTicket, PipelineError};
use patchbay_config::EditorSettings;
use patchbay_ipc::{Endpoint, Message, Selector, TransportError};
use patchbay_registry::ObjectRegistry;

use crate::error::EditorError;
use crate::surface::Surface;

/// What one [`EditorSession::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorTick {
    /// Host messages handled.
    pub messages: usize,
    /// `Load` messages sent for finished compiles.
    pub loads_sent: usize,
    /// `Error` messages sent for failed compiles.
    pub errors_sent: usize,
    /// Surfaces autosaved.
    pub autosaved: usize,
}

/// Serves the host: keeps a [`Surface`] per target, applies host messages,
/// and reports saves and builds back.
pub struct EditorSession {
    registry: Arc<ObjectRegistry>,
    endpoint: Endpoint,
    pipeline: CompilePipeline,
    settings: EditorSettings,
    surfaces: BTreeMap<String, Surface>,
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("surfaces", &self.surfaces)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl EditorSession {
    /// Creates a session with no surfaces.
    pub fn new(
        endpoint: Endpoint,
        registry: Arc<ObjectRegistry>,
        generator: Arc<dyn Generator>,
        settings: EditorSettings,
    ) -> Self {
        Self {
            registry,
            endpoint,
            pipeline: CompilePipeline::new(generator),
            settings,
            surfaces: BTreeMap::new(),
        }
    }

    /// Surface for a target.
    pub fn surface(&self, target: &str) -> Option<&Surface> {
        self.surfaces.get(target)
    }

    /// Mutable surface for a target.
    pub fn surface_mut(&mut self, target: &str) -> Option<&mut Surface> {
        self.surfaces.get_mut(target)
    }

    /// Every surface, by target id.
    pub fn surfaces(&self) -> impl Iterator<Item = (&str, &Surface)> {
        self.surfaces.iter().map(|(id, s)| (id.as_str(), s))
    }

    /// The compile pipeline.
    pub fn pipeline(&self) -> &CompilePipeline {
        &self.pipeline
    }

    /// Applies one host message.
    ///
    /// `Open` and `LoadState` create the surface if the target is new.
    /// `Close` hides it. `LoadState` replaces the graph without compiling.
    pub fn handle(&mut self, msg: &Message) -> Result<(), EditorError> {
        match msg.selector {
            Selector::Open => {
                tracing::info!("editor: open '{}'", msg.target);
                self.ensure_surface(&msg.target).set_visible(true);
            }
            Selector::Close => match self.surfaces.get_mut(&msg.target) {
                Some(surface) => {
                    tracing::info!("editor: close '{}'", msg.target);
                    surface.set_visible(false);
                }
                None => tracing::debug!("editor: close for unseen target '{}'", msg.target),
            },
            Selector::LoadState => {
                let patch_text = msg.patch_text()?;
                let report = self.ensure_surface(&msg.target).load(&patch_text)?;
                tracing::info!(
                    "editor: loaded '{}' ({} nodes, {} connections)",
                    msg.target,
                    report.nodes,
                    report.connections
                );
            }
            Selector::SaveState | Selector::Load | Selector::Error => {
                return Err(TransportError::Protocol(format!(
                    "editor cannot receive {}",
                    msg.selector
                ))
                .into());
            }
        }
        Ok(())
    }

    /// Sends the target's patch to the host as its saved state and marks the
    /// surface clean.
    pub fn save_state(&mut self, target: &str) -> Result<(), EditorError> {
        let surface = self
            .surfaces
            .get(target)
            .ok_or_else(|| EditorError::UnknownTarget(target.to_string()))?;
        self.endpoint
            .send(&Message::save_state(target, &surface.patch_text()))?;
        surface.mark_clean();
        tracing::info!("editor: saved '{target}'");
        Ok(())
    }

    /// Starts compiling the target's patch. The result goes to the host on a
    /// later [`tick`](Self::tick).
    pub fn recompile(&mut self, target: &str) -> Result<JobTicket, EditorError> {
        let surface = self
            .surfaces
            .get(target)
            .ok_or_else(|| EditorError::UnknownTarget(target.to_string()))?;
        Ok(self.pipeline.submit(surface.patch_text(), target)?)
    }

    /// Drains host messages and finished compiles, then autosaves dirty
    /// surfaces if enabled. Never blocks.
    ///
    /// Fails with `TransportLost` once the host is gone and nothing is left
    /// to process.
    pub fn tick(&mut self) -> Result<EditorTick, EditorError> {
        let mut report = EditorTick::default();

        for msg in self.endpoint.drain() {
            report.messages += 1;
            if let Err(e) = self.handle(&msg) {
                tracing::error!("editor: {msg}: {e}");
            }
        }

        while let Some(outcome) = self.pipeline.try_outcome() {
            self.report_outcome(outcome, &mut report)?;
        }

        if self.settings.autosave {
            report.autosaved = self.autosave()?;
        }

        if self.endpoint.is_lost() && self.endpoint.incoming().is_empty() {
            return Err(TransportError::TransportLost.into());
        }
        Ok(report)
    }

    /// Ticks on the configured poll interval, waking early for host messages
    /// and finished compiles, until the host goes away.
    pub fn run(&mut self) -> Result<(), EditorError> {
        let interval = Duration::from_millis(self.settings.poll_interval_ms.max(1));
        let ticker = crossbeam_channel::tick(interval);
        tracing::info!("editor: serving host, polling every {interval:?}");
        loop {
            let woken_by = select! {
                recv(ticker) -> _ => None,
                recv(self.endpoint.incoming()) -> msg => msg.ok(),
            };
            if let Some(msg) = woken_by {
                if let Err(e) = self.handle(&msg) {
                    tracing::error!("editor: {msg}: {e}");
                }
            }
            match self.tick() {
                Ok(_) => {}
                Err(e) if e.is_transport_lost() => {
                    tracing::info!("editor: host gone, exiting");
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn ensure_surface(&mut self, target: &str) -> &mut Surface {
        let registry = &self.registry;
        self.surfaces.entry(target.to_string()).or_insert_with(|| {
            tracing::debug!("editor: new surface for '{target}'");
            Surface::new(Arc::clone(registry))
        })
    }

    fn report_outcome(&self, outcome: CompileOutcome, report: &mut EditorTick) -> Result<(), EditorError> {
        match outcome.result {
            Ok(path) => {
                self.endpoint.send(&Message::load(&outcome.target, &path))?;
                report.loads_sent += 1;
            }
            Err(PipelineError::CompileFailed { target, diagnostic }) => {
                self.endpoint.send(&Message::error(target, diagnostic))?;
                report.errors_sent += 1;
            }
            Err(e) => {
                self.endpoint
                    .send(&Message::error(&outcome.target, e.to_string()))?;
                report.errors_sent += 1;
            }
        }
        Ok(())
    }

    /// Saves and recompiles every dirty surface. A surface whose compile is
    /// still running stays dirty and is retried next tick.
    fn autosave(&mut self) -> Result<usize, EditorError> {
        let dirty: Vec<String> = self
            .surfaces
            .iter()
            .filter(|(_, s)| s.is_dirty())
            .map(|(id, _)| id.clone())
            .collect();

        let mut saved = 0;
        for target in dirty {
            match self.recompile(&target) {
                Ok(_) => {}
                Err(EditorError::Pipeline(PipelineError::AlreadyRunning(_))) => continue,
                Err(e) => return Err(e),
            }
            self.save_state(&target)?;
            saved += 1;
        }
        Ok(saved)
    }
}
