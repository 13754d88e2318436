//! The host-side target table.
//!
//! A [`Host`] owns every processing node (target) in the audio engine, the
//! link to the editor process, the compile pipeline used to restore saved
//! states, and the session file those states persist to. All methods run on
//! the host's control thread; the audio thread only sees each target's
//! [`AudioPath`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use patchbay_compiler::{CompilePipeline, Generator, PipelineError};
use patchbay_config::{Session, Settings};
use patchbay_core::decode_state;
use patchbay_ipc::{EditorProcess, Endpoint, Message, Selector, TransportError};

use crate::error::HostError;
use crate::module::{LoadedModule, ModuleLoader, module_stem};
use crate::ports::{PortChanges, ProcessingNode};
use crate::swap::{AudioPath, HotSwap};

const EDITOR_GRACE: Duration = Duration::from_millis(500);

/// How the host reaches its editor.
#[derive(Debug)]
pub enum EditorLink {
    /// A child process the host started.
    Spawned(EditorProcess),
    /// An endpoint wired up by the caller.
    Attached(Endpoint),
}

impl EditorLink {
    fn endpoint(&self) -> Option<&Endpoint> {
        match self {
            EditorLink::Spawned(process) => process.endpoint(),
            EditorLink::Attached(endpoint) => Some(endpoint),
        }
    }
}

/// One processing node and its editor-facing state.
#[derive(Debug)]
pub struct Target {
    id: String,
    swap: HotSwap,
    state: Option<String>,
    open: bool,
    // Generation of the last local compile submitted.
    submitted: u64,
    // Local compiles up to this generation are outdated.
    stale_through: u64,
}

impl Target {
    fn new(id: String) -> Self {
        Self {
            id,
            swap: HotSwap::new(),
            state: None,
            open: false,
            submitted: 0,
            stale_through: 0,
        }
    }

    /// Target id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Last saved state (base64 patch text).
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    /// Whether the editor surface was opened and not closed since.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Port wiring.
    pub fn node(&self) -> &ProcessingNode {
        self.swap.node()
    }

    /// Port wiring, for connecting to other host nodes.
    pub fn node_mut(&mut self) -> &mut ProcessingNode {
        self.swap.node_mut()
    }

    /// The published module.
    pub fn module(&self) -> Option<Arc<LoadedModule>> {
        self.swap.current()
    }

    /// Audio-thread handle.
    pub fn audio_path(&self) -> AudioPath {
        self.swap.audio_path()
    }
}

/// What one [`Host::tick`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Editor messages handled.
    pub messages: usize,
    /// Modules published.
    pub swaps: usize,
    /// Compile or load failures surfaced to the log.
    pub failures: usize,
    /// Finished compiles dropped because a newer module was already live.
    pub outdated: usize,
    /// The editor link went away during this tick.
    pub transport_lost: bool,
}

/// The host's target table.
pub struct Host {
    settings: Settings,
    loader: Arc<dyn ModuleLoader>,
    pipeline: CompilePipeline,
    link: Option<EditorLink>,
    targets: BTreeMap<String, Target>,
    next_id: u64,
    session: Session,
    session_path: Option<PathBuf>,
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .field("link", &self.link)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl Host {
    /// Creates a host with no targets and no editor.
    pub fn new(settings: Settings, loader: Arc<dyn ModuleLoader>, generator: Arc<dyn Generator>) -> Self {
        Self {
            settings,
            loader,
            pipeline: CompilePipeline::new(generator),
            link: None,
            targets: BTreeMap::new(),
            next_id: 0,
            session: Session::new(),
            session_path: None,
        }
    }

    /// Persists saved states to `path`, loading whatever it already holds.
    pub fn with_session(mut self, path: impl Into<PathBuf>) -> Result<Self, HostError> {
        let path = path.into();
        self.session = Session::load_or_default(&path)?;
        tracing::info!(
            "host: session {} ({} saved target(s))",
            path.display(),
            self.session.len()
        );
        self.session_path = Some(path);
        Ok(self)
    }

    /// Settings in effect.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The compile pipeline, for `select!` on its outcomes.
    pub fn pipeline(&self) -> &CompilePipeline {
        &self.pipeline
    }

    /// Saved states.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Uses an existing endpoint as the editor link.
    pub fn attach(&mut self, endpoint: Endpoint) {
        self.link = Some(EditorLink::Attached(endpoint));
    }

    /// Starts the editor process and links to it.
    ///
    /// Runs `host.editor_executable`, or this executable, with `args`.
    pub fn spawn_editor(&mut self, args: &[String]) -> Result<(), HostError> {
        let executable = match &self.settings.host.editor_executable {
            Some(path) => path.clone(),
            None => std::env::current_exe().map_err(TransportError::from)?,
        };
        let process = patchbay_ipc::spawn_editor(&executable, args)?;
        self.link = Some(EditorLink::Spawned(process));
        Ok(())
    }

    /// Whether an editor is linked.
    pub fn has_editor(&self) -> bool {
        self.link.is_some()
    }

    /// The editor endpoint, for `select!` on incoming messages.
    pub fn editor_endpoint(&self) -> Option<&Endpoint> {
        self.link.as_ref().and_then(EditorLink::endpoint)
    }

    /// Adds a target under a fresh id.
    pub fn create_target(&mut self) -> String {
        let id = loop {
            let candidate = self.next_id.to_string();
            self.next_id += 1;
            if !self.targets.contains_key(&candidate) && self.session.get(&candidate).is_none() {
                break candidate;
            }
        };
        tracing::info!("host: created target '{id}'");
        self.targets.insert(id.clone(), Target::new(id.clone()));
        id
    }

    /// Recreates every target in the session and restores its state.
    ///
    /// A state that fails to restore is logged and skipped; the target still
    /// exists.
    pub fn restore_session(&mut self) -> Vec<String> {
        let saved: Vec<_> = self.session.iter().cloned().collect();
        let mut restored = Vec::with_capacity(saved.len());
        for entry in saved {
            if let Ok(n) = entry.id.parse::<u64>() {
                self.next_id = self.next_id.max(n + 1);
            }
            self.targets
                .entry(entry.id.clone())
                .or_insert_with(|| Target::new(entry.id.clone()));
            if let Err(e) = self.load_state(&entry.id, &entry.state) {
                tracing::error!("host: could not restore '{}': {e}", entry.id);
            }
            restored.push(entry.id);
        }
        restored
    }

    /// Tears a target down: unpublishes its module, releases its ports,
    /// closes its surface and forgets its saved state.
    pub fn remove_target(&mut self, id: &str) -> Result<PortChanges, HostError> {
        let mut target = self
            .targets
            .remove(id)
            .ok_or_else(|| HostError::UnknownTarget(id.to_string()))?;
        let changes = target.swap.unload();
        if target.open {
            self.send_or_warn(&Message::close(id));
        }
        if self.session.remove(id) {
            self.persist_session();
        }
        tracing::info!("host: removed target '{id}'");
        Ok(changes)
    }

    /// Target by id.
    pub fn target(&self, id: &str) -> Option<&Target> {
        self.targets.get(id)
    }

    /// Mutable target by id.
    pub fn target_mut(&mut self, id: &str) -> Option<&mut Target> {
        self.targets.get_mut(id)
    }

    /// All targets in id order.
    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.targets.values()
    }

    /// Audio-thread handle for a target.
    pub fn audio_path(&self, id: &str) -> Option<AudioPath> {
        self.targets.get(id).map(Target::audio_path)
    }

    /// Shows the target's editor surface.
    pub fn open(&mut self, id: &str) -> Result<(), HostError> {
        self.require(id)?;
        self.send(&Message::open(id))?;
        if let Some(target) = self.targets.get_mut(id) {
            target.open = true;
        }
        Ok(())
    }

    /// Hides the target's editor surface.
    pub fn close(&mut self, id: &str) -> Result<(), HostError> {
        self.require(id)?;
        if let Some(target) = self.targets.get_mut(id) {
            target.open = false;
        }
        self.send(&Message::close(id))
    }

    /// Installs a saved state: pushes it to the editor and compiles it
    /// locally so audio resumes without waiting for the user.
    ///
    /// A compile already in flight for the target is left alone.
    pub fn load_state(&mut self, id: &str, state: &str) -> Result<(), HostError> {
        self.require(id)?;
        let patch_text = decode_state(state)?;
        if let Some(target) = self.targets.get_mut(id) {
            target.state = Some(state.to_string());
        }
        self.session.set(id, state);

        match self.pipeline.submit(patch_text, id) {
            Ok(ticket) => {
                tracing::info!("host: restoring '{id}' as {}", ticket.module_name);
                if let Some(target) = self.targets.get_mut(id) {
                    target.submitted = ticket.generation;
                }
            }
            Err(PipelineError::AlreadyRunning(_)) => {
                tracing::warn!("host: '{id}' is already compiling, not restoring");
            }
            Err(e) => tracing::error!("host: restore of '{id}' failed: {e}"),
        }
        self.send_or_warn(&Message::load_state(id, state));
        Ok(())
    }

    /// Loads a module and publishes it for the target.
    ///
    /// The entry symbol is derived from the file stem. On failure the
    /// current module stays published.
    pub fn hot_swap(&mut self, id: &str, path: &Path) -> Result<PortChanges, HostError> {
        let entry = self.settings.compiler.entry_symbol_for(&module_stem(path));
        let sample_rate = f64::from(self.settings.host.sample_rate);
        let loader = Arc::clone(&self.loader);
        let target = self
            .targets
            .get_mut(id)
            .ok_or_else(|| HostError::UnknownTarget(id.to_string()))?;
        target.swap.swap_in(loader.as_ref(), path, &entry, sample_rate)
    }

    /// Handles queued editor messages and finished compiles, then releases
    /// retired modules. Never blocks.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();

        let messages = self.editor_endpoint().map(Endpoint::drain).unwrap_or_default();
        for msg in messages {
            report.messages += 1;
            match self.handle_message(&msg) {
                Ok(swapped) => report.swaps += usize::from(swapped),
                Err(e) => {
                    tracing::error!("host: {msg}: {e}");
                    report.failures += 1;
                }
            }
        }

        while let Some(outcome) = self.pipeline.try_outcome() {
            if self.is_outdated(&outcome.target, outcome.generation) {
                tracing::info!(
                    "host: dropping {} for '{}', a newer module is live",
                    outcome.module_name,
                    outcome.target
                );
                report.outdated += 1;
                continue;
            }
            let result = outcome
                .result
                .map_err(HostError::from)
                .and_then(|path| self.hot_swap(&outcome.target, &path));
            match result {
                Ok(_) => {
                    if let Some(target) = self.targets.get_mut(&outcome.target) {
                        target.stale_through = outcome.generation;
                    }
                    report.swaps += 1;
                }
                Err(e) => {
                    tracing::error!("host: '{}': {e}", outcome.target);
                    report.failures += 1;
                }
            }
        }

        for target in self.targets.values_mut() {
            target.swap.collect_retired();
        }

        let lost = self
            .editor_endpoint()
            .is_some_and(|ep| ep.is_lost() && ep.incoming().is_empty());
        if lost {
            self.drop_editor();
            report.transport_lost = true;
        }
        report
    }

    /// Writes the session file, if one is configured.
    pub fn save_session(&self) -> Result<(), HostError> {
        if let Some(path) = &self.session_path {
            self.session.save(path)?;
        }
        Ok(())
    }

    /// Unloads every target, stops the editor and saves the session.
    pub fn shutdown(mut self) -> Result<(), HostError> {
        for target in self.targets.values_mut() {
            target.swap.unload();
        }
        self.drop_editor();
        self.save_session()
    }

    /// Returns whether a module was published.
    fn handle_message(&mut self, msg: &Message) -> Result<bool, HostError> {
        match msg.selector {
            Selector::Load => {
                let path = msg.module_path()?;
                self.hot_swap(&msg.target, &path)?;
                // The editor's build supersedes any restore still compiling.
                if let Some(target) = self.targets.get_mut(&msg.target) {
                    target.stale_through = target.submitted;
                }
                Ok(true)
            }
            Selector::SaveState => {
                let state = msg.payload()?;
                // Reject garbage before it reaches the session file.
                decode_state(state)?;
                let target = self
                    .targets
                    .get_mut(&msg.target)
                    .ok_or_else(|| HostError::UnknownTarget(msg.target.clone()))?;
                target.state = Some(state.to_string());
                self.session.set(msg.target.clone(), state);
                tracing::info!("host: saved state for '{}'", msg.target);
                self.persist_session();
                Ok(false)
            }
            Selector::Error => {
                tracing::error!("[{}] {}", msg.target, msg.payload()?);
                Ok(false)
            }
            Selector::Open | Selector::Close | Selector::LoadState => {
                Err(TransportError::Protocol(format!("host cannot receive {}", msg.selector)).into())
            }
        }
    }

    fn is_outdated(&self, id: &str, generation: u64) -> bool {
        self.targets
            .get(id)
            .is_some_and(|t| generation <= t.stale_through)
    }

    fn require(&self, id: &str) -> Result<(), HostError> {
        if self.targets.contains_key(id) {
            Ok(())
        } else {
            Err(HostError::UnknownTarget(id.to_string()))
        }
    }

    /// Sends to the editor if one is linked. Losing the link tears it down.
    fn send(&mut self, msg: &Message) -> Result<(), HostError> {
        let Some(endpoint) = self.editor_endpoint() else {
            tracing::debug!("host: no editor, not sending {msg}");
            return Ok(());
        };
        match endpoint.send(msg) {
            Ok(()) => Ok(()),
            Err(TransportError::TransportLost) => {
                self.drop_editor();
                Err(TransportError::TransportLost.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn send_or_warn(&mut self, msg: &Message) {
        if let Err(e) = self.send(msg) {
            tracing::warn!("host: {msg} not delivered: {e}");
        }
    }

    fn persist_session(&self) {
        if let Err(e) = self.save_session() {
            tracing::error!("host: {e}");
        }
    }

    /// Forgets the editor. Surfaces are unreachable from here on; audio keeps
    /// running.
    fn drop_editor(&mut self) {
        let Some(link) = self.link.take() else {
            return;
        };
        tracing::warn!("host: editor link closed, {} surface(s) unreachable", self.targets.len());
        for target in self.targets.values_mut() {
            target.open = false;
        }
        if let EditorLink::Spawned(process) = link {
            if let Err(e) = process.shutdown(EDITOR_GRACE) {
                tracing::warn!("host: editor shutdown: {e}");
            }
        }
    }
}
