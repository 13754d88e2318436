//! The editor worker process.

use std::path::Path;
use std::sync::Arc;

use clap::Args;
use patchbay_compiler::HeavyToolchain;
use patchbay_editor::EditorSession;
use patchbay_ipc::{Endpoint, Role};
use patchbay_registry::ObjectRegistry;

use super::common::load_settings;

#[derive(Args)]
pub struct EditorArgs {
    /// Save and recompile after every edit
    #[arg(long)]
    autosave: bool,
}

pub fn run(args: EditorArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let mut settings = load_settings(config)?;
    settings.editor.autosave |= args.autosave;

    let endpoint = Endpoint::stdio(Role::Editor)?;
    let toolchain = HeavyToolchain::new(settings.compiler);
    let mut session = EditorSession::new(
        endpoint,
        Arc::new(ObjectRegistry::new()),
        Arc::new(toolchain),
        settings.editor,
    );
    session.run()?;
    Ok(())
}
