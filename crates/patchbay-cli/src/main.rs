//! patchbay CLI - inspect, compile and host Pd-style patches.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "patchbay")]
#[command(author, version, about = "Patch editor and hot-swap audio host", long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/patchbay/settings.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the object types the registry knows
    Objects(commands::objects::ObjectsArgs),

    /// Parse a patch file and report what loads
    Check(commands::check::CheckArgs),

    /// Build a patch into a loadable module
    Compile(commands::compile::CompileArgs),

    /// Serve a host over stdin/stdout (started by `patchbay host`)
    Editor(commands::editor::EditorArgs),

    /// Run the audio host with an editor process
    Host(commands::host::HostArgs),
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Objects(args) => commands::objects::run(args),
        Commands::Check(args) => commands::check::run(args),
        Commands::Compile(args) => commands::compile::run(args, config),
        Commands::Editor(args) => commands::editor::run(args, config),
        Commands::Host(args) => commands::host::run(args, config),
    }
}

/// Logs go to stderr: the editor's stdout carries transport frames.
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
