//! One-shot patch compilation.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use patchbay_compiler::{HeavyToolchain, c_identifier};

use super::common::{load_settings, read_patch};

#[derive(Args)]
pub struct CompileArgs {
    /// Patch file (.pd)
    patch: PathBuf,

    /// Module name (default: the file stem)
    #[arg(long)]
    name: Option<String>,

    /// Scratch directory for generated sources and the built library
    #[arg(long, value_name = "DIR")]
    work_dir: Option<PathBuf>,
}

pub fn run(args: CompileArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let mut settings = load_settings(config)?;
    if let Some(dir) = args.work_dir {
        settings.compiler.work_dir = Some(dir);
    }

    let text = read_patch(&args.patch)?;
    let name = match args.name {
        Some(name) => name,
        None => {
            let stem = args
                .patch
                .file_stem()
                .context("patch path has no file name")?;
            c_identifier(&stem.to_string_lossy())
        }
    };

    let toolchain = HeavyToolchain::new(settings.compiler);
    let library = toolchain
        .build(&text, &name)
        .with_context(|| format!("compiling {}", args.patch.display()))?;
    println!("{}", library.display());
    Ok(())
}
