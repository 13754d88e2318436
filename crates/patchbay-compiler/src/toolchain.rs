//! Heavy code generator plus the system C/C++ toolchain.
//!
//! # Layout
//!
//! For a module called `name` under the configured work dir:
//!
//! ```text
//! <work_dir>/<name>/<name>.pd      patch text handed to the generator
//! <work_dir>/<name>/out/c/*.c|cpp  generated sources
//! <work_dir>/<name>/obj/*.o        compiled objects
//! <work_dir>/lib/<name>.<ext>      linked module (the result)
//! ```
//!
//! The per-module scratch directory is removed after a successful link and
//! kept after a failure for inspection.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Command;

use patchbay_config::CompilerSettings;

use crate::error::ToolchainError;
use crate::generator::Generator;

/// Builds modules with `python hvcc`, `cxx` and `cc`.
#[derive(Debug, Clone)]
pub struct HeavyToolchain {
    settings: CompilerSettings,
}

impl HeavyToolchain {
    /// Creates a toolchain from compiler settings.
    pub fn new(settings: CompilerSettings) -> Self {
        Self { settings }
    }

    /// The settings in use.
    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Scratch directory for one module's sources and objects.
    pub fn scratch_dir(&self, name: &str) -> PathBuf {
        self.settings.work_dir().join(name)
    }

    /// Where the linked module for `name` is written.
    pub fn library_path(&self, name: &str) -> PathBuf {
        self.settings
            .work_dir()
            .join("lib")
            .join(format!("{name}.{}", self.settings.library_extension))
    }

    /// `python hvcc -o <out_dir> -n <name> <patch_file>`
    pub fn generate_command(&self, patch_file: &Path, out_dir: &Path, name: &str) -> Command {
        let mut cmd = Command::new(&self.settings.python);
        cmd.arg(&self.settings.hvcc)
            .arg("-o")
            .arg(out_dir)
            .arg("-n")
            .arg(name)
            .arg(patch_file);
        cmd
    }

    /// `cxx <flags> -o <object> -c <source>`
    pub fn compile_command(&self, source: &Path, object: &Path) -> Command {
        let mut cmd = Command::new(&self.settings.cxx);
        cmd.args(&self.settings.cxx_flags)
            .arg("-o")
            .arg(object)
            .arg("-c")
            .arg(source);
        cmd
    }

    /// `cc <linker flags> -o <library> <objects...>`
    pub fn link_command(&self, objects: &[PathBuf], library: &Path) -> Command {
        let mut cmd = Command::new(&self.settings.cc);
        cmd.args(&self.settings.linker_flags)
            .arg("-o")
            .arg(library)
            .args(objects);
        cmd
    }

    /// Generates, compiles and links `patch_text` as module `name`.
    pub fn build(&self, patch_text: &str, name: &str) -> Result<PathBuf, ToolchainError> {
        let scratch = self.scratch_dir(name);
        if scratch.exists() {
            std::fs::remove_dir_all(&scratch)
                .map_err(|e| ToolchainError::io("failed to clear", &scratch, e))?;
        }
        std::fs::create_dir_all(&scratch)
            .map_err(|e| ToolchainError::io("failed to create", &scratch, e))?;

        let patch_file = scratch.join(format!("{name}.pd"));
        std::fs::write(&patch_file, patch_text)
            .map_err(|e| ToolchainError::io("failed to write", &patch_file, e))?;

        let out_dir = scratch.join("out");
        run("generate", self.generate_command(&patch_file, &out_dir, name))?;

        let sources = generated_sources(&out_dir.join("c"))?;
        let obj_dir = scratch.join("obj");
        std::fs::create_dir_all(&obj_dir)
            .map_err(|e| ToolchainError::io("failed to create", &obj_dir, e))?;

        let mut objects = Vec::with_capacity(sources.len());
        for source in &sources {
            let file = source.file_name().unwrap_or_else(|| OsStr::new("source"));
            let mut object = obj_dir.join(file);
            object.as_mut_os_string().push(".o");
            run("compile", self.compile_command(source, &object))?;
            objects.push(object);
        }

        let library = self.library_path(name);
        if let Some(lib_dir) = library.parent() {
            std::fs::create_dir_all(lib_dir)
                .map_err(|e| ToolchainError::io("failed to create", lib_dir, e))?;
        }
        run("link", self.link_command(&objects, &library))?;

        if let Err(e) = std::fs::remove_dir_all(&scratch) {
            tracing::warn!("toolchain: could not remove {}: {e}", scratch.display());
        }
        Ok(library)
    }
}

impl Generator for HeavyToolchain {
    fn compile(&self, patch_text: &str, name: &str) -> Result<PathBuf, String> {
        self.build(patch_text, name).map_err(|e| e.to_string())
    }
}

fn run(step: &'static str, mut cmd: Command) -> Result<(), ToolchainError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    tracing::debug!("toolchain: {step}: {cmd:?}");
    let output = cmd
        .output()
        .map_err(|source| ToolchainError::Spawn { program, source })?;
    if output.status.success() {
        return Ok(());
    }
    let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    if stderr.trim().is_empty() {
        stderr = String::from_utf8_lossy(&output.stdout).into_owned();
    }
    Err(ToolchainError::StepFailed {
        step,
        status: output.status,
        stderr,
    })
}

fn generated_sources(dir: &Path) -> Result<Vec<PathBuf>, ToolchainError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| ToolchainError::io("failed to read", dir, e))?;
    let mut sources: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(OsStr::to_str)
                .is_some_and(|ext| ext == "c" || ext == "cpp")
        })
        .collect();
    if sources.is_empty() {
        return Err(ToolchainError::NoSources(dir.to_path_buf()));
    }
    sources.sort();
    Ok(sources)
}
