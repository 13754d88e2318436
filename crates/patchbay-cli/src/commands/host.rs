//! The audio host.
//!
//! There is no audio device here: a render thread pulls every target's
//! [`AudioPath`] at the configured block size and sample rate, the way a
//! device callback would, and reports output peaks to the log.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use clap::Args;
use patchbay_compiler::HeavyToolchain;
use patchbay_config::paths::session_path;
use patchbay_core::encode_state;
use patchbay_host::{AudioPath, Host, NativeLoader};

use super::common::{load_settings, read_patch};

#[derive(Args)]
pub struct HostArgs {
    /// Patch files to create targets from
    #[arg(value_name = "PATCH")]
    patches: Vec<PathBuf>,

    /// Session file (default: <config dir>/patchbay/session.toml)
    #[arg(long, value_name = "FILE")]
    session: Option<PathBuf>,

    /// Run without an editor process
    #[arg(long)]
    no_editor: bool,

    /// Open every target's editor surface at startup
    #[arg(long)]
    open: bool,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    seconds: Option<f64>,
}

pub fn run(args: HostArgs, config: Option<&Path>) -> anyhow::Result<()> {
    let settings = load_settings(config)?;
    let loader = NativeLoader::new(settings.host.block_size, settings.host.cleanup_modules);
    let toolchain = HeavyToolchain::new(settings.compiler.clone());
    let poll = Duration::from_millis(settings.editor.poll_interval_ms.max(1));
    let sample_rate = settings.host.sample_rate;
    let block_size = settings.host.block_size;

    let session = args.session.unwrap_or_else(session_path);
    let mut host =
        Host::new(settings, Arc::new(loader), Arc::new(toolchain)).with_session(session)?;

    if !args.no_editor {
        let mut editor_args = Vec::new();
        if let Some(path) = config {
            editor_args.push("--config".to_string());
            editor_args.push(path.display().to_string());
        }
        editor_args.push("editor".to_string());
        host.spawn_editor(&editor_args)?;
    }

    let mut ids = host.restore_session();
    for patch in &args.patches {
        let text = read_patch(patch)?;
        let id = host.create_target();
        host.load_state(&id, &encode_state(&text))?;
        println!("{} -> target {id}", patch.display());
        ids.push(id);
    }
    if args.open {
        for id in &ids {
            host.open(id)?;
        }
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let paths: Vec<AudioPath> = ids.iter().filter_map(|id| host.audio_path(id)).collect();
    let render = spawn_render(paths, sample_rate, block_size, Arc::clone(&running))?;

    println!(
        "Hosting {} target(s) at {sample_rate} Hz, {block_size} frames per block",
        ids.len()
    );
    println!("Press Ctrl+C to stop...");

    let deadline = args
        .seconds
        .map(|s| Instant::now() + Duration::from_secs_f64(s.max(0.0)));
    let ticker = crossbeam_channel::tick(poll);
    while running.load(Ordering::SeqCst) {
        ticker.recv()?;
        let report = host.tick();
        if report.transport_lost {
            tracing::warn!("host: editor gone, audio keeps running");
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
    if render.join().is_err() {
        tracing::error!("host: render thread panicked");
    }
    host.shutdown()?;
    println!("Done!");
    Ok(())
}

fn spawn_render(
    paths: Vec<AudioPath>,
    sample_rate: u32,
    block_size: usize,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    let block = Duration::from_secs_f64(block_size as f64 / f64::from(sample_rate));
    std::thread::Builder::new()
        .name("render".into())
        .spawn(move || {
            let mut left = vec![0.0f32; block_size];
            let mut right = vec![0.0f32; block_size];
            let mut peak = 0.0f32;
            let mut last_report = Instant::now();
            let mut next = Instant::now();
            while running.load(Ordering::Relaxed) {
                for path in &paths {
                    path.process(&[], &mut [left.as_mut_slice(), right.as_mut_slice()], block_size);
                    peak = left.iter().chain(&right).fold(peak, |p, s| p.max(s.abs()));
                }
                if last_report.elapsed() >= Duration::from_secs(1) {
                    tracing::debug!("render: peak {peak:.3}");
                    peak = 0.0;
                    last_report = Instant::now();
                }
                next += block;
                if let Some(wait) = next.checked_duration_since(Instant::now()) {
                    std::thread::sleep(wait);
                }
            }
        })
}
