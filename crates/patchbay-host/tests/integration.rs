//! Host behavior against an in-process editor and a fake module loader.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use patchbay_config::Settings;
use patchbay_core::encode_state;
use patchbay_host::{Host, HostError, ModuleLoader, PortSide, Processor, TickReport, Wire};
use patchbay_ipc::{Endpoint, Message, Selector};

const WAIT: Duration = Duration::from_secs(5);
const PATCH: &str = "#N canvas 63 88 450 300 12;\n#X obj 30 30 osc~ 440;\n#X obj 30 80 dac~;\n#X connect 0 0 1 0;\n";

struct Tone {
    inputs: usize,
    outputs: usize,
}

impl Processor for Tone {
    fn input_channels(&self) -> usize {
        self.inputs
    }
    fn output_channels(&self) -> usize {
        self.outputs
    }
    fn process(&mut self, _inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) {
        for out in outputs.iter_mut() {
            out[..frames].fill(0.25);
        }
    }
}

/// Builds processors from the file stem: `mono_*` is (1,1), `wide_*` is
/// (3,1), `broken_*` fails, anything else is (2,1).
#[derive(Default)]
struct FakeLoader {
    calls: Mutex<Vec<(PathBuf, String, f64)>>,
}

impl ModuleLoader for FakeLoader {
    fn load(
        &self,
        path: &Path,
        entry_symbol: &str,
        sample_rate: f64,
    ) -> Result<Box<dyn Processor>, HostError> {
        self.calls
            .lock()
            .push((path.to_path_buf(), entry_symbol.to_string(), sample_rate));
        let stem = patchbay_host::module_stem(path);
        let (inputs, outputs) = if stem.starts_with("mono") {
            (1, 1)
        } else if stem.starts_with("wide") {
            (3, 1)
        } else if stem.starts_with("broken") {
            return Err(HostError::ModuleLoadFailed {
                path: path.to_path_buf(),
                reason: format!("missing `{entry_symbol}`"),
            });
        } else {
            (2, 1)
        };
        Ok(Box::new(Tone { inputs, outputs }))
    }
}

fn host_with(loader: Arc<FakeLoader>) -> Host {
    let generator = |_text: &str, name: &str| -> Result<PathBuf, String> {
        Ok(PathBuf::from(format!("/mods/{name}.so")))
    };
    Host::new(Settings::default(), loader, Arc::new(generator))
}

fn tick_until(host: &mut Host, mut done: impl FnMut(&Host, &TickReport) -> bool) -> TickReport {
    let deadline = Instant::now() + WAIT;
    loop {
        let report = host.tick();
        if done(host, &report) || Instant::now() >= deadline {
            return report;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_load_state_pushes_to_editor_and_compiles_locally() {
    let loader = Arc::new(FakeLoader::default());
    let mut host = host_with(Arc::clone(&loader));
    let (editor, host_end) = Endpoint::pair().unwrap();
    host.attach(host_end);

    let id = host.create_target();
    assert_eq!(id, "0");
    host.open(&id).unwrap();
    host.load_state(&id, &encode_state(PATCH)).unwrap();

    let open = editor.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(open.selector, Selector::Open);
    let state = editor.recv_timeout(WAIT).unwrap().unwrap();
    assert_eq!(state.patch_text().unwrap(), PATCH);

    tick_until(&mut host, |h, _| h.target("0").is_some_and(|t| t.module().is_some()));
    let expected = format!("t0_{}_1", host.pipeline().tag());
    let target = host.target("0").unwrap();
    assert_eq!(target.module().unwrap().name(), expected);
    assert_eq!(target.node().inlets().len(), 2);

    let calls = loader.calls.lock();
    assert_eq!(calls[0].1, format!("make_{expected}"));
    assert!((calls[0].2 - 48000.0).abs() < f64::EPSILON);
}

#[test]
fn test_load_message_hot_swaps_and_reconciles_ports() {
    let loader = Arc::new(FakeLoader::default());
    let mut host = host_with(loader);
    let (editor, host_end) = Endpoint::pair().unwrap();
    host.attach(host_end);
    let id = host.create_target();

    host.hot_swap(&id, Path::new("/mods/stereo_1.so")).unwrap();
    {
        let node = host.target_mut(&id).unwrap().node_mut();
        node.connect(PortSide::Inlet, 0, Wire::new("adc~", 0)).unwrap();
        node.connect(PortSide::Inlet, 1, Wire::new("adc~", 1)).unwrap();
        node.connect(PortSide::Outlet, 0, Wire::new("dac~", 0)).unwrap();
    }

    editor.send(&Message::load(&id, Path::new("/mods/mono_2.so"))).unwrap();
    let report = tick_until(&mut host, |_, r| r.swaps > 0);
    assert_eq!(report.swaps, 1);

    let node = host.target(&id).unwrap().node();
    assert_eq!(node.inlets().len(), 1);
    assert!(node.inlets()[0].is_connected());
    assert!(node.outlets()[0].is_connected());

    editor.send(&Message::load(&id, Path::new("/mods/wide_3.so"))).unwrap();
    tick_until(&mut host, |_, r| r.swaps > 0);
    let node = host.target(&id).unwrap().node();
    assert_eq!(node.inlets().len(), 3);
    assert!(node.inlets()[0].is_connected());
    assert!(!node.inlets()[1].is_connected());
    assert!(!node.inlets()[2].is_connected());
}

#[test]
fn test_failed_load_keeps_running_module() {
    let mut host = host_with(Arc::new(FakeLoader::default()));
    let (editor, host_end) = Endpoint::pair().unwrap();
    host.attach(host_end);
    let id = host.create_target();
    host.hot_swap(&id, Path::new("/mods/mono_1.so")).unwrap();
    let audio = host.audio_path(&id).unwrap();

    editor.send(&Message::load(&id, Path::new("/mods/broken_2.so"))).unwrap();
    let report = tick_until(&mut host, |_, r| r.failures > 0);
    assert_eq!(report.failures, 1);
    assert_eq!(host.target(&id).unwrap().module().unwrap().name(), "mono_1");

    let mut out = [0.0f32; 16];
    assert!(audio.process(&[], &mut [out.as_mut_slice()], 16));
    assert_eq!(out, [0.25; 16]);
}

#[test]
fn test_late_restore_does_not_replace_editor_build() {
    let loader = Arc::new(FakeLoader::default());
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let generator = move |_text: &str, name: &str| -> Result<PathBuf, String> {
        release_rx.lock().recv().map_err(|e| e.to_string())?;
        Ok(PathBuf::from(format!("/mods/{name}.so")))
    };
    let mut host = Host::new(Settings::default(), loader, Arc::new(generator));
    let (editor, host_end) = Endpoint::pair().unwrap();
    host.attach(host_end);
    let id = host.create_target();

    // The restore compile is held back while the editor delivers its build.
    host.load_state(&id, &encode_state(PATCH)).unwrap();
    editor.send(&Message::load(&id, Path::new("/mods/mono_user_edit.so"))).unwrap();
    tick_until(&mut host, |_, r| r.swaps > 0);
    assert_eq!(host.target(&id).unwrap().module().unwrap().name(), "mono_user_edit");

    release_tx.send(()).unwrap();
    let report = tick_until(&mut host, |_, r| r.outdated > 0);
    assert_eq!(report.outdated, 1);
    assert_eq!(report.swaps, 0);
    assert_eq!(host.target(&id).unwrap().module().unwrap().name(), "mono_user_edit");

    // A restore submitted after the editor's build still goes live.
    host.load_state(&id, &encode_state(PATCH)).unwrap();
    release_tx.send(()).unwrap();
    tick_until(&mut host, |_, r| r.swaps > 0);
    assert_eq!(
        host.target(&id).unwrap().module().unwrap().name(),
        format!("t0_{}_2", host.pipeline().tag())
    );
}

#[test]
fn test_failed_compile_is_surfaced_not_swapped() {
    let loader = Arc::new(FakeLoader::default());
    let generator = |_text: &str, _name: &str| -> Result<PathBuf, String> {
        Err("hvcc: unknown object".to_string())
    };
    let mut host = Host::new(Settings::default(), loader.clone(), Arc::new(generator));
    let id = host.create_target();
    host.load_state(&id, &encode_state(PATCH)).unwrap();

    let report = tick_until(&mut host, |_, r| r.failures > 0);
    assert_eq!(report.failures, 1);
    assert!(host.target(&id).unwrap().module().is_none());
    assert!(loader.calls.lock().is_empty());
}

#[test]
fn test_save_state_persists_to_session_file() {
    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("session.toml");
    let mut host = host_with(Arc::new(FakeLoader::default()))
        .with_session(&session_path)
        .unwrap();
    let (editor, host_end) = Endpoint::pair().unwrap();
    host.attach(host_end);
    let id = host.create_target();

    editor.send(&Message::save_state(&id, PATCH)).unwrap();
    tick_until(&mut host, |_, r| r.messages > 0);

    assert_eq!(host.target(&id).unwrap().state(), Some(encode_state(PATCH).as_str()));
    let saved = patchbay_config::Session::load(&session_path).unwrap();
    assert_eq!(saved.get(&id), Some(encode_state(PATCH).as_str()));
}

#[test]
fn test_restore_session_recreates_targets() {
    let dir = tempfile::tempdir().unwrap();
    let session_path = dir.path().join("session.toml");
    let mut session = patchbay_config::Session::new();
    session.set("4", encode_state(PATCH));
    session.save(&session_path).unwrap();

    let mut host = host_with(Arc::new(FakeLoader::default()))
        .with_session(&session_path)
        .unwrap();
    assert_eq!(host.restore_session(), vec!["4".to_string()]);
    tick_until(&mut host, |h, _| h.target("4").is_some_and(|t| t.module().is_some()));
    assert_eq!(
        host.target("4").unwrap().module().unwrap().name(),
        format!("t4_{}_1", host.pipeline().tag())
    );

    // Fresh ids never collide with restored ones.
    assert_eq!(host.create_target(), "5");
}

#[test]
fn test_unknown_target_is_rejected() {
    let mut host = host_with(Arc::new(FakeLoader::default()));
    assert!(matches!(host.open("9"), Err(HostError::UnknownTarget(_))));
    assert!(matches!(
        host.hot_swap("9", Path::new("/mods/x.so")),
        Err(HostError::UnknownTarget(_))
    ));
}

#[test]
fn test_bad_state_payload_is_rejected() {
    let mut host = host_with(Arc::new(FakeLoader::default()));
    let id = host.create_target();
    assert!(matches!(
        host.load_state(&id, "***not base64***"),
        Err(HostError::BadState(_))
    ));
    assert!(host.target(&id).unwrap().state().is_none());
}

#[test]
fn test_editor_loss_tears_down_surfaces_but_keeps_audio() {
    let mut host = host_with(Arc::new(FakeLoader::default()));
    let (editor, host_end) = Endpoint::pair().unwrap();
    host.attach(host_end);
    let id = host.create_target();
    host.hot_swap(&id, Path::new("/mods/mono_1.so")).unwrap();
    host.open(&id).unwrap();
    assert!(host.target(&id).unwrap().is_open());

    drop(editor);
    let report = tick_until(&mut host, |_, r| r.transport_lost);
    assert!(report.transport_lost);
    assert!(!host.has_editor());
    assert!(!host.target(&id).unwrap().is_open());
    assert!(host.audio_path(&id).unwrap().is_loaded());

    // With no editor, opening is a quiet no-op.
    host.open(&id).unwrap();
}

#[test]
fn test_remove_target_unloads_and_forgets_state() {
    let mut host = host_with(Arc::new(FakeLoader::default()));
    let id = host.create_target();
    host.hot_swap(&id, Path::new("/mods/mono_1.so")).unwrap();
    let audio = host.audio_path(&id).unwrap();

    let changes = host.remove_target(&id).unwrap();
    assert_eq!(changes.inlets.removed, 0..1);
    assert!(!audio.is_loaded());
    assert!(host.target(&id).is_none());
    assert!(host.session().get(&id).is_none());
}
