//! Loading compiled Heavy modules with `libloading`.
//!
//! A module exports a constructor named after the module (`make_<name>` by
//! default) taking the sample rate and returning an opaque context, plus the
//! Heavy context API:
//!
//! | Symbol | Signature |
//! |---|---|
//! | constructor | `void *(double sample_rate)` |
//! | `hv_getNumInputChannels` | `int (void *)` |
//! | `hv_getNumOutputChannels` | `int (void *)` |
//! | `hv_process` | `int (void *, float **, float **, int)` |
//! | `hv_delete` | `void (void *)` |
//! | `hv_setPrintHook` (optional) | `void (void *, hook)` |

#![allow(unsafe_code)]

use std::ffi::{CStr, c_char, c_int, c_void};
use std::path::Path;

use libloading::{Library, Symbol};

use crate::error::HostError;
use crate::module::{ModuleLoader, Processor};

type Construct = unsafe extern "C" fn(f64) -> *mut c_void;
type ChannelCount = unsafe extern "C" fn(*mut c_void) -> c_int;
type Process = unsafe extern "C" fn(*mut c_void, *mut *mut f32, *mut *mut f32, c_int) -> c_int;
type Delete = unsafe extern "C" fn(*mut c_void);
type PrintHook = unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char, *const c_void);
type SetPrintHook = unsafe extern "C" fn(*mut c_void, Option<PrintHook>);

/// [`ModuleLoader`] for shared libraries on disk.
#[derive(Debug, Clone)]
pub struct NativeLoader {
    block_size: usize,
    cleanup: bool,
}

impl NativeLoader {
    /// Creates a loader. `block_size` pre-sizes the scratch buffers used for
    /// absent channels; `cleanup` deletes module files once loaded.
    pub fn new(block_size: usize, cleanup: bool) -> Self {
        Self {
            block_size: block_size.max(1),
            cleanup,
        }
    }
}

impl ModuleLoader for NativeLoader {
    fn load(
        &self,
        path: &Path,
        entry_symbol: &str,
        sample_rate: f64,
    ) -> Result<Box<dyn Processor>, HostError> {
        if !path.exists() {
            return Err(HostError::load_failed(path, "file not found"));
        }

        // SAFETY: the library comes from our own toolchain; its initialisers
        // are generated Heavy code with no load-time side effects.
        let lib = unsafe { Library::new(path) }.map_err(|e| HostError::load_failed(path, e))?;

        // SAFETY: symbol types match the Heavy C API listed above. Function
        // pointers are copied out and stay valid while `lib` is held by the
        // processor.
        let (construct, inputs, outputs, process, delete, set_print_hook) = unsafe {
            let construct: Symbol<Construct> = lib
                .get(entry_symbol.as_bytes())
                .map_err(|e| HostError::load_failed(path, format!("missing `{entry_symbol}`: {e}")))?;
            let inputs: Symbol<ChannelCount> = required(&lib, path, "hv_getNumInputChannels")?;
            let outputs: Symbol<ChannelCount> = required(&lib, path, "hv_getNumOutputChannels")?;
            let process: Symbol<Process> = required(&lib, path, "hv_process")?;
            let delete: Symbol<Delete> = required(&lib, path, "hv_delete")?;
            let set_print_hook: Option<Symbol<SetPrintHook>> = lib.get(b"hv_setPrintHook").ok();
            (
                *construct,
                *inputs,
                *outputs,
                *process,
                *delete,
                set_print_hook.map(|s| *s),
            )
        };

        // SAFETY: constructor contract; null signals failure.
        let context = unsafe { construct(sample_rate) };
        if context.is_null() {
            return Err(HostError::construction(path, "constructor returned null"));
        }

        // SAFETY: `context` is a live instance from this library.
        let (n_in, n_out) = unsafe { (inputs(context), outputs(context)) };
        let (Ok(n_in), Ok(n_out)) = (usize::try_from(n_in), usize::try_from(n_out)) else {
            // SAFETY: releasing the instance we just built.
            unsafe { delete(context) };
            return Err(HostError::construction(
                path,
                format!("negative channel count ({n_in} in, {n_out} out)"),
            ));
        };

        if let Some(set_print_hook) = set_print_hook {
            // SAFETY: `print_hook` matches the hook signature and outlives the
            // instance.
            unsafe { set_print_hook(context, Some(print_hook as PrintHook)) };
        }

        tracing::info!(
            "module: loaded {} ({n_in} in / {n_out} out) at {sample_rate} Hz",
            path.display()
        );

        let processor = NativeProcessor {
            context,
            process,
            delete,
            n_in,
            n_out,
            in_ptrs: Vec::with_capacity(n_in),
            out_ptrs: Vec::with_capacity(n_out),
            silence: vec![0.0; self.block_size],
            sink: vec![0.0; self.block_size],
            _lib: Some(lib),
        };

        if self.cleanup {
            remove_build_products(path);
        }
        Ok(Box::new(processor))
    }
}

/// Looks up a required symbol.
///
/// # Safety
///
/// `T` must match the symbol's real type.
unsafe fn required<'lib, T>(
    lib: &'lib Library,
    path: &Path,
    name: &str,
) -> Result<Symbol<'lib, T>, HostError> {
    // SAFETY: forwarded to the caller.
    unsafe { lib.get(name.as_bytes()) }
        .map_err(|e| HostError::load_failed(path, format!("missing `{name}`: {e}")))
}

/// Deletes a loaded module file. For a toolchain build laid out as
/// `<work_dir>/lib/<name>.<ext>`, also deletes that module's own
/// `<work_dir>/<name>` scratch directory. Nothing else is touched. Mapped
/// libraries stay usable after unlinking.
fn remove_build_products(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        tracing::warn!("module: could not remove {}: {e}", path.display());
        return;
    }
    let Some(lib_dir) = path.parent().filter(|dir| dir.file_name().is_some_and(|n| n == "lib"))
    else {
        return;
    };
    let (Some(work_dir), Some(stem)) = (lib_dir.parent(), path.file_stem()) else {
        return;
    };
    let scratch = work_dir.join(stem);
    if !scratch.is_dir() {
        return;
    }
    if let Err(e) = std::fs::remove_dir_all(&scratch) {
        tracing::warn!("module: could not remove {}: {e}", scratch.display());
    }
}

unsafe extern "C" fn print_hook(
    _context: *mut c_void,
    receiver: *const c_char,
    message: *const c_char,
    _msg: *const c_void,
) {
    // SAFETY: Heavy passes NUL-terminated strings valid for this call.
    let text = |p: *const c_char| {
        if p.is_null() {
            String::new()
        } else {
            unsafe { CStr::from_ptr(p) }.to_string_lossy().into_owned()
        }
    };
    tracing::info!(target: "patchbay::module", "{}: {}", text(receiver), text(message));
}

struct NativeProcessor {
    context: *mut c_void,
    process: Process,
    delete: Delete,
    n_in: usize,
    n_out: usize,
    in_ptrs: Vec<*mut f32>,
    out_ptrs: Vec<*mut f32>,
    silence: Vec<f32>,
    sink: Vec<f32>,
    // Dropped after `Drop::drop` has deleted the context.
    _lib: Option<Library>,
}

// SAFETY: the context is only touched through `&mut self` (behind the
// module's mutex), and the pointer vectors are scratch space rebuilt on every
// call.
unsafe impl Send for NativeProcessor {}

impl Processor for NativeProcessor {
    fn input_channels(&self) -> usize {
        self.n_in
    }

    fn output_channels(&self) -> usize {
        self.n_out
    }

    fn process(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) {
        // Scratch is sized once at load; longer blocks run in chunks.
        let chunk = self.silence.len();
        let mut start = 0;
        while start < frames {
            let len = chunk.min(frames - start);
            self.render(inputs, outputs, start, len);
            start += len;
        }
    }
}

impl NativeProcessor {
    /// Renders frames `start..start + len`, with `len` at most the scratch size.
    fn render(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], start: usize, len: usize) {
        let Ok(n) = c_int::try_from(len) else {
            return;
        };
        let end = start + len;

        self.in_ptrs.clear();
        for ch in 0..self.n_in {
            let ptr = match inputs.get(ch) {
                // Heavy only reads its input buffers.
                Some(buf) if buf.len() >= end => buf[start..].as_ptr().cast_mut(),
                _ => self.silence.as_mut_ptr(),
            };
            self.in_ptrs.push(ptr);
        }
        self.out_ptrs.clear();
        for ch in 0..self.n_out {
            let ptr = match outputs.get_mut(ch) {
                Some(buf) if buf.len() >= end => buf[start..].as_mut_ptr(),
                _ => self.sink.as_mut_ptr(),
            };
            self.out_ptrs.push(ptr);
        }

        // SAFETY: every pointer covers at least `len` samples and the
        // context is live.
        unsafe {
            (self.process)(self.context, self.in_ptrs.as_mut_ptr(), self.out_ptrs.as_mut_ptr(), n);
        }
    }
}

impl Drop for NativeProcessor {
    fn drop(&mut self) {
        // SAFETY: the context came from this library's constructor and is
        // deleted exactly once.
        unsafe { (self.delete)(self.context) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_load_failure() {
        let loader = NativeLoader::new(64, false);
        let err = loader
            .load(Path::new("/nonexistent/patchbay/t0_1.so"), "make_t0_1", 48000.0)
            .err();
        assert!(matches!(err, Some(HostError::ModuleLoadFailed { .. })));
    }

    #[test]
    fn test_non_library_is_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t0_1.so");
        std::fs::write(&path, b"not a shared object").unwrap();
        let loader = NativeLoader::new(64, true);
        let err = loader.load(&path, "make_t0_1", 48000.0).err();
        assert!(matches!(err, Some(HostError::ModuleLoadFailed { .. })));
        // Failed loads leave the file alone.
        assert!(path.exists());
    }

    #[test]
    fn test_remove_build_products_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lib").join("m.so");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"x").unwrap();
        remove_build_products(&path);
        assert!(!path.exists());
        assert!(dir.path().join("lib").exists());
    }

    #[test]
    fn test_remove_build_products_spares_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let work_dir = dir.path().join("tmp");
        let path = work_dir.join("lib").join("t0_1.so");
        let scratch = work_dir.join("t0_1");
        let neighbour = work_dir.join("t0_2");
        let unrelated = work_dir.join("someone_elses_file.txt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::create_dir_all(scratch.join("obj")).unwrap();
        std::fs::create_dir_all(&neighbour).unwrap();
        std::fs::write(&path, b"x").unwrap();
        std::fs::write(&unrelated, b"keep").unwrap();

        remove_build_products(&path);

        assert!(!path.exists());
        assert!(!scratch.exists());
        assert!(neighbour.exists());
        assert!(unrelated.exists());
        assert!(work_dir.join("lib").exists());
    }

    use std::sync::atomic::{AtomicUsize, Ordering};

    static LARGEST_CALL: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn double(
        _context: *mut c_void,
        inputs: *mut *mut f32,
        outputs: *mut *mut f32,
        frames: c_int,
    ) -> c_int {
        let n = frames as usize;
        LARGEST_CALL.fetch_max(n, Ordering::Relaxed);
        // SAFETY: one input and one output channel, each `n` samples long.
        let (input, output) = unsafe {
            (
                std::slice::from_raw_parts(*inputs, n),
                std::slice::from_raw_parts_mut(*outputs, n),
            )
        };
        for (o, i) in output.iter_mut().zip(input) {
            *o = i * 2.0;
        }
        0
    }

    unsafe extern "C" fn forget(_context: *mut c_void) {}

    #[test]
    fn test_long_block_renders_in_scratch_sized_chunks() {
        let mut processor = NativeProcessor {
            context: std::ptr::NonNull::<u8>::dangling().as_ptr().cast(),
            process: double,
            delete: forget,
            n_in: 1,
            n_out: 1,
            in_ptrs: Vec::with_capacity(1),
            out_ptrs: Vec::with_capacity(1),
            silence: vec![0.0; 4],
            sink: vec![0.0; 4],
            _lib: None,
        };
        let input: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let mut output = vec![0.0f32; 10];

        processor.process(&[&input[..]], &mut [&mut output[..]], 10);

        let expected: Vec<f32> = input.iter().map(|x| x * 2.0).collect();
        assert_eq!(output, expected);
        assert!(LARGEST_CALL.load(Ordering::Relaxed) <= 4);
        assert_eq!(processor.silence.len(), 4);
        assert_eq!(processor.sink.len(), 4);
    }
}
