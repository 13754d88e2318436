//! Launching the editor as a child process.

use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::endpoint::{Endpoint, Role};
use crate::error::TransportError;

/// A running editor process and the host's endpoint to it.
///
/// The editor speaks the protocol on its stdin/stdout; its stderr is
/// inherited so its logs land next to the host's.
#[derive(Debug)]
pub struct EditorProcess {
    child: Child,
    endpoint: Option<Endpoint>,
}

/// Starts `executable args...` with piped stdin/stdout.
pub fn spawn_editor(executable: &Path, args: &[String]) -> Result<EditorProcess, TransportError> {
    let mut command = Command::new(executable);
    command
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    let mut child = command.spawn()?;
    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| TransportError::protocol("missing stdin pipe"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| TransportError::protocol("missing stdout pipe"))?;

    tracing::info!("editor: spawned {} (pid {})", executable.display(), child.id());
    let endpoint = Endpoint::new(stdout, stdin, Role::Host)?;
    Ok(EditorProcess {
        child,
        endpoint: Some(endpoint),
    })
}

impl EditorProcess {
    /// The host's endpoint.
    ///
    /// Only `None` after [`shutdown`](Self::shutdown), which consumes `self`.
    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    /// Child process id.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Closes the editor's stdin, waits up to `grace` for it to exit, then
    /// kills it.
    pub fn shutdown(mut self, grace: Duration) -> std::io::Result<ExitStatus> {
        self.close(grace)
    }

    fn close(&mut self, grace: Duration) -> std::io::Result<ExitStatus> {
        // Dropping the endpoint drops the child's stdin.
        self.endpoint = None;
        let deadline = Instant::now() + grace;
        loop {
            if let Some(status) = self.child.try_wait()? {
                tracing::info!("editor: exited with {status}");
                return Ok(status);
            }
            if Instant::now() >= deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        tracing::warn!("editor: did not exit within {grace:?}, killing");
        self.child.kill()?;
        self.child.wait()
    }
}

impl Drop for EditorProcess {
    fn drop(&mut self) {
        if self.endpoint.is_some() {
            let _ = self.close(Duration::from_millis(200));
        }
    }
}
