//! Editor process for patchbay.
//!
//! The editor runs as a child of the audio host and talks to it over its
//! stdin/stdout. It keeps one [`Surface`] (a patch graph plus visibility) per
//! host target, created on demand by `Open` or `LoadState`. Saving sends the
//! patch back as `SaveState`; recompiling runs the compile pipeline and sends
//! `Load` with the built module, or `Error` with the diagnostic.
//!
//! [`EditorSession::run`] is the process's main loop: it drains the
//! transport on a timer and exits cleanly when the host closes the pipe.

mod error;
mod session;
mod surface;

pub use error::EditorError;
pub use session::{EditorSession, EditorTick};
pub use surface::Surface;
