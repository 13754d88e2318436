//! Cross-process transport between the patch editor and the audio host.
//!
//! Messages are `(target, selector, optional payload)` triples sent as
//! length-prefixed frames over any byte stream, normally the editor process's
//! stdin and stdout. Each side wraps its streams in an [`Endpoint`], which
//! reads on a background thread into a queue the owner drains without
//! blocking.
//!
//! | Selector | Direction | Payload |
//! |---|---|---|
//! | `Open` | host → editor | none |
//! | `Close` | host → editor | none |
//! | `LoadState` | host → editor | base64 patch text |
//! | `SaveState` | editor → host | base64 patch text |
//! | `Load` | editor → host | module path |
//! | `Error` | editor → host | message text |

mod endpoint;
mod error;
mod frame;
mod pipe;
mod protocol;
mod spawn;

pub use endpoint::{Endpoint, Role};
pub use error::TransportError;
pub use frame::{MAX_FRAME_BYTES, read_frame, write_frame};
pub use pipe::{PipeReader, PipeWriter, memory_pipe};
pub use protocol::{Flow, Message, Selector};
pub use spawn::{EditorProcess, spawn_editor};
