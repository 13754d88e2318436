//! One side of the transport: a framed writer plus a background reader.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, unbounded};
use parking_lot::Mutex;

use crate::error::TransportError;
use crate::frame::{read_frame, write_frame};
use crate::pipe::memory_pipe;
use crate::protocol::{Flow, Message};

/// Which process an endpoint lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The patch editor.
    Editor,
    /// The audio host.
    Host,
}

impl Role {
    /// Direction of messages this side sends.
    pub const fn outgoing(self) -> Flow {
        match self {
            Role::Editor => Flow::ToHost,
            Role::Host => Flow::ToEditor,
        }
    }

    /// Direction of messages this side accepts.
    pub const fn incoming(self) -> Flow {
        match self {
            Role::Editor => Flow::ToEditor,
            Role::Host => Flow::ToHost,
        }
    }
}

/// A framed, bidirectional message channel.
///
/// Incoming frames are decoded on a background thread into an unbounded
/// queue, so [`drain`](Self::drain) never blocks. When the peer's stream ends
/// or becomes unreadable the endpoint is marked lost; messages already queued
/// can still be drained, and every later [`send`](Self::send) fails with
/// [`TransportError::TransportLost`].
pub struct Endpoint {
    role: Role,
    writer: Mutex<Box<dyn Write + Send>>,
    incoming: Receiver<Message>,
    lost: Arc<AtomicBool>,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("role", &self.role)
            .field("queued", &self.incoming.len())
            .field("lost", &self.is_lost())
            .finish_non_exhaustive()
    }
}

impl Endpoint {
    /// Wraps a reader and writer, starting the reader thread.
    pub fn new<R, W>(reader: R, writer: W, role: Role) -> Result<Self, TransportError>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let lost = Arc::new(AtomicBool::new(false));
        let reader_lost = Arc::clone(&lost);
        let accepts = role.incoming();

        std::thread::Builder::new()
            .name(format!("transport-{role:?}").to_lowercase())
            .spawn(move || {
                let mut reader = std::io::BufReader::new(reader);
                loop {
                    match read_frame(&mut reader) {
                        Ok(Some(msg)) => {
                            if msg.selector.flow() != accepts {
                                tracing::warn!("transport: dropping misdirected {msg}");
                                continue;
                            }
                            tracing::debug!("transport: received {msg}");
                            if tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Ok(None) => {
                            tracing::info!("transport: peer closed the stream");
                            break;
                        }
                        Err(e) => {
                            tracing::error!("transport: {e}");
                            break;
                        }
                    }
                }
                reader_lost.store(true, Ordering::Release);
            })?;

        Ok(Self {
            role,
            writer: Mutex::new(Box::new(writer)),
            incoming: rx,
            lost,
        })
    }

    /// Endpoint over this process's stdin and stdout (the editor side of a
    /// spawned editor).
    pub fn stdio(role: Role) -> Result<Self, TransportError> {
        Self::new(std::io::stdin(), std::io::stdout(), role)
    }

    /// Two connected endpoints in one process: `(editor, host)`.
    pub fn pair() -> Result<(Self, Self), TransportError> {
        let (to_host_w, to_host_r) = memory_pipe();
        let (to_editor_w, to_editor_r) = memory_pipe();
        let editor = Self::new(to_editor_r, to_host_w, Role::Editor)?;
        let host = Self::new(to_host_r, to_editor_w, Role::Host)?;
        Ok((editor, host))
    }

    /// Which side this is.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Sends one message.
    ///
    /// Fails with [`TransportError::Protocol`] if the selector does not
    /// travel in this side's direction, and with
    /// [`TransportError::TransportLost`] once the peer is gone.
    pub fn send(&self, msg: &Message) -> Result<(), TransportError> {
        if msg.selector.flow() != self.role.outgoing() {
            return Err(TransportError::protocol(format!(
                "{:?} cannot send {}",
                self.role, msg.selector
            )));
        }
        if self.is_lost() {
            return Err(TransportError::TransportLost);
        }
        let mut writer = self.writer.lock();
        match write_frame(&mut *writer, msg) {
            Ok(()) => {
                tracing::debug!("transport: sent {msg}");
                Ok(())
            }
            Err(TransportError::Io(e)) => {
                tracing::error!("transport: write failed: {e}");
                self.lost.store(true, Ordering::Release);
                Err(TransportError::TransportLost)
            }
            Err(e) => Err(e),
        }
    }

    /// Takes every queued message without blocking.
    pub fn drain(&self) -> Vec<Message> {
        self.incoming.try_iter().collect()
    }

    /// Takes one queued message without blocking.
    pub fn try_recv(&self) -> Option<Message> {
        self.incoming.try_recv().ok()
    }

    /// Waits up to `timeout` for a message.
    ///
    /// `Ok(None)` on timeout; [`TransportError::TransportLost`] once the peer
    /// is gone and the queue is empty.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Message>, TransportError> {
        match self.incoming.recv_timeout(timeout) {
            Ok(msg) => Ok(Some(msg)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::TransportLost),
        }
    }

    /// Queue receiver, for `select!` loops. Disconnects when the peer is gone.
    pub fn incoming(&self) -> &Receiver<Message> {
        &self.incoming
    }

    /// Whether the peer is gone. Queued messages may still be pending.
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::memory_pipe;
    use crate::protocol::Selector;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn test_pair_delivers_in_order() {
        let (editor, host) = Endpoint::pair().unwrap();
        host.send(&Message::open("0")).unwrap();
        host.send(&Message::load_state("0", "AAAA")).unwrap();

        let first = editor.recv_timeout(WAIT).unwrap().unwrap();
        let second = editor.recv_timeout(WAIT).unwrap().unwrap();
        assert_eq!(first.selector, Selector::Open);
        assert_eq!(second.selector, Selector::LoadState);

        editor.send(&Message::error("0", "oops")).unwrap();
        assert_eq!(host.recv_timeout(WAIT).unwrap(), Some(Message::error("0", "oops")));
    }

    #[test]
    fn test_wrong_direction_refused() {
        let (editor, host) = Endpoint::pair().unwrap();
        assert!(matches!(
            editor.send(&Message::open("0")),
            Err(TransportError::Protocol(_))
        ));
        assert!(matches!(
            host.send(&Message::error("0", "x")),
            Err(TransportError::Protocol(_))
        ));
    }

    #[test]
    fn test_misdirected_frames_dropped() {
        let (mut raw_w, raw_r) = memory_pipe();
        let (sink_w, _sink_r) = memory_pipe();
        let host = Endpoint::new(raw_r, sink_w, Role::Host).unwrap();

        crate::frame::write_frame(&mut raw_w, &Message::open("0")).unwrap();
        crate::frame::write_frame(&mut raw_w, &Message::error("0", "real")).unwrap();

        let msg = host.recv_timeout(WAIT).unwrap().unwrap();
        assert_eq!(msg.selector, Selector::Error);
        assert!(host.drain().is_empty());
    }

    #[test]
    fn test_drain_is_non_blocking() {
        let (editor, _host) = Endpoint::pair().unwrap();
        assert!(editor.drain().is_empty());
        assert!(editor.try_recv().is_none());
    }

    #[test]
    fn test_peer_drop_marks_lost() {
        let (editor, host) = Endpoint::pair().unwrap();
        host.send(&Message::open("9")).unwrap();
        drop(host);

        // Queued message survives the loss.
        assert_eq!(editor.recv_timeout(WAIT).unwrap(), Some(Message::open("9")));
        assert!(matches!(
            editor.recv_timeout(WAIT),
            Err(TransportError::TransportLost)
        ));
        assert!(editor.is_lost());
        assert!(matches!(
            editor.send(&Message::error("9", "late")),
            Err(TransportError::TransportLost)
        ));
    }
}
