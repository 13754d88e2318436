//! Length-prefixed frame codec.
//!
//! ```text
//! u32 LE  body length
//! body:   postcard-encoded Message
//! ```

use std::io::{ErrorKind, Read, Write};

use crate::error::TransportError;
use crate::protocol::Message;

/// Largest body accepted by [`read_frame`].
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

/// Writes one message and flushes.
pub fn write_frame<W: Write>(mut w: W, msg: &Message) -> Result<(), TransportError> {
    let body = postcard::to_stdvec(msg)?;
    if body.len() > MAX_FRAME_BYTES {
        return Err(TransportError::protocol("frame too large"));
    }
    let len = body.len() as u32;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(&body)?;
    w.flush()?;
    Ok(())
}

/// Reads one message.
///
/// Returns `Ok(None)` on a clean end of stream between frames. An end of
/// stream inside a frame is an I/O error.
pub fn read_frame<R: Read>(mut r: R) -> Result<Option<Message>, TransportError> {
    let mut len_bytes = [0u8; 4];
    match r.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(TransportError::protocol(format!("frame of {len} bytes too large")));
    }
    let mut body = vec![0u8; len];
    r.read_exact(&mut body)?;

    let (msg, rest): (Message, &[u8]) = postcard::take_from_bytes(&body)?;
    if !rest.is_empty() {
        return Err(TransportError::protocol(format!("{} trailing bytes in frame", rest.len())));
    }
    Message::new(msg.target, msg.selector, msg.payload).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Selector;
    use std::io::Cursor;

    fn encode(msg: &Message) -> Vec<u8> {
        let mut buf = Vec::new();
        write_frame(&mut buf, msg).unwrap();
        buf
    }

    fn framed(body: &[u8]) -> Vec<u8> {
        let mut buf = (body.len() as u32).to_le_bytes().to_vec();
        buf.extend_from_slice(body);
        buf
    }

    #[test]
    fn test_length_prefix_covers_body() {
        let msg = Message::open("7");
        let buf = encode(&msg);
        let body = postcard::to_stdvec(&msg).unwrap();
        assert_eq!(&buf[..4], &(body.len() as u32).to_le_bytes());
        assert_eq!(&buf[4..], &body[..]);
    }

    #[test]
    fn test_sequence_then_clean_eof() {
        let mut buf = encode(&Message::open("0"));
        buf.extend(encode(&Message::error("0", "bad; thing\n")));
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), Some(Message::open("0")));
        assert_eq!(
            read_frame(&mut cursor).unwrap(),
            Some(Message::error("0", "bad; thing\n"))
        );
        assert_eq!(read_frame(&mut cursor).unwrap(), None);
    }

    #[test]
    fn test_empty_payload_distinct_from_none() {
        let msg = Message::error("0", "");
        let back = read_frame(Cursor::new(encode(&msg))).unwrap().unwrap();
        assert_eq!(back.payload.as_deref(), Some(""));
    }

    #[test]
    fn test_truncated_frame_is_error() {
        let buf = encode(&Message::open("0"));
        let cut = &buf[..buf.len() - 2];
        assert!(matches!(read_frame(Cursor::new(cut)), Err(TransportError::Io(_))));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let buf = (MAX_FRAME_BYTES as u32 + 1).to_le_bytes();
        assert!(matches!(read_frame(Cursor::new(buf)), Err(TransportError::Protocol(_))));
    }

    #[test]
    fn test_unknown_selector_rejected() {
        // target "0", then a selector discriminant past the last variant.
        let buf = framed(&[1, b'0', 42, 0]);
        assert!(matches!(read_frame(Cursor::new(buf)), Err(TransportError::Codec(_))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut body = postcard::to_stdvec(&Message::close("0")).unwrap();
        body.push(0);
        let err = read_frame(Cursor::new(framed(&body))).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_payload_presence_checked_on_read() {
        let forged = Message {
            target: "0".into(),
            selector: Selector::Open,
            payload: Some("x".into()),
        };
        let buf = encode(&forged);
        assert!(matches!(read_frame(Cursor::new(buf)), Err(TransportError::Protocol(_))));
    }
}
