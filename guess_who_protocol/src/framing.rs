// Length-delimited JSON framing for `Message` over byte streams.
//
// Wire format: a 4-byte big-endian length prefix followed by the JSON
// encoding of one `Message`. `write_frame` / `read_frame` work over any
// `Write` / `Read`, so the same code serves blocking TCP streams, buffered
// wrappers, and in-memory cursors in tests.
//
// `MAX_FRAME_SIZE` (64 KiB) bounds the allocation a malformed or hostile
// length prefix can trigger. The largest legitimate message is an
// `ASSIGN_ID` roster or a long chat line, both far below the limit.
//
// Error split: `FrameError::Io` means the stream itself is gone (EOF,
// reset) and the caller should treat the link as closed. `FrameError::Decode`
// means one frame was consumed but its payload was not valid JSON for
// `Message`; the stream stays usable and the caller may skip it.

use std::io::{self, Read, Write};

use thiserror::Error;

use crate::message::Message;

/// Maximum encoded payload size accepted in either direction.
pub const MAX_FRAME_SIZE: u32 = 64 * 1024;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("frame too large: {len} bytes (max {MAX_FRAME_SIZE})")]
    TooLarge { len: usize },

    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

impl FrameError {
    /// True when the underlying stream reached EOF cleanly.
    pub fn is_eof(&self) -> bool {
        matches!(self, FrameError::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }

    /// True when the stream is still positioned at a frame boundary and
    /// reading may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::Decode(_))
    }
}

/// Encode `msg` as JSON and write it with a length prefix. Flushes.
pub fn write_frame<W: Write>(writer: &mut W, msg: &Message) -> Result<(), FrameError> {
    let payload = serde_json::to_vec(msg).map_err(FrameError::Encode)?;
    let len = payload.len();
    let len_prefix = u32::try_from(len)
        .ok()
        .filter(|l| *l <= MAX_FRAME_SIZE)
        .ok_or(FrameError::TooLarge { len })?;
    writer.write_all(&len_prefix.to_be_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one length-prefixed frame and decode it.
///
/// Returns `FrameError::Io` with `UnexpectedEof` if the stream closes before
/// or during a frame, and `FrameError::TooLarge` if the prefix exceeds
/// `MAX_FRAME_SIZE` (the stream is unusable afterwards).
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Message, FrameError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_SIZE {
        return Err(FrameError::TooLarge { len: len as usize });
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload)?;
    serde_json::from_slice(&payload).map_err(FrameError::Decode)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::types::PlayerIndex;

    fn raw_frame(payload: &[u8]) -> Vec<u8> {
        let mut buf = (payload.len() as u32).to_be_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn frames_carry_json_payloads() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &Message::Seed { value: 7 }).unwrap();
        let payload = &buf[4..];
        assert_eq!(u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize, payload.len());
        assert_eq!(payload, br#"{"type":"SEED","value":7}"#);
    }

    #[test]
    fn several_frames_in_sequence() {
        let messages = vec![
            Message::Seed { value: 12345 },
            Message::AssignId {
                id: PlayerIndex(2),
                players: vec![PlayerIndex(1), PlayerIndex(2)],
            },
            Message::LobbyClosed,
        ];
        let mut buf = Vec::new();
        for msg in &messages {
            write_frame(&mut buf, msg).unwrap();
        }
        let mut cursor = Cursor::new(buf);
        for expected in &messages {
            assert_eq!(&read_frame(&mut cursor).unwrap(), expected);
        }
        assert!(read_frame(&mut cursor).unwrap_err().is_eof());
    }

    #[test]
    fn rejects_oversized_write() {
        let msg = Message::Chat {
            from: PlayerIndex(1),
            message: "x".repeat(MAX_FRAME_SIZE as usize),
        };
        let mut buf = Vec::new();
        let err = write_frame(&mut buf, &msg).unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { .. }));
        assert!(buf.is_empty(), "nothing should be written for an oversized frame");
    }

    #[test]
    fn rejects_oversized_read() {
        let fake_len = (MAX_FRAME_SIZE + 1).to_be_bytes();
        let mut cursor = Cursor::new(fake_len.to_vec());
        let err = read_frame(&mut cursor).unwrap_err();
        assert!(matches!(err, FrameError::TooLarge { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn truncated_prefix_is_eof() {
        let mut cursor = Cursor::new(vec![0u8, 1]);
        assert!(read_frame(&mut cursor).unwrap_err().is_eof());
    }

    #[test]
    fn malformed_payload_is_recoverable() {
        let mut buf = raw_frame(b"{not json");
        buf.extend(raw_frame(br#"{"type":"READY"}"#));
        let mut cursor = Cursor::new(buf);

        let err = read_frame(&mut cursor).unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(read_frame(&mut cursor).unwrap(), Message::Ready);
    }
}
