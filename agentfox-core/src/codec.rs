//! Length-prefixed JSON framing in two dialects.
//!
//! Both dialects share the shape `[4-byte unsigned length][UTF-8 JSON]` and
//! differ only in endianness and cap: the stream socket speaks big-endian
//! with a 64 MiB cap, the native-messaging link little-endian with the
//! browser's 1 MiB cap.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Header size shared by both dialects.
const HEADER_LEN: usize = 4;

/// Which framing variant a codec instance speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDialect {
    /// Big-endian length, used on the broker's stream socket.
    Ipc,
    /// Little-endian length, used on the relay's stdin/stdout.
    Native,
}

impl FrameDialect {
    /// Maximum payload size accepted or produced.
    pub fn max_len(self) -> usize {
        match self {
            FrameDialect::Ipc => 64 * 1024 * 1024,
            FrameDialect::Native => 1024 * 1024,
        }
    }

    fn read_len(self, header: [u8; HEADER_LEN]) -> usize {
        match self {
            FrameDialect::Ipc => u32::from_be_bytes(header) as usize,
            FrameDialect::Native => u32::from_le_bytes(header) as usize,
        }
    }

    fn write_len(self, len: usize) -> [u8; HEADER_LEN] {
        match self {
            FrameDialect::Ipc => (len as u32).to_be_bytes(),
            FrameDialect::Native => (len as u32).to_le_bytes(),
        }
    }
}

/// Errors from framing and unframing.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame of {len} bytes exceeds the {max}-byte cap")]
    Oversized { len: usize, max: usize },
    #[error("frame payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Encode one message as a framed byte buffer.
pub fn encode_frame<T: Serialize>(dialect: FrameDialect, message: &T) -> Result<Vec<u8>, CodecError> {
    let payload = serde_json::to_vec(message)?;
    if payload.len() > dialect.max_len() {
        return Err(CodecError::Oversized {
            len: payload.len(),
            max: dialect.max_len(),
        });
    }
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.extend_from_slice(&dialect.write_len(payload.len()));
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Incremental decoder: accepts arbitrary chunks, yields complete messages.
///
/// Any trailing partial frame is carried over to the next `push`. A decoder
/// that has reported an error must be `reset` before reuse; reconnections
/// always reset.
#[derive(Debug)]
pub struct FrameDecoder {
    dialect: FrameDialect,
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new(dialect: FrameDialect) -> Self {
        Self {
            dialect,
            buf: Vec::new(),
        }
    }

    /// Feed a chunk; returns every message completed by it, in order.
    ///
    /// An oversized declared length fails fast: the offending header is left
    /// in place and no further data is consumed until `reset`.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Value>, CodecError> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        loop {
            if self.buf.len() < HEADER_LEN {
                return Ok(out);
            }
            let mut header = [0u8; HEADER_LEN];
            header.copy_from_slice(&self.buf[..HEADER_LEN]);
            let len = self.dialect.read_len(header);
            if len > self.dialect.max_len() {
                return Err(CodecError::Oversized {
                    len,
                    max: self.dialect.max_len(),
                });
            }
            if self.buf.len() < HEADER_LEN + len {
                return Ok(out);
            }
            let parsed = serde_json::from_slice(&self.buf[HEADER_LEN..HEADER_LEN + len]);
            // Consume the frame either way so a caller that tolerates bad
            // payloads can keep decoding from the next boundary.
            self.buf.drain(..HEADER_LEN + len);
            out.push(parsed?);
        }
    }

    /// Drop any buffered bytes. Required after an error or a reconnect.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Bytes currently carried over as a partial frame.
    pub fn pending_len(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trip_both_dialects() {
        let msg = json!({"type": "command", "command": {"id": "c1", "action": "navigate"}});
        for dialect in [FrameDialect::Ipc, FrameDialect::Native] {
            let bytes = encode_frame(dialect, &msg).unwrap();
            let mut dec = FrameDecoder::new(dialect);
            let got = dec.push(&bytes).unwrap();
            assert_eq!(got, vec![msg.clone()]);
            assert_eq!(dec.pending_len(), 0);
        }
    }

    #[test]
    fn endianness_differs_between_dialects() {
        let msg = json!({});
        let ipc = encode_frame(FrameDialect::Ipc, &msg).unwrap();
        let native = encode_frame(FrameDialect::Native, &msg).unwrap();
        assert_eq!(ipc[..4], [0, 0, 0, 2]);
        assert_eq!(native[..4], [2, 0, 0, 0]);
    }

    #[test]
    fn arbitrary_chunking_yields_same_messages() {
        let messages: Vec<Value> = (0..5)
            .map(|i| json!({"id": format!("c{i}"), "n": i}))
            .collect();
        let mut stream = Vec::new();
        for m in &messages {
            stream.extend_from_slice(&encode_frame(FrameDialect::Ipc, m).unwrap());
        }

        // Byte-at-a-time, and a few uneven partitions.
        for step in [1usize, 3, 7, stream.len()] {
            let mut dec = FrameDecoder::new(FrameDialect::Ipc);
            let mut got = Vec::new();
            for chunk in stream.chunks(step) {
                got.extend(dec.push(chunk).unwrap());
            }
            assert_eq!(got, messages, "partition step {step}");
        }
    }

    #[test]
    fn two_messages_in_one_push() {
        let a = json!({"id": "c1"});
        let b = json!({"id": "c2"});
        let mut bytes = encode_frame(FrameDialect::Native, &a).unwrap();
        bytes.extend_from_slice(&encode_frame(FrameDialect::Native, &b).unwrap());
        let mut dec = FrameDecoder::new(FrameDialect::Native);
        assert_eq!(dec.push(&bytes).unwrap(), vec![a, b]);
    }

    #[test]
    fn oversized_header_fails_fast_until_reset() {
        let mut dec = FrameDecoder::new(FrameDialect::Native);
        let header = (2 * 1024 * 1024u32).to_le_bytes();
        let err = dec.push(&header).unwrap_err();
        assert!(matches!(err, CodecError::Oversized { .. }));
        // Still poisoned: the same header is re-examined on the next push.
        assert!(dec.push(&[]).is_err());
        dec.reset();
        assert!(dec.push(&[]).unwrap().is_empty());
    }

    #[test]
    fn bad_payload_is_consumed_and_decoding_continues() {
        let good = json!({"id": "c1"});
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(7u32).to_le_bytes());
        bytes.extend_from_slice(b"not js!");
        bytes.extend_from_slice(&encode_frame(FrameDialect::Native, &good).unwrap());

        let mut dec = FrameDecoder::new(FrameDialect::Native);
        assert!(matches!(dec.push(&bytes), Err(CodecError::Payload(_))));
        // The bad frame was consumed; the stream stays in sync.
        assert_eq!(dec.push(&[]).unwrap(), vec![good]);
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let big = json!("x".repeat(2 * 1024 * 1024));
        assert!(matches!(
            encode_frame(FrameDialect::Native, &big),
            Err(CodecError::Oversized { .. })
        ));
        // The socket dialect has headroom for the same message.
        assert!(encode_frame(FrameDialect::Ipc, &big).is_ok());
    }
}
