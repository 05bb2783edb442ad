//! Line codec for tokio.
//!
//! Reads `\n`-terminated lines (an optional preceding `\r` is stripped) as
//! raw bytes so that decoding happens in [`crate::parse_bytes`], and writes
//! `String` payloads followed by `\r\n`.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{self, ProtocolError};

/// Default maximum line length in bytes, terminator included.
pub const DEFAULT_MAX_LINE_LEN: usize = 8192;

/// Line-based codec for protocol traffic.
#[derive(Debug)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    /// Maximum line length
    max_len: usize,
    /// Set while skipping the rest of an over-long line
    discarding: bool,
}

impl LineCodec {
    /// Create a codec with the default maximum line length.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create a codec with a custom maximum line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
            discarding: false,
        }
    }

    /// The configured maximum line length.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_terminator(mut line: BytesMut) -> Bytes {
    if line.last() == Some(&b'\n') {
        line.truncate(line.len() - 1);
    }
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    line.freeze()
}

impl Decoder for LineCodec {
    type Item = Bytes;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> error::Result<Option<Bytes>> {
        loop {
            let newline = src[self.next_index..].iter().position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    // End of the over-long line: drop it and keep scanning.
                    src.advance(self.next_index + offset + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (true, None) => {
                    src.advance(src.len());
                    self.next_index = 0;
                    return Ok(None);
                }
                (false, Some(offset)) => {
                    let end = self.next_index + offset + 1;
                    self.next_index = 0;
                    if end > self.max_len {
                        src.advance(end);
                        tracing::warn!(len = end, limit = self.max_len, "Dropping over-long line");
                        continue;
                    }
                    return Ok(Some(strip_terminator(src.split_to(end))));
                }
                (false, None) => {
                    if src.len() > self.max_len {
                        tracing::warn!(
                            len = src.len(),
                            limit = self.max_len,
                            "Line exceeds limit, discarding until terminator"
                        );
                        self.discarding = true;
                        src.advance(src.len());
                        self.next_index = 0;
                    } else {
                        self.next_index = src.len();
                    }
                    return Ok(None);
                }
            }
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: String, dst: &mut BytesMut) -> error::Result<()> {
        if msg.contains(['\r', '\n']) {
            return Err(ProtocolError::EmbeddedLineBreak);
        }
        if msg.len() + 2 > self.max_len {
            return Err(ProtocolError::LineTooLong {
                actual: msg.len() + 2,
                limit: self.max_len,
            });
        }
        dst.reserve(msg.len() + 2);
        dst.put_slice(msg.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
