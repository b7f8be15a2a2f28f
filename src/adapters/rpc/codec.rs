//! Newline-delimited framing with a per-line size limit.
//!
//! Unlike a plain lines codec, an over-long line is not a stream error: it is
//! skipped up to the next newline and reported as [`Frame::Oversized`], so
//! one bad request does not end the connection.

use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

/// One decoded unit of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete line, without its terminator.
    Line(String),
    /// A line longer than the limit was discarded.
    Oversized { len: usize },
    /// A line that was not valid UTF-8 was discarded.
    InvalidUtf8,
}

#[derive(Debug, Clone)]
pub struct NdjsonCodec {
    max_line_bytes: usize,
    /// Bytes of the buffer already searched for a newline.
    next_index: usize,
    /// Bytes dropped so far from an over-long line.
    discarding: Option<usize>,
}

impl NdjsonCodec {
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            max_line_bytes,
            next_index: 0,
            discarding: None,
        }
    }

    fn finish_line(&mut self, mut raw: BytesMut) -> Frame {
        if raw.last() == Some(&b'\r') {
            raw.truncate(raw.len() - 1);
        }
        match String::from_utf8(raw.to_vec()) {
            Ok(text) => Frame::Line(text),
            Err(_) => Frame::InvalidUtf8,
        }
    }
}

/// Length of `buf[..end]` without a trailing `\r`, which belongs to the
/// terminator.
fn content_len(buf: &[u8], end: usize) -> usize {
    end - usize::from(end > 0 && buf[end - 1] == b'\r')
}

impl Decoder for NdjsonCodec {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        let newline = buf[self.next_index..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|offset| self.next_index + offset);

        match (self.discarding, newline) {
            (Some(dropped), Some(pos)) => {
                buf.advance(pos + 1);
                self.next_index = 0;
                self.discarding = None;
                Ok(Some(Frame::Oversized { len: dropped + pos }))
            }
            (Some(dropped), None) => {
                let len = buf.len();
                buf.advance(len);
                self.next_index = 0;
                self.discarding = Some(dropped + len);
                Ok(None)
            }
            (None, Some(pos)) if content_len(buf, pos) > self.max_line_bytes => {
                let len = content_len(buf, pos);
                buf.advance(pos + 1);
                self.next_index = 0;
                Ok(Some(Frame::Oversized { len }))
            }
            (None, Some(pos)) => {
                let mut raw = buf.split_to(pos + 1);
                raw.truncate(pos);
                self.next_index = 0;
                Ok(Some(self.finish_line(raw)))
            }
            (None, None) if content_len(buf, buf.len()) > self.max_line_bytes => {
                let len = buf.len();
                buf.advance(len);
                self.next_index = 0;
                self.discarding = Some(len);
                Ok(None)
            }
            (None, None) => {
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }

        if let Some(dropped) = self.discarding.take() {
            return Ok(Some(Frame::Oversized { len: dropped }));
        }
        if buf.is_empty() {
            return Ok(None);
        }

        // Last line without a trailing newline.
        let raw = buf.split();
        self.next_index = 0;
        Ok(Some(self.finish_line(raw)))
    }
}
