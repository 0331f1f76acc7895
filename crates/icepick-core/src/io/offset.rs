//! Byte accounting for a growing payload.

use std::io::{self, Write};

/// Wraps a writer and tracks how many bytes have been appended to it.
///
/// Growth is gapless: after `append(b)` returns `Ok`, `mark()` equals the
/// previous mark plus `b.len()`. A failed append does not advance the mark;
/// the underlying writer may hold a partial chunk, so the stream is abandoned.
#[derive(Debug)]
pub struct OffsetTracker<W> {
    inner: W,
    written: u64,
}

impl<W: Write> OffsetTracker<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Current size of the stream.
    pub fn mark(&self) -> u64 {
        self.written
    }

    /// Append a chunk and return its byte length.
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<u64> {
        self.inner.write_all(bytes)?;
        let len = bytes.len() as u64;
        self.written += len;
        Ok(len)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}
