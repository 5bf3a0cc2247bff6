//! Helper module to track how far into the archive stream we are

use std::io;
use std::io::prelude::*;

/// Reader that counts the bytes its inner reader has produced,
/// so errors can point at where in the stream they happened.
pub struct OffsetReader<R> {
    inner: R,
    offset: u64,
}

impl<R> OffsetReader<R> {
    pub fn new(inner: R) -> OffsetReader<R> {
        OffsetReader { inner, offset: 0 }
    }

    /// Returns the number of bytes read so far
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl<R: Read> Read for OffsetReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        self.offset += count as u64;
        Ok(count)
    }
}
