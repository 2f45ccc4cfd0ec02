//! Reader wrapper that tracks how many bytes of a pack have been consumed
//! while keeping a running SHA-1 hash for trailer verification.

use std::io::{self, BufRead, Read};

use crate::{hash::Hash, utils::RunningHash};

/// Wraps any `BufRead` and accumulates a SHA-1 digest over every byte that
/// passes through `read`/`consume`, so the caller can compare against the
/// pack's trailing 20-byte checksum once the stream is exhausted.
pub struct Wrapper<R> {
    inner: R,
    hash: RunningHash,
    bytes_read: usize,
}

impl<R> Wrapper<R>
where
    R: BufRead,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hash: RunningHash::new(),
            bytes_read: 0,
        }
    }

    pub fn bytes_read(&self) -> usize {
        self.bytes_read
    }

    /// The SHA-1 hash of every byte read so far, without consuming the
    /// wrapper (clones the running digest state).
    pub fn final_hash(&self) -> Hash {
        self.hash.clone().finalize()
    }
}

impl<R> BufRead for Wrapper<R>
where
    R: BufRead,
{
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        let buffer = self.inner.fill_buf().expect("fill_buf before consume");
        self.hash.update(&buffer[..amt]);
        self.inner.consume(amt);
        self.bytes_read += amt;
    }
}

impl<R> Read for Wrapper<R>
where
    R: BufRead,
{
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let o = self.inner.read(buf)?;
        self.hash.update(&buf[..o]);
        self.bytes_read += o;
        Ok(o)
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufReader, Cursor, Read};

    use super::*;

    #[test]
    fn wrapper_passes_bytes_through_unchanged() {
        let data = b"Hello, world!";
        let cursor = Cursor::new(data.as_ref());
        let mut wrapper = Wrapper::new(BufReader::new(cursor));

        let mut buffer = vec![0; data.len()];
        wrapper.read_exact(&mut buffer).unwrap();

        assert_eq!(buffer, data);
    }

    #[test]
    fn wrapper_accumulates_the_expected_hash() {
        let data = b"Hello, world!";
        let cursor = Cursor::new(data.as_ref());
        let mut wrapper = Wrapper::new(BufReader::new(cursor));

        let mut buffer = vec![0; data.len()];
        wrapper.read_exact(&mut buffer).unwrap();

        assert_eq!(wrapper.final_hash(), Hash::of(data));
        assert_eq!(wrapper.bytes_read(), data.len());
    }
}
