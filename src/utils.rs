//! Shared I/O utilities: buffered-reader helpers and a SHA-1 write-through hasher.

use std::io::{self, BufRead, Read};

use sha1::{Digest, Sha1};

use crate::hash::Hash;

pub fn read_bytes(file: &mut impl Read, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

pub fn read_hash(file: &mut impl Read) -> io::Result<Hash> {
    Hash::from_stream(file)
}

/// A lightweight wrapper that counts bytes read from the underlying reader.
pub struct CountingReader<R> {
    pub inner: R,
    pub bytes_read: u64,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            bytes_read: 0,
        }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.bytes_read += n as u64;
        Ok(n)
    }
}

impl<R: BufRead> BufRead for CountingReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        self.inner.fill_buf()
    }

    fn consume(&mut self, amt: usize) {
        self.bytes_read += amt as u64;
        self.inner.consume(amt);
    }
}

/// SHA-1 accumulator that can be fed incrementally via `std::io::Write`, used
/// by the inflater to hash an object's header+body as it streams through and
/// by the pack wrapper to verify the trailing checksum.
#[derive(Clone, Default)]
pub struct RunningHash(Sha1);

impl RunningHash {
    pub fn new() -> Self {
        Self(Sha1::new())
    }

    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    pub fn finalize(self) -> Hash {
        let digest = self.0.finalize();
        Hash::from_bytes(digest.as_ref()).expect("sha1 digest is always 20 bytes")
    }
}

impl io::Write for RunningHash {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_reader_tracks_bytes() {
        let data = b"hello world".to_vec();
        let mut reader = CountingReader::new(std::io::Cursor::new(data));
        let mut buf = [0u8; 5];
        reader.read_exact(&mut buf).unwrap();
        assert_eq!(reader.bytes_read, 5);
    }

    #[test]
    fn running_hash_matches_hash_of() {
        let mut h = RunningHash::new();
        h.update(b"Hello, world!");
        assert_eq!(h.finalize(), Hash::of(b"Hello, world!"));
    }
}
