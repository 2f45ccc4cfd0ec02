//! Buffered inflate reader that decodes Git's zlib-compressed objects while
//! simultaneously tracking a SHA-1 digest for integrity verification.

use std::{io, io::BufRead};

use flate2::{Decompress, FlushDecompress, Status};

use crate::{internal::object::types::ObjectType, utils::RunningHash};

/// Unzips a DEFLATE stream, itself implementing [`BufRead`]'s sibling trait
/// `Read`. For a continuous stream of DEFLATE data, the structure avoids
/// reading past the end of one object into the bytes of the next.
pub struct ReadBoxed<R> {
    /// The reader from which bytes should be decompressed.
    pub inner: R,
    /// The decompressor doing all the work.
    pub decompressor: Box<Decompress>,
    /// Whether `read` should feed bytes into `hash` as they come out.
    count_hash: bool,
    /// Running hash of the object header and inflated body read so far.
    pub hash: RunningHash,
}

impl<R> ReadBoxed<R>
where
    R: BufRead,
{
    /// A `ReadBoxed` for a plain (non-delta) object: the hash is seeded with
    /// the `<type> <len>\0` header so it ends up equal to the object's id.
    pub fn new(inner: R, obj_type: ObjectType, size: usize) -> Self {
        let mut hash = RunningHash::new();
        hash.update(obj_type.as_str().as_bytes());
        hash.update(b" ");
        hash.update(size.to_string().as_bytes());
        hash.update(b"\0");
        ReadBoxed {
            inner,
            hash,
            count_hash: true,
            decompressor: Box::new(Decompress::new(true)),
        }
    }

    /// A `ReadBoxed` for a delta object's inflated instruction stream, which
    /// isn't itself content-addressed and so needs no hash accumulation.
    pub fn new_for_delta(inner: R) -> Self {
        ReadBoxed {
            inner,
            hash: RunningHash::new(),
            count_hash: false,
            decompressor: Box::new(Decompress::new(true)),
        }
    }
}

impl<R> io::Read for ReadBoxed<R>
where
    R: BufRead,
{
    fn read(&mut self, into: &mut [u8]) -> io::Result<usize> {
        let o = read(&mut self.inner, &mut self.decompressor, into)?;
        if self.count_hash {
            self.hash.update(&into[..o]);
        }
        Ok(o)
    }
}

/// Reads bytes from `rd` and decompresses them using `state` into a
/// pre-sized `dst`, returning the number of bytes written.
fn read(rd: &mut impl BufRead, state: &mut Decompress, mut dst: &mut [u8]) -> io::Result<usize> {
    let mut total_written = 0;
    loop {
        let (written, consumed, ret, eof);
        {
            let input = rd.fill_buf()?;
            eof = input.is_empty();
            let before_out = state.total_out();
            let before_in = state.total_in();
            let flush = if eof {
                FlushDecompress::Finish
            } else {
                FlushDecompress::None
            };
            ret = state.decompress(input, dst, flush);
            written = (state.total_out() - before_out) as usize;
            total_written += written;
            dst = &mut dst[written..];
            consumed = (state.total_in() - before_in) as usize;
        }
        rd.consume(consumed);

        match ret {
            Ok(Status::StreamEnd) => return Ok(total_written),
            Ok(Status::Ok | Status::BufError) if eof || dst.is_empty() => return Ok(total_written),
            Ok(Status::Ok | Status::BufError) if consumed != 0 || written != 0 => continue,
            Ok(Status::Ok | Status::BufError) => unreachable!("zlib made no progress without finishing"),
            Err(..) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "corrupt deflate stream",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use flate2::{Compression, write::ZlibEncoder};

    use super::*;
    use crate::hash::Hash;

    fn zlib_compress(data: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    #[test]
    fn inflate_object_counts_hash() {
        let body = b"hello\n";
        let compressed = zlib_compress(body);
        let cursor = io::Cursor::new(compressed);

        let mut reader = ReadBoxed::new(cursor, ObjectType::Blob, body.len());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, body);

        assert_eq!(
            reader.hash.finalize(),
            Hash::from_type_and_data(ObjectType::Blob, body)
        );
    }

    #[test]
    fn inflate_delta_skips_hash() {
        let body = b"delta bytes";
        let compressed = zlib_compress(body);
        let cursor = io::Cursor::new(compressed);

        let mut reader = ReadBoxed::new_for_delta(cursor);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, body);

        assert_eq!(reader.hash.finalize(), Hash::of(b""));
    }

    #[test]
    fn corrupt_stream_returns_error() {
        let data = b"not a valid zlib stream";
        let mut reader = ReadBoxed::new(io::Cursor::new(data.as_slice()), ObjectType::Blob, data.len());
        let mut out = [0u8; 16];
        let err = reader.read(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
