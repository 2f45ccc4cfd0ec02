//! pkt-line framing: the 4-hex-digit length-prefixed record format that
//! wraps every line of a Smart-HTTP v2 request/response, plus side-band
//! demultiplexing for the channel byte a `fetch`/`push` pack stream is
//! wrapped in when `side-band`/`side-band-64k` is negotiated.
//!
//! Malformed framing (a truncated or non-hex length prefix) returns a
//! proper `Err` rather than silently producing an empty line — a client
//! reading a server's response can't just swallow a framing error.
//!
//! `PackDataReader` pulls frames straight off a transport's byte stream
//! instead of a fully-buffered `Bytes`, so a `fetch` response's packfile
//! section can be decoded without ever materialising the whole thing.

use std::io::{self, Read};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::GitError;

use super::capability::SideBand;

pub const FLUSH_PKT: &[u8; 4] = b"0000";
pub const DELIM_PKT: &[u8; 4] = b"0001";
pub const RESPONSE_END_PKT: &[u8; 4] = b"0002";

/// One decoded pkt-line record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// An ordinary data line, payload excluding the 4-byte length prefix.
    Payload(Bytes),
    /// `0000` - ends a list of refs, or a logical section in protocol v2.
    Flush,
    /// `0001` - separates sections within a single protocol v2 response
    /// (e.g. between command and its arguments).
    Delim,
    /// `0002` - terminates the stream of records in a v2 `fetch` response.
    ResponseEnd,
}

/// Reads one pkt-line record from the front of `bytes`, advancing the
/// cursor past it. Returns `Ok(None)` only when `bytes` is exhausted with
/// nothing left to read; any malformed record is an `Err`.
pub fn read_frame(bytes: &mut Bytes) -> Result<Option<Frame>, GitError> {
    if !bytes.has_remaining() {
        return Ok(None);
    }
    if bytes.remaining() < 4 {
        return Err(GitError::InvalidPacketLine(format!(
            "truncated length prefix: only {} byte(s) remain",
            bytes.remaining()
        )));
    }

    let len_field = bytes.copy_to_bytes(4);
    let len = decode_length(len_field.as_ref().try_into().expect("copy_to_bytes(4) yields 4 bytes"))?;

    match len {
        0 => Ok(Some(Frame::Flush)),
        1 => Ok(Some(Frame::Delim)),
        2 => Ok(Some(Frame::ResponseEnd)),
        3 => Err(GitError::InvalidPacketLine(
            "length prefix 0003 is reserved and has no defined meaning".to_string(),
        )),
        len if len < 4 => Err(GitError::InvalidPacketLine(format!(
            "length prefix {len} is shorter than the prefix itself"
        ))),
        len => {
            let data_len = len - 4;
            if bytes.remaining() < data_len {
                return Err(GitError::InvalidPacketLine(format!(
                    "declared {data_len} byte(s) of payload but only {} remain",
                    bytes.remaining()
                )));
            }
            Ok(Some(Frame::Payload(bytes.copy_to_bytes(data_len))))
        }
    }
}

/// Reads every frame out of `bytes` until exhaustion.
pub fn read_all_frames(mut bytes: Bytes) -> Result<Vec<Frame>, GitError> {
    let mut frames = Vec::new();
    while let Some(frame) = read_frame(&mut bytes)? {
        frames.push(frame);
    }
    Ok(frames)
}

/// Decodes a 4-byte hex length prefix into the record it denotes.
fn decode_length(len_field: [u8; 4]) -> Result<usize, GitError> {
    let len_str = core::str::from_utf8(&len_field).map_err(|_| {
        GitError::InvalidPacketLine(format!("non-UTF-8 length prefix {len_field:?}"))
    })?;
    usize::from_str_radix(len_str, 16)
        .map_err(|_| GitError::InvalidPacketLine(format!("non-hex length prefix {len_str:?}")))
}

/// Reads `buf.len()` bytes from `reader`, distinguishing a clean EOF before
/// any byte arrives (`Ok(false)`) from a truncated read partway through
/// (`Err`).
fn read_exact_or_clean_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<bool, GitError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(GitError::InvalidPacketLine(format!(
                "truncated length prefix: only {filled} byte(s) remain"
            )));
        }
        filled += n;
    }
    Ok(true)
}

/// Reads one pkt-line record directly off a `Read` stream, rather than out
/// of an already-fully-buffered `Bytes`. Returns `Ok(None)` on a clean EOF
/// before the next record's length prefix.
pub fn read_frame_from<R: Read>(reader: &mut R) -> Result<Option<Frame>, GitError> {
    let mut len_field = [0u8; 4];
    if !read_exact_or_clean_eof(reader, &mut len_field)? {
        return Ok(None);
    }
    let len = decode_length(len_field)?;
    match len {
        0 => Ok(Some(Frame::Flush)),
        1 => Ok(Some(Frame::Delim)),
        2 => Ok(Some(Frame::ResponseEnd)),
        3 => Err(GitError::InvalidPacketLine(
            "length prefix 0003 is reserved and has no defined meaning".to_string(),
        )),
        len if len < 4 => Err(GitError::InvalidPacketLine(format!(
            "length prefix {len} is shorter than the prefix itself"
        ))),
        len => {
            let data_len = len - 4;
            let mut data = vec![0u8; data_len];
            reader.read_exact(&mut data).map_err(|e| {
                GitError::InvalidPacketLine(format!(
                    "declared {data_len} byte(s) of payload but reading failed: {e}"
                ))
            })?;
            Ok(Some(Frame::Payload(Bytes::from(data))))
        }
    }
}

/// Pulls a `fetch` response's `packfile` section directly off a transport's
/// byte stream, demultiplexing side-band frames as they arrive and
/// yielding only the pack-data bytes. Progress frames are discarded; an
/// error-channel frame fails the read.
///
/// Everything before the `packfile\n` section marker (acknowledgments,
/// shallow-info, wanted-refs) is small and control-plane only, so it is
/// read and discarded frame-by-frame rather than surfaced to the caller.
pub struct PackDataReader<R> {
    inner: R,
    leftover: Bytes,
    in_packfile_section: bool,
    saw_packfile: bool,
    done: bool,
}

impl<R: Read> PackDataReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            leftover: Bytes::new(),
            in_packfile_section: false,
            saw_packfile: false,
            done: false,
        }
    }

    /// Whether a `packfile\n` section marker has been seen yet.
    pub fn saw_packfile(&self) -> bool {
        self.saw_packfile
    }

    fn fill_leftover(&mut self) -> io::Result<bool> {
        loop {
            let frame = read_frame_from(&mut self.inner)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
            match frame {
                None | Some(Frame::Flush) | Some(Frame::ResponseEnd) => return Ok(false),
                Some(Frame::Delim) => {
                    self.in_packfile_section = false;
                }
                Some(Frame::Payload(payload)) => {
                    if !self.in_packfile_section {
                        if payload.as_ref() == b"packfile\n" {
                            self.in_packfile_section = true;
                            self.saw_packfile = true;
                        }
                        continue;
                    }
                    match demux_side_band(payload)
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?
                    {
                        SideBandFrame::PackData(data) => {
                            if data.is_empty() {
                                continue;
                            }
                            self.leftover = data;
                            return Ok(true);
                        }
                        SideBandFrame::Progress(msg) => {
                            tracing::trace!(message = %String::from_utf8_lossy(&msg), "fetch progress");
                        }
                        SideBandFrame::Error(msg) => {
                            return Err(io::Error::new(
                                io::ErrorKind::Other,
                                format!(
                                    "server reported a fatal error: {}",
                                    String::from_utf8_lossy(&msg)
                                ),
                            ));
                        }
                    }
                }
            }
        }
    }
}

impl<R: Read> Read for PackDataReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done {
            return Ok(0);
        }
        if self.leftover.is_empty() && !self.fill_leftover()? {
            self.done = true;
            return Ok(0);
        }
        let n = buf.len().min(self.leftover.len());
        buf[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover = self.leftover.slice(n..);
        Ok(n)
    }
}

/// Encodes `payload` as a single pkt-line record (length prefix + body).
pub fn write_frame(out: &mut BytesMut, payload: &[u8]) {
    let total = payload.len() + 4;
    out.put(Bytes::from(format!("{total:04x}")));
    out.put(payload);
}

pub fn write_str(out: &mut BytesMut, line: &str) {
    write_frame(out, line.as_bytes());
}

pub fn write_flush(out: &mut BytesMut) {
    out.put(&FLUSH_PKT[..]);
}

pub fn write_delim(out: &mut BytesMut) {
    out.put(&DELIM_PKT[..]);
}

/// One de-multiplexed side-band record: which channel it arrived on, and
/// its payload (pack data, progress text, or a fatal error message).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideBandFrame {
    PackData(Bytes),
    Progress(Bytes),
    Error(Bytes),
}

/// Splits a side-band-wrapped payload (the body of a `Frame::Payload`) into
/// its channel byte and remaining data.
pub fn demux_side_band(payload: Bytes) -> Result<SideBandFrame, GitError> {
    if payload.is_empty() {
        return Err(GitError::InvalidPacketLine(
            "side-band payload is empty, missing channel byte".to_string(),
        ));
    }
    let channel = payload[0];
    let data = payload.slice(1..);
    if channel == SideBand::PackfileData.value() {
        Ok(SideBandFrame::PackData(data))
    } else if channel == SideBand::ProgressInfo.value() {
        Ok(SideBandFrame::Progress(data))
    } else if channel == SideBand::Error.value() {
        Ok(SideBandFrame::Error(data))
    } else {
        Err(GitError::InvalidPacketLine(format!(
            "unrecognised side-band channel byte {channel:#04x}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_a_payload_frame() {
        let mut bytes = Bytes::from_static(b"0009done\n");
        let frame = read_frame(&mut bytes).unwrap().unwrap();
        assert_eq!(frame, Frame::Payload(Bytes::from_static(b"done\n")));
        assert!(bytes.is_empty());
    }

    #[test]
    fn reads_flush_delim_and_response_end() {
        for (marker, expected) in [
            (&b"0000"[..], Frame::Flush),
            (&b"0001"[..], Frame::Delim),
            (&b"0002"[..], Frame::ResponseEnd),
        ] {
            let mut bytes = Bytes::copy_from_slice(marker);
            assert_eq!(read_frame(&mut bytes).unwrap().unwrap(), expected);
        }
    }

    #[test]
    fn rejects_truncated_length_prefix() {
        let mut bytes = Bytes::from_static(b"00");
        assert!(read_frame(&mut bytes).is_err());
    }

    #[test]
    fn rejects_non_hex_length_prefix() {
        let mut bytes = Bytes::from_static(b"zzzzhello");
        assert!(read_frame(&mut bytes).is_err());
    }

    #[test]
    fn rejects_payload_shorter_than_declared() {
        let mut bytes = Bytes::from_static(b"0020short");
        assert!(read_frame(&mut bytes).is_err());
    }

    #[test]
    fn round_trips_write_and_read() {
        let mut out = BytesMut::new();
        write_str(&mut out, "want deadbeef\n");
        write_flush(&mut out);
        let mut bytes = out.freeze();
        let frames = read_all_frames(bytes.split_off(0)).unwrap();
        assert_eq!(
            frames,
            vec![
                Frame::Payload(Bytes::from_static(b"want deadbeef\n")),
                Frame::Flush,
            ]
        );
    }

    #[test]
    fn demuxes_pack_progress_and_error_channels() {
        assert_eq!(
            demux_side_band(Bytes::from_static(b"\x01PACKDATA")).unwrap(),
            SideBandFrame::PackData(Bytes::from_static(b"PACKDATA"))
        );
        assert_eq!(
            demux_side_band(Bytes::from_static(b"\x02counting objects")).unwrap(),
            SideBandFrame::Progress(Bytes::from_static(b"counting objects"))
        );
        assert_eq!(
            demux_side_band(Bytes::from_static(b"\x03fatal: broken")).unwrap(),
            SideBandFrame::Error(Bytes::from_static(b"fatal: broken"))
        );
    }

    #[test]
    fn rejects_unknown_channel_byte() {
        assert!(demux_side_band(Bytes::from_static(b"\x09oops")).is_err());
    }

    #[test]
    fn read_frame_from_matches_read_frame_over_a_reader() {
        let mut out = BytesMut::new();
        write_str(&mut out, "want deadbeef\n");
        write_flush(&mut out);
        let mut cursor = std::io::Cursor::new(out.to_vec());
        assert_eq!(
            read_frame_from(&mut cursor).unwrap().unwrap(),
            Frame::Payload(Bytes::from_static(b"want deadbeef\n"))
        );
        assert_eq!(read_frame_from(&mut cursor).unwrap().unwrap(), Frame::Flush);
        assert!(read_frame_from(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn read_frame_from_rejects_a_length_prefix_cut_off_mid_read() {
        let mut cursor = std::io::Cursor::new(b"00".to_vec());
        assert!(read_frame_from(&mut cursor).is_err());
    }

    #[test]
    fn pack_data_reader_demuxes_and_concatenates_pack_chunks() {
        let mut raw = BytesMut::new();
        write_str(&mut raw, "packfile\n");
        write_frame(&mut raw, b"\x02counting objects");
        write_frame(&mut raw, b"\x01PACK1");
        write_frame(&mut raw, b"\x01PACK2");
        write_flush(&mut raw);

        let mut pack_reader = PackDataReader::new(std::io::Cursor::new(raw.to_vec()));
        let mut out = Vec::new();
        pack_reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"PACK1PACK2");
        assert!(pack_reader.saw_packfile());
    }

    #[test]
    fn pack_data_reader_reports_no_packfile_section() {
        let mut raw = BytesMut::new();
        write_flush(&mut raw);
        let mut pack_reader = PackDataReader::new(std::io::Cursor::new(raw.to_vec()));
        let mut out = Vec::new();
        pack_reader.read_to_end(&mut out).unwrap();
        assert!(out.is_empty());
        assert!(!pack_reader.saw_packfile());
    }

    #[test]
    fn pack_data_reader_surfaces_the_error_channel() {
        let mut raw = BytesMut::new();
        write_str(&mut raw, "packfile\n");
        write_frame(&mut raw, b"\x03fatal: broken");
        write_flush(&mut raw);
        let mut pack_reader = PackDataReader::new(std::io::Cursor::new(raw.to_vec()));
        let mut out = Vec::new();
        assert!(pack_reader.read_to_end(&mut out).is_err());
    }

    quickcheck::quickcheck! {
        /// Any non-empty payload under the 4-hex-digit length cap round-trips
        /// through `write_frame`/`read_frame` byte-for-byte.
        fn frame_round_trips_arbitrary_payloads(payload: Vec<u8>) -> bool {
            let payload = &payload[..payload.len().min(0xfff0 - 4)];
            let mut out = BytesMut::new();
            write_frame(&mut out, payload);
            let mut bytes = out.freeze();
            match read_frame(&mut bytes) {
                Ok(Some(Frame::Payload(p))) => p.as_ref() == payload,
                _ => false,
            }
        }
    }
}
