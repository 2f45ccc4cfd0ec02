//! Decoder for Git-style delta instructions that rebuilds target objects from a base buffer and the
//! instruction stream produced by `delta::encode` (base size + result size + op codes).

use std::io::{ErrorKind, Read};

use super::{errors::GitDeltaError, utils};

const COPY_INSTRUCTION_FLAG: u8 = 1 << 7; // msb set => copy from base, otherwise inline data
const COPY_OFFSET_BYTES: u8 = 4;
const COPY_SIZE_BYTES: u8 = 3;
const COPY_ZERO_SIZE: usize = 0x10000;

/// Apply a delta stream to `base_info`, returning the reconstructed target bytes.
/// The stream format matches Git's delta encoding (see `delta::encode`):
/// - leading base size, then result size (varint)
/// - sequence of ops: data instructions (msb=0, lower 7 bits = literal length) or copy instructions
///   (msb=1, following bytes encode offset/size).
///
/// Every malformed instruction (a zero-length data op, an out-of-range copy,
/// a final length mismatch) is surfaced as `Err` rather than panicking: this
/// stream is driven by bytes a remote server sent, and a clone/fetch against
/// a compromised or buggy server must not be able to crash the process.
pub fn delta_decode(
    mut stream: &mut impl Read,
    base_info: &[u8],
) -> Result<Vec<u8>, GitDeltaError> {
    let base_size = utils::read_size_encoding(&mut stream)?;
    if base_info.len() != base_size {
        return Err(GitDeltaError::DeltaDecoderError(format!(
            "base object length {} does not match delta's declared base size {}",
            base_info.len(),
            base_size
        )));
    }

    let result_size = utils::read_size_encoding(&mut stream)?;
    let mut buffer = Vec::with_capacity(result_size);
    loop {
        let instruction = match utils::read_bytes(stream) {
            Ok([instruction]) => instruction,
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(GitDeltaError::IOError(err)),
        };

        if instruction & COPY_INSTRUCTION_FLAG == 0 {
            // Data instruction; the instruction byte specifies the number of data bytes.
            if instruction == 0 {
                return Err(GitDeltaError::DeltaDecoderError(
                    "a zero-length data instruction is not a valid delta op".to_string(),
                ));
            }

            let mut data = vec![0; instruction as usize];
            stream.read_exact(&mut data)?;
            buffer.extend_from_slice(&data);
        } else {
            // Copy instruction.
            let mut nonzero_bytes = instruction;
            let offset =
                utils::read_partial_int(&mut stream, COPY_OFFSET_BYTES, &mut nonzero_bytes)?;
            let mut size =
                utils::read_partial_int(&mut stream, COPY_SIZE_BYTES, &mut nonzero_bytes)?;
            if size == 0 {
                // Copying 0 bytes doesn't make sense, so git assumes a different size.
                size = COPY_ZERO_SIZE;
            }
            let base_data = base_info.get(offset..(offset + size)).ok_or_else(|| {
                GitDeltaError::DeltaDecoderError(format!(
                    "copy instruction requests [{offset}, {}) which is out of range for a {}-byte base",
                    offset + size,
                    base_info.len()
                ))
            })?;
            buffer.extend_from_slice(base_data);
        }
    }

    if buffer.len() != result_size {
        return Err(GitDeltaError::DeltaDecoderError(format!(
            "reconstructed {} bytes but delta declared a result size of {result_size}",
            buffer.len()
        )));
    }
    Ok(buffer)
}
