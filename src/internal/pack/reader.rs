//! Reads a Git packfile (as received over Smart-HTTP v2's `fetch` side-band)
//! into a flat list of resolved objects, following the [pack-format
//! spec](https://git-scm.com/docs/pack-format).
//!
//! Objects are decoded in a single streaming pass over `source`: nothing
//! beyond the currently-inflating object's content is ever held in memory,
//! and the trailer checksum is verified against a hash accumulated
//! incrementally as bytes pass through, rather than rehashed over a
//! buffered copy. Deltas whose base hasn't been seen yet go on a waitlist
//! keyed by the base's offset/hash and are resolved (and cascaded to
//! anything waiting on them) the moment that base becomes available.

use std::{
    collections::HashMap,
    io::{BufReader, Read},
};

use byteorder::{BigEndian, ReadBytesExt};

use crate::{
    delta::decode::delta_decode,
    errors::GitError,
    hash::Hash,
    internal::{
        object::types::ObjectType,
        pack::{entry::Entry, waitlist::Waitlist, wrapper::Wrapper},
        zlib::stream::inflate::ReadBoxed,
    },
};

const OBJ_OFS_DELTA: u8 = 6;
const OBJ_REF_DELTA: u8 = 7;

/// An undecoded delta, parked until its base object resolves.
struct PendingDelta {
    offset: usize,
    delta_data: Vec<u8>,
}

/// The result of reading a pack: every resolved object plus the trailer
/// hash the server claimed for the whole stream.
pub struct ParsedPack {
    pub entries: Vec<Entry>,
    pub pack_hash: Hash,
}

/// Parses a complete packfile read from `source`, resolving every
/// OFS_DELTA/REF_DELTA entry against its base before returning. `source`
/// must yield the leading `PACK` signature through the trailing 20-byte
/// checksum, in that order, with nothing else interleaved.
pub fn read_pack<R: Read>(source: R) -> Result<ParsedPack, GitError> {
    let mut reader = Wrapper::new(BufReader::new(source));

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != b"PACK" {
        return Err(GitError::NoPackfileSignature);
    }
    let version = reader.read_u32::<BigEndian>()?;
    if version != 2 && version != 3 {
        return Err(GitError::UnsupportedPackfileVersion(version));
    }
    let count = reader.read_u32::<BigEndian>()? as usize;

    let mut offset_index: HashMap<usize, Entry> = HashMap::new();
    let mut hash_index: HashMap<Hash, Entry> = HashMap::new();
    let mut waiting: Waitlist<PendingDelta> = Waitlist::new();

    for _ in 0..count {
        let offset = reader.bytes_read();
        let (obj_type_code, size) = read_object_header(&mut reader)?;

        match obj_type_code {
            1..=4 => {
                let obj_type = ObjectType::from_pack_type_u8(obj_type_code)?;
                let mut object_reader = ReadBoxed::new(&mut reader, obj_type, size);
                let mut content = Vec::with_capacity(size);
                object_reader.read_to_end(&mut content)?;
                let hash = object_reader.hash.finalize();
                let entry = Entry {
                    obj_type,
                    data: content,
                    hash,
                    chain_len: 0,
                };
                resolve_and_cascade(offset, entry, &mut offset_index, &mut hash_index, &mut waiting)?;
            }
            OBJ_OFS_DELTA => {
                let base_offset = offset - read_negative_offset(&mut reader)?;
                let mut object_reader = ReadBoxed::new_for_delta(&mut reader);
                let mut delta_data = Vec::with_capacity(size);
                object_reader.read_to_end(&mut delta_data)?;
                queue_or_resolve(
                    offset,
                    Some(base_offset),
                    None,
                    delta_data,
                    &mut offset_index,
                    &mut hash_index,
                    &mut waiting,
                )?;
            }
            OBJ_REF_DELTA => {
                let mut base_bytes = [0u8; 20];
                reader.read_exact(&mut base_bytes)?;
                let base_hash = Hash::from_bytes(&base_bytes).map_err(GitError::InvalidHashValue)?;
                let mut object_reader = ReadBoxed::new_for_delta(&mut reader);
                let mut delta_data = Vec::with_capacity(size);
                object_reader.read_to_end(&mut delta_data)?;
                queue_or_resolve(
                    offset,
                    None,
                    Some(base_hash),
                    delta_data,
                    &mut offset_index,
                    &mut hash_index,
                    &mut waiting,
                )?;
            }
            other => {
                return Err(GitError::InvalidPackHeader(format!(
                    "unsupported pack object type code {other}"
                )));
            }
        }
    }

    let computed = reader.final_hash();

    let mut trailer = [0u8; 20];
    reader.read_exact(&mut trailer)?;
    if computed.as_ref() != trailer {
        return Err(GitError::InvalidPackHeader(format!(
            "trailer checksum {} does not match computed {computed}",
            hex::encode(trailer)
        )));
    }

    if !waiting.is_empty() {
        return Err(GitError::InvalidDelta(format!(
            "could not resolve base object(s) for delta entries at offsets {:?}; the pack may be a thin pack referencing objects outside it",
            waiting.offsets()
        )));
    }

    let mut entries: Vec<Entry> = offset_index.into_values().collect();
    entries.sort_by_key(|e| e.hash);
    entries.dedup_by_key(|e| e.hash);

    Ok(ParsedPack {
        entries,
        pack_hash: computed,
    })
}

/// Looks up `delta`'s base immediately; resolves it in place if found,
/// otherwise parks it on `waiting` under whichever key it's missing.
fn queue_or_resolve(
    offset: usize,
    base_offset: Option<usize>,
    base_hash: Option<Hash>,
    delta_data: Vec<u8>,
    offset_index: &mut HashMap<usize, Entry>,
    hash_index: &mut HashMap<Hash, Entry>,
    waiting: &mut Waitlist<PendingDelta>,
) -> Result<(), GitError> {
    let base = match (base_offset, base_hash) {
        (Some(o), _) => offset_index.get(&o).cloned(),
        (None, Some(h)) => hash_index.get(&h).cloned(),
        (None, None) => None,
    };
    match base {
        Some(base) => {
            let entry = apply_delta(offset, &delta_data, &base)?;
            resolve_and_cascade(offset, entry, offset_index, hash_index, waiting)?;
        }
        None => {
            let pending = PendingDelta { offset, delta_data };
            match (base_offset, base_hash) {
                (Some(o), _) => waiting.insert_offset(o, pending),
                (None, Some(h)) => waiting.insert_hash(h, pending),
                (None, None) => unreachable!("a delta always carries exactly one base key"),
            }
        }
    }
    Ok(())
}

/// Records `entry` as resolved at `offset`, then drains and resolves every
/// delta that was waiting on this offset or hash, recursively.
fn resolve_and_cascade(
    offset: usize,
    entry: Entry,
    offset_index: &mut HashMap<usize, Entry>,
    hash_index: &mut HashMap<Hash, Entry>,
    waiting: &mut Waitlist<PendingDelta>,
) -> Result<(), GitError> {
    let hash = entry.hash;
    offset_index.insert(offset, entry.clone());
    hash_index.insert(hash, entry.clone());

    for pending in waiting.take(offset, hash) {
        let resolved = apply_delta(pending.offset, &pending.delta_data, &entry)?;
        resolve_and_cascade(pending.offset, resolved, offset_index, hash_index, waiting)?;
    }
    Ok(())
}

fn apply_delta(offset: usize, delta_data: &[u8], base: &Entry) -> Result<Entry, GitError> {
    let mut delta_reader = std::io::Cursor::new(delta_data);
    let resolved = delta_decode(&mut delta_reader, &base.data)
        .map_err(|e| GitError::InvalidDelta(format!("delta at pack offset {offset}: {e}")))?;
    let hash = Hash::from_type_and_data(base.obj_type, &resolved);
    Ok(Entry {
        obj_type: base.obj_type,
        data: resolved,
        hash,
        chain_len: base.chain_len + 1,
    })
}

/// Reads the varint object header: first byte carries the 3-bit type code
/// in bits 4-6 and the low 4 bits of size; each continuation byte adds 7
/// more size bits.
fn read_object_header<R: Read>(reader: &mut R) -> Result<(u8, usize), GitError> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    let mut byte = byte[0];

    let obj_type = (byte >> 4) & 0b0111;
    let mut size = (byte & 0x0f) as usize;
    let mut shift = 4;

    while byte & 0x80 != 0 {
        reader.read_exact(std::slice::from_mut(&mut byte))?;
        size |= ((byte & 0x7f) as usize) << shift;
        shift += 7;
    }

    Ok((obj_type, size))
}

/// OFS_DELTA's offset encoding: unlike the object header, this is NOT a
/// plain little-endian varint — each continuation adds `1 << (7*k)` before
/// shifting, per the pack format's documented quirk.
fn read_negative_offset<R: Read>(reader: &mut R) -> Result<usize, GitError> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    let mut byte = byte[0];
    let mut value = (byte & 0x7f) as usize;

    while byte & 0x80 != 0 {
        reader.read_exact(std::slice::from_mut(&mut byte))?;
        value += 1;
        value = (value << 7) | (byte & 0x7f) as usize;
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::pack::writer::write_pack;

    #[test]
    fn round_trips_a_pack_of_plain_objects() {
        let entries = vec![
            Entry {
                obj_type: ObjectType::Blob,
                data: b"hello".to_vec(),
                hash: Hash::from_type_and_data(ObjectType::Blob, b"hello"),
                chain_len: 0,
            },
            Entry {
                obj_type: ObjectType::Blob,
                data: b"world".to_vec(),
                hash: Hash::from_type_and_data(ObjectType::Blob, b"world"),
                chain_len: 0,
            },
        ];
        let packed = write_pack(&entries).unwrap();
        let parsed = read_pack(packed.as_slice()).unwrap();
        assert_eq!(parsed.entries.len(), 2);
        let mut datas: Vec<_> = parsed.entries.iter().map(|e| e.data.clone()).collect();
        datas.sort();
        assert_eq!(datas, vec![b"hello".to_vec(), b"world".to_vec()]);
    }

    #[test]
    fn rejects_truncated_pack_missing_signature() {
        assert!(read_pack(&b"not a pack"[..]).is_err());
    }

    #[test]
    fn rejects_pack_with_corrupted_trailer() {
        let entries = vec![Entry {
            obj_type: ObjectType::Blob,
            data: b"x".to_vec(),
            hash: Hash::from_type_and_data(ObjectType::Blob, b"x"),
            chain_len: 0,
        }];
        let mut packed = write_pack(&entries).unwrap();
        let last = packed.len() - 1;
        packed[last] ^= 0xff;
        assert!(read_pack(packed.as_slice()).is_err());
    }

    #[test]
    fn streams_a_large_blob_without_reading_it_twice() {
        let big = vec![7u8; 2 * 1024 * 1024];
        let entries = vec![Entry {
            obj_type: ObjectType::Blob,
            data: big.clone(),
            hash: Hash::from_type_and_data(ObjectType::Blob, &big),
            chain_len: 0,
        }];
        let packed = write_pack(&entries).unwrap();
        let parsed = read_pack(packed.as_slice()).unwrap();
        assert_eq!(parsed.entries.len(), 1);
        assert_eq!(parsed.entries[0].data.len(), big.len());
    }
}
