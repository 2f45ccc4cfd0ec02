//! Git object hashing: SHA-1 over the canonical `<type> <len>\0<body>` encoding.
//!
//! This core only ever speaks SHA-1 (see the object-format capability in
//! `protocol::capability`); the all-zero hash is the sentinel for "no object"
//! used throughout the ref-update and delta-base machinery.

use std::{fmt::Display, io, str::FromStr};

use serde::{Deserialize, Serialize};
use sha1::Digest;

use crate::internal::object::ObjectType;

pub const HASH_SIZE: usize = 20;
pub const HASH_HEX_LEN: usize = 40;

/// A 20-byte SHA-1 object identifier. Hex encoding is always lowercase.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Hash(pub [u8; HASH_SIZE]);

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash({self})")
    }
}

impl Default for Hash {
    fn default() -> Self {
        Hash([0u8; HASH_SIZE])
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Hash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HASH_HEX_LEN {
            return Err(format!(
                "invalid hash length: got {} hex chars, expected {HASH_HEX_LEN}",
                s.len()
            ));
        }
        let bytes = hex::decode(s).map_err(|e| e.to_string())?;
        let mut h = [0u8; HASH_SIZE];
        h.copy_from_slice(&bytes);
        Ok(Hash(h))
    }
}

impl Hash {
    /// The all-zero sentinel meaning "no object" (used as an OID in ref
    /// create/delete commands).
    pub fn zero() -> Hash {
        Hash([0u8; HASH_SIZE])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE]
    }

    /// Hash of raw bytes (no object-type framing).
    pub fn of(data: &[u8]) -> Hash {
        let digest = sha1::Sha1::digest(data);
        let mut bytes = [0u8; HASH_SIZE];
        bytes.copy_from_slice(digest.as_ref());
        Hash(bytes)
    }

    /// Hash of an object's canonical `<type> <len>\0<body>` encoding, the
    /// identity every Commit/Tree/Blob/Tag carries.
    pub fn from_type_and_data(object_type: ObjectType, data: &[u8]) -> Hash {
        let mut framed = Vec::with_capacity(data.len() + 32);
        framed.extend(object_type.as_str().as_bytes());
        framed.push(b' ');
        framed.extend(data.len().to_string().as_bytes());
        framed.push(b'\0');
        framed.extend(data);
        Hash::of(&framed)
    }

    /// Build a `Hash` from exactly `HASH_SIZE` raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Hash, String> {
        if bytes.len() != HASH_SIZE {
            return Err(format!(
                "invalid byte length: got {}, expected {HASH_SIZE}",
                bytes.len()
            ));
        }
        let mut h = [0u8; HASH_SIZE];
        h.copy_from_slice(bytes);
        Ok(Hash(h))
    }

    /// Read `HASH_SIZE` raw bytes from a stream (e.g. a REF_DELTA base, or a
    /// packfile trailer).
    pub fn from_stream(data: &mut impl io::Read) -> io::Result<Hash> {
        let mut h = [0u8; HASH_SIZE];
        data.read_exact(&mut h)?;
        Ok(Hash(h))
    }

    pub fn to_data(self) -> Vec<u8> {
        self.0.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use crate::hash::Hash;

    #[test]
    fn hashes_known_sha1_value() {
        let data = "Hello, world!".as_bytes();
        let hash = Hash::of(data);
        assert_eq!(hash.to_string(), "943a702d06f34599aee1f8da8ef9f7296031d699");
    }

    #[test]
    fn round_trips_through_hex() {
        let hash_str = "8ab686eafeb1f44702738c8b0f24f2567c36da6d";
        let hash = Hash::from_str(hash_str).unwrap();
        assert_eq!(hash.to_string(), hash_str);
    }

    #[test]
    fn rejects_short_hex() {
        assert!(Hash::from_str("deadbeef").is_err());
    }

    #[test]
    fn zero_is_all_zero_bytes_and_is_zero() {
        let zero = Hash::zero();
        assert!(zero.is_zero());
        assert_eq!(
            zero.to_string(),
            "0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn from_stream_reads_exactly_twenty_bytes() {
        let source = [
            0x8a, 0xb6, 0x86, 0xea, 0xfe, 0xb1, 0xf4, 0x47, 0x02, 0x73, 0x8c, 0x8b, 0x0f, 0x24,
            0xf2, 0x56, 0x7c, 0x36, 0xda, 0x6d,
        ];
        let mut reader = std::io::Cursor::new(source);
        let hash = Hash::from_stream(&mut reader).unwrap();
        assert_eq!(hash.to_string(), "8ab686eafeb1f44702738c8b0f24f2567c36da6d");
    }
}
