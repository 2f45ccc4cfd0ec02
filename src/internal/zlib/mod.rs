//! Zlib inflate helpers used while reading packfile entries.

pub mod stream;
