//! Packfile reading and writing, following the [pack-format
//! spec](https://git-scm.com/docs/pack-format): header, object entries (with
//! OFS_DELTA/REF_DELTA resolution), and trailer verification.

pub mod entry;
pub mod reader;
pub mod waitlist;
pub mod writer;
pub mod wrapper;
