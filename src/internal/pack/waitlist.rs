//! Holding area for delta entries whose base object hasn't been resolved
//! yet, keyed by the base's pack offset (OFS_DELTA) or object hash
//! (REF_DELTA).
//!
//! The packfile reader runs single-threaded and in memory (see the
//! implementation note on blocking transport), so a plain `HashMap` behind
//! `&mut self` is enough here; there's no concurrent access to guard against.

use std::collections::HashMap;

use crate::hash::Hash;

#[derive(Debug)]
pub struct Waitlist<T> {
    by_offset: HashMap<usize, Vec<T>>,
    by_hash: HashMap<Hash, Vec<T>>,
}

impl<T> Default for Waitlist<T> {
    fn default() -> Self {
        Self {
            by_offset: HashMap::new(),
            by_hash: HashMap::new(),
        }
    }
}

impl<T> Waitlist<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_offset(&mut self, offset: usize, value: T) {
        self.by_offset.entry(offset).or_default().push(value);
    }

    pub fn insert_hash(&mut self, hash: Hash, value: T) {
        self.by_hash.entry(hash).or_default().push(value);
    }

    /// Removes and returns every value waiting on `offset` or `hash`.
    pub fn take(&mut self, offset: usize, hash: Hash) -> Vec<T> {
        let mut res = Vec::new();
        if let Some(vec) = self.by_offset.remove(&offset) {
            res.extend(vec);
        }
        if let Some(vec) = self.by_hash.remove(&hash) {
            res.extend(vec);
        }
        res
    }

    pub fn is_empty(&self) -> bool {
        self.by_offset.is_empty() && self.by_hash.is_empty()
    }

    /// The offsets still waited on, for diagnostics once the pack is
    /// exhausted and some deltas never found a base.
    pub fn offsets(&self) -> Vec<usize> {
        self.by_offset.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_entries_queued_by_offset() {
        let mut waitlist: Waitlist<u8> = Waitlist::new();
        waitlist.insert_offset(100, 1);
        waitlist.insert_offset(100, 2);

        let res = waitlist.take(100, Hash::zero());
        assert_eq!(res.len(), 2);
        assert!(waitlist.take(100, Hash::zero()).is_empty());
    }

    #[test]
    fn takes_entries_queued_by_hash() {
        let mut waitlist: Waitlist<u8> = Waitlist::new();
        let base_hash = Hash::of(b"base");
        waitlist.insert_hash(base_hash, 3);

        let res = waitlist.take(0, base_hash);
        assert_eq!(res.len(), 1);
        assert!(waitlist.is_empty());
    }

    #[test]
    fn takes_entries_queued_by_both_keys_at_once() {
        let mut waitlist: Waitlist<u8> = Waitlist::new();
        let hash = Hash::of(b"base");
        waitlist.insert_offset(200, 4);
        waitlist.insert_hash(hash, 5);

        let res = waitlist.take(200, hash);
        assert_eq!(res.len(), 2);
        assert!(waitlist.is_empty());
    }
}
