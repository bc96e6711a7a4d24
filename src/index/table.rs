//! Fixed-capacity, separately chained string set.
//!
//! The bucket count is chosen once and never changes. A key's bucket is the
//! first half of its MurmurHash3 x64/128 digest modulo the bucket count, so a
//! skewed key set degrades to chain scans rather than triggering a resize.

use super::murmur::murmur3_x64_128;
use crate::error::IndexError;
use std::io::{self, BufWriter, Write};

/// Seed used for every bucket hash
pub const KEY_SEED: u32 = 43;

/// Largest supported capacity exponent (2^24 buckets)
pub const MAX_EXPONENT: u32 = 24;

/// Deduplicating set of object identifiers or file paths
#[derive(Debug, Clone)]
pub struct ObjectIndex {
    buckets: Vec<Vec<Box<str>>>,
    len: usize,
}

impl ObjectIndex {
    /// Create an index with exactly `capacity` buckets
    pub fn with_capacity(capacity: usize) -> Result<Self, IndexError> {
        if capacity == 0 {
            return Err(IndexError::ZeroCapacity);
        }
        Ok(Self {
            buckets: vec![Vec::new(); capacity],
            len: 0,
        })
    }

    /// Create an index with `2^exponent` buckets
    pub fn with_exponent(exponent: u32) -> Result<Self, IndexError> {
        if exponent > MAX_EXPONENT {
            return Err(IndexError::ExponentTooLarge {
                exponent,
                max: MAX_EXPONENT,
            });
        }
        Self::with_capacity(1usize << exponent)
    }

    fn bucket_of(&self, key: &str) -> usize {
        let [h1, _] = murmur3_x64_128(key.as_bytes(), KEY_SEED);
        (h1 % self.buckets.len() as u64) as usize
    }

    /// Insert `key`, returning `true` if it was not already present.
    pub fn insert(&mut self, key: &str) -> bool {
        let slot = self.bucket_of(key);
        let chain = &mut self.buckets[slot];
        if chain.iter().any(|k| &**k == key) {
            return false;
        }
        chain.push(key.into());
        self.len += 1;
        true
    }

    /// Check whether `key` is present
    pub fn contains(&self, key: &str) -> bool {
        self.buckets[self.bucket_of(key)]
            .iter()
            .any(|k| &**k == key)
    }

    /// Number of distinct keys stored
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of buckets
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Longest chain, useful to judge whether `-H` was sized well
    pub fn max_chain(&self) -> usize {
        self.buckets.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Iterate keys in bucket-then-chain order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().flatten().map(|k| &**k)
    }

    /// Write every key on its own line, in bucket-then-chain order.
    ///
    /// The writer is flushed and dropped before returning, so a failure to
    /// persist the final buffered bytes is reported rather than lost.
    pub fn dump<W: Write>(&self, writer: W) -> io::Result<usize> {
        let mut out = BufWriter::new(writer);
        let mut written = 0;
        for key in self.iter() {
            out.write_all(key.as_bytes())?;
            out.write_all(b"\n")?;
            written += 1;
        }
        out.flush()?;
        Ok(written)
    }
}
