use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::utils::validation::normalize_checksum;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("Locus index {locus} out of range for a scheme of {count} loci")]
    LocusOutOfRange { locus: usize, count: usize },

    #[error("Invalid allele checksum '{0}'")]
    InvalidChecksum(String),

    #[error("Allele ID 0 is reserved for missing loci")]
    ReservedAllele,

    #[error("Checksum {checksum} at locus {locus} maps to both allele {existing} and {new}")]
    Conflict {
        locus: usize,
        checksum: String,
        existing: u32,
        new: u32,
    },
}

/// Content hash of an allele sequence: SHA-1 hex of the lowercased sequence,
/// truncated to `hash_length` characters.
#[must_use]
pub fn allele_checksum(sequence: &[u8], hash_length: usize) -> String {
    let mut hasher = Sha1::new();
    hasher.update(sequence.to_ascii_lowercase());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(hash_length);
    hex
}

/// Per-locus mapping from allele checksum to allele ID
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecksumTable {
    hash_length: usize,
    loci: Vec<HashMap<String, u32>>,
}

impl ChecksumTable {
    #[must_use]
    pub fn new(locus_count: usize, hash_length: usize) -> Self {
        Self {
            hash_length,
            loci: vec![HashMap::new(); locus_count],
        }
    }

    /// Number of hex characters stored per checksum
    #[must_use]
    pub fn hash_length(&self) -> usize {
        self.hash_length
    }

    #[must_use]
    pub fn locus_count(&self) -> usize {
        self.loci.len()
    }

    /// Total number of checksums across all loci
    #[must_use]
    pub fn len(&self) -> usize {
        self.loci.iter().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.loci.iter().all(HashMap::is_empty)
    }

    /// Register a checksum for an allele.
    ///
    /// Re-registering the same pair is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the locus is out of range, the checksum is not hex
    /// of at least the table's hash length, the allele is 0, or the checksum is
    /// already bound to a different allele at this locus.
    pub fn insert(&mut self, locus: usize, checksum: &str, allele: u32) -> Result<(), ChecksumError> {
        if allele == 0 {
            return Err(ChecksumError::ReservedAllele);
        }

        let count = self.loci.len();
        let key = normalize_checksum(checksum, self.hash_length)
            .ok_or_else(|| ChecksumError::InvalidChecksum(checksum.to_string()))?;
        let table = self
            .loci
            .get_mut(locus)
            .ok_or(ChecksumError::LocusOutOfRange { locus, count })?;

        match table.get(&key) {
            Some(&existing) if existing != allele => Err(ChecksumError::Conflict {
                locus,
                checksum: key,
                existing,
                new: allele,
            }),
            Some(_) => Ok(()),
            None => {
                table.insert(key, allele);
                Ok(())
            }
        }
    }

    /// Look up the allele ID for a checksum at a locus.
    ///
    /// Checksums are matched case-insensitively on their first `hash_length`
    /// characters. A miss is an ordinary outcome, not an error.
    #[must_use]
    pub fn lookup(&self, locus: usize, checksum: &str) -> Option<u32> {
        let key = normalize_checksum(checksum, self.hash_length)?;
        self.loci.get(locus)?.get(&key).copied()
    }

    /// Number of checksums registered at each locus
    #[must_use]
    pub fn locus_sizes(&self) -> Vec<usize> {
        self.loci.iter().map(HashMap::len).collect()
    }
}
