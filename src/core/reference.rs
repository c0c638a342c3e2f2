use serde::{Deserialize, Serialize};

use crate::core::types::SequenceType;
use crate::matching::encoding::MISSING_ALLELE;

/// A known sequence type in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceProfile {
    /// Sequence type identifier
    pub st: SequenceType,

    /// Encoded alleles in scheme locus order, `MISSING_ALLELE` where uncalled
    pub alleles: Vec<u32>,
}

impl ReferenceProfile {
    #[must_use]
    pub fn new(st: SequenceType, alleles: Vec<u32>) -> Self {
        Self { st, alleles }
    }

    /// Number of loci without an allele call
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.alleles.iter().filter(|&&a| a == MISSING_ALLELE).count()
    }

    #[must_use]
    pub fn locus_count(&self) -> usize {
        self.alleles.len()
    }
}

/// HierCC cluster codes of one ST, one slot per database threshold
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierCcRow {
    pub codes: Vec<Option<String>>,
}

impl HierCcRow {
    #[must_use]
    pub fn new(codes: Vec<Option<String>>) -> Self {
        Self { codes }
    }

    /// A row with every slot unknown
    #[must_use]
    pub fn empty(thresholds: usize) -> Self {
        Self {
            codes: vec![None; thresholds],
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Cluster code at the given threshold slot
    #[must_use]
    pub fn code(&self, slot: usize) -> Option<&str> {
        self.codes.get(slot).and_then(|c| c.as_deref())
    }
}
