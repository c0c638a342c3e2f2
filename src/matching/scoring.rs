use serde::{Deserialize, Serialize};

use crate::matching::encoding::MISSING_ALLELE;

/// Gap-aware allele distance between a query and a reference profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlleleDistance {
    /// Loci where both profiles carry an allele and the alleles differ
    pub distance: usize,

    /// Loci missing from the query only
    pub gaps_a: usize,

    /// Loci missing from the reference only
    pub gaps_b: usize,

    /// Loci missing from both
    pub gaps_both: usize,
}

impl AlleleDistance {
    /// Score two encoded profiles locus by locus.
    ///
    /// Both slices must cover the same scheme; extra loci on either side are ignored.
    #[must_use]
    pub fn between(query: &[u32], reference: &[u32]) -> Self {
        debug_assert_eq!(query.len(), reference.len());

        let mut score = Self::default();
        for (&a, &b) in query.iter().zip(reference) {
            match (a == MISSING_ALLELE, b == MISSING_ALLELE) {
                (true, true) => score.gaps_both += 1,
                (true, false) => score.gaps_a += 1,
                (false, true) => score.gaps_b += 1,
                (false, false) if a != b => score.distance += 1,
                (false, false) => {}
            }
        }
        score
    }

    /// Loci missing on either side
    #[must_use]
    pub fn total_gaps(&self) -> usize {
        self.gaps_a + self.gaps_b + self.gaps_both
    }
}
