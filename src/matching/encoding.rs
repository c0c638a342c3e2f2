//! Fixed-width numeric encoding of resolved profiles.
//!
//! Reference profiles are stored, and the similarity index is built, in this
//! encoding. The database builder records [`MISSING_ALLELE`] in the metadata
//! and the index header, and loading rejects a database built with any other
//! sentinel.

use crate::core::{GapOrigin, ResolvedAllele, ResolvedProfile};

/// Encoded value of a locus without an allele call. Allele IDs start at 1.
pub const MISSING_ALLELE: u32 = 0;

/// Encode a single resolved locus
#[must_use]
pub fn encode_allele(allele: ResolvedAllele) -> u32 {
    match allele {
        ResolvedAllele::Present(id) => id,
        ResolvedAllele::Missing(_) => MISSING_ALLELE,
    }
}

/// Encode a resolved profile, one value per locus in scheme order
#[must_use]
pub fn encode(profile: &ResolvedProfile) -> Vec<u32> {
    profile.alleles().iter().copied().map(encode_allele).collect()
}

/// Decode an encoded vector. Gap origins are not stored, so every missing
/// locus decodes as [`GapOrigin::Absent`].
#[must_use]
pub fn decode(vector: &[u32]) -> ResolvedProfile {
    ResolvedProfile::new(
        vector
            .iter()
            .map(|&value| {
                if value == MISSING_ALLELE {
                    ResolvedAllele::Missing(GapOrigin::Absent)
                } else {
                    ResolvedAllele::Present(value)
                }
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_preserves_order_and_count() {
        let profile = ResolvedProfile::new(vec![
            ResolvedAllele::Present(7),
            ResolvedAllele::Missing(GapOrigin::UnresolvedChecksum),
            ResolvedAllele::Present(1),
            ResolvedAllele::Missing(GapOrigin::Absent),
        ]);

        let encoded = encode(&profile);
        assert_eq!(encoded, vec![7, MISSING_ALLELE, 1, MISSING_ALLELE]);

        let decoded = decode(&encoded);
        assert_eq!(decoded.len(), 4);
        assert_eq!(decoded.alleles()[0], ResolvedAllele::Present(7));
        assert_eq!(decoded.alleles()[1], ResolvedAllele::Missing(GapOrigin::Absent));
        assert_eq!(decoded.alleles()[2], ResolvedAllele::Present(1));
        assert_eq!(encode(&decoded), encoded);
    }

    #[test]
    fn test_missing_sentinel_never_collides_with_allele() {
        // The smallest allele ID a profile can carry must encode to something else
        assert_ne!(encode_allele(ResolvedAllele::Present(1)), MISSING_ALLELE);
        assert_eq!(
            encode_allele(ResolvedAllele::Missing(GapOrigin::Absent)),
            MISSING_ALLELE
        );
    }

    #[test]
    fn test_empty_profile() {
        let profile = ResolvedProfile::new(vec![]);
        assert!(encode(&profile).is_empty());
        assert!(decode(&[]).is_empty());
    }
}
