use tracing::debug;

use crate::core::{AlleleCode, AlleleProfile, GapOrigin, ResolvedAllele, ResolvedProfile};
use crate::database::checksums::ChecksumTable;
use crate::matching::AssignError;

/// Maps checksum codes in a submitted profile to allele IDs
pub struct ChecksumResolver<'a> {
    checksums: &'a ChecksumTable,
}

impl<'a> ChecksumResolver<'a> {
    #[must_use]
    pub fn new(checksums: &'a ChecksumTable) -> Self {
        Self { checksums }
    }

    /// Resolve every locus of `profile` to an allele ID or a missing marker.
    ///
    /// Checksums missing from the table become gaps attributed to
    /// [`GapOrigin::UnresolvedChecksum`]; the count is available from
    /// [`ResolvedProfile::unresolved_checksums`].
    ///
    /// # Errors
    ///
    /// Returns `AssignError::SchemaMismatch` if the profile length differs from
    /// the scheme locus count.
    pub fn resolve(&self, profile: &AlleleProfile) -> Result<ResolvedProfile, AssignError> {
        let expected = self.checksums.locus_count();
        if profile.len() != expected {
            return Err(AssignError::SchemaMismatch {
                expected,
                found: profile.len(),
            });
        }

        let alleles: Vec<ResolvedAllele> = profile
            .codes()
            .iter()
            .enumerate()
            .map(|(locus, code)| match code {
                AlleleCode::Missing | AlleleCode::Allele(0) => ResolvedAllele::Missing(GapOrigin::Absent),
                AlleleCode::Allele(id) => ResolvedAllele::Present(*id),
                AlleleCode::Checksum(checksum) => match self.checksums.lookup(locus, checksum) {
                    Some(id) => ResolvedAllele::Present(id),
                    None => {
                        debug!("Unresolved checksum {checksum} at locus {locus}");
                        ResolvedAllele::Missing(GapOrigin::UnresolvedChecksum)
                    }
                },
            })
            .collect();

        let resolved = ResolvedProfile::new(alleles);
        let unresolved = resolved.unresolved_checksums();
        if unresolved > 0 {
            debug!(
                "{unresolved} of {} checksums could not be resolved",
                profile.checksum_count()
            );
        }

        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ChecksumTable {
        let mut table = ChecksumTable::new(3, 8);
        table.insert(1, "aabbccdd", 42).unwrap();
        table
    }

    #[test]
    fn test_resolves_checksums() {
        let table = table();
        let resolver = ChecksumResolver::new(&table);
        let profile = AlleleProfile::from_code_string("5_AABBCCDD0011_");

        let resolved = resolver.resolve(&profile).unwrap();
        assert_eq!(
            resolved.alleles(),
            &[
                ResolvedAllele::Present(5),
                ResolvedAllele::Present(42),
                ResolvedAllele::Missing(GapOrigin::Absent),
            ]
        );
        assert_eq!(resolved.unresolved_checksums(), 0);
    }

    #[test]
    fn test_unknown_checksum_becomes_gap() {
        let table = table();
        let resolver = ChecksumResolver::new(&table);
        let profile = AlleleProfile::from_code_string("5_ffffffff_7");

        let resolved = resolver.resolve(&profile).unwrap();
        assert_eq!(
            resolved.alleles()[1],
            ResolvedAllele::Missing(GapOrigin::UnresolvedChecksum)
        );
        assert_eq!(resolved.unresolved_checksums(), 1);
        assert_eq!(resolved.missing_count(), 1);
    }

    #[test]
    fn test_numeric_profiles_are_unchanged() {
        let table = table();
        let resolver = ChecksumResolver::new(&table);
        let profile = AlleleProfile::from_code_string("1_2_3");

        let once = resolver.resolve(&profile).unwrap();
        let twice = resolver.resolve(&once.to_allele_profile()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.to_allele_profile(), profile);
    }

    #[test]
    fn test_schema_mismatch() {
        let table = table();
        let resolver = ChecksumResolver::new(&table);
        assert_eq!(
            resolver.resolve(&AlleleProfile::from_code_string("1_2")),
            Err(AssignError::SchemaMismatch {
                expected: 3,
                found: 2
            })
        );
    }
}
