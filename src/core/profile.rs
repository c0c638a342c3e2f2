use serde::{Deserialize, Serialize};

use crate::core::types::GapOrigin;

/// Separator between per-locus codes in a submitted profile string
pub const CODE_DELIMITER: char = '_';

/// A single per-locus code as submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlleleCode {
    /// Catalogued numeric allele ID (always >= 1)
    Allele(u32),
    /// Content hash of an allele sequence, not yet resolved to an ID
    Checksum(String),
    /// No call at this locus
    Missing,
}

impl AlleleCode {
    /// Parse one locus token.
    ///
    /// Empty tokens and `0` mean no call. Tokens made only of digits are allele
    /// IDs; anything else is treated as a checksum.
    #[must_use]
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if token.is_empty() {
            return Self::Missing;
        }

        if token.bytes().all(|b| b.is_ascii_digit()) {
            return match token.parse::<u32>() {
                Ok(0) => Self::Missing,
                Ok(id) => Self::Allele(id),
                // Out of range for an allele ID, so it can only be looked up
                Err(_) => Self::Checksum(token.to_string()),
            };
        }

        Self::Checksum(token.to_string())
    }

    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

impl std::fmt::Display for AlleleCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Allele(id) => write!(f, "{id}"),
            Self::Checksum(hash) => write!(f, "{hash}"),
            Self::Missing => Ok(()),
        }
    }
}

/// An ordered cgMLST allele profile as submitted, one code per scheme locus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlleleProfile {
    codes: Vec<AlleleCode>,
}

impl AlleleProfile {
    #[must_use]
    pub fn new(codes: Vec<AlleleCode>) -> Self {
        Self { codes }
    }

    /// Split a `_`-joined code string into per-locus codes
    #[must_use]
    pub fn from_code_string(code: &str) -> Self {
        let codes = code
            .trim()
            .split(CODE_DELIMITER)
            .map(AlleleCode::parse)
            .collect();
        Self { codes }
    }

    #[must_use]
    pub fn codes(&self) -> &[AlleleCode] {
        &self.codes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Number of loci carrying a checksum rather than an allele ID
    #[must_use]
    pub fn checksum_count(&self) -> usize {
        self.codes
            .iter()
            .filter(|c| matches!(c, AlleleCode::Checksum(_)))
            .count()
    }

    /// Render back to the `_`-joined submission format
    #[must_use]
    pub fn to_code_string(&self) -> String {
        self.codes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(&CODE_DELIMITER.to_string())
    }
}

/// A locus after checksum resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedAllele {
    Present(u32),
    Missing(GapOrigin),
}

impl ResolvedAllele {
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }

    #[must_use]
    pub fn allele(&self) -> Option<u32> {
        match self {
            Self::Present(id) => Some(*id),
            Self::Missing(_) => None,
        }
    }
}

/// A profile in which every locus is a concrete allele ID or a missing marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedProfile {
    alleles: Vec<ResolvedAllele>,
}

impl ResolvedProfile {
    #[must_use]
    pub fn new(alleles: Vec<ResolvedAllele>) -> Self {
        Self { alleles }
    }

    #[must_use]
    pub fn alleles(&self) -> &[ResolvedAllele] {
        &self.alleles
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.alleles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alleles.is_empty()
    }

    /// Loci without a determinable call, whatever the origin
    #[must_use]
    pub fn missing_count(&self) -> usize {
        self.alleles.iter().filter(|a| a.is_missing()).count()
    }

    /// Loci whose submitted checksum could not be resolved
    #[must_use]
    pub fn unresolved_checksums(&self) -> usize {
        self.alleles
            .iter()
            .filter(|a| matches!(a, ResolvedAllele::Missing(GapOrigin::UnresolvedChecksum)))
            .count()
    }

    /// True when every locus carries an allele ID
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing_count() == 0
    }

    /// Convert back to a submission profile. Unresolved checksums become plain
    /// missing codes since the hash itself is no longer known.
    #[must_use]
    pub fn to_allele_profile(&self) -> AlleleProfile {
        AlleleProfile::new(
            self.alleles
                .iter()
                .map(|a| match a {
                    ResolvedAllele::Present(id) => AlleleCode::Allele(*id),
                    ResolvedAllele::Missing(_) => AlleleCode::Missing,
                })
                .collect(),
        )
    }
}
