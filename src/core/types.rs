use serde::{Deserialize, Serialize};

/// Sequence type (ST) identifier of a reference profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceType(pub u64);

impl SequenceType {
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Parse an ST identifier. Only positive integers are valid STs.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().parse::<u64>() {
            Ok(0) | Err(_) => None,
            Ok(id) => Some(Self(id)),
        }
    }
}

impl std::fmt::Display for SequenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Why a locus lacks a determinable allele call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapOrigin {
    /// The submission carried no call for this locus
    Absent,
    /// The submission carried a checksum that is not in the checksum table
    UnresolvedChecksum,
}

/// Limit on the gaps a pair of profiles may carry before the pair is ignored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapLimit {
    /// A tenth of the scheme plus one
    #[default]
    Scheme,
    /// Pairs with this many gaps or more are ignored
    Fixed(usize),
    /// No pair is ignored
    Unlimited,
}

impl GapLimit {
    /// The limit derived from the scheme size: `floor(loci / 10) + 1`
    #[must_use]
    pub fn scheme_default(locus_count: usize) -> usize {
        locus_count / 10 + 1
    }

    /// The effective limit for a scheme, `None` when unlimited
    #[must_use]
    pub fn resolve(self, locus_count: usize) -> Option<usize> {
        match self {
            Self::Scheme => Some(Self::scheme_default(locus_count)),
            Self::Fixed(limit) => Some(limit),
            Self::Unlimited => None,
        }
    }
}
