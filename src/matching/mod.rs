//! Profile assignment engine and its pipeline stages.
//!
//! This module provides the core assignment functionality:
//!
//! - [`AssignmentEngine`]: Main entry point for assigning query profiles
//! - [`ChecksumResolver`]: Resolves allele checksums to allele IDs
//! - [`AlleleDistance`]: Gap-aware allele distance between two profiles
//! - [`MatchSelector`]: Deterministic choice of the best candidate
//! - [`infer_hiercc`]: Threshold-gated HierCC code inference
//!
//! ## Assignment pipeline
//!
//! 1. **Resolution**: Checksum codes become allele IDs; unknown checksums become gaps
//! 2. **Encoding**: The resolved profile becomes a fixed-width `u32` vector
//! 3. **Shortlisting**: The similarity index returns the `k` closest references by
//!    Hamming distance (or every reference, for the exhaustive strategy)
//! 4. **Scoring**: Each shortlisted reference is scored exactly, counting gaps apart
//!    from mismatches
//! 5. **Selection**: Lowest distance wins, then fewest gaps, then lowest ST
//! 6. **Inference**: A HierCC code is reported at every level whose threshold is at
//!    least the distance
//!
//! Complete profiles identical to a reference skip shortlisting via an exact
//! signature lookup.
//!
//! ## Example
//!
//! ```rust,no_run
//! use hiercc_assign::{AlleleProfile, AssignmentEngine, ProfileDatabase};
//! use std::path::Path;
//!
//! let database = ProfileDatabase::load(Path::new("db")).unwrap();
//! let engine = AssignmentEngine::new(&database);
//!
//! let profile = AlleleProfile::from_code_string("1_1_4__7");
//! match engine.assign(&profile) {
//!     Ok(result) => println!("ST {} at distance {}", result.st, result.distance),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

pub mod encoding;
pub mod engine;
pub mod hiercc;
pub mod resolver;
pub mod scoring;
pub mod selector;

pub use engine::{AssignConfig, AssignmentEngine, AssignmentOutcome, MatchResult, SearchStrategy};
pub use hiercc::{infer_hiercc, HierCcSlot};
pub use resolver::ChecksumResolver;
pub use scoring::AlleleDistance;
pub use selector::{MatchSelector, ScoredCandidate};

use thiserror::Error;

/// A per-query assignment failure. No variant affects other queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssignError {
    #[error("Profile has {found} loci but the scheme has {expected}")]
    SchemaMismatch { expected: usize, found: usize },

    #[error("No candidate reference profiles found")]
    NoCandidates,

    #[error("Invalid query record: {0}")]
    InvalidRecord(String),
}

impl AssignError {
    /// Machine-readable error category
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::NoCandidates => "no_candidates",
            Self::InvalidRecord(_) => "invalid_record",
        }
    }
}
