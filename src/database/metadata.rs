use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::database::index::IndexParams;

/// On-disk database format version for compatibility checking
pub const DATABASE_FORMAT_VERSION: u32 = 1;

/// Description of a database snapshot, stored as `metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    pub format_version: u32,

    /// Scheme name, e.g. `senterica`
    pub scheme: String,

    /// Free-form snapshot version, e.g. a download date
    pub version: String,

    pub created_at: DateTime<Utc>,

    /// Locus names in scheme order
    pub loci: Vec<String>,

    pub reference_count: usize,

    pub hiercc_prefix: String,

    /// HierCC thresholds, ascending
    pub hiercc_thresholds: Vec<u32>,

    /// Encoded value used for missing loci in profiles and the index
    pub missing_allele: u32,

    /// Hex characters kept per allele checksum
    pub hash_length: usize,

    /// References with this many missing loci or more were left out at build time
    #[serde(default)]
    pub max_reference_gaps: Option<usize>,

    pub index: IndexParams,
}

/// Snapshot identity reported alongside every assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseVersions {
    /// Snapshot version the database was built as
    pub database: String,
    pub created_at: DateTime<Utc>,
}

impl DatabaseMetadata {
    #[must_use]
    pub fn versions(&self) -> DatabaseVersions {
        DatabaseVersions {
            database: self.version.clone(),
            created_at: self.created_at,
        }
    }

    #[must_use]
    pub fn locus_count(&self) -> usize {
        self.loci.len()
    }

    /// HierCC level labels in threshold order, e.g. `d0`, `d2`
    #[must_use]
    pub fn hiercc_labels(&self) -> Vec<String> {
        self.hiercc_thresholds
            .iter()
            .map(|t| format!("{}{t}", self.hiercc_prefix))
            .collect()
    }
}
