//! Database builder for creating a database snapshot from local input files.
//!
//! The `DatabaseBuilder` collates reference profiles, HierCC codes and allele
//! checksums, then builds the similarity index and produces a
//! [`ProfileDatabase`] ready to save or assign against.

use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::{GapLimit, HierCcRow, ReferenceProfile, SequenceType};
use crate::database::checksums::{ChecksumError, ChecksumTable};
use crate::database::hiercc::HierCcTable;
use crate::database::index::{IndexError, IndexParams, SimilarityIndex};
use crate::database::metadata::{DatabaseMetadata, DATABASE_FORMAT_VERSION};
use crate::database::store::{DatabaseError, ProfileDatabase};
use crate::matching::encoding::MISSING_ALLELE;
use crate::parsing::alleles::{find_allele_fasta, hash_allele_fasta, AlleleChecksum};
use crate::parsing::hiercc::HierCcData;
use crate::parsing::profiles::ProfileTable;
use crate::parsing::ParseError;
use crate::utils::validation::{DEFAULT_HASH_LENGTH, MAX_HASH_LENGTH};

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Settings fixed at build time
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Scheme name recorded in the metadata
    pub scheme: String,
    /// Snapshot version recorded in the metadata
    pub version: String,
    pub index: IndexParams,
    /// Leave out references with this many missing loci or more
    pub max_reference_gaps: GapLimit,
    /// Hex characters kept per allele checksum
    pub hash_length: usize,
}

impl BuildConfig {
    /// Check settings that cannot be represented in a database
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::InvalidConfig` if the checksum length is zero
    /// or longer than a SHA-1 hex digest.
    pub fn validate(&self) -> Result<(), BuilderError> {
        if !(1..=MAX_HASH_LENGTH).contains(&self.hash_length) {
            return Err(BuilderError::InvalidConfig(format!(
                "hash length must be between 1 and {MAX_HASH_LENGTH}, got {}",
                self.hash_length
            )));
        }
        Ok(())
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            scheme: "cgmlst".to_string(),
            version: "unversioned".to_string(),
            index: IndexParams::default(),
            max_reference_gaps: GapLimit::Scheme,
            hash_length: DEFAULT_HASH_LENGTH,
        }
    }
}

pub struct DatabaseBuilder {
    config: BuildConfig,
    loci: Vec<String>,
    references: Vec<ReferenceProfile>,
    seen: HashSet<SequenceType>,
    hiercc: HierCcData,
    checksums: ChecksumTable,
    warnings: Vec<String>,
}

impl DatabaseBuilder {
    /// Create a builder for a scheme with the given locus names
    #[must_use]
    pub fn new(loci: Vec<String>, config: BuildConfig) -> Self {
        let checksums = ChecksumTable::new(loci.len(), config.hash_length);
        Self {
            config,
            loci,
            references: Vec::new(),
            seen: HashSet::new(),
            hiercc: HierCcData::empty(),
            checksums,
            warnings: Vec::new(),
        }
    }

    /// Create a builder holding every profile of a parsed profile table
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the table repeats an ST.
    pub fn from_profile_table(table: ProfileTable, config: BuildConfig) -> Result<Self, BuilderError> {
        config.validate()?;
        let mut builder = Self::new(table.loci, config);
        for profile in table.profiles {
            builder.add_reference(profile)?;
        }
        Ok(builder)
    }

    #[must_use]
    pub fn loci(&self) -> &[String] {
        &self.loci
    }

    /// Add a reference profile
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::InvalidProfile` if the profile does not cover
    /// every locus, or `BuilderError::Conflict` if the ST was already added.
    pub fn add_reference(&mut self, reference: ReferenceProfile) -> Result<(), BuilderError> {
        if reference.locus_count() != self.loci.len() {
            return Err(BuilderError::InvalidProfile(format!(
                "ST {} has {} loci, expected {}",
                reference.st,
                reference.locus_count(),
                self.loci.len()
            )));
        }
        if !self.seen.insert(reference.st) {
            return Err(BuilderError::Conflict(format!(
                "ST {} appears more than once",
                reference.st
            )));
        }
        self.references.push(reference);
        Ok(())
    }

    /// Set the HierCC levels and codes
    pub fn set_hiercc(&mut self, hiercc: HierCcData) {
        self.hiercc = hiercc;
    }

    /// Register one allele checksum
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::Checksum` if the checksum is invalid or
    /// conflicts with one already registered.
    pub fn add_checksum(&mut self, checksum: &AlleleChecksum) -> Result<(), BuilderError> {
        self.checksums
            .insert(checksum.locus, &checksum.checksum, checksum.allele)?;
        Ok(())
    }

    /// Register allele checksums in bulk
    ///
    /// # Errors
    ///
    /// See [`Self::add_checksum`].
    pub fn add_checksums<'a>(
        &mut self,
        checksums: impl IntoIterator<Item = &'a AlleleChecksum>,
    ) -> Result<(), BuilderError> {
        for checksum in checksums {
            self.add_checksum(checksum)?;
        }
        Ok(())
    }

    /// Hash the allele FASTA file of every locus found in `dir`.
    ///
    /// Loci without a file are recorded as warnings. Returns the number of
    /// checksums registered.
    ///
    /// # Errors
    ///
    /// Returns an error if a FASTA file cannot be parsed or yields a
    /// conflicting checksum.
    pub fn add_allele_directory(&mut self, dir: &Path) -> Result<usize, BuilderError> {
        let hash_length = self.config.hash_length;
        let hashed: Vec<Result<Option<Vec<AlleleChecksum>>, ParseError>> = self
            .loci
            .par_iter()
            .enumerate()
            .map(|(locus, name)| {
                find_allele_fasta(dir, name)
                    .map(|path| hash_allele_fasta(&path, locus, name, hash_length))
                    .transpose()
            })
            .collect();

        let mut added = 0usize;
        for (locus, result) in hashed.into_iter().enumerate() {
            match result? {
                Some(checksums) => {
                    debug!("Hashed {} alleles of {}", checksums.len(), self.loci[locus]);
                    added += checksums.len();
                    self.add_checksums(&checksums)?;
                }
                None => self.warnings.push(format!(
                    "No allele FASTA for locus {} in {}",
                    self.loci[locus],
                    dir.display()
                )),
            }
        }

        info!("Hashed {added} alleles from {}", dir.display());
        Ok(added)
    }

    /// Summarize what would be built
    #[must_use]
    pub fn summary(&self) -> BuildSummary {
        let gap_limit = self.config.max_reference_gaps.resolve(self.loci.len());
        let over_gap_limit = gap_limit.map_or(0, |limit| {
            self.references
                .iter()
                .filter(|r| r.missing_count() >= limit)
                .count()
        });
        let without_hiercc = self
            .references
            .iter()
            .filter(|r| !self.hiercc.rows.contains_key(&r.st))
            .count();

        BuildSummary {
            scheme: self.config.scheme.clone(),
            version: self.config.version.clone(),
            loci: self.loci.len(),
            references: self.references.len(),
            over_gap_limit,
            hiercc_levels: self
                .hiercc
                .thresholds
                .iter()
                .map(|t| format!("{}{t}", self.hiercc.prefix))
                .collect(),
            without_hiercc,
            checksums: self.checksums.len(),
            warnings: self.warnings.clone(),
        }
    }

    /// Build the similarity index and assemble the database
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be built or the assembled parts
    /// fail validation.
    pub fn build(self) -> Result<ProfileDatabase, BuilderError> {
        let Self {
            config,
            loci,
            mut references,
            hiercc,
            checksums,
            warnings,
            ..
        } = self;
        config.validate()?;

        for warning in &warnings {
            warn!("{warning}");
        }

        let gap_limit = config.max_reference_gaps.resolve(loci.len());
        if let Some(limit) = gap_limit {
            let before = references.len();
            references.retain(|r| r.missing_count() < limit);
            let skipped = before - references.len();
            if skipped > 0 {
                info!("Left out {skipped} references with {limit} or more missing loci");
            }
        }

        let mut without_hiercc = 0usize;
        let rows: Vec<HierCcRow> = references
            .iter()
            .map(|r| {
                hiercc.rows.get(&r.st).cloned().unwrap_or_else(|| {
                    without_hiercc += 1;
                    HierCcRow::empty(hiercc.thresholds.len())
                })
            })
            .collect();
        if without_hiercc > 0 {
            warn!("{without_hiercc} STs have no HierCC codes; their levels will be reported as null");
        }
        let hiercc_table = HierCcTable::new(hiercc.prefix.clone(), hiercc.thresholds.clone(), rows);

        info!(
            "Building similarity index over {} references (m={}, ef_construction={})",
            references.len(),
            config.index.m,
            config.index.ef_construction
        );
        let start = Instant::now();
        let index =
            SimilarityIndex::build(references.as_slice(), loci.len(), MISSING_ALLELE, config.index)?;
        info!(
            "Built index with {} layers in {:.1}s",
            index.max_level() + 1,
            start.elapsed().as_secs_f64()
        );

        let metadata = DatabaseMetadata {
            format_version: DATABASE_FORMAT_VERSION,
            scheme: config.scheme,
            version: config.version,
            created_at: chrono::Utc::now(),
            loci,
            reference_count: references.len(),
            hiercc_prefix: hiercc.prefix,
            hiercc_thresholds: hiercc.thresholds,
            missing_allele: MISSING_ALLELE,
            hash_length: config.hash_length,
            max_reference_gaps: gap_limit,
            index: config.index,
        };

        Ok(ProfileDatabase::from_parts(
            metadata,
            references,
            hiercc_table,
            checksums,
            index,
        )?)
    }
}

/// Summary of the build inputs
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub scheme: String,
    pub version: String,
    pub loci: usize,
    pub references: usize,
    pub over_gap_limit: usize,
    pub hiercc_levels: Vec<String>,
    pub without_hiercc: usize,
    pub checksums: usize,
    pub warnings: Vec<String>,
}

impl std::fmt::Display for BuildSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Database Builder Summary")?;
        writeln!(f, "========================")?;
        writeln!(f, "Scheme:     {}", self.scheme)?;
        writeln!(f, "Version:    {}", self.version)?;
        writeln!(f, "Loci:       {}", self.loci)?;
        writeln!(
            f,
            "References: {} ({} over the gap limit)",
            self.references, self.over_gap_limit
        )?;
        if self.hiercc_levels.is_empty() {
            writeln!(f, "HierCC:     none")?;
        } else {
            writeln!(f, "HierCC:     {}", self.hiercc_levels.join(", "))?;
        }
        if self.without_hiercc > 0 {
            writeln!(f, "            {} STs without HierCC codes", self.without_hiercc)?;
        }
        writeln!(f, "Checksums:  {}", self.checksums)?;

        if !self.warnings.is_empty() {
            writeln!(f)?;
            writeln!(f, "Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "  - {warning}")?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn loci(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("locus{i}")).collect()
    }

    fn hiercc(rows: &[(u64, [&str; 2])]) -> HierCcData {
        HierCcData {
            prefix: "d".to_string(),
            thresholds: vec![0, 5],
            rows: rows
                .iter()
                .map(|(st, codes)| {
                    (
                        SequenceType(*st),
                        HierCcRow::new(codes.iter().map(|c| Some((*c).to_string())).collect()),
                    )
                })
                .collect::<HashMap<_, _>>(),
        }
    }

    fn unlimited() -> BuildConfig {
        BuildConfig {
            max_reference_gaps: GapLimit::Unlimited,
            ..BuildConfig::default()
        }
    }

    #[test]
    fn test_build_database() {
        let mut builder = DatabaseBuilder::new(loci(3), unlimited());
        builder
            .add_reference(ReferenceProfile::new(SequenceType(1), vec![1, 1, 1]))
            .unwrap();
        builder
            .add_reference(ReferenceProfile::new(SequenceType(2), vec![1, 2, 0]))
            .unwrap();
        builder.set_hiercc(hiercc(&[(1, ["1", "1"])]));
        builder
            .add_checksum(&AlleleChecksum {
                locus: 0,
                checksum: "aabbccddeeff00112233".to_string(),
                allele: 1,
            })
            .unwrap();

        let summary = builder.summary();
        assert_eq!(summary.references, 2);
        assert_eq!(summary.without_hiercc, 1);
        assert_eq!(summary.checksums, 1);
        assert!(summary.to_string().contains("d0, d5"));

        let db = builder.build().unwrap();
        assert_eq!(db.len(), 2);
        assert_eq!(db.metadata().missing_allele, MISSING_ALLELE);
        assert_eq!(db.hiercc().row(0).unwrap().code(1), Some("1"));
        // ST 2 has no HierCC row, so every level is unknown
        assert_eq!(db.hiercc().row(1).unwrap(), &HierCcRow::empty(2));
        assert_eq!(db.checksums().lookup(0, "AABBCCDDEEFF00112233"), Some(1));
        assert_eq!(db.metadata().max_reference_gaps, None);
    }

    #[test]
    fn test_rejects_duplicates_and_bad_lengths() {
        let mut builder = DatabaseBuilder::new(loci(2), BuildConfig::default());
        builder
            .add_reference(ReferenceProfile::new(SequenceType(1), vec![1, 1]))
            .unwrap();
        assert!(matches!(
            builder.add_reference(ReferenceProfile::new(SequenceType(1), vec![2, 2])),
            Err(BuilderError::Conflict(_))
        ));
        assert!(matches!(
            builder.add_reference(ReferenceProfile::new(SequenceType(3), vec![2])),
            Err(BuilderError::InvalidProfile(_))
        ));
    }

    #[test]
    fn test_gap_limit_leaves_out_incomplete_references() {
        let config = BuildConfig {
            max_reference_gaps: GapLimit::Fixed(2),
            ..BuildConfig::default()
        };
        let mut builder = DatabaseBuilder::new(loci(4), config);
        builder
            .add_reference(ReferenceProfile::new(SequenceType(1), vec![1, 1, 1, 1]))
            .unwrap();
        builder
            .add_reference(ReferenceProfile::new(SequenceType(2), vec![1, 0, 1, 1]))
            .unwrap();
        builder
            .add_reference(ReferenceProfile::new(SequenceType(3), vec![0, 0, 1, 1]))
            .unwrap();
        assert_eq!(builder.summary().over_gap_limit, 1);

        let db = builder.build().unwrap();
        let sts: Vec<SequenceType> = db.references().iter().map(|r| r.st).collect();
        assert_eq!(sts, vec![SequenceType(1), SequenceType(2)]);
        assert_eq!(db.metadata().max_reference_gaps, Some(2));
    }

    #[test]
    fn test_allele_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("locus1.fasta"), ">locus1_1\nACGT\n>locus1_2\nACGA\n").unwrap();

        let mut builder = DatabaseBuilder::new(loci(2), BuildConfig::default());
        let added = builder.add_allele_directory(dir.path()).unwrap();
        assert_eq!(added, 2);

        let summary = builder.summary();
        assert_eq!(summary.checksums, 2);
        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.warnings[0].contains("locus2"));
    }

    #[test]
    fn test_scheme_gap_limit_is_the_default() {
        // 20 loci: references missing 3 loci or more are left out
        let mut builder = DatabaseBuilder::new(loci(20), BuildConfig::default());
        let mut nearly_empty = vec![0; 20];
        nearly_empty[0] = 1;
        let mut two_missing = vec![1; 20];
        two_missing[..2].fill(0);
        builder
            .add_reference(ReferenceProfile::new(SequenceType(1), vec![1; 20]))
            .unwrap();
        builder
            .add_reference(ReferenceProfile::new(SequenceType(2), nearly_empty))
            .unwrap();
        builder
            .add_reference(ReferenceProfile::new(SequenceType(3), two_missing))
            .unwrap();
        assert_eq!(builder.summary().over_gap_limit, 1);

        let db = builder.build().unwrap();
        let sts: Vec<SequenceType> = db.references().iter().map(|r| r.st).collect();
        assert_eq!(sts, vec![SequenceType(1), SequenceType(3)]);
        assert_eq!(db.metadata().max_reference_gaps, Some(3));
    }

    #[test]
    fn test_hash_length_must_fit_a_digest() {
        for hash_length in [0, MAX_HASH_LENGTH + 1] {
            let config = BuildConfig {
                hash_length,
                ..BuildConfig::default()
            };
            let table = ProfileTable {
                loci: loci(2),
                profiles: vec![ReferenceProfile::new(SequenceType(1), vec![1, 1])],
            };
            assert!(matches!(
                DatabaseBuilder::from_profile_table(table, config.clone()),
                Err(BuilderError::InvalidConfig(_))
            ));
            assert!(matches!(
                DatabaseBuilder::new(loci(2), config).build(),
                Err(BuilderError::InvalidConfig(_))
            ));
        }

        let full_digest = BuildConfig {
            hash_length: MAX_HASH_LENGTH,
            ..BuildConfig::default()
        };
        assert!(full_digest.validate().is_ok());
    }
}
