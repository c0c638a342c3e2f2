use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::ReferenceProfile;
use crate::database::checksums::ChecksumTable;
use crate::database::hiercc::HierCcTable;
use crate::database::index::{IndexError, SimilarityIndex};
use crate::database::metadata::{DatabaseMetadata, DATABASE_FORMAT_VERSION};
use crate::matching::encoding::MISSING_ALLELE;
use crate::utils::io::{create_gz_writer, finish_gz_writer};
use crate::utils::validation::compute_signature;

pub const METADATA_FILE: &str = "metadata.json";
pub const PROFILES_FILE: &str = "profiles.bin.gz";
pub const HIERCC_FILE: &str = "hiercc.bin.gz";
pub const CHECKSUMS_FILE: &str = "checksums.bin.gz";
pub const INDEX_FILE: &str = "index.bin.gz";

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to read database: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse database metadata: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to decode database artifact: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Incompatible database: {0}")]
    Incompatible(String),

    #[error("Missing database artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A loaded database snapshot: reference profiles, their HierCC codes, the
/// checksum table and the similarity index.
///
/// Immutable once constructed; share it by reference or `Arc`.
#[derive(Debug)]
pub struct ProfileDatabase {
    metadata: DatabaseMetadata,

    references: Vec<ReferenceProfile>,

    hiercc: HierCcTable,

    checksums: ChecksumTable,

    index: SimilarityIndex,

    /// Index: signature of a complete profile -> positions of identical references
    signature_to_refs: HashMap<String, Vec<usize>>,
}

impl ProfileDatabase {
    /// Assemble a database from its parts, checking they agree with each other.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Incompatible` if the parts disagree on locus
    /// count, reference count, HierCC levels or the missing sentinel, and
    /// `DatabaseError::Index` if the index graph is malformed.
    pub fn from_parts(
        metadata: DatabaseMetadata,
        references: Vec<ReferenceProfile>,
        hiercc: HierCcTable,
        checksums: ChecksumTable,
        index: SimilarityIndex,
    ) -> Result<Self, DatabaseError> {
        check_compatibility(&metadata, &references, &hiercc, &checksums, &index)?;

        let signatures: Vec<(String, usize)> = references
            .par_iter()
            .enumerate()
            .filter(|(_, r)| r.missing_count() == 0)
            .map(|(position, r)| (compute_signature(&r.alleles), position))
            .collect();

        let mut signature_to_refs: HashMap<String, Vec<usize>> = HashMap::new();
        for (signature, position) in signatures {
            signature_to_refs.entry(signature).or_default().push(position);
        }

        Ok(Self {
            metadata,
            references,
            hiercc,
            checksums,
            index,
            signature_to_refs,
        })
    }

    /// Load a database directory.
    ///
    /// # Errors
    ///
    /// Returns an error if an artifact is missing or unreadable, or the
    /// artifacts are incompatible with this build or with each other.
    pub fn load(dir: &Path) -> Result<Self, DatabaseError> {
        let metadata_path = artifact_path(dir, METADATA_FILE)?;
        let metadata: DatabaseMetadata =
            serde_json::from_reader(BufReader::new(File::open(metadata_path)?))?;

        if metadata.format_version > DATABASE_FORMAT_VERSION {
            return Err(DatabaseError::Incompatible(format!(
                "format version {} is newer than supported version {DATABASE_FORMAT_VERSION}",
                metadata.format_version
            )));
        }
        if metadata.format_version != DATABASE_FORMAT_VERSION {
            warn!(
                "Database format version mismatch (expected {}, found {})",
                DATABASE_FORMAT_VERSION, metadata.format_version
            );
        }
        check_sentinel("metadata", metadata.missing_allele)?;

        info!(
            "Loading {} database {} ({} references, {} loci)",
            metadata.scheme,
            metadata.version,
            metadata.reference_count,
            metadata.locus_count()
        );

        let references: Vec<ReferenceProfile> = read_artifact(dir, PROFILES_FILE)?;
        let hiercc: HierCcTable = read_artifact(dir, HIERCC_FILE)?;
        let checksums: ChecksumTable = read_artifact(dir, CHECKSUMS_FILE)?;
        let index: SimilarityIndex = read_artifact(dir, INDEX_FILE)?;

        let database = Self::from_parts(metadata, references, hiercc, checksums, index)?;
        info!(
            "Loaded database with {} references and {} checksums",
            database.len(),
            database.checksums.len()
        );
        Ok(database)
    }

    /// Write every artifact to a database directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or any artifact cannot be written.
    pub fn save(&self, dir: &Path) -> Result<(), DatabaseError> {
        std::fs::create_dir_all(dir)?;

        let metadata_json = serde_json::to_string_pretty(&self.metadata)?;
        std::fs::write(dir.join(METADATA_FILE), metadata_json)?;

        write_artifact(&dir.join(PROFILES_FILE), &self.references)?;
        write_artifact(&dir.join(HIERCC_FILE), &self.hiercc)?;
        write_artifact(&dir.join(CHECKSUMS_FILE), &self.checksums)?;
        write_artifact(&dir.join(INDEX_FILE), &self.index)?;

        info!("Wrote database to {}", dir.display());
        Ok(())
    }

    #[must_use]
    pub fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn references(&self) -> &[ReferenceProfile] {
        &self.references
    }

    #[must_use]
    pub fn reference(&self, position: usize) -> Option<&ReferenceProfile> {
        self.references.get(position)
    }

    #[must_use]
    pub fn hiercc(&self) -> &HierCcTable {
        &self.hiercc
    }

    #[must_use]
    pub fn checksums(&self) -> &ChecksumTable {
        &self.checksums
    }

    #[must_use]
    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    /// Number of loci in the scheme
    #[must_use]
    pub fn locus_count(&self) -> usize {
        self.metadata.locus_count()
    }

    /// Number of reference profiles
    #[must_use]
    pub fn len(&self) -> usize {
        self.references.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Positions of complete references identical to `alleles`
    #[must_use]
    pub fn find_by_signature(&self, alleles: &[u32]) -> &[usize] {
        let signature = compute_signature(alleles);
        self.signature_to_refs
            .get(&signature)
            .map_or(&[], Vec::as_slice)
    }
}

fn check_sentinel(artifact: &str, recorded: u32) -> Result<(), DatabaseError> {
    if recorded == MISSING_ALLELE {
        Ok(())
    } else {
        Err(DatabaseError::Incompatible(format!(
            "{artifact} records missing-allele sentinel {recorded}, expected {MISSING_ALLELE}"
        )))
    }
}

fn check_compatibility(
    metadata: &DatabaseMetadata,
    references: &[ReferenceProfile],
    hiercc: &HierCcTable,
    checksums: &ChecksumTable,
    index: &SimilarityIndex,
) -> Result<(), DatabaseError> {
    check_sentinel("metadata", metadata.missing_allele)?;
    check_sentinel("index", index.missing_allele())?;

    let locus_count = metadata.locus_count();
    if let Some(reference) = references.iter().find(|r| r.locus_count() != locus_count) {
        return Err(DatabaseError::Incompatible(format!(
            "ST {} has {} loci, expected {locus_count}",
            reference.st,
            reference.locus_count()
        )));
    }
    if checksums.locus_count() != locus_count {
        return Err(DatabaseError::Incompatible(format!(
            "checksum table covers {} loci, expected {locus_count}",
            checksums.locus_count()
        )));
    }
    if checksums.hash_length() != metadata.hash_length {
        return Err(DatabaseError::Incompatible(format!(
            "checksum table stores {}-character hashes, metadata records {}",
            checksums.hash_length(),
            metadata.hash_length
        )));
    }
    if index.dimensions() != locus_count {
        return Err(DatabaseError::Incompatible(format!(
            "index has {} dimensions, expected {locus_count}",
            index.dimensions()
        )));
    }

    if metadata.reference_count != references.len() {
        return Err(DatabaseError::Incompatible(format!(
            "metadata lists {} references but profiles contain {}",
            metadata.reference_count,
            references.len()
        )));
    }
    if hiercc.len() != references.len() {
        return Err(DatabaseError::Incompatible(format!(
            "{} HierCC rows for {} references",
            hiercc.len(),
            references.len()
        )));
    }
    if hiercc.prefix() != metadata.hiercc_prefix
        || hiercc.thresholds() != metadata.hiercc_thresholds.as_slice()
    {
        return Err(DatabaseError::Incompatible(
            "HierCC levels differ between metadata and HierCC table".to_string(),
        ));
    }
    hiercc
        .check_consistency()
        .map_err(DatabaseError::Incompatible)?;

    let mut seen = HashSet::with_capacity(references.len());
    if let Some(reference) = references.iter().find(|r| !seen.insert(r.st)) {
        return Err(DatabaseError::Incompatible(format!(
            "ST {} appears more than once",
            reference.st
        )));
    }

    index.validate(references)?;
    Ok(())
}

fn artifact_path(dir: &Path, name: &str) -> Result<PathBuf, DatabaseError> {
    let path = dir.join(name);
    if path.is_file() {
        Ok(path)
    } else {
        Err(DatabaseError::MissingArtifact(path))
    }
}

fn read_artifact<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<T, DatabaseError> {
    let path = artifact_path(dir, name)?;
    let reader = BufReader::new(GzDecoder::new(File::open(path)?));
    Ok(bincode::deserialize_from(reader)?)
}

fn write_artifact<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DatabaseError> {
    let mut writer = create_gz_writer(path)?;
    bincode::serialize_into(&mut writer, value)?;
    finish_gz_writer(writer)?;
    Ok(())
}
