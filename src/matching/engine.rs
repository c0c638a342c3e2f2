use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{AlleleProfile, GapLimit, ResolvedProfile, SequenceType};
use crate::database::metadata::DatabaseVersions;
use crate::database::store::ProfileDatabase;
use crate::matching::encoding;
use crate::matching::hiercc::{infer_hiercc, HierCcSlot};
use crate::matching::resolver::ChecksumResolver;
use crate::matching::scoring::AlleleDistance;
use crate::matching::selector::{MatchSelector, ScoredCandidate};
use crate::matching::AssignError;
use crate::parsing::query::{QueryEntry, QueryRecord};

/// Default number of references shortlisted by the similarity index
pub const DEFAULT_SHORTLIST_SIZE: usize = 100;

/// Default search breadth of the similarity index
pub const DEFAULT_EF_SEARCH: usize = 400;

/// How candidate references are found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Shortlist with the similarity index, then score the shortlist
    #[default]
    Indexed,
    /// Score every reference
    Exhaustive,
}

/// Configuration for the assignment engine
#[derive(Debug, Clone)]
pub struct AssignConfig {
    /// Number of references to shortlist (`k`)
    pub shortlist_size: usize,
    /// Similarity index search breadth; never less than `shortlist_size`
    pub ef_search: usize,
    pub strategy: SearchStrategy,
    /// Ignore references with this many gaps or more against the query.
    /// [`GapLimit::Scheme`] uses the limit the database was built with.
    pub max_gaps: GapLimit,
}

impl Default for AssignConfig {
    fn default() -> Self {
        Self {
            shortlist_size: DEFAULT_SHORTLIST_SIZE,
            ef_search: DEFAULT_EF_SEARCH,
            strategy: SearchStrategy::Indexed,
            max_gaps: GapLimit::Scheme,
        }
    }
}

/// The assignment of one query profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Closest reference ST
    pub st: SequenceType,

    /// Allele mismatches against that ST, gaps excluded
    pub distance: usize,

    /// Distance used for HierCC inference; mirrors `distance`
    #[serde(rename = "hierCC_distance")]
    pub hiercc_distance: usize,

    pub gaps_both: usize,

    pub gaps_a: usize,

    pub gaps_b: usize,

    /// One `[label, code]` pair per HierCC level, ascending
    #[serde(rename = "hierCC")]
    pub hiercc: Vec<HierCcSlot>,
}

/// Result envelope of one query record: `{id, result}` on success,
/// `{id, error, error_type}` on failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchResult>,

    /// Loci whose checksum was not in the checksum table
    #[serde(default, skip_serializing_if = "is_zero")]
    pub unresolved_checksums: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    /// Database snapshot the query was assigned against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<DatabaseVersions>,
}

#[allow(clippy::trivially_copy_pass_by_ref)] // serde passes fields by reference
fn is_zero(value: &usize) -> bool {
    *value == 0
}

impl AssignmentOutcome {
    #[must_use]
    pub fn success(id: Option<String>, result: MatchResult, unresolved_checksums: usize) -> Self {
        Self {
            id,
            result: Some(result),
            unresolved_checksums,
            error: None,
            error_type: None,
            versions: None,
        }
    }

    #[must_use]
    pub fn failure(id: Option<String>, error: &AssignError) -> Self {
        Self {
            id,
            result: None,
            unresolved_checksums: 0,
            error: Some(error.to_string()),
            error_type: Some(error.error_type().to_string()),
            versions: None,
        }
    }

    #[must_use]
    pub fn with_versions(mut self, versions: DatabaseVersions) -> Self {
        self.versions = Some(versions);
        self
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

/// Assigns query profiles against a loaded database
pub struct AssignmentEngine<'a> {
    database: &'a ProfileDatabase,
    config: AssignConfig,
}

impl<'a> AssignmentEngine<'a> {
    #[must_use]
    pub fn new(database: &'a ProfileDatabase) -> Self {
        Self {
            database,
            config: AssignConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(database: &'a ProfileDatabase, config: AssignConfig) -> Self {
        Self { database, config }
    }

    #[must_use]
    pub fn config(&self) -> &AssignConfig {
        &self.config
    }

    /// Assign a submitted profile to its closest reference ST
    ///
    /// # Errors
    ///
    /// Returns `AssignError::SchemaMismatch` if the profile does not cover the
    /// scheme, or `AssignError::NoCandidates` if no reference qualifies.
    pub fn assign(&self, profile: &AlleleProfile) -> Result<MatchResult, AssignError> {
        let resolved = self.resolve(profile)?;
        self.assign_resolved(&resolved)
    }

    /// Resolve checksum codes in a submitted profile
    ///
    /// # Errors
    ///
    /// Returns `AssignError::SchemaMismatch` if the profile does not cover the scheme.
    pub fn resolve(&self, profile: &AlleleProfile) -> Result<ResolvedProfile, AssignError> {
        ChecksumResolver::new(self.database.checksums()).resolve(profile)
    }

    /// Assign an already resolved profile
    ///
    /// # Errors
    ///
    /// See [`Self::assign`].
    pub fn assign_resolved(&self, resolved: &ResolvedProfile) -> Result<MatchResult, AssignError> {
        let expected = self.database.locus_count();
        if resolved.len() != expected {
            return Err(AssignError::SchemaMismatch {
                expected,
                found: resolved.len(),
            });
        }

        let query = encoding::encode(resolved);
        let positions = self.candidates(&query, resolved.is_complete());
        let scored: Vec<ScoredCandidate> = positions
            .par_iter()
            .filter_map(|&position| {
                let reference = self.database.reference(position)?;
                Some(ScoredCandidate::new(
                    position,
                    reference.st,
                    AlleleDistance::between(&query, &reference.alleles),
                ))
            })
            .collect();
        debug!("Scored {} candidates", scored.len());

        let best = MatchSelector::new(self.gap_limit()).select(scored)?;
        debug!(
            "Closest ST {} at distance {} ({} gaps)",
            best.st,
            best.score.distance,
            best.score.total_gaps()
        );

        Ok(self.build_result(&best))
    }

    /// Assign one query record, reporting failure in the envelope
    #[must_use]
    pub fn assign_record(&self, record: &QueryRecord) -> AssignmentOutcome {
        let outcome = self.resolve(&record.profile()).and_then(|resolved| {
            let unresolved = resolved.unresolved_checksums();
            self.assign_resolved(&resolved)
                .map(|result| (result, unresolved))
        });

        let outcome = match outcome {
            Ok((result, unresolved)) => {
                AssignmentOutcome::success(record.id.clone(), result, unresolved)
            }
            Err(e) => {
                debug!("Query {:?} failed: {e}", record.id);
                AssignmentOutcome::failure(record.id.clone(), &e)
            }
        };
        outcome.with_versions(self.database.metadata().versions())
    }

    /// Assign one batch element; unreadable elements fail as `invalid_record`
    #[must_use]
    pub fn assign_entry(&self, entry: &QueryEntry) -> AssignmentOutcome {
        match entry {
            Ok(record) => self.assign_record(record),
            Err(invalid) => {
                debug!("Query {:?} is not a valid record: {}", invalid.id, invalid.reason);
                AssignmentOutcome::failure(
                    invalid.id.clone(),
                    &AssignError::InvalidRecord(invalid.reason.clone()),
                )
                .with_versions(self.database.metadata().versions())
            }
        }
    }

    /// Assign many records in parallel. One envelope per record, in input order;
    /// a failed record never affects the others.
    #[must_use]
    pub fn assign_batch(&self, records: &[QueryRecord]) -> Vec<AssignmentOutcome> {
        records
            .par_iter()
            .map(|record| self.assign_record(record))
            .collect()
    }

    /// Assign a parsed batch, invalid elements included, keeping input order
    #[must_use]
    pub fn assign_entries(&self, entries: &[QueryEntry]) -> Vec<AssignmentOutcome> {
        entries
            .par_iter()
            .map(|entry| self.assign_entry(entry))
            .collect()
    }

    /// Effective gap limit against this database
    #[must_use]
    pub fn gap_limit(&self) -> Option<usize> {
        match self.config.max_gaps {
            GapLimit::Scheme => Some(
                self.database
                    .metadata()
                    .max_reference_gaps
                    .unwrap_or_else(|| GapLimit::scheme_default(self.database.locus_count())),
            ),
            limit => limit.resolve(self.database.locus_count()),
        }
    }

    /// Positions of the references to score against an encoded query
    fn candidates(&self, query: &[u32], complete: bool) -> Vec<usize> {
        if complete {
            let identical = self.database.find_by_signature(query);
            if !identical.is_empty() {
                debug!("Exact signature match with {} references", identical.len());
                return identical.to_vec();
            }
        }

        match self.config.strategy {
            SearchStrategy::Exhaustive => (0..self.database.len()).collect(),
            SearchStrategy::Indexed => {
                let k = self.config.shortlist_size;
                let ef = self.config.ef_search.max(k);
                self.database
                    .index()
                    .search(self.database.references(), query, k, ef)
                    .into_iter()
                    .map(|hit| hit.position)
                    .collect()
            }
        }
    }

    fn build_result(&self, best: &ScoredCandidate) -> MatchResult {
        let distance = best.score.distance;
        let hiercc = infer_hiercc(
            distance,
            self.database.hiercc(),
            self.database.hiercc().row(best.position),
        );

        MatchResult {
            st: best.st,
            distance,
            hiercc_distance: distance,
            gaps_both: best.score.gaps_both,
            gaps_a: best.score.gaps_a,
            gaps_b: best.score.gaps_b,
            hiercc,
        }
    }
}
