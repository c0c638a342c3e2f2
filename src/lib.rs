//! # hiercc-assign
//!
//! A library for assigning cgMLST allele profiles to the closest known
//! sequence type (ST) and inferring its HierCC cluster codes.
//!
//! A core-genome MLST scheme types thousands of loci per genome. A newly
//! sequenced isolate rarely matches a catalogued ST exactly, so the useful
//! question is which known ST it is closest to, and at which HierCC levels it
//! is close enough to share that ST's clusters.
//!
//! `hiercc-assign` answers this against a prebuilt database of reference
//! profiles. Each query is shortlisted with a similarity index and then
//! scored exactly.
//!
//! ## Features
//!
//! - **Checksum resolution**: Alleles submitted as sequence hashes are mapped to
//!   catalogued allele IDs
//! - **Gap-aware distance**: Loci missing on either side are counted apart from
//!   allele mismatches
//! - **Deterministic selection**: Ties are broken by gaps, then by ST
//! - **HierCC inference**: Cluster codes are reported only at levels whose
//!   threshold covers the distance
//! - **Batch and service modes**: Parallel batch assignment and an HTTP service
//!
//! ## Example
//!
//! ```rust,no_run
//! use hiercc_assign::{AlleleProfile, AssignmentEngine, ProfileDatabase};
//! use std::path::Path;
//!
//! // Load a database built with `hiercc-assign database build`
//! let database = ProfileDatabase::load(Path::new("db")).unwrap();
//! let engine = AssignmentEngine::new(&database);
//!
//! let profile = AlleleProfile::from_code_string("1_1_4_0_7");
//! let result = engine.assign(&profile).unwrap();
//!
//! println!("ST {} at distance {}", result.st, result.distance);
//! for slot in &result.hiercc {
//!     println!("{}: {:?}", slot.label, slot.code);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`core`]: Profile, reference and identifier types
//! - [`database`]: Database artifacts, the builder and the similarity index
//! - [`matching`]: Assignment engine and its pipeline stages
//! - [`parsing`]: Parsers for queries and database build inputs
//! - [`cli`]: Command-line interface implementation
//! - [`web`]: HTTP assignment service

pub mod cli;
pub mod core;
pub mod database;
pub mod matching;
pub mod parsing;
pub mod utils;
pub mod web;

// Re-export commonly used types for convenience
pub use core::profile::{AlleleCode, AlleleProfile, ResolvedProfile};
pub use core::reference::{HierCcRow, ReferenceProfile};
pub use core::types::*;
pub use database::{DatabaseBuilder, ProfileDatabase};
pub use matching::engine::{AssignConfig, AssignmentEngine, AssignmentOutcome, MatchResult};
pub use matching::AssignError;
