//! The profile database: reference profiles, HierCC codes, allele checksums
//! and the similarity index, stored together as one versioned directory.
//!
//! - [`ProfileDatabase`]: The immutable, loaded database every assignment reads
//! - [`DatabaseBuilder`]: Builds a database from local profile, HierCC and allele files
//! - [`SimilarityIndex`]: HNSW graph used to shortlist candidate references
//! - [`ChecksumTable`]: Per-locus allele checksum to allele ID mapping
//! - [`HierCcTable`]: HierCC codes aligned with the reference profiles
//!
//! ## Directory layout
//!
//! | File | Contents |
//! |------|----------|
//! | `metadata.json` | Scheme, version, loci, HierCC levels, missing sentinel |
//! | `profiles.bin.gz` | Reference STs and encoded alleles |
//! | `hiercc.bin.gz` | HierCC codes per reference |
//! | `checksums.bin.gz` | Allele checksum table |
//! | `index.bin.gz` | Similarity index graph |

pub mod builder;
pub mod checksums;
pub mod hiercc;
pub mod index;
pub mod metadata;
pub mod store;

pub use builder::{BuildConfig, DatabaseBuilder};
pub use checksums::ChecksumTable;
pub use hiercc::HierCcTable;
pub use index::SimilarityIndex;
pub use metadata::DatabaseMetadata;
pub use store::{DatabaseError, ProfileDatabase};
