//! Parsers for query records and database build inputs.
//!
//! This module provides parsers for:
//!
//! - **Query records**: JSON objects, arrays or JSON Lines carrying `_`-joined
//!   allele codes
//! - **Profile tables**: Tab-separated reference profiles (`ST` then one column per locus)
//! - **HierCC assignments**: EnteroBase HierCC JSON or a tab-separated table
//! - **Allele sources**: Per-locus allele FASTA files or a checksum table
//!
//! Every file parser accepts gzip-compressed input when the name ends in `.gz`.
//!
//! ## Example
//!
//! ```rust
//! use hiercc_assign::parsing::query::parse_query_text;
//!
//! let records = parse_query_text(r#"{"id": "sample1", "code": "1_4__7"}"#).unwrap();
//! let record = records[0].as_ref().unwrap();
//! assert_eq!(record.profile().len(), 4);
//! ```

pub mod alleles;
pub mod hiercc;
pub mod profiles;
pub mod query;

use thiserror::Error;

use crate::utils::validation::MAX_BATCH_QUERIES;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("noodles error: {0}")]
    Noodles(String),

    #[error("Too many queries: {0} exceeds maximum allowed ({MAX_BATCH_QUERIES})")]
    TooManyQueries(usize),
}
