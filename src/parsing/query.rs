//! Parser for query records: a single JSON object, a JSON array of objects,
//! or JSON Lines.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::AlleleProfile;
use crate::parsing::ParseError;
use crate::utils::io::read_to_string;
use crate::utils::validation::{check_batch_limit, check_locus_limit};

/// One profile submitted for assignment. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Caller-supplied identifier echoed in the result
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: Option<String>,

    /// Per-locus codes joined by `_`
    pub code: String,
}

impl QueryRecord {
    #[must_use]
    pub fn new(id: Option<String>, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
        }
    }

    #[must_use]
    pub fn profile(&self) -> AlleleProfile {
        AlleleProfile::from_code_string(&self.code)
    }
}

/// Accept string or numeric identifiers
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// A batch element that could not be read as a query record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidRecord {
    /// Identifier of the element, when it carried a readable one
    pub id: Option<String>,
    pub reason: String,
}

/// One element of a query batch, in input order
pub type QueryEntry = Result<QueryRecord, InvalidRecord>;

/// Read one JSON value as a query record
fn read_entry(value: serde_json::Value) -> QueryEntry {
    let id = value
        .get("id")
        .and_then(|id| deserialize_id(id).ok().flatten());

    let record = QueryRecord::deserialize(value).map_err(|e| InvalidRecord {
        id: id.clone(),
        reason: e.to_string(),
    })?;

    let loci = record.code.matches('_').count() + 1;
    match check_locus_limit(loci) {
        Some(reason) => Err(InvalidRecord { id, reason }),
        None => Ok(record),
    }
}

/// Parse query records from text.
///
/// Input that is not JSON fails as a whole. Elements that are JSON but not
/// valid records become [`InvalidRecord`] entries in place, so one bad
/// element never rejects its batch.
///
/// # Errors
///
/// Returns `ParseError::Json` for malformed JSON, `ParseError::InvalidFormat`
/// if no records are present, or `ParseError::TooManyQueries` if the batch
/// limit is exceeded.
pub fn parse_query_text(text: &str) -> Result<Vec<QueryEntry>, ParseError> {
    let trimmed = text.trim_start();

    let values: Vec<serde_json::Value> = if trimmed.starts_with('[') {
        serde_json::from_str(trimmed)?
    } else {
        // A single object and JSON Lines are both a stream of values
        serde_json::Deserializer::from_str(trimmed)
            .into_iter::<serde_json::Value>()
            .collect::<Result<_, _>>()?
    };

    if values.is_empty() {
        return Err(ParseError::InvalidFormat(
            "No query records found".to_string(),
        ));
    }
    if check_batch_limit(values.len()).is_some() {
        return Err(ParseError::TooManyQueries(values.len()));
    }

    Ok(values.into_iter().map(read_entry).collect())
}

/// Parse query records from a file (optionally gzipped), or stdin when the path is `-`
///
/// # Errors
///
/// Returns `ParseError::Io` if the input cannot be read, or any error from
/// [`parse_query_text`].
pub fn parse_query_file(path: &Path) -> Result<Vec<QueryEntry>, ParseError> {
    let text = read_to_string(path)?;
    parse_query_text(&text)
}
