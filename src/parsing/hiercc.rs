//! Parser for HierCC cluster assignments.
//!
//! Two formats are accepted, both optionally gzipped:
//!
//! - JSON as exported by EnteroBase: an array (or an object with an `STs`
//!   array) of `{"ST_id": "..", "info": {"hierCC": {"d0": "..", "d2": ..}}}`
//! - TSV with an `ST` column followed by one column per level (`d0`, `d2`, ...)
//!
//! Level labels are a prefix followed by the threshold. Empty, `null` or
//! negative codes are treated as unknown.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{HierCcRow, SequenceType};
use crate::database::hiercc::DEFAULT_HIERCC_PREFIX;
use crate::parsing::ParseError;
use crate::utils::io::read_to_string;

/// HierCC levels and the code rows of every ST found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierCcData {
    pub prefix: String,
    /// Ascending
    pub thresholds: Vec<u32>,
    pub rows: HashMap<SequenceType, HierCcRow>,
}

impl HierCcData {
    /// No levels and no rows
    #[must_use]
    pub fn empty() -> Self {
        Self {
            prefix: DEFAULT_HIERCC_PREFIX.to_string(),
            thresholds: Vec::new(),
            rows: HashMap::new(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDocument {
    List(Vec<RawEntry>),
    Wrapped {
        #[serde(rename = "STs")]
        sts: Vec<RawEntry>,
    },
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(rename = "ST_id")]
    st_id: Value,
    #[serde(default)]
    info: Option<RawInfo>,
}

#[derive(Deserialize)]
struct RawInfo {
    #[serde(rename = "hierCC", default)]
    hiercc: Option<BTreeMap<String, Value>>,
}

/// Parse a HierCC file, choosing the format from the extension
/// (`.tsv`/`.txt`, optionally `.gz`, are TSV; anything else is JSON).
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, `ParseError::Json` for
/// malformed JSON, or `ParseError::InvalidFormat` for unusable level labels.
pub fn parse_hiercc_file(path: &Path) -> Result<HierCcData, ParseError> {
    let name = path.to_string_lossy().to_lowercase();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    let text = read_to_string(path)?;

    if name.ends_with(".tsv") || name.ends_with(".txt") {
        parse_hiercc_tsv(&text)
    } else {
        parse_hiercc_json(&text)
    }
}

/// Parse EnteroBase HierCC JSON.
///
/// The levels are taken from the first entry carrying HierCC codes.
///
/// # Errors
///
/// See [`parse_hiercc_file`].
pub fn parse_hiercc_json(text: &str) -> Result<HierCcData, ParseError> {
    let entries = match serde_json::from_str::<RawDocument>(text)? {
        RawDocument::List(entries) | RawDocument::Wrapped { sts: entries } => entries,
    };

    let Some(first_levels) = entries
        .iter()
        .find_map(|e| e.info.as_ref().and_then(|i| i.hiercc.as_ref()))
    else {
        warn!("HierCC file contains no cluster codes");
        return Ok(HierCcData::empty());
    };

    let (prefix, thresholds) = parse_levels(first_levels.keys().map(String::as_str))?;

    let mut rows = HashMap::with_capacity(entries.len());
    for entry in entries {
        let Some(codes) = entry.info.and_then(|i| i.hiercc) else {
            continue;
        };
        let Some(st) = value_to_code(&entry.st_id).and_then(|s| SequenceType::parse(&s)) else {
            debug!("Skipping HierCC entry with ST {}", entry.st_id);
            continue;
        };

        let row = thresholds
            .iter()
            .map(|t| codes.get(&format!("{prefix}{t}")).and_then(value_to_code))
            .collect();
        rows.insert(st, HierCcRow::new(row));
    }

    Ok(HierCcData {
        prefix,
        thresholds,
        rows,
    })
}

/// Parse tab-separated HierCC codes with a `ST<TAB>d0<TAB>d2...` header.
///
/// # Errors
///
/// See [`parse_hiercc_file`].
pub fn parse_hiercc_tsv(text: &str) -> Result<HierCcData, ParseError> {
    let mut lines = text.lines();
    let header = lines
        .next()
        .ok_or_else(|| ParseError::InvalidFormat("Empty HierCC table".to_string()))?;
    let labels: Vec<&str> = header.split('\t').skip(1).map(str::trim).collect();
    let (prefix, thresholds) = parse_levels(labels.iter().copied())?;

    // Column order in the file may differ from ascending threshold order
    let column_of: Vec<usize> = thresholds
        .iter()
        .map(|t| {
            let label = format!("{prefix}{t}");
            labels.iter().position(|l| *l == label).unwrap_or_default()
        })
        .collect();

    let mut rows = HashMap::new();
    for (line_num, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
        let Some(st) = SequenceType::parse(fields[0]) else {
            debug!("Skipping HierCC row with ST '{}' at line {}", fields[0], line_num + 2);
            continue;
        };
        let row = column_of
            .iter()
            .map(|&column| {
                fields
                    .get(column + 1)
                    .and_then(|s| value_to_code(&Value::String((*s).to_string())))
            })
            .collect();
        rows.insert(st, HierCcRow::new(row));
    }

    Ok(HierCcData {
        prefix,
        thresholds,
        rows,
    })
}

/// Split level labels such as `d0`, `d25` into a shared prefix and ascending thresholds
fn parse_levels<'a>(labels: impl Iterator<Item = &'a str>) -> Result<(String, Vec<u32>), ParseError> {
    let mut prefix: Option<String> = None;
    let mut thresholds = Vec::new();

    for label in labels {
        let digits_start = label.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        let (label_prefix, digits) = label.split_at(digits_start);
        let threshold: u32 = digits.parse().map_err(|_| {
            ParseError::InvalidFormat(format!("HierCC level '{label}' does not end in a threshold"))
        })?;

        match &prefix {
            Some(p) if p != label_prefix => {
                return Err(ParseError::InvalidFormat(format!(
                    "HierCC level '{label}' does not share prefix '{p}'"
                )));
            }
            Some(_) => {}
            None => prefix = Some(label_prefix.to_string()),
        }
        thresholds.push(threshold);
    }

    thresholds.sort_unstable();
    thresholds.dedup();
    Ok((
        prefix.unwrap_or_else(|| DEFAULT_HIERCC_PREFIX.to_string()),
        thresholds,
    ))
}

fn value_to_code(value: &Value) -> Option<String> {
    let code = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if code.is_empty() || code.starts_with('-') {
        None
    } else {
        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(row: &HierCcRow) -> Vec<Option<&str>> {
        (0..row.len()).map(|i| row.code(i)).collect()
    }

    #[test]
    fn test_parse_enterobase_json() {
        let json = r#"[
            {"ST_id": "1", "info": {"hierCC": {"d5": "1", "d0": "1", "d2": "1"}}},
            {"ST_id": 333640, "info": {"hierCC": {"d0": 333572, "d2": "", "d5": "2"}}},
            {"ST_id": "7", "info": {}},
            {"ST_id": "-3", "info": {"hierCC": {"d0": "9", "d2": "9", "d5": "9"}}}
        ]"#;

        let data = parse_hiercc_json(json).unwrap();
        assert_eq!(data.prefix, "d");
        assert_eq!(data.thresholds, vec![0, 2, 5]);
        assert_eq!(data.rows.len(), 2);
        assert_eq!(
            codes(&data.rows[&SequenceType(333_640)]),
            vec![Some("333572"), None, Some("2")]
        );
    }

    #[test]
    fn test_parse_wrapped_json() {
        let json = r#"{"STs": [{"ST_id": "2", "info": {"hierCC": {"HC0": "2", "HC10": "1"}}}]}"#;
        let data = parse_hiercc_json(json).unwrap();
        assert_eq!(data.prefix, "HC");
        assert_eq!(data.thresholds, vec![0, 10]);
    }

    #[test]
    fn test_parse_tsv() {
        let text = "ST\td2\td0\n5\t1\t5\n6\t\t6\n";
        let data = parse_hiercc_tsv(text).unwrap();
        assert_eq!(data.thresholds, vec![0, 2]);
        assert_eq!(codes(&data.rows[&SequenceType(5)]), vec![Some("5"), Some("1")]);
        assert_eq!(codes(&data.rows[&SequenceType(6)]), vec![Some("6"), None]);
    }

    #[test]
    fn test_rejects_mixed_prefixes() {
        let json = r#"[{"ST_id": "1", "info": {"hierCC": {"d0": "1", "x2": "1"}}}]"#;
        assert!(matches!(parse_hiercc_json(json), Err(ParseError::InvalidFormat(_))));
    }

    #[test]
    fn test_no_codes() {
        let data = parse_hiercc_json(r#"[{"ST_id": "1"}]"#).unwrap();
        assert!(data.thresholds.is_empty());
        assert!(data.rows.is_empty());
    }
}
