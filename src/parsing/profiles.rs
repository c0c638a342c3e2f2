//! Parser for reference profile tables.
//!
//! Tab-separated, optionally gzipped. The header names the ST column and then
//! every locus in scheme order:
//!
//! ```text
//! ST	STMMW_00001	STMMW_00002	...
//! 1	1	4	...
//! 2	1	0	...
//! ```
//!
//! Allele cells are positive integers; `0`, `-` or an empty cell mean the
//! locus was not called.

use std::io::BufRead;
use std::path::Path;

use tracing::debug;

use crate::core::{ReferenceProfile, SequenceType};
use crate::matching::encoding::MISSING_ALLELE;
use crate::parsing::ParseError;
use crate::utils::io::open_reader;

/// Reference profiles in file order with the scheme's locus names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTable {
    pub loci: Vec<String>,
    pub profiles: Vec<ReferenceProfile>,
}

/// Parse a profile table file.
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or
/// `ParseError::InvalidFormat` for a missing header, a row with the wrong
/// number of columns, or a non-numeric allele.
pub fn parse_profiles_file(path: &Path) -> Result<ProfileTable, ParseError> {
    parse_profiles_reader(open_reader(path)?)
}

/// Parse a profile table from any buffered reader.
///
/// # Errors
///
/// See [`parse_profiles_file`].
pub fn parse_profiles_reader<R: BufRead>(reader: R) -> Result<ProfileTable, ParseError> {
    let mut lines = reader.lines();

    let header = lines
        .next()
        .transpose()?
        .ok_or_else(|| ParseError::InvalidFormat("Empty profile table".to_string()))?;
    let loci: Vec<String> = header
        .trim_end_matches(['\r', '\n'])
        .split('\t')
        .skip(1)
        .map(|s| s.trim().to_string())
        .collect();
    if loci.is_empty() {
        return Err(ParseError::InvalidFormat(
            "Profile table header names no loci".to_string(),
        ));
    }

    let mut profiles = Vec::new();
    let mut skipped = 0usize;
    for (line_num, line) in lines.enumerate() {
        let line = line?;
        let line_num = line_num + 2;
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            continue;
        }

        let mut fields = line.split('\t');
        let st_field = fields.next().unwrap_or_default();
        let Some(st) = SequenceType::parse(st_field) else {
            debug!("Skipping row with ST '{st_field}' at line {line_num}");
            skipped += 1;
            continue;
        };

        let alleles = fields
            .map(|cell| parse_allele_cell(cell, line_num))
            .collect::<Result<Vec<u32>, ParseError>>()?;
        if alleles.len() != loci.len() {
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num}: ST {st} has {} alleles, header names {} loci",
                alleles.len(),
                loci.len()
            )));
        }

        profiles.push(ReferenceProfile::new(st, alleles));
    }

    if skipped > 0 {
        debug!("Skipped {skipped} rows without a valid ST");
    }

    Ok(ProfileTable { loci, profiles })
}

fn parse_allele_cell(cell: &str, line_num: usize) -> Result<u32, ParseError> {
    match cell.trim() {
        "" | "-" | "0" => Ok(MISSING_ALLELE),
        value => value.parse::<u32>().map_err(|_| {
            ParseError::InvalidFormat(format!("Line {line_num}: invalid allele '{value}'"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_profiles() {
        let text = "ST\tl1\tl2\tl3\n1\t1\t2\t3\n2\t1\t0\t-\n\n";
        let table = parse_profiles_reader(text.as_bytes()).unwrap();
        assert_eq!(table.loci, vec!["l1", "l2", "l3"]);
        assert_eq!(table.profiles.len(), 2);
        assert_eq!(table.profiles[0].alleles, vec![1, 2, 3]);
        assert_eq!(table.profiles[1].st, SequenceType(2));
        assert_eq!(table.profiles[1].alleles, vec![1, MISSING_ALLELE, MISSING_ALLELE]);
    }

    #[test]
    fn test_skips_invalid_sts() {
        let text = "ST\tl1\n-1\t4\n5\t4\n";
        let table = parse_profiles_reader(text.as_bytes()).unwrap();
        assert_eq!(table.profiles.len(), 1);
        assert_eq!(table.profiles[0].st, SequenceType(5));
    }

    #[test]
    fn test_rejects_ragged_rows() {
        let text = "ST\tl1\tl2\n1\t1\n";
        let err = parse_profiles_reader(text.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }

    #[test]
    fn test_rejects_bad_alleles() {
        let text = "ST\tl1\n1\tabc\n";
        assert!(matches!(
            parse_profiles_reader(text.as_bytes()),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_empty_table() {
        assert!(parse_profiles_reader("".as_bytes()).is_err());
        assert!(parse_profiles_reader("ST\n".as_bytes()).is_err());
    }

    #[test]
    fn test_windows_line_endings() {
        let text = "ST\tl1\tl2\r\n1\t1\t2\r\n";
        let table = parse_profiles_reader(text.as_bytes()).unwrap();
        assert_eq!(table.loci, vec!["l1", "l2"]);
        assert_eq!(table.profiles[0].alleles, vec![1, 2]);
    }
}
