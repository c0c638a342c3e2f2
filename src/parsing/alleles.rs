//! Sources of allele checksums for the checksum table.
//!
//! Checksums come either from per-locus allele FASTA files, hashed here, or
//! from a precomputed tab-separated table.

use std::collections::HashMap;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use noodles::fasta;

use crate::database::checksums::allele_checksum;
use crate::parsing::ParseError;
use crate::utils::io::open_reader;

/// Allele FASTA file names tried for each locus, in order
const FASTA_SUFFIXES: [&str; 6] = [
    ".fasta.gz",
    ".fasta",
    ".fa.gz",
    ".fa",
    ".fna.gz",
    ".fna",
];

/// Checksum of one catalogued allele
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlleleChecksum {
    /// Locus position in scheme order
    pub locus: usize,
    pub checksum: String,
    pub allele: u32,
}

/// Find the allele FASTA file of a locus in a directory
#[must_use]
pub fn find_allele_fasta(dir: &Path, locus: &str) -> Option<PathBuf> {
    FASTA_SUFFIXES
        .iter()
        .map(|suffix| dir.join(format!("{locus}{suffix}")))
        .find(|path| path.is_file())
}

/// Hash every allele in a locus FASTA file.
///
/// Records are named `<locus>_<allele>` (or just `<allele>`); the sequence is
/// hashed with [`allele_checksum`].
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, `ParseError::Noodles`
/// for malformed FASTA, or `ParseError::InvalidFormat` for a record name
/// without an allele ID.
pub fn hash_allele_fasta(
    path: &Path,
    locus: usize,
    locus_name: &str,
    hash_length: usize,
) -> Result<Vec<AlleleChecksum>, ParseError> {
    let mut reader = fasta::io::Reader::new(open_reader(path)?);
    let mut checksums = Vec::new();

    for result in reader.records() {
        let record = result
            .map_err(|e| ParseError::Noodles(format!("Failed to parse FASTA record: {e}")))?;
        let name = String::from_utf8_lossy(record.name()).to_string();
        let allele = allele_id_from_name(&name, locus_name).ok_or_else(|| {
            ParseError::InvalidFormat(format!(
                "{}: record '{name}' does not name an allele of {locus_name}",
                path.display()
            ))
        })?;

        checksums.push(AlleleChecksum {
            locus,
            checksum: allele_checksum(record.sequence().as_ref(), hash_length),
            allele,
        });
    }

    Ok(checksums)
}

fn allele_id_from_name(name: &str, locus_name: &str) -> Option<u32> {
    let name = name.split_whitespace().next()?;
    let id = name
        .strip_prefix(locus_name)
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(name);
    match id.parse::<u32>() {
        Ok(0) | Err(_) => None,
        Ok(id) => Some(id),
    }
}

/// Parse a checksum table: `locus<TAB>checksum<TAB>allele` per line, loci
/// named as in the profile header. A header line is skipped.
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or
/// `ParseError::InvalidFormat` for unknown loci or malformed rows.
pub fn parse_checksum_file(path: &Path, loci: &[String]) -> Result<Vec<AlleleChecksum>, ParseError> {
    parse_checksum_reader(open_reader(path)?, loci)
}

/// Parse a checksum table from any buffered reader.
///
/// # Errors
///
/// See [`parse_checksum_file`].
pub fn parse_checksum_reader<R: BufRead>(
    reader: R,
    loci: &[String],
) -> Result<Vec<AlleleChecksum>, ParseError> {
    let locus_index: HashMap<&str, usize> = loci
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut checksums = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let line_num = line_num + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num}: expected 3 columns, found {}",
                fields.len()
            )));
        }

        let Ok(allele) = fields[2].parse::<u32>() else {
            if line_num == 1 {
                continue;
            }
            return Err(ParseError::InvalidFormat(format!(
                "Line {line_num}: invalid allele '{}'",
                fields[2]
            )));
        };
        let locus = *locus_index.get(fields[0]).ok_or_else(|| {
            ParseError::InvalidFormat(format!("Line {line_num}: unknown locus '{}'", fields[0]))
        })?;

        checksums.push(AlleleChecksum {
            locus,
            checksum: fields[1].to_string(),
            allele,
        });
    }

    Ok(checksums)
}
