//! Readers and writers that transparently handle gzip.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Open a file for reading, decompressing it when the name ends in `.gz`.
///
/// # Errors
///
/// Returns an IO error if the file cannot be opened.
pub fn open_reader(path: &Path) -> std::io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    let is_gzipped = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    let reader: Box<dyn Read> = if is_gzipped {
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    Ok(Box::new(BufReader::new(reader)))
}

/// Open a file, or stdin when the path is `-`.
///
/// # Errors
///
/// Returns an IO error if the file cannot be opened.
pub fn open_reader_or_stdin(path: &Path) -> std::io::Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        Ok(Box::new(BufReader::new(std::io::stdin())))
    } else {
        open_reader(path)
    }
}

/// Read a whole (possibly gzipped) file, or stdin, into a string.
///
/// # Errors
///
/// Returns an IO error if the input cannot be read or is not UTF-8.
pub fn read_to_string(path: &Path) -> std::io::Result<String> {
    let mut reader = open_reader_or_stdin(path)?;
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text)
}

/// Create a gzip-compressed file for writing.
///
/// # Errors
///
/// Returns an IO error if the file cannot be created.
pub fn create_gz_writer(path: &Path) -> std::io::Result<GzEncoder<BufWriter<File>>> {
    let file = File::create(path)?;
    Ok(GzEncoder::new(BufWriter::new(file), Compression::default()))
}

/// Finish a gzip stream and flush the underlying file.
///
/// # Errors
///
/// Returns an IO error if the trailing data cannot be written.
pub fn finish_gz_writer(writer: GzEncoder<BufWriter<File>>) -> std::io::Result<()> {
    let mut inner = writer.finish()?;
    inner.flush()
}
