//! Manifest file reading
//!
//! A manifest is delimited text with a header row. It is read completely up
//! front so a malformed file fails before the first index request.

use crate::error::{CliError, Result};
use crate::verify::record::{normalize_row, RawRow};
use std::io::Read;
use std::path::Path;

/// Default column delimiter
pub const DEFAULT_DELIMITER: u8 = b',';

/// Read every row of a manifest file
pub fn read_manifest(path: impl AsRef<Path>, delimiter: u8) -> Result<Vec<RawRow>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        CliError::user_input(format!("cannot open manifest '{}': {}", path.display(), e))
    })?;
    read_manifest_from(file, delimiter)
}

/// Read manifest rows from any reader
pub fn read_manifest_from<R: Read>(reader: R, delimiter: u8) -> Result<Vec<RawRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| CliError::user_input(format!("manifest header is unreadable: {}", e)))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record
            .map_err(|e| CliError::user_input(format!("manifest line {}: {}", line + 2, e)))?;

        if record.len() > headers.len() {
            return Err(CliError::user_input(format!(
                "manifest line {} has {} fields but the header has {}",
                line + 2,
                record.len(),
                headers.len()
            )));
        }

        let cells = headers
            .iter()
            .enumerate()
            .map(|(i, header)| (header.as_str(), record.get(i).unwrap_or_default()));
        rows.push(normalize_row(cells));
    }

    Ok(rows)
}

/// Parse the `--delimiter` flag: a single byte, with `\t` or `tab` for tabs
pub fn parse_delimiter(raw: &str) -> Result<u8> {
    match raw {
        "\\t" | "tab" | "\t" => Ok(b'\t'),
        other if other.len() == 1 => Ok(other.as_bytes()[0]),
        other => Err(CliError::config(format!(
            "delimiter must be a single character, got '{}'",
            other
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_read_manifest_normalizes_rows() {
        let text = "\u{feff}*guid, md5 ,acl\n g-1 ,abc,open phs1\ng-2,,\n";
        let rows = read_manifest_from(text.as_bytes(), b',').unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["guid"], "g-1");
        assert_eq!(rows[0]["md5"], "abc");
        assert_eq!(rows[0]["acl"], "open phs1");
        assert_eq!(rows[1]["md5"], "");
    }

    #[test]
    fn test_short_lines_are_padded() {
        let rows = read_manifest_from("guid|md5\ng-1\n".as_bytes(), b'|').unwrap();
        assert_eq!(rows[0]["md5"], "");
    }

    #[test]
    fn test_long_lines_are_rejected() {
        let err = read_manifest_from("guid\ng-1,extra\n".as_bytes(), b',').unwrap_err();
        assert!(matches!(err, CliError::UserInput(_)));
    }

    #[test]
    fn test_missing_file_is_user_input() {
        assert!(matches!(
            read_manifest("/nonexistent/manifest.csv", b','),
            Err(CliError::UserInput(_))
        ));
    }

    #[test]
    fn test_parse_delimiter() {
        assert_eq!(parse_delimiter(",").unwrap(), b',');
        assert_eq!(parse_delimiter("\\t").unwrap(), b'\t');
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert!(parse_delimiter(";;").is_err());
    }
}
