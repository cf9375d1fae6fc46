//! Tabular datasets for bulk submission
//!
//! A [`Dataset`] is read once, validated, and never mutated. The submitter
//! only ever asks it for row subsets serialized as TSV.

use crate::error::{CliError, Result};
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

/// Column holding the per-node unique identifier of each row
pub const SUBMITTER_ID_COLUMN: &str = "submitter_id";

const UTF8_BOM: char = '\u{feff}';

/// Ordered rows of string cells sharing one header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Load a CSV, TSV or TXT file, choosing the delimiter from the extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let delimiter = if name.ends_with(".csv") {
            b','
        } else if name.ends_with(".tsv") || name.ends_with(".txt") {
            b'\t'
        } else if name.ends_with(".xlsx") {
            return Err(CliError::user_input(format!(
                "'{}' is a spreadsheet. Export its first worksheet as TSV or CSV and submit that file.",
                path.display()
            )));
        } else {
            return Err(CliError::user_input(format!(
                "'{}' is not a CSV or TSV file. Please upload a file in CSV or TSV format.",
                path.display()
            )));
        };

        let file = std::fs::File::open(path)?;
        Self::from_reader(file, delimiter)
    }

    /// Parse delimited text with a header row
    ///
    /// Leading `*` markers are stripped from header names and short rows are
    /// padded with empty cells.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let name = if i == 0 { name.trim_start_matches(UTF8_BOM) } else { name };
                normalize_header(name)
            })
            .collect();

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() > columns.len() {
                return Err(CliError::user_input(format!(
                    "data row {} has {} fields but the header only names {}",
                    line + 1,
                    record.len(),
                    columns.len()
                )));
            }
            let row = (0..columns.len())
                .map(|i| record.get(i).unwrap_or_default().to_string())
                .collect();
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    /// Build a dataset from in-memory cells
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let columns: Vec<String> = columns.iter().map(|c| normalize_header(c)).collect();
        if let Some((i, _)) = rows.iter().enumerate().find(|(_, r)| r.len() != columns.len()) {
            return Err(CliError::user_input(format!(
                "row {} does not have {} cells",
                i + 1,
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn submitter_id_position(&self) -> Option<usize> {
        self.columns.iter().position(|c| c == SUBMITTER_ID_COLUMN)
    }

    /// The submitter id of a row, if the dataset has that column
    pub fn submitter_id(&self, row: usize) -> Option<&str> {
        let column = self.submitter_id_position()?;
        self.rows.get(row).map(|r| r[column].as_str())
    }

    /// Check the preconditions of a submission run
    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(CliError::user_input("the file contains no records"));
        }

        let Some(column) = self.submitter_id_position() else {
            return Err(CliError::user_input(format!(
                "the file has no '{}' column; it identifies records in responses and retries",
                SUBMITTER_ID_COLUMN
            )));
        };

        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for row in &self.rows {
            let id = row[column].as_str();
            if !seen.insert(id) {
                duplicates.insert(id.to_string());
            }
        }

        if duplicates.is_empty() {
            Ok(())
        } else {
            Err(CliError::DuplicateIdentifier {
                ids: duplicates.into_iter().collect(),
            })
        }
    }

    /// Map submitter id to row position
    pub fn submitter_index(&self) -> HashMap<&str, usize> {
        match self.submitter_id_position() {
            Some(column) => self
                .rows
                .iter()
                .enumerate()
                .map(|(i, row)| (row[column].as_str(), i))
                .collect(),
            None => HashMap::new(),
        }
    }

    /// Serialize the header plus the given rows as tab-separated text
    pub fn chunk_tsv(&self, rows: &[usize]) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b'\t')
            .from_writer(Vec::new());

        writer.write_record(&self.columns)?;
        for &i in rows {
            let row = self
                .rows
                .get(i)
                .ok_or_else(|| CliError::user_input(format!("row {} is out of range", i)))?;
            writer.write_record(row)?;
        }

        let bytes = writer.into_inner().map_err(|e| CliError::Io(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| CliError::Other(e.into()))
    }
}

fn normalize_header(name: &str) -> String {
    name.trim().trim_start_matches('*').to_string()
}
