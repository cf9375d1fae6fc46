//! Field-by-field comparison of manifest rows against index records

use crate::verify::record::{FileSize, IndexRecord, ManifestField, ManifestRow, RawRow};
use std::fmt;

/// Field name used when the index has no record for a guid
pub const NO_RECORD: &str = "no_record";

/// One field-level mismatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    pub guid: String,
    pub field: String,
    pub expected: String,
    pub actual: String,
}

impl Discrepancy {
    pub fn new(
        guid: impl Into<String>,
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            guid: guid.into(),
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// The index could not produce a record; `reason` is the fetch error text
    pub fn no_record(guid: Option<&str>, row: &RawRow, reason: impl fmt::Display) -> Self {
        Self::new(
            guid.unwrap_or("None"),
            NO_RECORD,
            render_row(row),
            reason.to_string(),
        )
    }
}

/// `{guid}|{field}|expected {expected}|actual {actual}`
impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|expected {}|actual {}",
            self.guid, self.field, self.expected, self.actual
        )
    }
}

/// Everything the index disagrees with the manifest about
///
/// - `authz`, `acl`, `urls`: compared as sets
/// - `file_size`, `md5`: compared directly, except that empty and absent on
///   both sides count as equal
/// - `file_name`: flagged only when the manifest names the file and the
///   index does not
pub fn compare_record(guid: &str, expected: &ManifestRow, actual: &IndexRecord) -> Vec<Discrepancy> {
    let mut found = Vec::new();
    let mut push = |field: ManifestField, expected: String, actual: String| {
        found.push(Discrepancy::new(guid, field.as_str(), expected, actual));
    };

    if !same_set(&expected.authz, &actual.authz) {
        push(ManifestField::Authz, render_list(&expected.authz), render_list(&actual.authz));
    }

    if !same_set(&expected.acl, &actual.acl) {
        push(ManifestField::Acl, render_list(&expected.acl), render_list(&actual.acl));
    }

    if !same_size(expected.file_size.as_ref(), actual.size) {
        push(
            ManifestField::FileSize,
            render_option(expected.file_size.as_ref()),
            render_option(actual.size.as_ref()),
        );
    }

    if !same_text(expected.md5.as_deref(), actual.md5()) {
        push(
            ManifestField::Md5,
            render_option(expected.md5.as_ref()),
            render_option(actual.md5()),
        );
    }

    if !same_set(&expected.urls, &actual.urls) {
        push(ManifestField::Urls, render_list(&expected.urls), render_list(&actual.urls));
    }

    let expected_name = expected.file_name.as_deref().filter(|n| !n.is_empty());
    let actual_name = actual.file_name.as_deref().filter(|n| !n.is_empty());
    if expected_name.is_some() && actual_name.is_none() {
        push(
            ManifestField::FileName,
            render_option(expected_name),
            render_option(actual.file_name.as_ref()),
        );
    }

    found
}

fn same_set(expected: &[String], actual: &[String]) -> bool {
    let mut expected: Vec<&String> = expected.iter().collect();
    let mut actual: Vec<&String> = actual.iter().collect();
    expected.sort();
    actual.sort();
    expected == actual
}

fn same_size(expected: Option<&FileSize>, actual: Option<u64>) -> bool {
    let expected_null = match expected {
        None => true,
        Some(FileSize::Raw(raw)) => raw.is_empty(),
        Some(FileSize::Bytes(_)) => false,
    };
    if expected_null && actual.is_none() {
        return true;
    }

    matches!((expected, actual), (Some(FileSize::Bytes(e)), Some(a)) if *e == a)
}

fn same_text(expected: Option<&str>, actual: Option<&str>) -> bool {
    let expected = expected.filter(|s| !s.is_empty());
    let actual = actual.filter(|s| !s.is_empty());
    expected == actual
}

fn render_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("'{}'", i)).collect();
    format!("[{}]", quoted.join(", "))
}

fn render_option<T: fmt::Display>(value: Option<T>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "None".to_string(),
    }
}

fn render_row(row: &RawRow) -> String {
    let cells: Vec<String> = row
        .iter()
        .map(|(k, v)| format!("'{}': '{}'", k, v))
        .collect();
    format!("{{{}}}", cells.join(", "))
}
