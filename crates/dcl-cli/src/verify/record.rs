//! Manifest row adapters
//!
//! Manifests come from many export tools and name the same column in
//! different ways (`md5` or `md5sum`, `file_size` or `size`, ...). Each of
//! the seven canonical fields has a default extractor that knows its
//! synonyms; callers swap in their own [`FieldParser`] per field through
//! [`RowParsers::with_parser`], e.g. for a non-space list delimiter.
//!
//! ```
//! use dcl_cli::verify::record::{FieldValue, ManifestField, RawRow, RowParsers};
//!
//! let parsers = RowParsers::default().with_parser(ManifestField::Authz, |row: &RawRow| {
//!     FieldValue::List(
//!         row.get("authz")
//!             .map(|v| v.split(';').map(str::to_string).collect())
//!             .unwrap_or_default(),
//!     )
//! });
//!
//! let row = RawRow::from([("authz".to_string(), "/a;/b".to_string())]);
//! assert_eq!(parsers.parse(&row).authz, vec!["/a", "/b"]);
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// One manifest line: normalized column name -> trimmed cell, in header order
pub type RawRow = IndexMap<String, String>;

/// Build a [`RawRow`], trimming keys and values and dropping leading `*`
/// "required" markers from column names
pub fn normalize_row<I, K, V>(cells: I) -> RawRow
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    cells
        .into_iter()
        .map(|(k, v)| {
            (
                k.as_ref().trim().trim_start_matches('*').to_string(),
                v.as_ref().trim().to_string(),
            )
        })
        .collect()
}

/// Canonical manifest fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ManifestField {
    Guid,
    Authz,
    Acl,
    FileSize,
    Md5,
    Urls,
    FileName,
}

impl ManifestField {
    pub fn as_str(self) -> &'static str {
        match self {
            ManifestField::Guid => "guid",
            ManifestField::Authz => "authz",
            ManifestField::Acl => "acl",
            ManifestField::FileSize => "file_size",
            ManifestField::Md5 => "md5",
            ManifestField::Urls => "urls",
            ManifestField::FileName => "file_name",
        }
    }
}

impl fmt::Display for ManifestField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expected file size; unparseable sizes are kept verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSize {
    Bytes(u64),
    Raw(String),
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSize::Bytes(n) => write!(f, "{}", n),
            FileSize::Raw(s) => f.write_str(s),
        }
    }
}

/// Output of a field parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(Option<String>),
    List(Vec<String>),
    Size(Option<FileSize>),
}

impl FieldValue {
    /// Scalar view; lists are joined with spaces
    pub fn into_text(self) -> Option<String> {
        match self {
            FieldValue::Text(text) => text,
            FieldValue::List(items) if items.is_empty() => None,
            FieldValue::List(items) => Some(items.join(" ")),
            FieldValue::Size(size) => size.map(|s| s.to_string()),
        }
    }

    /// List view; text is split on whitespace
    pub fn into_list(self) -> Vec<String> {
        match self {
            FieldValue::List(items) => items,
            FieldValue::Text(text) => text.map(|t| split_list(&t)).unwrap_or_default(),
            FieldValue::Size(size) => size.map(|s| vec![s.to_string()]).unwrap_or_default(),
        }
    }

    /// Size view; text goes through [`parse_size`]
    pub fn into_size(self) -> Option<FileSize> {
        match self {
            FieldValue::Size(size) => size,
            FieldValue::Text(text) => text.map(|t| parse_size(&t)),
            FieldValue::List(items) => items.into_iter().next().map(|t| parse_size(&t)),
        }
    }
}

/// Extracts one field from a raw row
pub trait FieldParser: Send + Sync {
    fn parse(&self, row: &RawRow) -> FieldValue;
}

impl<F> FieldParser for F
where
    F: Fn(&RawRow) -> FieldValue + Send + Sync,
{
    fn parse(&self, row: &RawRow) -> FieldValue {
        self(row)
    }
}

/// Split a list cell on whitespace, dropping empty tokens
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Parse a size cell; a non-integer is logged and kept raw
pub fn parse_size(raw: &str) -> FileSize {
    match raw.trim().parse::<u64>() {
        Ok(bytes) => FileSize::Bytes(bytes),
        Err(_) => {
            warn!(value = raw, "could not convert file size to an integer");
            FileSize::Raw(raw.to_string())
        },
    }
}

/// Value of the first synonym column present in the row, even if empty
fn first_present<'a>(row: &'a RawRow, columns: &[&str]) -> Option<&'a String> {
    columns.iter().find_map(|c| row.get(*c))
}

/// Value of the first synonym column with a non-empty cell
fn first_non_empty<'a>(row: &'a RawRow, columns: &[&str]) -> Option<&'a String> {
    columns
        .iter()
        .filter_map(|c| row.get(*c))
        .find(|v| !v.is_empty())
}

pub fn guid_from_row(row: &RawRow) -> FieldValue {
    FieldValue::Text(first_non_empty(row, &["guid", "GUID"]).cloned())
}

pub fn md5_from_row(row: &RawRow) -> FieldValue {
    FieldValue::Text(first_present(row, &["md5", "md5sum"]).cloned())
}

pub fn file_size_from_row(row: &RawRow) -> FieldValue {
    FieldValue::Size(first_present(row, &["file_size", "size"]).map(|v| parse_size(v)))
}

pub fn acl_from_row(row: &RawRow) -> FieldValue {
    FieldValue::List(row.get("acl").map(|v| split_list(v)).unwrap_or_default())
}

pub fn authz_from_row(row: &RawRow) -> FieldValue {
    FieldValue::List(row.get("authz").map(|v| split_list(v)).unwrap_or_default())
}

pub fn urls_from_row(row: &RawRow) -> FieldValue {
    FieldValue::List(
        first_present(row, &["urls", "url"])
            .map(|v| split_list(v))
            .unwrap_or_default(),
    )
}

pub fn file_name_from_row(row: &RawRow) -> FieldValue {
    FieldValue::Text(first_present(row, &["file_name", "filename", "name"]).cloned())
}

fn default_value(field: ManifestField, row: &RawRow) -> FieldValue {
    match field {
        ManifestField::Guid => guid_from_row(row),
        ManifestField::Authz => authz_from_row(row),
        ManifestField::Acl => acl_from_row(row),
        ManifestField::FileSize => file_size_from_row(row),
        ManifestField::Md5 => md5_from_row(row),
        ManifestField::Urls => urls_from_row(row),
        ManifestField::FileName => file_name_from_row(row),
    }
}

/// Expected record as described by one manifest line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestRow {
    pub guid: Option<String>,
    pub authz: Vec<String>,
    pub acl: Vec<String>,
    pub file_size: Option<FileSize>,
    pub md5: Option<String>,
    pub urls: Vec<String>,
    pub file_name: Option<String>,
}

/// Per-field parsers; fields without an override use the default extractor
#[derive(Clone, Default)]
pub struct RowParsers {
    overrides: HashMap<ManifestField, Arc<dyn FieldParser>>,
}

impl RowParsers {
    /// Replace the parser for one field
    pub fn with_parser(mut self, field: ManifestField, parser: impl FieldParser + 'static) -> Self {
        self.overrides.insert(field, Arc::new(parser));
        self
    }

    /// Run the parser registered for `field`
    pub fn value(&self, field: ManifestField, row: &RawRow) -> FieldValue {
        match self.overrides.get(&field) {
            Some(parser) => parser.parse(row),
            None => default_value(field, row),
        }
    }

    pub fn parse(&self, row: &RawRow) -> ManifestRow {
        ManifestRow {
            guid: self.value(ManifestField::Guid, row).into_text(),
            authz: self.value(ManifestField::Authz, row).into_list(),
            acl: self.value(ManifestField::Acl, row).into_list(),
            file_size: self.value(ManifestField::FileSize, row).into_size(),
            md5: self.value(ManifestField::Md5, row).into_text(),
            urls: self.value(ManifestField::Urls, row).into_list(),
            file_name: self.value(ManifestField::FileName, row).into_text(),
        }
    }
}

impl fmt::Debug for RowParsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut overridden: Vec<_> = self.overrides.keys().copied().collect();
        overridden.sort();
        f.debug_struct("RowParsers").field("overridden", &overridden).finish()
    }
}

/// Authoritative record held by the remote index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    #[serde(default, deserialize_with = "null_as_default")]
    pub did: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hashes: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub urls: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub acl: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authz: Vec<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

impl IndexRecord {
    pub fn md5(&self) -> Option<&str> {
        self.hashes.get("md5").map(String::as_str)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
