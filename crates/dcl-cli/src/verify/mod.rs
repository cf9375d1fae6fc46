//! Manifest verification against the remote file index
//!
//! Each manifest row names a guid plus the attributes the index is expected
//! to hold for it. Rows are fetched with bounded concurrency and every
//! mismatch is written as one `guid|field|expected ..|actual ..` line.

pub mod compare;
pub mod dispatcher;
pub mod manifest;
pub mod record;
pub mod reporter;

pub use compare::{compare_record, Discrepancy, NO_RECORD};
pub use dispatcher::{Dispatcher, RecordFetcher, VerifySummary, DEFAULT_CONCURRENCY, MAX_CONCURRENCY};
pub use manifest::{parse_delimiter, read_manifest, read_manifest_from, DEFAULT_DELIMITER};
pub use record::{
    FieldParser, FieldValue, FileSize, IndexRecord, ManifestField, ManifestRow, RawRow, RowParsers,
};
pub use reporter::{DiscrepancyReporter, ScratchLog};
