//! Bulk submission of tabular records
//!
//! [`ChunkSubmitter`] walks a [`Dataset`](crate::dataset::Dataset) in
//! batches, [`classify`] interprets each response, and every outcome lands in
//! a [`SubmissionResult`].

pub mod classifier;
pub mod result;
pub mod submitter;

pub use classifier::{classify, Classification, SubmittedEntity, OVERLOAD_MARKERS};
pub use result::SubmissionResult;
pub use submitter::{ChunkSubmitter, SubmitBatch, SubmitOptions, DEFAULT_CHUNK_SIZE};
