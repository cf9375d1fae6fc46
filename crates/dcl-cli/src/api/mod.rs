//! API client module
//!
//! HTTP clients for the commons submission service and file index.

pub mod client;
pub mod endpoints;
pub mod types;

pub use client::{IndexClient, ProjectSubmitter, SubmissionClient, TlsMode};
pub use types::*;
