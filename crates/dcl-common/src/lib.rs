//! DCL Common Library
//!
//! Shared error type, environment lookups, and logging bootstrap for the
//! DCL workspace.
//!
//! # Example
//!
//! ```no_run
//! use dcl_common::logging::{init_logging, LogConfig};
//! use tracing::info;
//!
//! fn main() -> dcl_common::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     let _guard = init_logging(&config)?;
//!
//!     info!("Loader started");
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod env;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{DclError, Result};
