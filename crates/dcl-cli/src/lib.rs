//! DCL CLI Library
//!
//! Command-line loader for data commons.
//!
//! # Overview
//!
//! - **Bulk submission**: send a CSV/TSV file to a project node in adaptive
//!   chunks that shrink under server overload and isolate invalid records
//!   (`dcl submit`)
//! - **Manifest verification**: compare a file manifest with the file index
//!   using bounded concurrency (`dcl verify`)
//! - **Graph access**: GraphQL queries, exports, dictionary lookups and
//!   single-record edits (`dcl query`, `dcl export`, `dcl dictionary`,
//!   `dcl schema`, `dcl submit-record`, `dcl delete-record`)
//! - **Administration**: create and delete empty programs and projects
//!   (`dcl program`, `dcl project`)

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod api;
pub mod auth;
pub mod commands;
pub mod config;
pub mod dataset;
pub mod error;
pub mod progress;
pub mod submission;
pub mod verify;

// Re-export commonly used types
pub use config::Config;
pub use error::{CliError, Result, SubmitError};

use api::ExportFormat;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DCL - Data Commons Loader
#[derive(Parser, Debug)]
#[command(name = "dcl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Commons endpoint URL
    #[arg(long, env = "DCL_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Print the full command reference as Markdown
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bulk-submit a CSV/TSV file to a project
    Submit {
        /// Data file (.csv, .tsv or .txt)
        file: PathBuf,

        /// Target project as PROGRAM-PROJECT
        #[arg(short, long)]
        project_id: String,

        /// Initial rows per chunk
        #[arg(short, long)]
        chunk_size: Option<usize>,

        /// Skip this many rows before the first chunk
        #[arg(long)]
        row_offset: Option<usize>,

        /// Write the full submission result as JSON
        #[arg(short, long)]
        report: Option<PathBuf>,
    },

    /// Verify a file manifest against the index
    Verify {
        /// Manifest file with a header row
        manifest: PathBuf,

        /// Maximum concurrent index requests
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,

        /// Column delimiter (`\t` or `tab` for tabs)
        #[arg(short, long)]
        delimiter: Option<String>,

        /// Discrepancy log (defaults to verify-manifest-errors-{timestamp}.log)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a GraphQL query (inline text or a file path)
    Query {
        /// Query text or path to a .graphql file
        query: String,

        /// Query variables as a JSON object
        #[arg(long)]
        variables: Option<String>,

        /// Attempts before giving up on failed requests
        #[arg(long, default_value = "1")]
        max_tries: u32,
    },

    /// Export records from a project
    Export {
        #[command(subcommand)]
        command: ExportCommand,
    },

    /// Show the dictionary schema of a node (`_all` for the whole dictionary)
    Dictionary {
        /// Node type
        node: String,
    },

    /// Submit JSON record(s) to a project
    SubmitRecord {
        /// JSON file holding one record or an array of records
        file: PathBuf,

        /// Target project as PROGRAM-PROJECT
        #[arg(short, long)]
        project_id: String,
    },

    /// Delete a record from a project
    DeleteRecord {
        /// Record uuid
        id: String,

        /// Project as PROGRAM-PROJECT
        #[arg(short, long)]
        project_id: String,
    },

    /// Create or delete programs
    Program {
        #[command(subcommand)]
        command: ProgramCommand,
    },

    /// Create or delete projects
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },

    /// Print the GraphQL schema of the commons
    Schema,
}

/// Program subcommands
#[derive(Subcommand, Debug)]
pub enum ProgramCommand {
    /// Create a program from a JSON node
    Create {
        /// JSON file with the program node
        file: PathBuf,
    },

    /// Delete an empty program
    Delete {
        /// Program name
        program: String,
    },
}

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    /// Create a project under a program from a JSON node
    Create {
        /// Program name
        program: String,

        /// JSON file with the project node
        file: PathBuf,
    },

    /// Delete an empty project
    Delete {
        /// Project as PROGRAM-PROJECT
        #[arg(short, long)]
        project_id: String,
    },
}

/// Export subcommands
#[derive(Subcommand, Debug)]
pub enum ExportCommand {
    /// Export records by id
    Record {
        /// Comma-separated record uuids
        ids: String,

        /// Project as PROGRAM-PROJECT
        #[arg(short, long)]
        project_id: String,

        /// Export format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Output file (prints to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Export every record of a node type
    Node {
        /// Node type, e.g. `case`
        node: String,

        /// Project as PROGRAM-PROJECT
        #[arg(short, long)]
        project_id: String,

        /// Export format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Output file (prints to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
