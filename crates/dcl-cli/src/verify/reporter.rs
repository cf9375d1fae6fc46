//! Discrepancy output
//!
//! [`DiscrepancyReporter`] is owned by the single consumer of the
//! verification pipeline, so lines never interleave. [`ScratchLog`] keeps a
//! run's lines in a private temporary directory until the run completes and
//! then appends them to the real output file in one go.

use crate::error::Result;
use crate::verify::compare::Discrepancy;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, error};

/// Writes one line per discrepancy to a sink
pub struct DiscrepancyReporter<W: Write> {
    sink: BufWriter<W>,
    lines: usize,
}

impl<W: Write> DiscrepancyReporter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: BufWriter::new(sink),
            lines: 0,
        }
    }

    pub fn report(&mut self, discrepancy: &Discrepancy) -> Result<()> {
        writeln!(self.sink, "{}", discrepancy)?;
        error!(guid = %discrepancy.guid, field = %discrepancy.field, "{}", discrepancy);
        self.lines += 1;
        Ok(())
    }

    /// Lines written so far
    pub fn lines(&self) -> usize {
        self.lines
    }

    /// Flush and hand back the sink
    pub fn finish(self) -> Result<W> {
        let sink = self.sink.into_inner().map_err(|e| e.into_error())?;
        Ok(sink)
    }
}

/// Run-scoped scratch file that is appended to the output log on commit
///
/// Dropping without commit discards the scratch directory and leaves the
/// output log untouched.
pub struct ScratchLog {
    dir: TempDir,
    output: PathBuf,
}

impl ScratchLog {
    const FILE_NAME: &'static str = "discrepancies.log";

    /// Create the scratch directory next to `output` so the final append
    /// stays on one filesystem
    pub fn create(output: impl AsRef<Path>) -> Result<Self> {
        let output = output.as_ref().to_path_buf();
        let parent = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let dir = tempfile::Builder::new()
            .prefix(".dcl-verify-")
            .tempdir_in(parent)?;
        debug!(scratch = %dir.path().display(), "Created verification scratch directory");
        Ok(Self { dir, output })
    }

    /// Path of the scratch file
    pub fn path(&self) -> PathBuf {
        self.dir.path().join(Self::FILE_NAME)
    }

    /// Open the scratch file for writing
    pub fn file(&self) -> Result<File> {
        Ok(File::create(self.path())?)
    }

    /// Append the scratch contents to the output log and remove the scratch
    /// directory
    pub fn commit(self) -> Result<PathBuf> {
        let mut output = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.output)?;

        let scratch = self.path();
        if scratch.exists() {
            let mut input = File::open(&scratch)?;
            std::io::copy(&mut input, &mut output)?;
        }
        output.flush()?;

        self.dir.close()?;
        Ok(self.output)
    }
}
