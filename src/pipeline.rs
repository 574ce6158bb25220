//! Line pipeline: one JSON record per input line in, one `<event_id> <model_id>` line out.
//!
//! The run stops at the first line that fails. Everything written before that point
//! stays in the output, and the output is flushed whether the run succeeds or aborts.

use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::config::{Diagnostics, IndexerConfig};
use crate::extractor::PairingMode;
use crate::error::{IndexError, ScanError};
use crate::extractor::extract_ids;
use crate::scanner::{JsonScanner, ScanOutcome};

/// Output path for `input`: the suffix is appended to the full path, extension included.
pub fn output_path_for(input: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = input.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Counters for one pass over a reader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub lines_written: usize,
    /// Lines whose scan was cut short by the extractor before the end of the record.
    pub early_stops: usize,
}

/// Result of indexing a file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub pairing: PairingMode,
    pub diagnostics: Diagnostics,
    #[serde(flatten)]
    pub summary: IndexSummary,
}

/// Drives the scanner over a line-delimited input. The scanner and line buffer are
/// reused from line to line; everything else is rebuilt per record.
#[derive(Debug)]
pub struct IdIndexer {
    config: IndexerConfig,
    scanner: JsonScanner,
    line: Vec<u8>,
}

impl IdIndexer {
    pub fn new(config: IndexerConfig) -> Self {
        Self { config, scanner: JsonScanner::new(), line: Vec::new() }
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Index every line of `reader` into `writer`, stopping at the first failing line.
    ///
    /// `writer` is not flushed here; callers owning a buffered sink flush it on both
    /// the success and the error path.
    #[instrument(target = "log_ids::pipeline", skip_all)]
    pub fn index<R: BufRead, W: Write>(&mut self, mut reader: R, writer: &mut W) -> Result<IndexSummary, IndexError> {
        let mut summary = IndexSummary::default();
        let mut line_number = 0usize;

        loop {
            line_number += 1;
            self.line.clear();
            let read = reader
                .read_until(b'\n', &mut self.line)
                .map_err(|source| IndexError::Read { line: line_number, source })?;
            if read == 0 {
                break;
            }
            let record = self.line.strip_suffix(b"\n").unwrap_or(&self.line[..]);

            let (ids, outcome) = match extract_ids(&mut self.scanner, record, &self.config.keys, self.config.pairing) {
                Ok(found) => found,
                Err(source) => {
                    error!(target = "log_ids::pipeline", line = line_number, error = %source, "malformed record");
                    return Err(line_failure(self.config.diagnostics, line_number, source));
                }
            };

            if !ids.has_event_id() {
                error!(target = "log_ids::pipeline", line = line_number, "record has no event id");
                return Err(IndexError::MissingEventId { line: line_number });
            }
            if outcome == ScanOutcome::Stopped {
                summary.early_stops += 1;
            }

            ids.write_to(writer)
                .map_err(|source| IndexError::Write { line: line_number, source })?;
            summary.lines_written += 1;
            trace!(target = "log_ids::pipeline", line = line_number, stopped_early = outcome == ScanOutcome::Stopped, "record indexed");
        }

        debug!(target = "log_ids::pipeline", lines = summary.lines_written, early_stops = summary.early_stops, "input exhausted");
        Ok(summary)
    }

    /// Index `input` into `<input><suffix>`. The output is created (or truncated) as soon
    /// as the input has been opened, before any line is read.
    #[instrument(target = "log_ids::pipeline", skip_all, fields(input = %input.display()))]
    pub fn index_file(&mut self, input: &Path) -> Result<RunReport, IndexError> {
        let source = File::open(input).map_err(|source| IndexError::OpenInput { path: input.to_path_buf(), source })?;
        let output = output_path_for(input, &self.config.output_suffix);
        let sink = File::create(&output).map_err(|source| IndexError::CreateOutput { path: output.clone(), source })?;
        debug!(target = "log_ids::pipeline", output = %output.display(), "output created");

        let summary = self.index_and_flush(BufReader::new(source), BufWriter::new(sink), &output)?;

        info!(target = "log_ids::pipeline", output = %output.display(), lines = summary.lines_written, "index written");
        Ok(RunReport {
            input: input.to_path_buf(),
            output,
            pairing: self.config.pairing,
            diagnostics: self.config.diagnostics,
            summary,
        })
    }

    /// [`IdIndexer::index`] followed by a flush of `writer`, attempted on the abort path
    /// too. A line failure takes precedence over a flush failure; `output` only names
    /// the sink in a flush error.
    pub fn index_and_flush<R: BufRead, W: Write>(
        &mut self,
        reader: R,
        mut writer: W,
        output: &Path,
    ) -> Result<IndexSummary, IndexError> {
        let result = self.index(reader, &mut writer);
        let flushed = writer.flush();

        let summary = match result {
            Ok(summary) => summary,
            Err(err) => {
                if let Err(flush_err) = flushed {
                    warn!(target = "log_ids::pipeline", error = %flush_err, "failed to flush partial output");
                }
                return Err(err);
            }
        };
        flushed.map_err(|source| IndexError::Flush { path: output.to_path_buf(), source })?;
        Ok(summary)
    }
}

fn line_failure(diagnostics: Diagnostics, line: usize, source: ScanError) -> IndexError {
    match diagnostics {
        Diagnostics::Collapsed => IndexError::MissingEventId { line },
        Diagnostics::Detailed => IndexError::MalformedLine { line, source },
    }
}
