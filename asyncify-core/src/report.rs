//! Conversion reports
//!
//! Global invariants enforced:
//! - Records are accumulated per file and never shared across files
//! - The report store is one YAML sequence, grown only by appending items
//! - Appends are serialized so parallel drivers cannot interleave items
//! - The store file is created by the first append, never by opening

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use swc_common::{BytePos, SourceMap, Span};

use crate::naming::FunctionKind;

/// Default location of the report store, relative to the working directory
pub const DEFAULT_REPORT_PATH: &str = "remove-promise-await.yaml";

/// A blocking call left untouched because its enclosing scope has no name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub start: String,
    pub end: String,
}

/// A function that received its first rewritten call site in this run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub start: String,
    pub end: String,
}

/// Report for one transformed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file_path: String,
    pub ignored_promise_awaits: Vec<SkipRecord>,
    pub converted_functions: Vec<ConversionRecord>,
}

/// Format a position as `line:column` (1-based line, 0-based column)
pub fn format_position(source_map: &SourceMap, pos: BytePos) -> String {
    let loc = source_map.lookup_char_pos(pos);
    format!("{}:{}", loc.line, loc.col.0)
}

/// Per-file accumulator for skip and conversion records
pub struct Recorder<'a> {
    source_map: &'a SourceMap,
    skips: Vec<SkipRecord>,
    conversions: Vec<ConversionRecord>,
}

impl<'a> Recorder<'a> {
    pub fn new(source_map: &'a SourceMap) -> Self {
        Recorder {
            source_map,
            skips: Vec::new(),
            conversions: Vec::new(),
        }
    }

    pub fn skip(&mut self, scope_span: Span) {
        self.skips.push(SkipRecord {
            start: format_position(self.source_map, scope_span.lo),
            end: format_position(self.source_map, scope_span.hi),
        });
    }

    pub fn convert(&mut self, name: &str, kind: FunctionKind, span: Span) {
        self.conversions.push(ConversionRecord {
            name: name.to_string(),
            kind: kind.as_str().to_string(),
            start: format_position(self.source_map, span.lo),
            end: format_position(self.source_map, span.hi),
        });
    }

    pub fn skip_count(&self) -> usize {
        self.skips.len()
    }

    pub fn conversion_count(&self) -> usize {
        self.conversions.len()
    }

    pub fn into_report(self, file_path: &str) -> FileReport {
        FileReport {
            file_path: file_path.to_string(),
            ignored_promise_awaits: self.skips,
            converted_functions: self.conversions,
        }
    }
}

/// Process-wide append-only sink for file reports
///
/// Opened once per batch run and closed at the end of it. `append` takes
/// `&self` so a parallel driver can share the store behind a reference.
/// Each append writes a one-item YAML sequence, so the file as a whole
/// always reads back as a single sequence of reports.
#[derive(Debug)]
pub struct ReportStore {
    path: PathBuf,
    writer: Mutex<Option<BufWriter<File>>>,
}

impl ReportStore {
    /// Prepare the store; the file is created on first append
    pub fn open(path: &Path) -> Result<Self> {
        if path.is_dir() {
            anyhow::bail!("report store is a directory: {}", path.display());
        }

        Ok(ReportStore {
            path: path.to_path_buf(),
            writer: Mutex::new(None),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create(&self) -> Result<BufWriter<File>> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open report store: {}", self.path.display()))?;
        Ok(BufWriter::new(file))
    }

    /// Serialize and append one report as a single sequence item
    pub fn append(&self, report: &FileReport) -> Result<()> {
        let item = serde_yaml::to_string(std::slice::from_ref(report)).context("failed to serialize file report")?;

        let mut guard = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("report store lock poisoned: {}", self.path.display()))?;
        let writer = match guard.take() {
            Some(writer) => writer,
            None => self.create()?,
        };
        let writer = guard.insert(writer);
        writer
            .write_all(item.as_bytes())
            .and_then(|_| writer.flush())
            .with_context(|| format!("failed to append to report store: {}", self.path.display()))?;

        Ok(())
    }

    /// Flush and sync the store at the end of a run
    pub fn close(self) -> Result<()> {
        let path = self.path;
        let writer = self
            .writer
            .into_inner()
            .map_err(|_| anyhow::anyhow!("report store lock poisoned: {}", path.display()))?;
        let Some(writer) = writer else {
            return Ok(());
        };
        let file = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("failed to flush report store {}: {}", path.display(), e.error()))?;
        file.sync_all()
            .with_context(|| format!("failed to sync report store: {}", path.display()))?;
        Ok(())
    }
}

/// Read every report in a store, in append order
pub fn read_reports(path: &Path) -> Result<Vec<FileReport>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read report store: {}", path.display()))?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_yaml::from_str(&contents).with_context(|| format!("invalid report store: {}", path.display()))
}

#[cfg(test)]
#[path = "report/tests.rs"]
mod tests;
