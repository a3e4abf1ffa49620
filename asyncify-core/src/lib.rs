//! Asyncify core library - rewrites `Promise.await(expr)` into native `await`
//!
//! The transform works on one file at a time: parse, walk the tree once,
//! wrap every eligible blocking call in `await`, mark each enclosing
//! function `async`, and regenerate the text. A file with nothing to rewrite
//! comes back byte-for-byte unchanged.

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Transformation is strictly per-file
// - No global mutable state; records are scoped to one invocation
// - The only shared resource is the append-only report store
// - Running the transform on its own output changes nothing
// - Parse failures propagate to the caller

pub mod classify;
pub mod config;
pub mod naming;
pub mod parser;
pub mod propagate;
pub mod report;
pub mod rewrite;
pub mod splice;

pub use classify::CallPattern;
pub use config::{AsyncifyConfig, ResolvedConfig};
pub use report::{read_reports, FileReport, ReportStore, DEFAULT_REPORT_PATH};

use anyhow::Result;
use swc_common::{sync::Lrc, SourceMap};

/// Per-run transform settings
pub struct TransformOptions<'a> {
    pub pattern: CallPattern,
    /// Emit a report for files that only have skipped call sites
    pub report_skip_only_files: bool,
    /// Receives progress messages; falls back to the `log` facade when unset
    pub progress: Option<&'a (dyn Fn(&str) + Sync)>,
}

impl Default for TransformOptions<'_> {
    fn default() -> Self {
        TransformOptions {
            pattern: CallPattern::default(),
            report_skip_only_files: false,
            progress: None,
        }
    }
}

impl TransformOptions<'_> {
    /// Options taken from a resolved configuration
    pub fn from_config(config: &ResolvedConfig) -> Self {
        TransformOptions {
            pattern: config.pattern.clone(),
            report_skip_only_files: config.report_skip_only_files,
            progress: None,
        }
    }

    fn emit_progress(&self, message: &str) {
        match self.progress {
            Some(report) => report(message),
            None => log::info!("{}", message),
        }
    }
}

/// Result of transforming one file
#[derive(Debug, Clone)]
pub struct Transformed {
    /// Output text; equal to the input when `changed` is false
    pub code: String,
    pub changed: bool,
    /// Number of call sites wrapped in `await`
    pub rewritten_calls: usize,
    /// Report to append to the store, if this file produces one
    pub report: Option<FileReport>,
}

/// Result of transforming one file and appending its report
#[derive(Debug)]
pub struct Outcome {
    pub transformed: Transformed,
    /// Failure to append the report; the transformed text is still valid
    pub report_error: Option<anyhow::Error>,
}

/// Transform one file's source text
///
/// `path` labels the file in reports and selects the parser syntax by
/// extension. Returns an error if the source does not parse.
pub fn transform_source(path: &str, source: &str, options: &TransformOptions<'_>) -> Result<Transformed> {
    options.emit_progress(&format!("Processing file: {}", path));

    let cm: Lrc<SourceMap> = Default::default();
    let mut parsed = parser::parse_source(source, &cm, path)?;
    let outcome = rewrite::rewrite_module(&mut parsed, source, &cm, &options.pattern);

    let changed = outcome.rewritten > 0;
    let has_records = outcome.recorder.skip_count() > 0 || outcome.recorder.conversion_count() > 0;

    // Files without a rewrite report nothing unless asked to, even if they had skips
    let report = if changed || (options.report_skip_only_files && has_records) {
        Some(outcome.recorder.into_report(path))
    } else {
        None
    };

    let code = if changed {
        outcome.splice.apply(source)
    } else {
        source.to_string()
    };

    Ok(Transformed {
        code,
        changed,
        rewritten_calls: outcome.rewritten,
        report,
    })
}

/// Transform one file and append its report to `store`
///
/// A store failure does not discard the transformed text; it is returned in
/// `Outcome::report_error` for the caller to surface.
pub fn transform_and_record(
    path: &str,
    source: &str,
    options: &TransformOptions<'_>,
    store: &ReportStore,
) -> Result<Outcome> {
    let transformed = transform_source(path, source, options)?;
    let report_error = match &transformed.report {
        Some(report) => store.append(report).err(),
        None => None,
    };

    Ok(Outcome {
        transformed,
        report_error,
    })
}
