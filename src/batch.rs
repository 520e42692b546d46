//! Batch processing: row validation and the sequential write loop.
//!
//! Rows are processed strictly in table order, one at a time; a skip or a
//! writer failure never aborts the batch. Row numbers in log lines count the
//! header as row 1, matching what an operator sees in a spreadsheet.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::mapping::{ColumnMapping, MappingError, ResolvedColumns};
use crate::metadata::{MetadataPayload, MetadataWriter, WriteError};
use crate::table::Table;

/// Extensions the batch will write to.
const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// Why a row was skipped before reaching the writer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("not enough columns")]
    InsufficientColumns,
    #[error("empty filename")]
    EmptyFilename,
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("not a JPG: {0}")]
    NotAJpeg(String),
}

/// Per-row classification, produced exactly once per data row, in row order.
#[derive(Debug)]
pub enum RowOutcome {
    Processed,
    Skipped(SkipReason),
    Failed(WriteError),
}

/// Immutable inputs for one batch run. Replaces ad-hoc shared state between
/// the load and run phases.
#[derive(Debug, Clone, Copy)]
pub struct BatchRequest<'a> {
    pub table: &'a Table,
    pub mapping: &'a ColumnMapping,
    pub folder: &'a Path,
}

/// Aggregated result of one batch run. Validation skips and write failures
/// share the error tally; the log keeps them distinct.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub processed: usize,
    pub errors: usize,
    pub outcomes: Vec<RowOutcome>,
    pub log: Vec<String>,
}

/// A data row that passed validation, ready for the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRow {
    pub path: PathBuf,
    pub filename: String,
    pub title: String,
    pub description: String,
    pub keywords: String,
}

/// Validate one data row against the mapping and the folder.
///
/// Checks run in a fixed order — column count, filename, file existence,
/// extension — and the first failure decides the reported reason.
pub fn validate_row(
    row: &[String],
    columns: &ResolvedColumns,
    folder: &Path,
) -> Result<ValidRow, SkipReason> {
    if row.len() <= columns.max_index() {
        return Err(SkipReason::InsufficientColumns);
    }

    let filename = row[columns.filename]
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    if filename.is_empty() {
        return Err(SkipReason::EmptyFilename);
    }

    let path = folder.join(&filename);
    if !path.is_file() {
        return Err(SkipReason::FileNotFound(filename));
    }
    if !has_accepted_extension(&path) {
        return Err(SkipReason::NotAJpeg(filename));
    }

    // Content cells are optional: a skipped field or an index past the
    // row's end degrades to an empty string instead of failing the row.
    let cell = |index: Option<usize>| {
        index
            .and_then(|i| row.get(i))
            .map(|c| c.trim().to_string())
            .unwrap_or_default()
    };
    Ok(ValidRow {
        path,
        filename,
        title: cell(columns.title),
        description: cell(columns.description),
        keywords: cell(columns.keywords),
    })
}

fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ACCEPTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn warning_line(reason: &SkipReason, row_number: usize) -> String {
    match reason {
        SkipReason::InsufficientColumns => {
            format!("Warning: Row {row_number} doesn't have enough columns, skipping")
        }
        SkipReason::EmptyFilename => {
            format!("Warning: Row {row_number} has empty filename, skipping")
        }
        SkipReason::FileNotFound(filename) => {
            format!("Warning: File not found: {filename} (row {row_number}), skipping")
        }
        SkipReason::NotAJpeg(filename) => {
            format!("Warning: Not a JPG: {filename} (row {row_number}), skipping")
        }
    }
}

/// Run the batch: validate every data row and write metadata for the valid
/// ones, strictly in order, collecting one outcome and one log line per row
/// plus a final summary line.
///
/// Returns a [`MappingError`] — before any row is touched — when the mapping
/// is incomplete or out of bounds.
pub fn run(
    request: &BatchRequest<'_>,
    writer: &dyn MetadataWriter,
) -> Result<BatchResult, MappingError> {
    let columns = request
        .mapping
        .require_complete(request.table.headers().len())?;

    let mut result = BatchResult::default();
    log::info!(
        "Writing {} metadata for {} row(s)",
        writer.name(),
        request.table.rows().len()
    );

    for (index, row) in request.table.rows().iter().enumerate() {
        // Header is row 1 in user-facing numbering.
        let row_number = index + 2;

        match validate_row(row, &columns, request.folder) {
            Err(reason) => {
                let line = warning_line(&reason, row_number);
                log::warn!("{line}");
                result.log.push(line);
                result.errors += 1;
                result.outcomes.push(RowOutcome::Skipped(reason));
            }
            Ok(valid) => {
                let payload =
                    MetadataPayload::from_cells(&valid.title, &valid.description, &valid.keywords);
                match writer.write(&valid.path, &payload) {
                    Ok(()) => {
                        let line = format!("OK: {}", valid.filename);
                        log::info!("{line}");
                        result.log.push(line);
                        result.processed += 1;
                        result.outcomes.push(RowOutcome::Processed);
                    }
                    Err(err) => {
                        let line = format!("Error processing {}: {err}", valid.filename);
                        log::warn!("{line}");
                        result.log.push(line);
                        result.errors += 1;
                        result.outcomes.push(RowOutcome::Failed(err));
                    }
                }
            }
        }
    }

    let summary = format!(
        "Processing complete. {} files processed, {} errors.",
        result.processed, result.errors
    );
    log::info!("{summary}");
    result.log.push(summary);
    Ok(result)
}
