//! CSV table loading.
//!
//! Produces a [`Table`] — a header row plus data rows of strings — from a
//! CSV file. Handles a UTF-8 byte-order mark, trims every cell, and tolerates
//! rows of unequal length. Delimiter detection is best-effort: the first line
//! is scanned for the most frequent candidate delimiter, falling back to a
//! comma when nothing is found.

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use thiserror::Error;

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";
const CANDIDATE_DELIMITERS: &[u8] = b",;\t";

/// Error loading a table from disk. Load errors abort the load; no partial
/// table is kept.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed row {row}: {source}")]
    Malformed {
        row: usize,
        #[source]
        source: csv::Error,
    },
    #[error("table has no header row")]
    Empty,
}

/// A parsed table: one immutable header row plus zero or more data rows.
///
/// Data rows may be shorter than the header row; downstream validation
/// handles that case. A new load replaces the table wholesale.
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Load a table from a CSV file.
    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let bytes = fs::read(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes.as_slice());
        let text = String::from_utf8_lossy(bytes);

        let delimiter = detect_delimiter(&text);
        log::debug!("using delimiter {:?}", delimiter as char);

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(Trim::All)
            .flexible(true)
            .has_headers(false)
            .from_reader(text.as_bytes());

        let mut records = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|source| LoadError::Malformed {
                row: index + 1,
                source,
            })?;
            records.push(record.iter().map(str::to_string).collect());
        }

        Self::from_records(records)
    }

    /// Build a table from already-parsed records; the first record is the
    /// header row.
    pub fn from_records(mut records: Vec<Vec<String>>) -> Result<Self, LoadError> {
        if records.is_empty() {
            return Err(LoadError::Empty);
        }
        let headers = records.remove(0);
        Ok(Self {
            headers,
            rows: records,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows, in file order, excluding the header.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Pick the most frequent candidate delimiter in the first line; comma wins
/// ties and is the fallback when no candidate appears at all.
fn detect_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    let count = |d: u8| first_line.bytes().filter(|&b| b == d).count();

    let mut best = b',';
    let mut best_count = count(b',');
    for &d in CANDIDATE_DELIMITERS {
        if count(d) > best_count {
            best = d;
            best_count = count(d);
        }
    }
    if best_count == 0 { b',' } else { best }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_comma_separated() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "t.csv", b"Filename,Title\na.jpg,Sunset\n");

        let table = Table::from_path(&path).unwrap();
        assert_eq!(table.headers(), ["Filename", "Title"]);
        assert_eq!(table.rows(), [vec!["a.jpg".to_string(), "Sunset".to_string()]]);
    }

    #[test]
    fn strips_utf8_bom() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "t.csv", b"\xef\xbb\xbfFilename,Title\na.jpg,x\n");

        let table = Table::from_path(&path).unwrap();
        assert_eq!(table.headers()[0], "Filename");
    }

    #[test]
    fn detects_semicolon_delimiter() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "t.csv", b"Filename;Title\na.jpg;Sunset\n");

        let table = Table::from_path(&path).unwrap();
        assert_eq!(table.headers(), ["Filename", "Title"]);
    }

    #[test]
    fn falls_back_to_comma_for_single_column() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "t.csv", b"Filename\na.jpg\n");

        let table = Table::from_path(&path).unwrap();
        assert_eq!(table.headers(), ["Filename"]);
        assert_eq!(table.rows().len(), 1);
    }

    #[test]
    fn trims_cells() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "t.csv", b"  Filename , Title \n  a.jpg ,  Sunset \n");

        let table = Table::from_path(&path).unwrap();
        assert_eq!(table.headers(), ["Filename", "Title"]);
        assert_eq!(table.rows()[0], ["a.jpg", "Sunset"]);
    }

    #[test]
    fn keeps_ragged_rows() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "t.csv", b"Filename,Title,Keywords\na.jpg\nb.jpg,B,kw\n");

        let table = Table::from_path(&path).unwrap();
        assert_eq!(table.rows()[0], ["a.jpg"]);
        assert_eq!(table.rows()[1], ["b.jpg", "B", "kw"]);
    }

    #[test]
    fn empty_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "t.csv", b"");

        assert!(matches!(Table::from_path(&path), Err(LoadError::Empty)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = Table::from_path(Path::new("/nonexistent/t.csv"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
    }

    #[test]
    fn from_records_splits_header() {
        let table = Table::from_records(vec![
            vec!["Filename".to_string()],
            vec!["a.jpg".to_string()],
        ])
        .unwrap();
        assert_eq!(table.headers(), ["Filename"]);
        assert_eq!(table.rows().len(), 1);
    }
}
