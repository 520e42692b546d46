//! Embedded-metadata writing.
//!
//! This module provides the [`MetadataWriter`] capability with two
//! implementations, selected by [`MetadataStandard`]:
//!
//! - [`IptcWriter`] — IPTC-IIM records in the JPEG APP13 (Photoshop 3.0) segment
//! - [`ExifWriter`] — EXIF tags in the JPEG APP1 segment
//!
//! Both writers apply a [`MetadataPayload`] to a file in place: absent fields
//! leave the existing value untouched, a present keyword list replaces the
//! existing one, and the new segment is fully buffered before any byte of the
//! file is committed.

mod exif;
mod iptc;

pub use exif::ExifWriter;
pub use iptc::IptcWriter;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata destined for one image file, derived from one table row.
///
/// Blank source cells become `None` / empty, which the writers must leave
/// untouched on the target file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataPayload {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
}

impl MetadataPayload {
    /// Build a payload from the three raw content cells of a row.
    pub fn from_cells(title: &str, description: &str, keywords: &str) -> Self {
        Self {
            title: non_blank(title),
            description: non_blank(description),
            keywords: split_keywords(keywords),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.keywords.is_empty()
    }
}

fn non_blank(cell: &str) -> Option<String> {
    let cell = cell.trim();
    if cell.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}

/// Split a raw keyword cell into tokens: semicolons are normalized to commas
/// first, tokens are trimmed, empty tokens dropped. Order is preserved and
/// duplicates are passed through unchanged.
pub fn split_keywords(raw: &str) -> Vec<String> {
    raw.replace(';', ",")
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Error writing metadata to one file. The file is left either fully updated
/// or entirely unmodified.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}: {detail}", .path.display())]
    Malformed { path: PathBuf, detail: String },
    #[error("{}: {detail}", .path.display())]
    Encoding { path: PathBuf, detail: String },
}

impl WriteError {
    pub fn path(&self) -> &Path {
        match self {
            WriteError::Io { path, .. }
            | WriteError::Malformed { path, .. }
            | WriteError::Encoding { path, .. } => path,
        }
    }
}

/// Applies a payload to one image file in place.
///
/// One implementation per metadata standard; a batch run uses exactly one.
pub trait MetadataWriter {
    /// Short standard name, used in logs.
    fn name(&self) -> &'static str;

    fn write(&self, path: &Path, payload: &MetadataPayload) -> Result<(), WriteError>;
}

/// Which embedded-metadata standard a batch run writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataStandard {
    Iptc,
    Exif,
}

impl MetadataStandard {
    pub fn writer(self) -> Box<dyn MetadataWriter> {
        match self {
            MetadataStandard::Iptc => Box::new(IptcWriter),
            MetadataStandard::Exif => Box::new(ExifWriter),
        }
    }
}

impl fmt::Display for MetadataStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetadataStandard::Iptc => "iptc",
            MetadataStandard::Exif => "exif",
        })
    }
}

impl FromStr for MetadataStandard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "iptc" => Ok(MetadataStandard::Iptc),
            "exif" => Ok(MetadataStandard::Exif),
            other => Err(format!(
                "unknown metadata standard {other:?} (expected iptc or exif)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_on_commas_and_semicolons() {
        assert_eq!(
            split_keywords("red, blue;green"),
            vec!["red", "blue", "green"]
        );
    }

    #[test]
    fn split_drops_empty_tokens() {
        assert_eq!(split_keywords("a,, ,b;"), vec!["a", "b"]);
        assert!(split_keywords("").is_empty());
        assert!(split_keywords(" ; , ").is_empty());
    }

    #[test]
    fn split_keeps_order_and_duplicates() {
        assert_eq!(split_keywords("b,a,b"), vec!["b", "a", "b"]);
    }

    #[test]
    fn payload_from_blank_cells_is_empty() {
        let payload = MetadataPayload::from_cells("  ", "", " ");
        assert!(payload.is_empty());
        assert_eq!(payload.title, None);
        assert_eq!(payload.description, None);
    }

    #[test]
    fn payload_trims_cells() {
        let payload = MetadataPayload::from_cells(" Sunset ", " dusk ", "a, b");
        assert_eq!(payload.title.as_deref(), Some("Sunset"));
        assert_eq!(payload.description.as_deref(), Some("dusk"));
        assert_eq!(payload.keywords, vec!["a", "b"]);
    }

    #[test]
    fn standard_parses_from_str() {
        assert_eq!("iptc".parse(), Ok(MetadataStandard::Iptc));
        assert_eq!("EXIF".parse(), Ok(MetadataStandard::Exif));
        assert!("xmp".parse::<MetadataStandard>().is_err());
    }
}
