//! Column-to-field resolution.
//!
//! Each logical field (filename, title, description, keywords) is matched
//! against the table's header row by scanning a priority-ordered list of
//! candidate names, comparing normalized forms. Explicit selections made by
//! the caller always win and are never re-resolved.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonicalize header text for matching: trim, collapse whitespace runs to
/// a single space, lowercase. Total — never fails.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// The four logical fields a table column can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Filename,
    Title,
    Description,
    Keywords,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Filename,
        Field::Title,
        Field::Description,
        Field::Keywords,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Filename => "Filename",
            Field::Title => "Title",
            Field::Description => "Description",
            Field::Keywords => "Keywords",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One field's column selection.
///
/// `Unset` means nobody has decided yet and processing refuses to start;
/// `Skip` is an explicit decision to leave the field untouched on every
/// file. The distinction keeps a silently-unresolved field from being
/// mistaken for an intentional omission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnChoice {
    #[default]
    Unset,
    Skip,
    Column(usize),
}

/// Candidate header names per field, in priority order. Carried in the
/// config so the lists can be extended without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnCandidates {
    pub filename: Vec<String>,
    pub title: Vec<String>,
    pub description: Vec<String>,
    pub keywords: Vec<String>,
}

impl Default for ColumnCandidates {
    fn default() -> Self {
        let list = |names: &[&str]| names.iter().map(|n| n.to_string()).collect();
        Self {
            filename: list(&["filename", "file name", "file", "image", "image name"]),
            title: list(&["title", "object name", "name"]),
            description: list(&["description", "caption", "caption/abstract"]),
            keywords: list(&["keywords", "tags", "tag"]),
        }
    }
}

impl ColumnCandidates {
    fn for_field(&self, field: Field) -> &[String] {
        match field {
            Field::Filename => &self.filename,
            Field::Title => &self.title,
            Field::Description => &self.description,
            Field::Keywords => &self.keywords,
        }
    }
}

/// Column mapping error — the run must not start until it is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("no column selected for {}", .0.iter().map(|f| f.label()).collect::<Vec<_>>().join(", "))]
    Unset(Vec<Field>),
    #[error("the Filename field requires a column")]
    FilenameRequired,
    #[error("{field} column index {index} is out of bounds ({width} columns)")]
    OutOfBounds {
        field: Field,
        index: usize,
        width: usize,
    },
}

/// The association between logical fields and column indices. Fields start
/// [`ColumnChoice::Unset`]; processing refuses to start until every field
/// has been decided (see [`ColumnMapping::require_complete`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    pub filename: ColumnChoice,
    pub title: ColumnChoice,
    pub description: ColumnChoice,
    pub keywords: ColumnChoice,
}

impl ColumnMapping {
    pub fn get(&self, field: Field) -> ColumnChoice {
        match field {
            Field::Filename => self.filename,
            Field::Title => self.title,
            Field::Description => self.description,
            Field::Keywords => self.keywords,
        }
    }

    pub fn set(&mut self, field: Field, choice: ColumnChoice) {
        match field {
            Field::Filename => self.filename = choice,
            Field::Title => self.title = choice,
            Field::Description => self.description = choice,
            Field::Keywords => self.keywords = choice,
        }
    }

    /// Fill every still-unset field with a best-effort default: the first
    /// header whose normalized form equals a candidate name, scanned in
    /// candidate priority order. When nothing matches and the header row is
    /// non-empty, the field falls back to column 0. Fields the caller has
    /// already decided are left alone. Deterministic for a given header row
    /// and candidate order.
    pub fn resolve(&mut self, headers: &[String], candidates: &ColumnCandidates) {
        let normalized: Vec<String> = headers.iter().map(|h| normalize(h)).collect();
        for field in Field::ALL {
            if self.get(field) != ColumnChoice::Unset {
                continue;
            }
            let matched = candidates.for_field(field).iter().find_map(|candidate| {
                let candidate = normalize(candidate);
                normalized.iter().position(|h| *h == candidate)
            });
            match matched {
                Some(index) => self.set(field, ColumnChoice::Column(index)),
                None if !headers.is_empty() => {
                    log::debug!("no header matched for {field}, defaulting to column 0");
                    self.set(field, ColumnChoice::Column(0));
                }
                None => {}
            }
        }
    }

    pub fn missing_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|f| self.get(*f) == ColumnChoice::Unset)
            .collect()
    }

    /// Check that every field has been decided, the filename has a column,
    /// and all column indices are within the header width. Produces the
    /// index set a batch run works from.
    pub fn require_complete(&self, width: usize) -> Result<ResolvedColumns, MappingError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(MappingError::Unset(missing));
        }

        for field in Field::ALL {
            if let ColumnChoice::Column(index) = self.get(field) {
                if index >= width {
                    return Err(MappingError::OutOfBounds {
                        field,
                        index,
                        width,
                    });
                }
            }
        }

        let ColumnChoice::Column(filename) = self.filename else {
            return Err(MappingError::FilenameRequired);
        };
        let content = |choice: ColumnChoice| match choice {
            ColumnChoice::Column(index) => Some(index),
            _ => None,
        };
        Ok(ResolvedColumns {
            filename,
            title: content(self.title),
            description: content(self.description),
            keywords: content(self.keywords),
        })
    }
}

/// A complete column mapping: the filename column plus the content columns
/// that were not explicitly skipped, all in bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub filename: usize,
    pub title: Option<usize>,
    pub description: Option<usize>,
    pub keywords: Option<usize>,
}

impl ResolvedColumns {
    /// Highest mapped index — a row must be longer than this to be usable.
    pub fn max_index(&self) -> usize {
        self.filename
            .max(self.title.unwrap_or(0))
            .max(self.description.unwrap_or(0))
            .max(self.keywords.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    // ── normalize ────────────────────────────────────────────────────

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Filename  "), "filename");
        assert_eq!(normalize("FILE NAME"), "file name");
    }

    #[test]
    fn normalize_collapses_whitespace_runs() {
        assert_eq!(normalize("file \t  name"), "file name");
        assert_eq!(normalize(""), "");
    }

    // ── resolve ──────────────────────────────────────────────────────

    #[test]
    fn resolve_matches_case_insensitively() {
        let mut mapping = ColumnMapping::default();
        mapping.resolve(
            &headers(&["  FILENAME ", "Title", "Description", "Keywords"]),
            &ColumnCandidates::default(),
        );
        assert_eq!(mapping.filename, ColumnChoice::Column(0));
        assert_eq!(mapping.title, ColumnChoice::Column(1));
        assert_eq!(mapping.description, ColumnChoice::Column(2));
        assert_eq!(mapping.keywords, ColumnChoice::Column(3));
    }

    #[test]
    fn resolve_honors_candidate_priority() {
        // "name" and "title" both appear; "title" is the higher-priority
        // candidate and must win.
        let mut mapping = ColumnMapping::default();
        mapping.resolve(
            &headers(&["Name", "Title", "File", "Tags"]),
            &ColumnCandidates::default(),
        );
        assert_eq!(mapping.title, ColumnChoice::Column(1));
        assert_eq!(mapping.filename, ColumnChoice::Column(2));
        assert_eq!(mapping.keywords, ColumnChoice::Column(3));
    }

    #[test]
    fn resolve_falls_back_to_first_column() {
        let mut mapping = ColumnMapping::default();
        mapping.resolve(&headers(&["Col A", "Col B"]), &ColumnCandidates::default());
        assert_eq!(mapping.filename, ColumnChoice::Column(0));
        assert_eq!(mapping.title, ColumnChoice::Column(0));
    }

    #[test]
    fn resolve_leaves_fields_unset_on_empty_headers() {
        let mut mapping = ColumnMapping::default();
        mapping.resolve(&[], &ColumnCandidates::default());
        assert_eq!(mapping.missing_fields(), Field::ALL.to_vec());
    }

    #[test]
    fn resolve_keeps_explicit_selections() {
        let mut mapping = ColumnMapping::default();
        mapping.set(Field::Title, ColumnChoice::Column(3));
        mapping.set(Field::Description, ColumnChoice::Skip);
        mapping.resolve(
            &headers(&["Filename", "Title", "Description", "Keywords"]),
            &ColumnCandidates::default(),
        );
        // Explicit choices win over the matching headers at indices 1 and 2.
        assert_eq!(mapping.title, ColumnChoice::Column(3));
        assert_eq!(mapping.description, ColumnChoice::Skip);
        assert_eq!(mapping.filename, ColumnChoice::Column(0));
    }

    #[test]
    fn resolve_is_deterministic() {
        let hs = headers(&["image", "file", "tag", "tags"]);
        let mut a = ColumnMapping::default();
        let mut b = ColumnMapping::default();
        a.resolve(&hs, &ColumnCandidates::default());
        b.resolve(&hs, &ColumnCandidates::default());
        assert_eq!(a, b);
        // "file" outranks "image" in the candidate list.
        assert_eq!(a.filename, ColumnChoice::Column(1));
        // "keywords" is absent; "tags" outranks "tag".
        assert_eq!(a.keywords, ColumnChoice::Column(3));
    }

    // ── require_complete ─────────────────────────────────────────────

    #[test]
    fn require_complete_reports_missing_fields() {
        let mapping = ColumnMapping {
            filename: ColumnChoice::Column(0),
            ..Default::default()
        };
        let err = mapping.require_complete(4).unwrap_err();
        assert_eq!(
            err,
            MappingError::Unset(vec![Field::Title, Field::Description, Field::Keywords])
        );
    }

    #[test]
    fn require_complete_checks_bounds() {
        let mapping = ColumnMapping {
            filename: ColumnChoice::Column(0),
            title: ColumnChoice::Column(1),
            description: ColumnChoice::Column(2),
            keywords: ColumnChoice::Column(5),
        };
        let err = mapping.require_complete(3).unwrap_err();
        assert_eq!(
            err,
            MappingError::OutOfBounds {
                field: Field::Keywords,
                index: 5,
                width: 3
            }
        );
    }

    #[test]
    fn require_complete_rejects_skipped_filename() {
        let mapping = ColumnMapping {
            filename: ColumnChoice::Skip,
            title: ColumnChoice::Column(0),
            description: ColumnChoice::Column(0),
            keywords: ColumnChoice::Column(0),
        };
        assert_eq!(
            mapping.require_complete(1).unwrap_err(),
            MappingError::FilenameRequired
        );
    }

    #[test]
    fn require_complete_passes_skipped_content_fields_through() {
        let mapping = ColumnMapping {
            filename: ColumnChoice::Column(0),
            title: ColumnChoice::Column(1),
            description: ColumnChoice::Skip,
            keywords: ColumnChoice::Column(2),
        };
        let columns = mapping.require_complete(3).unwrap();
        assert_eq!(columns.description, None);
        assert_eq!(columns.max_index(), 2);
    }
}
