//! # tagsheet
//!
//! Batch-write IPTC or EXIF titles, descriptions, and keywords into JPEG
//! files, driven by a CSV table that maps filenames to metadata.
//!
//! ## Quick Start
//!
//! The full flow is: load the table, resolve the column mapping, pick a
//! writer, run the batch:
//!
//! ```rust,no_run
//! use tagsheet::batch::{self, BatchRequest};
//! use tagsheet::config::Config;
//! use tagsheet::mapping::ColumnMapping;
//! use tagsheet::table::Table;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!
//!     let table = Table::from_path(Path::new("photos.csv"))?;
//!
//!     // Best-effort defaults; override fields before the run if needed.
//!     let mut mapping = ColumnMapping::default();
//!     mapping.resolve(table.headers(), &config.columns);
//!
//!     let writer = config.standard.writer();
//!     let request = BatchRequest {
//!         table: &table,
//!         mapping: &mapping,
//!         folder: Path::new("./photos"),
//!     };
//!     let result = batch::run(&request, writer.as_ref())?;
//!
//!     for line in &result.log {
//!         println!("{line}");
//!     }
//!     println!("Processed: {} Errors: {}", result.processed, result.errors);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`table`] — CSV loading into a header row plus data rows
//! - [`mapping`] — header normalization and column-to-field resolution
//! - [`metadata`] — the writer capability with IPTC and EXIF implementations
//! - [`batch`] — row validation and the sequential batch processor
//! - [`config`] — configuration types and loading/saving

pub mod batch;
pub mod config;
pub mod mapping;
pub mod metadata;
pub mod table;
