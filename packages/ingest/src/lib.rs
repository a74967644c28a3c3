#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Input discovery and loading for the nitrogen map pipeline.
//!
//! * [`scan`] walks a workspace and classifies candidate input files.
//! * [`vector`] decodes field and water `GeoJSON` layers.
//! * [`pdf`] extracts nitrogen application figures from management
//!   documents.
//! * [`progress`] decouples long-running loaders from any progress
//!   rendering backend.

pub mod pdf;
pub mod progress;
pub mod scan;
pub mod vector;

use std::path::PathBuf;

use nitrogen_map_field_models::InvalidCrsError;
use thiserror::Error;

pub use pdf::{
    extract_records_from_pdf, extract_records_from_pdfs, extract_records_from_text,
    load_management_docs,
};
pub use progress::{NullProgress, ProgressCallback, null_progress};
pub use scan::{WorkspaceScan, scan_workspace};
pub use vector::{load_first_fields, load_first_waters, read_fields_geojson, read_waters_geojson};

/// Errors that can occur while reading inputs.
#[derive(Debug, Error)]
pub enum IngestError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A `GeoJSON` document could not be parsed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The document declares a CRS that cannot be interpreted.
    #[error("CRS error: {0}")]
    Crs(#[from] InvalidCrsError),

    /// The file extension has no decoder.
    #[error("Unsupported vector format: {}", path.display())]
    UnsupportedFormat {
        /// The skipped file.
        path: PathBuf,
    },

    /// The directory to scan does not exist.
    #[error("Not a directory: {}", path.display())]
    NotADirectory {
        /// The requested root.
        path: PathBuf,
    },

    /// PDF text extraction failed.
    #[error("PDF extraction error: {0}")]
    Pdf(String),

    /// A built-in pattern failed to compile.
    #[error("Invalid regex pattern: {0}")]
    Regex(#[from] regex::Error),
}
