//! Workspace discovery.
//!
//! Walks a directory tree and sorts every file into the input kinds the
//! pipeline knows about. Nothing is opened here.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::IngestError;

/// Path fragments that mark a vector layer as water features.
const WATER_MARKERS: &[&str] = &["water", "gew"];

/// Candidate input files found under a workspace root, each list in walk
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkspaceScan {
    /// The scanned directory. Water markers are matched below it only.
    pub root: PathBuf,
    /// `.shp` files.
    pub shapefiles: Vec<PathBuf>,
    /// `.gpkg` files.
    pub geopackages: Vec<PathBuf>,
    /// `.geojson` and `.json` files.
    pub geojson: Vec<PathBuf>,
    /// `.pdf` files.
    pub pdfs: Vec<PathBuf>,
}

impl WorkspaceScan {
    /// All vector layers: shapefiles, then `GeoJSON`, then geopackages.
    #[must_use]
    pub fn vector_candidates(&self) -> Vec<&Path> {
        self.shapefiles
            .iter()
            .chain(&self.geojson)
            .chain(&self.geopackages)
            .map(PathBuf::as_path)
            .collect()
    }

    /// Vector layers whose path names them as water features.
    #[must_use]
    pub fn water_candidates(&self) -> Vec<&Path> {
        self.vector_candidates()
            .into_iter()
            .filter(|p| self.is_water(p))
            .collect()
    }

    /// Vector layers not named as water features.
    #[must_use]
    pub fn field_candidates(&self) -> Vec<&Path> {
        self.vector_candidates()
            .into_iter()
            .filter(|p| !self.is_water(p))
            .collect()
    }

    fn is_water(&self, path: &Path) -> bool {
        is_water_path(path.strip_prefix(&self.root).unwrap_or(path))
    }

    /// Total number of classified files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapefiles.len() + self.geopackages.len() + self.geojson.len() + self.pdfs.len()
    }

    /// Whether nothing was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_water_path(path: &Path) -> bool {
    let lower = path.to_string_lossy().to_lowercase();
    WATER_MARKERS.iter().any(|m| lower.contains(m))
}

/// Recursively scans `root`, skipping the directories in `skip_dirs`
/// (typically the output directory, so earlier results are never read
/// back as inputs).
///
/// Entries are visited sorted by file name, so the result is
/// deterministic. Unreadable entries are logged and skipped.
///
/// # Errors
///
/// Returns [`IngestError::NotADirectory`] if `root` is not a directory.
pub fn scan_workspace(root: &Path, skip_dirs: &[PathBuf]) -> Result<WorkspaceScan, IngestError> {
    if !root.is_dir() {
        return Err(IngestError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let skip = skip_dirs
        .iter()
        .filter_map(|d| d.canonicalize().ok())
        .collect::<Vec<_>>();

    let mut scan = WorkspaceScan {
        root: root.to_path_buf(),
        ..WorkspaceScan::default()
    };

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !entry.file_type().is_dir()
                || !entry
                    .path()
                    .canonicalize()
                    .is_ok_and(|p| skip.contains(&p))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(ext) = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
        else {
            continue;
        };
        let path = entry.into_path();
        match ext.as_str() {
            "shp" => scan.shapefiles.push(path),
            "gpkg" => scan.geopackages.push(path),
            "geojson" | "json" => scan.geojson.push(path),
            "pdf" => scan.pdfs.push(path),
            _ => {}
        }
    }

    log::info!(
        "Scanned {}: {} shapefiles, {} geopackages, {} GeoJSON, {} PDFs",
        root.display(),
        scan.shapefiles.len(),
        scan.geopackages.len(),
        scan.geojson.len(),
        scan.pdfs.len()
    );

    Ok(scan)
}
