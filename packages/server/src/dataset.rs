//! Swappable handle on the loaded field index.
//!
//! Requests take an [`Arc`] snapshot and query it without holding the
//! lock. A reload builds a complete new index first and only then swaps
//! it in, so in-flight queries finish against the snapshot they started
//! with and a failed reload leaves the served index untouched.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use nitrogen_map_ingest::read_fields_geojson;
use nitrogen_map_spatial::FieldIndex;

use crate::ServerError;

/// The dataset file and the index currently being served.
pub struct DatasetHandle {
    path: PathBuf,
    current: RwLock<Arc<FieldIndex>>,
}

fn build_index(path: &Path) -> Result<FieldIndex, ServerError> {
    let fields = read_fields_geojson(path)?;
    Ok(FieldIndex::build(fields))
}

impl DatasetHandle {
    /// Loads the dataset at `path` and indexes it.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Dataset`] if the file cannot be read or
    /// decoded.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ServerError> {
        let path = path.into();
        let index = build_index(&path)?;
        Ok(Self::from_index(path, index))
    }

    /// Wraps an already built index; `path` is used by [`Self::reload`].
    #[must_use]
    pub fn from_index(path: impl Into<PathBuf>, index: FieldIndex) -> Self {
        Self {
            path: path.into(),
            current: RwLock::new(Arc::new(index)),
        }
    }

    /// The dataset file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The index currently being served.
    #[must_use]
    pub fn snapshot(&self) -> Arc<FieldIndex> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rebuilds the index from the dataset file and swaps it in.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Dataset`] if the file cannot be read; the
    /// previous index keeps being served.
    pub fn reload(&self) -> Result<Arc<FieldIndex>, ServerError> {
        let index = Arc::new(build_index(&self.path)?);
        *self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::clone(&index);
        log::info!(
            "Reloaded {} fields from {}",
            index.len(),
            self.path.display()
        );
        Ok(index)
    }
}
