#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory spatial index over the analyzed field dataset.
//!
//! Field boundaries are bulk-loaded into an R-tree keyed by their bounding
//! boxes. A query first collects bounding-box candidates from the tree and
//! then confirms each one with an exact polygon intersection test, so a
//! candidate whose box overlaps but whose shape does not is never
//! returned.

pub mod query_geometry;

use geo::{BoundingRect, MultiPolygon, Rect};
use nitrogen_map_field_models::{Crs, Field, FieldCollection, InvalidGeometryError};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

pub use query_geometry::QueryGeometry;

/// Errors that can occur when validating a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The submitted geometry is not a valid polygon or multi-polygon.
    #[error("{0}")]
    InvalidGeometry(String),
}

impl From<InvalidGeometryError> for QueryError {
    fn from(e: InvalidGeometryError) -> Self {
        Self::InvalidGeometry(e.message)
    }
}

/// A field's position in the dataset stored in the R-tree.
struct IndexedField {
    position: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedField {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Result of a [`FieldIndex::query`].
#[derive(Debug)]
pub struct QueryOutcome<'a> {
    /// Fields whose boundary truly intersects the query, in dataset order.
    pub matches: Vec<&'a Field>,
    /// Number of bounding-box candidates examined.
    pub candidates: usize,
}

impl QueryOutcome<'_> {
    /// Whether no field intersects the query.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Read-only field dataset with an R-tree over field bounding boxes.
///
/// Built once at load time and shared across request handlers.
pub struct FieldIndex {
    crs: Crs,
    fields: Vec<Field>,
    tree: RTree<IndexedField>,
}

impl FieldIndex {
    /// Builds the index from an analyzed field collection.
    ///
    /// Fields with an empty geometry stay in the dataset but are never
    /// indexed, so no query can match them.
    #[must_use]
    pub fn build(collection: FieldCollection) -> Self {
        let FieldCollection { crs, fields } = collection;

        let entries = fields
            .iter()
            .enumerate()
            .filter_map(|(position, field)| {
                let Some(envelope) = compute_envelope(&field.geometry) else {
                    log::warn!("Field {} has an empty geometry; not indexed", field.id);
                    return None;
                };
                Some(IndexedField { position, envelope })
            })
            .collect::<Vec<_>>();

        let tree = RTree::bulk_load(entries);
        log::info!(
            "Indexed {} of {} fields ({crs})",
            tree.size(),
            fields.len()
        );

        Self { crs, fields, tree }
    }

    /// Number of fields in the dataset, indexed or not.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the dataset holds no fields.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields present in the R-tree.
    #[must_use]
    pub fn indexed_count(&self) -> usize {
        self.tree.size()
    }

    /// CRS of the stored field geometries.
    #[must_use]
    pub const fn crs(&self) -> Crs {
        self.crs
    }

    /// All fields in dataset order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Returns every field whose boundary intersects `geometry`.
    ///
    /// The query is interpreted in the dataset CRS. Each matching field is
    /// returned once, in dataset order.
    #[must_use]
    pub fn query(&self, geometry: &QueryGeometry) -> QueryOutcome<'_> {
        let Some(rect) = geometry.bounding_rect() else {
            return QueryOutcome {
                matches: Vec::new(),
                candidates: 0,
            };
        };

        let candidates = self
            .tree
            .locate_in_envelope_intersecting(&rect_to_aabb(rect))
            .map(|entry| entry.position)
            .collect::<Vec<_>>();

        let mut positions = candidates
            .iter()
            .copied()
            .filter(|&position| geometry.intersects(&self.fields[position].geometry))
            .collect::<Vec<_>>();
        positions.sort_unstable();
        positions.dedup();

        log::debug!(
            "Query matched {} of {} candidates",
            positions.len(),
            candidates.len()
        );

        QueryOutcome {
            matches: positions.into_iter().map(|p| &self.fields[p]).collect(),
            candidates: candidates.len(),
        }
    }
}

impl std::fmt::Debug for FieldIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldIndex")
            .field("crs", &self.crs)
            .field("fields", &self.fields.len())
            .field("indexed", &self.tree.size())
            .finish()
    }
}

/// Computes the bounding-box envelope for a multi-polygon, `None` when it
/// has no coordinates.
fn compute_envelope(geometry: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    geometry.bounding_rect().map(rect_to_aabb)
}

fn rect_to_aabb(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}
