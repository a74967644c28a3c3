#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API response types for the nitrogen map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the field model so the API contract can evolve independently.

use nitrogen_map_field_models::{Field, geojson_geometry};
use serde::Serialize;

/// Message returned when a query area touches no field.
pub const NO_MATCH_MESSAGE: &str = "No matching area found";

/// A field intersecting the query area.
#[derive(Debug, Clone, Serialize)]
pub struct ApiFieldMatch {
    /// Field identifier.
    pub id: String,
    /// Fertilizer label, if the source data had one.
    pub fertilizer: Option<String>,
    /// Restriction label, if the source data had one.
    pub restriction: Option<String>,
    /// Field boundary in the dataset CRS.
    pub geometry: geojson::Geometry,
}

impl From<&Field> for ApiFieldMatch {
    fn from(field: &Field) -> Self {
        Self {
            id: field.id.clone(),
            fertilizer: field.fertilizer.clone(),
            restriction: field.restriction.clone(),
            geometry: geojson_geometry::to_geojson(&field.geometry),
        }
    }
}

/// Response body of `POST /api/check-area`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CheckAreaResponse {
    /// No field intersects the query area.
    NoMatch {
        /// Always [`NO_MATCH_MESSAGE`].
        message: String,
    },
    /// At least one field intersects the query area.
    Matches {
        /// Matching fields in dataset order.
        matches: Vec<ApiFieldMatch>,
    },
}

impl CheckAreaResponse {
    /// Builds the response for a list of matching fields.
    #[must_use]
    pub fn from_matches<'a>(fields: impl IntoIterator<Item = &'a Field>) -> Self {
        let matches = fields
            .into_iter()
            .map(ApiFieldMatch::from)
            .collect::<Vec<_>>();
        if matches.is_empty() {
            Self::NoMatch {
                message: NO_MATCH_MESSAGE.to_string(),
            }
        } else {
            Self::Matches { matches }
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Human-readable status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Number of fields in the loaded dataset.
    pub field_count: usize,
}

/// Response body of `POST /api/reload`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReload {
    /// Dataset file the index was rebuilt from.
    pub dataset: String,
    /// Number of fields in the new dataset.
    pub field_count: usize,
}

/// Error body for rejected requests.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// What went wrong.
    pub detail: String,
}
