#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Field, water body, and nitrogen record types.
//!
//! These types flow through every stage of the nitrogen map pipeline:
//! ingestion creates them, the analysis stages annotate them, the
//! generator persists them and the server reloads them read-only.

pub mod crs;
pub mod geojson_geometry;

use geo::{Geometry, MultiPolygon};
use serde::{Deserialize, Serialize};

pub use crs::{Crs, InvalidCrsError};
pub use geojson_geometry::InvalidGeometryError;

/// Dataset column names shared by the loader and the writers.
pub mod columns {
    /// Field identifier.
    pub const ID: &str = "id";
    /// Field area in hectares.
    pub const AREA_HA: &str = "area_ha";
    /// Distance to the nearest water body in meters.
    pub const DIST_TO_WATER_M: &str = "dist_to_water_m";
    /// Distance-banded allowed nitrogen rate in kg/ha.
    pub const POLICY_RATE: &str = "fertilizer_amount_N_kg_per_ha";
    /// Document-derived applied nitrogen rate in kg/ha.
    pub const APPLIED_RATE: &str = "n_applied_kg_ha";
    /// Total applied nitrogen in kg.
    pub const TOTAL_APPLIED: &str = "n_total_kg";
    /// Estimated nitrogen reaching water in kg.
    pub const TO_WATER: &str = "n_estimated_to_water_kg";
    /// Fertilizer label.
    pub const FERTILIZER: &str = "fertilizer";
    /// Restriction label.
    pub const RESTRICTION: &str = "restriction";

    /// Every column the pipeline owns, in dataset order.
    pub const ALL: &[&str] = &[
        ID,
        AREA_HA,
        DIST_TO_WATER_M,
        POLICY_RATE,
        APPLIED_RATE,
        TOTAL_APPLIED,
        TO_WATER,
        FERTILIZER,
        RESTRICTION,
    ];
}

/// An agricultural parcel and its computed nitrogen attributes.
///
/// Polygon inputs are stored as single-member multi-polygons so every
/// stage handles one geometry type.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Source identifier (feature id or `id` property).
    pub id: String,
    /// Field boundary in the collection's CRS.
    pub geometry: MultiPolygon<f64>,
    /// Area in hectares. Derived from geometry when absent.
    pub area_ha: Option<f64>,
    /// Planar distance to the nearest water body in meters. `None` when
    /// no water geometries were available.
    pub dist_to_water_m: Option<f64>,
    /// Distance-banded allowed nitrogen rate (kg N/ha).
    pub policy_rate_kg_ha: Option<f64>,
    /// Mean document-derived applied nitrogen rate (kg N/ha).
    pub applied_rate_kg_ha: Option<f64>,
    /// Total applied nitrogen (kg).
    pub total_applied_kg: Option<f64>,
    /// Estimated nitrogen reaching water (kg).
    pub estimated_to_water_kg: Option<f64>,
    /// Fertilizer label carried over from the source data.
    pub fertilizer: Option<String>,
    /// Restriction label carried over from the source data. Not populated
    /// by the pipeline itself.
    pub restriction: Option<String>,
    /// Remaining source attributes, passed through untouched.
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl Field {
    /// Creates a field with no attributes besides its identifier and
    /// geometry.
    #[must_use]
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id: id.into(),
            geometry,
            area_ha: None,
            dist_to_water_m: None,
            policy_rate_kg_ha: None,
            applied_rate_kg_ha: None,
            total_applied_kg: None,
            estimated_to_water_kg: None,
            fertilizer: None,
            restriction: None,
            properties: serde_json::Map::new(),
        }
    }

    /// Sets a pre-existing area attribute.
    #[must_use]
    pub fn with_area_ha(mut self, area_ha: f64) -> Self {
        self.area_ha = Some(area_ha);
        self
    }

    /// Returns the area only if it is usable as-is (finite and
    /// non-negative).
    #[must_use]
    pub fn valid_area_ha(&self) -> Option<f64> {
        self.area_ha.filter(|a| a.is_finite() && *a >= 0.0)
    }
}

/// A set of fields sharing one coordinate reference system.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldCollection {
    /// CRS of every field geometry.
    pub crs: Crs,
    /// The fields.
    pub fields: Vec<Field>,
}

impl FieldCollection {
    /// Creates a collection in the given CRS.
    #[must_use]
    pub const fn new(crs: Crs, fields: Vec<Field>) -> Self {
        Self { crs, fields }
    }

    /// Returns `true` if the collection holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

/// Water-feature geometries (rivers, lakes, ditches) sharing one CRS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WaterCollection {
    /// CRS of every geometry.
    pub crs: Crs,
    /// Water geometries of any type.
    pub geometries: Vec<Geometry<f64>>,
}

impl WaterCollection {
    /// Creates a collection in the given CRS.
    #[must_use]
    pub const fn new(crs: Crs, geometries: Vec<Geometry<f64>>) -> Self {
        Self { crs, geometries }
    }

    /// Returns `true` if the collection holds no geometries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }
}

/// A nitrogen application figure extracted from a management document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NitrogenRecord {
    /// Path or name of the source document.
    pub source: String,
    /// Applied nitrogen in kg N per hectare.
    pub rate_kg_per_ha: f64,
    /// The text the figure was matched from.
    pub raw_text: String,
}
