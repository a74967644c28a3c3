#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial analysis stages of the nitrogen map pipeline.
//!
//! [`analyze`] runs the three stages in order on a whole field
//! collection:
//!
//! 1. [`distance::compute_distances`] measures each field's distance to
//!    the nearest water body in a metric projection.
//! 2. [`rate::apply_rate_policy`] derives the distance-banded allowed
//!    nitrogen rate.
//! 3. [`loads::estimate_loads`] derives area, applied nitrogen and the
//!    runoff share reaching water from the document-derived mean rate.
//!
//! The policy rate and the applied rate are independent quantities and
//! are reported in separate attributes.

pub mod distance;
pub mod loads;
pub mod rate;

use nitrogen_map_field_models::{Crs, FieldCollection, NitrogenRecord, WaterCollection};
use nitrogen_map_projection::ProjectionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use distance::compute_distances;
pub use loads::{DEFAULT_RUNOFF_COEFFICIENT, estimate_loads};
pub use rate::{apply_rate_policy, rate_for_distance};

/// Errors that can occur during analysis.
///
/// Both variants are configuration errors; the pipeline aborts on them.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Reprojection into or out of the metric CRS failed.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// The runoff coefficient is not a fraction between 0 and 1.
    #[error("Invalid runoff coefficient {value}: expected a value between 0 and 1")]
    InvalidRunoffCoefficient {
        /// The rejected value.
        value: f64,
    },
}

/// Tunable analysis parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Planar CRS in meters used for distances and areas.
    pub metric_crs: Crs,
    /// Fraction of applied nitrogen assumed to reach water.
    pub runoff_coefficient: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            metric_crs: Crs::WEB_MERCATOR,
            runoff_coefficient: DEFAULT_RUNOFF_COEFFICIENT,
        }
    }
}

/// Runs distance, rate policy and load estimation on `fields`.
///
/// # Errors
///
/// Returns [`AnalysisError`] on any configuration error. Nothing is
/// returned in that case, so no partial results can be persisted.
pub fn analyze(
    fields: FieldCollection,
    waters: &WaterCollection,
    records: &[NitrogenRecord],
    config: &AnalysisConfig,
) -> Result<FieldCollection, AnalysisError> {
    loads::validate_runoff_coefficient(config.runoff_coefficient)?;

    let fields = compute_distances(fields, waters, config.metric_crs)?;
    let fields = apply_rate_policy(fields);
    let fields = estimate_loads(
        fields,
        records,
        config.runoff_coefficient,
        config.metric_crs,
    )?;

    let with_distance = fields
        .fields
        .iter()
        .filter(|f| f.dist_to_water_m.is_some())
        .count();
    let with_load = fields
        .fields
        .iter()
        .filter(|f| f.estimated_to_water_kg.is_some())
        .count();
    log::info!(
        "Analysis complete: {} fields, {with_distance} with distance, {with_load} with load estimate",
        fields.len()
    );

    Ok(fields)
}
