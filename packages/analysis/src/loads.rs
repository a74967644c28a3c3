//! Nitrogen load estimation.
//!
//! Every field gets the mean document-derived application rate, a total
//! applied mass (rate x area) and the share of it assumed to reach water
//! through runoff. The per-field rate is not attributable from the source
//! documents, so the same mean applies to all fields.

use geo::Area;
use nitrogen_map_field_models::{Crs, FieldCollection, NitrogenRecord};
use nitrogen_map_projection::Reprojector;

use crate::AnalysisError;

/// Fraction of applied nitrogen assumed to reach water.
pub const DEFAULT_RUNOFF_COEFFICIENT: f64 = 0.1;

const SQUARE_METERS_PER_HECTARE: f64 = 10_000.0;

/// Arithmetic mean of all record rates, or `None` without records.
#[must_use]
pub fn mean_rate(records: &[NitrogenRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = records.len() as f64;
    Some(records.iter().map(|r| r.rate_kg_per_ha).sum::<f64>() / count)
}

/// Validates a runoff coefficient (a finite fraction in `[0, 1]`).
///
/// # Errors
///
/// Returns [`AnalysisError::InvalidRunoffCoefficient`] otherwise.
pub fn validate_runoff_coefficient(value: f64) -> Result<f64, AnalysisError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(AnalysisError::InvalidRunoffCoefficient { value })
    }
}

/// Fills in missing areas from geometry projected into `metric_crs`.
///
/// Fields that already carry a finite, non-negative area keep it. The CRS
/// is only resolved when at least one field needs an area.
fn ensure_areas(fields: &mut FieldCollection, metric_crs: Crs) -> Result<(), AnalysisError> {
    let missing = fields
        .fields
        .iter()
        .filter(|f| f.valid_area_ha().is_none())
        .count();
    if missing == 0 {
        return Ok(());
    }

    log::info!("Deriving area for {missing} fields in {metric_crs}");
    let reprojector = Reprojector::new(fields.crs, metric_crs)?;

    for field in &mut fields.fields {
        if field.valid_area_ha().is_some() {
            continue;
        }
        if let Some(bad) = field.area_ha {
            log::warn!("Field {} has unusable area {bad}; deriving from geometry", field.id);
        }
        let metric = reprojector.reproject(&field.geometry)?;
        field.area_ha = Some(metric.unsigned_area() / SQUARE_METERS_PER_HECTARE);
    }

    Ok(())
}

/// Estimates applied and runoff nitrogen mass per field.
///
/// * Missing areas are derived from geometry in `metric_crs`.
/// * Without records the applied rate, total and to-water values are set
///   to `None` for every field: no data, not zero.
/// * Otherwise every field gets the mean record rate; total =
///   rate x area and to-water = total x `runoff_coefficient`.
///
/// Running the estimator on its own output yields identical values.
///
/// # Errors
///
/// Returns [`AnalysisError`] if the runoff coefficient is invalid or
/// area derivation needs an unsupported CRS.
pub fn estimate_loads(
    mut fields: FieldCollection,
    records: &[NitrogenRecord],
    runoff_coefficient: f64,
    metric_crs: Crs,
) -> Result<FieldCollection, AnalysisError> {
    let runoff_coefficient = validate_runoff_coefficient(runoff_coefficient)?;
    ensure_areas(&mut fields, metric_crs)?;

    let Some(rate) = mean_rate(records) else {
        log::warn!("No nitrogen application records; loads left undefined");
        for field in &mut fields.fields {
            field.applied_rate_kg_ha = None;
            field.total_applied_kg = None;
            field.estimated_to_water_kg = None;
        }
        return Ok(fields);
    };

    log::info!(
        "Applying mean rate {rate:.2} kg N/ha from {} records with runoff coefficient {runoff_coefficient}",
        records.len()
    );

    for field in &mut fields.fields {
        let total = field.area_ha.map(|area| rate * area);
        field.applied_rate_kg_ha = Some(rate);
        field.total_applied_kg = total;
        field.estimated_to_water_kg = total.map(|t| t * runoff_coefficient);
    }

    Ok(fields)
}
