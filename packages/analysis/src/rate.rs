//! Distance-banded nitrogen application policy.
//!
//! A step function over regulatory distance thresholds: the further a
//! field lies from water, the more nitrogen may be applied. Bands are
//! closed at their lower bound, so a distance exactly on a threshold gets
//! the higher rate.

use nitrogen_map_field_models::FieldCollection;

/// `(minimum distance in meters, allowed rate in kg N/ha)`, highest band
/// first.
pub const RATE_BANDS: [(f64, f64); 3] = [(3000.0, 80.0), (2000.0, 50.0), (1000.0, 40.0)];

/// Allowed rate for fields closer than the lowest band.
pub const NEAR_WATER_RATE: f64 = 0.0;

/// Returns the allowed nitrogen rate (kg N/ha) for a field at
/// `distance_m` meters from water.
///
/// Total over `f64`: negative distances and `NaN` fall through to
/// [`NEAR_WATER_RATE`].
#[must_use]
pub fn rate_for_distance(distance_m: f64) -> f64 {
    RATE_BANDS
        .iter()
        .find(|(min_distance, _)| distance_m >= *min_distance)
        .map_or(NEAR_WATER_RATE, |(_, rate)| *rate)
}

/// Sets each field's policy rate from its distance to water.
///
/// Fields without a distance keep an undefined policy rate.
#[must_use]
pub fn apply_rate_policy(mut fields: FieldCollection) -> FieldCollection {
    for field in &mut fields.fields {
        field.policy_rate_kg_ha = field.dist_to_water_m.map(rate_for_distance);
    }
    fields
}

#[cfg(test)]
mod tests {
    use geo::MultiPolygon;
    use nitrogen_map_field_models::{Crs, Field};

    use super::*;

    #[test]
    fn band_boundaries() {
        assert!((rate_for_distance(3000.0) - 80.0).abs() < f64::EPSILON);
        assert!((rate_for_distance(2999.999) - 50.0).abs() < f64::EPSILON);
        assert!((rate_for_distance(2000.0) - 50.0).abs() < f64::EPSILON);
        assert!((rate_for_distance(1999.999) - 40.0).abs() < f64::EPSILON);
        assert!((rate_for_distance(1000.0) - 40.0).abs() < f64::EPSILON);
        assert!(rate_for_distance(999.999).abs() < f64::EPSILON);
    }

    #[test]
    fn monotonic_across_distances() {
        let mut previous = rate_for_distance(0.0);
        for step in 0..=800 {
            let rate = rate_for_distance(f64::from(step) * 5.0);
            assert!(rate >= previous, "rate dropped at {} m", step * 5);
            previous = rate;
        }
    }

    #[test]
    fn degenerate_distances_get_near_water_rate() {
        assert!(rate_for_distance(-5.0).abs() < f64::EPSILON);
        assert!(rate_for_distance(f64::NAN).abs() < f64::EPSILON);
        assert!((rate_for_distance(f64::INFINITY) - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn undefined_distance_keeps_rate_undefined() {
        let mut near = Field::new("near", MultiPolygon(vec![]));
        near.dist_to_water_m = Some(1500.0);
        let far = Field::new("unknown", MultiPolygon(vec![]));

        let out = apply_rate_policy(FieldCollection::new(Crs::WGS84, vec![near, far]));
        assert_eq!(out.fields[0].policy_rate_kg_ha, Some(40.0));
        assert!(out.fields[1].policy_rate_kg_ha.is_none());
    }
}
