//! Validated query geometry accepted at the service boundary.

use geo::{BoundingRect, Intersects, MultiPolygon, Polygon, Rect};
use nitrogen_map_field_models::geojson_geometry;

use crate::QueryError;

/// A query area: exactly a polygon or a multi-polygon.
///
/// Only constructible through validation, so the index never sees any
/// other geometry type or a malformed coordinate structure.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryGeometry {
    /// A single polygon.
    Polygon(Polygon<f64>),
    /// Several polygons.
    MultiPolygon(MultiPolygon<f64>),
}

impl QueryGeometry {
    /// Validates a parsed `GeoJSON` geometry.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidGeometry`] for any type other than
    /// `Polygon`/`MultiPolygon`, a malformed coordinate structure or a
    /// multi-polygon without members.
    pub fn from_geojson(geometry: &geojson::Geometry) -> Result<Self, QueryError> {
        match &geometry.value {
            geojson::Value::Polygon(rings) => geojson_geometry::polygon(rings)
                .map(Self::Polygon)
                .map_err(QueryError::from),
            geojson::Value::MultiPolygon(polygons) if polygons.is_empty() => Err(
                QueryError::InvalidGeometry("multi-polygon must have at least one polygon".into()),
            ),
            geojson::Value::MultiPolygon(polygons) => geojson_geometry::multi_polygon(polygons)
                .map(Self::MultiPolygon)
                .map_err(QueryError::from),
            other => Err(QueryError::InvalidGeometry(format!(
                "Geometry must be Polygon or MultiPolygon, got {}",
                geojson_geometry::type_name(other)
            ))),
        }
    }

    /// Parses and validates a raw JSON geometry object
    /// (`{"type": ..., "coordinates": ...}`).
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidGeometry`] if the value is not a
    /// `GeoJSON` geometry or fails [`Self::from_geojson`].
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, QueryError> {
        let geometry = geojson::Geometry::from_json_value(value)
            .map_err(|e| QueryError::InvalidGeometry(e.to_string()))?;
        Self::from_geojson(&geometry)
    }

    /// Minimal axis-aligned rectangle around the query area, `None` for an
    /// empty multi-polygon.
    #[must_use]
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match self {
            Self::Polygon(p) => p.bounding_rect(),
            Self::MultiPolygon(mp) => mp.bounding_rect(),
        }
    }

    /// Exact intersection test against a field boundary.
    #[must_use]
    pub fn intersects(&self, field: &MultiPolygon<f64>) -> bool {
        match self {
            Self::Polygon(p) => p.intersects(field),
            Self::MultiPolygon(mp) => mp.intersects(field),
        }
    }
}

impl From<Polygon<f64>> for QueryGeometry {
    fn from(polygon: Polygon<f64>) -> Self {
        Self::Polygon(polygon)
    }
}

impl From<MultiPolygon<f64>> for QueryGeometry {
    fn from(multi_polygon: MultiPolygon<f64>) -> Self {
        Self::MultiPolygon(multi_polygon)
    }
}
