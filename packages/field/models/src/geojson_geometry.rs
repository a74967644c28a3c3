//! Checked conversions between `GeoJSON` geometries and [`geo`] types.
//!
//! `GeoJSON` positions are plain arrays, so a short or non-numeric
//! position is representable on the wire. Every position and ring is
//! validated here before a [`geo`] value is built.

use geo::{Coord, Geometry, LineString, MultiPolygon, Polygon};
use geojson::Value;

/// Error returned when a `GeoJSON` geometry is structurally invalid or of
/// the wrong type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidGeometryError {
    /// Description of what went wrong.
    pub message: String,
}

impl InvalidGeometryError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for InvalidGeometryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for InvalidGeometryError {}

/// Returns the `GeoJSON` type name of a geometry value.
#[must_use]
pub const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn coord(position: &[f64]) -> Result<Coord<f64>, InvalidGeometryError> {
    match position {
        [x, y, ..] if x.is_finite() && y.is_finite() => Ok(Coord { x: *x, y: *y }),
        [_, _, ..] => Err(InvalidGeometryError::new(
            "position contains a non-finite coordinate",
        )),
        _ => Err(InvalidGeometryError::new(format!(
            "position must have at least two coordinates, got {}",
            position.len()
        ))),
    }
}

fn line_string(positions: &[Vec<f64>]) -> Result<LineString<f64>, InvalidGeometryError> {
    if positions.len() < 2 {
        return Err(InvalidGeometryError::new(format!(
            "line string must have at least two positions, got {}",
            positions.len()
        )));
    }
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString)
}

fn ring(positions: &[Vec<f64>]) -> Result<LineString<f64>, InvalidGeometryError> {
    if positions.len() < 4 {
        return Err(InvalidGeometryError::new(format!(
            "linear ring must have at least four positions, got {}",
            positions.len()
        )));
    }
    positions
        .iter()
        .map(|p| coord(p))
        .collect::<Result<Vec<_>, _>>()
        .map(LineString)
}

/// Builds a polygon from `GeoJSON` rings (exterior first).
///
/// # Errors
///
/// Returns [`InvalidGeometryError`] if there are no rings or any ring or
/// position is malformed.
pub fn polygon(rings: &[Vec<Vec<f64>>]) -> Result<Polygon<f64>, InvalidGeometryError> {
    let Some((exterior, interiors)) = rings.split_first() else {
        return Err(InvalidGeometryError::new("polygon must have an exterior ring"));
    };
    let exterior = ring(exterior)?;
    let interiors = interiors
        .iter()
        .map(|r| ring(r))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::new(exterior, interiors))
}

/// Builds a multi-polygon from `GeoJSON` polygon coordinates.
///
/// # Errors
///
/// Returns [`InvalidGeometryError`] if any member polygon is malformed.
pub fn multi_polygon(
    polygons: &[Vec<Vec<Vec<f64>>>],
) -> Result<MultiPolygon<f64>, InvalidGeometryError> {
    polygons
        .iter()
        .map(|p| polygon(p))
        .collect::<Result<Vec<_>, _>>()
        .map(MultiPolygon)
}

/// Converts a `Polygon` or `MultiPolygon` value into a [`MultiPolygon`].
///
/// # Errors
///
/// Returns [`InvalidGeometryError`] for any other geometry type or a
/// malformed coordinate structure.
pub fn polygonal(value: &Value) -> Result<MultiPolygon<f64>, InvalidGeometryError> {
    match value {
        Value::Polygon(rings) => Ok(MultiPolygon(vec![polygon(rings)?])),
        Value::MultiPolygon(polygons) => multi_polygon(polygons),
        other => Err(InvalidGeometryError::new(format!(
            "Geometry must be Polygon or MultiPolygon, got {}",
            type_name(other)
        ))),
    }
}

/// Converts any `GeoJSON` geometry value into a [`Geometry`].
///
/// # Errors
///
/// Returns [`InvalidGeometryError`] if any position, line or ring is
/// malformed.
pub fn geometry(value: &Value) -> Result<Geometry<f64>, InvalidGeometryError> {
    Ok(match value {
        Value::Point(p) => Geometry::Point(geo::Point::from(coord(p)?)),
        Value::MultiPoint(points) => Geometry::MultiPoint(geo::MultiPoint(
            points
                .iter()
                .map(|p| coord(p).map(geo::Point::from))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Value::LineString(positions) => Geometry::LineString(line_string(positions)?),
        Value::MultiLineString(lines) => Geometry::MultiLineString(geo::MultiLineString(
            lines
                .iter()
                .map(|l| line_string(l))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Value::Polygon(rings) => Geometry::Polygon(polygon(rings)?),
        Value::MultiPolygon(polygons) => Geometry::MultiPolygon(multi_polygon(polygons)?),
        Value::GeometryCollection(members) => Geometry::GeometryCollection(
            geo::GeometryCollection(
                members
                    .iter()
                    .map(|g| geometry(&g.value))
                    .collect::<Result<Vec<_>, _>>()?,
            ),
        ),
    })
}

/// Converts a field boundary into `GeoJSON`.
///
/// A single-member multi-polygon is written as a `Polygon`, which is how
/// almost every field arrives.
#[must_use]
pub fn to_geojson(geometry: &MultiPolygon<f64>) -> geojson::Geometry {
    let value = match geometry.0.as_slice() {
        [single] => Value::from(single),
        _ => Value::from(geometry),
    };
    geojson::Geometry::new(value)
}

#[cfg(test)]
mod tests {
    use geo::{Area, Intersects, polygon};

    use super::*;

    fn square() -> MultiPolygon<f64> {
        MultiPolygon(vec![polygon![
            (x: 9.10, y: 51.20),
            (x: 9.11, y: 51.20),
            (x: 9.11, y: 51.21),
            (x: 9.10, y: 51.21),
        ]])
    }

    #[test]
    fn round_trip_preserves_geometry() {
        let original = square();
        let json = to_geojson(&original).to_string();
        let geojson::GeoJson::Geometry(parsed) = json.parse::<geojson::GeoJson>().unwrap() else {
            panic!("expected a bare geometry");
        };
        let back = polygonal(&parsed.value).unwrap();

        assert!(back.intersects(&original));
        let relative = (back.unsigned_area() - original.unsigned_area()).abs()
            / original.unsigned_area();
        assert!(relative < 1e-6);
    }

    #[test]
    fn single_polygon_is_written_as_polygon() {
        assert!(matches!(to_geojson(&square()).value, Value::Polygon(_)));

        let mut two = square();
        two.0.push(two.0[0].clone());
        assert!(matches!(to_geojson(&two).value, Value::MultiPolygon(_)));
    }

    #[test]
    fn rejects_non_polygonal_types() {
        let err = polygonal(&Value::Point(vec![1.0, 2.0])).unwrap_err();
        assert!(err.message.contains("Point"));
    }

    #[test]
    fn rejects_short_positions_and_rings() {
        let short_position = Value::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ]]);
        assert!(polygonal(&short_position).is_err());

        let short_ring = Value::Polygon(vec![vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 0.0]]]);
        assert!(polygonal(&short_ring).is_err());

        assert!(polygonal(&Value::Polygon(vec![])).is_err());
    }

    #[test]
    fn rejects_non_finite_coordinates() {
        let value = Value::LineString(vec![vec![0.0, f64::NAN], vec![1.0, 1.0]]);
        assert!(geometry(&value).is_err());
    }

    #[test]
    fn converts_water_geometries() {
        let value = Value::MultiLineString(vec![
            vec![vec![0.0, 0.0], vec![1.0, 0.0]],
            vec![vec![1.0, 0.0], vec![2.0, 0.5, 10.0]],
        ]);
        let Geometry::MultiLineString(mls) = geometry(&value).unwrap() else {
            panic!("expected a multi line string");
        };
        assert_eq!(mls.0.len(), 2);
        assert!((mls.0[1].0[1].y - 0.5).abs() < f64::EPSILON);
    }
}
