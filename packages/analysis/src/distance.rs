//! Distance from each field to the nearest water body.
//!
//! Water geometries are reprojected into the metric CRS and merged into a
//! single [`WaterSurface`]: polygonal features are dissolved with
//! [`geo::unary_union`], linear and point features are collected into
//! multi-geometries. The distance from a field to the surface is the
//! minimum over its parts, which equals the minimum over the original
//! features.

use geo::{
    Distance, Euclidean, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point,
    Polygon, unary_union,
};
use nitrogen_map_field_models::{Crs, FieldCollection, WaterCollection};
use nitrogen_map_projection::Reprojector;

use crate::AnalysisError;

/// All water geometries merged in a metric CRS.
#[derive(Debug, Clone)]
pub struct WaterSurface {
    parts: Vec<Geometry<f64>>,
}

impl WaterSurface {
    /// Builds the surface from geometries already in a metric CRS.
    #[must_use]
    pub fn from_metric_geometries(geometries: Vec<Geometry<f64>>) -> Self {
        let mut polygons: Vec<Polygon<f64>> = Vec::new();
        let mut lines: Vec<LineString<f64>> = Vec::new();
        let mut points: Vec<Point<f64>> = Vec::new();

        for geometry in geometries {
            flatten(geometry, &mut polygons, &mut lines, &mut points);
        }

        let polygon_count = polygons.len();
        let mut parts = Vec::with_capacity(3);

        if !polygons.is_empty() {
            let union: MultiPolygon<f64> = unary_union(polygons.iter());
            log::debug!(
                "Dissolved {polygon_count} water polygons into {} parts",
                union.0.len()
            );
            if !union.0.is_empty() {
                parts.push(Geometry::MultiPolygon(union));
            }
        }
        if !lines.is_empty() {
            parts.push(Geometry::MultiLineString(MultiLineString(lines)));
        }
        if !points.is_empty() {
            parts.push(Geometry::MultiPoint(MultiPoint(points)));
        }

        Self { parts }
    }

    /// Returns `true` if no water geometry contributed to the surface.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Planar distance from `geometry` to the closest part of the
    /// surface. `None` for an empty surface or an empty geometry.
    #[must_use]
    pub fn distance_to(&self, geometry: &Geometry<f64>) -> Option<f64> {
        if is_empty_geometry(geometry) {
            return None;
        }

        self.parts
            .iter()
            .map(|part| Euclidean.distance(geometry, part))
            .reduce(f64::min)
    }
}

/// Sorts a water geometry into polygonal, linear and point parts.
fn flatten(
    geometry: Geometry<f64>,
    polygons: &mut Vec<Polygon<f64>>,
    lines: &mut Vec<LineString<f64>>,
    points: &mut Vec<Point<f64>>,
) {
    match geometry {
        Geometry::Point(p) => points.push(p),
        Geometry::MultiPoint(mp) => points.extend(mp.0),
        Geometry::Line(l) => lines.push(LineString::new(vec![l.start, l.end])),
        Geometry::LineString(ls) => {
            if !ls.0.is_empty() {
                lines.push(ls);
            }
        }
        Geometry::MultiLineString(mls) => lines.extend(mls.0.into_iter().filter(|l| !l.0.is_empty())),
        Geometry::Polygon(p) => polygons.push(p),
        Geometry::MultiPolygon(mp) => polygons.extend(mp.0),
        Geometry::Rect(r) => polygons.push(r.to_polygon()),
        Geometry::Triangle(t) => polygons.push(t.to_polygon()),
        Geometry::GeometryCollection(gc) => {
            for inner in gc.0 {
                flatten(inner, polygons, lines, points);
            }
        }
    }
}

fn is_empty_geometry(geometry: &Geometry<f64>) -> bool {
    match geometry {
        Geometry::MultiPolygon(mp) => mp.0.iter().all(|p| p.exterior().0.is_empty()),
        Geometry::Polygon(p) => p.exterior().0.is_empty(),
        _ => false,
    }
}

/// Annotates every field with its distance to the nearest water body.
///
/// If either collection is empty, every field's distance is set to `None`
/// and nothing is reprojected. Field geometries in the returned collection
/// are the originals; only the metric copies used for measuring are
/// reprojected.
///
/// # Errors
///
/// Returns [`AnalysisError::Projection`] if either collection's CRS or
/// the metric CRS is unsupported, or any coordinate fails to transform.
/// No field is annotated in that case.
pub fn compute_distances(
    mut fields: FieldCollection,
    waters: &WaterCollection,
    metric_crs: Crs,
) -> Result<FieldCollection, AnalysisError> {
    if fields.is_empty() || waters.is_empty() {
        if waters.is_empty() {
            log::warn!("No water geometries available; distances left undefined");
        }
        for field in &mut fields.fields {
            field.dist_to_water_m = None;
        }
        return Ok(fields);
    }

    let water_reprojector = Reprojector::new(waters.crs, metric_crs)?;
    let field_reprojector = Reprojector::new(fields.crs, metric_crs)?;

    let metric_waters = waters
        .geometries
        .iter()
        .map(|g| water_reprojector.reproject(g))
        .collect::<Result<Vec<_>, _>>()?;
    let surface = WaterSurface::from_metric_geometries(metric_waters);

    let metric_fields = fields
        .fields
        .iter()
        .map(|f| field_reprojector.reproject(&f.geometry))
        .collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "Computing distance to water for {} fields against {} water geometries in {metric_crs}",
        fields.len(),
        waters.geometries.len()
    );

    for (field, metric) in fields.fields.iter_mut().zip(metric_fields) {
        field.dist_to_water_m = surface.distance_to(&Geometry::MultiPolygon(metric));
        if field.dist_to_water_m.is_none() {
            log::debug!("Field {} has no measurable distance to water", field.id);
        }
    }

    Ok(fields)
}
