//! `GeoJSON` field and water layer loading.
//!
//! Fields keep only polygonal features. Every pipeline column is read back
//! when present, so a written dataset loads into the same [`Field`]
//! values. Features that cannot be used are logged and skipped rather
//! than failing the whole layer.

use std::path::Path;

use geojson::{Feature, GeoJson, JsonObject, JsonValue, feature::Id};
use nitrogen_map_field_models::{
    Crs, Field, FieldCollection, InvalidCrsError, WaterCollection, columns, geojson_geometry,
};

use crate::IngestError;

/// Extensions this module can decode.
const GEOJSON_EXTENSIONS: &[&str] = &["geojson", "json"];

/// Reads the legacy `crs` member (`{"type": "name", "properties":
/// {"name": ...}}` or `{"type": "EPSG", "properties": {"code": ...}}`).
///
/// A document without one is WGS 84.
///
/// # Errors
///
/// Returns [`IngestError::Crs`] if the member is present but cannot be
/// interpreted.
pub fn crs_from_foreign_members(members: Option<&JsonObject>) -> Result<Crs, IngestError> {
    let Some(crs) = members.and_then(|m| m.get("crs")) else {
        return Ok(Crs::WGS84);
    };
    if crs.is_null() {
        return Ok(Crs::WGS84);
    }

    let properties = crs.get("properties");
    if let Some(name) = properties.and_then(|p| p.get("name")).and_then(JsonValue::as_str) {
        return Ok(name.parse()?);
    }
    if let Some(code) = properties
        .and_then(|p| p.get("code"))
        .and_then(JsonValue::as_u64)
        .and_then(|c| u32::try_from(c).ok())
    {
        return Ok(Crs::from_epsg(code));
    }

    Err(InvalidCrsError {
        value: crs.to_string(),
    }
    .into())
}

fn parse_document(text: &str) -> Result<(Vec<Feature>, Crs), IngestError> {
    match text.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => {
            let crs = crs_from_foreign_members(collection.foreign_members.as_ref())?;
            Ok((collection.features, crs))
        }
        GeoJson::Feature(feature) => {
            let crs = crs_from_foreign_members(feature.foreign_members.as_ref())?;
            Ok((vec![feature], crs))
        }
        GeoJson::Geometry(geometry) => {
            let crs = crs_from_foreign_members(geometry.foreign_members.as_ref())?;
            Ok((vec![Feature::from(geometry)], crs))
        }
    }
}

fn number(value: Option<JsonValue>) -> Option<f64> {
    match value? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
    .filter(|v: &f64| v.is_finite())
}

fn text(value: Option<JsonValue>) -> Option<String> {
    match value? {
        JsonValue::String(s) => Some(s),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

fn feature_id(id: Option<Id>, properties: &mut JsonObject) -> Option<String> {
    let from_properties = text(properties.remove(columns::ID));
    match id {
        Some(Id::String(s)) => Some(s),
        Some(Id::Number(n)) => Some(n.to_string()),
        None => from_properties,
    }
}

fn field_from_feature(index: usize, feature: Feature) -> Option<Field> {
    let Some(geometry) = feature.geometry else {
        log::warn!("Feature {index} has no geometry; skipping");
        return None;
    };
    let multi_polygon = match geojson_geometry::polygonal(&geometry.value) {
        Ok(multi_polygon) => multi_polygon,
        Err(e) => {
            log::warn!("Feature {index} skipped: {e}");
            return None;
        }
    };

    let mut properties = feature.properties.unwrap_or_default();
    let id = feature_id(feature.id, &mut properties).unwrap_or_else(|| index.to_string());

    let mut field = Field::new(id, multi_polygon);
    field.area_ha = number(properties.remove(columns::AREA_HA));
    field.dist_to_water_m = number(properties.remove(columns::DIST_TO_WATER_M));
    field.policy_rate_kg_ha = number(properties.remove(columns::POLICY_RATE));
    field.applied_rate_kg_ha = number(properties.remove(columns::APPLIED_RATE));
    field.total_applied_kg = number(properties.remove(columns::TOTAL_APPLIED));
    field.estimated_to_water_kg = number(properties.remove(columns::TO_WATER));
    field.fertilizer = text(properties.remove(columns::FERTILIZER));
    field.restriction = text(properties.remove(columns::RESTRICTION));
    field.properties = properties;

    Some(field)
}

/// Decodes a field layer from `GeoJSON` text.
///
/// # Errors
///
/// Returns [`IngestError`] if the text is not `GeoJSON` or declares an
/// unreadable CRS.
pub fn fields_from_str(path: &Path, text: &str) -> Result<FieldCollection, IngestError> {
    let (features, crs) = parse_document(text)?;
    let total = features.len();

    let fields = features
        .into_iter()
        .enumerate()
        .filter_map(|(index, feature)| field_from_feature(index, feature))
        .collect::<Vec<_>>();

    log::debug!(
        "Decoded {} of {total} features from {} as fields ({crs})",
        fields.len(),
        path.display()
    );

    Ok(FieldCollection::new(crs, fields))
}

/// Decodes a water layer from `GeoJSON` text. Any geometry type is kept.
///
/// # Errors
///
/// Returns [`IngestError`] if the text is not `GeoJSON` or declares an
/// unreadable CRS.
pub fn waters_from_str(path: &Path, text: &str) -> Result<WaterCollection, IngestError> {
    let (features, crs) = parse_document(text)?;

    let geometries = features
        .into_iter()
        .enumerate()
        .filter_map(|(index, feature)| {
            let geometry = feature.geometry?;
            match geojson_geometry::geometry(&geometry.value) {
                Ok(geometry) => Some(geometry),
                Err(e) => {
                    log::warn!("Water feature {index} in {} skipped: {e}", path.display());
                    None
                }
            }
        })
        .collect::<Vec<_>>();

    Ok(WaterCollection::new(crs, geometries))
}

/// Reads a field layer from a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or decoded.
pub fn read_fields_geojson(path: &Path) -> Result<FieldCollection, IngestError> {
    let text = std::fs::read_to_string(path)?;
    fields_from_str(path, &text)
}

/// Reads a water layer from a `GeoJSON` file.
///
/// # Errors
///
/// Returns [`IngestError`] if the file cannot be read or decoded.
pub fn read_waters_geojson(path: &Path) -> Result<WaterCollection, IngestError> {
    let text = std::fs::read_to_string(path)?;
    waters_from_str(path, &text)
}

fn ensure_geojson(path: &Path) -> Result<(), IngestError> {
    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| GEOJSON_EXTENSIONS.iter().any(|s| e.eq_ignore_ascii_case(s)));
    if supported {
        Ok(())
    } else {
        Err(IngestError::UnsupportedFormat {
            path: path.to_path_buf(),
        })
    }
}

/// Loads the first candidate that yields at least one field.
///
/// Candidates that fail to load or hold no polygonal features are logged
/// and skipped. Returns an empty collection if none qualifies.
#[must_use]
pub fn load_first_fields(paths: &[&Path]) -> FieldCollection {
    for path in paths {
        match ensure_geojson(path).and_then(|()| read_fields_geojson(path)) {
            Ok(fields) if !fields.is_empty() => {
                log::info!(
                    "Loaded {} fields from {} ({})",
                    fields.len(),
                    path.display(),
                    fields.crs
                );
                return fields;
            }
            Ok(_) => log::warn!("{} contains no field polygons; skipping", path.display()),
            Err(e) => log::warn!("Could not load fields from {}: {e}", path.display()),
        }
    }

    log::warn!("No field layer could be loaded");
    FieldCollection::default()
}

/// Loads the first candidate that yields at least one water geometry.
///
/// Returns an empty collection if none qualifies; distances are then
/// undefined for every field.
#[must_use]
pub fn load_first_waters(paths: &[&Path]) -> WaterCollection {
    for path in paths {
        match ensure_geojson(path).and_then(|()| read_waters_geojson(path)) {
            Ok(waters) if !waters.is_empty() => {
                log::info!(
                    "Loaded {} water geometries from {} ({})",
                    waters.geometries.len(),
                    path.display(),
                    waters.crs
                );
                return waters;
            }
            Ok(_) => log::warn!("{} contains no water geometries; skipping", path.display()),
            Err(e) => log::warn!("Could not load waters from {}: {e}", path.display()),
        }
    }

    log::warn!("No water layer could be loaded");
    WaterCollection::default()
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::*;

    const FIELDS: &str = r#"{
        "type": "FeatureCollection",
        "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::25832"}},
        "features": [
            {
                "type": "Feature",
                "id": "F-1",
                "properties": {
                    "area_ha": 2.5,
                    "fertilizer": "Gülle",
                    "dist_to_water_m": 1200.0,
                    "n_applied_kg_ha": null,
                    "schlag_nr": 17
                },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[500000, 5700000], [500100, 5700000], [500100, 5700100], [500000, 5700000]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"id": 42},
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [[[[500200, 5700000], [500300, 5700000], [500300, 5700100], [500200, 5700000]]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"id": "well"},
                "geometry": {"type": "Point", "coordinates": [500000, 5700000]}
            },
            {"type": "Feature", "properties": {"id": "nothing"}, "geometry": null}
        ]
    }"#;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "nitrogen_map_vector_{name}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn decodes_polygonal_features_and_attributes() {
        let fields = fields_from_str(Path::new("fields.geojson"), FIELDS).unwrap();
        assert_eq!(fields.crs, Crs::from_epsg(25832));
        assert_eq!(fields.len(), 2);

        let first = &fields.fields[0];
        assert_eq!(first.id, "F-1");
        assert_eq!(first.area_ha, Some(2.5));
        assert_eq!(first.dist_to_water_m, Some(1200.0));
        assert_eq!(first.applied_rate_kg_ha, None);
        assert_eq!(first.fertilizer.as_deref(), Some("Gülle"));
        assert_eq!(first.properties.get("schlag_nr"), Some(&serde_json::json!(17)));
        assert!(!first.properties.contains_key(columns::AREA_HA));

        assert_eq!(fields.fields[1].id, "42");
        assert_eq!(fields.fields[1].geometry.0.len(), 1);
    }

    #[test]
    fn missing_crs_member_means_wgs84() {
        assert_eq!(crs_from_foreign_members(None).unwrap(), Crs::WGS84);

        let mut members = JsonObject::new();
        members.insert(
            "crs".to_string(),
            serde_json::json!({"type": "EPSG", "properties": {"code": 3857}}),
        );
        assert_eq!(
            crs_from_foreign_members(Some(&members)).unwrap(),
            Crs::WEB_MERCATOR
        );

        members.insert(
            "crs".to_string(),
            serde_json::json!({"type": "link", "properties": {"href": "x"}}),
        );
        assert!(crs_from_foreign_members(Some(&members)).is_err());
    }

    #[test]
    fn water_layer_keeps_every_geometry_type() {
        let waters = waters_from_str(Path::new("waters.geojson"), FIELDS).unwrap();
        assert_eq!(waters.geometries.len(), 3);
        assert_eq!(waters.crs, Crs::from_epsg(25832));
    }

    #[test]
    fn numeric_strings_are_accepted() {
        assert_eq!(number(Some(serde_json::json!("12,5"))), Some(12.5));
        assert_eq!(number(Some(serde_json::json!("n/a"))), None);
        assert_eq!(number(Some(JsonValue::Null)), None);
    }

    #[test]
    fn load_first_fields_skips_unusable_candidates() {
        let dir = temp_dir("first");
        let broken = dir.join("broken.geojson");
        let points = dir.join("points.geojson");
        let shapefile = dir.join("felder.shp");
        let good = dir.join("felder.geojson");
        fs::write(&broken, "{not json").unwrap();
        fs::write(
            &points,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [1, 2]}}
            ]}"#,
        )
        .unwrap();
        fs::write(&shapefile, "").unwrap();
        fs::write(&good, FIELDS).unwrap();

        let fields = load_first_fields(&[
            shapefile.as_path(),
            broken.as_path(),
            points.as_path(),
            good.as_path(),
        ]);
        assert_eq!(fields.len(), 2);

        assert!(load_first_fields(&[broken.as_path()]).is_empty());
        assert!(load_first_waters(&[]).is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }
}
