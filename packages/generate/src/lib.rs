#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Writers for the analyzed field dataset.
//!
//! Produces an attribute-only CSV table and a `GeoJSON` feature collection
//! in the collection's own CRS. Every pipeline column is always present;
//! an undefined value is an empty CSV cell or a JSON `null`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use geojson::{Feature, FeatureCollection, JsonObject, JsonValue, feature::Id};
use nitrogen_map_field_models::{Crs, Field, FieldCollection, columns, geojson_geometry};
use thiserror::Error;

/// File name of the attribute table.
pub const FIELDS_CSV: &str = "fields_n_loads.csv";

/// File name of the geometry dataset.
pub const FIELDS_GEOJSON: &str = "fields_n_loads.geojson";

/// Errors that can occur while writing outputs.
#[derive(Debug, Error)]
pub enum OutputError {
    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV serialization failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Paths of the files written by [`write_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    /// The attribute table.
    pub csv: PathBuf,
    /// The geometry dataset.
    pub geojson: PathBuf,
}

fn number_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn property_cell(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn passthrough_columns(collection: &FieldCollection) -> Vec<&str> {
    collection
        .fields
        .iter()
        .flat_map(|f| f.properties.keys())
        .map(String::as_str)
        .filter(|key| !columns::ALL.iter().any(|c| c == key))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn pipeline_cells(field: &Field) -> [String; 9] {
    [
        field.id.clone(),
        number_cell(field.area_ha),
        number_cell(field.dist_to_water_m),
        number_cell(field.policy_rate_kg_ha),
        number_cell(field.applied_rate_kg_ha),
        number_cell(field.total_applied_kg),
        number_cell(field.estimated_to_water_kg),
        field.fertilizer.clone().unwrap_or_default(),
        field.restriction.clone().unwrap_or_default(),
    ]
}

/// Writes the attribute table: pipeline columns first, then every
/// passthrough property in sorted order. Geometry is not included.
///
/// # Errors
///
/// Returns [`OutputError`] if the file cannot be created or written.
pub fn write_csv(collection: &FieldCollection, path: &Path) -> Result<(), OutputError> {
    let extra = passthrough_columns(collection);
    let mut writer = csv::Writer::from_path(path)?;

    let mut header: Vec<&str> = columns::ALL.to_vec();
    header.extend(extra.iter().copied());
    writer.write_record(&header)?;

    for field in &collection.fields {
        let extra_cells = extra
            .iter()
            .map(|key| property_cell(field.properties.get(*key)));
        writer.write_record(pipeline_cells(field).into_iter().chain(extra_cells))?;
    }

    writer.flush()?;
    log::info!(
        "Wrote {} rows to {}",
        collection.fields.len(),
        path.display()
    );
    Ok(())
}

fn feature_properties(field: &Field) -> JsonObject {
    let mut properties = field.properties.clone();
    let optional_text = |v: &Option<String>| v.clone().map_or(JsonValue::Null, JsonValue::String);

    properties.insert(columns::ID.to_owned(), JsonValue::String(field.id.clone()));
    for (key, value) in [
        (columns::AREA_HA, field.area_ha),
        (columns::DIST_TO_WATER_M, field.dist_to_water_m),
        (columns::POLICY_RATE, field.policy_rate_kg_ha),
        (columns::APPLIED_RATE, field.applied_rate_kg_ha),
        (columns::TOTAL_APPLIED, field.total_applied_kg),
        (columns::TO_WATER, field.estimated_to_water_kg),
    ] {
        properties.insert(key.to_owned(), value.map_or(JsonValue::Null, JsonValue::from));
    }
    properties.insert(columns::FERTILIZER.to_owned(), optional_text(&field.fertilizer));
    properties.insert(columns::RESTRICTION.to_owned(), optional_text(&field.restriction));

    properties
}

/// Builds the legacy `crs` member naming `crs`.
#[must_use]
pub fn crs_member(crs: Crs) -> JsonValue {
    serde_json::json!({
        "type": "name",
        "properties": { "name": crs.to_urn() },
    })
}

/// Converts the dataset into a `GeoJSON` feature collection.
///
/// Geometries stay in the collection CRS. A `crs` member is added unless
/// the CRS is WGS 84, the `GeoJSON` default.
#[must_use]
pub fn to_feature_collection(collection: &FieldCollection) -> FeatureCollection {
    let features = collection
        .fields
        .iter()
        .map(|field| Feature {
            bbox: None,
            geometry: Some(geojson_geometry::to_geojson(&field.geometry)),
            id: Some(Id::String(field.id.clone())),
            properties: Some(feature_properties(field)),
            foreign_members: None,
        })
        .collect();

    let foreign_members = (collection.crs != Crs::WGS84).then(|| {
        let mut members = JsonObject::new();
        members.insert("crs".to_owned(), crs_member(collection.crs));
        members
    });

    FeatureCollection {
        bbox: None,
        features,
        foreign_members,
    }
}

/// Writes the dataset as a `GeoJSON` feature collection.
///
/// # Errors
///
/// Returns [`OutputError::Io`] if the file cannot be written.
pub fn write_geojson(collection: &FieldCollection, path: &Path) -> Result<(), OutputError> {
    std::fs::write(path, to_feature_collection(collection).to_string())?;
    log::info!(
        "Wrote {} features to {} ({})",
        collection.fields.len(),
        path.display(),
        collection.crs
    );
    Ok(())
}

/// Writes both outputs into `out_dir`, creating it if needed.
///
/// # Errors
///
/// Returns [`OutputError`] if the directory or either file cannot be
/// written.
pub fn write_outputs(
    collection: &FieldCollection,
    out_dir: &Path,
) -> Result<OutputPaths, OutputError> {
    std::fs::create_dir_all(out_dir)?;

    let paths = OutputPaths {
        csv: out_dir.join(FIELDS_CSV),
        geojson: out_dir.join(FIELDS_GEOJSON),
    };
    write_csv(collection, &paths.csv)?;
    write_geojson(collection, &paths.geojson)?;

    Ok(paths)
}
