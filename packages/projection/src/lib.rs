#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Coordinate reprojection for field and water geometries.
//!
//! Distances and areas are only meaningful in a metric projection, while
//! vector sources arrive in whatever CRS they were exported with. This
//! crate maps the supported EPSG codes to `PROJ.4` definitions and
//! transforms whole geometries between them with [`proj4rs`].
//!
//! No datum shifts are applied: every definition omits `+datum` and
//! `+towgs84`, which is well inside the tolerance of the distance bands.

use geo::{Coord, MapCoords};
use nitrogen_map_field_models::Crs;
use proj4rs::proj::Proj;
use proj4rs::transform::transform;
use thiserror::Error;

/// Errors that can occur while reprojecting geometries.
///
/// All of these are configuration errors: retrying with the same input
/// fails the same way.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The EPSG code has no known definition.
    #[error("Unsupported coordinate reference system {crs}")]
    UnsupportedCrs {
        /// The unsupported CRS.
        crs: Crs,
    },

    /// The `PROJ.4` definition was rejected by the projection library.
    #[error("Invalid projection definition for {crs}: {message}")]
    InvalidDefinition {
        /// CRS whose definition failed to build.
        crs: Crs,
        /// Description of what went wrong.
        message: String,
    },

    /// A coordinate could not be transformed.
    #[error("Failed to transform ({x}, {y}) from {from} to {to}: {message}")]
    Transform {
        /// Source CRS.
        from: Crs,
        /// Target CRS.
        to: Crs,
        /// Input x / longitude.
        x: f64,
        /// Input y / latitude.
        y: f64,
        /// Description of what went wrong.
        message: String,
    },
}

/// `PROJ.4` definition and axis kind for a supported CRS.
struct CrsDefinition {
    proj4: &'static str,
    geographic: bool,
}

/// Looks up the `PROJ.4` definition for an EPSG code.
fn definition(crs: Crs) -> Result<CrsDefinition, ProjectionError> {
    let (proj4, geographic) = match crs.epsg() {
        4326 => ("+proj=longlat +ellps=WGS84 +no_defs", true),
        4258 => ("+proj=longlat +ellps=GRS80 +no_defs", true),
        3857 => (
            "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs",
            false,
        ),
        25832 => ("+proj=utm +zone=32 +ellps=GRS80 +units=m +no_defs", false),
        25833 => ("+proj=utm +zone=33 +ellps=GRS80 +units=m +no_defs", false),
        32632 => ("+proj=utm +zone=32 +ellps=WGS84 +units=m +no_defs", false),
        32633 => ("+proj=utm +zone=33 +ellps=WGS84 +units=m +no_defs", false),
        _ => return Err(ProjectionError::UnsupportedCrs { crs }),
    };

    Ok(CrsDefinition { proj4, geographic })
}

/// Returns `true` if the CRS has a known definition.
#[must_use]
pub fn is_supported(crs: Crs) -> bool {
    definition(crs).is_ok()
}

/// Returns `true` if the CRS uses longitude/latitude in degrees.
///
/// # Errors
///
/// Returns [`ProjectionError::UnsupportedCrs`] for unknown codes.
pub fn is_geographic(crs: Crs) -> Result<bool, ProjectionError> {
    definition(crs).map(|d| d.geographic)
}

struct Endpoint {
    crs: Crs,
    proj: Proj,
    geographic: bool,
}

impl Endpoint {
    fn new(crs: Crs) -> Result<Self, ProjectionError> {
        let def = definition(crs)?;
        let proj = Proj::from_proj_string(def.proj4).map_err(|e| {
            ProjectionError::InvalidDefinition {
                crs,
                message: format!("{e:?}"),
            }
        })?;

        Ok(Self {
            crs,
            proj,
            geographic: def.geographic,
        })
    }
}

/// A prepared transformation between two coordinate reference systems.
///
/// Construction validates both ends, so a [`Reprojector`] that exists can
/// only fail on individual coordinates (e.g. a pole under Web Mercator).
pub struct Reprojector {
    from: Endpoint,
    to: Endpoint,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reprojector")
            .field("from", &self.from.crs)
            .field("to", &self.to.crs)
            .finish()
    }
}

impl Reprojector {
    /// Prepares a transformation from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError`] if either CRS is unsupported or its
    /// definition cannot be built.
    pub fn new(from: Crs, to: Crs) -> Result<Self, ProjectionError> {
        let reprojector = Self {
            from: Endpoint::new(from)?,
            to: Endpoint::new(to)?,
        };
        log::debug!("Prepared reprojection {from} -> {to}");
        Ok(reprojector)
    }

    /// Source CRS.
    #[must_use]
    pub const fn from_crs(&self) -> Crs {
        self.from.crs
    }

    /// Target CRS.
    #[must_use]
    pub const fn to_crs(&self) -> Crs {
        self.to.crs
    }

    /// Returns `true` if source and target are the same CRS.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.from.crs == self.to.crs
    }

    /// Transforms a single coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectionError::Transform`] if the projection library
    /// rejects the coordinate or produces a non-finite result.
    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>, ProjectionError> {
        if self.is_identity() {
            return Ok(coord);
        }

        let fail = |message: String| ProjectionError::Transform {
            from: self.from.crs,
            to: self.to.crs,
            x: coord.x,
            y: coord.y,
            message,
        };

        // proj4rs works in radians for geographic systems.
        let mut point = if self.from.geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(&self.from.proj, &self.to.proj, &mut point)
            .map_err(|e| fail(format!("{e:?}")))?;

        let out = if self.to.geographic {
            Coord {
                x: point.0.to_degrees(),
                y: point.1.to_degrees(),
            }
        } else {
            Coord {
                x: point.0,
                y: point.1,
            }
        };

        if !out.x.is_finite() || !out.y.is_finite() {
            return Err(fail("non-finite result".to_string()));
        }

        Ok(out)
    }

    /// Transforms every coordinate of a geometry.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProjectionError`] hit by any coordinate.
    pub fn reproject<G>(&self, geometry: &G) -> Result<G, ProjectionError>
    where
        G: MapCoords<f64, f64, Output = G> + Clone,
    {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|coord| self.transform_coord(coord))
    }
}
