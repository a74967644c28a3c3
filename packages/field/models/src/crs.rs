//! Coordinate reference system identifiers.
//!
//! Vector sources name their CRS in several spellings (`EPSG:25832`,
//! `urn:ogc:def:crs:EPSG::25832`, `urn:ogc:def:crs:OGC:1.3:CRS84`). All of
//! them are normalized into an [`Crs`] holding the bare EPSG code.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An EPSG-coded coordinate reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Crs(u32);

impl Crs {
    /// WGS 84 geographic coordinates (longitude/latitude in degrees).
    /// The default for `GeoJSON`.
    pub const WGS84: Self = Self(4326);

    /// Web Mercator, the default metric projection for distances and
    /// areas.
    pub const WEB_MERCATOR: Self = Self(3857);

    /// Creates a CRS from a raw EPSG code.
    #[must_use]
    pub const fn from_epsg(code: u32) -> Self {
        Self(code)
    }

    /// Returns the EPSG code.
    #[must_use]
    pub const fn epsg(self) -> u32 {
        self.0
    }

    /// Returns the OGC URN form used by the legacy `GeoJSON` `crs` member.
    #[must_use]
    pub fn to_urn(self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.0)
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::WGS84
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Error returned when a CRS string cannot be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCrsError {
    /// The string that failed to parse.
    pub value: String,
}

impl std::fmt::Display for InvalidCrsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unrecognized coordinate reference system '{}'", self.value)
    }
}

impl std::error::Error for InvalidCrsError {}

impl FromStr for Crs {
    type Err = InvalidCrsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let err = || InvalidCrsError {
            value: s.to_string(),
        };

        let upper = trimmed.to_ascii_uppercase();
        if upper == "CRS84" || upper.ends_with(":CRS84") {
            return Ok(Self::WGS84);
        }

        // `EPSG:3857`, `urn:ogc:def:crs:EPSG::3857`,
        // `urn:ogc:def:crs:EPSG:6.6:3857` and a bare `3857` all end with
        // the code after the last colon.
        let code = upper.rsplit(':').next().ok_or_else(err)?;
        if upper.contains(':') && !upper.contains("EPSG") {
            return Err(err());
        }

        code.parse::<u32>().map(Self).map_err(|_| err())
    }
}

impl Serialize for Crs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Crs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(code) => Ok(Self(code)),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}
