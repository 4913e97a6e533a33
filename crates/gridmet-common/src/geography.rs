//! Geography and shape kinds the pipeline aggregates over.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommonError;

/// The kind of geographic area values are aggregated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Geography {
    Zip,
    County,
}

impl Geography {
    pub const ALL: [Geography; 2] = [Geography::Zip, Geography::County];

    pub fn as_str(&self) -> &'static str {
        match self {
            Geography::Zip => "zip",
            Geography::County => "county",
        }
    }

    /// Attribute columns that hold the entity label in shapefiles, in order of preference.
    pub fn label_fields(&self) -> &'static [&'static str] {
        match self {
            Geography::Zip => &["ZIP", "ZCTA5CE10", "ZCTA5CE20"],
            Geography::County => &["FIPS", "GEOID", "GEOID10", "GEOID20"],
        }
    }
}

impl fmt::Display for Geography {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Geography {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zip" | "zcta" => Ok(Geography::Zip),
            "county" => Ok(Geography::County),
            _ => Err(CommonError::UnknownGeography(s.to_string())),
        }
    }
}

/// Entity geometry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Point,
    Polygon,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Point => "point",
            Shape::Polygon => "polygon",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shape {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "point" => Ok(Shape::Point),
            "polygon" => Ok(Shape::Polygon),
            _ => Err(CommonError::UnknownShape(s.to_string())),
        }
    }
}
