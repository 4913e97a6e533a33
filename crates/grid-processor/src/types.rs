//! Core types for grid processing.

use std::sync::Arc;

use chrono::NaiveDate;
use geo::{MultiPoint, MultiPolygon};
use serde::{Deserialize, Serialize};

use crate::error::{GridProcessorError, Result};

/// Six-coefficient affine transform between (column, row) and (x, y).
///
/// ```text
/// x = a * col + b * row + c
/// y = d * col + e * row + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    /// Create a transform from its six coefficients.
    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// The identity transform: column maps to x, row maps to y.
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0, 1.0, 0.0)
    }

    /// Axis-aligned transform from an origin and cell sizes.
    pub fn from_origin(x0: f64, y0: f64, dx: f64, dy: f64) -> Self {
        Self::new(dx, 0.0, x0, 0.0, dy, y0)
    }

    /// Map fractional (col, row) to (x, y).
    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    fn determinant(&self) -> f64 {
        self.a * self.e - self.b * self.d
    }

    /// Whether the transform can be inverted.
    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det.is_finite() && det != 0.0
    }

    /// Map (x, y) back to fractional (col, row).
    pub fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !self.is_invertible() {
            return Err(GridProcessorError::invalid_metadata(format!(
                "affine transform is not invertible: {:?}",
                self
            )));
        }
        let det = self.determinant();
        let dx = x - self.c;
        let dy = y - self.f;
        let col = (self.e * dx - self.b * dy) / det;
        let row = (-self.d * dx + self.a * dy) / det;
        Ok((col, row))
    }

    /// Convert an edge-registered transform (index maps to the cell's corner)
    /// into a sample-registered one (index maps to the cell's center).
    pub fn sample_registered(&self) -> Self {
        Self {
            c: self.c + self.a / 2.0 + self.b / 2.0,
            f: self.f + self.d / 2.0 + self.e / 2.0,
            ..*self
        }
    }

    /// Transform for a grid refined by `factor` in both directions.
    pub fn refined(&self, factor: usize) -> Self {
        let k = factor as f64;
        Self {
            a: self.a / k,
            b: self.b / k,
            d: self.d / k,
            e: self.e / k,
            ..*self
        }
    }
}

impl Default for Affine {
    fn default() -> Self {
        Self::identity()
    }
}

/// Masking status of the four corners of a bilinear window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskState {
    /// All four corners carry valid data.
    Unmasked,
    /// Some corners are invalid; `fallback` is the (row, col) of the
    /// valid corner nearest the point.
    PartiallyMasked { fallback: (isize, isize) },
    /// No corner carries valid data.
    CompletelyMasked,
}

impl MaskState {
    pub fn is_completely_masked(&self) -> bool {
        matches!(self, MaskState::CompletelyMasked)
    }
}

/// Which cells belong to a polygon when computing a zonal mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RasterizationStrategy {
    /// Cells whose center lies inside the polygon.
    #[default]
    CellCenter,
    /// Cells whose interior the polygon overlaps.
    AllTouched,
    /// Average of the cell-center and all-touched means.
    Combined,
    /// Refine the grid by `factor` and take a cell-center mean on the fine grid.
    Downscale { factor: usize },
}

impl RasterizationStrategy {
    /// Factor used by the downscale strategy when none is given.
    pub const DEFAULT_DOWNSCALE_FACTOR: usize = 5;
}

impl std::str::FromStr for RasterizationStrategy {
    type Err = GridProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_lowercase().replace('_', "-");
        match s.as_str() {
            "cell-center" | "center" | "default" => Ok(Self::CellCenter),
            "all-touched" | "touched" => Ok(Self::AllTouched),
            "combined" => Ok(Self::Combined),
            "downscale" => Ok(Self::Downscale {
                factor: Self::DEFAULT_DOWNSCALE_FACTOR,
            }),
            other => match other.strip_prefix("downscale:") {
                Some(factor) => factor
                    .parse::<usize>()
                    .ok()
                    .filter(|f| *f > 0)
                    .map(|factor| Self::Downscale { factor })
                    .ok_or_else(|| {
                        GridProcessorError::ConfigError(format!(
                            "invalid downscale factor '{}'",
                            factor
                        ))
                    }),
                None => Err(GridProcessorError::ConfigError(format!(
                    "unknown rasterization strategy '{}'",
                    other
                ))),
            },
        }
    }
}

/// What to do with a point that falls outside the raster extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfBoundsPolicy {
    /// Abort the job.
    #[default]
    Fail,
    /// Drop the point with a warning.
    Skip,
}

impl std::str::FromStr for OutOfBoundsPolicy {
    type Err = GridProcessorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            other => Err(GridProcessorError::ConfigError(format!(
                "unknown out-of-bounds policy '{}'",
                other
            ))),
        }
    }
}

/// A point entity: a coordinate plus pass-through metadata columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PointEntity {
    pub x: f64,
    pub y: f64,
    pub metadata: Vec<String>,
}

impl PointEntity {
    pub fn new(x: f64, y: f64, metadata: Vec<String>) -> Self {
        Self { x, y, metadata }
    }
}

/// Geometry of a shapefile entity.
#[derive(Debug, Clone)]
pub enum ZoneGeometry {
    /// Areas averaged according to the rasterization strategy.
    Area(MultiPolygon<f64>),
    /// Sites that take the value of the cell containing them.
    Sites(MultiPoint<f64>),
}

/// A shapefile entity (zip code, county) identified by its label.
#[derive(Debug, Clone)]
pub struct PolygonEntity {
    pub label: String,
    pub geometry: ZoneGeometry,
}

impl PolygonEntity {
    pub fn new(label: impl Into<String>, geometry: impl Into<MultiPolygon<f64>>) -> Self {
        Self {
            label: label.into(),
            geometry: ZoneGeometry::Area(geometry.into()),
        }
    }

    /// Entity represented by point sites, as in ZIP point shapefiles.
    pub fn sites(label: impl Into<String>, sites: impl Into<MultiPoint<f64>>) -> Self {
        Self {
            label: label.into(),
            geometry: ZoneGeometry::Sites(sites.into()),
        }
    }
}

/// One output row: value, date, and the entity's label columns.
///
/// A `None` value means no valid data contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationRecord {
    pub value: Option<f64>,
    pub date: NaiveDate,
    pub label: Arc<[String]>,
}

impl AggregationRecord {
    pub fn new(value: Option<f64>, date: NaiveDate, label: Arc<[String]>) -> Self {
        Self { value, date, label }
    }

    /// Render the row as string fields in output column order.
    pub fn to_fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(2 + self.label.len());
        fields.push(format_value(self.value));
        fields.push(self.date.format("%Y-%m-%d").to_string());
        fields.extend(self.label.iter().cloned());
        fields
    }
}

/// Format a value for output; missing values render as an empty field.
///
/// Finite values are written in plain decimal notation with the shortest
/// digits that round-trip, and always carry a fractional part.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => {
            let mut text = v.to_string();
            if !text.contains('.') {
                text.push_str(".0");
            }
            text
        }
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub memory_bytes: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
