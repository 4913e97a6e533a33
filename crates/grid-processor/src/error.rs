//! Error types for grid processing.

use gridmet_common::BoundingBox;
use thiserror::Error;

/// Errors that can occur while reducing rasters to entities.
#[derive(Error, Debug)]
pub enum GridProcessorError {
    /// No dataset variable carries the requested semantic (standard) name.
    #[error("variable not found in dataset: {0}")]
    VariableNotFound(String),

    /// A coordinate lies outside the raster extent.
    #[error("point ({x}, {y}) is outside raster extent {extent}")]
    OutOfBounds { x: f64, y: f64, extent: BoundingBox },

    /// Cell-center produced a mean where all-touched did not.
    #[error("rasterization inconsistency for '{label}': cell-center mean {center} present but all-touched mean missing")]
    RasterizationInconsistency { label: String, center: f64 },

    /// Failed to read data from the raster dataset.
    #[error("failed to read grid data: {0}")]
    ReadFailed(String),

    /// Invalid metadata in the dataset (transform, shape, time axis).
    #[error("invalid grid metadata: {0}")]
    InvalidMetadata(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Entity source error (points or polygons).
    #[error("entity source error: {0}")]
    Source(String),

    /// Output sink error.
    #[error("output error: {0}")]
    Sink(String),

    /// A worker thread died before delivering its partition.
    #[error("worker failed: {0}")]
    WorkerFailed(String),

    /// The driver was used out of order.
    #[error("invalid job state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },
}

impl GridProcessorError {
    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create an OutOfBounds error.
    pub fn out_of_bounds(x: f64, y: f64, extent: BoundingBox) -> Self {
        Self::OutOfBounds { x, y, extent }
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }

    /// Create a Source error.
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a Sink error.
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }
}

impl From<std::io::Error> for GridProcessorError {
    fn from(err: std::io::Error) -> Self {
        Self::Sink(err.to_string())
    }
}

impl From<csv::Error> for GridProcessorError {
    fn from(err: csv::Error) -> Self {
        Self::Sink(err.to_string())
    }
}

/// Result type for grid processor operations.
pub type Result<T> = std::result::Result<T, GridProcessorError>;
