//! Error types for NetCDF parsing operations.

use grid_processor::GridProcessorError;
use thiserror::Error;

/// Result type for NetCDF parser operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Error types for NetCDF parsing.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Missing required variable, dimension or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

impl From<NetCdfError> for GridProcessorError {
    fn from(err: NetCdfError) -> Self {
        match err {
            NetCdfError::IoError(e) => GridProcessorError::read_failed(e.to_string()),
            NetCdfError::MissingData(msg) => GridProcessorError::invalid_metadata(msg),
            NetCdfError::InvalidFormat(msg) => GridProcessorError::read_failed(msg),
        }
    }
}
