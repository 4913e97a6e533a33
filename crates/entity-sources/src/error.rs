//! Error types for entity readers.

use std::path::PathBuf;

use grid_processor::GridProcessorError;
use thiserror::Error;

/// Errors raised while locating or reading entity files.
#[derive(Error, Debug)]
pub enum EntityError {
    /// No shapefile exists for the requested year or any admissible neighbour.
    #[error("no shapefile for {geography}/{shape} near year {year} under {}", root.display())]
    ShapeFileNotFound {
        root: PathBuf,
        year: i32,
        geography: String,
        shape: String,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("shapefile error in {}: {message}", path.display())]
    Shapefile { path: PathBuf, message: String },

    /// A configured column is absent from the file header.
    #[error("column '{column}' not found in {}", path.display())]
    MissingColumn { path: PathBuf, column: String },

    /// A coordinate cell could not be parsed as a number.
    #[error("invalid coordinate '{value}' in column '{column}' at line {line}")]
    InvalidCoordinate {
        column: String,
        value: String,
        line: u64,
    },

    /// None of the label attributes exist on a shapefile record.
    #[error("no label attribute ({fields}) on record {index} of {}", path.display())]
    MissingLabel {
        path: PathBuf,
        index: usize,
        fields: String,
    },
}

impl EntityError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<EntityError> for GridProcessorError {
    fn from(err: EntityError) -> Self {
        GridProcessorError::source(err.to_string())
    }
}

/// Result type for entity readers.
pub type Result<T> = std::result::Result<T, EntityError>;
