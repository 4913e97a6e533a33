//! Error types shared by the gridMET crates.

use thiserror::Error;

/// Result type alias using CommonError.
pub type CommonResult<T> = Result<T, CommonError>;

/// Errors raised while parsing shared vocabulary (bands, geographies, filters).
#[derive(Debug, Error)]
pub enum CommonError {
    #[error("Unknown gridMET variable: {0}")]
    UnknownVariable(String),

    #[error("Unknown geography: {0}")]
    UnknownGeography(String),

    #[error("Unknown shape type: {0}")]
    UnknownShape(String),

    #[error("Invalid date filter '{spec}': {message}")]
    InvalidDateFilter { spec: String, message: String },

    #[error("Invalid year specification: {0}")]
    InvalidYears(String),
}

impl CommonError {
    pub fn invalid_filter(spec: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDateFilter {
            spec: spec.into(),
            message: message.into(),
        }
    }
}
