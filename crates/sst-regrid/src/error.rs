//! Error types for the regridding engine.

use std::path::Path;

use sst_grid::GridError;
use thiserror::Error;

/// Errors that can occur during a regridding run.
#[derive(Error, Debug)]
pub enum RegridError {
    /// A configuration parameter is invalid. Aborts the run.
    #[error("invalid configuration parameter '{parameter}': {reason}")]
    Configuration { parameter: String, reason: String },

    /// A coverage-uncertainty lookup table could not be read or transformed.
    #[error("cannot build LUT from '{path}': {reason}")]
    Lut { path: String, reason: String },

    /// A single input file could not be read or decoded.
    #[error("cannot process input file '{path}': {reason}")]
    InputFile { path: String, reason: String },

    /// Grid construction failed.
    #[error("grid error: {0}")]
    Grid(#[from] GridError),

    /// Writing a time step failed.
    #[error("output error: {0}")]
    Output(String),

    /// The run was cancelled through its token.
    #[error("aggregation cancelled")]
    Cancelled,

    /// Configuration file could not be parsed.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegridError {
    /// Create a Configuration error.
    pub fn configuration(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    /// Create a Lut error.
    pub fn lut(path: &Path, reason: impl Into<String>) -> Self {
        Self::Lut {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Create an InputFile error.
    pub fn input_file(path: &Path, reason: impl Into<String>) -> Self {
        Self::InputFile {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }

    /// Create an Output error.
    pub fn output(reason: impl Into<String>) -> Self {
        Self::Output(reason.into())
    }

    /// Whether a failure while processing one input file only affects that file.
    ///
    /// Recoverable errors are logged and the file is skipped; everything else
    /// aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RegridError::InputFile { .. } | RegridError::Grid(_) | RegridError::Io(_)
        )
    }
}

/// Result type for regridding operations.
pub type Result<T> = std::result::Result<T, RegridError>;
