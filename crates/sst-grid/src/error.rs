//! Error types for grid construction and region masks.

use thiserror::Error;

/// Errors that can occur while building grids, grid views or region masks.
#[derive(Error, Debug)]
pub enum GridError {
    /// The resolution does not describe a global equirectangular raster.
    #[error("invalid grid resolution {resolution}: {reason}")]
    InvalidResolution { resolution: f64, reason: String },

    /// Two grids (or a grid and its data) disagree on their dimensions.
    #[error("grid dimension mismatch: expected {expected}, found {actual}")]
    DimensionMismatch { expected: String, actual: String },

    /// A downscale factor does not evenly divide the inner grid.
    #[error("invalid scale factor {factor_x}x{factor_y} for a {width}x{height} grid")]
    InvalidScaleFactor {
        factor_x: usize,
        factor_y: usize,
        width: usize,
        height: usize,
    },

    /// Scale or offset of a quantized grid cannot be inverted.
    #[error("invalid quantization (scale {scale}, offset {offset}): {reason}")]
    InvalidQuantization { scale: f64, offset: f64, reason: String },

    /// A region definition is malformed.
    #[error("invalid region '{name}': {reason}")]
    InvalidRegion { name: String, reason: String },

    /// An entry of a region list could not be parsed.
    #[error("illegal region entry {entry}: {reason}")]
    RegionParse { entry: usize, reason: String },

    /// Reading a mask file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GridError {
    /// Create an InvalidResolution error.
    pub fn invalid_resolution(resolution: f64, reason: impl Into<String>) -> Self {
        Self::InvalidResolution {
            resolution,
            reason: reason.into(),
        }
    }

    /// Create a DimensionMismatch error.
    pub fn dimension_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an InvalidQuantization error.
    pub fn invalid_quantization(scale: f64, offset: f64, reason: impl Into<String>) -> Self {
        Self::InvalidQuantization {
            scale,
            offset,
            reason: reason.into(),
        }
    }

    /// Create an InvalidRegion error.
    pub fn invalid_region(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRegion {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a RegionParse error.
    pub fn region_parse(entry: usize, reason: impl Into<String>) -> Self {
        Self::RegionParse {
            entry,
            reason: reason.into(),
        }
    }
}

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;
