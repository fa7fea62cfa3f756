//! Global equirectangular grid geometry.
//!
//! Rows run north to south: `y = 0` is the row touching the north pole and
//! `x = 0` is the column touching the antimeridian at -180°.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

/// Mean Earth radius used for cell distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Tolerance when checking that a resolution divides the globe evenly.
const INTEGRAL_EPSILON: f64 = 1.0e-6;

/// A global lat/lon raster with square cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    resolution: f64,
    width: usize,
    height: usize,
    time: usize,
}

impl GridGeometry {
    /// Create a global grid with the given cell size in degrees.
    ///
    /// Fails when the resolution is not positive or does not divide 180°
    /// into a whole number of rows.
    pub fn global(resolution: f64) -> Result<Self> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::invalid_resolution(
                resolution,
                "resolution must be positive and finite",
            ));
        }
        let rows = 180.0 / resolution;
        if (rows - rows.round()).abs() > INTEGRAL_EPSILON * rows.max(1.0) {
            return Err(GridError::invalid_resolution(
                resolution,
                "180 degrees is not a whole multiple of the resolution",
            ));
        }
        let height = rows.round() as usize;
        Ok(Self {
            resolution,
            width: 2 * height,
            height,
            time: 1,
        })
    }

    /// Create a global grid from its dimensions.
    pub fn from_size(width: usize, height: usize) -> Result<Self> {
        if height == 0 || width != 2 * height {
            return Err(GridError::dimension_mismatch(
                "width == 2 * height > 0",
                format!("{}x{}", width, height),
            ));
        }
        Ok(Self {
            resolution: 180.0 / height as f64,
            width,
            height,
            time: 1,
        })
    }

    /// Return a copy with the given time extent.
    pub fn with_time(mut self, time: usize) -> Self {
        self.time = time;
        self
    }

    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn time(&self) -> usize {
        self.time
    }

    /// Number of cells in one time slice.
    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Row-major index of a cell.
    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Longitude at a continuous column coordinate (0.0 is the west edge).
    pub fn lon(&self, grid_x: f64) -> f64 {
        -180.0 + self.resolution * grid_x
    }

    /// Latitude at a continuous row coordinate (0.0 is the north edge).
    pub fn lat(&self, grid_y: f64) -> f64 {
        (90.0 - self.resolution * grid_y).clamp(-90.0, 90.0)
    }

    pub fn center_lon(&self, x: usize) -> f64 {
        self.lon(x as f64 + 0.5)
    }

    pub fn center_lat(&self, y: usize) -> f64 {
        self.lat(y as f64 + 0.5)
    }

    /// Column containing a longitude, clamped to the grid.
    pub fn grid_x(&self, lon: f64) -> usize {
        let x = ((lon + 180.0) / self.resolution).floor();
        (x.max(0.0) as usize).min(self.width - 1)
    }

    /// Row containing a latitude, clamped to the grid.
    pub fn grid_y(&self, lat: f64) -> usize {
        let y = ((90.0 - lat) / self.resolution).floor();
        (y.max(0.0) as usize).min(self.height - 1)
    }

    /// Great-circle length of the cell diagonal (south-west to north-east corner).
    pub fn cell_diagonal_km(&self, x: usize, y: usize) -> f64 {
        let west = self.lon(x as f64);
        let east = self.lon(x as f64 + 1.0);
        let north = self.lat(y as f64);
        let south = self.lat(y as f64 + 1.0);
        haversine_km(west, south, east, north)
    }

    /// Number of cells of this grid per cell of `target`, along each axis.
    ///
    /// The target must be coarser than (or equal to) this grid and the ratio
    /// must be integral.
    pub fn scale_factor_to(&self, target: &GridGeometry) -> Result<usize> {
        let ratio = target.resolution / self.resolution;
        let factor = ratio.round();
        if factor < 1.0 || (ratio - factor).abs() > INTEGRAL_EPSILON * factor {
            return Err(GridError::invalid_resolution(
                target.resolution,
                format!(
                    "target resolution is not an integral multiple of source resolution {}",
                    self.resolution
                ),
            ));
        }
        Ok(factor as usize)
    }
}

/// Haversine distance between two lon/lat points in degrees.
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = phi2 - phi1;
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
}
