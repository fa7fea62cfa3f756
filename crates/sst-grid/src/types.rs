//! Geographic bounding boxes.

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

/// A lon/lat box given by its edges in degrees.
///
/// `west > east` describes a box crossing the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub north: f64,
    pub east: f64,
    pub south: f64,
}

impl BoundingBox {
    /// Create a new bounding box, edges in `W, N, E, S` order.
    pub fn new(west: f64, north: f64, east: f64, south: f64) -> Self {
        Self {
            west,
            north,
            east,
            south,
        }
    }

    /// Check that the edges are finite, within range and `north >= south`.
    pub fn validate(&self, name: &str) -> Result<()> {
        let edges = [self.west, self.north, self.east, self.south];
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(GridError::invalid_region(name, "box edges must be finite"));
        }
        if !(-180.0..=180.0).contains(&self.west) || !(-180.0..=180.0).contains(&self.east) {
            return Err(GridError::invalid_region(
                name,
                format!("longitudes must be within [-180, 180], got {} and {}", self.west, self.east),
            ));
        }
        if !(-90.0..=90.0).contains(&self.north) || !(-90.0..=90.0).contains(&self.south) {
            return Err(GridError::invalid_region(
                name,
                format!("latitudes must be within [-90, 90], got {} and {}", self.north, self.south),
            ));
        }
        if self.north < self.south {
            return Err(GridError::invalid_region(
                name,
                format!("north ({}) is south of south ({})", self.north, self.south),
            ));
        }
        Ok(())
    }

    /// Whether the box wraps across the antimeridian.
    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// Check if a point lies in the box (edges inclusive).
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if lat < self.south || lat > self.north {
            return false;
        }
        if self.crosses_antimeridian() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        }
    }

    /// Longitudinal extent in degrees.
    pub fn width(&self) -> f64 {
        if self.crosses_antimeridian() {
            360.0 - (self.west - self.east)
        } else {
            self.east - self.west
        }
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        // Global coverage
        Self::new(-180.0, 90.0, 180.0, -90.0)
    }
}
