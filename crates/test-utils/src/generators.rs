//! Test data generators for synthetic SST-like grids.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use sst_grid::{ArrayGrid, GridGeometry};

/// Creates a global SST field in Kelvin.
///
/// Warm at the equator (~302K), cold towards the poles (~271K), with a
/// small zonal wave so neighbouring columns differ.
pub fn create_sst_grid(geometry: &GridGeometry) -> ArrayGrid {
    let mut grid = ArrayGrid::filled(geometry.width(), geometry.height(), 0.0);
    for y in 0..geometry.height() {
        let lat = geometry.center_lat(y).to_radians();
        for x in 0..geometry.width() {
            let lon = geometry.center_lon(x).to_radians();
            grid.set(x, y, 271.0 + 31.0 * lat.cos().powi(2) + 0.5 * (3.0 * lon).sin());
        }
    }
    grid
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(geometry: &GridGeometry, value: f64) -> ArrayGrid {
    ArrayGrid::filled(geometry.width(), geometry.height(), value)
}

/// Creates a constant grid with `NaN` at the given `(col, row)` positions.
///
/// Positions outside the grid are ignored.
pub fn create_grid_with_nans(geometry: &GridGeometry, value: f64, nan_positions: &[(usize, usize)]) -> ArrayGrid {
    let mut grid = create_constant_grid(geometry, value);
    for &(col, row) in nan_positions {
        if col < geometry.width() && row < geometry.height() {
            grid.set(col, row, f64::NAN);
        }
    }
    grid
}

/// Creates a grid where roughly `fraction` of the cells are `NaN`.
///
/// The pattern is deterministic for a given seed.
pub fn create_sparse_grid(geometry: &GridGeometry, value: f64, fraction: f64, seed: u32) -> ArrayGrid {
    let mut grid = create_constant_grid(geometry, value);
    for y in 0..geometry.height() {
        for x in 0..geometry.width() {
            let hash = simple_hash(x as u32, y as u32, seed);
            if (hash % 10_000) as f64 / 10_000.0 < fraction {
                grid.set(x, y, f64::NAN);
            }
        }
    }
    grid
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}
