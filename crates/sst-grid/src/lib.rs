//! Global lat/lon grids for SST regridding.
//!
//! This crate provides the raster layer underneath the aggregation engine:
//!
//! - **Geometry**: global equirectangular rasters, cell centers and diagonals
//! - **Views**: scaled integer storage, downscaling, interpolation and flipping,
//!   all composed through the [`Grid`] trait around shared inner grids
//! - **Box aggregation**: `NaN`-aware block means with a minimum coverage
//! - **Region masks**: box and text masks, unions and region-list parsing
//!
//! # Example
//!
//! ```
//! use sst_grid::{aggregate_grid, ArrayGrid, GridGeometry};
//!
//! let source_geometry = GridGeometry::global(1.0).unwrap();
//! let target = GridGeometry::global(5.0).unwrap();
//! let source = ArrayGrid::filled(source_geometry.width(), source_geometry.height(), 290.0);
//!
//! let coarse = aggregate_grid(&source, &source_geometry, &target, 0.5).unwrap();
//! assert_eq!(coarse.data().len(), 72 * 36);
//! ```

pub mod aggregation;
pub mod downscale;
pub mod error;
pub mod flip;
pub mod geometry;
pub mod grid;
pub mod interpolation;
pub mod region;
pub mod scaled;
pub mod types;

// Re-export commonly used types at crate root
pub use aggregation::{aggregate_grid, block_stats, box_average, BlockStats};
pub use downscale::DownscaledGrid;
pub use error::{GridError, Result};
pub use flip::FlippedGrid;
pub use geometry::{haversine_km, GridGeometry, EARTH_RADIUS_KM};
pub use grid::{ArrayGrid, Grid, SharedGrid};
pub use interpolation::{InterpolatedGrid, InterpolationMethod};
pub use region::{parse_region_list, RegionCoverage, RegionMask};
pub use scaled::ScaledArrayGrid;
pub use types::BoundingBox;
