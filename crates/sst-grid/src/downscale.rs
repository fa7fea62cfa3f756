//! Lazy box reduction of an inner grid by integer factors.

use crate::aggregation::block_stats;
use crate::error::{GridError, Result};
use crate::geometry::GridGeometry;
use crate::grid::{Grid, SharedGrid};

/// A coarser view of an inner grid.
///
/// Each sample is the mean of a `factor_x x factor_y` block of the inner
/// grid, skipping `NaN`. A block with no valid sample is `NaN`.
pub struct DownscaledGrid {
    inner: SharedGrid,
    factor_x: usize,
    factor_y: usize,
    width: usize,
    height: usize,
}

impl DownscaledGrid {
    /// Wrap `inner`. Both factors must be at least 1 and divide the inner
    /// dimensions evenly.
    pub fn new(inner: SharedGrid, factor_x: usize, factor_y: usize) -> Result<Self> {
        let (inner_width, inner_height) = (inner.width(), inner.height());
        if factor_x == 0
            || factor_y == 0
            || inner_width % factor_x != 0
            || inner_height % factor_y != 0
        {
            return Err(GridError::InvalidScaleFactor {
                factor_x,
                factor_y,
                width: inner_width,
                height: inner_height,
            });
        }
        Ok(Self {
            inner,
            factor_x,
            factor_y,
            width: inner_width / factor_x,
            height: inner_height / factor_y,
        })
    }

    /// Downscale from `source` geometry to the coarser `target` geometry.
    pub fn to(inner: SharedGrid, source: &GridGeometry, target: &GridGeometry) -> Result<Self> {
        let factor = source.scale_factor_to(target)?;
        Self::new(inner, factor, factor)
    }

    pub fn factors(&self) -> (usize, usize) {
        (self.factor_x, self.factor_y)
    }
}

impl Grid for DownscaledGrid {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn sample(&self, x: usize, y: usize) -> f64 {
        block_stats(
            &self.inner,
            x * self.factor_x,
            y * self.factor_y,
            self.factor_x,
            self.factor_y,
        )
        .mean(0.0)
    }
}
