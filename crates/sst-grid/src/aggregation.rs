//! Box aggregation of fine grid cells into coarse cells.
//!
//! A target cell covers an `n x n` block of source cells. The block mean
//! ignores `NaN` samples and is only reported when the fraction of valid
//! samples reaches the minimum coverage.

use rayon::prelude::*;

use crate::error::{GridError, Result};
use crate::geometry::GridGeometry;
use crate::grid::{ArrayGrid, Grid};

/// Running sum and counts over one source block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlockStats {
    /// Sum of valid samples.
    pub sum: f64,
    /// Number of valid (non-`NaN`) samples.
    pub valid: usize,
    /// Number of samples visited.
    pub total: usize,
}

impl BlockStats {
    /// Counts of a block whose samples were accumulated elsewhere.
    pub fn from_counts(valid: usize, total: usize) -> Self {
        Self { sum: 0.0, valid, total }
    }

    /// Add one sample.
    #[inline]
    pub fn push(&mut self, sample: f64) {
        let is_valid = !sample.is_nan();
        self.sum += if is_valid { sample } else { 0.0 };
        self.valid += is_valid as usize;
        self.total += 1;
    }

    /// Fraction of valid samples (0.0 for an empty block).
    #[inline]
    pub fn coverage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.valid as f64 / self.total as f64
        }
    }

    /// Whether the block has any valid sample and reaches `min_coverage`.
    #[inline]
    pub fn passes(&self, min_coverage: f64) -> bool {
        self.valid > 0 && self.coverage() >= min_coverage
    }

    /// Block mean, or `NaN` when the coverage requirement is not met.
    #[inline]
    pub fn mean(&self, min_coverage: f64) -> f64 {
        if self.passes(min_coverage) {
            self.sum / self.valid as f64
        } else {
            f64::NAN
        }
    }
}

/// Collect statistics for the block starting at `(x0, y0)` of size `nx x ny`.
#[inline]
pub fn block_stats<G: Grid + ?Sized>(grid: &G, x0: usize, y0: usize, nx: usize, ny: usize) -> BlockStats {
    let mut stats = BlockStats::default();
    for y in y0..y0 + ny {
        for x in x0..x0 + nx {
            stats.push(grid.sample(x, y));
        }
    }
    stats
}

/// Mean of a flat block of samples subject to `min_coverage`.
pub fn box_average(samples: &[f64], min_coverage: f64) -> f64 {
    let mut stats = BlockStats::default();
    for &sample in samples {
        stats.push(sample);
    }
    stats.mean(min_coverage)
}

/// Aggregate `source` onto `target`, one box average per target cell.
///
/// `source_geometry` must be finer than `target` by an integral factor and
/// match the source grid's dimensions.
pub fn aggregate_grid(
    source: &dyn Grid,
    source_geometry: &GridGeometry,
    target: &GridGeometry,
    min_coverage: f64,
) -> Result<ArrayGrid> {
    if source.width() != source_geometry.width() || source.height() != source_geometry.height() {
        return Err(GridError::dimension_mismatch(
            format!("{}x{}", source_geometry.width(), source_geometry.height()),
            format!("{}x{}", source.width(), source.height()),
        ));
    }
    let n = source_geometry.scale_factor_to(target)?;
    let width = target.width();
    let mut data = vec![f64::NAN; target.cell_count()];

    data.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, value) in row.iter_mut().enumerate() {
                *value = block_stats(source, x * n, y * n, n, n).mean(min_coverage);
            }
        });

    ArrayGrid::new(width, target.height(), data)
}
