//! The `Grid` sample-source trait and the in-memory `ArrayGrid`.
//!
//! Derived views (scaling, downscaling, interpolation, flipping) wrap an
//! inner grid through [`SharedGrid`] so a single raster can back many views.

use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{GridError, Result};

/// Read-only access to a 2D raster of physical values.
///
/// Missing data is reported as `NaN`.
pub trait Grid: Send + Sync {
    /// Number of columns.
    fn width(&self) -> usize;

    /// Number of rows.
    fn height(&self) -> usize;

    /// Physical value at a cell. Callers must stay within bounds.
    fn sample(&self, x: usize, y: usize) -> f64;

    /// Integer view of a cell, used for quality flags. `NaN` maps to `None`.
    fn sample_int(&self, x: usize, y: usize) -> Option<i64> {
        let value = self.sample(x, y);
        if value.is_nan() {
            None
        } else {
            Some(value.round() as i64)
        }
    }
}

/// A grid shared between several views.
pub type SharedGrid = Arc<dyn Grid>;

impl<G: Grid + ?Sized> Grid for Arc<G> {
    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }

    #[inline]
    fn sample(&self, x: usize, y: usize) -> f64 {
        (**self).sample(x, y)
    }

    fn sample_int(&self, x: usize, y: usize) -> Option<i64> {
        (**self).sample_int(x, y)
    }
}

impl<G: Grid + ?Sized> Grid for &G {
    fn width(&self) -> usize {
        (**self).width()
    }

    fn height(&self) -> usize {
        (**self).height()
    }

    #[inline]
    fn sample(&self, x: usize, y: usize) -> f64 {
        (**self).sample(x, y)
    }

    fn sample_int(&self, x: usize, y: usize) -> Option<i64> {
        (**self).sample_int(x, y)
    }
}

/// Row-major in-memory raster of `f64` values.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayGrid {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl ArrayGrid {
    /// Wrap row-major data. The data length must equal `width * height`.
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Result<Self> {
        if data.len() != width * height {
            return Err(GridError::dimension_mismatch(
                format!("{} values for a {}x{} grid", width * height, width, height),
                format!("{} values", data.len()),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A grid with every cell set to `value`.
    pub fn filled(width: usize, height: usize, value: f64) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Evaluate every cell of `source` once and store the result.
    ///
    /// Rows are evaluated in parallel; this is how lazy view chains are
    /// collapsed into a single lookup table.
    pub fn from_grid(source: &dyn Grid) -> Self {
        let width = source.width();
        let height = source.height();
        let mut data = vec![f64::NAN; width * height];

        if width > 0 {
            data.par_chunks_mut(width)
                .enumerate()
                .for_each(|(y, row)| {
                    for (x, value) in row.iter_mut().enumerate() {
                        *value = source.sample(x, y);
                    }
                });
        }

        Self {
            width,
            height,
            data,
        }
    }

    /// Get the value at a cell, or `None` outside the grid.
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.width + x).copied()
    }

    /// Set the value at a cell. Out-of-bounds writes are ignored.
    pub fn set(&mut self, x: usize, y: usize, value: f64) {
        if x < self.width && y < self.height {
            self.data[y * self.width + x] = value;
        }
    }

    /// The row-major values.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Number of non-`NaN` cells.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !v.is_nan()).count()
    }

    /// Wrap in an `Arc` for use as the inner grid of views.
    pub fn into_shared(self) -> SharedGrid {
        Arc::new(self)
    }
}

impl Grid for ArrayGrid {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn sample(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }
}
