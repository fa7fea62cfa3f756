//! Vertical flip view.

use crate::grid::{Grid, SharedGrid};

/// Reverses the row order of an inner grid: row `y` reads row `height - 1 - y`.
pub struct FlippedGrid {
    inner: SharedGrid,
}

impl FlippedGrid {
    pub fn new(inner: SharedGrid) -> Self {
        Self { inner }
    }
}

impl Grid for FlippedGrid {
    fn width(&self) -> usize {
        self.inner.width()
    }

    fn height(&self) -> usize {
        self.inner.height()
    }

    #[inline]
    fn sample(&self, x: usize, y: usize) -> f64 {
        self.inner.sample(x, self.inner.height() - 1 - y)
    }

    fn sample_int(&self, x: usize, y: usize) -> Option<i64> {
        self.inner.sample_int(x, self.inner.height() - 1 - y)
    }
}
