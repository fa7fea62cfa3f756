//! Interpolation of a coarse grid onto a finer geometry.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::geometry::GridGeometry;
use crate::grid::{Grid, SharedGrid};

/// Interpolation method used when upsampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Value of the source cell containing the target center.
    Nearest,
    /// Weighted mean of the four source cell centers around the target center.
    #[default]
    Bilinear,
}

impl InterpolationMethod {
    /// Parse from string (case-insensitive). Unknown names fall back to bilinear.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "nearest" => Self::Nearest,
            _ => Self::Bilinear,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationMethod::Nearest => "nearest",
            InterpolationMethod::Bilinear => "bilinear",
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Precomputed source position for one target column or row.
#[derive(Debug, Clone, Copy)]
struct Axis {
    lower: usize,
    upper: usize,
    weight: f64,
    nearest: usize,
}

/// Map each target cell center onto source cell-center coordinates.
///
/// The lower corner is clamped to `[0, n - 2]` and the weight to `[0, 1]`, so
/// cells beyond the outermost source centers take the edge value.
fn axis_positions(source_cells: usize, source_res: f64, target_cells: usize, target_res: f64) -> Vec<Axis> {
    let last = source_cells.saturating_sub(1);
    (0..target_cells)
        .map(|t| {
            let s = target_res * (t as f64 + 0.5) / source_res - 0.5;
            let lower = (s.floor().max(0.0) as usize).min(last.saturating_sub(1));
            let upper = (lower + 1).min(last);
            let weight = if upper == lower {
                0.0
            } else {
                (s - lower as f64).clamp(0.0, 1.0)
            };
            let nearest = (s.round().max(0.0) as usize).min(last);
            Axis {
                lower,
                upper,
                weight,
                nearest,
            }
        })
        .collect()
}

/// An inner grid resampled onto a finer geometry.
pub struct InterpolatedGrid {
    inner: SharedGrid,
    method: InterpolationMethod,
    columns: Vec<Axis>,
    rows: Vec<Axis>,
}

impl InterpolatedGrid {
    /// Resample `inner` (laid out as `source`) onto `target`.
    pub fn new(
        inner: SharedGrid,
        source: &GridGeometry,
        target: &GridGeometry,
        method: InterpolationMethod,
    ) -> Result<Self> {
        if inner.width() != source.width() || inner.height() != source.height() {
            return Err(GridError::dimension_mismatch(
                format!("{}x{}", source.width(), source.height()),
                format!("{}x{}", inner.width(), inner.height()),
            ));
        }
        if target.resolution() > source.resolution() {
            return Err(GridError::invalid_resolution(
                target.resolution(),
                format!(
                    "interpolation target must not be coarser than {}",
                    source.resolution()
                ),
            ));
        }
        let columns = axis_positions(
            source.width(),
            source.resolution(),
            target.width(),
            target.resolution(),
        );
        let rows = axis_positions(
            source.height(),
            source.resolution(),
            target.height(),
            target.resolution(),
        );
        Ok(Self {
            inner,
            method,
            columns,
            rows,
        })
    }

    pub fn method(&self) -> InterpolationMethod {
        self.method
    }
}

impl Grid for InterpolatedGrid {
    fn width(&self) -> usize {
        self.columns.len()
    }

    fn height(&self) -> usize {
        self.rows.len()
    }

    fn sample(&self, x: usize, y: usize) -> f64 {
        let col = self.columns[x];
        let row = self.rows[y];
        match self.method {
            InterpolationMethod::Nearest => self.inner.sample(col.nearest, row.nearest),
            InterpolationMethod::Bilinear => {
                let v00 = self.inner.sample(col.lower, row.lower);
                let v10 = self.inner.sample(col.upper, row.lower);
                let v01 = self.inner.sample(col.lower, row.upper);
                let v11 = self.inner.sample(col.upper, row.upper);

                // Any missing corner makes the result missing
                if v00.is_nan() || v10.is_nan() || v01.is_nan() || v11.is_nan() {
                    return f64::NAN;
                }

                let top = v00 * (1.0 - col.weight) + v10 * col.weight;
                let bottom = v01 * (1.0 - col.weight) + v11 * col.weight;
                top * (1.0 - row.weight) + bottom * row.weight
            }
        }
    }
}
