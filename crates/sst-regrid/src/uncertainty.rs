//! Coverage (sampling) uncertainty from decorrelation length scales.
//!
//! ```text
//! r_space = (x0_space / d) * (1 - exp(-d / x0_space))        d: cell diagonal in km
//! r_time  = (x0_time / t) * (1 - exp(-t / x0_time))          t: window length in days, 1 if t == 0
//! r_bar   = clamp(r_space * r_time, 0, 1)
//! u       = sqrt(a * r_bar * (1 - r_bar) / (1 + (N - 1) * r_bar))
//! ```
//!
//! Non-positive length scales mark missing LUT entries and yield `NaN`.
//!
//! Synoptically correlated and adjustment uncertainties are reduced by the
//! effective number of independent synoptic areas in a cell:
//!
//! ```text
//! r   = exp(-0.5 * (dxy / 100 km + dt))    dxy, dt: mean synoptic separation
//! eta = N / (1 + r * (N - 1))
//! u   = a / eta
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use sst_grid::GridGeometry;

use crate::error::{RegridError, Result};
use crate::lut::Lut;
use crate::resolution::TemporalResolution;

/// Average correlation factors of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationFactors {
    pub r_space: f64,
    pub r_time: f64,
    pub r_bar: f64,
}

/// Spatial and temporal correlation factors for one cell.
///
/// `r_space` is `NaN` unless `x0_space > 0`; `r_time` likewise for
/// `x0_time` on windows longer than a day.
pub fn correlation_factors(x0_space: f64, diagonal_km: f64, x0_time: f64, time_span_days: f64) -> CorrelationFactors {
    let r_space = if x0_space > 0.0 {
        (x0_space / diagonal_km) * (1.0 - (-diagonal_km / x0_space).exp())
    } else {
        f64::NAN
    };
    let r_time = if time_span_days == 0.0 {
        1.0
    } else if x0_time > 0.0 {
        (x0_time / time_span_days) * (1.0 - (-time_span_days / x0_time).exp())
    } else {
        f64::NAN
    };
    CorrelationFactors {
        r_space,
        r_time,
        r_bar: (r_space * r_time).clamp(0.0, 1.0),
    }
}

/// Coverage uncertainty for a cell with `n` samples and mean input variance `a`.
///
/// Returns `NaN` for an empty cell, a non-positive length scale or any
/// missing input.
pub fn coverage_uncertainty(
    x0_space: f64,
    diagonal_km: f64,
    x0_time: f64,
    time_span_days: f64,
    n: u64,
    a: f64,
) -> f64 {
    if n == 0 {
        return f64::NAN;
    }
    let r_bar = correlation_factors(x0_space, diagonal_km, x0_time, time_span_days).r_bar;
    (a * r_bar * (1.0 - r_bar) / (1.0 + (n as f64 - 1.0) * r_bar)).sqrt()
}

/// Length of a window in days as used for `r_time`; zero for daily windows.
pub fn time_span_days(resolution: TemporalResolution, start: NaiveDate, end: NaiveDate) -> f64 {
    match resolution {
        TemporalResolution::Daily => 0.0,
        _ => (end - start).num_days() as f64,
    }
}

/// The uncertainty model of one aggregation window.
#[derive(Debug, Clone)]
pub struct CoverageUncertaintyModel {
    space_lut: Arc<Lut>,
    time_lut: Arc<Lut>,
    geometry: GridGeometry,
    time_span_days: f64,
}

impl CoverageUncertaintyModel {
    /// Both LUTs must be laid out on `geometry`.
    pub fn new(space_lut: Arc<Lut>, time_lut: Arc<Lut>, geometry: GridGeometry, time_span_days: f64) -> Result<Self> {
        for lut in [&space_lut, &time_lut] {
            if lut.geometry() != &geometry {
                return Err(RegridError::lut(
                    lut.path(),
                    format!(
                        "LUT is {}x{}, target grid is {}x{}",
                        lut.geometry().width(),
                        lut.geometry().height(),
                        geometry.width(),
                        geometry.height()
                    ),
                ));
            }
        }
        Ok(Self {
            space_lut,
            time_lut,
            geometry,
            time_span_days,
        })
    }

    /// Model for the window `[start, end)` at `resolution`.
    pub fn for_window(
        space_lut: Arc<Lut>,
        time_lut: Arc<Lut>,
        geometry: GridGeometry,
        resolution: TemporalResolution,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self> {
        Self::new(space_lut, time_lut, geometry, time_span_days(resolution, start, end))
    }

    pub fn time_span_days(&self) -> f64 {
        self.time_span_days
    }

    /// Coverage uncertainty of cell `(x, y)` with `n` samples and mean variance `a`.
    pub fn calculate(&self, x: usize, y: usize, n: u64, a: f64) -> f64 {
        coverage_uncertainty(
            self.space_lut.value(x, y),
            self.geometry.cell_diagonal_km(x, y),
            self.time_lut.value(x, y),
            self.time_span_days,
            n,
            a,
        )
    }
}

/// Correlation length of synoptic features (km).
pub const SYNOPTIC_LENGTH_KM: f64 = 100.0;

/// Reduction of synoptically correlated uncertainties on one output grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynopticUncertaintyModel {
    resolution: f64,
    separation_days: f64,
}

impl SynopticUncertaintyModel {
    /// Model for cells of `resolution` degrees over `temporal` windows.
    pub fn new(resolution: f64, temporal: TemporalResolution) -> Self {
        Self {
            resolution,
            separation_days: synoptic_separation_days(resolution, temporal),
        }
    }

    /// Mean separation (km) of synoptic areas in target row `y`.
    pub fn separation_km(&self, y: usize) -> f64 {
        let res = self.resolution;
        if res <= 0.05 {
            return 0.0;
        }
        let d_pole = 37.2069 * res - 0.101691;
        let d_equator = 57.8881 * res + 0.272744;
        let lat = 90.0 - res * (y as f64 + 0.5);
        let f = lat.abs() / 90.0;
        d_pole * f + d_equator * (1.0 - f)
    }

    /// Mean separation (days) of synoptic events within one window.
    pub fn separation_days(&self) -> f64 {
        self.separation_days
    }

    fn correlation(&self, y: usize) -> f64 {
        (-0.5 * (self.separation_km(y) / SYNOPTIC_LENGTH_KM + self.separation_days)).exp()
    }

    /// Effective number of independent synoptic areas among `n` samples.
    pub fn effective_samples(&self, y: usize, n: u64) -> f64 {
        let n = n as f64;
        n / (1.0 + self.correlation(y) * (n - 1.0))
    }

    /// Reduce the accumulated uncertainty `a` of a row-`y` cell with `n`
    /// samples. `NaN` for an empty cell.
    pub fn calculate(&self, y: usize, n: u64, a: f64) -> f64 {
        if n == 0 {
            return f64::NAN;
        }
        a / self.effective_samples(y, n)
    }
}

fn synoptic_separation_days(res: f64, temporal: TemporalResolution) -> f64 {
    match temporal {
        TemporalResolution::Weekly5d if res <= 1.5 => 2.0,
        TemporalResolution::Weekly7d if res <= 1.75 => 2.0,
        TemporalResolution::Weekly5d | TemporalResolution::Weekly7d if res <= 2.5 => 1.0,
        TemporalResolution::Monthly => {
            const STEPS: [(f64, f64); 10] = [
                (0.5, 10.0),
                (0.75, 9.0),
                (0.8, 8.5),
                (1.0, 6.0),
                (1.2, 3.5),
                (1.25, 3.0),
                (2.0, 0.5),
                (2.25, 0.25),
                (2.5, 0.2),
                (3.0, 0.1),
            ];
            STEPS
                .iter()
                .find(|(max_res, _)| res <= *max_res)
                .map_or(0.0, |(_, days)| *days)
        }
        _ => 0.0,
    }
}

/// Every per-window uncertainty model a spatial cell is finalized with.
#[derive(Debug, Clone)]
pub struct WindowUncertainty {
    pub coverage: CoverageUncertaintyModel,
    pub synoptic: SynopticUncertaintyModel,
}

impl WindowUncertainty {
    /// Models for the window `[start, end)` at `resolution`.
    pub fn for_window(
        space_lut: Arc<Lut>,
        time_lut: Arc<Lut>,
        geometry: GridGeometry,
        resolution: TemporalResolution,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self> {
        Ok(Self {
            coverage: CoverageUncertaintyModel::for_window(space_lut, time_lut, geometry, resolution, start, end)?,
            synoptic: SynopticUncertaintyModel::new(geometry.resolution(), resolution),
        })
    }
}
