//! Collaborator interfaces consumed by the aggregator.
//!
//! Product decoding, file discovery, climatologies and output formats live
//! outside this crate; they plug in through these traits.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use sst_grid::{ArrayGrid, Grid, GridGeometry, SharedGrid};

use crate::cell::SstDepth;
use crate::error::{RegridError, Result};
use crate::time_step::TimeStep;

/// The decoded grids of one input file at its native resolution.
#[derive(Clone)]
pub struct SourceGrids {
    /// Representative date of the file.
    pub date: NaiveDate,
    /// Native geometry; every grid below must match it.
    pub geometry: GridGeometry,
    /// Measured SST.
    pub measurement: SharedGrid,
    /// Per-pixel random uncertainty.
    pub uncertainty: Option<SharedGrid>,
    /// Per-pixel quality level.
    pub quality: Option<SharedGrid>,
    /// Per-pixel standard deviation feeding the coverage-uncertainty variance.
    pub standard_deviation: Option<SharedGrid>,
    /// Large-scale correlated uncertainty.
    pub large_scale_uncertainty: Option<SharedGrid>,
    /// Uncertainty of the depth/time adjustment.
    pub adjustment_uncertainty: Option<SharedGrid>,
    /// Synoptically correlated uncertainty.
    pub synoptic_uncertainty: Option<SharedGrid>,
    /// Sea-ice area fraction, 0..=1.
    pub sea_ice_fraction: Option<SharedGrid>,
}

impl SourceGrids {
    pub fn new(date: NaiveDate, geometry: GridGeometry, measurement: SharedGrid) -> Self {
        Self {
            date,
            geometry,
            measurement,
            uncertainty: None,
            quality: None,
            standard_deviation: None,
            large_scale_uncertainty: None,
            adjustment_uncertainty: None,
            synoptic_uncertainty: None,
            sea_ice_fraction: None,
        }
    }

    pub fn with_uncertainty(mut self, grid: SharedGrid) -> Self {
        self.uncertainty = Some(grid);
        self
    }

    pub fn with_quality(mut self, grid: SharedGrid) -> Self {
        self.quality = Some(grid);
        self
    }

    pub fn with_standard_deviation(mut self, grid: SharedGrid) -> Self {
        self.standard_deviation = Some(grid);
        self
    }

    pub fn with_large_scale_uncertainty(mut self, grid: SharedGrid) -> Self {
        self.large_scale_uncertainty = Some(grid);
        self
    }

    pub fn with_adjustment_uncertainty(mut self, grid: SharedGrid) -> Self {
        self.adjustment_uncertainty = Some(grid);
        self
    }

    pub fn with_synoptic_uncertainty(mut self, grid: SharedGrid) -> Self {
        self.synoptic_uncertainty = Some(grid);
        self
    }

    pub fn with_sea_ice_fraction(mut self, grid: SharedGrid) -> Self {
        self.sea_ice_fraction = Some(grid);
        self
    }

    /// Check that every grid matches the declared geometry.
    pub fn validate(&self, path: &Path) -> Result<()> {
        let grids = [
            ("measurement", Some(&self.measurement)),
            ("uncertainty", self.uncertainty.as_ref()),
            ("quality", self.quality.as_ref()),
            ("standard_deviation", self.standard_deviation.as_ref()),
            ("large_scale_uncertainty", self.large_scale_uncertainty.as_ref()),
            ("adjustment_uncertainty", self.adjustment_uncertainty.as_ref()),
            ("synoptic_uncertainty", self.synoptic_uncertainty.as_ref()),
            ("sea_ice_fraction", self.sea_ice_fraction.as_ref()),
        ];
        for (name, grid) in grids {
            if let Some(grid) = grid {
                if grid.width() != self.geometry.width() || grid.height() != self.geometry.height() {
                    return Err(RegridError::input_file(
                        path,
                        format!(
                            "{} grid is {}x{}, expected {}x{}",
                            name,
                            grid.width(),
                            grid.height(),
                            self.geometry.width(),
                            self.geometry.height()
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Decodes one input file.
pub trait GridSource: Send + Sync {
    /// Read `path`, taking the measurement from the SST variable of `depth`
    /// (see [`SstDepth::input_variable`]).
    fn read(&self, path: &Path, depth: SstDepth) -> Result<SourceGrids>;
}

/// Lists the input files of a time window.
pub trait FileStore: Send + Sync {
    /// Files whose coverage intersects `[start, end)`, in deterministic order.
    fn files(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<PathBuf>>;
}

/// Reference fields at the input resolution.
pub trait ClimatologyProvider: Send + Sync {
    /// Climatological SST for a day of year (1-based).
    fn reference(&self, day_of_year: u32) -> Result<SharedGrid>;

    /// Fraction of each pixel covered by sea, used as the pixel weight.
    fn sea_coverage(&self) -> Result<SharedGrid>;

    /// Climatological standard deviation, used when the input has none.
    fn standard_deviation(&self, _day_of_year: u32) -> Result<Option<SharedGrid>> {
        Ok(None)
    }
}

/// Reads the raw reference-resolution grid of a LUT file.
pub trait LutRawSource: Send + Sync {
    /// Values equal to `fill_value` must be returned as `NaN`.
    fn read_raw(&self, path: &Path, fill_value: f64) -> Result<ArrayGrid>;
}

/// Consumes finished time steps.
pub trait TimeStepWriter {
    fn write(&mut self, step: &TimeStep) -> Result<()>;
}

impl<F> TimeStepWriter for F
where
    F: FnMut(&TimeStep) -> Result<()>,
{
    fn write(&mut self, step: &TimeStep) -> Result<()> {
        self(step)
    }
}
