//! Spatio-temporal aggregation of input files onto the target grid.
//!
//! Base resolutions (daily, 5/7-day, monthly) box-average every file of a
//! window into spatial cells. Composite resolutions (seasonal, annual) run
//! the monthly aggregation for each month and fold the monthly results into
//! temporal cells.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use sst_grid::{BlockStats, Grid, GridGeometry, SharedGrid};
use tracing::{debug, info, warn};

use crate::cell::{AggregationCell, CellInput, CellKind, CellResults, PixelSample};
use crate::cell_grid::CellGrid;
use crate::context::RunContext;
use crate::error::{RegridError, Result};
use crate::resolution::TemporalResolution;
use crate::sources::{ClimatologyProvider, FileStore, GridSource, SourceGrids, TimeStepWriter};
use crate::time_step::TimeStep;
use crate::uncertainty::WindowUncertainty;

/// Drives a regridding run over a date range.
pub struct RegriddingAggregator {
    context: RunContext,
    file_store: Arc<dyn FileStore>,
    grid_source: Arc<dyn GridSource>,
    climatology: Option<Arc<dyn ClimatologyProvider>>,
}

impl RegriddingAggregator {
    pub fn new(context: RunContext, file_store: Arc<dyn FileStore>, grid_source: Arc<dyn GridSource>) -> Self {
        Self {
            context,
            file_store,
            grid_source,
            climatology: None,
        }
    }

    /// Enable anomalies, sea-coverage weights and climatological variance.
    pub fn with_climatology(mut self, climatology: Arc<dyn ClimatologyProvider>) -> Self {
        self.climatology = Some(climatology);
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Aggregate `[start, end)` and collect every produced time step.
    pub fn aggregate(&self, start: NaiveDate, end: NaiveDate, resolution: TemporalResolution) -> Result<Vec<TimeStep>> {
        let mut steps = Vec::new();
        self.run(start, end, resolution, &mut |step: TimeStep| steps.push(step))?;
        Ok(steps)
    }

    /// Aggregate `[start, end)` and hand each time step to `writer` as soon
    /// as it is finished.
    ///
    /// A failing write is logged and the run continues. Returns the number
    /// of time steps produced.
    pub fn aggregate_into(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        resolution: TemporalResolution,
        writer: &mut dyn TimeStepWriter,
    ) -> Result<usize> {
        self.run(start, end, resolution, &mut |step: TimeStep| {
            if let Err(e) = writer.write(&step) {
                warn!(
                    start = %step.start(),
                    end = %step.end(),
                    error = %e,
                    "Failed to write time step, continuing"
                );
            }
        })
    }

    fn run(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        resolution: TemporalResolution,
        sink: &mut dyn FnMut(TimeStep),
    ) -> Result<usize> {
        if end <= start {
            return Err(RegridError::configuration(
                "end_date",
                format!("{} is not after start date {}", end, start),
            ));
        }

        let cancel = self.context.cancellation_token();
        let started = Instant::now();
        let mut produced = 0usize;
        let mut date1 = start;

        while date1 < end {
            cancel.check()?;
            let date2 = resolution.advance(date1);

            let cells = if resolution.is_composite() {
                self.aggregate_composite(date1, date2, resolution)?
            } else {
                self.aggregate_window(date1, date2, resolution)?
            };

            if let Some(mut cells) = cells {
                let config = self.context.config();
                let rejected = cells.retain(|c| c.within_total_uncertainty(config.max_total_uncertainty));
                if rejected > 0 {
                    debug!(
                        start = %date1,
                        rejected = rejected,
                        max_total_uncertainty = config.max_total_uncertainty,
                        "Dropped cells above total uncertainty limit"
                    );
                }
                info!(start = %date1, end = %date2, cells = cells.len(), "Time step finished");
                sink(TimeStep::new(date1, date2, cells).with_outputs(config.sst_depth, config.total_uncertainty));
                produced += 1;
            }
            date1 = date2;
        }

        info!(
            start = %start,
            end = %end,
            resolution = %resolution,
            steps = produced,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregation finished"
        );
        Ok(produced)
    }

    /// One base-resolution window. `None` when no file contributed.
    fn aggregate_window(
        &self,
        date1: NaiveDate,
        date2: NaiveDate,
        resolution: TemporalResolution,
    ) -> Result<Option<CellGrid<CellResults>>> {
        let files = self.file_store.files(date1, date2)?;
        if files.is_empty() {
            warn!(start = %date1, end = %date2, "No matching files, skipping time step");
            return Ok(None);
        }

        info!(start = %date1, end = %date2, files = files.len(), "Aggregating time step");

        let cancel = self.context.cancellation_token();
        let mut cells: CellGrid<AggregationCell> = CellGrid::new(*self.context.target());

        for path in &files {
            cancel.check()?;
            match self.process_file(path, &mut cells) {
                Ok(_) => {}
                Err(e) if e.is_recoverable() => {
                    warn!(path = %path.display(), error = %e, "Failed to process input file, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        if cells.is_empty() {
            warn!(start = %date1, end = %date2, files = files.len(), "No valid data in time step, skipping");
            return Ok(None);
        }

        let models = WindowUncertainty::for_window(
            Arc::clone(self.context.space_lut()),
            Arc::clone(self.context.time_lut()),
            *self.context.target(),
            resolution,
            date1,
            date2,
        )?;
        Ok(Some(cells.map(|cell| cell.results(Some(&models)))))
    }

    /// One composite window folded from its months. `None` when no month
    /// produced data.
    fn aggregate_composite(
        &self,
        date1: NaiveDate,
        date2: NaiveDate,
        resolution: TemporalResolution,
    ) -> Result<Option<CellGrid<CellResults>>> {
        debug!(
            start = %date1,
            end = %date2,
            months = resolution.composite_months().unwrap_or(0),
            "Aggregating composite time step"
        );

        let cancel = self.context.cancellation_token();
        let mut monthly = Vec::new();
        let mut month = date1;
        while month < date2 {
            cancel.check()?;
            let next = TemporalResolution::Monthly.advance(month);
            if let Some(cells) = self.aggregate_window(month, next, TemporalResolution::Monthly)? {
                monthly.push(cells);
            }
            month = next;
        }

        if monthly.is_empty() {
            warn!(start = %date1, end = %date2, "No monthly data, skipping time step");
            return Ok(None);
        }

        let product = &self.context.config().product;
        let mut folded: CellGrid<AggregationCell> = CellGrid::new(*self.context.target());
        for grid in &monthly {
            for results in grid.iter().filter(|r| !r.sst.is_nan()) {
                folded
                    .get_or_insert_with(results.x, results.y, || {
                        AggregationCell::new(CellKind::Temporal, results.x, results.y, product)
                    })
                    .accumulate(CellInput::Cell(results), 1.0);
            }
        }

        if folded.is_empty() {
            return Ok(None);
        }
        Ok(Some(folded.map(|cell| cell.results(None))))
    }

    /// Box-average one file into `cells`. Returns the number of target
    /// cells the file contributed to.
    fn process_file(&self, path: &Path, cells: &mut CellGrid<AggregationCell>) -> Result<usize> {
        let started = Instant::now();
        let grids = self.grid_source.read(path, self.context.config().sst_depth)?;
        grids.validate(path)?;

        let target = self.context.target();
        let factor = grids
            .geometry
            .scale_factor_to(target)
            .map_err(|e| RegridError::input_file(path, e.to_string()))?;

        let inputs = self.pixel_inputs(&grids)?;
        let product = &self.context.config().product;
        let mask = self.context.region_mask();
        let min_coverage = self.context.min_coverage();

        let fill_row = |(ty, row): (usize, &mut [Option<AggregationCell>])| -> usize {
            let mut contributed = 0;
            for (tx, slot) in row.iter_mut().enumerate() {
                if !mask.contains(tx, ty) {
                    continue;
                }
                let mut block = AggregationCell::new(CellKind::Spatial, tx, ty, product);
                for sy in ty * factor..(ty + 1) * factor {
                    for sx in tx * factor..(tx + 1) * factor {
                        if let Some(pixel) = inputs.pixel(sx, sy) {
                            block.accumulate(CellInput::Pixel(&pixel), inputs.weight(sx, sy));
                        }
                        if let Some(ice) = &inputs.grids.sea_ice_fraction {
                            block.accumulate_sea_ice(ice.sample(sx, sy));
                        }
                    }
                }

                let stats = BlockStats::from_counts(block.sample_count() as usize, factor * factor);
                if !stats.passes(min_coverage) {
                    continue;
                }
                match slot {
                    Some(cell) => {
                        cell.merge(&block);
                    }
                    None => *slot = Some(block),
                }
                contributed += 1;
            }
            contributed
        };

        let contributed: usize = if self.context.config().parallel {
            cells.par_rows_mut().map(fill_row).sum()
        } else {
            cells.rows_mut().map(fill_row).sum()
        };

        debug!(
            path = %path.display(),
            date = %grids.date,
            factor = factor,
            cells = contributed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Processed input file"
        );
        Ok(contributed)
    }

    /// Collect the per-pixel inputs of one file, fetching climatology
    /// fields for its day of year.
    fn pixel_inputs<'a>(&self, grids: &'a SourceGrids) -> Result<PixelInputs<'a>> {
        let mut inputs = PixelInputs {
            grids,
            reference: None,
            sea_coverage: None,
            standard_deviation: grids.standard_deviation.clone(),
        };

        if let Some(climatology) = &self.climatology {
            let day_of_year = grids.date.ordinal();
            let reference = climatology.reference(day_of_year)?;
            check_climatology("reference", &reference, &grids.geometry)?;
            let sea_coverage = climatology.sea_coverage()?;
            check_climatology("sea_coverage", &sea_coverage, &grids.geometry)?;

            if inputs.standard_deviation.is_none() {
                if let Some(sd) = climatology.standard_deviation(day_of_year)? {
                    check_climatology("standard_deviation", &sd, &grids.geometry)?;
                    inputs.standard_deviation = Some(sd);
                }
            }
            inputs.reference = Some(reference);
            inputs.sea_coverage = Some(sea_coverage);
        }

        Ok(inputs)
    }
}

fn check_climatology(name: &str, grid: &SharedGrid, geometry: &GridGeometry) -> Result<()> {
    if grid.width() != geometry.width() || grid.height() != geometry.height() {
        return Err(RegridError::configuration(
            "climatology",
            format!(
                "{} grid is {}x{}, input grid is {}x{}",
                name,
                grid.width(),
                grid.height(),
                geometry.width(),
                geometry.height()
            ),
        ));
    }
    Ok(())
}

/// Source and climatology grids of one file, read pixel by pixel.
struct PixelInputs<'a> {
    grids: &'a SourceGrids,
    reference: Option<SharedGrid>,
    sea_coverage: Option<SharedGrid>,
    standard_deviation: Option<SharedGrid>,
}

impl PixelInputs<'_> {
    /// The sample at `(x, y)`. Pixels with a quality grid but no quality
    /// value are dropped.
    fn pixel(&self, x: usize, y: usize) -> Option<PixelSample> {
        let mut pixel = PixelSample::new(self.grids.measurement.sample(x, y));
        if pixel.sst.is_nan() {
            return None;
        }
        if let Some(quality) = &self.grids.quality {
            pixel.quality = Some(quality.sample_int(x, y)?);
        }
        pixel.uncertainty = present(self.grids.uncertainty.as_ref(), x, y);
        pixel.reference = present(self.reference.as_ref(), x, y);
        pixel.standard_deviation = present(self.standard_deviation.as_ref(), x, y);
        pixel.large_scale_uncertainty = present(self.grids.large_scale_uncertainty.as_ref(), x, y);
        pixel.adjustment_uncertainty = present(self.grids.adjustment_uncertainty.as_ref(), x, y);
        pixel.synoptic_uncertainty = present(self.grids.synoptic_uncertainty.as_ref(), x, y);
        Some(pixel)
    }

    /// Sea-coverage fraction of the pixel, 1.0 without climatology.
    fn weight(&self, x: usize, y: usize) -> f64 {
        self.sea_coverage.as_ref().map_or(1.0, |g| g.sample(x, y))
    }
}

fn present(grid: Option<&SharedGrid>, x: usize, y: usize) -> Option<f64> {
    grid.map(|g| g.sample(x, y)).filter(|v| !v.is_nan())
}
