//! Decorrelation length-scale lookup tables.
//!
//! A LUT file holds a global grid at a coarse reference resolution. Before a
//! run it is interpolated to a fine resolution, box-reduced to the target
//! resolution and brought into north-up row order, then materialized once.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sst_grid::{
    ArrayGrid, DownscaledGrid, FlippedGrid, Grid, GridGeometry, InterpolatedGrid, InterpolationMethod,
    SharedGrid,
};
use tracing::{debug, info};

use crate::config::LutConfig;
use crate::error::{RegridError, Result};
use crate::sources::LutRawSource;

/// Width of one entry in the text LUT format.
pub const TEXT_ENTRY_WIDTH: usize = 9;

/// Row order of a raw LUT file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LutOrientation {
    /// The first row is the northernmost.
    NorthUp,
    /// The first row is the southernmost.
    #[default]
    SouthUp,
}

impl LutOrientation {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "north_up" => Some(Self::NorthUp),
            "south_up" => Some(Self::SouthUp),
            _ => None,
        }
    }
}

/// A LUT materialized on the target geometry, north-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut {
    path: PathBuf,
    geometry: GridGeometry,
    grid: ArrayGrid,
}

impl Lut {
    /// Wrap an already transformed grid.
    pub fn from_grid(path: &Path, geometry: GridGeometry, grid: ArrayGrid) -> Result<Self> {
        if grid.width() != geometry.width() || grid.height() != geometry.height() {
            return Err(RegridError::lut(
                path,
                format!(
                    "grid is {}x{}, expected {}x{}",
                    grid.width(),
                    grid.height(),
                    geometry.width(),
                    geometry.height()
                ),
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
            geometry,
            grid,
        })
    }

    /// Transform a raw reference grid onto `target`.
    ///
    /// Interpolates bilinearly to the fine resolution, box-reduces to the
    /// target and flips exactly once for south-up input.
    pub fn build(path: &Path, raw: ArrayGrid, settings: &LutConfig, target: &GridGeometry) -> Result<Self> {
        let reference = GridGeometry::global(settings.reference_resolution)
            .map_err(|e| RegridError::configuration("lut.reference_resolution", e.to_string()))?;
        let fine = GridGeometry::global(settings.fine_resolution)
            .map_err(|e| RegridError::configuration("lut.fine_resolution", e.to_string()))?;

        if raw.width() != reference.width() || raw.height() != reference.height() {
            return Err(RegridError::lut(
                path,
                format!(
                    "raw grid is {}x{}, expected {}x{} at {} degrees",
                    raw.width(),
                    raw.height(),
                    reference.width(),
                    reference.height(),
                    reference.resolution()
                ),
            ));
        }
        if target.resolution() < fine.resolution() {
            return Err(RegridError::configuration(
                "spatial_resolution",
                format!(
                    "target resolution {} is finer than the LUT fine resolution {}",
                    target.resolution(),
                    fine.resolution()
                ),
            ));
        }

        let raw: SharedGrid = raw.into_shared();
        let interpolated: SharedGrid = Arc::new(
            InterpolatedGrid::new(raw, &reference, &fine, InterpolationMethod::Bilinear)
                .map_err(|e| RegridError::lut(path, e.to_string()))?,
        );
        let reduced: SharedGrid = if target.resolution() > fine.resolution() {
            Arc::new(
                DownscaledGrid::to(interpolated, &fine, target)
                    .map_err(|e| RegridError::configuration("spatial_resolution", e.to_string()))?,
            )
        } else {
            interpolated
        };
        let oriented: SharedGrid = match settings.orientation {
            LutOrientation::SouthUp => Arc::new(FlippedGrid::new(reduced)),
            LutOrientation::NorthUp => reduced,
        };

        Self::from_grid(path, *target, ArrayGrid::from_grid(&oriented))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn grid(&self) -> &ArrayGrid {
        &self.grid
    }

    /// LUT value at target cell `(x, y)`.
    #[inline]
    pub fn value(&self, x: usize, y: usize) -> f64 {
        self.grid.get(x, y).unwrap_or(f64::NAN)
    }
}

/// Reads the fixed-width text LUT format: one line per row of the
/// reference grid, `TEXT_ENTRY_WIDTH` characters per value.
#[derive(Debug, Clone, Copy)]
pub struct TextLutSource {
    reference: GridGeometry,
}

impl TextLutSource {
    pub fn new(reference: GridGeometry) -> Self {
        Self { reference }
    }

    /// Source for global files at `resolution` degrees.
    pub fn with_resolution(resolution: f64) -> Result<Self> {
        let reference = GridGeometry::global(resolution)
            .map_err(|e| RegridError::configuration("lut.reference_resolution", e.to_string()))?;
        Ok(Self::new(reference))
    }

    /// Parse LUT text into a grid in file row order.
    pub fn parse(&self, path: &Path, text: &str, fill_value: f64) -> Result<ArrayGrid> {
        let (width, height) = (self.reference.width(), self.reference.height());
        let mut data = Vec::with_capacity(width * height);
        let mut lines = text.lines();

        for y in 0..height {
            let line = lines
                .next()
                .ok_or_else(|| RegridError::lut(path, format!("expected {} lines, found {}", height, y)))?;
            if line.len() < width * TEXT_ENTRY_WIDTH {
                return Err(RegridError::lut(
                    path,
                    format!(
                        "line {} has {} characters, expected at least {}",
                        y + 1,
                        line.len(),
                        width * TEXT_ENTRY_WIDTH
                    ),
                ));
            }
            for x in 0..width {
                let entry = line
                    .get(x * TEXT_ENTRY_WIDTH..(x + 1) * TEXT_ENTRY_WIDTH)
                    .ok_or_else(|| RegridError::lut(path, format!("line {} is not ASCII", y + 1)))?;
                let value: f64 = entry.trim().parse().map_err(|_| {
                    RegridError::lut(path, format!("invalid value '{}' in line {}, column {}", entry.trim(), y + 1, x + 1))
                })?;
                data.push(if value == fill_value { f64::NAN } else { value });
            }
        }

        Ok(ArrayGrid::new(width, height, data)?)
    }
}

impl LutRawSource for TextLutSource {
    fn read_raw(&self, path: &Path, fill_value: f64) -> Result<ArrayGrid> {
        let text = fs::read_to_string(path).map_err(|e| RegridError::lut(path, e.to_string()))?;
        self.parse(path, &text, fill_value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LutKey {
    path: PathBuf,
    fill_bits: u64,
    resolution_bits: u64,
}

/// Transformed LUTs of one run, keyed by file, fill value and target resolution.
#[derive(Debug, Default)]
pub struct LutCache {
    entries: HashMap<LutKey, Arc<Lut>>,
    builds: usize,
}

impl LutCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached LUT or read and transform it. Raw entries equal to
    /// `fill_value` become `NaN`.
    pub fn get_or_build(
        &mut self,
        path: &Path,
        fill_value: f64,
        target: &GridGeometry,
        settings: &LutConfig,
        source: &dyn LutRawSource,
    ) -> Result<Arc<Lut>> {
        let key = LutKey {
            path: path.to_path_buf(),
            fill_bits: fill_value.to_bits(),
            resolution_bits: target.resolution().to_bits(),
        };
        if let Some(lut) = self.entries.get(&key) {
            debug!(path = %path.display(), "Using cached LUT");
            return Ok(Arc::clone(lut));
        }

        info!(
            path = %path.display(),
            resolution = target.resolution(),
            fill_value = fill_value,
            "Processing coverage uncertainty LUT"
        );
        let started = Instant::now();
        let raw = source.read_raw(path, fill_value)?;
        let lut = Arc::new(Lut::build(path, raw, settings, target)?);
        self.builds += 1;
        info!(
            path = %path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "LUT ready"
        );

        self.entries.insert(key, Arc::clone(&lut));
        Ok(lut)
    }

    /// Number of cached LUTs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of LUTs transformed so far.
    pub fn builds(&self) -> usize {
        self.builds
    }
}
