//! In-memory implementations of the aggregator's collaborator traits.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::NaiveDate;
use sst_grid::{ArrayGrid, Grid, GridGeometry, SharedGrid};
use sst_regrid::{
    ClimatologyProvider, FileStore, GridSource, LutRawSource, RegridError, Result, SourceGrids, SstDepth, TimeStep,
    TimeStepWriter,
};

/// Input files registered by date, served from memory.
///
/// Each file is registered with the grids a [`MemoryGridSource`] returns
/// for it; build both with [`MemoryInputs`].
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    files: BTreeMap<NaiveDate, Vec<PathBuf>>,
    queries: AtomicUsize,
}

impl MemoryFileStore {
    pub fn add(&mut self, date: NaiveDate, path: impl Into<PathBuf>) {
        self.files.entry(date).or_default().push(path.into());
    }

    /// Number of `files` calls so far.
    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl FileStore for MemoryFileStore {
    fn files(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<PathBuf>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if end <= start {
            return Ok(Vec::new());
        }
        Ok(self.files.range(start..end).flat_map(|(_, p)| p.iter().cloned()).collect())
    }
}

/// Decoded grids keyed by path. Paths marked as failing return an
/// `InputFile` error, unknown paths as well.
#[derive(Default)]
pub struct MemoryGridSource {
    grids: HashMap<PathBuf, SourceGrids>,
    failing: HashSet<PathBuf>,
    reads: AtomicUsize,
    depths: Mutex<Vec<SstDepth>>,
}

impl MemoryGridSource {
    pub fn insert(&mut self, path: impl Into<PathBuf>, grids: SourceGrids) {
        self.grids.insert(path.into(), grids);
    }

    pub fn fail(&mut self, path: impl Into<PathBuf>) {
        self.failing.insert(path.into());
    }

    /// Number of `read` calls so far, including failed ones.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Depth requested by each `read` call, in call order.
    pub fn requested_depths(&self) -> Vec<SstDepth> {
        self.depths.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl GridSource for MemoryGridSource {
    fn read(&self, path: &Path, depth: SstDepth) -> Result<SourceGrids> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut depths) = self.depths.lock() {
            depths.push(depth);
        }
        if self.failing.contains(path) {
            return Err(RegridError::input_file(path, "simulated read failure"));
        }
        self.grids
            .get(path)
            .cloned()
            .ok_or_else(|| RegridError::input_file(path, "file not found"))
    }
}

/// Builds a matching [`MemoryFileStore`] and [`MemoryGridSource`].
#[derive(Default)]
pub struct MemoryInputs {
    pub files: MemoryFileStore,
    pub grids: MemoryGridSource,
}

impl MemoryInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a measurement-only file named after its date.
    pub fn add_measurement(&mut self, date: NaiveDate, geometry: GridGeometry, measurement: ArrayGrid) -> PathBuf {
        self.add(SourceGrids::new(date, geometry, measurement.into_shared()))
    }

    /// Register a file with all its grids.
    pub fn add(&mut self, grids: SourceGrids) -> PathBuf {
        let index = self.files.files.get(&grids.date).map_or(0, Vec::len);
        let path = PathBuf::from(format!("{}-{}-SST.nc", grids.date.format("%Y%m%d"), index));
        self.files.add(grids.date, path.clone());
        self.grids.insert(path.clone(), grids);
        path
    }

    /// Register a file whose read fails.
    pub fn add_failing(&mut self, date: NaiveDate) -> PathBuf {
        let index = self.files.files.get(&date).map_or(0, Vec::len);
        let path = PathBuf::from(format!("{}-{}-BROKEN.nc", date.format("%Y%m%d"), index));
        self.files.add(date, path.clone());
        self.grids.fail(path.clone());
        path
    }
}

/// Serves a fixed raw grid for every LUT path and counts reads.
#[derive(Debug)]
pub struct ConstantLutSource {
    raw: ArrayGrid,
    reads: AtomicUsize,
}

impl ConstantLutSource {
    /// A 2 degree raw grid holding `value` everywhere.
    pub fn new(value: f64) -> Self {
        Self::from_grid(ArrayGrid::filled(180, 90, value))
    }

    pub fn from_grid(raw: ArrayGrid) -> Self {
        Self {
            raw,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl LutRawSource for ConstantLutSource {
    fn read_raw(&self, _path: &Path, fill_value: f64) -> Result<ArrayGrid> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let data = self
            .raw
            .data()
            .iter()
            .map(|&v| if v == fill_value { f64::NAN } else { v })
            .collect();
        Ok(ArrayGrid::new(self.raw.width(), self.raw.height(), data)?)
    }
}

/// Constant reference, sea coverage and standard deviation fields.
pub struct MemoryClimatology {
    pub reference: SharedGrid,
    pub sea_coverage: SharedGrid,
    pub standard_deviation: Option<SharedGrid>,
}

impl MemoryClimatology {
    pub fn constant(geometry: &GridGeometry, reference: f64, sea_coverage: f64) -> Self {
        Self {
            reference: ArrayGrid::filled(geometry.width(), geometry.height(), reference).into_shared(),
            sea_coverage: ArrayGrid::filled(geometry.width(), geometry.height(), sea_coverage).into_shared(),
            standard_deviation: None,
        }
    }

    pub fn with_standard_deviation(mut self, grid: ArrayGrid) -> Self {
        self.standard_deviation = Some(grid.into_shared());
        self
    }
}

impl ClimatologyProvider for MemoryClimatology {
    fn reference(&self, _day_of_year: u32) -> Result<SharedGrid> {
        Ok(self.reference.clone())
    }

    fn sea_coverage(&self) -> Result<SharedGrid> {
        Ok(self.sea_coverage.clone())
    }

    fn standard_deviation(&self, _day_of_year: u32) -> Result<Option<SharedGrid>> {
        Ok(self.standard_deviation.clone())
    }
}

/// Collects written time steps. Steps starting on a date in `fail_on`
/// are rejected with an output error.
#[derive(Debug, Default)]
pub struct VecWriter {
    pub steps: Vec<TimeStep>,
    pub fail_on: Vec<NaiveDate>,
    pub attempts: usize,
}

impl VecWriter {
    pub fn failing_on(dates: &[NaiveDate]) -> Self {
        Self {
            fail_on: dates.to_vec(),
            ..Self::default()
        }
    }
}

impl TimeStepWriter for VecWriter {
    fn write(&mut self, step: &TimeStep) -> Result<()> {
        self.attempts += 1;
        if self.fail_on.contains(&step.start()) {
            return Err(RegridError::output(format!("disk full writing {}", step.start())));
        }
        self.steps.push(step.clone());
        Ok(())
    }
}
