//! Per-cell running statistics.
//!
//! Two kinds of cells exist. Spatial cells accumulate raw source pixels
//! within one time window; temporal cells fold the finalized results of
//! other cells across windows. Both are variants of [`AggregationCell`],
//! created through [`AggregationCell::new`].

use serde::{Deserialize, Serialize};

use crate::uncertainty::WindowUncertainty;

/// Describes the input product a cell is built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductDescriptor {
    /// Product name, used in log messages.
    pub name: String,

    /// Pixels with a quality level below this are ignored.
    pub min_quality: Option<i64>,
}

impl Default for ProductDescriptor {
    fn default() -> Self {
        Self {
            name: "CCI_L3U".to_string(),
            min_quality: None,
        }
    }
}

/// Weighted arithmetic mean, ignoring `NaN` values and non-positive weights.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MeanAccumulator {
    sum: f64,
    weight: f64,
    count: u64,
}

impl MeanAccumulator {
    #[inline]
    pub fn accumulate(&mut self, value: f64, weight: f64) {
        if value.is_nan() || weight.is_nan() || weight <= 0.0 {
            return;
        }
        self.sum += value * weight;
        self.weight += weight;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &MeanAccumulator) {
        self.sum += other.sum;
        self.weight += other.weight;
        self.count += other.count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum / self.weight
        }
    }
}

/// Propagates independent uncertainties: `sqrt(Σ(w·u)²) / Σw`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UncertaintyAccumulator {
    sum_squares: f64,
    weight: f64,
    count: u64,
}

impl UncertaintyAccumulator {
    #[inline]
    pub fn accumulate(&mut self, uncertainty: f64, weight: f64) {
        if uncertainty.is_nan() || weight.is_nan() || weight <= 0.0 {
            return;
        }
        let weighted = weight * uncertainty;
        self.sum_squares += weighted * weighted;
        self.weight += weight;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &UncertaintyAccumulator) {
        self.sum_squares += other.sum_squares;
        self.weight += other.weight;
        self.count += other.count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn combine(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.sum_squares.sqrt() / self.weight
        }
    }
}

/// One source pixel handed to a spatial cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelSample {
    /// Measured SST.
    pub sst: f64,
    /// Quality level, when the source carries one.
    pub quality: Option<i64>,
    /// Per-pixel random uncertainty.
    pub uncertainty: Option<f64>,
    /// Climatological reference SST.
    pub reference: Option<f64>,
    /// Standard deviation of the measurement, squared into the variance channel.
    pub standard_deviation: Option<f64>,
    pub large_scale_uncertainty: Option<f64>,
    pub adjustment_uncertainty: Option<f64>,
    pub synoptic_uncertainty: Option<f64>,
}

impl PixelSample {
    pub fn new(sst: f64) -> Self {
        Self {
            sst,
            quality: None,
            uncertainty: None,
            reference: None,
            standard_deviation: None,
            large_scale_uncertainty: None,
            adjustment_uncertainty: None,
            synoptic_uncertainty: None,
        }
    }
}

/// Measurement depth of the SST product being regridded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SstDepth {
    #[default]
    #[serde(rename = "skin")]
    Skin,
    #[serde(rename = "depth_20")]
    Depth20,
    #[serde(rename = "depth_100")]
    Depth100,
}

impl SstDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SstDepth::Skin => "skin",
            SstDepth::Depth20 => "depth_20",
            SstDepth::Depth100 => "depth_100",
        }
    }

    /// Input variable holding the SST at this depth.
    pub fn input_variable(&self) -> &'static str {
        match self {
            SstDepth::Skin => "sea_surface_temperature",
            SstDepth::Depth20 | SstDepth::Depth100 => "sea_surface_temperature_depth",
        }
    }

    /// Parse `skin`, `depth_20` or `depth_100`, case-insensitively.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "skin" => Some(SstDepth::Skin),
            "depth_20" => Some(SstDepth::Depth20),
            "depth_100" => Some(SstDepth::Depth100),
            _ => None,
        }
    }
}

impl std::fmt::Display for SstDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finalized, immutable statistics of one cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellResults {
    pub x: usize,
    pub y: usize,
    pub sst: f64,
    pub sst_anomaly: f64,
    pub random_uncertainty: f64,
    pub coverage_uncertainty: f64,
    pub large_scale_uncertainty: f64,
    pub adjustment_uncertainty: f64,
    pub synoptic_uncertainty: f64,
    pub sea_ice_fraction: f64,
    pub total_uncertainty: f64,
    pub sample_count: u64,
}

/// Output channels of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sst,
    SstAnomaly,
    RandomUncertainty,
    CoverageUncertainty,
    LargeScaleUncertainty,
    AdjustmentUncertainty,
    SynopticUncertainty,
    SeaIceFraction,
    TotalUncertainty,
    SampleCount,
}

impl Channel {
    pub const ALL: [Channel; 10] = [
        Channel::Sst,
        Channel::SstAnomaly,
        Channel::RandomUncertainty,
        Channel::CoverageUncertainty,
        Channel::LargeScaleUncertainty,
        Channel::AdjustmentUncertainty,
        Channel::SynopticUncertainty,
        Channel::SeaIceFraction,
        Channel::TotalUncertainty,
        Channel::SampleCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sst => "sst",
            Channel::SstAnomaly => "sst_anomaly",
            Channel::RandomUncertainty => "random_uncertainty",
            Channel::CoverageUncertainty => "coverage_uncertainty",
            Channel::LargeScaleUncertainty => "large_scale_uncertainty",
            Channel::AdjustmentUncertainty => "adjustment_uncertainty",
            Channel::SynopticUncertainty => "synoptic_uncertainty",
            Channel::SeaIceFraction => "sea_ice_fraction",
            Channel::TotalUncertainty => "total_uncertainty",
            Channel::SampleCount => "sample_count",
        }
    }

    /// Output variable name for products measured at `depth`.
    pub fn variable_name(&self, depth: SstDepth) -> String {
        match self {
            Channel::Sst => format!("sst_{}", depth),
            Channel::SstAnomaly => format!("sst_{}_anomaly", depth),
            Channel::RandomUncertainty => "uncorrelated_uncertainty".to_string(),
            Channel::LargeScaleUncertainty => "large_scale_correlated_uncertainty".to_string(),
            Channel::SynopticUncertainty => "synoptically_correlated_uncertainty".to_string(),
            other => other.as_str().to_string(),
        }
    }
}

/// `sqrt(Σu²)` over the present uncertainty components, `NaN` when none is.
pub fn total_uncertainty(components: &[f64]) -> f64 {
    let mut sum_squares = 0.0;
    let mut present = 0;
    for &u in components.iter().filter(|u| !u.is_nan()) {
        sum_squares += u * u;
        present += 1;
    }
    if present == 0 {
        f64::NAN
    } else {
        sum_squares.sqrt()
    }
}

impl CellResults {
    /// A cell at `(x, y)` without any data.
    pub fn empty(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            sst: f64::NAN,
            sst_anomaly: f64::NAN,
            random_uncertainty: f64::NAN,
            coverage_uncertainty: f64::NAN,
            large_scale_uncertainty: f64::NAN,
            adjustment_uncertainty: f64::NAN,
            synoptic_uncertainty: f64::NAN,
            sea_ice_fraction: f64::NAN,
            total_uncertainty: f64::NAN,
            sample_count: 0,
        }
    }

    /// Recompute `total_uncertainty` from the component channels.
    pub fn with_total(mut self) -> Self {
        self.total_uncertainty = total_uncertainty(&[
            self.random_uncertainty,
            self.adjustment_uncertainty,
            self.coverage_uncertainty,
            self.large_scale_uncertainty,
            self.synoptic_uncertainty,
        ]);
        self
    }

    /// Whether the cell stays in the output under a total-uncertainty
    /// ceiling. A ceiling `<= 0` disables the check; otherwise the total
    /// must be known and below it.
    pub fn within_total_uncertainty(&self, max_total_uncertainty: f64) -> bool {
        max_total_uncertainty <= 0.0 || self.total_uncertainty < max_total_uncertainty
    }

    /// Value of one channel.
    pub fn value(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Sst => self.sst,
            Channel::SstAnomaly => self.sst_anomaly,
            Channel::RandomUncertainty => self.random_uncertainty,
            Channel::CoverageUncertainty => self.coverage_uncertainty,
            Channel::LargeScaleUncertainty => self.large_scale_uncertainty,
            Channel::AdjustmentUncertainty => self.adjustment_uncertainty,
            Channel::SynopticUncertainty => self.synoptic_uncertainty,
            Channel::SeaIceFraction => self.sea_ice_fraction,
            Channel::TotalUncertainty => self.total_uncertainty,
            Channel::SampleCount => self.sample_count as f64,
        }
    }
}

/// Accumulates raw pixels of one time window.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialCell {
    x: usize,
    y: usize,
    min_quality: Option<i64>,
    sst: MeanAccumulator,
    anomaly: MeanAccumulator,
    random_uncertainty: UncertaintyAccumulator,
    variance: MeanAccumulator,
    large_scale: MeanAccumulator,
    adjustment: UncertaintyAccumulator,
    synoptic: UncertaintyAccumulator,
    sea_ice: MeanAccumulator,
}

impl SpatialCell {
    fn new(x: usize, y: usize, product: &ProductDescriptor) -> Self {
        Self {
            x,
            y,
            min_quality: product.min_quality,
            sst: MeanAccumulator::default(),
            anomaly: MeanAccumulator::default(),
            random_uncertainty: UncertaintyAccumulator::default(),
            variance: MeanAccumulator::default(),
            large_scale: MeanAccumulator::default(),
            adjustment: UncertaintyAccumulator::default(),
            synoptic: UncertaintyAccumulator::default(),
            sea_ice: MeanAccumulator::default(),
        }
    }

    /// A pixel contributes when its SST is present, its weight positive and
    /// its quality (if reported) reaches the product minimum.
    pub fn is_valid(&self, pixel: &PixelSample, weight: f64) -> bool {
        if pixel.sst.is_nan() || weight.is_nan() || weight <= 0.0 {
            return false;
        }
        match (self.min_quality, pixel.quality) {
            (Some(min), Some(quality)) => quality >= min,
            _ => true,
        }
    }

    /// Add one pixel; returns whether it was accepted.
    pub fn accumulate(&mut self, pixel: &PixelSample, weight: f64) -> bool {
        if !self.is_valid(pixel, weight) {
            return false;
        }
        self.sst.accumulate(pixel.sst, weight);
        if let Some(reference) = pixel.reference {
            self.anomaly.accumulate(pixel.sst - reference, weight);
        }
        if let Some(uncertainty) = pixel.uncertainty {
            self.random_uncertainty.accumulate(uncertainty, weight);
        }
        if let Some(sd) = pixel.standard_deviation {
            self.variance.accumulate(sd * sd, weight);
        }
        if let Some(u) = pixel.large_scale_uncertainty {
            self.large_scale.accumulate(u, weight);
        }
        if let Some(u) = pixel.adjustment_uncertainty {
            self.adjustment.accumulate(u, weight);
        }
        if let Some(u) = pixel.synoptic_uncertainty {
            self.synoptic.accumulate(u, weight);
        }
        true
    }

    /// Add the sea-ice fraction of a block pixel, valid SST or not.
    pub fn accumulate_sea_ice(&mut self, fraction: f64) {
        self.sea_ice.accumulate(fraction, 1.0);
    }

    /// Fold in another spatial cell of the same window.
    pub fn merge(&mut self, other: &SpatialCell) {
        self.sst.merge(&other.sst);
        self.anomaly.merge(&other.anomaly);
        self.random_uncertainty.merge(&other.random_uncertainty);
        self.variance.merge(&other.variance);
        self.large_scale.merge(&other.large_scale);
        self.adjustment.merge(&other.adjustment);
        self.synoptic.merge(&other.synoptic);
        self.sea_ice.merge(&other.sea_ice);
    }

    pub fn sample_count(&self) -> u64 {
        self.sst.count()
    }

    /// Mean input variance, `NaN` without variance input.
    pub fn mean_variance(&self) -> f64 {
        self.variance.mean()
    }

    fn results(&self, models: Option<&WindowUncertainty>) -> CellResults {
        let n = self.sample_count();
        let (coverage_uncertainty, adjustment_uncertainty, synoptic_uncertainty) = match models {
            Some(models) => (
                models.coverage.calculate(self.x, self.y, n, self.mean_variance()),
                models.synoptic.calculate(self.y, n, self.adjustment.combine()),
                models.synoptic.calculate(self.y, n, self.synoptic.combine()),
            ),
            None => (f64::NAN, self.adjustment.combine(), self.synoptic.combine()),
        };
        CellResults {
            x: self.x,
            y: self.y,
            sst: self.sst.mean(),
            sst_anomaly: self.anomaly.mean(),
            random_uncertainty: self.random_uncertainty.combine(),
            coverage_uncertainty,
            large_scale_uncertainty: self.large_scale.mean(),
            adjustment_uncertainty,
            synoptic_uncertainty,
            sea_ice_fraction: self.sea_ice.mean(),
            total_uncertainty: f64::NAN,
            sample_count: n,
        }
        .with_total()
    }
}

/// Folds the results of sub-period cells.
///
/// Every channel is a sum, so the accumulation order does not matter.
#[derive(Debug, Clone, PartialEq)]
pub struct TemporalCell {
    x: usize,
    y: usize,
    sst: MeanAccumulator,
    anomaly: MeanAccumulator,
    random_uncertainty: UncertaintyAccumulator,
    coverage_uncertainty: UncertaintyAccumulator,
    large_scale: MeanAccumulator,
    adjustment: UncertaintyAccumulator,
    synoptic: UncertaintyAccumulator,
    sea_ice: MeanAccumulator,
}

impl TemporalCell {
    fn new(x: usize, y: usize) -> Self {
        Self {
            x,
            y,
            sst: MeanAccumulator::default(),
            anomaly: MeanAccumulator::default(),
            random_uncertainty: UncertaintyAccumulator::default(),
            coverage_uncertainty: UncertaintyAccumulator::default(),
            large_scale: MeanAccumulator::default(),
            adjustment: UncertaintyAccumulator::default(),
            synoptic: UncertaintyAccumulator::default(),
            sea_ice: MeanAccumulator::default(),
        }
    }

    /// Add another cell's results; returns whether they carried an SST.
    pub fn accumulate(&mut self, other: &CellResults, weight: f64) -> bool {
        if other.sst.is_nan() || weight.is_nan() || weight <= 0.0 {
            return false;
        }
        self.sst.accumulate(other.sst, weight);
        self.anomaly.accumulate(other.sst_anomaly, weight);
        self.random_uncertainty.accumulate(other.random_uncertainty, weight);
        self.coverage_uncertainty.accumulate(other.coverage_uncertainty, weight);
        self.large_scale.accumulate(other.large_scale_uncertainty, weight);
        self.adjustment.accumulate(other.adjustment_uncertainty, weight);
        self.synoptic.accumulate(other.synoptic_uncertainty, weight);
        self.sea_ice.accumulate(other.sea_ice_fraction, weight);
        true
    }

    pub fn merge(&mut self, other: &TemporalCell) {
        self.sst.merge(&other.sst);
        self.anomaly.merge(&other.anomaly);
        self.random_uncertainty.merge(&other.random_uncertainty);
        self.coverage_uncertainty.merge(&other.coverage_uncertainty);
        self.large_scale.merge(&other.large_scale);
        self.adjustment.merge(&other.adjustment);
        self.synoptic.merge(&other.synoptic);
        self.sea_ice.merge(&other.sea_ice);
    }

    /// Number of sub-period cells folded in.
    pub fn sample_count(&self) -> u64 {
        self.sst.count()
    }

    fn results(&self) -> CellResults {
        CellResults {
            x: self.x,
            y: self.y,
            sst: self.sst.mean(),
            sst_anomaly: self.anomaly.mean(),
            random_uncertainty: self.random_uncertainty.combine(),
            coverage_uncertainty: self.coverage_uncertainty.combine(),
            large_scale_uncertainty: self.large_scale.mean(),
            adjustment_uncertainty: self.adjustment.combine(),
            synoptic_uncertainty: self.synoptic.combine(),
            sea_ice_fraction: self.sea_ice.mean(),
            total_uncertainty: f64::NAN,
            sample_count: self.sample_count(),
        }
        .with_total()
    }
}

/// Which cell variant a factory call produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Spatial,
    Temporal,
}

/// Input to [`AggregationCell::accumulate`].
#[derive(Debug, Clone, Copy)]
pub enum CellInput<'a> {
    Pixel(&'a PixelSample),
    Cell(&'a CellResults),
}

/// A cell of a [`CellGrid`](crate::cell_grid::CellGrid).
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationCell {
    Spatial(SpatialCell),
    Temporal(TemporalCell),
}

impl AggregationCell {
    /// Create an empty cell of the given kind at `(x, y)`.
    pub fn new(kind: CellKind, x: usize, y: usize, product: &ProductDescriptor) -> Self {
        match kind {
            CellKind::Spatial => AggregationCell::Spatial(SpatialCell::new(x, y, product)),
            CellKind::Temporal => AggregationCell::Temporal(TemporalCell::new(x, y)),
        }
    }

    pub fn kind(&self) -> CellKind {
        match self {
            AggregationCell::Spatial(_) => CellKind::Spatial,
            AggregationCell::Temporal(_) => CellKind::Temporal,
        }
    }

    pub fn x(&self) -> usize {
        match self {
            AggregationCell::Spatial(c) => c.x,
            AggregationCell::Temporal(c) => c.x,
        }
    }

    pub fn y(&self) -> usize {
        match self {
            AggregationCell::Spatial(c) => c.y,
            AggregationCell::Temporal(c) => c.y,
        }
    }

    pub fn sample_count(&self) -> u64 {
        match self {
            AggregationCell::Spatial(c) => c.sample_count(),
            AggregationCell::Temporal(c) => c.sample_count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    /// Accumulate a pixel (spatial cells) or another cell's results
    /// (temporal cells). Mismatched input is rejected; returns whether the
    /// input was accepted.
    pub fn accumulate(&mut self, input: CellInput<'_>, weight: f64) -> bool {
        match (self, input) {
            (AggregationCell::Spatial(cell), CellInput::Pixel(pixel)) => cell.accumulate(pixel, weight),
            (AggregationCell::Temporal(cell), CellInput::Cell(results)) => cell.accumulate(results, weight),
            _ => false,
        }
    }

    /// Fold another cell of the same kind into this one.
    pub fn merge(&mut self, other: &AggregationCell) -> bool {
        match (self, other) {
            (AggregationCell::Spatial(a), AggregationCell::Spatial(b)) => {
                a.merge(b);
                true
            }
            (AggregationCell::Temporal(a), AggregationCell::Temporal(b)) => {
                a.merge(b);
                true
            }
            _ => false,
        }
    }

    /// Add the sea-ice fraction of one block pixel. Only spatial cells
    /// track sea ice from pixels.
    pub fn accumulate_sea_ice(&mut self, fraction: f64) {
        if let AggregationCell::Spatial(cell) = self {
            cell.accumulate_sea_ice(fraction);
        }
    }

    /// Finalize. Spatial cells evaluate the coverage and synoptic models
    /// when given; temporal cells propagate the sub-period values.
    pub fn results(&self, models: Option<&WindowUncertainty>) -> CellResults {
        match self {
            AggregationCell::Spatial(c) => c.results(models),
            AggregationCell::Temporal(c) => c.results(),
        }
    }
}
