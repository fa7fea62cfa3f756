//! Spatio-temporal regridding of sea surface temperature grids.
//!
//! Input files at their native resolution are box-averaged onto a coarser
//! global grid and over daily to annual time windows. Every output cell
//! carries its mean SST and anomaly, the propagated random, large-scale,
//! adjustment and synoptic uncertainties, the sea-ice fraction, a coverage
//! (sampling) uncertainty derived from decorrelation length-scale lookup
//! tables, and their combined total.
//!
//! # Architecture
//!
//! ```text
//! RegridConfig ──► RunContext (target geometry, region mask, LUTs, cancel token)
//!                       │
//! FileStore ──► RegriddingAggregator ◄── GridSource, ClimatologyProvider
//!                       │
//!                       ├─► base windows: files ─► spatial cells
//!                       ├─► composite windows: monthly results ─► temporal cells
//!                       │
//!                       ▼
//!                  TimeStep ─► TimeStepWriter
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sst_regrid::{RegridConfig, RegriddingAggregator, RunContext, TemporalResolution, TextLutSource};
//!
//! let config = RegridConfig::from_file(Path::new("regrid.yaml"))?;
//! let luts = TextLutSource::with_resolution(config.lut.reference_resolution)?;
//! let context = RunContext::new(config, &luts)?;
//! let aggregator = RegriddingAggregator::new(context, file_store, grid_source);
//!
//! let steps = aggregator.aggregate(start, end, TemporalResolution::Monthly)?;
//! ```

pub mod aggregator;
pub mod cancel;
pub mod cell;
pub mod cell_grid;
pub mod config;
pub mod context;
pub mod error;
pub mod file_store;
pub mod lut;
pub mod resolution;
pub mod sources;
pub mod time_step;
pub mod uncertainty;

// Re-export commonly used types at crate root
pub use aggregator::RegriddingAggregator;
pub use cancel::CancellationToken;
pub use cell::{
    total_uncertainty, AggregationCell, CellInput, CellKind, CellResults, Channel, MeanAccumulator, PixelSample,
    ProductDescriptor, SstDepth, UncertaintyAccumulator,
};
pub use cell_grid::{CellGrid, GridCell};
pub use config::{LutConfig, RegridConfig, DEFAULT_REGIONS};
pub use context::RunContext;
pub use error::{RegridError, Result};
pub use file_store::{date_from_file_name, DirectoryFileStore};
pub use lut::{Lut, LutCache, LutOrientation, TextLutSource, TEXT_ENTRY_WIDTH};
pub use resolution::{SpatialResolution, TemporalResolution, SUPPORTED_SPATIAL_RESOLUTIONS};
pub use sources::{ClimatologyProvider, FileStore, GridSource, LutRawSource, SourceGrids, TimeStepWriter};
pub use time_step::{ChannelView, TimeStep};
pub use uncertainty::{
    coverage_uncertainty, correlation_factors, CorrelationFactors, CoverageUncertaintyModel,
    SynopticUncertaintyModel, WindowUncertainty, SYNOPTIC_LENGTH_KM,
};
