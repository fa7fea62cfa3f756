//! Per-run state: validated configuration, target geometry, region mask,
//! transformed LUTs and the cancellation token.

use std::sync::Arc;

use sst_grid::{parse_region_list, GridGeometry, RegionMask};
use tracing::info;

use crate::cancel::CancellationToken;
use crate::config::RegridConfig;
use crate::error::{RegridError, Result};
use crate::lut::{Lut, LutCache};
use crate::sources::LutRawSource;

/// Everything a run needs that does not change between windows.
///
/// Built once before the first window; construction fails on any invalid
/// configuration, unreadable region mask or LUT.
#[derive(Debug)]
pub struct RunContext {
    config: RegridConfig,
    target: GridGeometry,
    region_mask: RegionMask,
    space_lut: Arc<Lut>,
    time_lut: Arc<Lut>,
    lut_cache: LutCache,
    cancel: CancellationToken,
}

impl RunContext {
    pub fn new(config: RegridConfig, lut_source: &dyn LutRawSource) -> Result<Self> {
        config.validate()?;
        let target = config.target_geometry()?;

        let masks = parse_region_list(&config.regions, target)
            .map_err(|e| RegridError::configuration("regions", e.to_string()))?;
        let region_mask =
            RegionMask::combine(&masks).map_err(|e| RegridError::configuration("regions", e.to_string()))?;

        let mut lut_cache = LutCache::new();
        let lut = &config.lut;
        let space_lut = lut_cache.get_or_build(&lut.space_path, lut.space_fill_value, &target, lut, lut_source)?;
        let time_lut = lut_cache.get_or_build(&lut.time_path, lut.time_fill_value, &target, lut, lut_source)?;

        info!(
            resolution = target.resolution(),
            temporal = %config.temporal_resolution,
            regions = masks.len(),
            region_cells = region_mask.count(),
            coverage = %region_mask.coverage(),
            "Run context ready"
        );

        Ok(Self {
            config,
            target,
            region_mask,
            space_lut,
            time_lut,
            lut_cache,
            cancel: CancellationToken::new(),
        })
    }

    /// Use an externally owned token, e.g. one shared with a signal handler.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &RegridConfig {
        &self.config
    }

    pub fn target(&self) -> &GridGeometry {
        &self.target
    }

    pub fn region_mask(&self) -> &RegionMask {
        &self.region_mask
    }

    pub fn min_coverage(&self) -> f64 {
        self.config.min_coverage
    }

    pub fn space_lut(&self) -> &Arc<Lut> {
        &self.space_lut
    }

    pub fn time_lut(&self) -> &Arc<Lut> {
        &self.time_lut
    }

    pub fn lut_cache(&self) -> &LutCache {
        &self.lut_cache
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
