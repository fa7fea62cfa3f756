//! Configuration for a regridding run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sst_grid::GridGeometry;
use tracing::warn;

use crate::cell::{ProductDescriptor, SstDepth};
use crate::error::{RegridError, Result};
use crate::lut::LutOrientation;
use crate::resolution::{SpatialResolution, TemporalResolution};

/// Region list covering the whole globe.
pub const DEFAULT_REGIONS: &str = "Global=-180,90,180,-90";

/// Configuration for a regridding run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegridConfig {
    /// Output cell size in degrees.
    pub spatial_resolution: f64,

    /// Output time step length.
    pub temporal_resolution: TemporalResolution,

    /// Minimum fraction of valid source pixels a target block needs, 0..=1.
    pub min_coverage: f64,

    /// Region list, `name=W,N,E,S` or `name=path` entries separated by `;`.
    pub regions: String,

    /// Input product settings.
    pub product: ProductDescriptor,

    /// Coverage-uncertainty LUT settings.
    pub lut: LutConfig,

    /// Accumulate pixels across target rows on the rayon pool.
    pub parallel: bool,

    /// Depth of the SST variable read from the inputs.
    pub sst_depth: SstDepth,

    /// Only the total uncertainty is written.
    pub total_uncertainty: bool,

    /// Cells whose total uncertainty is not below this are left out of the
    /// output. `0` disables the filter.
    pub max_total_uncertainty: f64,
}

impl Default for RegridConfig {
    fn default() -> Self {
        Self {
            spatial_resolution: 5.0,
            temporal_resolution: TemporalResolution::Monthly,
            min_coverage: 0.0,
            regions: DEFAULT_REGIONS.to_string(),
            product: ProductDescriptor::default(),
            lut: LutConfig::default(),
            parallel: true,
            sst_depth: SstDepth::Skin,
            total_uncertainty: false,
            max_total_uncertainty: 0.0,
        }
    }
}

/// Where the decorrelation LUTs live and how their files are laid out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LutConfig {
    /// Spatial decorrelation length scales (km).
    pub space_path: PathBuf,

    /// Temporal decorrelation length scales (days).
    pub time_path: PathBuf,

    /// Raw value marking a missing entry in the space LUT.
    pub space_fill_value: f64,

    /// Raw value marking a missing entry in the time LUT.
    pub time_fill_value: f64,

    /// Row order of the raw files.
    pub orientation: LutOrientation,

    /// Resolution of the raw files in degrees.
    pub reference_resolution: f64,

    /// Intermediate resolution the raw grid is interpolated to.
    pub fine_resolution: f64,
}

impl Default for LutConfig {
    fn default() -> Self {
        Self {
            space_path: PathBuf::from("coverage_uncertainty/x0_space.txt"),
            time_path: PathBuf::from("coverage_uncertainty/x0_time.txt"),
            space_fill_value: 0.0,
            time_fill_value: -32768.0,
            orientation: LutOrientation::SouthUp,
            reference_resolution: 2.0,
            fine_resolution: 0.05,
        }
    }
}

impl RegridConfig {
    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `REGRID_*` overrides looked up through `lookup`.
    ///
    /// Values that do not parse are logged and ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = lookup("REGRID_SPATIAL_RESOLUTION") {
            match val.trim().parse() {
                Ok(resolution) => self.spatial_resolution = resolution,
                Err(_) => warn!(value = %val, "Ignoring invalid REGRID_SPATIAL_RESOLUTION"),
            }
        }

        if let Some(val) = lookup("REGRID_TEMPORAL_RESOLUTION") {
            match val.parse() {
                Ok(resolution) => self.temporal_resolution = resolution,
                Err(e) => warn!(error = %e, "Ignoring invalid REGRID_TEMPORAL_RESOLUTION"),
            }
        }

        if let Some(val) = lookup("REGRID_MIN_COVERAGE") {
            match val.trim().parse() {
                Ok(coverage) => self.min_coverage = coverage,
                Err(_) => warn!(value = %val, "Ignoring invalid REGRID_MIN_COVERAGE"),
            }
        }

        if let Some(val) = lookup("REGRID_REGIONS") {
            self.regions = val;
        }

        if let Some(val) = lookup("REGRID_LUT_SPACE_PATH") {
            self.lut.space_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("REGRID_LUT_TIME_PATH") {
            self.lut.time_path = PathBuf::from(val);
        }

        if let Some(val) = lookup("REGRID_LUT_ORIENTATION") {
            match LutOrientation::from_str(&val) {
                Some(orientation) => self.lut.orientation = orientation,
                None => warn!(value = %val, "Ignoring invalid REGRID_LUT_ORIENTATION"),
            }
        }

        if let Some(val) = lookup("REGRID_PARALLEL") {
            self.parallel = val.to_lowercase() == "true" || val == "1";
        }

        if let Some(val) = lookup("REGRID_SST_DEPTH") {
            match SstDepth::from_str(&val) {
                Some(depth) => self.sst_depth = depth,
                None => warn!(value = %val, "Ignoring invalid REGRID_SST_DEPTH"),
            }
        }

        if let Some(val) = lookup("REGRID_TOTAL_UNCERTAINTY") {
            self.total_uncertainty = val.to_lowercase() == "true" || val == "1";
        }

        if let Some(val) = lookup("REGRID_MAX_TOTAL_UNCERTAINTY") {
            match val.trim().parse() {
                Ok(max) => self.max_total_uncertainty = max,
                Err(_) => warn!(value = %val, "Ignoring invalid REGRID_MAX_TOTAL_UNCERTAINTY"),
            }
        }

        self
    }

    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read a YAML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        SpatialResolution::new(self.spatial_resolution)?;

        if !(0.0..=1.0).contains(&self.min_coverage) {
            return Err(RegridError::configuration(
                "min_coverage",
                format!("{} is outside [0, 1]", self.min_coverage),
            ));
        }

        if !self.max_total_uncertainty.is_finite() || self.max_total_uncertainty < 0.0 {
            return Err(RegridError::configuration(
                "max_total_uncertainty",
                format!("{} must be finite and not negative", self.max_total_uncertainty),
            ));
        }

        if self.regions.trim().is_empty() {
            return Err(RegridError::configuration("regions", "no region given"));
        }

        if self.lut.space_path.as_os_str().is_empty() {
            return Err(RegridError::configuration("lut.space_path", "must not be empty"));
        }

        if self.lut.time_path.as_os_str().is_empty() {
            return Err(RegridError::configuration("lut.time_path", "must not be empty"));
        }

        if !self.lut.space_fill_value.is_finite() {
            return Err(RegridError::configuration("lut.space_fill_value", "must be finite"));
        }

        if !self.lut.time_fill_value.is_finite() {
            return Err(RegridError::configuration("lut.time_fill_value", "must be finite"));
        }

        GridGeometry::global(self.lut.reference_resolution)
            .map_err(|e| RegridError::configuration("lut.reference_resolution", e.to_string()))?;
        GridGeometry::global(self.lut.fine_resolution)
            .map_err(|e| RegridError::configuration("lut.fine_resolution", e.to_string()))?;

        if self.lut.fine_resolution > self.lut.reference_resolution {
            return Err(RegridError::configuration(
                "lut.fine_resolution",
                "must not be coarser than lut.reference_resolution",
            ));
        }

        if self.spatial_resolution < self.lut.fine_resolution {
            return Err(RegridError::configuration(
                "spatial_resolution",
                format!(
                    "{} is finer than lut.fine_resolution {}",
                    self.spatial_resolution, self.lut.fine_resolution
                ),
            ));
        }

        Ok(())
    }

    /// Global output geometry.
    pub fn target_geometry(&self) -> Result<GridGeometry> {
        SpatialResolution::new(self.spatial_resolution)?.geometry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = RegridConfig::default();
        config.validate().unwrap();
        assert_eq!(config.regions, DEFAULT_REGIONS);
        assert_eq!(config.lut.orientation, LutOrientation::SouthUp);
        assert_eq!(config.target_geometry().unwrap().width(), 72);
    }

    #[test]
    fn test_yaml_partial_document() {
        let config = RegridConfig::from_yaml_str(
            "spatial_resolution: 0.5\n\
             temporal_resolution: seasonal\n\
             product:\n  name: AVHRR\n  min_quality: 4\n\
             lut:\n  orientation: north_up\n\
             sst_depth: depth_20\n\
             max_total_uncertainty: 1.5\n",
        )
        .unwrap();
        assert_eq!(config.spatial_resolution, 0.5);
        assert_eq!(config.temporal_resolution, TemporalResolution::Seasonal);
        assert_eq!(config.product.min_quality, Some(4));
        assert_eq!(config.lut.orientation, LutOrientation::NorthUp);
        assert_eq!(config.lut.space_fill_value, 0.0);
        assert_eq!(config.lut.time_fill_value, -32768.0);
        assert_eq!(config.sst_depth, SstDepth::Depth20);
        assert_eq!(config.max_total_uncertainty, 1.5);
        assert!(!config.total_uncertainty);
        assert!(config.parallel);
    }

    #[test]
    fn test_yaml_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regrid.yaml");
        std::fs::write(&path, "min_coverage: 0.25\nparallel: false\n").unwrap();
        let config = RegridConfig::from_file(&path).unwrap();
        assert_eq!(config.min_coverage, 0.25);
        assert!(!config.parallel);

        assert!(matches!(
            RegridConfig::from_yaml_str("temporal_resolution: hourly"),
            Err(RegridError::Yaml(_))
        ));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("REGRID_SPATIAL_RESOLUTION", "1.0"),
            ("REGRID_TEMPORAL_RESOLUTION", "Daily"),
            ("REGRID_MIN_COVERAGE", "not-a-number"),
            ("REGRID_REGIONS", "Pacific=170,10,-170,-10"),
            ("REGRID_LUT_SPACE_PATH", "/luts/space.txt"),
            ("REGRID_LUT_ORIENTATION", "North-Up"),
            ("REGRID_PARALLEL", "0"),
            ("REGRID_SST_DEPTH", "depth_100"),
            ("REGRID_TOTAL_UNCERTAINTY", "true"),
            ("REGRID_MAX_TOTAL_UNCERTAINTY", "2.5"),
        ]
        .into_iter()
        .collect();

        let config = RegridConfig::default().with_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.spatial_resolution, 1.0);
        assert_eq!(config.temporal_resolution, TemporalResolution::Daily);
        assert_eq!(config.min_coverage, 0.0);
        assert_eq!(config.regions, "Pacific=170,10,-170,-10");
        assert_eq!(config.lut.space_path, PathBuf::from("/luts/space.txt"));
        assert_eq!(config.lut.orientation, LutOrientation::NorthUp);
        assert!(!config.parallel);
        assert_eq!(config.sst_depth, SstDepth::Depth100);
        assert!(config.total_uncertainty);
        assert_eq!(config.max_total_uncertainty, 2.5);
    }

    fn invalid_parameter(config: &RegridConfig) -> String {
        match config.validate() {
            Err(RegridError::Configuration { parameter, .. }) => parameter,
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_names_parameter() {
        let mut config = RegridConfig::default();
        config.spatial_resolution = 7.0;
        assert_eq!(invalid_parameter(&config), "spatial_resolution");

        let mut config = RegridConfig::default();
        config.min_coverage = 1.5;
        assert_eq!(invalid_parameter(&config), "min_coverage");

        let mut config = RegridConfig::default();
        config.max_total_uncertainty = -1.0;
        assert_eq!(invalid_parameter(&config), "max_total_uncertainty");

        let mut config = RegridConfig::default();
        config.lut.space_fill_value = f64::NAN;
        assert_eq!(invalid_parameter(&config), "lut.space_fill_value");

        let mut config = RegridConfig::default();
        config.regions = "  ".to_string();
        assert_eq!(invalid_parameter(&config), "regions");

        let mut config = RegridConfig::default();
        config.lut.time_path = PathBuf::new();
        assert_eq!(invalid_parameter(&config), "lut.time_path");

        let mut config = RegridConfig::default();
        config.lut.reference_resolution = 7.0;
        assert_eq!(invalid_parameter(&config), "lut.reference_resolution");

        let mut config = RegridConfig::default();
        config.lut.fine_resolution = 0.1;
        config.spatial_resolution = 0.05;
        assert_eq!(invalid_parameter(&config), "spatial_resolution");
    }
}
