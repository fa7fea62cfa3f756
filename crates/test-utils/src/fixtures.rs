//! Common test fixtures for regridding tests.
//!
//! This module provides pre-defined configuration and LUT files that
//! represent common scenarios in SST regridding.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use sst_regrid::{LutConfig, RegridConfig, TEXT_ENTRY_WIDTH};

/// Region lists accepted by `RegridConfig::regions`.
pub mod regions {
    /// The whole globe.
    pub const GLOBAL: &str = "Global=-180,90,180,-90";

    /// Northern hemisphere only.
    pub const NORTH: &str = "North=-180,90,180,0";

    /// Equatorial Pacific box crossing the antimeridian.
    pub const PACIFIC: &str = "Pacific=170,10,-170,-10";

    /// Two boxes that are unioned.
    pub const TWO_BOXES: &str = "Atlantic=-60,30,-10,-30;Pacific=170,10,-170,-10";

    /// Broken entry (three coordinates).
    pub const INVALID: &str = "Broken=10,20,30";
}

/// Shorthand for a calendar date.
pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid test date")
}

/// A run configuration for tests.
///
/// LUTs are interpolated to 1 degree instead of 0.05 degrees so LUT
/// construction stays cheap; `spatial_resolution` must therefore be a
/// multiple of 1 degree.
pub fn test_config(spatial_resolution: f64, regions: &str) -> RegridConfig {
    RegridConfig {
        spatial_resolution,
        regions: regions.to_string(),
        lut: LutConfig {
            space_path: PathBuf::from("luts/x0_space.txt"),
            time_path: PathBuf::from("luts/x0_time.txt"),
            fine_resolution: 1.0,
            ..LutConfig::default()
        },
        ..RegridConfig::default()
    }
}

/// Formats a LUT in the fixed-width text format.
///
/// `value(col, row)` is called in file order, row 0 first.
pub fn format_text_lut(width: usize, height: usize, value: impl Fn(usize, usize) -> f64) -> String {
    let mut text = String::with_capacity((width * TEXT_ENTRY_WIDTH + 1) * height);
    for row in 0..height {
        for col in 0..width {
            let _ = write!(text, "{:>width$.2}", value(col, row), width = TEXT_ENTRY_WIDTH);
        }
        text.push('\n');
    }
    text
}

/// Writes a 2 degree (180x90) text LUT into `dir` and returns its path.
pub fn write_text_lut(dir: &Path, name: &str, value: impl Fn(usize, usize) -> f64) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format_text_lut(180, 90, value)).expect("write LUT fixture");
    path
}
