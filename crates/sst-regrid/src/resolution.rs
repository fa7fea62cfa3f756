//! Temporal and spatial output resolutions.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use sst_grid::GridGeometry;

use crate::error::{RegridError, Result};

/// Length of one output time step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalResolution {
    Daily,
    Weekly5d,
    Weekly7d,
    #[default]
    Monthly,
    Seasonal,
    Annual,
}

impl TemporalResolution {
    pub const ALL: [TemporalResolution; 6] = [
        TemporalResolution::Daily,
        TemporalResolution::Weekly5d,
        TemporalResolution::Weekly7d,
        TemporalResolution::Monthly,
        TemporalResolution::Seasonal,
        TemporalResolution::Annual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly5d => "weekly5d",
            Self::Weekly7d => "weekly7d",
            Self::Monthly => "monthly",
            Self::Seasonal => "seasonal",
            Self::Annual => "annual",
        }
    }

    /// Composite resolutions are built by folding monthly results.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Seasonal | Self::Annual)
    }

    /// Number of months folded into one composite step.
    pub fn composite_months(&self) -> Option<u32> {
        match self {
            Self::Seasonal => Some(3),
            Self::Annual => Some(12),
            _ => None,
        }
    }

    /// End of the step starting at `date` (exclusive).
    ///
    /// Month arithmetic clamps to the end of shorter months.
    pub fn advance(&self, date: NaiveDate) -> NaiveDate {
        let next = match self {
            Self::Daily => date.checked_add_days(Days::new(1)),
            Self::Weekly5d => date.checked_add_days(Days::new(5)),
            Self::Weekly7d => date.checked_add_days(Days::new(7)),
            Self::Monthly => date.checked_add_months(Months::new(1)),
            Self::Seasonal => date.checked_add_months(Months::new(3)),
            Self::Annual => date.checked_add_months(Months::new(12)),
        };
        next.unwrap_or(NaiveDate::MAX)
    }
}

impl FromStr for TemporalResolution {
    type Err = RegridError;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == lower)
            .ok_or_else(|| {
                RegridError::configuration(
                    "temporal_resolution",
                    format!("'{}' is not one of daily, weekly5d, weekly7d, monthly, seasonal, annual", s),
                )
            })
    }
}

impl fmt::Display for TemporalResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output cell sizes in degrees accepted for a run.
pub const SUPPORTED_SPATIAL_RESOLUTIONS: [f64; 24] = [
    0.05, 0.1, 0.15, 0.2, 0.25, 0.3, 0.4, 0.5, 0.6, 0.75, 0.8, 1.0, 1.2, 1.25, 2.0, 2.25, 2.4, 2.5,
    3.0, 3.75, 4.0, 4.5, 5.0, 10.0,
];

/// A validated output cell size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialResolution(f64);

impl SpatialResolution {
    pub fn new(degrees: f64) -> Result<Self> {
        SUPPORTED_SPATIAL_RESOLUTIONS
            .iter()
            .find(|&&r| (r - degrees).abs() < 1.0e-9)
            .map(|&r| Self(r))
            .ok_or_else(|| {
                RegridError::configuration(
                    "spatial_resolution",
                    format!("{} degrees is not a supported resolution", degrees),
                )
            })
    }

    pub fn degrees(&self) -> f64 {
        self.0
    }

    /// Global target geometry at this resolution.
    pub fn geometry(&self) -> Result<GridGeometry> {
        Ok(GridGeometry::global(self.0)?)
    }
}

impl Default for SpatialResolution {
    fn default() -> Self {
        Self(5.0)
    }
}

impl fmt::Display for SpatialResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
