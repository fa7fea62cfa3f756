//! Finished output time steps.

use chrono::NaiveDate;
use num_traits::{Bounded, NumCast, PrimInt};
use sst_grid::{Grid, GridGeometry, ScaledArrayGrid};

use crate::cell::{CellResults, Channel, SstDepth};
use crate::cell_grid::CellGrid;
use crate::error::Result;

/// The results of one output window `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeStep {
    start: NaiveDate,
    end: NaiveDate,
    cells: CellGrid<CellResults>,
    sst_depth: SstDepth,
    total_uncertainty_only: bool,
}

impl TimeStep {
    pub fn new(start: NaiveDate, end: NaiveDate, cells: CellGrid<CellResults>) -> Self {
        Self {
            start,
            end,
            cells,
            sst_depth: SstDepth::Skin,
            total_uncertainty_only: false,
        }
    }

    /// Set how writers name and select the channels of this step.
    pub fn with_outputs(mut self, sst_depth: SstDepth, total_uncertainty_only: bool) -> Self {
        self.sst_depth = sst_depth;
        self.total_uncertainty_only = total_uncertainty_only;
        self
    }

    pub fn sst_depth(&self) -> SstDepth {
        self.sst_depth
    }

    /// Channels a writer stores, in order.
    pub fn output_channels(&self) -> Vec<Channel> {
        if self.total_uncertainty_only {
            vec![Channel::TotalUncertainty]
        } else {
            Channel::ALL
                .into_iter()
                .filter(|c| *c != Channel::TotalUncertainty)
                .collect()
        }
    }

    /// Output variable name of `channel`.
    pub fn variable_name(&self, channel: Channel) -> String {
        channel.variable_name(self.sst_depth)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Exclusive end of the window.
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn cells(&self) -> &CellGrid<CellResults> {
        &self.cells
    }

    pub fn geometry(&self) -> &GridGeometry {
        self.cells.geometry()
    }

    /// Results of the cell at `(x, y)`, if it received data.
    pub fn cell(&self, x: usize, y: usize) -> Option<&CellResults> {
        self.cells.get(x, y)
    }

    /// A channel as a grid; cells without data read as `NaN`.
    pub fn channel(&self, channel: Channel) -> ChannelView<'_> {
        ChannelView { step: self, channel }
    }

    /// Quantize a channel for writers storing packed integers.
    pub fn to_scaled<T>(
        &self,
        channel: Channel,
        scale: f64,
        offset: f64,
        fill_value: Option<T>,
    ) -> Result<ScaledArrayGrid<T>>
    where
        T: PrimInt + Bounded + NumCast + Send + Sync,
    {
        Ok(ScaledArrayGrid::encode_grid(&self.channel(channel), scale, offset, fill_value)?)
    }
}

/// One channel of a [`TimeStep`] seen through the [`Grid`] trait.
#[derive(Debug, Clone, Copy)]
pub struct ChannelView<'a> {
    step: &'a TimeStep,
    channel: Channel,
}

impl ChannelView<'_> {
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

impl Grid for ChannelView<'_> {
    fn width(&self) -> usize {
        self.step.cells.width()
    }

    fn height(&self) -> usize {
        self.step.cells.height()
    }

    fn sample(&self, x: usize, y: usize) -> f64 {
        self.step
            .cells
            .get(x, y)
            .map_or(f64::NAN, |cell| cell.value(self.channel))
    }
}
