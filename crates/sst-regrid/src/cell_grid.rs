//! Sparse cell container indexed by a target geometry.

use rayon::prelude::*;
use sst_grid::GridGeometry;

use crate::cell::{AggregationCell, CellResults};

/// A cell that knows its own grid position.
pub trait GridCell {
    fn x(&self) -> usize;
    fn y(&self) -> usize;
}

impl GridCell for AggregationCell {
    fn x(&self) -> usize {
        AggregationCell::x(self)
    }

    fn y(&self) -> usize {
        AggregationCell::y(self)
    }
}

impl GridCell for CellResults {
    fn x(&self) -> usize {
        self.x
    }

    fn y(&self) -> usize {
        self.y
    }
}

/// A `width * height` arena of optional cells, slot `y * width + x`.
///
/// Slots stay empty until a cell is first created or inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct CellGrid<C> {
    geometry: GridGeometry,
    cells: Vec<Option<C>>,
}

impl<C> CellGrid<C> {
    pub fn new(geometry: GridGeometry) -> Self {
        let mut cells = Vec::with_capacity(geometry.cell_count());
        cells.resize_with(geometry.cell_count(), || None);
        Self { geometry, cells }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn width(&self) -> usize {
        self.geometry.width()
    }

    pub fn height(&self) -> usize {
        self.geometry.height()
    }

    fn slot(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width() && y < self.height()).then(|| self.geometry.index(x, y))
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&C> {
        self.slot(x, y).and_then(|i| self.cells[i].as_ref())
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut C> {
        self.slot(x, y).and_then(move |i| self.cells[i].as_mut())
    }

    /// Return the cell at `(x, y)`, creating it with `create` on first access.
    ///
    /// # Panics
    ///
    /// Panics when `(x, y)` is outside the grid.
    pub fn get_or_insert_with(&mut self, x: usize, y: usize, create: impl FnOnce() -> C) -> &mut C {
        assert!(x < self.width() && y < self.height(), "cell ({}, {}) outside grid", x, y);
        let index = self.geometry.index(x, y);
        self.cells[index].get_or_insert_with(create)
    }

    /// Remove and return the cell at `(x, y)`.
    pub fn remove(&mut self, x: usize, y: usize) -> Option<C> {
        self.slot(x, y).and_then(|i| self.cells[i].take())
    }

    /// Number of populated cells.
    pub fn len(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// Populated cells in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = &C> {
        self.cells.iter().flatten()
    }

    /// Apply `f` to every populated cell, keeping the layout.
    pub fn map<D>(&self, f: impl Fn(&C) -> D) -> CellGrid<D> {
        CellGrid {
            geometry: self.geometry,
            cells: self.cells.iter().map(|c| c.as_ref().map(&f)).collect(),
        }
    }

    /// Drop every cell for which `keep` returns false. Returns the number
    /// of cells dropped.
    pub fn retain(&mut self, keep: impl Fn(&C) -> bool) -> usize {
        let mut dropped = 0;
        for slot in &mut self.cells {
            if slot.as_ref().is_some_and(|c| !keep(c)) {
                *slot = None;
                dropped += 1;
            }
        }
        dropped
    }

    /// Mutable rows, one slice of slots per row, for sequential filling.
    pub fn rows_mut(&mut self) -> impl Iterator<Item = (usize, &mut [Option<C>])> {
        let width = self.width();
        self.cells.chunks_mut(width).enumerate()
    }
}

impl<C: Send> CellGrid<C> {
    /// Mutable rows distributed across the rayon pool.
    ///
    /// Rows are disjoint, so no two workers ever touch the same cell.
    pub fn par_rows_mut(&mut self) -> impl IndexedParallelIterator<Item = (usize, &mut [Option<C>])> {
        let width = self.width();
        self.cells.par_chunks_mut(width).enumerate()
    }
}

impl<C: GridCell> CellGrid<C> {
    /// Store a cell at its own position, returning the one it replaces.
    ///
    /// Cells outside the grid are dropped.
    pub fn insert(&mut self, cell: C) -> Option<C> {
        let index = self.slot(cell.x(), cell.y())?;
        self.cells[index].replace(cell)
    }
}
