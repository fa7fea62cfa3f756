//! Region masks restricting aggregation to a geographic subset.
//!
//! A mask is a membership bitset over the cells of a target geometry. Masks
//! are built from lon/lat boxes or from textual `0`/`1` grids and combined by
//! logical OR.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GridError, Result};
use crate::geometry::GridGeometry;
use crate::grid::Grid;
use crate::types::BoundingBox;

/// Name given to the union of several masks.
pub const COMBINED_NAME: &str = "Combined";

/// Coarse classification of the cells a mask covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionCoverage {
    Empty,
    Globe,
    NorthernHemisphere,
    SouthernHemisphere,
    Other,
}

impl fmt::Display for RegionCoverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegionCoverage::Empty => "empty",
            RegionCoverage::Globe => "globe",
            RegionCoverage::NorthernHemisphere => "northern_hemisphere",
            RegionCoverage::SouthernHemisphere => "southern_hemisphere",
            RegionCoverage::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// Boolean inclusion grid at a fixed geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    name: String,
    geometry: GridGeometry,
    /// Bit `y * width + x` is set when the cell belongs to the region.
    bits: Vec<u64>,
    coverage: RegionCoverage,
}

impl RegionMask {
    fn from_bits(name: impl Into<String>, geometry: GridGeometry, bits: Vec<u64>) -> Self {
        let coverage = classify(&geometry, &bits);
        Self {
            name: name.into(),
            geometry,
            bits,
            coverage,
        }
    }

    fn empty_bits(geometry: &GridGeometry) -> Vec<u64> {
        vec![0u64; geometry.cell_count().div_ceil(64)]
    }

    /// A mask containing every cell.
    pub fn global(geometry: GridGeometry) -> Self {
        let mut bits = Self::empty_bits(&geometry);
        for index in 0..geometry.cell_count() {
            set_bit(&mut bits, index);
        }
        Self::from_bits("Global", geometry, bits)
    }

    /// Mark cells whose centers fall inside a `(west, north, east, south)` box.
    ///
    /// `west > east` wraps across the antimeridian.
    pub fn from_box(name: impl Into<String>, geometry: GridGeometry, bbox: BoundingBox) -> Result<Self> {
        let name = name.into();
        bbox.validate(&name)?;

        let mut bits = Self::empty_bits(&geometry);
        for y in 0..geometry.height() {
            let lat = geometry.center_lat(y);
            if lat < bbox.south || lat > bbox.north {
                continue;
            }
            for x in 0..geometry.width() {
                if bbox.contains(geometry.center_lon(x), lat) {
                    set_bit(&mut bits, geometry.index(x, y));
                }
            }
        }
        Ok(Self::from_bits(name, geometry, bits))
    }

    /// Parse a textual mask: one line of `0`/`1` per grid row, north first.
    ///
    /// Blank lines and lines starting with `#` are ignored. Every data line must
    /// have exactly `width` characters and there must be exactly `height` of them.
    pub fn from_text(name: impl Into<String>, geometry: GridGeometry, text: &str) -> Result<Self> {
        let name = name.into();
        let mut bits = Self::empty_bits(&geometry);
        let mut y = 0usize;
        let mut line_no = 0usize;

        for raw_line in text.lines() {
            line_no += 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if y >= geometry.height() {
                return Err(GridError::invalid_region(
                    &name,
                    format!(
                        "illegal mask format in line {}: exactly {} lines are required",
                        line_no,
                        geometry.height()
                    ),
                ));
            }
            if line.chars().count() != geometry.width() {
                return Err(GridError::invalid_region(
                    &name,
                    format!(
                        "illegal mask format in line {}: line must contain exactly {} characters, but found {}",
                        line_no,
                        geometry.width(),
                        line.chars().count()
                    ),
                ));
            }
            for (x, c) in line.chars().enumerate() {
                match c {
                    '0' => {}
                    '1' => set_bit(&mut bits, geometry.index(x, y)),
                    _ => {
                        return Err(GridError::invalid_region(
                            &name,
                            format!(
                                "illegal mask format in line {}: only use characters '0' and '1'",
                                line_no
                            ),
                        ))
                    }
                }
            }
            y += 1;
        }

        if y != geometry.height() {
            return Err(GridError::invalid_region(
                &name,
                format!(
                    "illegal mask format in line {}: exactly {} lines are required, but found {}",
                    line_no,
                    geometry.height(),
                    y
                ),
            ));
        }
        Ok(Self::from_bits(name, geometry, bits))
    }

    /// Read a textual mask from a file.
    pub fn from_file(name: impl Into<String>, geometry: GridGeometry, path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_text(name, geometry, &text)
    }

    /// Union of several masks sharing one geometry.
    ///
    /// A single mask is returned unchanged; an empty list is an error.
    pub fn combine(masks: &[RegionMask]) -> Result<RegionMask> {
        let (first, rest) = masks
            .split_first()
            .ok_or_else(|| GridError::invalid_region(COMBINED_NAME, "no region masks to combine"))?;
        if rest.is_empty() {
            return Ok(first.clone());
        }

        let mut bits = first.bits.clone();
        for mask in rest {
            if mask.geometry != first.geometry {
                return Err(GridError::dimension_mismatch(
                    format!("{}x{}", first.geometry.width(), first.geometry.height()),
                    format!(
                        "{}x{} for region '{}'",
                        mask.geometry.width(),
                        mask.geometry.height(),
                        mask.name
                    ),
                ));
            }
            for (word, other) in bits.iter_mut().zip(&mask.bits) {
                *word |= *other;
            }
        }
        Ok(Self::from_bits(COMBINED_NAME, first.geometry, bits))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn coverage(&self) -> RegionCoverage {
        self.coverage
    }

    /// Whether cell `(x, y)` belongs to the region. Out-of-grid cells never do.
    #[inline]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        if x >= self.geometry.width() || y >= self.geometry.height() {
            return false;
        }
        let index = self.geometry.index(x, y);
        (self.bits[index / 64] & (1u64 << (index % 64))) != 0
    }

    /// Whether the cell containing `(lon, lat)` belongs to the region.
    pub fn contains_coords(&self, lon: f64, lat: f64) -> bool {
        self.contains(self.geometry.grid_x(lon), self.geometry.grid_y(lat))
    }

    /// Number of member cells.
    pub fn count(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }
}

impl Grid for RegionMask {
    fn width(&self) -> usize {
        self.geometry.width()
    }

    fn height(&self) -> usize {
        self.geometry.height()
    }

    fn sample(&self, x: usize, y: usize) -> f64 {
        if self.contains(x, y) {
            1.0
        } else {
            0.0
        }
    }
}

#[inline]
fn set_bit(bits: &mut [u64], index: usize) {
    bits[index / 64] |= 1u64 << (index % 64);
}

fn classify(geometry: &GridGeometry, bits: &[u64]) -> RegionCoverage {
    let total = geometry.cell_count();
    let half = geometry.height() / 2;
    let mut north = 0usize;
    let mut south = 0usize;
    for y in 0..geometry.height() {
        for x in 0..geometry.width() {
            let index = geometry.index(x, y);
            if (bits[index / 64] & (1u64 << (index % 64))) != 0 {
                if y < half {
                    north += 1;
                } else {
                    south += 1;
                }
            }
        }
    }
    let count = north + south;

    if count == 0 {
        RegionCoverage::Empty
    } else if count == total {
        RegionCoverage::Globe
    } else if north == count && north == total / 2 {
        RegionCoverage::NorthernHemisphere
    } else if south == count && south == total / 2 {
        RegionCoverage::SouthernHemisphere
    } else {
        RegionCoverage::Other
    }
}

/// Parse a region list such as `Global=-180,90,180,-90;Arctic=/masks/arctic.txt`.
///
/// Entries are separated by `;`. An entry is `name=path` when the path names
/// an existing textual mask file, otherwise `name=W,N,E,S` for a box. Paths
/// may contain `,` but not `;`. Entries are numbered from 1 in errors.
pub fn parse_region_list(list: &str, geometry: GridGeometry) -> Result<Vec<RegionMask>> {
    let mut masks = Vec::new();

    for entry in list.split(';').map(str::trim).filter(|e| !e.is_empty()) {
        let entry_no = masks.len() + 1;
        let (name, mask) = entry
            .split_once('=')
            .ok_or_else(|| GridError::region_parse(entry_no, "is missing the '=' character"))?;
        let name = name.trim();
        let mask = mask.trim();
        if name.is_empty() {
            return Err(GridError::region_parse(entry_no, "name is empty"));
        }
        if mask.is_empty() {
            return Err(GridError::region_parse(entry_no, "mask is empty"));
        }

        // An existing file wins, so mask paths may contain commas
        let path = Path::new(mask);
        let region = if path.is_file() {
            RegionMask::from_file(name, geometry, path)
                .map_err(|e| GridError::region_parse(entry_no, e.to_string()))?
        } else {
            let parts: Vec<&str> = mask.split(',').map(str::trim).collect();
            match parts.len() {
                4 => {
                    let mut wnes = [0.0f64; 4];
                    for (slot, part) in wnes.iter_mut().zip(&parts) {
                        *slot = part.parse().map_err(|_| {
                            GridError::region_parse(entry_no, "failed to parse W,N,E,S coordinates")
                        })?;
                    }
                    let [west, north, east, south] = wnes;
                    if north < south {
                        return Err(GridError::region_parse(entry_no, "N must not be less than S"));
                    }
                    RegionMask::from_box(name, geometry, BoundingBox::new(west, north, east, south))
                        .map_err(|e| GridError::region_parse(entry_no, e.to_string()))?
                }
                1 => {
                    return Err(GridError::region_parse(
                        entry_no,
                        format!("mask file not found: {}", path.display()),
                    ))
                }
                n => {
                    return Err(GridError::region_parse(
                        entry_no,
                        format!("expected W,N,E,S or a mask file, found {} values", n),
                    ))
                }
            }
        };

        debug!(
            region = region.name(),
            cells = region.count(),
            coverage = %region.coverage(),
            "Parsed region mask"
        );
        masks.push(region);
    }

    Ok(masks)
}
