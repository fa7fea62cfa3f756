//! Quantized integer storage with scale, offset and fill value.

use num_traits::{Bounded, NumCast, PrimInt, ToPrimitive};

use crate::error::{GridError, Result};
use crate::grid::Grid;

/// A raster of raw integers decoded as `raw * scale + offset`.
///
/// Cells equal to the fill value decode to `NaN`; `NaN` encodes back to the
/// fill value.
#[derive(Debug, Clone)]
pub struct ScaledArrayGrid<T> {
    width: usize,
    height: usize,
    raw: Vec<T>,
    scale: f64,
    offset: f64,
    fill_value: Option<T>,
}

impl<T> ScaledArrayGrid<T>
where
    T: PrimInt + Bounded + NumCast + Send + Sync,
{
    /// Wrap raw storage. The storage length must equal `width * height`;
    /// the scale must be finite and non-zero, the offset finite.
    pub fn new(
        width: usize,
        height: usize,
        raw: Vec<T>,
        scale: f64,
        offset: f64,
        fill_value: Option<T>,
    ) -> Result<Self> {
        if raw.len() != width * height {
            return Err(GridError::dimension_mismatch(
                format!("{} raw values for a {}x{} grid", width * height, width, height),
                format!("{} raw values", raw.len()),
            ));
        }
        check_quantization(scale, offset)?;
        Ok(Self {
            width,
            height,
            raw,
            scale,
            offset,
            fill_value,
        })
    }

    /// Quantize a physical grid into raw storage.
    ///
    /// Without a fill value, `NaN` cells are stored as zero.
    pub fn encode_grid(
        source: &dyn Grid,
        scale: f64,
        offset: f64,
        fill_value: Option<T>,
    ) -> Result<Self> {
        check_quantization(scale, offset)?;
        let width = source.width();
        let height = source.height();
        let mut raw = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                raw.push(encode(source.sample(x, y), scale, offset, fill_value));
            }
        }
        Ok(Self {
            width,
            height,
            raw,
            scale,
            offset,
            fill_value,
        })
    }

    /// Raw stored value at a cell.
    pub fn raw(&self, x: usize, y: usize) -> T {
        self.raw[y * self.width + x]
    }

    /// All raw values, row-major.
    pub fn raw_data(&self) -> &[T] {
        &self.raw
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn fill_value(&self) -> Option<T> {
        self.fill_value
    }

    /// Encode a physical value with this grid's quantization.
    pub fn encode(&self, value: f64) -> T {
        encode(value, self.scale, self.offset, self.fill_value)
    }

    /// Decode a raw value with this grid's quantization.
    #[inline]
    pub fn decode(&self, raw: T) -> f64 {
        if self.fill_value == Some(raw) {
            return f64::NAN;
        }
        match raw.to_f64() {
            Some(value) => value * self.scale + self.offset,
            None => f64::NAN,
        }
    }
}

fn check_quantization(scale: f64, offset: f64) -> Result<()> {
    if !scale.is_finite() || scale == 0.0 {
        return Err(GridError::invalid_quantization(scale, offset, "scale must be finite and non-zero"));
    }
    if !offset.is_finite() {
        return Err(GridError::invalid_quantization(scale, offset, "offset must be finite"));
    }
    Ok(())
}

/// Inverse of the decode with rounding to nearest; saturates at the type bounds.
fn encode<T>(value: f64, scale: f64, offset: f64, fill_value: Option<T>) -> T
where
    T: PrimInt + Bounded + NumCast,
{
    if value.is_nan() {
        return fill_value.unwrap_or_else(T::zero);
    }
    let quantized = ((value - offset) / scale).round();
    match <T as NumCast>::from(quantized) {
        Some(raw) => raw,
        None if quantized > 0.0 => T::max_value(),
        None => T::min_value(),
    }
}

impl<T> Grid for ScaledArrayGrid<T>
where
    T: PrimInt + Bounded + NumCast + Send + Sync,
{
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn sample(&self, x: usize, y: usize) -> f64 {
        self.decode(self.raw[y * self.width + x])
    }

    fn sample_int(&self, x: usize, y: usize) -> Option<i64> {
        let raw = self.raw[y * self.width + x];
        if self.fill_value == Some(raw) {
            None
        } else {
            raw.to_i64()
        }
    }
}
