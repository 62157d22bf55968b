//! Tile grid planning.
//!
//! Origins march from 0 in steps of `crop_size - stride` along each axis and
//! continue while `origin < dimension`. The last tile on an axis may run past
//! the image edge; clamping the pixel extraction is left to the caller.
//!
//! [`eliminate_remainder`] optionally re-derives the crop size per image so
//! that one axis is covered by a whole number of tiles.

use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Grid configuration errors.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("crop size must be > 0")]
    ZeroCropSize,
    #[error("stride ({stride}) must be smaller than crop size ({crop_size})")]
    StrideTooLarge { crop_size: u32, stride: u32 },
    #[error("stride fraction must be in [0, 1), got {0}")]
    InvalidFraction(f64),
    #[error("image has zero extent ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Overlap between neighbouring tiles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stride {
    /// Absolute overlap in pixels.
    Pixels(u32),
    /// Overlap as a fraction of the crop size, in `[0, 1)`.
    Fraction(f64),
}

impl Default for Stride {
    fn default() -> Self {
        Stride::Fraction(0.2)
    }
}

impl Stride {
    /// Overlap in pixels for the given crop size.
    pub fn to_pixels(self, crop_size: u32) -> Result<u32, GridError> {
        match self {
            Stride::Pixels(px) => Ok(px),
            Stride::Fraction(f) => {
                check_fraction(f)?;
                Ok((f64::from(crop_size) * f).round() as u32)
            }
        }
    }

    /// Overlap as a fraction of the crop size.
    pub fn to_fraction(self, crop_size: u32) -> Result<f64, GridError> {
        if crop_size == 0 {
            return Err(GridError::ZeroCropSize);
        }
        let f = match self {
            Stride::Pixels(px) => f64::from(px) / f64::from(crop_size),
            Stride::Fraction(f) => f,
        };
        check_fraction(f)?;
        Ok(f)
    }
}

fn check_fraction(f: f64) -> Result<(), GridError> {
    if !f.is_finite() || !(0.0..1.0).contains(&f) {
        return Err(GridError::InvalidFraction(f));
    }
    Ok(())
}

/// Validated crop size and overlap, shared by both axes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGeometry {
    pub crop_size: u32,
    pub stride: u32,
}

impl TileGeometry {
    pub fn new(crop_size: u32, stride: u32) -> Result<Self, GridError> {
        if crop_size == 0 {
            return Err(GridError::ZeroCropSize);
        }
        if stride >= crop_size {
            return Err(GridError::StrideTooLarge { crop_size, stride });
        }
        Ok(Self { crop_size, stride })
    }

    pub fn with_stride(crop_size: u32, stride: Stride) -> Result<Self, GridError> {
        let px = stride.to_pixels(crop_size)?;
        Self::new(crop_size, px)
    }

    /// Distance between consecutive origins along an axis.
    #[inline]
    pub fn step(&self) -> u32 {
        self.crop_size.saturating_sub(self.stride).max(1)
    }
}

/// One planned tile. `row`/`col` only feed the identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub size: u32,
    pub row: u32,
    pub col: u32,
}

impl Tile {
    /// Stable identifier `<stem>_<row>_<col>` used for output file names.
    pub fn id(&self, stem: &str) -> String {
        format!("{stem}_{:03}_{:03}", self.row, self.col)
    }
}

/// Plan tile origins in row-major order.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(geometry), fields(crop = geometry.crop_size, stride = geometry.stride))
)]
pub fn plan_tiles(width: u32, height: u32, geometry: TileGeometry) -> Vec<Tile> {
    let step = geometry.step() as usize;
    let xs: Vec<u32> = (0..width).step_by(step).collect();
    let mut tiles = Vec::with_capacity(xs.len() * (height as usize).div_ceil(step));
    for (row, y) in (0..height).step_by(step).enumerate() {
        for (col, &x) in xs.iter().enumerate() {
            tiles.push(Tile {
                x,
                y,
                size: geometry.crop_size,
                row: row as u32,
                col: col as u32,
            });
        }
    }
    tiles
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Width,
    Height,
}

/// Geometry picked by [`eliminate_remainder`] for one image.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemainderAdjustment {
    pub geometry: TileGeometry,
    /// Axis whose tile count drove the adjustment.
    pub basis: Axis,
    /// Number of whole tiles along the basis axis.
    pub tiles: u32,
    /// Fractional part of `dimension / step` on the basis axis before adjusting.
    pub remainder: f64,
}

/// Re-derive crop size and stride so one axis holds a whole number of tiles.
///
/// For each axis `n = dimension / (crop_size * (1 - fraction))`; the axis with
/// the smaller fractional part of `n` is the basis. Its tile count is
/// `floor(n)`, plus one when the fraction exceeds 0.5. The crop size is then
/// solved so that `crop + (tiles - 1) * step` fits the basis dimension, with
/// `step = crop - round(crop * fraction)`. The result applies to both axes.
pub fn eliminate_remainder(
    width: u32,
    height: u32,
    crop_size: u32,
    fraction: f64,
) -> Result<RemainderAdjustment, GridError> {
    if crop_size == 0 {
        return Err(GridError::ZeroCropSize);
    }
    check_fraction(fraction)?;
    if width == 0 || height == 0 {
        return Err(GridError::EmptyImage { width, height });
    }

    let keep = 1.0 - fraction;
    let step = f64::from(crop_size) * keep;
    let n_w = f64::from(width) / step;
    let n_h = f64::from(height) / step;
    let (basis, dim, n) = if n_w.fract() <= n_h.fract() {
        (Axis::Width, width, n_w)
    } else {
        (Axis::Height, height, n_h)
    };
    let remainder = n.fract();

    let mut tiles = n.floor() as u32;
    if remainder > 0.5 {
        tiles += 1;
    }
    let tiles = tiles.max(1);

    let covered = |crop: u32| {
        let stride = (f64::from(crop) * fraction).round() as u32;
        let stride = stride.min(crop - 1);
        let span = u64::from(crop) + u64::from(tiles - 1) * u64::from(crop - stride);
        (stride, span)
    };

    let exact = f64::from(dim) / (1.0 + f64::from(tiles - 1) * keep);
    let mut crop = (exact.floor() as u32).clamp(1, dim);
    let (mut stride, mut span) = covered(crop);
    while crop > 1 && span > u64::from(dim) {
        crop -= 1;
        (stride, span) = covered(crop);
    }

    Ok(RemainderAdjustment {
        geometry: TileGeometry::new(crop, stride)?,
        basis,
        tiles,
        remainder,
    })
}
