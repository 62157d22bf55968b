//! Pixel side of a tile: extraction, degeneracy gating and writing.

use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};
use serde::{Deserialize, Serialize};
use tilesplit_core::Tile;

use crate::error::SplitError;

/// Why a tile is skipped before any annotation work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degeneracy {
    /// Every byte of the crop is zero (e.g. transparent padding of an orthomosaic).
    Blank,
    /// Crop cut short by the image edge on either axis, square corners
    /// included; only rejected when remainder elimination is on.
    Partial,
}

/// A tile's pixels, clamped to the source image.
#[derive(Clone, Debug)]
pub struct TileCrop {
    pub image: DynamicImage,
    pub width: u32,
    pub height: u32,
    /// Planned edge length before clamping.
    pub size: u32,
}

impl TileCrop {
    pub fn is_blank(&self) -> bool {
        self.image.as_bytes().iter().all(|&b| b == 0)
    }

    /// `true` when nothing was clamped away.
    pub fn is_full(&self) -> bool {
        self.width == self.size && self.height == self.size
    }

    /// First reason to skip this crop, if any.
    pub fn degeneracy(&self, require_full: bool) -> Option<Degeneracy> {
        if require_full && !self.is_full() {
            return Some(Degeneracy::Partial);
        }
        if self.width == 0 || self.height == 0 || self.is_blank() {
            return Some(Degeneracy::Blank);
        }
        None
    }

    /// Encode the crop; the format follows the file extension.
    pub fn write(&self, path: &Path) -> Result<(), SplitError> {
        let encode_err = |source| SplitError::Encode {
            path: path.to_path_buf(),
            source,
        };
        // JPEG has no alpha channel.
        let is_jpeg = matches!(ImageFormat::from_path(path), Ok(ImageFormat::Jpeg));
        if is_jpeg && self.image.color().has_alpha() {
            let rgb = DynamicImage::ImageRgb8(self.image.to_rgb8());
            return rgb.save(path).map_err(encode_err);
        }
        self.image.save(path).map_err(encode_err)
    }
}

/// Decode a source raster.
pub fn load_image(path: &Path) -> Result<DynamicImage, SplitError> {
    let decode_err = |source| SplitError::Decode {
        path: path.to_path_buf(),
        source,
    };
    ImageReader::open(path)
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode_err)
}

/// Cut `tile` out of `img`, clamping the region to the image bounds.
pub fn extract(img: &DynamicImage, tile: &Tile) -> TileCrop {
    let (img_w, img_h) = img.dimensions();
    let x = tile.x.min(img_w);
    let y = tile.y.min(img_h);
    let width = tile.size.min(img_w - x);
    let height = tile.size.min(img_h - y);
    TileCrop {
        image: img.crop_imm(x, y, width, height),
        width,
        height,
        size: tile.size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn tile(x: u32, y: u32, size: u32) -> Tile {
        Tile {
            x,
            y,
            size,
            row: 0,
            col: 0,
        }
    }

    #[test]
    fn interior_tile_is_square_and_full_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 80, Rgb([9, 9, 9])));
        let crop = extract(&img, &tile(10, 10, 50));
        assert_eq!((crop.width, crop.height), (50, 50));
        assert_eq!(crop.degeneracy(true), None);
    }

    #[test]
    fn trailing_tile_is_clamped() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 80, Rgb([9, 9, 9])));
        let crop = extract(&img, &tile(80, 60, 50));
        assert_eq!((crop.width, crop.height), (20, 20));
        let crop = extract(&img, &tile(80, 0, 50));
        assert_eq!((crop.width, crop.height), (20, 50));
        assert_eq!(crop.degeneracy(true), Some(Degeneracy::Partial));
        assert_eq!(crop.degeneracy(false), None);
    }

    #[test]
    fn square_corner_remnant_is_partial() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(1000, 1000, Rgb([9, 9, 9])));
        let crop = extract(&img, &tile(888, 888, 555));
        assert_eq!((crop.width, crop.height), (112, 112));
        assert!(!crop.is_full());
        assert_eq!(crop.degeneracy(true), Some(Degeneracy::Partial));
        assert_eq!(crop.degeneracy(false), None);
    }

    #[test]
    fn zero_crop_is_blank() {
        let mut raw = RgbImage::new(100, 100);
        raw.put_pixel(90, 90, Rgb([0, 0, 1]));
        let img = DynamicImage::ImageRgb8(raw);
        assert_eq!(
            extract(&img, &tile(0, 0, 50)).degeneracy(false),
            Some(Degeneracy::Blank)
        );
        assert_eq!(extract(&img, &tile(50, 50, 50)).degeneracy(false), None);
    }

    #[test]
    fn writes_rgba_crop_as_jpeg() {
        let img = DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            32,
            32,
            image::Rgba([200, 10, 10, 255]),
        ));
        let crop = extract(&img, &tile(0, 0, 16));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.jpg");
        crop.write(&path).unwrap();
        let back = load_image(&path).unwrap();
        assert_eq!(back.dimensions(), (16, 16));
    }
}
