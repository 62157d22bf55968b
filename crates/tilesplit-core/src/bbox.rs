use serde::{Deserialize, Serialize};

/// Axis-aligned integer rectangle `(xmin, ymin, xmax, ymax)` in pixels.
///
/// Corners are inclusive-exclusive in the VOC sense: width is `xmax - xmin`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelRect {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl PixelRect {
    pub const fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.xmax - self.xmin
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.ymax - self.ymin
    }

    /// `true` when both extents are strictly positive.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        self.xmin < self.xmax && self.ymin < self.ymax
    }

    /// Area in square pixels; zero for degenerate rectangles.
    pub fn area(&self) -> i64 {
        if !self.is_well_formed() {
            return 0;
        }
        i64::from(self.width()) * i64::from(self.height())
    }

    /// `[x, y, width, height]` form used by the catalog.
    pub fn to_xywh(&self) -> [i32; 4] {
        [self.xmin, self.ymin, self.width(), self.height()]
    }

    /// Rectangle outline as a flat polygon, clockwise from `(xmin, ymin)`.
    pub fn outline(&self) -> [i32; 8] {
        [
            self.xmin, self.ymin, self.xmax, self.ymin, self.xmax, self.ymax, self.xmin, self.ymax,
        ]
    }
}

/// A labelled box in the source image frame, as read from an annotation file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub name: String,
    /// Index of `name` among the labels of its own source file, in
    /// first-seen order. Not a catalog id.
    #[serde(default)]
    pub category_id: Option<u32>,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub difficult: bool,
    pub rect: PixelRect,
}

impl BoundingBox {
    pub fn new(name: impl Into<String>, rect: PixelRect) -> Self {
        Self {
            name: name.into(),
            category_id: None,
            truncated: false,
            difficult: false,
            rect,
        }
    }
}

/// Outcome of testing one source box against one tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionStatus {
    /// All four edges lie strictly inside the tile (minus margin).
    Included,
    /// Exactly one edge crosses the tile boundary; kept and clipped.
    IncludedTruncated,
    Excluded,
}

impl InclusionStatus {
    #[inline]
    pub fn is_kept(self) -> bool {
        !matches!(self, InclusionStatus::Excluded)
    }
}

/// A box remapped into a tile's local frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBox {
    pub name: String,
    /// Carried over from the source box; file-local like it.
    pub category_id: Option<u32>,
    pub truncated: bool,
    pub difficult: bool,
    pub rect: PixelRect,
    pub status: InclusionStatus,
}

impl TileBox {
    /// Synthetic placeholder used to keep otherwise empty tiles in a dataset.
    pub fn placeholder(name: impl Into<String>, rect: PixelRect) -> Self {
        Self {
            name: name.into(),
            category_id: None,
            truncated: false,
            difficult: false,
            rect,
            status: InclusionStatus::Included,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xywh_and_area() {
        let r = PixelRect::new(10, 20, 40, 60);
        assert_eq!(r.to_xywh(), [10, 20, 30, 40]);
        assert_eq!(r.area(), 1200);
    }

    #[test]
    fn outline_is_clockwise_from_top_left() {
        let r = PixelRect::new(1, 2, 5, 7);
        assert_eq!(r.outline(), [1, 2, 5, 2, 5, 7, 1, 7]);
    }

    #[test]
    fn degenerate_rect_has_no_area() {
        let r = PixelRect::new(5, 5, 5, 9);
        assert!(!r.is_well_formed());
        assert_eq!(r.area(), 0);
    }
}
