//! Per-tile box classification and remapping into tile-local coordinates.

use serde::{Deserialize, Serialize};

use crate::bbox::{BoundingBox, InclusionStatus, PixelRect, TileBox};
use crate::grid::Tile;

/// A remapped box came out with non-positive extent.
///
/// This signals an inconsistency in the classification rules themselves, so
/// callers treat it as fatal for the whole run.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "malformed box `{name}` after remapping: ({}, {}, {}, {})",
    .rect.xmin, .rect.ymin, .rect.xmax, .rect.ymax
)]
pub struct MalformedBox {
    pub name: String,
    pub rect: PixelRect,
}

/// Inclusion rules applied to every (box, tile) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyPolicy {
    /// Inset from each tile edge a box edge must clear to count as inside.
    pub margin: u32,
    /// Keep boxes that cross exactly one tile edge.
    pub include_truncated: bool,
}

impl Default for ClassifyPolicy {
    fn default() -> Self {
        Self {
            margin: 5,
            include_truncated: true,
        }
    }
}

impl ClassifyPolicy {
    /// Fully-contained boxes only, no margin.
    pub const CONTAINED_ONLY: ClassifyPolicy = ClassifyPolicy {
        margin: 0,
        include_truncated: false,
    };
}

/// Result of classifying one box against one tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub status: InclusionStatus,
    /// Present unless `status` is [`InclusionStatus::Excluded`].
    pub tile_box: Option<TileBox>,
}

/// Kept boxes for one tile plus the number dropped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TileClassification {
    pub kept: Vec<TileBox>,
    pub excluded: usize,
}

impl TileClassification {
    pub fn truncated(&self) -> usize {
        self.kept
            .iter()
            .filter(|b| b.status == InclusionStatus::IncludedTruncated)
            .count()
    }
}

/// Count how many of the four box edges fail to lie strictly inside
/// `(origin + margin, origin + size - margin)` on their axis.
fn failed_edges(rect: &PixelRect, tile: &Tile, margin: u32) -> usize {
    let inside = |v: i32, origin: u32| {
        let lo = i64::from(origin) + i64::from(margin);
        let hi = i64::from(origin) + i64::from(tile.size) - i64::from(margin);
        let v = i64::from(v);
        lo < v && v < hi
    };
    [
        inside(rect.xmin, tile.x),
        inside(rect.ymin, tile.y),
        inside(rect.xmax, tile.x),
        inside(rect.ymax, tile.y),
    ]
    .iter()
    .filter(|ok| !**ok)
    .count()
}

/// Decide the inclusion status of `bbox` in `tile`.
pub fn inclusion_status(
    bbox: &BoundingBox,
    tile: &Tile,
    policy: &ClassifyPolicy,
) -> InclusionStatus {
    match failed_edges(&bbox.rect, tile, policy.margin) {
        0 => InclusionStatus::Included,
        1 if policy.include_truncated => InclusionStatus::IncludedTruncated,
        _ => InclusionStatus::Excluded,
    }
}

/// Shift `rect` into the tile frame, clamping to `[1, tile.size]`.
pub fn remap(rect: &PixelRect, tile: &Tile) -> PixelRect {
    let ox = i64::from(tile.x);
    let oy = i64::from(tile.y);
    let size = i64::from(tile.size);
    let clamp_lo = |v: i64| v.max(1) as i32;
    let clamp_hi = |v: i64| v.min(size) as i32;
    PixelRect {
        xmin: clamp_lo(i64::from(rect.xmin) - ox),
        ymin: clamp_lo(i64::from(rect.ymin) - oy),
        xmax: clamp_hi(i64::from(rect.xmax) - ox),
        ymax: clamp_hi(i64::from(rect.ymax) - oy),
    }
}

/// Classify one box and, when kept, remap it into the tile frame.
///
/// A truncated box always carries `truncated = true`; `difficult` is passed
/// through unchanged.
pub fn classify(
    bbox: &BoundingBox,
    tile: &Tile,
    policy: &ClassifyPolicy,
) -> Result<Classification, MalformedBox> {
    let status = inclusion_status(bbox, tile, policy);
    if !status.is_kept() {
        return Ok(Classification {
            status,
            tile_box: None,
        });
    }

    let rect = remap(&bbox.rect, tile);
    if !rect.is_well_formed() {
        return Err(MalformedBox {
            name: bbox.name.clone(),
            rect,
        });
    }

    let truncated = bbox.truncated || status == InclusionStatus::IncludedTruncated;
    Ok(Classification {
        status,
        tile_box: Some(TileBox {
            name: bbox.name.clone(),
            category_id: bbox.category_id,
            truncated,
            difficult: bbox.difficult,
            rect,
            status,
        }),
    })
}

/// Classify every source box against one tile, in source order.
pub fn classify_tile(
    boxes: &[BoundingBox],
    tile: &Tile,
    policy: &ClassifyPolicy,
) -> Result<TileClassification, MalformedBox> {
    let mut out = TileClassification::default();
    for bbox in boxes {
        match classify(bbox, tile, policy)?.tile_box {
            Some(tb) => out.kept.push(tb),
            None => out.excluded += 1,
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(x: u32, y: u32, size: u32) -> Tile {
        Tile {
            x,
            y,
            size,
            row: 0,
            col: 0,
        }
    }

    fn boxed(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> BoundingBox {
        BoundingBox::new("weed", PixelRect::new(xmin, ymin, xmax, ymax))
    }

    #[test]
    fn contained_box_keeps_source_coordinates_at_origin() {
        let policy = ClassifyPolicy::CONTAINED_ONLY;
        let c = classify(&boxed(100, 100, 200, 200), &tile(0, 0, 700), &policy).unwrap();
        assert_eq!(c.status, InclusionStatus::Included);
        let tb = c.tile_box.unwrap();
        assert_eq!(tb.rect, PixelRect::new(100, 100, 200, 200));
        assert!(!tb.truncated);
    }

    #[test]
    fn single_edge_crossing_is_truncated_and_clipped() {
        let policy = ClassifyPolicy {
            margin: 5,
            include_truncated: true,
        };
        let c = classify(&boxed(690, 100, 750, 200), &tile(0, 0, 700), &policy).unwrap();
        assert_eq!(c.status, InclusionStatus::IncludedTruncated);
        let tb = c.tile_box.unwrap();
        assert_eq!(tb.rect, PixelRect::new(690, 100, 700, 200));
        assert!(tb.truncated);
        assert!(!tb.difficult);
    }

    #[test]
    fn single_edge_crossing_is_dropped_without_truncation() {
        let policy = ClassifyPolicy {
            margin: 5,
            include_truncated: false,
        };
        let c = classify(&boxed(690, 100, 750, 200), &tile(0, 0, 700), &policy).unwrap();
        assert_eq!(c.status, InclusionStatus::Excluded);
        assert!(c.tile_box.is_none());
    }

    #[test]
    fn corner_box_is_excluded_regardless_of_policy() {
        let bbox = boxed(650, 650, 750, 750);
        for include_truncated in [true, false] {
            let policy = ClassifyPolicy {
                margin: 5,
                include_truncated,
            };
            let c = classify(&bbox, &tile(0, 0, 700), &policy).unwrap();
            assert_eq!(c.status, InclusionStatus::Excluded);
        }
    }

    #[test]
    fn box_beyond_tile_is_excluded() {
        let policy = ClassifyPolicy::default();
        let c = classify(&boxed(800, 100, 900, 200), &tile(0, 0, 700), &policy).unwrap();
        assert_eq!(c.status, InclusionStatus::Excluded);
    }

    #[test]
    fn box_inside_margin_band_is_truncated() {
        let policy = ClassifyPolicy::default();
        let c = classify(&boxed(703, 750, 800, 820), &tile(700, 700, 700), &policy).unwrap();
        assert_eq!(c.status, InclusionStatus::IncludedTruncated);
        assert_eq!(c.tile_box.unwrap().rect, PixelRect::new(3, 50, 100, 120));
    }

    #[test]
    fn left_edge_crossing_clamps_to_one() {
        let policy = ClassifyPolicy::default();
        let c = classify(&boxed(480, 600, 620, 700), &tile(560, 560, 700), &policy).unwrap();
        assert_eq!(c.status, InclusionStatus::IncludedTruncated);
        assert_eq!(c.tile_box.unwrap().rect, PixelRect::new(1, 40, 60, 140));
    }

    #[test]
    fn sliver_at_origin_is_malformed() {
        let policy = ClassifyPolicy {
            margin: 0,
            include_truncated: true,
        };
        let err = classify(&boxed(-10, 100, 1, 200), &tile(0, 0, 700), &policy).unwrap_err();
        assert_eq!(err.rect, PixelRect::new(1, 100, 1, 200));
    }

    #[test]
    fn reclassification_is_idempotent() {
        let policy = ClassifyPolicy::default();
        let bbox = boxed(690, 100, 750, 200);
        let t = tile(0, 0, 700);
        assert_eq!(
            classify(&bbox, &t, &policy).unwrap(),
            classify(&bbox, &t, &policy).unwrap()
        );
    }

    #[test]
    fn kept_boxes_stay_within_tile_bounds() {
        let policy = ClassifyPolicy::default();
        let boxes: Vec<BoundingBox> = (0..40)
            .map(|i| boxed(i * 37, i * 23, i * 37 + 90, i * 23 + 60))
            .collect();
        let t = tile(560, 280, 700);
        let res = classify_tile(&boxes, &t, &policy).unwrap();
        assert_eq!(res.kept.len() + res.excluded, boxes.len());
        for tb in &res.kept {
            let r = tb.rect;
            assert!(1 <= r.xmin && r.xmin < r.xmax && r.xmax <= 700);
            assert!(1 <= r.ymin && r.ymin < r.ymax && r.ymax <= 700);
        }
    }

    #[test]
    fn source_flags_pass_through() {
        let policy = ClassifyPolicy::default();
        let mut bbox = boxed(100, 100, 200, 200);
        bbox.difficult = true;
        bbox.category_id = Some(3);
        let tb = classify(&bbox, &tile(0, 0, 700), &policy)
            .unwrap()
            .tile_box
            .unwrap();
        assert!(tb.difficult);
        assert!(!tb.truncated);
        assert_eq!(tb.category_id, Some(3));
    }
}
