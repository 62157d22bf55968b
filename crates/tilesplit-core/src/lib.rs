//! Core geometry for splitting annotated rasters into tiles.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! decode pixels or parse annotation files; it plans tile grids, classifies
//! source boxes against tiles and remaps the kept ones into tile-local
//! coordinates.

mod bbox;
mod classify;
mod grid;
mod logger;

pub use bbox::{BoundingBox, InclusionStatus, PixelRect, TileBox};
pub use classify::{
    classify, classify_tile, inclusion_status, remap, Classification, ClassifyPolicy,
    MalformedBox, TileClassification,
};
pub use grid::{
    eliminate_remainder, plan_tiles, Axis, GridError, RemainderAdjustment, Stride, Tile,
    TileGeometry,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity, warning_count};
