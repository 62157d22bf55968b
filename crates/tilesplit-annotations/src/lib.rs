//! Annotation formats for tiled detection datasets.
//!
//! - [`voc`]: per-image / per-tile Pascal VOC XML records.
//! - [`store`]: loading the boxes of one source image.
//! - [`catalog`]: a corpus-wide COCO-style catalog with dense ids.

pub mod catalog;
pub mod store;
pub mod voc;

pub use catalog::{
    Catalog, CatalogAnnotation, CatalogBuilder, CatalogCategory, CatalogEntry, CatalogError,
    CatalogImage, CategoryRegistry,
};
pub use store::{load_boxes, AnnotationSet};
pub use voc::{VocBndBox, VocError, VocObject, VocRecord, VocSize, TILE_DEPTH};
