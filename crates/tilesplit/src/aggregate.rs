//! Output modes: per-tile VOC records or one run-wide catalog.
//!
//! Both modes see exactly the same tiles and kept boxes; they differ only in
//! what they do with them.

use std::fs;
use std::path::PathBuf;

use tilesplit_annotations::{Catalog, CatalogBuilder, VocRecord};
use tilesplit_core::TileBox;

use crate::config::{OutputFormat, SplitConfig};
use crate::error::SplitError;

/// Metadata of one written tile.
#[derive(Clone, Copy, Debug)]
pub struct TileRecord<'a> {
    /// Stable identifier, also the output file stem.
    pub id: &'a str,
    pub file_name: &'a str,
    pub width: u32,
    pub height: u32,
}

/// What [`Aggregator::record`] emitted for one tile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    pub boxes: usize,
    pub dummy: bool,
}

#[derive(Debug)]
pub enum Aggregator {
    Voc {
        annotations_dir: PathBuf,
        /// Injected into tiles with no kept boxes.
        dummy: Option<TileBox>,
    },
    Catalog {
        builder: CatalogBuilder,
        path: PathBuf,
    },
}

impl Aggregator {
    pub fn for_config(cfg: &SplitConfig) -> Self {
        match cfg.output {
            OutputFormat::Xml => Aggregator::Voc {
                annotations_dir: cfg.annotations_out(),
                dummy: cfg.dummy(),
            },
            OutputFormat::Catalog => Aggregator::Catalog {
                builder: CatalogBuilder::new(),
                path: cfg.catalog_path(),
            },
        }
    }

    /// Create output directories this mode writes into.
    pub fn prepare(&self) -> Result<(), SplitError> {
        let dir = match self {
            Aggregator::Voc {
                annotations_dir, ..
            } => annotations_dir.clone(),
            Aggregator::Catalog { path, .. } => match path.parent() {
                Some(parent) => parent.to_path_buf(),
                None => return Ok(()),
            },
        };
        fs::create_dir_all(&dir).map_err(|source| SplitError::CreateDir { path: dir, source })
    }

    /// Record one non-degenerate tile and its kept boxes.
    pub fn record(
        &mut self,
        tile: &TileRecord<'_>,
        boxes: &[TileBox],
    ) -> Result<RecordOutcome, SplitError> {
        match self {
            Aggregator::Voc {
                annotations_dir,
                dummy,
            } => {
                let placeholder = match (boxes.is_empty(), dummy.as_ref()) {
                    (true, Some(d)) => Some(std::slice::from_ref(d)),
                    _ => None,
                };
                let objects = placeholder.unwrap_or(boxes);
                let record = VocRecord::for_tile(tile.file_name, tile.width, tile.height, objects);
                record.write(annotations_dir.join(format!("{}.xml", tile.id)))?;
                Ok(RecordOutcome {
                    boxes: boxes.len(),
                    dummy: placeholder.is_some(),
                })
            }
            Aggregator::Catalog { builder, .. } => {
                let image_id = builder.add_image(tile.file_name, tile.width, tile.height);
                for tb in boxes {
                    builder.add_annotation(image_id, tb);
                }
                Ok(RecordOutcome {
                    boxes: boxes.len(),
                    dummy: false,
                })
            }
        }
    }

    /// Flush run-wide output. Returns the catalog in catalog mode.
    pub fn finish(self) -> Result<Option<Catalog>, SplitError> {
        match self {
            Aggregator::Voc { .. } => Ok(None),
            Aggregator::Catalog { builder, path } => {
                let catalog = builder.finish();
                catalog.write_json(&path)?;
                log::info!(
                    "wrote catalog {} ({} images, {} annotations, {} categories)",
                    path.display(),
                    catalog.images.len(),
                    catalog.annotations.len(),
                    catalog.categories.len()
                );
                Ok(Some(catalog))
            }
        }
    }
}
