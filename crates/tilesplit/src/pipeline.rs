//! Directory → image → tile control flow.

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, GenericImageView};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tilesplit_annotations::{load_boxes, AnnotationSet, Catalog};
use tilesplit_core::{classify_tile, plan_tiles};
use walkdir::WalkDir;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::aggregate::{Aggregator, TileRecord};
use crate::config::{RunMode, SplitConfig};
use crate::error::SplitError;
use crate::tile::{extract, load_image, Degeneracy};

/// Counters accumulated over one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub images_processed: usize,
    /// Undecodable images and images without an annotation file.
    pub images_skipped: usize,
    /// Missing input directories or input directories without `images/`.
    pub dirs_skipped: usize,
    /// Entries of `images/` not matching the extension filter.
    pub files_ignored: usize,
    pub tiles_planned: usize,
    pub tiles_written: usize,
    pub blank_tiles: usize,
    /// Edge remnants dropped by remainder elimination.
    pub partial_tiles: usize,
    pub boxes_kept: usize,
    pub boxes_truncated: usize,
    pub boxes_excluded: usize,
    pub dummy_objects: usize,
}

/// Result of [`Splitter::run`].
#[derive(Clone, Debug)]
pub struct SplitReport {
    pub summary: SplitSummary,
    /// The catalog written at the end of a catalog-mode run.
    pub catalog: Option<Catalog>,
}

/// One split run over every configured input directory.
#[derive(Debug)]
pub struct Splitter {
    config: SplitConfig,
    /// `None` in predict mode.
    aggregator: Option<Aggregator>,
    summary: SplitSummary,
}

impl Splitter {
    /// Validate `config` and set up the output mode.
    pub fn new(config: SplitConfig) -> Result<Self, SplitError> {
        config.validate()?;
        let aggregator = match config.mode {
            RunMode::Train => Some(Aggregator::for_config(&config)),
            RunMode::Predict => None,
        };
        Ok(Self {
            config,
            aggregator,
            summary: SplitSummary::default(),
        })
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    pub fn summary(&self) -> &SplitSummary {
        &self.summary
    }

    /// Process every input directory in order, then flush the aggregator.
    pub fn run(mut self) -> Result<SplitReport, SplitError> {
        let images_out = self.config.images_out();
        fs::create_dir_all(&images_out).map_err(|source| SplitError::CreateDir {
            path: images_out.clone(),
            source,
        })?;
        if let Some(aggregator) = &self.aggregator {
            aggregator.prepare()?;
        }

        let dirs = self.config.input_dirs.clone();
        for dir in &dirs {
            self.process_dir(dir)?;
        }

        let catalog = match self.aggregator.take() {
            Some(aggregator) => aggregator.finish()?,
            None => None,
        };
        let s = &self.summary;
        info!(
            "done: {} images ({} skipped), {} of {} tiles written, {} boxes kept ({} truncated), {} excluded",
            s.images_processed,
            s.images_skipped,
            s.tiles_written,
            s.tiles_planned,
            s.boxes_kept,
            s.boxes_truncated,
            s.boxes_excluded
        );
        Ok(SplitReport {
            summary: self.summary,
            catalog,
        })
    }

    fn process_dir(&mut self, dir: &Path) -> Result<(), SplitError> {
        if !dir.is_dir() {
            warn!("input directory {} does not exist, skipping", dir.display());
            self.summary.dirs_skipped += 1;
            return Ok(());
        }
        let images_dir = dir.join("images");
        if !images_dir.is_dir() {
            warn!("{} has no images/ directory, skipping", dir.display());
            self.summary.dirs_skipped += 1;
            return Ok(());
        }
        let annotations_dir = dir.join("annotations");
        info!("processing {}", dir.display());

        let walker = WalkDir::new(&images_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("cannot read entry in {}: {err}", images_dir.display());
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() {
                debug!("ignoring non-file entry {}", path.display());
                self.summary.files_ignored += 1;
            } else if !self.config.matches_extension(path) {
                debug!(
                    "ignoring {}: extension is not .{}",
                    path.display(),
                    self.config.normalized_extension()
                );
                self.summary.files_ignored += 1;
            } else {
                self.process_image(path, &annotations_dir)?;
            }
        }
        Ok(())
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(path = %path.display()))
    )]
    fn process_image(&mut self, path: &Path, annotations_dir: &Path) -> Result<(), SplitError> {
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            return Ok(());
        };

        let annotations = match self.config.mode {
            RunMode::Predict => AnnotationSet::default(),
            RunMode::Train => {
                let xml = annotations_dir.join(format!("{stem}.xml"));
                if !xml.is_file() {
                    warn!(
                        "no annotation file {} for {}, skipping",
                        xml.display(),
                        path.display()
                    );
                    self.summary.images_skipped += 1;
                    return Ok(());
                }
                load_boxes(&xml)?
            }
        };

        let img = match load_image(path) {
            Ok(img) => img,
            Err(err) => {
                warn!("{err}, skipping");
                self.summary.images_skipped += 1;
                return Ok(());
            }
        };

        self.process_decoded(&stem, &img, &annotations)?;
        self.summary.images_processed += 1;
        Ok(())
    }

    fn process_decoded(
        &mut self,
        stem: &str,
        img: &DynamicImage,
        annotations: &AnnotationSet,
    ) -> Result<(), SplitError> {
        let (width, height) = img.dimensions();
        let (geometry, adjustment) = self.config.geometry_for(width, height)?;
        if let Some(adj) = adjustment {
            debug!(
                "{stem}: {}x{} -> crop {} stride {} ({} tiles along {:?}, remainder {:.3})",
                width,
                height,
                adj.geometry.crop_size,
                adj.geometry.stride,
                adj.tiles,
                adj.basis,
                adj.remainder
            );
        }

        let tiles = plan_tiles(width, height, geometry);
        let policy = self.config.classify_policy();
        let require_full = self.config.eliminate_remainder;
        let images_out = self.config.images_out();
        let ext = self.config.normalized_extension();
        self.summary.tiles_planned += tiles.len();

        let mut written = 0usize;
        let mut kept = 0usize;
        for tile in &tiles {
            let id = tile.id(stem);
            let crop = extract(img, tile);
            if let Some(reason) = crop.degeneracy(require_full) {
                debug!("skipping tile {id}: {reason:?}");
                match reason {
                    Degeneracy::Blank => self.summary.blank_tiles += 1,
                    Degeneracy::Partial => self.summary.partial_tiles += 1,
                }
                continue;
            }

            let file_name = format!("{id}.{ext}");
            let tile_path: PathBuf = images_out.join(&file_name);
            let Some(aggregator) = self.aggregator.as_mut() else {
                crop.write(&tile_path)?;
                written += 1;
                continue;
            };

            let classified = classify_tile(&annotations.boxes, tile, &policy).map_err(
                |source| SplitError::MalformedGeometry {
                    tile: id.clone(),
                    source,
                },
            )?;
            crop.write(&tile_path)?;
            written += 1;

            let record = TileRecord {
                id: &id,
                file_name: &file_name,
                width: crop.width,
                height: crop.height,
            };
            let outcome = aggregator.record(&record, &classified.kept)?;
            kept += outcome.boxes;
            self.summary.boxes_kept += outcome.boxes;
            self.summary.boxes_truncated += classified.truncated();
            self.summary.boxes_excluded += classified.excluded;
            if outcome.dummy {
                self.summary.dummy_objects += 1;
            }
        }
        self.summary.tiles_written += written;

        info!(
            "{stem}: {} tiles planned, {written} written, {kept} boxes kept",
            tiles.len()
        );
        Ok(())
    }
}

/// Run a split with `config` from start to finish.
pub fn split(config: SplitConfig) -> Result<SplitReport, SplitError> {
    Splitter::new(config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use image::{Rgb, RgbImage};
    use tilesplit_core::{BoundingBox, PixelRect, Stride};

    fn splitter(output: &Path, format: OutputFormat) -> Splitter {
        let config = SplitConfig {
            input_dirs: vec![PathBuf::from("unused")],
            output_dir: output.to_path_buf(),
            crop_size: 100,
            stride: Stride::Pixels(20),
            eliminate_remainder: false,
            margin: 0,
            output: format,
            ..SplitConfig::default()
        };
        Splitter::new(config).unwrap()
    }

    fn prepare(s: &Splitter) {
        fs::create_dir_all(s.config.images_out()).unwrap();
        s.aggregator.as_ref().unwrap().prepare().unwrap();
    }

    #[test]
    fn in_memory_image_counts_tiles_and_boxes() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = splitter(dir.path(), OutputFormat::Catalog);
        prepare(&s);

        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(180, 100, Rgb([50, 60, 70])));
        let annotations = AnnotationSet::from_boxes([
            BoundingBox::new("weed", PixelRect::new(10, 10, 40, 40)),
            BoundingBox::new("weed", PixelRect::new(90, 10, 120, 40)),
        ]);
        s.process_decoded("field", &img, &annotations).unwrap();

        // step 80: x in {0, 80, 160}, y in {0, 80}
        assert_eq!(s.summary.tiles_planned, 6);
        assert_eq!(s.summary.tiles_written, 6);
        assert!(dir.path().join("images/field_000_002.png").is_file());
        assert!(s.summary.boxes_truncated >= 1);
        assert!(s.summary.boxes_kept >= 2);
    }

    #[test]
    fn malformed_box_reports_tile_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = splitter(dir.path(), OutputFormat::Xml);
        prepare(&s);

        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([1, 1, 1])));
        // Only xmin crosses the edge; clamping it to 1 collapses the box.
        let annotations = AnnotationSet::from_boxes([BoundingBox::new(
            "sliver",
            PixelRect::new(-10, 10, 1, 40),
        )]);
        let err = s.process_decoded("edge", &img, &annotations).unwrap_err();
        match err {
            SplitError::MalformedGeometry { tile, .. } => assert_eq!(tile, "edge_000_000"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
