//! Corpus-wide COCO-style catalog.
//!
//! Image, annotation and category ids are dense and start at 0. They are
//! handed out by [`CatalogBuilder`] in strict processing order and are never
//! reused within a run.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tilesplit_core::TileBox;

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("catalog io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("annotation {annotation} refers to unknown image {image_id}")]
    UnknownImage { annotation: u64, image_id: u64 },
    #[error("annotation {annotation} refers to unknown category {category_id}")]
    UnknownCategory { annotation: u64, category_id: u32 },
}

/// Category label to dense id, assigned in first-seen order. Append-only.
#[derive(Clone, Debug, Default)]
pub struct CategoryRegistry {
    names: Vec<String>,
    ids: HashMap<String, u32>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, allocating the next one on first sight.
    pub fn register(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_owned());
        self.ids.insert(name.to_owned(), id);
        id
    }

    pub fn id(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: u32) -> Option<&str> {
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `{id, name}` records in id order.
    pub fn categories(&self) -> Vec<CatalogCategory> {
        self.names
            .iter()
            .enumerate()
            .map(|(id, name)| CatalogCategory {
                id: id as u32,
                name: name.clone(),
            })
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogImage {
    pub id: u64,
    pub file_name: String,
    pub height: u32,
    pub width: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogAnnotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u32,
    /// `[x, y, width, height]` in tile pixels.
    pub bbox: [i32; 4],
    pub area: i64,
    pub segmentation: Vec<Vec<i32>>,
    pub iscrowd: u8,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCategory {
    pub id: u32,
    pub name: String,
}

/// One `(annotation file, category)` pair from [`Catalog::listing`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub annotation_file: String,
    pub category: String,
}

/// Serialized catalog: `{images, annotations, categories}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    pub images: Vec<CatalogImage>,
    pub annotations: Vec<CatalogAnnotation>,
    pub categories: Vec<CatalogCategory>,
}

impl Catalog {
    /// Load a catalog from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this catalog to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CatalogError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check that every annotation points at a known image and category.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let images: HashSet<u64> = self.images.iter().map(|i| i.id).collect();
        let categories: HashSet<u32> = self.categories.iter().map(|c| c.id).collect();
        for ann in &self.annotations {
            if !images.contains(&ann.image_id) {
                return Err(CatalogError::UnknownImage {
                    annotation: ann.id,
                    image_id: ann.image_id,
                });
            }
            if !categories.contains(&ann.category_id) {
                return Err(CatalogError::UnknownCategory {
                    annotation: ann.id,
                    category_id: ann.category_id,
                });
            }
        }
        Ok(())
    }

    /// One entry per annotation: the per-tile `.xml` name it would live in
    /// and its category label, resolved by id.
    pub fn listing(&self) -> Result<Vec<CatalogEntry>, CatalogError> {
        let images: HashMap<u64, &str> = self
            .images
            .iter()
            .map(|i| (i.id, i.file_name.as_str()))
            .collect();
        let categories: HashMap<u32, &str> = self
            .categories
            .iter()
            .map(|c| (c.id, c.name.as_str()))
            .collect();

        self.annotations
            .iter()
            .map(|ann| -> Result<CatalogEntry, CatalogError> {
                let file_name = images.get(&ann.image_id).ok_or(CatalogError::UnknownImage {
                    annotation: ann.id,
                    image_id: ann.image_id,
                })?;
                let category =
                    categories
                        .get(&ann.category_id)
                        .ok_or(CatalogError::UnknownCategory {
                            annotation: ann.id,
                            category_id: ann.category_id,
                        })?;
                let stem = Path::new(file_name)
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| (*file_name).to_owned());
                Ok(CatalogEntry {
                    annotation_file: format!("{stem}.xml"),
                    category: (*category).to_owned(),
                })
            })
            .collect()
    }
}

/// Owns the run-wide id counters and category registry.
#[derive(Clone, Debug, Default)]
pub struct CatalogBuilder {
    images: Vec<CatalogImage>,
    annotations: Vec<CatalogAnnotation>,
    registry: CategoryRegistry,
    next_image_id: u64,
    next_annotation_id: u64,
}

impl CatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an image record and return its freshly allocated id.
    pub fn add_image(&mut self, file_name: impl Into<String>, width: u32, height: u32) -> u64 {
        let id = self.next_image_id;
        self.next_image_id += 1;
        self.images.push(CatalogImage {
            id,
            file_name: file_name.into(),
            height,
            width,
        });
        id
    }

    /// Append an annotation for `tile_box` on image `image_id`.
    ///
    /// The category is registered on first use, so every emitted
    /// `category_id` has a matching registry entry.
    pub fn add_annotation(&mut self, image_id: u64, tile_box: &TileBox) -> u64 {
        let id = self.next_annotation_id;
        self.next_annotation_id += 1;
        let category_id = self.registry.register(&tile_box.name);
        let rect = tile_box.rect;
        self.annotations.push(CatalogAnnotation {
            id,
            image_id,
            category_id,
            bbox: rect.to_xywh(),
            area: rect.area(),
            segmentation: vec![rect.outline().to_vec()],
            iscrowd: 0,
        });
        id
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    pub fn annotation_count(&self) -> usize {
        self.annotations.len()
    }

    pub fn finish(self) -> Catalog {
        Catalog {
            categories: self.registry.categories(),
            images: self.images,
            annotations: self.annotations,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilesplit_core::{InclusionStatus, PixelRect};

    fn tile_box(name: &str, rect: PixelRect) -> TileBox {
        TileBox {
            name: name.to_string(),
            category_id: None,
            truncated: false,
            difficult: false,
            rect,
            status: InclusionStatus::Included,
        }
    }

    #[test]
    fn registry_keeps_first_seen_ids() {
        let mut reg = CategoryRegistry::new();
        assert_eq!(reg.register("dock"), 0);
        assert_eq!(reg.register("thistle"), 1);
        assert_eq!(reg.register("dock"), 0);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.name(1), Some("thistle"));
        assert_eq!(reg.id("nettle"), None);
    }

    #[test]
    fn builder_allocates_monotonic_ids_across_images() {
        let mut b = CatalogBuilder::new();
        let img0 = b.add_image("a_000_000.png", 700, 700);
        let a0 = b.add_annotation(img0, &tile_box("dock", PixelRect::new(10, 20, 40, 60)));
        let img1 = b.add_image("a_000_001.png", 700, 700);
        let img2 = b.add_image("b_000_000.png", 700, 700);
        let a1 = b.add_annotation(img2, &tile_box("thistle", PixelRect::new(1, 1, 5, 5)));
        let a2 = b.add_annotation(img2, &tile_box("dock", PixelRect::new(2, 2, 6, 6)));
        assert_eq!((img0, img1, img2), (0, 1, 2));
        assert_eq!((a0, a1, a2), (0, 1, 2));

        let cat = b.finish();
        assert!(cat.validate().is_ok());
        let first = &cat.annotations[0];
        assert_eq!(first.bbox, [10, 20, 30, 40]);
        assert_eq!(first.area, 1200);
        assert_eq!(first.segmentation, vec![vec![10, 20, 40, 20, 40, 60, 10, 60]]);
        assert_eq!(first.iscrowd, 0);

        let max_cat = cat.annotations.iter().map(|a| a.category_id).max();
        assert_eq!(max_cat, Some(cat.categories.len() as u32 - 1));
        assert_eq!(cat.annotations[2].category_id, 0);
        assert_eq!(cat.annotations[2].image_id, 2);
    }

    #[test]
    fn image_without_annotations_is_kept() {
        let mut b = CatalogBuilder::new();
        b.add_image("empty.png", 64, 64);
        let cat = b.finish();
        assert_eq!(cat.images.len(), 1);
        assert!(cat.annotations.is_empty());
        assert!(cat.categories.is_empty());
    }

    #[test]
    fn listing_resolves_ids() {
        let mut b = CatalogBuilder::new();
        let img = b.add_image("field_001_002.png", 700, 700);
        b.add_annotation(img, &tile_box("nettle", PixelRect::new(3, 3, 9, 9)));
        let cat = b.finish();
        let listing = cat.listing().unwrap();
        assert_eq!(
            listing,
            vec![CatalogEntry {
                annotation_file: "field_001_002.xml".to_string(),
                category: "nettle".to_string(),
            }]
        );
    }

    #[test]
    fn dangling_category_is_rejected() {
        let mut cat = Catalog::default();
        cat.images.push(CatalogImage {
            id: 0,
            file_name: "x.png".into(),
            height: 1,
            width: 1,
        });
        cat.annotations.push(CatalogAnnotation {
            id: 7,
            image_id: 0,
            category_id: 3,
            bbox: [0, 0, 1, 1],
            area: 1,
            segmentation: vec![],
            iscrowd: 0,
        });
        assert!(matches!(
            cat.validate(),
            Err(CatalogError::UnknownCategory {
                annotation: 7,
                category_id: 3
            })
        ));
        assert!(cat.listing().is_err());
    }

    #[test]
    fn json_schema_field_names() {
        let mut b = CatalogBuilder::new();
        let img = b.add_image("t.png", 10, 12);
        b.add_annotation(img, &tile_box("dock", PixelRect::new(1, 1, 3, 4)));
        let value = serde_json::to_value(b.finish()).unwrap();
        assert_eq!(value["images"][0]["file_name"], "t.png");
        assert_eq!(value["images"][0]["height"], 12);
        assert_eq!(value["annotations"][0]["bbox"], serde_json::json!([1, 1, 2, 3]));
        assert_eq!(value["annotations"][0]["area"], 6);
        assert_eq!(value["annotations"][0]["iscrowd"], 0);
        assert_eq!(value["categories"][0]["name"], "dock");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coco.json");
        let cat: Catalog = serde_json::from_value(value).unwrap();
        cat.write_json(&path).unwrap();
        assert_eq!(Catalog::load_json(&path).unwrap(), cat);
    }
}
