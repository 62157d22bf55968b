//! Run configuration: JSON load/write, validation and derived settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tilesplit_core::{
    eliminate_remainder, ClassifyPolicy, GridError, PixelRect, RemainderAdjustment, Stride,
    TileBox, TileGeometry,
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("config io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("no input directories given")]
    NoInputs,
    #[error("file extension filter is empty")]
    EmptyExtension,
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("margin {margin} leaves no interior in a {crop_size}px tile")]
    MarginTooLarge { margin: u32, crop_size: u32 },
    #[error("dummy box {0:?} must satisfy 1 <= xmin < xmax <= crop size (same for y)")]
    InvalidDummyBox([i32; 4]),
}

/// Shape of the annotation output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// One VOC XML record per written tile.
    #[default]
    Xml,
    /// One COCO-style catalog for the whole run.
    Catalog,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Train,
    /// Tile pixels only; no annotations are read or written.
    Predict,
}

/// Everything a split run needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Directories holding `images/` and `annotations/`.
    pub input_dirs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub crop_size: u32,
    pub stride: Stride,
    /// Image extension filter, case-insensitive, leading dot optional.
    pub extension: String,
    pub margin: u32,
    pub include_truncated: bool,
    pub dummy_object: bool,
    pub dummy_box: [i32; 4],
    pub dummy_name: String,
    pub eliminate_remainder: bool,
    pub output: OutputFormat,
    pub mode: RunMode,
    pub catalog_name: String,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            input_dirs: Vec::new(),
            output_dir: PathBuf::from("tiles"),
            crop_size: 700,
            stride: Stride::default(),
            extension: "png".to_string(),
            margin: 5,
            include_truncated: true,
            dummy_object: false,
            dummy_box: [1, 1, 3, 4],
            dummy_name: "dummy".to_string(),
            eliminate_remainder: true,
            output: OutputFormat::Xml,
            mode: RunMode::Train,
            catalog_name: "coco_annotation.json".to_string(),
        }
    }
}

impl SplitConfig {
    /// Load a JSON config from disk. Missing fields take their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input_dirs.is_empty() {
            return Err(ConfigError::NoInputs);
        }
        if self.normalized_extension().is_empty() {
            return Err(ConfigError::EmptyExtension);
        }
        let geometry = TileGeometry::with_stride(self.crop_size, self.stride)?;
        if self.eliminate_remainder {
            self.stride.to_fraction(self.crop_size)?;
        }
        if u64::from(self.margin) * 2 >= u64::from(geometry.crop_size) {
            return Err(ConfigError::MarginTooLarge {
                margin: self.margin,
                crop_size: geometry.crop_size,
            });
        }
        let [xmin, ymin, xmax, ymax] = self.dummy_box;
        let size = i64::from(self.crop_size);
        let axis_ok = |lo: i32, hi: i32| 1 <= lo && lo < hi && i64::from(hi) <= size;
        if self.dummy_object && !(axis_ok(xmin, xmax) && axis_ok(ymin, ymax)) {
            return Err(ConfigError::InvalidDummyBox(self.dummy_box));
        }
        Ok(())
    }

    /// Lower-case extension without the leading dot.
    pub fn normalized_extension(&self) -> String {
        self.extension.trim().trim_start_matches('.').to_ascii_lowercase()
    }

    pub fn matches_extension(&self, path: &Path) -> bool {
        let wanted = self.normalized_extension();
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase() == wanted)
            .unwrap_or(false)
    }

    pub fn classify_policy(&self) -> ClassifyPolicy {
        ClassifyPolicy {
            margin: self.margin,
            include_truncated: self.include_truncated,
        }
    }

    /// Tile geometry for one image, plus the adjustment that produced it when
    /// remainder elimination is on.
    pub fn geometry_for(
        &self,
        width: u32,
        height: u32,
    ) -> Result<(TileGeometry, Option<RemainderAdjustment>), GridError> {
        if self.eliminate_remainder {
            let fraction = self.stride.to_fraction(self.crop_size)?;
            let adj = eliminate_remainder(width, height, self.crop_size, fraction)?;
            Ok((adj.geometry, Some(adj)))
        } else {
            Ok((TileGeometry::with_stride(self.crop_size, self.stride)?, None))
        }
    }

    /// Placeholder injected into empty tiles, if enabled.
    pub fn dummy(&self) -> Option<TileBox> {
        if !self.dummy_object {
            return None;
        }
        let [xmin, ymin, xmax, ymax] = self.dummy_box;
        Some(TileBox::placeholder(
            self.dummy_name.clone(),
            PixelRect::new(xmin, ymin, xmax, ymax),
        ))
    }

    pub fn images_out(&self) -> PathBuf {
        self.output_dir.join("images")
    }

    pub fn annotations_out(&self) -> PathBuf {
        self.output_dir.join("annotations")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.output_dir.join(&self.catalog_name)
    }
}
