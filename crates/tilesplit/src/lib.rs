//! Split large annotated rasters into overlapping square tiles.
//!
//! Each source image under `<input>/images/` is paired with a Pascal VOC file
//! under `<input>/annotations/` sharing its stem. The image is cut into a grid
//! of overlapping tiles; every source box is classified against every tile and
//! the kept boxes are remapped into tile-local pixels. Annotations go out
//! either as one VOC record per tile or as one COCO-style catalog for the run.
//!
//! ## Quickstart
//!
//! ```no_run
//! use tilesplit::{split, OutputFormat, SplitConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SplitConfig {
//!     input_dirs: vec!["survey/2023".into()],
//!     output_dir: "tiles".into(),
//!     output: OutputFormat::Catalog,
//!     ..SplitConfig::default()
//! };
//! let report = split(config)?;
//! println!("{} tiles written", report.summary.tiles_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `tilesplit::core`: grid planning, box classification and remapping.
//! - `tilesplit::annotations`: VOC records and the catalog.
//! - [`Splitter`]: the per-directory, per-image, per-tile pipeline.

pub use tilesplit_annotations as annotations;
pub use tilesplit_core as core;

mod aggregate;
mod config;
mod error;
mod inspect;
mod pipeline;
mod tile;

pub use aggregate::{Aggregator, RecordOutcome, TileRecord};
pub use config::{ConfigError, OutputFormat, RunMode, SplitConfig};
pub use error::SplitError;
pub use inspect::{format_entry, list_catalog};
pub use pipeline::{split, SplitReport, SplitSummary, Splitter};
pub use tile::{extract, load_image, Degeneracy, TileCrop};
