use std::path::PathBuf;

use tilesplit_annotations::{CatalogError, VocError};
use tilesplit_core::{GridError, MalformedBox};

use crate::config::ConfigError;

/// Errors produced by a split run.
///
/// Decode failures of individual source images are logged and skipped by the
/// pipeline; every other variant aborts the run.
#[derive(thiserror::Error, Debug)]
pub enum SplitError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Voc(#[from] VocError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to write tile {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to create {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("tile {tile}: {source}")]
    MalformedGeometry {
        tile: String,
        #[source]
        source: MalformedBox,
    },
}
