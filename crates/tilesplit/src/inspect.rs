//! Read-only views over a written catalog.

use std::path::Path;

use tilesplit_annotations::{Catalog, CatalogEntry};

use crate::error::SplitError;

/// Load a catalog and list `(annotation file, category)` per annotation.
///
/// Ids are resolved by lookup, so catalogs whose ids are not list positions
/// are listed correctly too.
pub fn list_catalog(path: impl AsRef<Path>) -> Result<Vec<CatalogEntry>, SplitError> {
    let catalog = Catalog::load_json(path)?;
    Ok(catalog.listing()?)
}

/// `<tile-stem>.xml:<category>`
pub fn format_entry(entry: &CatalogEntry) -> String {
    format!("{}:{}", entry.annotation_file, entry.category)
}
