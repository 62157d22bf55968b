//! Source annotations for one image.

use std::path::Path;

use tilesplit_core::BoundingBox;

use crate::voc::{VocError, VocRecord};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Boxes of one source image plus the category labels they use.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnnotationSet {
    pub boxes: Vec<BoundingBox>,
    /// Labels in first-seen order, without duplicates.
    pub categories: Vec<String>,
}

impl AnnotationSet {
    /// Build a set from boxes, discovering categories in first-seen order.
    ///
    /// Each box gets `category_id` set to its label's index in
    /// [`AnnotationSet::categories`]; a label seen twice keeps its first id.
    /// These ids are local to one source file. The catalog assigns its own
    /// run-wide ids by label and never reads them.
    pub fn from_boxes(boxes: impl IntoIterator<Item = BoundingBox>) -> Self {
        let mut set = AnnotationSet::default();
        for mut bbox in boxes {
            let id = match set.categories.iter().position(|c| *c == bbox.name) {
                Some(idx) => idx,
                None => {
                    set.categories.push(bbox.name.clone());
                    set.categories.len() - 1
                }
            };
            bbox.category_id = Some(id as u32);
            set.boxes.push(bbox);
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// Load the boxes of one source annotation file.
///
/// Coordinates are taken as given; they are not re-validated here.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(path = %path.as_ref().display()))
)]
pub fn load_boxes(path: impl AsRef<Path>) -> Result<AnnotationSet, VocError> {
    let path = path.as_ref();
    let record = VocRecord::read(path)?;
    let set = AnnotationSet::from_boxes(record.objects.iter().map(|o| o.to_bounding_box()));
    log::debug!(
        "{}: {} boxes in {} categories",
        path.display(),
        set.boxes.len(),
        set.categories.len()
    );
    Ok(set)
}
