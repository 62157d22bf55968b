//! Pascal VOC style XML records.
//!
//! Source annotation files and per-tile output records share one schema:
//! `annotation{filename, size{width,height,depth}, object*{name, truncated,
//! difficult, bndbox{xmin,ymin,xmax,ymax}}}`. Unknown elements in source
//! files (`folder`, `pose`, `segmented`, ...) are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tilesplit_core::{BoundingBox, PixelRect, TileBox};

/// Colour depth written into every per-tile record.
pub const TILE_DEPTH: u32 = 3;

#[derive(thiserror::Error, Debug)]
pub enum VocError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: quick_xml::de::DeError,
    },
    #[error(transparent)]
    Serialize(#[from] quick_xml::se::SeError),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocSize {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocBndBox {
    #[serde(with = "coord")]
    pub xmin: i32,
    #[serde(with = "coord")]
    pub ymin: i32,
    #[serde(with = "coord")]
    pub xmax: i32,
    #[serde(with = "coord")]
    pub ymax: i32,
}

impl From<PixelRect> for VocBndBox {
    fn from(r: PixelRect) -> Self {
        Self {
            xmin: r.xmin,
            ymin: r.ymin,
            xmax: r.xmax,
            ymax: r.ymax,
        }
    }
}

impl From<VocBndBox> for PixelRect {
    fn from(b: VocBndBox) -> Self {
        PixelRect::new(b.xmin, b.ymin, b.xmax, b.ymax)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocObject {
    pub name: String,
    #[serde(default, with = "flag")]
    pub truncated: bool,
    #[serde(default, with = "flag")]
    pub difficult: bool,
    pub bndbox: VocBndBox,
}

impl VocObject {
    pub fn to_bounding_box(&self) -> BoundingBox {
        BoundingBox {
            name: self.name.clone(),
            category_id: None,
            truncated: self.truncated,
            difficult: self.difficult,
            rect: self.bndbox.into(),
        }
    }
}

impl From<&TileBox> for VocObject {
    fn from(tb: &TileBox) -> Self {
        Self {
            name: tb.name.clone(),
            truncated: tb.truncated,
            difficult: tb.difficult,
            bndbox: tb.rect.into(),
        }
    }
}

/// One VOC annotation document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "annotation")]
pub struct VocRecord {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub size: VocSize,
    #[serde(default, rename = "object")]
    pub objects: Vec<VocObject>,
}

impl VocRecord {
    /// Self-contained record for one written tile.
    pub fn for_tile(
        filename: impl Into<String>,
        width: u32,
        height: u32,
        boxes: &[TileBox],
    ) -> Self {
        Self {
            filename: filename.into(),
            size: VocSize {
                width,
                height,
                depth: TILE_DEPTH,
            },
            objects: boxes.iter().map(VocObject::from).collect(),
        }
    }

    /// Load a record from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, VocError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| VocError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        quick_xml::de::from_str(&raw).map_err(|source| VocError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Render as indented XML.
    pub fn to_xml_string(&self) -> Result<String, VocError> {
        let mut out = String::new();
        let mut ser = quick_xml::se::Serializer::new(&mut out);
        ser.indent(' ', 2);
        self.serialize(ser)?;
        out.push('\n');
        Ok(out)
    }

    /// Write the record to disk as XML.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), VocError> {
        let path = path.as_ref();
        let xml = self.to_xml_string()?;
        fs::write(path, xml).map_err(|source| VocError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// VOC flags are `0`/`1` on disk; some tools write `true`/`false`.
mod flag {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*v))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(d)?;
        match raw.trim() {
            "" | "false" => Ok(false),
            "true" => Ok(true),
            other => other
                .parse::<i64>()
                .map(|v| v != 0)
                .map_err(|_| D::Error::custom(format!("invalid flag `{other}`"))),
        }
    }
}

/// Coordinates are integers on write; on read, labelling tools sometimes emit
/// `123.0`, which is rounded.
mod coord {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &i32, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i32(*v)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i32, D::Error> {
        let raw = String::deserialize(d)?;
        let v = raw
            .trim()
            .parse::<f64>()
            .map_err(|_| D::Error::custom(format!("invalid coordinate `{raw}`")))?;
        if !v.is_finite() || v < f64::from(i32::MIN) || v > f64::from(i32::MAX) {
            return Err(D::Error::custom(format!("coordinate out of range `{raw}`")));
        }
        Ok(v.round() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilesplit_core::InclusionStatus;

    const SOURCE: &str = r#"<annotation>
  <folder>images</folder>
  <filename>field_01.png</filename>
  <size><width>4000</width><height>3000</height><depth>3</depth></size>
  <segmented>0</segmented>
  <object>
    <name>thistle</name>
    <pose>Unspecified</pose>
    <truncated>0</truncated>
    <difficult>1</difficult>
    <bndbox><xmin>120</xmin><ymin>80</ymin><xmax>180.0</xmax><ymax>141.6</ymax></bndbox>
  </object>
  <object>
    <name>dock</name>
    <truncated>1</truncated>
    <difficult>0</difficult>
    <bndbox><xmin>700</xmin><ymin>700</ymin><xmax>760</xmax><ymax>790</ymax></bndbox>
  </object>
</annotation>
"#;

    #[test]
    fn parses_source_annotation_ignoring_extra_elements() {
        let rec: VocRecord = quick_xml::de::from_str(SOURCE).unwrap();
        assert_eq!(rec.filename, "field_01.png");
        assert_eq!(rec.size.width, 4000);
        assert_eq!(rec.objects.len(), 2);

        let first = rec.objects[0].to_bounding_box();
        assert_eq!(first.name, "thistle");
        assert!(first.difficult);
        assert!(!first.truncated);
        assert_eq!(first.rect, PixelRect::new(120, 80, 180, 142));
        assert!(rec.objects[1].truncated);
    }

    #[test]
    fn tile_record_writes_and_reads_back() {
        let boxes = vec![TileBox {
            name: "dock".to_string(),
            category_id: None,
            truncated: true,
            difficult: false,
            rect: PixelRect::new(1, 40, 60, 140),
            status: InclusionStatus::IncludedTruncated,
        }];
        let rec = VocRecord::for_tile("field_01_000_001.png", 700, 700, &boxes);
        let xml = rec.to_xml_string().unwrap();
        assert!(xml.starts_with("<annotation>"));
        assert!(xml.contains("<truncated>1</truncated>"));
        assert!(xml.contains("<depth>3</depth>"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tile.xml");
        rec.write(&path).unwrap();
        assert_eq!(VocRecord::read(&path).unwrap(), rec);
    }

    #[test]
    fn empty_tile_record_has_no_objects() {
        let rec = VocRecord::for_tile("bg.png", 512, 512, &[]);
        let xml = rec.to_xml_string().unwrap();
        assert!(!xml.contains("<object>"));
        let back: VocRecord = quick_xml::de::from_str(&xml).unwrap();
        assert!(back.objects.is_empty());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = VocRecord::read("/definitely/not/here.xml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.xml"));
    }
}
