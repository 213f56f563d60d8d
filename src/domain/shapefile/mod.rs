//! Shapefile decoding.
//!
//! Decoding happens in two phases. [`ShapefileDecoder::open`] parses the structural
//! parts (index, geometry and attribute headers) and fixes the feature count;
//! [`ShapefileDecoder::records`] then decodes one record at a time, in file order.
//! The record iterator is single-pass: callers that need the records twice must
//! collect them.

pub mod components;
pub mod geometry;

use std::collections::BTreeMap;
use std::io::Cursor;

use serde::Serialize;
use serde_json::{Map as JsonMap, Number, Value as JsonValue};
use shapefile::dbase::{FieldValue, Record};
use utoipa::ToSchema;

pub use components::ShapefileComponents;
pub use geometry::shape_to_geojson;

/// Size of the `.shp`/`.shx` file header.
const HEADER_LEN: usize = 100;
/// Size of one `.shx` index entry (offset + content length).
const INDEX_ENTRY_LEN: usize = 8;

type ComponentReader = shapefile::Reader<Cursor<Vec<u8>>, Cursor<Vec<u8>>>;

/// One decoded feature: its dBase attributes and its GeoJSON geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeRecord {
    pub attributes: JsonMap<String, JsonValue>,
    pub geometry: Option<JsonValue>,
}

impl ShapeRecord {
    /// Renders an attribute as the text stored in the `name`/`key` columns.
    ///
    /// `Ok(None)` means the attribute exists but is empty; a missing attribute is an error.
    pub fn text_attribute(&self, index: usize, attribute: &str) -> crate::Result<Option<String>> {
        let value = self
            .attributes
            .get(attribute)
            .ok_or_else(|| crate::Error::MissingRecordAttribute {
                record: index,
                attribute: attribute.to_string(),
            })?;
        Ok(match value {
            JsonValue::Null => None,
            JsonValue::String(s) => Some(s.clone()),
            JsonValue::Number(n) => Some(match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    format!("{}", f as i64)
                }
                _ => n.to_string(),
            }),
            other => Some(other.to_string()),
        })
    }
}

pub struct ShapefileDecoder {
    reader: ComponentReader,
    feature_count: usize,
    projection: Option<String>,
    code_page: Option<String>,
}

impl ShapefileDecoder {
    /// Structural phase: validates the index and opens the geometry and attribute readers.
    pub fn open(components: ShapefileComponents) -> crate::Result<Self> {
        let projection = components.projection();
        let code_page = components.code_page();
        let feature_count = index_entry_count(&components.shx)?;

        let ShapefileComponents { shp, shx, dbf, .. } = components;
        let shape_reader = shapefile::ShapeReader::with_shx(Cursor::new(shp), Cursor::new(shx))?;
        let dbase_reader = shapefile::dbase::Reader::new(Cursor::new(dbf))
            .map_err(|e| crate::Error::Decode(format!("attribute table: {}", e)))?;

        if let Some(cp) = code_page.as_deref() {
            tracing::debug!(code_page = cp, "shapefile declares a code page");
        }

        Ok(Self {
            reader: shapefile::Reader::new(shape_reader, dbase_reader),
            feature_count,
            projection,
            code_page,
        })
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Raw projection descriptor (`.prj` contents), if supplied.
    pub fn projection(&self) -> Option<&str> {
        self.projection.as_deref()
    }

    pub fn code_page(&self) -> Option<&str> {
        self.code_page.as_deref()
    }

    /// Per-record phase. Records are decoded lazily and in file order.
    pub fn records(&mut self) -> impl Iterator<Item = crate::Result<ShapeRecord>> + '_ {
        self.reader.iter_shapes_and_records().map(|item| {
            let (shape, record) = item?;
            Ok(ShapeRecord {
                attributes: attributes_to_json(record),
                geometry: shape_to_geojson(&shape)?,
            })
        })
    }

    /// Decodes every record, failing on the first broken one.
    pub fn decode_all(mut self) -> crate::Result<DecodedShapefile> {
        let records = self.records().collect::<crate::Result<Vec<_>>>()?;
        if records.len() != self.feature_count {
            return Err(crate::Error::Decode(format!(
                "index lists {} features but {} records were decoded",
                self.feature_count,
                records.len()
            )));
        }
        Ok(DecodedShapefile {
            projection: self.projection,
            code_page: self.code_page,
            records,
        })
    }
}

/// A fully decoded shapefile, buffered so it can be moved across tasks.
#[derive(Debug, Clone)]
pub struct DecodedShapefile {
    pub projection: Option<String>,
    pub code_page: Option<String>,
    pub records: Vec<ShapeRecord>,
}

impl DecodedShapefile {
    /// Decodes the components on the blocking pool; the readers never leave that thread.
    pub async fn decode(components: ShapefileComponents) -> crate::Result<Self> {
        tokio::task::spawn_blocking(move || ShapefileDecoder::open(components)?.decode_all())
            .await?
    }
}

/// Statistics about an uploaded shapefile, reported by the inspection endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShapefileInformation {
    pub feature_count: usize,
    /// Number of features carrying each attribute.
    pub attributes: BTreeMap<String, usize>,
    #[serde(rename = "epsg")]
    pub epsg_code: Option<i32>,
    #[serde(rename = "proj4")]
    pub proj4_string: Option<String>,
}

impl ShapefileInformation {
    pub fn from_records(records: &[ShapeRecord]) -> Self {
        let mut attributes = BTreeMap::new();
        for record in records {
            for name in record.attributes.keys() {
                *attributes.entry(name.clone()).or_insert(0) += 1;
            }
        }
        Self {
            feature_count: records.len(),
            attributes,
            epsg_code: None,
            proj4_string: None,
        }
    }
}

fn index_entry_count(shx: &[u8]) -> crate::Result<usize> {
    if shx.len() < HEADER_LEN || (shx.len() - HEADER_LEN) % INDEX_ENTRY_LEN != 0 {
        return Err(crate::Error::Decode(format!(
            "index file has an invalid length of {} bytes",
            shx.len()
        )));
    }
    Ok((shx.len() - HEADER_LEN) / INDEX_ENTRY_LEN)
}

fn attributes_to_json(record: Record) -> JsonMap<String, JsonValue> {
    std::collections::HashMap::<String, FieldValue>::from(record)
        .into_iter()
        .map(|(name, value)| (name, field_value_to_json(value)))
        .collect()
}

fn number(value: f64) -> JsonValue {
    Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number)
}

fn field_value_to_json(value: FieldValue) -> JsonValue {
    match value {
        FieldValue::Character(s) => s
            .map(|s| s.trim().to_string())
            .map_or(JsonValue::Null, JsonValue::String),
        FieldValue::Memo(s) => JsonValue::String(s),
        FieldValue::Numeric(n) => n.map_or(JsonValue::Null, number),
        FieldValue::Float(f) => f.map_or(JsonValue::Null, |f| number(f as f64)),
        FieldValue::Double(d) => number(d),
        FieldValue::Currency(c) => number(c),
        FieldValue::Integer(i) => JsonValue::from(i),
        FieldValue::Logical(b) => b.map_or(JsonValue::Null, JsonValue::Bool),
        FieldValue::Date(d) => d
            .and_then(|d| chrono::NaiveDate::from_ymd_opt(d.year() as i32, d.month(), d.day()))
            .map_or(JsonValue::Null, |d| JsonValue::String(d.to_string())),
        other => JsonValue::String(format!("{:?}", other)),
    }
}

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures {
    //! Byte-level builders for tiny point shapefiles.

    use std::io::{Cursor, Write};

    use super::ShapefileComponents;

    pub struct PointFeature<'a> {
        pub x: f64,
        pub y: f64,
        pub name: &'a str,
        pub key: &'a str,
    }

    const NAME_LEN: usize = 20;
    const KEY_LEN: usize = 10;

    fn file_header(file_len_bytes: usize, bbox: [f64; 4]) -> Vec<u8> {
        let mut out = Vec::with_capacity(100);
        out.extend_from_slice(&9994i32.to_be_bytes());
        out.extend_from_slice(&[0u8; 20]);
        out.extend_from_slice(&((file_len_bytes / 2) as i32).to_be_bytes());
        out.extend_from_slice(&1000i32.to_le_bytes());
        out.extend_from_slice(&1i32.to_le_bytes());
        for v in bbox {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend_from_slice(&[0u8; 32]);
        out
    }

    fn padded(value: &str, len: usize) -> Vec<u8> {
        let mut bytes = value.as_bytes().to_vec();
        bytes.resize(len, b' ');
        bytes
    }

    fn field_descriptor(name: &str, kind: u8, len: u8) -> Vec<u8> {
        let mut out = vec![0u8; 32];
        out[..name.len()].copy_from_slice(name.as_bytes());
        out[11] = kind;
        out[16] = len;
        out
    }

    /// Builds `.shp`, `.shx` and `.dbf` for point features with `NAME` and `KEY` columns.
    pub fn points(features: &[PointFeature<'_>]) -> ShapefileComponents {
        let (mut xmin, mut ymin, mut xmax, mut ymax) = (0f64, 0f64, 0f64, 0f64);
        for (i, f) in features.iter().enumerate() {
            if i == 0 {
                (xmin, ymin, xmax, ymax) = (f.x, f.y, f.x, f.y);
            }
            xmin = xmin.min(f.x);
            ymin = ymin.min(f.y);
            xmax = xmax.max(f.x);
            ymax = ymax.max(f.y);
        }
        let bbox = [xmin, ymin, xmax, ymax];

        // 8 byte record header + 20 byte point content
        let record_len = 28;
        let shp_len = 100 + features.len() * record_len;
        let shx_len = 100 + features.len() * 8;

        let mut shp = file_header(shp_len, bbox);
        let mut shx = file_header(shx_len, bbox);
        for (i, f) in features.iter().enumerate() {
            let offset_words = (100 + i * record_len) / 2;
            shx.extend_from_slice(&(offset_words as i32).to_be_bytes());
            shx.extend_from_slice(&10i32.to_be_bytes());

            shp.extend_from_slice(&((i + 1) as i32).to_be_bytes());
            shp.extend_from_slice(&10i32.to_be_bytes());
            shp.extend_from_slice(&1i32.to_le_bytes());
            shp.extend_from_slice(&f.x.to_le_bytes());
            shp.extend_from_slice(&f.y.to_le_bytes());
        }

        let header_len = 32 + 2 * 32 + 1;
        let record_size = 1 + NAME_LEN + KEY_LEN;
        let mut dbf = vec![0u8; 32];
        dbf[0] = 0x03;
        dbf[1] = 124;
        dbf[2] = 1;
        dbf[3] = 1;
        dbf[4..8].copy_from_slice(&(features.len() as u32).to_le_bytes());
        dbf[8..10].copy_from_slice(&(header_len as u16).to_le_bytes());
        dbf[10..12].copy_from_slice(&(record_size as u16).to_le_bytes());
        dbf.extend(field_descriptor("NAME", b'C', NAME_LEN as u8));
        dbf.extend(field_descriptor("KEY", b'C', KEY_LEN as u8));
        dbf.push(0x0D);
        for f in features {
            dbf.push(b' ');
            dbf.extend(padded(f.name, NAME_LEN));
            dbf.extend(padded(f.key, KEY_LEN));
        }
        dbf.push(0x1A);

        ShapefileComponents {
            shp,
            shx,
            dbf,
            prj: Some(WGS84_WKT.as_bytes().to_vec()),
            cpg: Some(b"UTF-8".to_vec()),
        }
    }

    /// Packs the components into a zip archive as `<stem>/<stem>.<ext>`.
    pub fn zipped(components: &ShapefileComponents, stem: &str) -> zip::result::ZipResult<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let parts = [
            ("shp", Some(&components.shp)),
            ("shx", Some(&components.shx)),
            ("dbf", Some(&components.dbf)),
            ("prj", components.prj.as_ref()),
            ("cpg", components.cpg.as_ref()),
        ];
        for (ext, data) in parts {
            let Some(data) = data else { continue };
            writer.start_file(format!("{}/{}.{}", stem, stem, ext), zip::write::FileOptions::default())?;
            writer.write_all(data)?;
        }
        Ok(writer.finish()?.into_inner())
    }

    pub const WGS84_WKT: &str = r#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
}
