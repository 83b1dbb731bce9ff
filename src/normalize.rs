//! Mapping of per-kind metadata tables into [`UnifiedRecord`]s.
//!
//! Each metadata export has its own column names; the row structs below are
//! the mapping tables. Missing columns and empty cells default to an empty
//! string or an absent number, never to an error.

use std::path::Path;

use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    error::Result,
    record::{ImageMeta, LayerMeta, SourceKind, TableMeta, UnifiedRecord},
    scanner::ScanRecord,
    text_util::{extension_subtype, filename_tokens},
    walker::TargetType,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    Table,
    Geodatabase,
    Shapefile,
    Image,
}

/// Metadata exports recognised in a metadata directory, in load order.
pub const METADATA_FILES: [(&str, MetadataKind); 5] = [
    ("csv_xlsx_tables_metadata.csv", MetadataKind::Table),
    ("gdb_layer_metadata.csv", MetadataKind::Geodatabase),
    ("gdb_layer_metadata_2.csv", MetadataKind::Geodatabase),
    ("shp_layer_metadata.csv", MetadataKind::Shapefile),
    ("images_layer_metadata.csv", MetadataKind::Image),
];

trait MetadataRow: DeserializeOwned {
    fn into_record(self) -> UnifiedRecord;
}

fn number(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TableRow {
    file_extension: String,
    file_path: String,
    file_name: String,
    #[serde(rename = "Species")]
    species: String,
    activity: String,
    filename_tokens: String,
    column_names: String,
    status: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    row_count: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    file_size_mb: Option<f64>,
    min_date: String,
    max_date: String,
}

impl MetadataRow for TableRow {
    fn into_record(self) -> UnifiedRecord {
        let kind = SourceKind::Table(TableMeta {
            row_count: number(self.row_count),
            file_size_mb: number(self.file_size_mb),
            min_date: self.min_date,
            max_date: self.max_date,
        });
        UnifiedRecord {
            subtype: extension_subtype(&self.file_extension),
            species: self.species,
            activity: self.activity,
            filename_tokens: self.filename_tokens,
            fields: self.column_names,
            status: self.status,
            ..UnifiedRecord::new(kind, self.file_path, self.file_name)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeodatabaseRow {
    geodatabase: String,
    layer: String,
    #[serde(rename = "Species")]
    species: String,
    activity: String,
    first_word: String,
    field_names: String,
    status: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    feature_count: Option<f64>,
    geometry_types: String,
    crs: String,
    min_date: String,
    max_date: String,
}

impl MetadataRow for GeodatabaseRow {
    fn into_record(self) -> UnifiedRecord {
        let kind = SourceKind::Geodatabase(LayerMeta {
            feature_count: number(self.feature_count),
            geometry_types: self.geometry_types,
            crs: self.crs,
            min_date: self.min_date,
            max_date: self.max_date,
        });
        UnifiedRecord {
            subtype: "gdb_layer".into(),
            species: self.species,
            activity: self.activity,
            filename_tokens: self.first_word,
            fields: self.field_names,
            status: self.status,
            ..UnifiedRecord::new(kind, self.geodatabase, self.layer)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShapefileRow {
    shapefile_path: String,
    layer_name: String,
    #[serde(rename = "Species")]
    species: String,
    activity: String,
    first_word: String,
    field_names: String,
    status: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    feature_count: Option<f64>,
    geometry_types: String,
    crs: String,
    min_date: String,
    max_date: String,
}

impl MetadataRow for ShapefileRow {
    fn into_record(self) -> UnifiedRecord {
        let kind = SourceKind::Shapefile(LayerMeta {
            feature_count: number(self.feature_count),
            geometry_types: self.geometry_types,
            crs: self.crs,
            min_date: self.min_date,
            max_date: self.max_date,
        });
        UnifiedRecord {
            subtype: "shp".into(),
            species: self.species,
            activity: self.activity,
            filename_tokens: self.first_word,
            fields: self.field_names,
            status: self.status,
            ..UnifiedRecord::new(kind, self.shapefile_path, self.layer_name)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ImageRow {
    file_extension: String,
    image_path: String,
    file_name: String,
    #[serde(rename = "Species")]
    species: String,
    activity: String,
    filename_tokens: String,
    status: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    file_size_mb: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    width_px: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    height_px: Option<f64>,
    camera_make: String,
    camera_model: String,
    gps_info: String,
}

impl MetadataRow for ImageRow {
    fn into_record(self) -> UnifiedRecord {
        let kind = SourceKind::Image(ImageMeta {
            file_size_mb: number(self.file_size_mb),
            width_px: number(self.width_px),
            height_px: number(self.height_px),
            camera_make: self.camera_make,
            camera_model: self.camera_model,
            has_gps: self.gps_info.eq_ignore_ascii_case("true"),
        });
        UnifiedRecord {
            subtype: extension_subtype(&self.file_extension),
            species: self.species,
            activity: self.activity,
            filename_tokens: self.filename_tokens,
            status: self.status,
            ..UnifiedRecord::new(kind, self.image_path, self.file_name)
        }
    }
}

fn read_rows<R: MetadataRow>(path: &Path) -> Result<Vec<UnifiedRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize::<R>() {
        records.push(row?.into_record());
    }
    Ok(records)
}

/// Normalise every row of one metadata export.
pub fn load_metadata(kind: MetadataKind, path: &Path) -> Result<Vec<UnifiedRecord>> {
    match kind {
        MetadataKind::Table => read_rows::<TableRow>(path),
        MetadataKind::Geodatabase => read_rows::<GeodatabaseRow>(path),
        MetadataKind::Shapefile => read_rows::<ShapefileRow>(path),
        MetadataKind::Image => read_rows::<ImageRow>(path),
    }
}

/// Load every recognised metadata export present in `dir`.
pub fn load_metadata_dir(dir: &Path) -> Result<Vec<UnifiedRecord>> {
    let mut all = Vec::new();
    for (file_name, kind) in METADATA_FILES {
        let path = dir.join(file_name);
        if !path.is_file() {
            continue;
        }
        let records = load_metadata(kind, &path)?;
        tracing::info!("{file_name}: {} records", records.len());
        all.extend(records);
    }
    Ok(all)
}

/// Record for a scanned file that has no metadata counterpart.
pub fn record_from_scan(scan: &ScanRecord) -> UnifiedRecord {
    let kind = match scan.file_type {
        TargetType::Csv | TargetType::Excel => SourceKind::Table(TableMeta::default()),
        TargetType::Geodatabase => SourceKind::Geodatabase(LayerMeta::default()),
        TargetType::Shapefile => SourceKind::Shapefile(LayerMeta::default()),
        TargetType::Pdf | TargetType::Gpx => SourceKind::Document,
    };

    let file_name = Path::new(&scan.file_name);
    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let subtype = file_name
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    UnifiedRecord {
        subtype,
        filename_tokens: filename_tokens(&stem),
        status: scan.status.to_string(),
        ..UnifiedRecord::new(kind, scan.file_path.clone(), scan.file_name.clone())
    }
}
