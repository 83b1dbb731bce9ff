use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::text_util::{PATH_CONTEXT_SEGMENTS, meaningful_path_segments};

/// Tabular file (CSV or spreadsheet) metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    pub row_count: Option<f64>,
    pub file_size_mb: Option<f64>,
    #[serde(default)]
    pub min_date: String,
    #[serde(default)]
    pub max_date: String,
}

/// Vector layer metadata, shared by geodatabase layers and shapefiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerMeta {
    pub feature_count: Option<f64>,
    #[serde(default)]
    pub geometry_types: String,
    #[serde(default)]
    pub crs: String,
    #[serde(default)]
    pub min_date: String,
    #[serde(default)]
    pub max_date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub file_size_mb: Option<f64>,
    pub width_px: Option<f64>,
    pub height_px: Option<f64>,
    #[serde(default)]
    pub camera_make: String,
    #[serde(default)]
    pub camera_model: String,
    #[serde(default)]
    pub has_gps: bool,
}

/// Source kind of a record together with its kind-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    Table(TableMeta),
    Geodatabase(LayerMeta),
    Shapefile(LayerMeta),
    Image(ImageMeta),
    /// PDF reports and GPS tracks: content-scanned only.
    Document,
}

impl SourceKind {
    pub const TAGS: [&'static str; 5] =
        ["table", "geodatabase", "shapefile", "image", "document"];

    pub fn tag(&self) -> &'static str {
        match self {
            SourceKind::Table(_) => "table",
            SourceKind::Geodatabase(_) => "geodatabase",
            SourceKind::Shapefile(_) => "shapefile",
            SourceKind::Image(_) => "image",
            SourceKind::Document => "document",
        }
    }
}

/// One searchable entry of the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedRecord {
    #[serde(flatten)]
    pub kind: SourceKind,
    #[serde(default)]
    pub subtype: String,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub activity: String,
    #[serde(default)]
    pub filename_tokens: String,
    #[serde(default)]
    pub fields: String,
    #[serde(default)]
    pub status: String,
    /// Comma-joined matched terms per category, empty values omitted.
    #[serde(default)]
    pub categories: BTreeMap<String, String>,
}

impl UnifiedRecord {
    pub fn new(kind: SourceKind, path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            subtype: String::new(),
            path: path.into(),
            name: name.into(),
            species: String::new(),
            activity: String::new(),
            filename_tokens: String::new(),
            fields: String::new(),
            status: String::new(),
            categories: BTreeMap::new(),
        }
    }

    pub fn type_tag(&self) -> &'static str {
        self.kind.tag()
    }

    /// Value of `category`, or `""` when the record has none.
    pub fn category(&self, category: &str) -> &str {
        self.categories.get(category).map(String::as_str).unwrap_or("")
    }

    /// Text that represents this record for embedding and pattern filters.
    ///
    /// Field repetition is the weighting: the name counts three times, the
    /// species twice, everything else once. Always derived, never stored.
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();

        if !self.name.is_empty() {
            parts.extend([self.name.as_str(); 3]);
        }
        if !self.species.is_empty() {
            parts.extend([self.species.as_str(); 2]);
        }
        for single in [&self.activity, &self.filename_tokens, &self.fields] {
            if !single.is_empty() {
                parts.push(single);
            }
        }

        let path_context;
        if !self.path.is_empty() {
            path_context =
                meaningful_path_segments(&self.path, PATH_CONTEXT_SEGMENTS).join(" ");
            parts.push(&path_context);
        }

        parts.join(" ")
    }
}
