use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const CONFIG_ENV_VAR: &str = "SURVEYCAT_CONFIG";
pub const CONFIG_FILE_NAME: &str = "surveycat.toml";

/// A named group of vocabulary terms. Each category becomes one column of
/// the scan artifact and one filter axis of the query engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub terms: Vec<String>,
}

impl Category {
    pub fn new(name: &str, terms: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            terms: terms.iter().map(|t| t.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Fastembed,
    Hashing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    /// Number of texts handed to the embedder per call.
    pub batch_size: usize,
    /// Where fastembed caches downloaded model files.
    pub cache_dir: Option<PathBuf>,
    /// Output dimension of the hashing backend.
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Fastembed,
            batch_size: 256,
            cache_dir: None,
            dimension: 384,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub max_file_size_mb: u64,
    /// Row cap applied by tabular readers.
    pub max_rows: usize,
    pub skip_extensions: Vec<String>,
    pub embedding: EmbeddingConfig,
    pub categories: Vec<Category>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 500,
            max_rows: 100_000,
            skip_extensions: default_skip_extensions(),
            embedding: EmbeddingConfig::default(),
            categories: default_categories(),
        }
    }
}

impl CatalogConfig {
    /// Resolve the configuration from, in order of priority:
    /// 1. An explicit path (from --config)
    /// 2. The SURVEYCAT_CONFIG environment variable
    /// 3. `surveycat.toml` inside the data directory, if present
    /// 4. Built-in defaults
    pub fn resolve(explicit: Option<&Path>, data_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Ok(val) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load(Path::new(&val));
        }
        let in_data_dir = data_dir.join(CONFIG_FILE_NAME);
        if in_data_dir.is_file() {
            return Self::load(&in_data_dir);
        }
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(Error::Config("category name is empty".into()));
            }
            if !seen.insert(category.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate category '{}'",
                    category.name
                )));
            }
        }
        if self.embedding.batch_size == 0 {
            return Err(Error::Config("embedding.batch_size must be > 0".into()));
        }
        Ok(())
    }

    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

pub fn default_skip_extensions() -> Vec<String> {
    [
        // Images
        ".jpg", ".jpeg", ".png", ".gif", ".tif", ".tiff", ".cr2", ".nef",
        ".bmp", ".raw",
        // Audio/video
        ".avi", ".mp4", ".mov", ".wav", ".mp3", ".wmv",
        // Shapefile sidecars (.shp is read directly)
        ".shx", ".prj", ".cpg", ".sbn", ".sbx", ".shp.xml", ".qmd", ".dbf",
        // Geodatabase internals
        ".gdbtable", ".gdbtablx", ".gdbindexes", ".atx", ".freelist",
        ".horizon", ".spx",
        // Other
        ".lock", ".xml", ".html", ".htm", ".pptx", ".docx",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_categories() -> Vec<Category> {
    vec![
        Category::new(
            "marine_mammals",
            &[
                "dugong", "dolphin", "whale", "manatee", "porpoise",
                "cetacean", "bottlenose", "spinner", "humpback", "brydes",
                "bryde", "minke", "orca", "indo-pacific", "pantropical",
                "rissos", "false killer",
            ],
        ),
        Category::new(
            "sharks_rays",
            &[
                "shark", "ray", "manta", "stingray", "guitarfish", "sawfish",
                "hammerhead", "whale shark", "tiger shark", "reef shark",
                "blacktip", "whitetip", "eagle ray", "mobula",
                "leopard shark", "nurse shark", "silky shark", "thresher",
                "oceanic whitetip",
            ],
        ),
        Category::new(
            "reptiles",
            &[
                "turtle", "hawksbill", "loggerhead", "green turtle",
                "leatherback", "olive ridley", "sea snake", "sea turtle",
            ],
        ),
        Category::new(
            "fish",
            &[
                "grouper", "parrotfish", "snapper", "barracuda", "tuna",
                "trevally", "fusilier", "anthias", "clownfish", "moray",
                "napoleonfish", "napoleon", "bumphead", "sweetlips",
                "emperor", "rabbitfish", "surgeonfish", "wrasse",
                "damselfish", "butterflyfish", "angelfish", "goby", "blenny",
                "pufferfish", "triggerfish", "lionfish", "scorpionfish",
            ],
        ),
        Category::new(
            "birds",
            &[
                "osprey", "falcon", "sooty falcon", "eagle", "tern", "gull",
                "heron", "cormorant", "pelican", "booby", "frigatebird",
                "flamingo", "plover", "sandpiper", "egret", "shearwater",
                "petrel", "tropicbird", "raptor", "sooty gull",
                "white-eyed gull", "crab plover", "reef heron",
            ],
        ),
        Category::new(
            "invertebrates_habitat",
            &[
                "coral", "seagrass", "sea grass", "sponge", "urchin",
                "starfish", "sea cucumber", "octopus", "squid", "cuttlefish",
                "jellyfish", "crab", "lobster", "shrimp", "giant clam",
                "triton", "nudibranch", "anemone", "bryozoan", "hydroid",
                "tunicate", "mangrove", "algae",
            ],
        ),
        Category::new(
            "survey_types",
            &[
                "survey", "transect", "quadrat", "monitoring", "assessment",
                "census", "sighting", "observation", "encounter",
                "stranding", "nesting", "tagging", "satellite tag",
                "acoustic", "photo-id", "photo id", "biopsy", "genetic",
                "sample", "capture", "recapture", "telemetry", "drone",
                "aerial", "boat survey", "dive survey", "snorkel", "BRUV",
                "baited remote", "camera trap", "ROV", "AUV", "benthic",
                "pelagic", "intertidal", "subtidal", "baseline", "impact",
                "EIA", "environmental impact",
            ],
        ),
        Category::new(
            "places",
            &[
                "NEOM", "Sharma", "Gayal", "Sindalah", "Magna", "Aqaba",
                "Gulf of Aqaba", "Tiran", "Sanafir", "Red Sea", "Farasan",
                "Yanbu", "Jeddah", "Thuwal", "Rabigh", "Al Wajh", "Umluj",
                "Duba", "Haql", "Tabuk", "island", "reef", "lagoon", "bay",
                "coast", "offshore",
            ],
        ),
        Category::new(
            "data_types",
            &[
                "GPS", "coordinate", "latitude", "longitude", "waypoint",
                "track", "depth", "temperature", "salinity", "chlorophyll",
                "turbidity", "abundance", "density", "biomass", "count",
                "frequency", "size", "length", "weight", "measurement",
                "behaviour", "behavior", "feeding", "breeding", "migration",
                "habitat", "substrate", "bathymetry", "geomorphology",
            ],
        ),
        Category::new(
            "conservation",
            &[
                "protected", "MPA", "marine protected", "sanctuary",
                "reserve", "endangered", "threatened", "vulnerable", "IUCN",
                "CITES", "conservation", "restoration", "rehabilitation",
                "management", "impact", "disturbance", "pollution", "debris",
                "plastic", "bycatch", "fishery", "fishing", "boat strike",
                "collision",
            ],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_carry_ten_categories() {
        let config = CatalogConfig::default();
        let names = config.category_names();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "marine_mammals");
        assert_eq!(names[9], "conservation");
        assert_eq!(config.max_file_size_mb, 500);
        assert_eq!(config.max_rows, 100_000);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = CatalogConfig::from_toml(
            r#"
            max_file_size_mb = 10

            [[categories]]
            name = "sharks_rays"
            terms = ["shark", "ray"]
            "#,
        )
        .unwrap();

        assert_eq!(config.max_file_size_mb, 10);
        assert_eq!(config.max_rows, 100_000);
        assert_eq!(config.categories.len(), 1);
        assert_eq!(config.categories[0].terms, vec!["shark", "ray"]);
        assert_eq!(config.embedding.backend, EmbeddingBackend::Fastembed);
    }

    #[test]
    fn embedding_section_parses() {
        let config = CatalogConfig::from_toml(
            r#"
            [embedding]
            backend = "hashing"
            dimension = 64
            "#,
        )
        .unwrap();
        assert_eq!(config.embedding.backend, EmbeddingBackend::Hashing);
        assert_eq!(config.embedding.dimension, 64);
        assert_eq!(config.embedding.batch_size, 256);
    }

    #[test]
    fn duplicate_category_rejected() {
        let err = CatalogConfig::from_toml(
            r#"
            [[categories]]
            name = "fish"
            terms = ["tuna"]

            [[categories]]
            name = "fish"
            terms = ["grouper"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn resolve_reads_file_in_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "max_rows = 7\n",
        )
        .unwrap();

        let config = CatalogConfig::resolve(None, tmp.path()).unwrap();
        assert_eq!(config.max_rows, 7);
    }

    #[test]
    fn size_ceiling_in_bytes() {
        let config = CatalogConfig {
            max_file_size_mb: 2,
            ..CatalogConfig::default()
        };
        assert_eq!(config.max_file_size_bytes(), 2 * 1024 * 1024);
    }
}
