use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),

    #[error("required index artifact is missing: {0}")]
    MissingArtifact(PathBuf),

    #[error("category schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error(
        "index is misaligned: {records} records but {rows} embedding rows"
    )]
    Misaligned { records: usize, rows: usize },

    #[error("{which} regex error: {source}")]
    Pattern {
        which: &'static str,
        #[source]
        source: regex::Error,
    },

    #[error("embedding error: {0}")]
    Embedding(String),
}
