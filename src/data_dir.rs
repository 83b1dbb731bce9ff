use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const DATA_DIR_ENV_VAR: &str = "SURVEYCAT_DATA_DIR";

/// Home of every artifact the pipeline produces: the scan CSV and the
/// index files consumed by the query service.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolve the data directory from, in order of priority:
    /// 1. An explicit path (from --data-dir)
    /// 2. The SURVEYCAT_DATA_DIR environment variable
    /// 3. The XDG data directory (~/.local/share/surveycat/)
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let root = if let Some(path) = explicit {
            path.to_path_buf()
        } else if let Ok(val) = std::env::var(DATA_DIR_ENV_VAR) {
            PathBuf::from(val)
        } else {
            xdg::BaseDirectories::with_prefix("surveycat")
                .get_data_home()
                .ok_or_else(|| {
                    Error::Config(
                        "could not determine XDG data home directory".into(),
                    )
                })?
        };

        std::fs::create_dir_all(&root)
            .map_err(|_| Error::DataDir(root.clone()))?;

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scan_csv(&self) -> PathBuf {
        self.root.join("scan.csv")
    }

    pub fn records_json(&self) -> PathBuf {
        self.root.join("records.json")
    }

    pub fn filters_json(&self) -> PathBuf {
        self.root.join("filters.json")
    }

    pub fn embeddings_bin(&self) -> PathBuf {
        self.root.join("embeddings.bin")
    }

    pub fn manifest_json(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    pub fn searchable_texts(&self) -> PathBuf {
        self.root.join("searchable_texts.txt")
    }

    /// Artifacts the query service cannot start without.
    pub fn required_index_artifacts(&self) -> [PathBuf; 4] {
        [
            self.records_json(),
            self.filters_json(),
            self.embeddings_bin(),
            self.manifest_json(),
        ]
    }
}

/// Write `data` next to `path` and rename it into place, so readers never
/// observe a half-written artifact.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, data)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
