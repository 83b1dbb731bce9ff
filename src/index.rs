use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    data_dir::DataDir,
    embedding::{Embedder, EmbeddingMatrix},
    error::{Error, Result},
    index_builder::{BuiltIndex, FilterOptions, Manifest},
    record::UnifiedRecord,
};

/// The query-side view of a built index. Immutable once constructed; row
/// `i` of every column describes the same record.
#[derive(Debug, Clone)]
pub struct Index {
    records: Vec<UnifiedRecord>,
    texts: Vec<String>,
    embeddings: EmbeddingMatrix,
    filters: FilterOptions,
    categories: Vec<String>,
}

/// Index statistics as served by `/api/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total_files: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
}

impl Index {
    /// Assemble an index, checking that records and embedding rows align.
    /// Searchable text is derived here, once per record.
    pub fn new(
        records: Vec<UnifiedRecord>,
        embeddings: EmbeddingMatrix,
        filters: FilterOptions,
        categories: Vec<String>,
    ) -> Result<Self> {
        if records.len() != embeddings.rows() {
            return Err(Error::Misaligned {
                records: records.len(),
                rows: embeddings.rows(),
            });
        }
        let texts = records.iter().map(UnifiedRecord::searchable_text).collect();
        Ok(Self {
            records,
            texts,
            embeddings,
            filters,
            categories,
        })
    }

    pub fn from_built(built: BuiltIndex) -> Result<Self> {
        Self::new(
            built.records,
            built.embeddings,
            built.filters,
            built.manifest.categories,
        )
    }

    /// Load the artifacts from `data_dir`. Every artifact must exist and the
    /// index must have been built for `categories` by the model behind
    /// `embedder`, or query vectors would not be comparable with its rows.
    pub fn load(
        data_dir: &DataDir,
        categories: &[String],
        embedder: &dyn Embedder,
    ) -> Result<Self> {
        for path in data_dir.required_index_artifacts() {
            if !path.is_file() {
                return Err(Error::MissingArtifact(path));
            }
        }

        let manifest: Manifest =
            serde_json::from_slice(&std::fs::read(data_dir.manifest_json())?)?;
        if manifest.categories != categories {
            return Err(Error::SchemaMismatch(format!(
                "index was built for categories {:?}, configuration has {:?}",
                manifest.categories, categories
            )));
        }
        if manifest.model != embedder.model_name() {
            return Err(Error::SchemaMismatch(format!(
                "index was embedded with '{}', configured embedder is '{}'",
                manifest.model,
                embedder.model_name()
            )));
        }

        let records: Vec<UnifiedRecord> =
            serde_json::from_slice(&std::fs::read(data_dir.records_json())?)?;
        let filters: FilterOptions =
            serde_json::from_slice(&std::fs::read(data_dir.filters_json())?)?;
        let embeddings = EmbeddingMatrix::read(&data_dir.embeddings_bin())?;

        if manifest.records != records.len() {
            return Err(Error::Misaligned {
                records: records.len(),
                rows: manifest.records,
            });
        }
        if manifest.dimension != embeddings.dimension() {
            return Err(Error::SchemaMismatch(format!(
                "manifest records {} dimensions, {} has {}",
                manifest.dimension,
                data_dir.embeddings_bin().display(),
                embeddings.dimension()
            )));
        }

        let index = Self::new(records, embeddings, filters, manifest.categories)?;
        tracing::info!(
            "loaded {} records ({} dimensions) from {}",
            index.len(),
            index.embeddings.dimension(),
            data_dir.root().display()
        );
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[UnifiedRecord] {
        &self.records
    }

    pub fn record(&self, idx: usize) -> &UnifiedRecord {
        &self.records[idx]
    }

    pub fn searchable_text(&self, idx: usize) -> &str {
        &self.texts[idx]
    }

    pub fn embeddings(&self) -> &EmbeddingMatrix {
        &self.embeddings
    }

    pub fn filters(&self) -> &FilterOptions {
        &self.filters
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn stats(&self) -> Stats {
        let mut by_type = BTreeMap::new();
        let mut by_category: BTreeMap<String, usize> =
            self.categories.iter().map(|c| (c.clone(), 0)).collect();

        for record in &self.records {
            *by_type.entry(record.type_tag().to_string()).or_insert(0) += 1;
            for (category, count) in by_category.iter_mut() {
                if !record.category(category).is_empty() {
                    *count += 1;
                }
            }
        }

        Stats {
            total_files: self.records.len(),
            by_type,
            by_category,
        }
    }
}
